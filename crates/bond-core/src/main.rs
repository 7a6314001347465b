//! Bond Engine Simulation
//!
//! Runs a scripted bond between a player and one entity type: the player acts
//! at random, severs after a while (or gets drained), tries to rebind the
//! entity if it turns hostile and bonds again once it is dormant.

use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bond_core::{
    BondEngine, EngineConfig, EntityCatalog, EventLog, Position, Vitality, DEFAULT_TUNING_PATH,
};
use bond_events::{EntityId, LedgerSnapshot, PlayerId};

const STARTER_CATALOG: &str = include_str!("../catalog.toml");

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "bond_sim")]
#[command(about = "Scripted bond engine simulation")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 1200)]
    ticks: u64,

    /// Seconds per tick
    #[arg(long, default_value_t = 0.1)]
    dt: f32,

    /// Tuning file (defaults to bond_tuning.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Entity catalog (defaults to the built-in starter catalog)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Entity type to bond with
    #[arg(long, default_value = "ember_wraith")]
    entity: String,

    /// Seconds of bonding before the player severs
    #[arg(long, default_value_t = 6.0)]
    sever_after: f32,

    /// Chance per tick that the player acts
    #[arg(long, default_value_t = 0.15)]
    action_rate: f32,

    /// Vitality regained per second while unbonded
    #[arg(long, default_value_t = 2.0)]
    regen: f32,

    /// Write every dispatched event as JSONL
    #[arg(long)]
    events_out: Option<PathBuf>,

    /// Ledger snapshot to start from
    #[arg(long)]
    snapshot_in: Option<PathBuf>,

    /// Write the final ledger snapshot as JSON
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    println!("Bond Engine Simulation");
    println!("======================");
    println!("Seed: {}", args.seed);
    println!("Ticks: {} x {}s", args.ticks, args.dt);
    println!("Entity: {}", args.entity);
    println!();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::load_or_default(DEFAULT_TUNING_PATH),
    };
    let catalog = match &args.catalog {
        Some(path) => EntityCatalog::from_file(path, &config.tiers)?,
        None => EntityCatalog::from_toml_str(STARTER_CATALOG, &config.tiers)?,
    };
    println!("Loaded {} entity types", catalog.len());

    let entity = EntityId::new(args.entity.clone());
    let lineage = catalog.get(&entity).and_then(|d| d.lineage.clone());

    let mut engine = BondEngine::new(config, catalog, args.seed);
    if let Some(path) = &args.snapshot_in {
        let snapshot = LedgerSnapshot::from_json(&fs::read_to_string(path)?)?;
        engine.import_ledger(&snapshot);
        println!("  Imported {} relationship records", snapshot.len());
    }
    if let Some(path) = &args.events_out {
        engine.attach_event_log(EventLog::create(path)?);
        println!("  Logging events to {}", path.display());
    }

    let counts: Arc<Mutex<BTreeMap<&'static str, u64>>> = Arc::default();
    let sink = Arc::clone(&counts);
    engine.subscribe(move |envelope| {
        if let Ok(mut counts) = sink.lock() {
            *counts.entry(envelope.event.name()).or_insert(0) += 1;
        }
    });
    engine.add_environment_hook(|descriptor: &bond_core::EntityDescriptor| {
        println!("  ~ the air shifts as {} arrives", descriptor.name);
    });

    let player = PlayerId::from("player_1");
    engine.spawn_player(player.clone(), Vitality::full(100.0), Position::new(0.0, 0.0))?;
    engine.spawn_player("bystander", Vitality::full(100.0), Position::new(4.0, 3.0))?;

    engine.begin_bond(&player, &entity)?;

    let mut rng = SmallRng::seed_from_u64(args.seed.wrapping_add(1));
    let mut dormant_since: Option<f32> = None;

    println!();
    println!("Starting simulation...");
    println!();

    for tick in 0..args.ticks {
        let now = engine.now();
        let bonded = engine.session(&player).is_some();

        if bonded && rng.gen::<f32>() < args.action_rate {
            engine.record_action(&player, now)?;
        }
        if !bonded {
            let current = engine.vitality(&player).map(|v| v.current).unwrap_or(0.0);
            engine.set_vitality(&player, current + args.regen * args.dt)?;
        }

        engine.tick(args.dt);

        if let Some(duration) = engine.session_duration(&player) {
            if duration >= args.sever_after {
                let outcome = engine.sever(&player)?;
                println!("Tick {}: severed -> {:?}", tick, outcome);
            }
        } else if bonded {
            println!("Tick {}: bond broke, player drained", tick);
        }

        if engine.is_hostile(&entity) {
            dormant_since = None;
            if tick % 50 == 0 {
                let result = engine.attempt_rebind(&player, &entity)?;
                println!("Tick {}: rebind attempt -> {:?}", tick, result);
            }
        } else if engine.session(&player).is_none() {
            let since = *dormant_since.get_or_insert(engine.now());
            if engine.now() - since >= 5.0 && engine.begin_bond(&player, &entity).is_ok() {
                dormant_since = None;
                println!("Tick {}: bonded again", tick);
            }
        }

        if tick % 100 == 0 {
            let vitality = engine.vitality(&player).map(|v| v.current).unwrap_or(0.0);
            println!(
                "Tick {:>5} | t={:>6.1}s | vitality {:>5.1} | {} {:.1}%",
                tick,
                engine.now(),
                vitality,
                engine.level(&entity),
                engine.relationship_percentage(&entity)
            );
        }
    }

    engine.flush_events();
    if let Some(mut log) = engine.detach_event_log() {
        log.flush()?;
    }

    println!();
    println!("Simulation complete!");
    println!("  {}", engine.affinity_summary(&entity));
    if let Some(parent) = &lineage {
        println!("  {}", engine.affinity_summary(parent));
    }
    println!();
    println!("Events:");
    if let Ok(counts) = counts.lock() {
        for (name, count) in counts.iter() {
            println!("  {:<20} {}", name, count);
        }
    }

    if let Some(path) = &args.snapshot_out {
        fs::write(path, engine.export_ledger().to_json()?)?;
        println!();
        println!("Wrote ledger snapshot to {}", path.display());
    }

    Ok(())
}
