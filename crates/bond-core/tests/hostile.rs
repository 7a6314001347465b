//! Hostile behavior through the engine: expiry, attacks and rebinding.

mod common;

use bond_core::{BondError, InvalidOperation, Position};
use bond_events::{AttackKind, BondEvent, HostileExitReason, HostileVariant, RebindResult};
use common::*;

const DT: f32 = 0.5;

#[test]
fn test_hostile_exits_exactly_once_despite_failed_rebinds() {
    let mut engine = engine_with(vec![primary("stone_warden", 10.0, HostileVariant::Destructive)], 3);
    let p = add_player(&mut engine, "player_1", 100.0);
    let e = entity("stone_warden");
    let events = record_events(&mut engine);

    engine.begin_bond(&p, &e).unwrap();
    engine.force_break(&p).unwrap();
    engine.set_position(&p, Position::new(100.0, 100.0)).unwrap();
    // Zero vitality: every rebind fails
    engine.set_vitality(&p, 0.0).unwrap();

    for _ in 0..30 {
        if engine.is_hostile(&e) {
            assert_eq!(engine.attempt_rebind(&p, &e).unwrap(), RebindResult::Failure);
        }
        engine.tick(DT);
    }

    assert!(!engine.is_hostile(&e));
    let events = events.lock().unwrap();
    let exits: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            BondEvent::HostileExited { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect();
    assert_eq!(exits, vec![HostileExitReason::Expired]);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, BondEvent::RebindAttempted { .. }))
            .count(),
        10
    );
}

#[test]
fn test_expiry_happens_at_duration() {
    let mut engine = engine_with(vec![primary("stone_warden", 10.0, HostileVariant::Destructive)], 3);
    let p = add_player(&mut engine, "player_1", 100.0);
    let e = entity("stone_warden");

    engine.begin_bond(&p, &e).unwrap();
    engine.force_break(&p).unwrap();
    engine.set_position(&p, Position::new(100.0, 100.0)).unwrap();

    engine.run(9, DT);
    assert!(engine.is_hostile(&e));
    assert!((engine.hostile(&e).unwrap().remaining(engine.now()) - 0.5).abs() < 1e-5);

    engine.tick(DT);
    assert!(!engine.is_hostile(&e));
}

#[test]
fn test_rebind_success_rate_tracks_vitality_fraction() {
    let mut engine = engine_with(vec![primary("ember_wraith", 10.0, HostileVariant::Vengeful)], 2024);
    let p = add_player(&mut engine, "player_1", 100.0);
    let e = entity("ember_wraith");

    let trials = 2000;
    let mut successes = 0;
    for _ in 0..trials {
        if !engine.is_hostile(&e) {
            engine.begin_bond(&p, &e).unwrap();
            engine.force_break(&p).unwrap();
        }
        engine.set_vitality(&p, 30.0).unwrap();
        if engine.attempt_rebind(&p, &e).unwrap() == RebindResult::Success {
            successes += 1;
        }
        engine.flush_events();
    }

    let rate = successes as f32 / trials as f32;
    assert!((rate - 0.3).abs() < 0.05, "success rate {}", rate);
}

#[test]
fn test_rebind_at_full_vitality_always_succeeds() {
    let mut engine = engine_with(vec![primary("ember_wraith", 10.0, HostileVariant::Vengeful)], 9);
    let p = add_player(&mut engine, "player_1", 100.0);
    let e = entity("ember_wraith");
    let events = record_events(&mut engine);

    engine.begin_bond(&p, &e).unwrap();
    engine.force_break(&p).unwrap();
    assert_eq!(engine.attempt_rebind(&p, &e).unwrap(), RebindResult::Success);
    assert!(!engine.is_hostile(&e));

    // Rebinding leaves the entity dormant, not bonded
    assert!(engine.session(&p).is_none());
    engine.flush_events();
    assert!(matches!(
        events.lock().unwrap().last(),
        Some(BondEvent::HostileExited {
            reason: HostileExitReason::Rebound,
            ..
        })
    ));

    assert!(engine.begin_bond(&p, &e).is_ok());
}

#[test]
fn test_failed_rebind_backlash_is_half_damage() {
    let mut engine = engine_with(vec![primary("ember_wraith", 10.0, HostileVariant::Vengeful)], 11);
    let p = add_player(&mut engine, "player_1", 100.0);
    let e = entity("ember_wraith");

    let mut failures = 0;
    for _ in 0..200 {
        if !engine.is_hostile(&e) {
            engine.begin_bond(&p, &e).unwrap();
            engine.force_break(&p).unwrap();
        }
        engine.set_vitality(&p, 50.0).unwrap();
        if engine.attempt_rebind(&p, &e).unwrap() == RebindResult::Failure {
            // Hostile damage 2.0 scaled by the rebind penalty factor
            assert_eq!(engine.vitality(&p).unwrap().current, 49.0);
            assert!(engine.is_hostile(&e));
            failures += 1;
        }
    }
    assert!(failures > 0);
}

#[test]
fn test_rebind_with_no_vitality_never_succeeds() {
    let mut engine = engine_with(vec![primary("ember_wraith", 10.0, HostileVariant::Vengeful)], 9);
    let p = add_player(&mut engine, "player_1", 100.0);
    let e = entity("ember_wraith");
    let events = record_events(&mut engine);

    engine.begin_bond(&p, &e).unwrap();
    engine.force_break(&p).unwrap();
    engine.set_vitality(&p, 0.0).unwrap();

    for _ in 0..5 {
        assert_eq!(engine.attempt_rebind(&p, &e).unwrap(), RebindResult::Failure);
    }
    assert!(engine.is_hostile(&e));

    engine.flush_events();
    let zero_chance = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, BondEvent::RebindAttempted { chance, .. } if *chance == 0.0))
        .count();
    assert_eq!(zero_chance, 5);
}

#[test]
fn test_rebind_rejections() {
    let mut engine = engine_with(vec![primary("ember_wraith", 10.0, HostileVariant::Vengeful)], 9);
    let p = add_player(&mut engine, "player_1", 100.0);
    let e = entity("ember_wraith");

    assert_eq!(
        engine.attempt_rebind(&p, &e).unwrap_err(),
        BondError::InvalidOperation(InvalidOperation::EntityNotHostile(e.clone()))
    );
    assert_eq!(
        engine.attempt_rebind(&p, &entity("nothing")).unwrap_err(),
        BondError::InvalidOperation(InvalidOperation::UnknownEntity(entity("nothing")))
    );
    assert!(engine
        .attempt_rebind(&player("ghost"), &e)
        .unwrap_err()
        .is_invalid_operation());
}

#[test]
fn test_vengeful_hunts_betrayer_and_spares_bystander() {
    let mut engine = engine_with(vec![primary("ember_wraith", 10.0, HostileVariant::Vengeful)], 5);
    let betrayer = add_player(&mut engine, "betrayer", 100.0);
    let bystander = add_player(&mut engine, "bystander", 100.0);
    let e = entity("ember_wraith");
    let events = record_events(&mut engine);

    engine.set_position(&bystander, Position::new(0.5, 0.0)).unwrap();
    engine.begin_bond(&betrayer, &e).unwrap();
    engine.force_break(&betrayer).unwrap();
    engine.set_vitality(&betrayer, 100.0).unwrap();

    engine.run(8, DT);

    let events = events.lock().unwrap();
    let hits: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            BondEvent::HostileAttack {
                player_id, attack, ..
            } => Some((player_id.clone(), *attack)),
            _ => None,
        })
        .collect();
    assert!(!hits.is_empty());
    assert!(hits
        .iter()
        .all(|(p, kind)| *p == betrayer && *kind == AttackKind::Targeted));
    assert_eq!(engine.vitality(&bystander).unwrap().current, 100.0);
    assert!(engine.vitality(&betrayer).unwrap().current < 100.0);
}

#[test]
fn test_destructive_area_attack_hits_everyone_in_radius() {
    let mut engine = engine_with(vec![primary("stone_warden", 10.0, HostileVariant::Destructive)], 5);
    let p1 = add_player(&mut engine, "player_1", 100.0);
    let p2 = add_player(&mut engine, "player_2", 100.0);
    let far = add_player(&mut engine, "far_away", 100.0);
    let e = entity("stone_warden");

    engine.set_position(&p2, Position::new(3.0, 4.0)).unwrap();
    engine.set_position(&far, Position::new(500.0, 0.0)).unwrap();
    engine.begin_bond(&p1, &e).unwrap();
    engine.force_break(&p1).unwrap();
    engine.set_vitality(&p1, 100.0).unwrap();

    // First area attack lands one attack interval after entry
    engine.run(2, DT);

    assert_eq!(engine.vitality(&p1).unwrap().current, 98.0);
    assert_eq!(engine.vitality(&p2).unwrap().current, 98.0);
    assert_eq!(engine.vitality(&far).unwrap().current, 100.0);
}

#[test]
fn test_hostile_damage_counts_for_sacrificial_bond() {
    use bond_core::PolicySpec;

    let mut engine = engine_with(
        vec![
            primary("stone_warden", 10.0, HostileVariant::Destructive),
            primary("blood_oath", 0.1, HostileVariant::Vengeful)
                .with_policy(PolicySpec::sacrificial(2.0, 2.0, 9.0)),
        ],
        5,
    );
    let p1 = add_player(&mut engine, "player_1", 100.0);
    let p2 = add_player(&mut engine, "player_2", 100.0);
    let events = record_events(&mut engine);

    engine.begin_bond(&p1, &entity("stone_warden")).unwrap();
    engine.force_break(&p1).unwrap();
    engine.begin_bond(&p2, &entity("blood_oath")).unwrap();

    // The area hit at t=1 covers the first interval on its own
    engine.run(6, DT);

    assert_eq!(count(&events, "compliance_punished"), 0);
    assert_eq!(engine.is_compliant(&p2), Some(true));
}
