//! Event Queue
//!
//! Events raised during a tick (or by a command between ticks) are queued in
//! emission order and dispatched synchronously to every observer at the end of
//! the tick. Observers are called in subscription order. An optional JSONL log
//! receives every dispatched envelope.

use bevy_ecs::prelude::*;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bond_events::{BondEvent, EngineTimestamp, EventEnvelope};

/// Observer callback.
pub type EventObserver = Box<dyn FnMut(&EventEnvelope) + Send + Sync>;

/// Handle returned by [`EventQueue::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// JSONL file that receives every dispatched envelope, one per line.
pub struct EventLog {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl EventLog {
    /// Creates the file, replacing any previous run's log.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Reads a log back into envelopes. Blank lines are skipped.
    pub fn read(path: impl AsRef<Path>) -> io::Result<Vec<EventEnvelope>> {
        let reader = BufReader::new(File::open(path)?);
        let mut envelopes = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let envelope = EventEnvelope::from_jsonl(&line).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, format!("line {}: {}", index + 1, e))
            })?;
            envelopes.push(envelope);
        }
        Ok(envelopes)
    }

    pub fn append(&mut self, envelope: &EventEnvelope) -> io::Result<()> {
        let line = envelope.to_jsonl()?;
        writeln!(self.writer, "{}", line)?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Envelopes appended since the file was created.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes and closes the file, returning its path.
    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("path", &self.path)
            .field("written", &self.written)
            .finish()
    }
}

/// Resource: Pending events and registered observers
#[derive(Resource, Default)]
pub struct EventQueue {
    pending: Vec<EventEnvelope>,
    observers: Vec<(SubscriptionId, EventObserver)>,
    log: Option<EventLog>,
    next_sequence: u64,
    next_subscription: u64,
    dispatched: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an event stamped with the time of the tick that raised it.
    pub fn push(&mut self, timestamp: EngineTimestamp, event: BondEvent) {
        self.next_sequence += 1;
        self.pending
            .push(EventEnvelope::new(self.next_sequence, timestamp, event));
    }

    pub fn extend(&mut self, timestamp: EngineTimestamp, events: impl IntoIterator<Item = BondEvent>) {
        for event in events {
            self.push(timestamp, event);
        }
    }

    /// Registers an observer. It sees every event dispatched from now on.
    pub fn subscribe(&mut self, observer: impl FnMut(&EventEnvelope) + Send + Sync + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Removes an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    pub fn attach_log(&mut self, log: EventLog) {
        self.log = Some(log);
    }

    pub fn detach_log(&mut self) -> Option<EventLog> {
        self.log.take()
    }

    pub fn pending(&self) -> &[EventEnvelope] {
        &self.pending
    }

    /// Total number of events dispatched so far.
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Delivers all pending events in emission order. Returns how many were sent.
    pub fn dispatch(&mut self) -> usize {
        let batch = std::mem::take(&mut self.pending);
        for envelope in &batch {
            if let Some(log) = self.log.as_mut() {
                if let Err(e) = log.append(envelope) {
                    tracing::warn!("Failed to log event {}: {}", envelope.event_id, e);
                }
            }
            for (_, observer) in self.observers.iter_mut() {
                observer(envelope);
            }
        }
        if !batch.is_empty() {
            if let Some(log) = self.log.as_mut() {
                if let Err(e) = log.flush() {
                    tracing::warn!("Failed to flush event log {}: {}", log.path().display(), e);
                }
            }
        }
        self.dispatched += batch.len() as u64;
        batch.len()
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.pending.len())
            .field("observers", &self.observers.len())
            .field("dispatched", &self.dispatched)
            .finish()
    }
}
