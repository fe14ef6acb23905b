//! Events flowing from managed processes to the supervisor.

use std::sync::mpsc::Sender;

use chrono::{DateTime, Local};

use crate::colour::Colour;
use crate::signal::ShutdownSignal;

/// What happened to a managed process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// The OS process was spawned.
    Started { pid: u32 },
    /// One line of combined stdout/stderr, newline included, exactly as read.
    Line(Vec<u8>),
    /// The process exited. Signal deaths are reported as the negated signal number.
    Stopped { code: i32 },
    /// The process could not be spawned at all. No `Started` precedes this.
    SpawnFailed { error: String },
}

/// An immutable message from one managed process.
#[derive(Clone, Debug)]
pub struct Event {
    pub name: String,
    pub colour: Option<Colour>,
    pub time: DateTime<Local>,
    pub kind: EventKind,
}

impl Event {
    /// Creates an event stamped with the current wall-clock time.
    pub fn new(name: impl Into<String>, colour: Option<Colour>, kind: EventKind) -> Self {
        Self {
            name: name.into(),
            colour,
            time: Local::now(),
            kind,
        }
    }
}

/// Requests the supervisor acts on, delivered through the same queue as events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// A shutdown signal reached the supervisor.
    Signal(ShutdownSignal),
    /// The grace window elapsed.
    Escalate,
}

/// Everything the supervisor's queue carries.
#[derive(Debug)]
pub enum Envelope {
    Event(Event),
    Control(Control),
}

/// Where a child process wrapper delivers its events.
///
/// Returns `false` once nobody is listening anymore.
pub trait EventSink: Send {
    fn emit(&self, event: Event) -> bool;
}

impl EventSink for Sender<Envelope> {
    fn emit(&self, event: Event) -> bool {
        self.send(Envelope::Event(event)).is_ok()
    }
}

impl EventSink for Sender<Event> {
    fn emit(&self, event: Event) -> bool {
        self.send(event).is_ok()
    }
}
