//! Non-blocking event sink (§4.10): decoupled from the core so a no-op
//! sink is always a correct choice, and any future consumer only ever
//! observes, never steers, the search.

use std::sync::mpsc::{Receiver, Sender, TryRecvError};

use serde::Serialize;

/// One observable moment in a solve. Serializable so a sink can forward it
/// to a file, a socket, or nowhere at all.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind")]
pub enum Event {
    WorkerStarted { worker_id: usize },
    DepthAdvanced { worker_id: usize, depth: usize },
    SolutionFound { worker_id: usize },
    Autosaved { path: String, depth: usize },
    ConfigurationStarted { puzzle_name: String },
    ConfigurationFinished { puzzle_name: String, depth: usize },
}

/// Anything that can receive solver events. Implementations must not block
/// the caller; the core never waits on a sink's response.
pub trait MetricsSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// The default sink: discards everything. Every component that takes a
/// `&dyn MetricsSink` must behave identically whether passed this or a
/// real sink.
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn emit(&self, _event: Event) {}
}

/// A channel-backed sink: `emit` only ever pushes to an unbounded channel,
/// so it never blocks the caller even if nothing is draining it.
pub struct ChannelSink {
    sender: Sender<Event>,
}

impl ChannelSink {
    pub fn new() -> (ChannelSink, Receiver<Event>) {
        let (sender, receiver) = std::sync::mpsc::channel();
        (ChannelSink { sender }, receiver)
    }
}

impl MetricsSink for ChannelSink {
    fn emit(&self, event: Event) {
        // Only fails if the receiver was dropped; a departed observer is
        // not the core's problem.
        let _ = self.sender.send(event);
    }
}

/// Drain whatever events are currently buffered without blocking.
pub fn drain(receiver: &Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_any_event() {
        let sink = NoopSink;
        sink.emit(Event::WorkerStarted { worker_id: 0 });
    }

    #[test]
    fn channel_sink_buffers_until_drained() {
        let (sink, receiver) = ChannelSink::new();
        sink.emit(Event::WorkerStarted { worker_id: 1 });
        sink.emit(Event::SolutionFound { worker_id: 1 });
        let events = drain(&receiver);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn events_serialize_to_json() {
        let event = Event::DepthAdvanced { worker_id: 3, depth: 12 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("DepthAdvanced"));
    }
}
