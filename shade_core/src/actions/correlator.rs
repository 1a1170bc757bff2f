use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use super::parser::PressType;
use super::registry::ActionRegistry;
use crate::config::CorrelatorCfg;

/// Whether an event came from the action table or was guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribution {
    Resolved,
    Heuristic,
}

impl Attribution {
    pub const fn name(self) -> &'static str {
        match self {
            Attribution::Resolved => "resolved",
            Attribution::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for Attribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An observed bus command attributed to a physical input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub input_number: u8,
    pub press_type: PressType,
    pub attribution: Attribution,
    pub endpoint: u8,
    pub cluster_id: u16,
    pub command_id: u8,
    pub payload: Vec<u8>,
}

impl InputEvent {
    pub fn is_resolved(&self) -> bool {
        self.attribution == Attribution::Resolved
    }
}

/// Turns observed bus commands into [`InputEvent`]s on a bounded channel.
///
/// `on_observed_command` never blocks: when the consumer falls behind or has
/// gone away, the event is dropped and counted.
#[derive(Debug)]
pub struct InputCorrelator {
    registry: Arc<ActionRegistry>,
    first_endpoint: u8,
    tx: Sender<InputEvent>,
    dropped: AtomicU64,
}

impl InputCorrelator {
    pub fn new(registry: Arc<ActionRegistry>, cfg: &CorrelatorCfg) -> (Self, Receiver<InputEvent>) {
        let (tx, rx) = bounded(cfg.channel_capacity.max(1));
        let correlator = Self {
            registry,
            first_endpoint: cfg.first_endpoint,
            tx,
            dropped: AtomicU64::new(0),
        };
        (correlator, rx)
    }

    /// Attribute one observed command and emit the event. Returns the event
    /// that was attempted, whether or not it could be delivered.
    pub fn on_observed_command(
        &self,
        endpoint: u8,
        cluster_id: u16,
        command_id: u8,
        payload: &[u8],
    ) -> InputEvent {
        let event = self.attribute(endpoint, cluster_id, command_id, payload);
        match self.tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(endpoint, input = event.input_number, "input event channel full; event dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(endpoint, input = event.input_number, "input event consumer gone; event dropped");
            }
        }
        event
    }

    /// Resolve without emitting.
    pub fn attribute(
        &self,
        endpoint: u8,
        cluster_id: u16,
        command_id: u8,
        payload: &[u8],
    ) -> InputEvent {
        let (input_number, press_type, attribution) =
            match self.registry.lookup(endpoint, cluster_id, command_id, payload) {
                Some(action) => (action.input_number, action.press_type, Attribution::Resolved),
                None => {
                    let guess = endpoint.saturating_sub(self.first_endpoint);
                    tracing::debug!(
                        endpoint,
                        cluster_id,
                        command_id,
                        input = guess,
                        "no action-table match; using endpoint heuristic"
                    );
                    (guess, PressType::Pressed, Attribution::Heuristic)
                }
            };
        InputEvent {
            input_number,
            press_type,
            attribution,
            endpoint,
            cluster_id,
            command_id,
            payload: payload.to_vec(),
        }
    }

    /// Events dropped because the channel was full or closed.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
