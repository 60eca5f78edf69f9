//! Control events delivered to the crawl driver's inbox

use crate::dispatcher::ExchangeOutcome;
use crate::frontier::{RenderOutput, RenderUnit, Target};
use crate::scope::ScopeFilter;
use crate::Result;
use tokio::sync::mpsc::UnboundedSender;

/// A message for the crawl driver
///
/// Every cross-component notification goes through the driver's single
/// inbox and is handled in arrival order.
#[derive(Debug)]
pub enum DriverEvent {
    /// Begin dispatching frontier work
    Start,
    /// Stop dispatching and rendering; in-flight work still finishes
    Stop,
    /// An exchange the driver enqueued has finished
    ResponseArrived(ExchangeOutcome),
    /// Spider analysis of a stored response produced these targets
    SpiderFinished { response_id: i64, targets: Vec<Target> },
    /// A render slot may be fillable
    RenderUnitAvailable,
    /// The renderer returned for a unit
    RenderFinished {
        unit: RenderUnit,
        output: Result<RenderOutput>,
    },
    /// Work was added to the frontier from outside the driver
    FrontierChanged,
    /// Replace the scope rule set
    ScopeChanged(ScopeFilter),
}

impl DriverEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            DriverEvent::Start => "start",
            DriverEvent::Stop => "stop",
            DriverEvent::ResponseArrived(_) => "response-arrived",
            DriverEvent::SpiderFinished { .. } => "spider-finished",
            DriverEvent::RenderUnitAvailable => "render-unit-available",
            DriverEvent::RenderFinished { .. } => "render-finished",
            DriverEvent::FrontierChanged => "frontier-changed",
            DriverEvent::ScopeChanged(_) => "scope-changed",
        }
    }
}

/// Sends control events to a running driver
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: UnboundedSender<DriverEvent>,
}

impl DriverHandle {
    pub(crate) fn new(tx: UnboundedSender<DriverEvent>) -> Self {
        Self { tx }
    }

    /// Delivers an event; returns false once the driver has finished
    pub fn send(&self, event: DriverEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn stop(&self) -> bool {
        self.send(DriverEvent::Stop)
    }

    pub fn set_scope(&self, filter: ScopeFilter) -> bool {
        self.send(DriverEvent::ScopeChanged(filter))
    }

    pub fn frontier_changed(&self) -> bool {
        self.send(DriverEvent::FrontierChanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_handle_delivers_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = DriverHandle::new(tx);

        assert!(handle.frontier_changed());
        assert!(handle.set_scope(ScopeFilter::default()));
        assert!(handle.stop());

        let names: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.name())
            .collect();
        assert_eq!(names, vec!["frontier-changed", "scope-changed", "stop"]);
    }

    #[test]
    fn test_send_fails_after_driver_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = DriverHandle::new(tx);
        drop(rx);
        assert!(!handle.stop());
    }
}
