//! Positioning provider seam
//!
//! A provider pushes position samples and availability changes on its own
//! schedule. The engine only starts and stops it and consumes the stream.

use crate::error::{LootError, Result};
use crate::geo::Position;
use futures::channel::mpsc::{self, UnboundedSender};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;

/// One update from the positioning provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationUpdate {
    Sample(Position),
    /// Permission or signal was lost (`false`) or regained (`true`)
    Availability(bool),
}

/// Stream of provider updates
pub type LocationStream = BoxStream<'static, LocationUpdate>;

/// Source of position samples
pub trait LocationProvider: Send + Sync {
    /// Begin delivering updates
    fn start(&self) -> Result<LocationStream>;

    /// Stop delivering; the stream returned by `start` ends
    fn stop(&self);

    fn is_running(&self) -> bool;
}

/// Provider fed by hand, for tests, demos and replaying recorded walks
#[derive(Debug, Default)]
pub struct ManualLocationProvider {
    tx: Mutex<Option<UnboundedSender<LocationUpdate>>>,
    denied: bool,
}

impl ManualLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose permission was refused; `start` fails
    pub fn denied() -> Self {
        Self {
            tx: Mutex::new(None),
            denied: true,
        }
    }

    /// Deliver a sample; `false` if the provider is not running
    pub fn push(&self, position: Position) -> bool {
        self.send(LocationUpdate::Sample(position))
    }

    /// Deliver an availability change; `false` if the provider is not running
    pub fn set_available(&self, available: bool) -> bool {
        self.send(LocationUpdate::Availability(available))
    }

    fn send(&self, update: LocationUpdate) -> bool {
        self.tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.unbounded_send(update).is_ok())
    }
}

impl LocationProvider for ManualLocationProvider {
    fn start(&self) -> Result<LocationStream> {
        if self.denied {
            return Err(LootError::Provider("location permission denied".into()));
        }

        let (tx, rx) = mpsc::unbounded();
        if self.tx.lock().replace(tx).is_some() {
            log::warn!("Location provider restarted; previous stream closed");
        }
        Ok(rx.boxed())
    }

    fn stop(&self) {
        self.tx.lock().take();
    }

    fn is_running(&self) -> bool {
        self.tx.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_updates_flow_until_stop() {
        let provider = ManualLocationProvider::new();
        assert!(!provider.push(Position::new(0.0, 0.0)));

        let mut updates = provider.start().unwrap();
        assert!(provider.is_running());
        assert!(provider.push(Position::new(1.0, 1.0)));
        assert!(provider.set_available(false));
        provider.stop();

        let collected: Vec<LocationUpdate> = block_on(updates.by_ref().collect());
        assert_eq!(collected.len(), 2);
        assert!(matches!(collected[0], LocationUpdate::Sample(p) if p.latitude == 1.0));
        assert_eq!(collected[1], LocationUpdate::Availability(false));
        assert!(!provider.is_running());
    }

    #[test]
    fn test_denied_provider_fails_to_start() {
        let provider = ManualLocationProvider::denied();
        assert!(matches!(provider.start(), Err(LootError::Provider(_))));
    }
}
