use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::limits::package::PackageId;

/// The observable "blocked package" shared by the monitor and the presentation layer
///
/// Every transition goes through the watch channel's sender lock, so raising is a
/// single check-and-set: a second raise while a block is showing is a no-op no
/// matter which task or thread attempts it.
#[derive(Clone)]
pub struct BlockSignal {
    tx: Arc<watch::Sender<Option<PackageId>>>,
}

impl BlockSignal {
    pub fn new() -> Self {
        Self::with_blocked(None)
    }

    /// A signal starting from a known state, e.g. the one a running monitor reported
    pub fn with_blocked(package: Option<PackageId>) -> Self {
        let (tx, _) = watch::channel(package);
        Self { tx: Arc::new(tx) }
    }

    /// Raise a block for `package` unless one is already active
    ///
    /// Returns true if this call raised it.
    pub fn try_raise(&self, package: &PackageId) -> bool {
        let raised = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(package.clone());
            true
        });

        if raised {
            info!("Blocking {}", package);
        }
        raised
    }

    /// Clear the block, returning the package that was blocked
    pub fn clear(&self) -> Option<PackageId> {
        let mut cleared = None;
        self.tx.send_if_modified(|current| {
            cleared = current.take();
            cleared.is_some()
        });

        if let Some(package) = &cleared {
            info!("Block cleared for {}", package);
        }
        cleared
    }

    pub fn blocked_package(&self) -> Option<PackageId> {
        self.tx.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PackageId>> {
        self.tx.subscribe()
    }
}

impl Default for BlockSignal {
    fn default() -> Self {
        Self::new()
    }
}
