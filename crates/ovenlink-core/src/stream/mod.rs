// ── Reactive projection stream ──
//
// Subscription type for consuming projection changes from the
// ApplianceStore.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::Projection;

/// A subscription to the appliance projection.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed`](Self::changed) or by converting to a
/// `Stream`.
pub struct ProjectionStream {
    current: Arc<Projection>,
    receiver: watch::Receiver<Arc<Projection>>,
}

impl ProjectionStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Projection>>) -> Self {
        let current = Arc::clone(&receiver.borrow());
        Self { current, receiver }
    }

    /// Snapshot captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &Arc<Projection> {
        &self.current
    }

    /// Latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Arc<Projection> {
        Arc::clone(&self.receiver.borrow())
    }

    /// Wait for the next change. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Arc<Projection>> {
        self.receiver.changed().await.ok()?;
        let snap = Arc::clone(&self.receiver.borrow_and_update());
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    pub fn into_stream(self) -> ProjectionWatchStream {
        ProjectionWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a new projection each time it changes.
pub struct ProjectionWatchStream {
    inner: WatchStream<Arc<Projection>>,
}

impl Stream for ProjectionWatchStream {
    type Item = Arc<Projection>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use ovenlink_api::protocol::WireDevice;

    use crate::store::ApplianceStore;

    #[tokio::test]
    async fn changed_yields_new_snapshot() {
        let store = ApplianceStore::new();
        let mut stream = store.subscribe();
        assert!(stream.current().appliances.is_empty());

        store.apply_device_list(&[WireDevice {
            cooker_id: "a".into(),
            name: "Kitchen".into(),
            paired_at: Utc::now(),
            kind: "oven_v2".into(),
        }]);

        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.appliances.len(), 1);
        assert_eq!(stream.current().appliances.len(), 1);
    }
}
