// ── Change subscriptions ──
//
// Consumer-side handles for item change notifications: a pull-style
// subscription (also usable as a `Stream`) and a callback observer running
// on its own task. Both are cancellable and end when the engine shuts down.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::warn;

use crate::model::ChangeEvent;

/// A subscription to item change events.
///
/// Dropping it or calling [`cancel`](Self::cancel) unsubscribes. A
/// consumer that falls far behind skips the events it missed.
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<Arc<ChangeEvent>>,
    cancel: CancellationToken,
}

impl ChangeSubscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Arc<ChangeEvent>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { receiver, cancel }
    }

    /// Wait for the next change. Returns `None` once cancelled or when
    /// the engine is gone.
    pub async fn recv(&mut self) -> Option<Arc<ChangeEvent>> {
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                msg = self.receiver.recv() => match msg {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "change subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Stop receiving. Pending and future `recv` calls return `None`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> ChangeStream {
        ChangeStream {
            inner: BroadcastStream::new(self.receiver),
            cancelled: Box::pin(self.cancel.cancelled_owned()),
        }
    }
}

/// `Stream` adapter over a [`ChangeSubscription`].
///
/// Ends when the subscription is cancelled or the engine shuts down.
pub struct ChangeStream {
    inner: BroadcastStream<Arc<ChangeEvent>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl Stream for ChangeStream {
    type Item = Arc<ChangeEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(n)))) => {
                    warn!(skipped = n, "change stream lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// ── Observers ────────────────────────────────────────────────────────

/// Callback interface for change notifications.
///
/// Implemented for any `FnMut(&ChangeEvent)`.
pub trait ChangeObserver: Send + 'static {
    fn on_change(&mut self, event: &ChangeEvent);
}

impl<F> ChangeObserver for F
where
    F: FnMut(&ChangeEvent) + Send + 'static,
{
    fn on_change(&mut self, event: &ChangeEvent) {
        self(event);
    }
}

/// Handle to a registered observer. Dropping it cancels the observer.
pub struct ObserverHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ObserverHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the observer and wait for its task to exit.
    pub async fn join(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "observer task ended abnormally");
            }
        }
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Drive `observer` from `subscription` on a new task.
pub(crate) fn spawn_observer<O: ChangeObserver>(
    mut subscription: ChangeSubscription,
    mut observer: O,
) -> ObserverHandle {
    let cancel = subscription.cancel.clone();
    let task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            observer.on_change(&event);
        }
    });

    ObserverHandle {
        cancel,
        task: Some(task),
    }
}
