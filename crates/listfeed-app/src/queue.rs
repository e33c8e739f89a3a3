//! Cross-task apply requests
//!
//! The reconciler lives on one task. Other tasks that want a snapshot shown
//! send it through an [`ApplySender`]; the owning task drains the
//! [`ApplyQueue`] and answers each request on its own oneshot channel.
//! Requests are handled strictly in the order they were sent.

use listfeed_core::{FeedError, ItemKey, Result, SectionKey, Snapshot};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::reconciler::{ApplyReport, ListReconciler};
use crate::view::ListView;

/// Pending requests before senders wait.
pub const APPLY_QUEUE_CAPACITY: usize = 64;

struct ApplyRequest<S, I> {
    snapshot: Snapshot<S, I>,
    animated: bool,
    reply: oneshot::Sender<Result<ApplyReport>>,
}

/// Submits snapshots to the task owning a reconciler.
pub struct ApplySender<S, I> {
    tx: mpsc::Sender<ApplyRequest<S, I>>,
}

impl<S, I> Clone for ApplySender<S, I> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Receiving half, drained by the reconciler's owner.
pub struct ApplyQueue<S, I> {
    rx: mpsc::Receiver<ApplyRequest<S, I>>,
}

/// Create a connected sender/queue pair.
pub fn apply_queue<S, I>() -> (ApplySender<S, I>, ApplyQueue<S, I>) {
    let (tx, rx) = mpsc::channel(APPLY_QUEUE_CAPACITY);
    (ApplySender { tx }, ApplyQueue { rx })
}

impl<S: SectionKey, I: ItemKey> ApplySender<S, I> {
    /// Queue a snapshot and wait for the owner's answer.
    pub async fn apply(&self, snapshot: Snapshot<S, I>, animated: bool) -> Result<ApplyReport> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(ApplyRequest {
                snapshot,
                animated,
                reply,
            })
            .await
            .map_err(|_| FeedError::internal("reconciler owner is gone"))?;
        answer
            .await
            .map_err(|_| FeedError::internal("reconciler owner dropped the request"))?
    }
}

impl<S: SectionKey, I: ItemKey> ApplyQueue<S, I> {
    /// Handle every request already queued. Returns how many were handled.
    pub fn drain<V: ListView<S, I>>(&mut self, reconciler: &mut ListReconciler<S, I, V>) -> usize {
        let mut handled = 0;
        while let Ok(request) = self.rx.try_recv() {
            Self::handle(request, reconciler);
            handled += 1;
        }
        handled
    }

    /// Handle requests until every sender is dropped.
    pub async fn run<V: ListView<S, I>>(mut self, reconciler: &mut ListReconciler<S, I, V>) {
        while let Some(request) = self.rx.recv().await {
            Self::handle(request, reconciler);
        }
        debug!("apply queue closed");
    }

    fn handle<V: ListView<S, I>>(request: ApplyRequest<S, I>, reconciler: &mut ListReconciler<S, I, V>) {
        let result = reconciler.apply(request.snapshot, request.animated);
        // The requester may have stopped waiting; the apply still happened.
        let _ = request.reply.send(result);
    }
}
