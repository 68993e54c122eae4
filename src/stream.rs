use std::future::Future;

use anyhow::Result;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::tui::AppEvent;

/// Handle to the background task bridging one assistant reply stream into
/// the UI event queue.
///
/// The task only enqueues events; all transcript state lives with the
/// single-threaded consumer. Deltas are forwarded in arrival order, the
/// stream ends with exactly one `StreamComplete` (or one `StreamError`),
/// and nothing is forwarded once the token is cancelled.
pub struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Spawn a bridge. `connect` resolves to the provider's delta stream so
    /// that connection setup happens off the event loop; a connect failure
    /// surfaces as a `StreamError` event.
    pub fn spawn<F, S>(
        connect: F,
        events: UnboundedSender<AppEvent>,
        cancel: CancellationToken,
    ) -> Self
    where
        F: Future<Output = Result<S>> + Send + 'static,
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let deltas = tokio::select! {
                _ = token.cancelled() => {
                    debug!("reply stream cancelled before connecting");
                    return;
                }
                connected = connect => match connected {
                    Ok(deltas) => deltas,
                    Err(err) => {
                        let _ = events.send(AppEvent::StreamError(err.to_string()));
                        return;
                    }
                },
            };

            let mut deltas = std::pin::pin!(deltas);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("reply stream cancelled");
                        return;
                    }
                    next = deltas.next() => match next {
                        Some(Ok(chunk)) => {
                            if events.send(AppEvent::StreamDelta(chunk)).is_err() {
                                return;
                            }
                        }
                        Some(Err(err)) => {
                            let _ = events.send(AppEvent::StreamError(err.to_string()));
                            return;
                        }
                        None => {
                            let _ = events.send(AppEvent::StreamComplete);
                            return;
                        }
                    },
                }
            }
        });

        Self { cancel, task }
    }

    /// Request that the bridge stop forwarding.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the task to exit; after this returns no further
    /// event from this bridge exists in the queue or ever will.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
