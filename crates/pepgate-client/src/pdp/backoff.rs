//! Degraded decision stream used while the PDP is unreachable.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use tokio::sync::mpsc;

use pepgate_core::error::Result;
use pepgate_core::Decision;

use super::framing::frames;

const INDETERMINATE: &[u8] = b"{\"decision\":\"INDETERMINATE\"}\n";

/// Newline-delimited decision messages.
///
/// The first poll yields one synthetic `INDETERMINATE` decision. After that
/// it forwards whatever bodies get attached through its [`BackoffEmitter`],
/// dropping a decision equal to the one forwarded just before it.
#[derive(Debug)]
pub struct ExponentialBackoffStream {
    rx: mpsc::UnboundedReceiver<Bytes>,
    pushed_indeterminate: bool,
}

/// Producer side of an [`ExponentialBackoffStream`].
#[derive(Debug, Clone)]
pub struct BackoffEmitter {
    tx: mpsc::UnboundedSender<Bytes>,
    last: Arc<Mutex<Option<Decision>>>,
}

/// New degraded stream and its emitter.
pub fn channel() -> (BackoffEmitter, ExponentialBackoffStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let emitter = BackoffEmitter {
        tx,
        last: Arc::new(Mutex::new(None)),
    };
    let stream = ExponentialBackoffStream {
        rx,
        pushed_indeterminate: false,
    };
    (emitter, stream)
}

impl Stream for ExponentialBackoffStream {
    type Item = Bytes;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        let this = self.get_mut();
        if !this.pushed_indeterminate {
            this.pushed_indeterminate = true;
            return Poll::Ready(Some(Bytes::from_static(INDETERMINATE)));
        }
        this.rx.poll_recv(cx)
    }
}

impl BackoffEmitter {
    /// Forward decisions of `body` into the stream on a spawned task.
    pub fn emit_decision_stream<S>(&self, body: S)
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        let emitter = self.clone();
        tokio::spawn(async move { emitter.forward(body).await });
    }

    /// True once the stream side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn forward<S>(self, body: S)
    where
        S: Stream<Item = Result<Bytes>>,
    {
        let mut messages = Box::pin(frames(body));
        while let Some(msg) = messages.next().await {
            let Ok(decision) = Decision::from_slice(&msg) else {
                continue;
            };
            if !self.changed(decision) {
                continue;
            }
            let mut line = msg.to_vec();
            line.push(b'\n');
            if self.tx.send(Bytes::from(line)).is_err() {
                break;
            }
        }
    }

    fn changed(&self, decision: Decision) -> bool {
        let Ok(mut last) = self.last.lock() else {
            return false;
        };
        if last.as_ref() == Some(&decision) {
            return false;
        }
        *last = Some(decision);
        true
    }
}
