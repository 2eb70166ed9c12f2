// Copyright 2024, The Murmur Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! A cloneable shutdown signal.
//!
//! A [`Shutdown`] owner hands out any number of [`ShutdownSignal`]s; triggering the
//! owner resolves every signal, once, forever. Signals are futures and can be used
//! directly inside `tokio::select!`.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use futures::{
    channel::oneshot,
    future::{FusedFuture, Shared},
    FutureExt,
};

/// Trigger for shutdowns.
///
/// Use `to_signal` to create a future which will resolve when `Shutdown` is triggered.
/// Use `trigger` to signal. All signals will resolve.
///
/// _Note_: This will trigger when every clone has been dropped, so a `Shutdown` instance
/// should be held as long as required by the application.
#[derive(Clone, Debug)]
pub struct Shutdown {
    trigger: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    signal: ShutdownSignal,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: ShutdownSignal {
                inner: rx.shared(),
            },
        }
    }

    /// Trigger the shutdown. Idempotent: subsequent calls have no effect.
    pub fn trigger(&mut self) {
        let mut lock = self.trigger.lock().expect("shutdown trigger lock poisoned");
        if let Some(tx) = lock.take() {
            // The signal resolves on either a send or a disconnect, so the result can
            // be ignored here.
            let _result = tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.trigger
            .lock()
            .expect("shutdown trigger lock poisoned")
            .is_none()
    }

    pub fn to_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver end of a shutdown signal. Once resolved the consumer should shut down.
#[derive(Debug, Clone)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct ShutdownSignal {
    inner: Shared<oneshot::Receiver<()>>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        self.inner.is_terminated() || self.inner.peek().is_some()
    }

    /// Wait for the shutdown signal to trigger.
    pub fn wait(&mut self) -> &mut Self {
        self
    }
}

impl Future for ShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.inner.is_terminated() {
            return Poll::Ready(());
        }

        match Pin::new(&mut self.inner).poll(cx) {
            // Whether `trigger()` was called (Ok) or the Shutdown dropped (Err), the
            // signal must resolve.
            Poll::Ready(_) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl FusedFuture for ShutdownSignal {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

#[cfg(test)]
mod test {
    use tokio::task;

    use super::*;

    #[tokio::test]
    async fn trigger() {
        let mut shutdown = Shutdown::new();
        let signal = shutdown.to_signal();
        assert!(!shutdown.is_triggered());
        let fut = task::spawn(async move {
            signal.await;
        });
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        // Shutdown::trigger is idempotent
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        fut.await.unwrap();
    }

    #[tokio::test]
    async fn signal_clone() {
        let mut shutdown = Shutdown::new();
        let signal = shutdown.to_signal();
        let signal_clone = signal.clone();
        let fut = task::spawn(async move {
            signal_clone.await;
            signal.await;
        });
        shutdown.trigger();
        fut.await.unwrap();
    }

    #[tokio::test]
    async fn drop_trigger() {
        let shutdown = Shutdown::new();
        let signal = shutdown.to_signal();
        let signal_clone = signal.clone();
        let fut = task::spawn(async move {
            signal_clone.await;
            signal.await;
        });
        drop(shutdown);
        fut.await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_the_trigger() {
        let mut shutdown = Shutdown::new();
        let clone = shutdown.clone();
        let signal = clone.to_signal();
        shutdown.trigger();
        assert!(clone.is_triggered());
        signal.await;
    }
}
