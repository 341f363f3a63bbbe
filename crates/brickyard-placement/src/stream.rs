// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! The cancellable device-id stream between an allocator and a consumer.
//!
//! An allocator produces candidate device ids lazily; the placement engine
//! consumes them until it has filled a brick set or given up. The stream is
//! an asynchronous relation, not a callback list, and it has three
//! conjoined endpoints:
//!
//! - a bounded **device channel** carrying candidate ids,
//! - a **done signal** owned by the consumer, released on every exit path
//!   (dropping the [`DeviceStream`] releases it, so early returns and error
//!   paths are covered without any explicit bookkeeping),
//! - a **late-error channel** the producer posts to at most once, which the
//!   consumer reads at most once, after observing the device channel closed.
//!
//! The producer suspends when the consumer is slow and terminates promptly
//! once the done signal is released.

use brickyard_core::error::{Error, Result};
use brickyard_core::types::DeviceId;
use tokio::sync::{mpsc, oneshot};

/// Buffered candidates in flight between producer and consumer.
const STREAM_DEPTH: usize = 32;

/// Creates the conjoined endpoints of a device stream.
#[must_use]
pub fn device_channel() -> (DeviceSender, DeviceStream) {
    let (tx, rx) = mpsc::channel(STREAM_DEPTH);
    let (err_tx, err_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();
    (
        DeviceSender { tx, err: Some(err_tx), done: done_rx },
        DeviceStream { rx, errc: Some(err_rx), done: Some(done_tx) },
    )
}

/// Producer half of a device stream.
#[derive(Debug)]
pub struct DeviceSender {
    tx: mpsc::Sender<DeviceId>,
    err: Option<oneshot::Sender<Error>>,
    done: oneshot::Receiver<()>,
}

impl DeviceSender {
    /// Offers the next candidate to the consumer, suspending while the
    /// channel is full.
    ///
    /// Returns `false` once the consumer has released the done signal or
    /// dropped its endpoint; the producer must stop sending.
    pub async fn send(&mut self, device: DeviceId) -> bool {
        tokio::select! {
            res = self.tx.send(device) => res.is_ok(),
            _ = &mut self.done => false,
        }
    }

    /// Posts the deferred error and closes the stream.
    ///
    /// The consumer observes the device channel closing first and picks the
    /// error up from the late-error channel afterwards.
    pub fn fail(mut self, err: Error) {
        if let Some(tx) = self.err.take() {
            let _ = tx.send(err);
        }
    }
}

/// Consumer half of a device stream.
///
/// Dropping the stream releases the done signal, cancelling the producer.
#[derive(Debug)]
pub struct DeviceStream {
    rx: mpsc::Receiver<DeviceId>,
    errc: Option<oneshot::Receiver<Error>>,
    done: Option<oneshot::Sender<()>>,
}

impl DeviceStream {
    /// Pulls the next candidate device id.
    ///
    /// Returns `None` once the producer is exhausted, has failed, or the
    /// stream has been closed. After `None`, [`finish`](Self::finish)
    /// surfaces any deferred producer error.
    pub async fn next(&mut self) -> Option<DeviceId> {
        self.rx.recv().await
    }

    /// Releases the done signal and stops accepting candidates.
    ///
    /// Idempotent: the signal is released exactly once no matter how often
    /// this runs, and `Drop` calls it as well.
    pub fn close(&mut self) {
        self.done.take();
        self.rx.close();
    }

    /// Closes the stream and reads the late-error channel.
    ///
    /// Call after a normal drain. The error is consumed: later calls return
    /// `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns the producer's deferred error, if it posted one.
    pub async fn finish(&mut self) -> Result<()> {
        self.close();
        match self.errc.take() {
            Some(errc) => match errc.await {
                Ok(err) => Err(err),
                Err(_) => Ok(()),
            },
            None => Ok(()),
        }
    }
}

impl Drop for DeviceStream {
    fn drop(&mut self) {
        self.close();
    }
}
