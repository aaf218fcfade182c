//! Completion reporting
//!
//! An installation runs on a dedicated worker thread and reports its outcome
//! through a one-shot channel, so it can be delivered at most once by
//! construction. [`InstallHandle`] is the receiving end: await it from async
//! code, or [`InstallHandle::wait`] from a plain thread. The outcome is
//! produced on the worker but observed on whichever context consumes the
//! handle.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::error;
use crate::installer::{self, InstallOutcome, InstallRequest};

pub use crate::cancel::CancellationToken;

/// Pending outcome of an installation started by [`perform_installation`]
#[derive(Debug)]
pub struct InstallHandle {
    receiver: oneshot::Receiver<InstallOutcome>,
    cancel: CancellationToken,
    target: PathBuf,
}

impl InstallHandle {
    /// Ask the engine to stop; ignored once the commit has started
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Block the current thread until the outcome arrives
    ///
    /// Must not be called from inside an async runtime; await the handle
    /// there instead.
    pub fn wait(self) -> InstallOutcome {
        let target = self.target;
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(worker_lost(&target)))
    }
}

impl Future for InstallHandle {
    type Output = InstallOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(worker_lost(&this.target))))
    }
}

/// The worker went away without sending an outcome, so the state of the
/// target is unknown
fn worker_lost(target: &std::path::Path) -> error::InstallError {
    error!(path = %target.display(), "Install worker exited without reporting an outcome");
    error::fs::unrecoverable(target, "install worker exited without reporting an outcome", None)
}

/// Start an installation on a worker thread
pub fn perform_installation(request: InstallRequest) -> InstallHandle {
    let cancel = request.cancellation_token();
    let target = request.target_path.clone();
    let (sender, receiver) = oneshot::channel();

    let spawned = std::thread::Builder::new()
        .name("updraft-install".to_string())
        .spawn(move || {
            let outcome = installer::run(request);
            if sender.send(outcome).is_err() {
                debug!("Install handle dropped before the outcome was delivered");
            }
        });
    if let Err(e) = spawned {
        // The closure, and with it the sender, is gone; the handle reports it
        error!(error = %e, "Could not start install worker");
    }

    InstallHandle {
        receiver,
        cancel,
        target,
    }
}

/// Start an installation and call `on_complete` with its outcome, exactly once
///
/// Inside a tokio runtime the callback runs as a task on that runtime;
/// otherwise it runs on a helper thread. Returns the token that cancels the
/// installation.
pub fn perform_installation_with<F>(request: InstallRequest, on_complete: F) -> CancellationToken
where
    F: FnOnce(InstallOutcome) + Send + 'static,
{
    let handle = perform_installation(request);
    let cancel = handle.cancellation_token();

    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                on_complete(handle.await);
            });
        }
        Err(_) => {
            debug!("No async runtime; delivering completion from a helper thread");
            deliver_from_thread(handle, on_complete);
        }
    }

    cancel
}

/// Wait for `handle` on a helper thread and pass the outcome to `on_complete`
///
/// If the helper cannot be started the outcome is awaited on the calling
/// thread instead, so the callback still runs exactly once.
fn deliver_from_thread<F>(handle: InstallHandle, on_complete: F)
where
    F: FnOnce(InstallOutcome) + Send + 'static,
{
    let pending = Arc::new(Mutex::new(Some((handle, on_complete))));
    let shared = Arc::clone(&pending);

    let spawned = std::thread::Builder::new()
        .name("updraft-complete".to_string())
        .spawn(move || {
            if let Some((handle, on_complete)) = take_pending(&shared) {
                on_complete(handle.wait());
            }
        });

    if let Err(e) = spawned {
        error!(error = %e, "Could not start completion thread; waiting on the caller");
        if let Some((handle, on_complete)) = take_pending(&pending) {
            on_complete(handle.wait());
        }
    }
}

fn take_pending<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}
