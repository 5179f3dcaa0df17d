//! Timers used to bound how long a single image decode may suspend

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use futures::future::{self, Either, FutureExt, LocalBoxFuture};

use crate::error::ChecklistError;

/// Source of sleep futures for the host's event loop
pub trait Timer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Timer that never fires
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTimer;

impl Timer for NoTimer {
    fn sleep(&self, _duration: Duration) -> LocalBoxFuture<'static, ()> {
        future::pending().boxed_local()
    }
}

#[cfg(feature = "native")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[cfg(feature = "native")]
impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed_local()
    }
}

/// Await `fut`, giving up with [`ChecklistError::DecodeTimeout`] once `limit`
/// has elapsed. `None` waits indefinitely.
pub async fn with_timeout<F: Future>(
    timer: &dyn Timer,
    limit: Option<Duration>,
    fut: F,
) -> Result<F::Output, ChecklistError> {
    let Some(limit) = limit else {
        return Ok(fut.await);
    };

    let fut = pin!(fut);
    match future::select(fut, timer.sleep(limit)).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(ChecklistError::DecodeTimeout(limit.as_millis() as u64)),
    }
}
