//! Start/stop hook pairs bound to a capability instance.

use futures_util::future::BoxFuture;
use std::future::Future;

use crate::composition::BoxError;

pub type HookFuture = BoxFuture<'static, Result<(), BoxError>>;

pub(crate) type HookFn = Box<dyn FnOnce() -> HookFuture + Send>;

/// Optional start and stop functions for one capability.
///
/// A hook without a start function is treated as started as soon as its
/// turn comes, so its stop function still runs on teardown.
#[derive(Default)]
pub struct Hook {
    start: Option<HookFn>,
    stop: Option<HookFn>,
}

impl Hook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs after construction. Must return promptly; spawn long work instead.
    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.start = Some(Box::new(move || -> HookFuture { Box::pin(f()) }));
        self
    }

    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.stop = Some(Box::new(move || -> HookFuture { Box::pin(f()) }));
        self
    }

    pub(crate) fn into_parts(self) -> (Option<HookFn>, Option<HookFn>) {
        (self.start, self.stop)
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("start", &self.start.is_some())
            .field("stop", &self.stop.is_some())
            .finish()
    }
}
