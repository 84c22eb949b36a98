//! Tick handler contract
//!
//! A handler is any `Fn(CancellationToken) -> impl Future<Output =
//! Result<TickResult, TickError>>`. The token is the timer's run scope; it is
//! cancelled when the timer stops, so long-running handlers should select on
//! it.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::TickError;
use super::result::TickResult;
use super::wait::BoxFuture;

pub trait TickHandler: Send + Sync + 'static {
    fn on_tick(
        &self,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<TickResult, TickError>>;
}

impl<F, Fut> TickHandler for F
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TickResult, TickError>> + Send + 'static,
{
    fn on_tick(
        &self,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<TickResult, TickError>> {
        Box::pin(self(cancel))
    }
}

/// Wrap a closure as a shareable tick handler.
///
/// ```ignore
/// let handler = tick_handler(|_cancel| async { Ok(TickResult::CONTINUE) });
/// ```
pub fn tick_handler<F, Fut>(f: F) -> Arc<dyn TickHandler>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TickResult, TickError>> + Send + 'static,
{
    Arc::new(f)
}
