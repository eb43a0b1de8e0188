//! Middleware and interceptor traits
//!
//! A middleware runs either before or after the action, depending on the
//! phase it was registered with. Interceptors sit between the action and
//! the response resolver and may replace the action's outcome.

use crate::context::Context;
use crate::error::Result;
use crate::invoker::Outcome;
use async_trait::async_trait;

/// What the pipeline does after a middleware ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiddlewareAction {
    /// Continue to the next middleware in the chain
    Continue,

    /// Stop the chain and use the response set on context
    Stop,
}

/// A request middleware
///
/// Before-phase middlewares may short-circuit the request by setting a
/// response with [`Context::set_response`] and returning
/// [`MiddlewareAction::Stop`]; stopping without one is a server error.
/// After-phase middlewares see the final response through
/// [`Context::get_response`] and may modify it via [`Context::response_mut`].
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: &mut Context) -> Result<MiddlewareAction>;

    /// Optional: Get the name of this middleware for debugging
    fn name(&self) -> &'static str {
        "unnamed"
    }
}

/// Transforms an action outcome before the response is resolved
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, ctx: &Context, outcome: Outcome) -> Result<Outcome>;

    fn name(&self) -> &'static str {
        "unnamed"
    }
}
