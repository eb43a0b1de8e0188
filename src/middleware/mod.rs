//! Middleware chains
//!
//! Global before-middlewares run for every request, matched or not, ordered
//! by descending priority. Global after-middlewares run last, ordered by
//! ascending priority. Middlewares used by a controller or action wrap only
//! that action, in declaration order.
//!
//! # Example
//!
//! ```rust,ignore
//! use rustf_controllers::prelude::*;
//!
//! struct RequestId;
//!
//! #[async_trait]
//! impl Middleware for RequestId {
//!     async fn handle(&self, ctx: &mut Context) -> Result<MiddlewareAction> {
//!         ctx.add_header("X-Request-ID", uuid::Uuid::new_v4().to_string());
//!         Ok(MiddlewareAction::Continue)
//!     }
//! }
//! ```

pub mod traits;

pub use traits::{Interceptor, Middleware, MiddlewareAction};

use crate::context::Context;
use crate::error::{Error, ErrorContext, Result};
use crate::http::Response;
use crate::invoker::Outcome;
use std::sync::Arc;

/// Run before-phase middlewares in order
///
/// Returns the short-circuit response when one of them stopped the chain.
pub(crate) async fn run_before(
    chain: &[Arc<dyn Middleware>],
    ctx: &mut Context,
) -> Result<Option<Response>> {
    for middleware in chain {
        let action = middleware
            .handle(ctx)
            .await
            .with_context(|| format!("Middleware '{}' failed", middleware.name()))?;

        if action == MiddlewareAction::Stop {
            log::debug!("Middleware '{}' stopped the request", middleware.name());
            let response = if ctx.has_response() { ctx.take_response() } else { None };
            return response.map(Some).ok_or_else(|| {
                Error::internal(format!(
                    "Middleware '{}' stopped without setting a response",
                    middleware.name()
                ))
            });
        }
    }

    Ok(None)
}

/// Run after-phase middlewares in order; `Stop` ends the chain early
pub(crate) async fn run_after(chain: &[Arc<dyn Middleware>], ctx: &mut Context) -> Result<()> {
    for middleware in chain {
        let action = middleware
            .handle(ctx)
            .await
            .with_context(|| format!("Middleware '{}' failed", middleware.name()))?;

        if action == MiddlewareAction::Stop {
            break;
        }
    }

    Ok(())
}

pub(crate) async fn run_interceptors(
    chain: &[Arc<dyn Interceptor>],
    ctx: &Context,
    mut outcome: Outcome,
) -> Result<Outcome> {
    for interceptor in chain {
        log::debug!("Running interceptor '{}'", interceptor.name());
        outcome = interceptor.intercept(ctx, outcome).await?;
    }
    Ok(outcome)
}
