//! Action invocation
//!
//! Handlers are async closures over the request [`Context`] and the resolved
//! [`Args`]. Whatever they do, the invoker hands back exactly one
//! `Result<Outcome>`: returned errors and panics (during the call or while
//! the future is polled) are the same failure to the rest of the pipeline.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::metadata::ActionMetadata;
use crate::params::Args;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

/// Settled result of an action
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The action produced nothing
    Undefined,
    /// The action explicitly produced an empty result
    Null,
    Value(Value),
}

impl Outcome {
    pub fn json<T: Serialize>(value: T) -> Result<Self> {
        Ok(Self::from(serde_json::to_value(value)?))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Outcome::Value(Value::String(text.into()))
    }

    /// `None` becomes [`Outcome::Undefined`]
    pub fn from_option<T: Serialize>(value: Option<T>) -> Result<Self> {
        match value {
            Some(value) => Self::json(value),
            None => Ok(Outcome::Undefined),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Outcome::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Outcome::Null)
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Outcome::Null,
            value => Outcome::Value(value),
        }
    }
}

pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<Outcome>> + Send + 'a>>;

/// Bound action method
pub type ActionHandler = Arc<dyn for<'a> Fn(&'a mut Context, Args) -> ActionFuture<'a> + Send + Sync>;

pub struct ActionInvoker;

impl ActionInvoker {
    pub async fn invoke(action: &ActionMetadata, ctx: &mut Context, args: Args) -> Result<Outcome> {
        log::debug!("Invoking {} with {} argument(s)", action.full_name(), args.len());

        let handler = &action.handler;
        let future = match std::panic::catch_unwind(AssertUnwindSafe(move || handler(ctx, args))) {
            Ok(future) => future,
            Err(panic) => return Err(panicked(action, panic)),
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(panicked(action, panic)),
        }
    }
}

fn panicked(action: &ActionMetadata, panic: Box<dyn Any + Send>) -> Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    Error::internal(format!("Action {} panicked: {}", action.full_name(), message))
}

/// Pin the signature of a handler closure
///
/// Closures passed here get their higher-ranked signature inferred, which
/// lets `|ctx, args| Box::pin(async move { .. })` type-check.
pub fn action<F>(handler: F) -> F
where
    F: for<'a> Fn(&'a mut Context, Args) -> ActionFuture<'a> + Send + Sync + 'static,
{
    handler
}

/// Wrap an async fn into an action handler
///
/// ```rust,ignore
/// async fn get_photo(ctx: &mut Context, args: Args) -> Result<Outcome> { ... }
///
/// ActionBuilder::get("get_photo", "/photos/:id", handler!(get_photo))
/// ```
#[macro_export]
macro_rules! handler {
    ($func:path) => {
        $crate::invoker::action(|ctx, args| Box::pin($func(ctx, args)))
    };
}
