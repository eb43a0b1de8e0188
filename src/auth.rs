//! Authorization gate
//!
//! Actions (or whole controllers) marked `authorized` are checked before any
//! parameter is resolved. The check itself is delegated to an
//! [`AuthorizationChecker`] supplied by the application.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::metadata::ActionMetadata;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Decides whether the current request may run an action requiring `roles`
#[async_trait]
pub trait AuthorizationChecker: Send + Sync {
    async fn check(&self, ctx: &Context, roles: &[String]) -> Result<bool>;
}

/// Resolves the user for `current-user` parameters
#[async_trait]
pub trait CurrentUserChecker: Send + Sync {
    async fn current_user(&self, ctx: &Context) -> Result<Option<Value>>;
}

/// Synchronous closure as an [`AuthorizationChecker`]
pub struct AuthorizationFn<F>(pub F);

#[async_trait]
impl<F> AuthorizationChecker for AuthorizationFn<F>
where
    F: Fn(&Context, &[String]) -> bool + Send + Sync,
{
    async fn check(&self, ctx: &Context, roles: &[String]) -> Result<bool> {
        Ok((self.0)(ctx, roles))
    }
}

/// Synchronous closure as a [`CurrentUserChecker`]
pub struct CurrentUserFn<F>(pub F);

#[async_trait]
impl<F> CurrentUserChecker for CurrentUserFn<F>
where
    F: Fn(&Context) -> Option<Value> + Send + Sync,
{
    async fn current_user(&self, ctx: &Context) -> Result<Option<Value>> {
        Ok((self.0)(ctx))
    }
}

#[derive(Default)]
pub struct AuthorizationGate {
    checker: Option<Arc<dyn AuthorizationChecker>>,
}

impl AuthorizationGate {
    pub fn new(checker: Option<Arc<dyn AuthorizationChecker>>) -> Self {
        Self { checker }
    }

    /// Fail unless the action is open or the checker allows the request
    ///
    /// A refusal is `AuthorizationRequired` (401) when no roles were asked
    /// for and `AccessDenied` (403) otherwise. A failing checker counts as a
    /// refusal.
    pub async fn check(&self, ctx: &Context, action: &ActionMetadata) -> Result<()> {
        let Some(roles) = &action.authorized else {
            return Ok(());
        };

        let checker = self
            .checker
            .as_ref()
            .ok_or(Error::AuthorizationCheckerNotDefined)?;

        let allowed = match checker.check(ctx, roles).await {
            Ok(allowed) => allowed,
            Err(e) => {
                log::warn!("Authorization check for {} failed: {}", action.full_name(), e);
                false
            }
        };

        if allowed {
            log::debug!("Authorization passed for {}", action.full_name());
            return Ok(());
        }

        let (method, url) = (ctx.method().to_string(), ctx.url().to_string());
        if roles.is_empty() {
            Err(Error::AuthorizationRequired { method, url })
        } else {
            Err(Error::AccessDenied { method, url })
        }
    }
}
