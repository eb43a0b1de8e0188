use super::{MemorySessionStore, Session};
use crate::context::Context;
use crate::error::Result;
use crate::middleware::{Middleware, MiddlewareAction};
use async_trait::async_trait;
use std::sync::Arc;

/// Default name of the session cookie
pub const SESSION_COOKIE: &str = "rustf.sid";

/// Loads the request session from its cookie before the action runs
///
/// Requests without a known session id get a fresh session; the cookie for
/// it is added to the response draft so the resolved response carries it.
/// Register it as a global before-middleware.
#[derive(Clone)]
pub struct SessionMiddleware {
    store: Arc<MemorySessionStore>,
    cookie_name: String,
    exempt_routes: Vec<String>,
}

impl SessionMiddleware {
    pub fn new(store: Arc<MemorySessionStore>) -> Self {
        Self {
            store,
            cookie_name: SESSION_COOKIE.to_string(),
            exempt_routes: Vec::new(),
        }
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Skip session handling for a path, `/*` suffixes match whole subtrees
    pub fn exempt(mut self, pattern: impl Into<String>) -> Self {
        self.exempt_routes.push(pattern.into());
        self
    }

    pub fn store(&self) -> &Arc<MemorySessionStore> {
        &self.store
    }

    fn is_route_exempt(&self, path: &str) -> bool {
        self.exempt_routes.iter().any(|pattern| match pattern.strip_suffix("/*") {
            Some(prefix) => path
                .strip_prefix(prefix)
                .map(|rest| rest.is_empty() || rest.starts_with('/'))
                .unwrap_or(false),
            None => path == pattern,
        })
    }

    fn create_cookie(&self, session: &Session) -> String {
        format!("{}={}; Path=/; HttpOnly; SameSite=Lax", self.cookie_name, session.id())
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    async fn handle(&self, ctx: &mut Context) -> Result<MiddlewareAction> {
        if self.is_route_exempt(ctx.path()) {
            return Ok(MiddlewareAction::Continue);
        }

        let existing = ctx
            .cookie(&self.cookie_name)
            .and_then(|id| self.store.get(&id));

        let session = match existing {
            Some(session) => session,
            None => {
                let session = self.store.create();
                log::debug!("Created session {}", session.id());
                let cookie = self.create_cookie(&session);
                ctx.add_header("Set-Cookie", cookie);
                ctx.set("session_is_new", true)?;
                session
            }
        };

        ctx.set_session(Some(session));
        Ok(MiddlewareAction::Continue)
    }

    fn name(&self) -> &'static str {
        "session"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use std::time::Duration;

    #[tokio::test]
    async fn test_new_session_sets_cookie() {
        let store = Arc::new(MemorySessionStore::new());
        let middleware = SessionMiddleware::new(Arc::clone(&store));
        let mut ctx = Context::new(Request::new("GET", "/"));

        middleware.handle(&mut ctx).await.unwrap();

        let session = ctx.session().unwrap();
        let cookie = ctx.get_response().and_then(|r| r.header("set-cookie")).unwrap();
        assert!(cookie.starts_with(&format!("{}={}", SESSION_COOKIE, session.id())));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_session_is_loaded() {
        let store = Arc::new(MemorySessionStore::new());
        let existing = store.create();
        existing.set("user", "umed").unwrap();

        let middleware = SessionMiddleware::new(Arc::clone(&store));
        let request = Request::new("GET", "/")
            .with_header("Cookie", &format!("{}={}", SESSION_COOKIE, existing.id()));
        let mut ctx = Context::new(request);

        middleware.handle(&mut ctx).await.unwrap();

        assert_eq!(ctx.session().unwrap().get::<String>("user"), Some("umed".into()));
        assert!(ctx.get_response().and_then(|r| r.header("set-cookie")).is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_replaced() {
        let store = Arc::new(MemorySessionStore::with_timeout(Duration::from_millis(10)));
        let stale = store.create();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let middleware = SessionMiddleware::new(Arc::clone(&store));
        let request = Request::new("GET", "/")
            .with_header("Cookie", &format!("{}={}", SESSION_COOKIE, stale.id()));
        let mut ctx = Context::new(request);

        middleware.handle(&mut ctx).await.unwrap();

        assert_ne!(ctx.session().unwrap().id(), stale.id());
        assert!(ctx.get_response().and_then(|r| r.header("set-cookie")).is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_exempt_routes() {
        let middleware = SessionMiddleware::new(Arc::new(MemorySessionStore::new())).exempt("/health/*");
        let mut ctx = Context::new(Request::new("GET", "/health/live"));

        middleware.handle(&mut ctx).await.unwrap();
        assert!(ctx.session().is_none());
        assert!(!middleware.is_route_exempt("/healthy"));
    }
}
