use crate::error::Result;
use crate::http::{Request, Response};
use crate::session::Session;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-request state shared by every pipeline stage
///
/// The request is immutable once routing filled in the path parameters.
/// The response slot starts as an empty 200 draft: actions and before
/// middlewares may add headers to it, the response resolver merges those into
/// the final response, and after middlewares see the final response here.
pub struct Context {
    pub req: Arc<Request>,
    res: Option<Response>,
    /// True once a response replaced the draft through `set_response`
    res_set: bool,
    session: Option<Arc<Session>>,
    /// Storage for middleware data
    data: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self {
            req: Arc::new(request),
            res: Some(Response::ok()),
            res_set: false,
            session: None,
            data: HashMap::new(),
        }
    }

    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    // Response management methods

    /// Set the response for this context
    pub fn set_response(&mut self, response: Response) {
        self.res = Some(response);
        self.res_set = true;
    }

    /// Whether a full response was set, as opposed to the seeded draft
    pub fn has_response(&self) -> bool {
        self.res_set && self.res.is_some()
    }

    /// Get the response if set
    pub fn get_response(&self) -> Option<&Response> {
        self.res.as_ref()
    }

    /// Mutable access to the response, creating an empty draft if needed
    pub fn response_mut(&mut self) -> &mut Response {
        self.res.get_or_insert_with(Response::ok)
    }

    /// Take the response, leaving None in its place
    pub fn take_response(&mut self) -> Option<Response> {
        self.res_set = false;
        self.res.take()
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        self.response_mut().add_header(&name, &value);
    }

    // Middleware data storage methods

    /// Store data for middleware communication
    pub fn set<T: Any + Send + Sync + 'static>(&mut self, key: &str, value: T) -> Result<()> {
        self.data.insert(key.to_string(), Box::new(value));
        Ok(())
    }

    /// Retrieve data stored by middleware
    pub fn get<T: Any + Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.data
            .get(key)
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn has_data(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    // Session management methods

    pub fn set_session(&mut self, session: Option<Arc<Session>>) {
        self.session = session;
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_deref()
    }

    pub fn session_arc(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    // Request shortcuts

    pub fn method(&self) -> &str {
        &self.req.method
    }

    pub fn url(&self) -> &str {
        &self.req.uri
    }

    pub fn path(&self) -> &str {
        self.req.path()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.req.param(key)
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.req.query_value(key).map(|v| v.as_string())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.req.header(name)
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.req.cookie(name)
    }
}
