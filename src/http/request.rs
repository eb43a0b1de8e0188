use crate::error::Result;
use hyper::{Body, Request as HyperRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A query or form value that can be either a single value or an array of values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Single(String),
    Multiple(Vec<String>),
}

impl FormValue {
    /// Get as a single value (returns first element if array)
    pub fn as_string(&self) -> &str {
        match self {
            FormValue::Single(s) => s,
            FormValue::Multiple(v) => v.first().map(|s| s.as_str()).unwrap_or(""),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            FormValue::Single(s) => Value::String(s.clone()),
            FormValue::Multiple(v) => Value::Array(v.iter().cloned().map(Value::String).collect()),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            FormValue::Single(existing) => {
                *self = FormValue::Multiple(vec![std::mem::take(existing), value]);
            }
            FormValue::Multiple(values) => values.push(value),
        }
    }
}

/// Incoming request as seen by the controller pipeline
///
/// Header names are stored lowercased. Path parameters are filled in by the
/// router once a route matched.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub headers: HashMap<String, String>,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, FormValue>,
    body_bytes: Vec<u8>,
}

impl Request {
    pub fn new(method: &str, uri: &str) -> Self {
        let query = uri
            .split_once('?')
            .map(|(_, q)| Self::parse_query(q))
            .unwrap_or_default();

        Request {
            method: method.to_uppercase(),
            uri: uri.to_string(),
            headers: HashMap::new(),
            params: HashMap::new(),
            query,
            body_bytes: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body_bytes = body.into();
        self
    }

    /// Set a JSON body together with its content type
    pub fn with_json(self, body: &Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    pub async fn from_hyper(req: HyperRequest<Body>) -> Result<Self> {
        let method = req.method().to_string();
        let uri = req.uri().to_string();

        let mut headers = HashMap::new();
        for (name, value) in req.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.insert(name.as_str().to_lowercase(), value_str.to_string());
            }
        }

        let query = Self::parse_query(req.uri().query().unwrap_or(""));
        let body_bytes = hyper::body::to_bytes(req.into_body()).await?.to_vec();

        Ok(Request {
            method,
            uri,
            headers,
            params: HashMap::new(), // Will be filled by router
            query,
            body_bytes,
        })
    }

    /// Parse a query string, collecting repeated keys (and `key[]`) into arrays
    pub fn parse_query(query: &str) -> HashMap<String, FormValue> {
        let mut result: HashMap<String, FormValue> = HashMap::new();

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let (Some(key), Some(value)) = (decode_component(key), decode_component(value))
            else {
                log::debug!("Skipping query pair with invalid encoding: {}", pair);
                continue;
            };

            let is_array = key.ends_with("[]");
            let key = key.trim_end_matches("[]").to_string();

            match result.get_mut(&key) {
                Some(existing) => existing.push(value),
                None if is_array => {
                    result.insert(key, FormValue::Multiple(vec![value]));
                }
                None => {
                    result.insert(key, FormValue::Single(value));
                }
            }
        }

        result
    }

    /// Request path without query string
    pub fn path(&self) -> &str {
        let without_scheme = match self.uri.find("://") {
            Some(start) => {
                let after = &self.uri[start + 3..];
                match after.find('/') {
                    Some(idx) => &after[idx..],
                    None => "/",
                }
            }
            None => self.uri.as_str(),
        };

        match without_scheme.find('?') {
            Some(idx) => &without_scheme[..idx],
            None => without_scheme,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&FormValue> {
        self.query.get(name)
    }

    /// All query parameters as a JSON object
    pub fn query_object(&self) -> Value {
        let map: Map<String, Value> = self
            .query
            .iter()
            .map(|(k, v)| (k.clone(), v.to_value()))
            .collect();
        Value::Object(map)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    pub fn headers_object(&self) -> Value {
        let map: Map<String, Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }

    /// Get cookie value by name
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().remove(name)
    }

    pub fn cookies(&self) -> HashMap<String, String> {
        self.header("cookie")
            .map(Self::parse_cookies)
            .unwrap_or_default()
    }

    fn parse_cookies(cookie_header: &str) -> HashMap<String, String> {
        cookie_header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let value = decode_component(value.trim()).unwrap_or_else(|| value.to_string());
                Some((name.trim().to_string(), value))
            })
            .collect()
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body_bytes
    }

    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes).to_string()
    }

    /// Body as a structured value
    ///
    /// JSON bodies are decoded, url-encoded forms become an object and any
    /// other non-empty payload is returned as a string. An empty body is `None`.
    pub fn body_value(&self) -> Result<Option<Value>> {
        if self.body_bytes.is_empty() {
            return Ok(None);
        }

        let content_type = self.header("content-type").unwrap_or("").to_lowercase();
        if content_type.contains("json") {
            return Ok(Some(serde_json::from_slice(&self.body_bytes)?));
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let form = Self::parse_query(&self.body_as_string());
            let map: Map<String, Value> = form
                .into_iter()
                .map(|(k, v)| (k, v.to_value()))
                .collect();
            return Ok(Some(Value::Object(map)));
        }

        Ok(Some(Value::String(self.body_as_string())))
    }
}

fn decode_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_parsing_from_uri() {
        let req = Request::new("get", "/user?filter=%7B%22keyword%22%3A%22Um%22%7D&page=2");
        assert_eq!(req.method, "GET");
        assert_eq!(req.path(), "/user");
        assert_eq!(
            req.query_value("filter").map(|v| v.as_string()),
            Some(r#"{"keyword":"Um"}"#)
        );
        assert_eq!(req.query_value("page").map(|v| v.as_string()), Some("2"));
    }

    #[test]
    fn test_query_arrays() {
        let req = Request::new("GET", "/photos?tag=a&tag=b&ids[]=1&q=hello+world");
        assert_eq!(
            req.query_value("tag"),
            Some(&FormValue::Multiple(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            req.query_value("ids"),
            Some(&FormValue::Multiple(vec!["1".into()]))
        );
        assert_eq!(req.query_value("q").map(|v| v.as_string()), Some("hello world"));
        assert_eq!(req.query_object()["tag"], json!(["a", "b"]));
    }

    #[test]
    fn test_path_from_absolute_uri() {
        let req = Request::new("GET", "http://localhost:3000/posts/1?x=1");
        assert_eq!(req.path(), "/posts/1");
    }

    #[test]
    fn test_cookie_parsing() {
        let req = Request::new("GET", "/").with_header("Cookie", "sid=abc123; theme=dark%20blue");
        assert_eq!(req.cookie("sid"), Some("abc123".to_string()));
        assert_eq!(req.cookie("theme"), Some("dark blue".to_string()));
        assert_eq!(req.cookie("missing"), None);
    }

    #[test]
    fn test_body_value_by_content_type() {
        let req = Request::new("POST", "/users").with_json(&json!({"name": "Umed"}));
        assert_eq!(req.body_value().unwrap(), Some(json!({"name": "Umed"})));

        let req = Request::new("POST", "/users")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("name=Umed&age=20");
        assert_eq!(
            req.body_value().unwrap(),
            Some(json!({"name": "Umed", "age": "20"}))
        );

        let req = Request::new("POST", "/users").with_body("plain");
        assert_eq!(req.body_value().unwrap(), Some(json!("plain")));

        let req = Request::new("POST", "/users");
        assert_eq!(req.body_value().unwrap(), None);
    }

    #[test]
    fn test_malformed_json_body_is_an_error() {
        let req = Request::new("POST", "/users")
            .with_header("content-type", "application/json")
            .with_body("{oops");
        assert!(req.body_value().is_err());
    }
}
