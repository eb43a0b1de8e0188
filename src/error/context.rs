//! Error context and chaining utilities
//!
//! Lets loaders and collaborators wrap an error with what they were doing,
//! without losing the status classification of the root cause.

use super::Error;
use std::fmt;

/// Trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to the error
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>;

    /// Add context with lazy evaluation
    fn with_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: Into<Error>,
{
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

/// Flattened view of a context chain, outermost message first
pub struct ErrorChain<'a> {
    error: &'a Error,
    chain: Vec<String>,
}

impl<'a> ErrorChain<'a> {
    pub fn new(error: &'a Error) -> Self {
        let mut chain = Vec::new();
        let mut current = error;
        loop {
            match current {
                Error::WithContext { message, source } => {
                    chain.push(message.clone());
                    current = source;
                }
                other => {
                    chain.push(other.to_string());
                    break;
                }
            }
        }
        Self { error, chain }
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn root_cause(&self) -> &Error {
        self.error.root()
    }

    /// Format the error chain for logging
    pub fn format_for_log(&self) -> String {
        self.chain.join(" -> ")
    }
}

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_for_log())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_chaining() {
        let result: Result<(), Error> = Err(Error::config("missing [defaults] table"));
        let err = result
            .context("Failed to parse controllers.toml")
            .unwrap_err();

        if let Error::WithContext { message, source } = &err {
            assert_eq!(message, "Failed to parse controllers.toml");
            assert!(matches!(source.as_ref(), Error::Config(_)));
        } else {
            panic!("Expected WithContext error");
        }
    }

    #[test]
    fn test_foreign_errors_convert() {
        let result: Result<serde_json::Value, serde_json::Error> = serde_json::from_str("{");
        let err = result.with_context(|| "decoding body").unwrap_err();
        assert!(matches!(err.root(), Error::Json(_)));
    }

    #[test]
    fn test_error_chain_formatting() {
        let error = Error::internal("socket closed")
            .with_context("rendering template")
            .with_context("resolving response");

        let chain = ErrorChain::new(&error);

        assert_eq!(chain.chain().len(), 3);
        assert_eq!(
            chain.format_for_log(),
            "resolving response -> rendering template -> Internal error: socket closed"
        );
        assert!(matches!(chain.root_cause(), Error::Internal(_)));
    }
}
