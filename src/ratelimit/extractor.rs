//! Rate-limiting key derivation.

use super::request::RequestParts;
use crate::error::{BoxError, Result, SlidegateError};

/// Separator between header values in a derived key.
const VALUE_SEPARATOR: &str = "-";

/// Injected key-derivation callback. Receives the configured header names
/// and returns the identity component of the key.
pub type KeyDeriveFn =
    Box<dyn Fn(&[String]) -> std::result::Result<String, BoxError> + Send + Sync>;

/// Derives the rate-limiting key a request's quota is tracked against.
pub trait KeyExtractor: Send + Sync {
    /// Produce the key for a request.
    ///
    /// When `shared_across_paths` is false the key is scoped to the
    /// request's method and path, so the same subject is tracked
    /// independently per route.
    fn extract_key(&self, request: &RequestParts, shared_across_paths: bool) -> Result<String>;
}

/// Extracts keys from a configured set of identifying headers.
///
/// Every configured header must carry a non-blank value; values are
/// trimmed and joined with `-` to form the identity component. A custom
/// derivation callback, when present, replaces header reading entirely.
pub struct HeaderKeyExtractor {
    headers: Vec<String>,
    derive: Option<KeyDeriveFn>,
}

impl HeaderKeyExtractor {
    /// Create an extractor over the given identifying headers.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            derive: None,
        }
    }

    /// Replace header reading with a custom derivation callback. The
    /// callback is handed the configured header names and its errors are
    /// propagated to the caller.
    pub fn with_derive_fn(mut self, derive: KeyDeriveFn) -> Self {
        self.derive = Some(derive);
        self
    }
}

impl KeyExtractor for HeaderKeyExtractor {
    fn extract_key(&self, request: &RequestParts, shared_across_paths: bool) -> Result<String> {
        let scope = if shared_across_paths {
            String::new()
        } else {
            format!(":{}:{}", request.method(), request.path())
        };

        if let Some(derive) = &self.derive {
            let identity = derive(&self.headers).map_err(SlidegateError::KeyDerivation)?;
            return Ok(format!("{}{}", identity, scope));
        }

        let mut values = Vec::with_capacity(self.headers.len());
        for name in &self.headers {
            match request.header(name).map(str::trim) {
                Some(value) if !value.is_empty() => values.push(value.to_string()),
                _ => return Err(SlidegateError::MissingHeaderValue(name.clone())),
            }
        }

        Ok(format!("{}{}", values.join(VALUE_SEPARATOR), scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RequestParts {
        RequestParts::new("GET", "/login")
            .with_header("X-User-Id", "u1")
            .with_header("X-Tenant", "acme")
    }

    #[test]
    fn test_single_header_key_with_route_scope() {
        let extractor = HeaderKeyExtractor::new(["X-User-Id"]);
        let key = extractor.extract_key(&request(), false).unwrap();
        assert_eq!(key, "u1:GET:/login");
    }

    #[test]
    fn test_multiple_headers_joined() {
        let extractor = HeaderKeyExtractor::new(["X-User-Id", "X-Tenant"]);
        let key = extractor.extract_key(&request(), true).unwrap();
        assert_eq!(key, "u1-acme");
    }

    #[test]
    fn test_shared_across_paths_collapses_routes() {
        let extractor = HeaderKeyExtractor::new(["X-User-Id"]);
        let a = RequestParts::new("GET", "/a").with_header("X-User-Id", "u1");
        let b = RequestParts::new("POST", "/b").with_header("X-User-Id", "u1");

        let key_a = extractor.extract_key(&a, true).unwrap();
        let key_b = extractor.extract_key(&b, true).unwrap();
        assert_eq!(key_a, key_b);

        let scoped_a = extractor.extract_key(&a, false).unwrap();
        let scoped_b = extractor.extract_key(&b, false).unwrap();
        assert_ne!(scoped_a, scoped_b);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = HeaderKeyExtractor::new(["X-User-Id", "X-Tenant"]);
        let first = extractor.extract_key(&request(), false).unwrap();
        let second = extractor.extract_key(&request(), false).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_header_names_the_header() {
        let extractor = HeaderKeyExtractor::new(["X-Missing"]);
        let err = extractor.extract_key(&request(), false).unwrap_err();
        match err {
            SlidegateError::MissingHeaderValue(name) => assert_eq!(name, "X-Missing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_header_value_is_missing() {
        let extractor = HeaderKeyExtractor::new(["X-User-Id"]);
        let request = RequestParts::new("GET", "/login").with_header("X-User-Id", "   ");
        assert!(extractor.extract_key(&request, false).is_err());
    }

    #[test]
    fn test_header_values_are_trimmed() {
        let extractor = HeaderKeyExtractor::new(["X-User-Id"]);
        let request = RequestParts::new("GET", "/login").with_header("X-User-Id", "  u1  ");
        let key = extractor.extract_key(&request, true).unwrap();
        assert_eq!(key, "u1");
    }

    #[test]
    fn test_custom_derive_fn_replaces_header_reading() {
        let extractor = HeaderKeyExtractor::new(["X-User-Id"]).with_derive_fn(Box::new(
            |headers| Ok(format!("custom-{}", headers.len())),
        ));

        // No headers on the request at all; the callback decides.
        let request = RequestParts::new("GET", "/login");
        let key = extractor.extract_key(&request, false).unwrap();
        assert_eq!(key, "custom-1:GET:/login");
    }

    #[test]
    fn test_custom_derive_fn_error_propagates() {
        let extractor = HeaderKeyExtractor::new(["X-User-Id"])
            .with_derive_fn(Box::new(|_| Err("token lookup failed".into())));

        let err = extractor.extract_key(&request(), false).unwrap_err();
        match err {
            SlidegateError::KeyDerivation(source) => {
                assert_eq!(source.to_string(), "token lookup failed");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(extractor.extract_key(&request(), false).unwrap_err().is_client_error());
    }
}
