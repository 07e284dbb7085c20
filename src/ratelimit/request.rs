//! Framework-neutral view of an inbound request.

use std::collections::HashMap;

/// The request attributes the engine needs: method, path, and headers.
///
/// The surrounding pipeline builds one of these from whatever request type
/// it handles; the engine never sees the framework's own request object.
/// Header names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    method: String,
    path: String,
    headers: HashMap<String, String>,
}

impl RequestParts {
    /// Create a request view for the given method and path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    /// Attach a header, replacing any previous value for the same name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// The HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Look up a header value by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `"<METHOD> <path>"` key rules are configured under.
    pub fn route_key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}
