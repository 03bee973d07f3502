//! Cache keys and bucket names.

use serde::{Deserialize, Serialize};
use sw_core::ApiRequest;

/// Prefix shared by every bucket this worker creates.
pub const BUCKET_PREFIX: &str = "api-cache-";

/// Name of the bucket for a deployment version (`api-cache-<version>`).
pub fn bucket_name(version: u32) -> String {
    format!("{}{}", BUCKET_PREFIX, version)
}

/// Normalized request identity used as the cache key.
///
/// The method is upper-cased and the URL fragment dropped, so
/// `get https://a.test/x#top` and `GET https://a.test/x` share an entry.
/// Query strings are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    method: String,
    url: String,
}

impl RequestKey {
    /// Create a key from a method and URL.
    pub fn new(method: impl AsRef<str>, url: impl AsRef<str>) -> Self {
        let url = url.as_ref();
        let url = url.split_once('#').map_or(url, |(before, _)| before);

        Self {
            method: method.as_ref().to_ascii_uppercase(),
            url: url.to_string(),
        }
    }

    /// Create a key for an intercepted request.
    pub fn from_request(request: &ApiRequest) -> Self {
        Self::new(request.method.as_str(), &request.url)
    }

    /// Normalized method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Normalized URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
