//! Deterministic network for tests and simulations.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use http::StatusCode;
use sw_core::{ApiRequest, ApiResponse};

use crate::client::{FetchError, Network};

#[derive(Debug, Default)]
struct Script {
    routes: HashMap<String, Result<ApiResponse, FetchError>>,
    calls: Vec<String>,
}

/// A network that answers from a fixed table of URLs.
///
/// Unknown URLs get a 404. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    script: Mutex<Script>,
}

impl ScriptedNetwork {
    /// Create a network with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `response`.
    pub fn respond(&self, url: impl Into<String>, response: ApiResponse) -> &Self {
        self.script().routes.insert(url.into(), Ok(response));
        self
    }

    /// Fail requests to `url` with `error`.
    pub fn fail(&self, url: impl Into<String>, error: FetchError) -> &Self {
        self.script().routes.insert(url.into(), Err(error));
        self
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.script().calls.clone()
    }

    /// Number of fetches so far.
    pub fn call_count(&self) -> usize {
        self.script().calls.len()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &ApiRequest) -> Result<ApiResponse, FetchError> {
        let mut script = self.script();
        script.calls.push(request.url.clone());

        let result = script
            .routes
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Ok(ApiResponse::new(StatusCode::NOT_FOUND, "")));

        tracing::trace!(url = %request.url, ok = result.is_ok(), "scripted fetch");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_routes() {
        let network = ScriptedNetwork::new();
        network
            .respond("https://api.test/a", ApiResponse::ok("a"))
            .fail("https://api.test/b", FetchError::Connection("reset".to_string()));

        let a = network.fetch(&ApiRequest::get("https://api.test/a")).await.unwrap();
        assert_eq!(a.body.as_ref(), b"a");

        let b = network.fetch(&ApiRequest::get("https://api.test/b")).await;
        assert_eq!(b, Err(FetchError::Connection("reset".to_string())));

        let c = network.fetch(&ApiRequest::get("https://api.test/c")).await.unwrap();
        assert_eq!(c.status, StatusCode::NOT_FOUND);

        assert_eq!(
            network.calls(),
            vec!["https://api.test/a", "https://api.test/b", "https://api.test/c"]
        );
    }
}
