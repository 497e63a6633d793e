//! Shared test doubles: scripted providers and routing resolvers.

use crate::engine::ProviderResolver;
use async_trait::async_trait;
use foreman_config::Config;
use foreman_core::error::ProviderError;
use foreman_core::provider::{
    Provider, ProviderRequest, ProviderResponse, StopReason, Usage,
};
use foreman_core::{Error, ModelRef, Result, ToolCall};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Parse a config from inline TOML, with agent names filled in.
pub fn config_from(toml_body: &str) -> Config {
    let mut config: Config = toml::from_str(toml_body).expect("test config parses");
    let names: Vec<String> = config.agents.keys().cloned().collect();
    for name in names {
        config.agents.get_mut(&name).unwrap().name = name.clone();
    }
    config.validate().expect("test config validates");
    config
}

/// A plain text response with fixed usage (10 in / 5 out).
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        text: text.into(),
        model: "mock-model".into(),
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
        stop_reason: StopReason::EndTurn,
        tool_calls: vec![],
    }
}

/// A response requesting the given tool calls.
pub fn tool_response(tool_calls: Vec<ToolCall>) -> ProviderResponse {
    ProviderResponse {
        text: String::new(),
        model: "mock-model".into(),
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
        stop_reason: StopReason::ToolUse,
        tool_calls,
    }
}

struct ScriptedInner {
    script: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
    always_fail: bool,
}

/// A provider that replays a fixed script and records every request.
#[derive(Clone)]
pub struct ScriptedProvider {
    inner: Arc<ScriptedInner>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ProviderResponse>) -> Self {
        Self {
            inner: Arc::new(ScriptedInner {
                script: Mutex::new(script),
                requests: Mutex::new(Vec::new()),
                delay: None,
                always_fail: false,
            }),
        }
    }

    /// A provider whose every call fails with an operational error.
    pub fn failing() -> Self {
        Self {
            inner: Arc::new(ScriptedInner {
                script: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                delay: None,
                always_fail: true,
            }),
        }
    }

    /// Sleep this long before answering (to simulate slow completions).
    pub fn with_delay(script: Vec<ProviderResponse>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(ScriptedInner {
                script: Mutex::new(script),
                requests: Mutex::new(Vec::new()),
                delay: Some(delay),
                always_fail: false,
            }),
        }
    }

    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.inner.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.inner.requests.lock().unwrap().push(request);

        if self.inner.always_fail {
            return Err(ProviderError::Overloaded("mock outage".into()));
        }
        if let Some(delay) = self.inner.delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.inner.script.lock().unwrap();
        if script.is_empty() {
            return Err(ProviderError::Server {
                status_code: 500,
                message: "script exhausted".into(),
            });
        }
        Ok(script.remove(0))
    }
}

/// Routes model references to scripted providers by provider name.
pub struct RoutingResolver {
    map: HashMap<String, ScriptedProvider>,
    catch_all: Option<ScriptedProvider>,
}

impl RoutingResolver {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            catch_all: None,
        }
    }

    pub fn with(mut self, provider: &str, p: ScriptedProvider) -> Self {
        self.map.insert(provider.into(), p);
        self
    }

    pub fn catch_all(mut self, p: ScriptedProvider) -> Self {
        self.catch_all = Some(p);
        self
    }
}

impl ProviderResolver for RoutingResolver {
    fn resolve(&self, model_ref: &ModelRef) -> Result<Arc<dyn Provider>> {
        if let Some(p) = self.map.get(&model_ref.provider) {
            return Ok(Arc::new(p.clone()));
        }
        if let Some(p) = &self.catch_all {
            return Ok(Arc::new(p.clone()));
        }
        Err(Error::Internal(format!(
            "no test provider for '{}'",
            model_ref.provider
        )))
    }
}

/// A resolver that hands every model the same scripted provider.
pub fn resolver_for(p: ScriptedProvider) -> Arc<dyn ProviderResolver> {
    Arc::new(RoutingResolver::new().catch_all(p))
}
