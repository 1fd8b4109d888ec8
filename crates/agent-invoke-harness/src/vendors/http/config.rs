use std::time::Duration;

use crate::errors::HarnessError;

const ENDPOINT_ENV: &str = "AGENT_INVOKE_ENDPOINT";
const API_KEY_ENV: &str = "AGENT_INVOKE_API_KEY";
const REGION_ENVS: [&str; 2] = ["AWS_REGION", "AWS_DEFAULT_REGION"];

/// Configuration for the HTTP Agent Service client.
#[derive(Clone, Debug)]
pub struct HttpServiceConfig {
    /// Base URL of the agent runtime endpoint.
    pub endpoint: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
}

impl HttpServiceConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Default runtime endpoint for a region.
    pub fn for_region(region: &str) -> Self {
        Self::new(format!("https://bedrock-agent-runtime.{region}.amazonaws.com"))
    }

    /// Resolves the endpoint from explicit values, then the environment.
    ///
    /// Order: `endpoint`, `AGENT_INVOKE_ENDPOINT`, then the endpoint derived
    /// from `region`, `AWS_REGION` or `AWS_DEFAULT_REGION`. The bearer token
    /// comes from `AGENT_INVOKE_API_KEY`.
    pub fn resolve(endpoint: Option<&str>, region: Option<&str>) -> Result<Self, HarnessError> {
        Self::resolve_with(endpoint, region, |key| std::env::var(key).ok())
    }

    pub(crate) fn resolve_with(
        endpoint: Option<&str>,
        region: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, HarnessError> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let mut config = if let Some(endpoint) = non_empty(endpoint.map(str::to_string))
            .or_else(|| non_empty(env(ENDPOINT_ENV)))
        {
            Self::new(endpoint)
        } else {
            let region = non_empty(region.map(str::to_string))
                .or_else(|| REGION_ENVS.iter().find_map(|key| non_empty(env(key))))
                .ok_or_else(|| {
                    HarnessError::Config(
                        "no agent service endpoint or region configured; \
                         set --endpoint, --region or AWS_REGION"
                            .into(),
                    )
                })?;
            Self::for_region(region.trim())
        };
        config.api_key = non_empty(env(API_KEY_ENV));
        Ok(config)
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
