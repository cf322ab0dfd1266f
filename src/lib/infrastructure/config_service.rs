//! Config service client
//!
//! Fetches namespace sender configurations from the config service and keeps
//! them in an [`ExpiringCache`].

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};

use crate::{
    cache::ExpiringCache,
    domain::communication::{
        configuration::{
            ConfigServiceError, SenderConfiguration, SenderConfigurationResolver,
            CONFIGURATION_NOT_FOUND_CODE,
        },
        SendContext,
    },
    infrastructure::email::DEFAULT_HTTP_TIMEOUT,
};

/// Error body returned by the config service
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEntity {
    error_code: i64,
    #[serde(default)]
    error_message: String,
}

/// Config service proxy with a per-namespace configuration cache
#[derive(Debug, Clone)]
pub struct ConfigServiceProxy {
    host: String,
    http_client: Client,
    timeout: Duration,
    cache: ExpiringCache<String, Arc<SenderConfiguration>>,
}

impl ConfigServiceProxy {
    /// Creates a proxy for the config service at `host` whose cache keeps
    /// configurations for `cache_ttl` and sweeps at twice that.
    pub fn new(host: impl Into<String>, cache_ttl: Duration) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            http_client: Client::new(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            cache: ExpiringCache::with_ttl(cache_ttl),
        }
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The config service host
    pub fn host(&self) -> &str {
        &self.host
    }

    fn configuration_url(&self, namespace: &str) -> String {
        format!(
            "{}/v1/admin/namespaces/{}/emailsender?includeEmailTemplates=true",
            self.host, namespace
        )
    }

    async fn fetch_email_sender_configuration(
        &self,
        ctx: &SendContext,
        namespace: &str,
    ) -> Result<Arc<SenderConfiguration>, ConfigServiceError> {
        let access_token = ctx.access_token().ok_or_else(|| {
            error!(namespace, "no access token specified in send context");
            ConfigServiceError::MissingAccessToken
        })?;

        debug!(namespace, "fetching email sender configuration");

        let request = async {
            let response = self
                .http_client
                .get(self.configuration_url(namespace))
                .bearer_auth(access_token)
                .timeout(self.timeout)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;

            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = ctx
            .run(self.timeout, request)
            .await?
            .map_err(|e| {
                error!(namespace, "error getting email sender config: {}", e);
                if e.is_timeout() {
                    ConfigServiceError::TimedOut
                } else {
                    ConfigServiceError::Transport(e.into())
                }
            })?;

        if status == StatusCode::OK {
            let configuration: SenderConfiguration = serde_json::from_str(&body)?;
            return Ok(Arc::new(configuration));
        }

        if status == StatusCode::NOT_FOUND {
            if let Ok(entity) = serde_json::from_str::<ErrorEntity>(&body) {
                if entity.error_code == CONFIGURATION_NOT_FOUND_CODE {
                    debug!(
                        namespace,
                        "email sender configuration is not found: {}", entity.error_message
                    );
                    return Err(ConfigServiceError::NotFound(namespace.to_string()));
                }
            }
        }

        error!(namespace, status = status.as_u16(), "error getting email sender config: {}", body);

        Err(ConfigServiceError::UnexpectedResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SenderConfigurationResolver for ConfigServiceProxy {
    async fn get_email_sender_configuration(
        &self,
        ctx: &SendContext,
        namespace: &str,
    ) -> Result<Option<Arc<SenderConfiguration>>, ConfigServiceError> {
        let result = self
            .cache
            .get_or_try_insert_with(namespace.to_string(), || {
                self.fetch_email_sender_configuration(ctx, namespace)
            })
            .await;

        match result {
            Ok(configuration) => Ok(Some(configuration)),
            Err(ConfigServiceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
