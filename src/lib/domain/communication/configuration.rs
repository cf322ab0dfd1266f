//! Per-namespace sender configuration, as stored by the config service.

mod errors;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::mock;

use crate::domain::communication::SendContext;

pub use errors::{ConfigServiceError, CONFIGURATION_NOT_FOUND_CODE};

/// A provider template addressable by a namespace-defined name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    /// The friendly name callers use
    #[serde(rename = "TemplateName")]
    pub template_name: String,

    /// The provider's template id
    #[serde(rename = "TemplateID")]
    pub template_id: String,
}

/// Verified sender identity and provider credentials for one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderConfiguration {
    /// The namespace this configuration belongs to
    pub namespace: String,

    /// Verified sender address
    pub from_address: String,

    /// Verified sender display name
    pub from_name: String,

    /// Provider api key
    pub api_key: String,

    /// Whether the sender domain has been verified with the provider
    pub is_domain_authenticated: bool,

    /// Named templates, in the order the config service returned them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_templates: Vec<EmailTemplate>,
}

impl SenderConfiguration {
    /// Returns the first template registered under `name`.
    pub fn get_email_template(&self, name: &str) -> Option<&EmailTemplate> {
        self.email_templates
            .iter()
            .find(|template| template.template_name == name)
    }
}

/// Resolves the sender configuration of a namespace
#[async_trait]
pub trait SenderConfigurationResolver: Send + Sync + 'static {
    /// Gets the sender configuration for `namespace`.
    ///
    /// # Returns
    /// - [`Ok`] with [`Some`] configuration when one exists.
    /// - [`Ok`] with [`None`] when the namespace has no configuration.
    /// - [`Err`] containing a [`ConfigServiceError`] when the lookup failed.
    async fn get_email_sender_configuration(
        &self,
        ctx: &SendContext,
        namespace: &str,
    ) -> Result<Option<Arc<SenderConfiguration>>, ConfigServiceError>;
}

#[cfg(test)]
mock! {
    pub SenderConfigurationResolver {}

    #[async_trait]
    impl SenderConfigurationResolver for SenderConfigurationResolver {
        async fn get_email_sender_configuration(
            &self,
            ctx: &SendContext,
            namespace: &str,
        ) -> Result<Option<Arc<SenderConfiguration>>, ConfigServiceError>;
    }
}
