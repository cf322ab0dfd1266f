//! Email message

use std::collections::BTreeMap;

use chrono::{Datelike, Utc};
use serde_json::Value;

/// Merge variable holding the copyright year shown in template footers
pub const COPYRIGHT_YEAR_KEY: &str = "copyrightYear";

/// Merge variable holding the recipient's language tag, e.g. `"en-US"`
pub const LANGUAGE_TAG_KEY: &str = "languageTag";

/// A provider-agnostic outbound email
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// The namespace sending the email.
    ///
    /// Used to look up the sender configuration when sending through the
    /// config service.
    pub namespace: String,

    /// The sender address.
    ///
    /// The config service sender only fills this in when unset. The static
    /// sender always overwrites it.
    pub from: Option<String>,

    /// The sender display name, with the same rules as [`Message::from`]
    pub from_name: Option<String>,

    /// The recipient
    pub to: String,

    /// The subject
    pub subject: String,

    /// Optional reply-to address
    pub reply_to: Option<String>,

    /// Provider template id, or a template name known to the namespace's sender
    /// configuration
    pub template: Option<String>,

    /// Template merge variables
    pub merge_vars: BTreeMap<String, Value>,

    /// Category tags
    pub categories: Vec<String>,

    /// Carbon-copy recipients
    pub carbon_copy: Vec<String>,
}

impl Message {
    /// Creates a message with the required fields set.
    pub fn new(
        namespace: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            to: to.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    /// Sets the sender address.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the sender display name.
    pub fn with_from_name(mut self, from_name: impl Into<String>) -> Self {
        self.from_name = Some(from_name.into());
        self
    }

    /// Sets the reply-to address.
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Sets the template id or name.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Adds a merge variable, replacing any previous value for `key`.
    pub fn with_merge_var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.merge_vars.insert(key.into(), value.into());
        self
    }

    /// Adds a category tag.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Adds a carbon-copy recipient.
    pub fn with_carbon_copy(mut self, address: impl Into<String>) -> Self {
        self.carbon_copy.push(address.into());
        self
    }

    /// Injects the default merge variables every template can rely on.
    ///
    /// * [`COPYRIGHT_YEAR_KEY`] is set to the current year unless already present.
    /// * When [`LANGUAGE_TAG_KEY`] holds a non-empty string, that string is added
    ///   as a key set to `true`, so templates can branch on the language.
    pub fn apply_template_defaults(&mut self) {
        self.merge_vars
            .entry(COPYRIGHT_YEAR_KEY.to_string())
            .or_insert_with(|| Value::from(Utc::now().year()));

        let language = self
            .merge_vars
            .get(LANGUAGE_TAG_KEY)
            .and_then(Value::as_str)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string);

        if let Some(language) = language {
            self.merge_vars.insert(language, Value::Bool(true));
        }
    }

    /// Whether a carbon-copy list was given
    pub fn has_carbon_copy(&self) -> bool {
        !self.carbon_copy.is_empty()
    }
}
