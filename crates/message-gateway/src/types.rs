//! Types for sending template messages through the provider.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Parameters for sending one template message.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSend {
    /// Recipient phone in the provider's canonical digit form.
    pub to: String,

    /// Template name registered with the provider.
    pub template_name: String,

    /// Template language code (e.g., "en", "pt_BR").
    pub language: String,

    /// Named template variables, in name order.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    /// Sender identity override (multi-sender accounts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,

    /// Caller-supplied token echoed back on delivery-status callbacks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<String>,
}

impl TemplateSend {
    /// Create send params for a template message to a recipient.
    pub fn new(
        to: impl Into<String>,
        template_name: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            template_name: template_name.into(),
            language: language.into(),
            ..Default::default()
        }
    }

    /// Add a template variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Replace the whole variable set.
    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// Set the sender identity for this send.
    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    /// Set the correlation token for delivery-status callbacks.
    pub fn with_correlation(mut self, token: impl Into<String>) -> Self {
        self.correlation_token = Some(token.into());
        self
    }
}

/// Result of a successful template send.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSendResult {
    /// Provider's identifier for the recipient contact.
    #[serde(default)]
    pub contact_id: Option<String>,

    /// Provider's identifier for the message.
    pub message_id: String,

    /// Provider-side accept timestamp, epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Error envelope returned by the provider on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(default)]
    pub error: ProviderErrorDetail,
}

/// Provider error detail.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_params_serialize_without_empty_fields() {
        let params = TemplateSend::new("15550001111", "renewal_notice", "en")
            .with_variable("1", "Alice");
        let json = serde_json::to_value(&params).unwrap();

        assert_eq!(json["to"], "15550001111");
        assert_eq!(json["variables"]["1"], "Alice");
        assert!(json.get("senderId").is_none());
        assert!(json.get("correlationToken").is_none());
    }

    #[test]
    fn send_result_tolerates_missing_optionals() {
        let result: TemplateSendResult =
            serde_json::from_str(r#"{"messageId": "m-1"}"#).unwrap();
        assert_eq!(result.message_id, "m-1");
        assert_eq!(result.contact_id, None);
        assert_eq!(result.timestamp, None);
    }
}
