use super::{id_segment, parse};
use crate::KeyVaultError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryLevel {
    #[serde(rename = "Purgeable")]
    Purgeable,
    #[serde(rename = "Recoverable")]
    Recoverable,
    #[serde(rename = "Recoverable+ProtectedSubscription")]
    RecoverableProtectedSubscription,
    #[serde(rename = "Recoverable+Purgeable")]
    RecoverablePurgeable,
}

impl RecoveryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purgeable => "Purgeable",
            Self::Recoverable => "Recoverable",
            Self::RecoverableProtectedSubscription => "Recoverable+ProtectedSubscription",
            Self::RecoverablePurgeable => "Recoverable+Purgeable",
        }
    }
}

impl fmt::Display for RecoveryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryLevel {
    type Err = KeyVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Purgeable" => Ok(Self::Purgeable),
            "Recoverable" => Ok(Self::Recoverable),
            "Recoverable+ProtectedSubscription" => Ok(Self::RecoverableProtectedSubscription),
            "Recoverable+Purgeable" => Ok(Self::RecoverablePurgeable),
            _ => Err(KeyVaultError::InvalidArgument(format!(
                "Invalid recovery level \"{}\"",
                s
            ))),
        }
    }
}

/// Secret management attributes. Timestamps are Unix seconds.
///
/// Unset attributes are left out of the wire form entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_level: Option<RecoveryLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
}

impl SecretAttributes {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyVaultError> {
        parse("SecretAttributes", value)
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSecretRequest {
    pub value: String,
    #[serde(skip_serializing_if = "SecretAttributes::is_empty")]
    pub attributes: SecretAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

impl SetSecretRequest {
    pub fn new(value: impl Into<String>, attributes: SecretAttributes) -> Self {
        Self {
            value: value.into(),
            attributes,
            content_type: None,
            tags: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = Some(tags);
        self
    }
}

/// Secret as returned by list operations (no value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretItem {
    pub id: String,
    pub attributes: SecretAttributes,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub managed: Option<bool>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
}

impl SecretItem {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyVaultError> {
        parse("SecretItem", value)
    }

    /// Last segment of `.../secrets/{name}`
    pub fn name(&self) -> Result<&str, KeyVaultError> {
        id_segment(&self.id, 0, 3)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretBundle {
    pub id: String,
    pub attributes: SecretAttributes,
    pub value: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub managed: Option<bool>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
}

impl SecretBundle {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyVaultError> {
        parse("SecretBundle", value)
    }

    /// Ids look like `.../secrets/{name}/{version}`
    pub fn name(&self) -> Result<&str, KeyVaultError> {
        id_segment(&self.id, 1, 4)
    }

    pub fn version(&self) -> Result<&str, KeyVaultError> {
        id_segment(&self.id, 0, 4)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedSecretBundle {
    pub id: String,
    #[serde(default)]
    pub attributes: SecretAttributes,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub managed: Option<bool>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub deleted_date: Option<i64>,
    #[serde(default)]
    pub recovery_id: Option<String>,
    #[serde(default)]
    pub scheduled_purge_date: Option<i64>,
}

impl DeletedSecretBundle {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyVaultError> {
        parse("DeletedSecretBundle", value)
    }

    pub fn name(&self) -> Result<&str, KeyVaultError> {
        id_segment(&self.id, 1, 4)
    }

    pub fn version(&self) -> Result<&str, KeyVaultError> {
        id_segment(&self.id, 0, 4)
    }
}

/// One page of a secret listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretListResult {
    pub value: Vec<SecretItem>,
    #[serde(default)]
    pub next_link: Option<String>,
}

impl SecretListResult {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyVaultError> {
        parse("SecretListResult", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_attributes_round_trip() {
        let attributes = SecretAttributes::default();
        let wire = attributes.to_value();
        assert_eq!(wire, json!({}));

        let restored = SecretAttributes::from_value(&wire).unwrap();
        assert_eq!(restored.to_value(), wire);
        assert!(restored.is_empty());
    }

    #[test]
    fn test_full_attributes_round_trip() {
        let attributes = SecretAttributes {
            created: Some(1589806552),
            enabled: Some(true),
            exp: Some(1589810452),
            nbf: Some(1589806000),
            recovery_level: Some(RecoveryLevel::RecoverableProtectedSubscription),
            updated: Some(1589806553),
        };
        let wire = attributes.to_value();
        assert_eq!(wire["recoveryLevel"], "Recoverable+ProtectedSubscription");

        let restored = SecretAttributes::from_value(&wire).unwrap();
        assert_eq!(restored, attributes);
        assert_eq!(restored.to_value(), wire);
    }

    #[test]
    fn test_attributes_ignore_nulls_and_unknown_fields() {
        let attributes =
            SecretAttributes::from_value(&json!({"enabled": false, "exp": null, "recoverableDays": 90}))
                .unwrap();
        assert_eq!(attributes.enabled, Some(false));
        assert!(attributes.exp.is_none());
        assert_eq!(attributes.to_value(), json!({"enabled": false}));
    }

    #[test]
    fn test_recovery_level_parse() {
        assert_eq!(
            "Recoverable+Purgeable".parse::<RecoveryLevel>().unwrap(),
            RecoveryLevel::RecoverablePurgeable
        );
        let err = "Whatever".parse::<RecoveryLevel>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid recovery level \"Whatever\"");
    }

    #[test]
    fn test_set_secret_request_minimal() {
        let request = SetSecretRequest::new("secret-value", SecretAttributes::default());
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"value":"secret-value"}"#
        );
    }

    #[test]
    fn test_set_secret_request_full() {
        let mut tags = HashMap::new();
        tags.insert("env".to_string(), "prod".to_string());
        let request = SetSecretRequest::new(
            "secret-value",
            SecretAttributes {
                enabled: Some(true),
                ..Default::default()
            },
        )
        .with_content_type("text/plain")
        .with_tags(tags);

        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"value":"secret-value","attributes":{"enabled":true},"contentType":"text/plain","tags":{"env":"prod"}}"#
        );
    }

    #[test]
    fn test_secret_bundle_parse() {
        let bundle = SecretBundle::from_value(&json!({
            "value": "mysecretvalue",
            "id": "https://myvault.vault.azure.net/secrets/mysecretname/4387e9f3d6e14c459867679a90fd0f79",
            "attributes": {
                "enabled": true,
                "created": 1493938410,
                "updated": 1493938410,
                "recoveryLevel": "Recoverable+Purgeable"
            }
        }))
        .unwrap();

        assert_eq!(bundle.value, "mysecretvalue");
        assert_eq!(bundle.name().unwrap(), "mysecretname");
        assert_eq!(bundle.version().unwrap(), "4387e9f3d6e14c459867679a90fd0f79");
        assert_eq!(bundle.attributes.created, Some(1493938410));
        assert!(bundle.kid.is_none());
    }

    #[test]
    fn test_secret_bundle_requires_value() {
        let err = SecretBundle::from_value(&json!({"id": "a/b/c/d", "attributes": {}})).unwrap_err();
        assert!(matches!(err, KeyVaultError::InvalidResponse(_)));
        assert_eq!(
            err.to_string(),
            r#"SecretBundle is invalid: {"id":"a/b/c/d","attributes":{}}"#
        );
    }

    #[test]
    fn test_secret_bundle_short_id() {
        let bundle =
            SecretBundle::from_value(&json!({"id": "abc", "value": "v", "attributes": {}})).unwrap();
        let err = bundle.name().unwrap_err();
        assert_eq!(err.to_string(), "Invalid secret ID format \"abc\".");
    }

    #[test]
    fn test_secret_item_name() {
        let item = SecretItem::from_value(&json!({
            "id": "https://myvault.vault.azure.net/secrets/listed",
            "attributes": {"enabled": true},
            "contentType": "text/plain",
            "managed": false,
            "tags": {"a": "b"}
        }))
        .unwrap();
        assert_eq!(item.name().unwrap(), "listed");
        assert_eq!(item.content_type.as_deref(), Some("text/plain"));
        assert_eq!(item.tags.unwrap().get("a").map(String::as_str), Some("b"));
    }

    #[test]
    fn test_secret_item_requires_attributes() {
        let err = SecretItem::from_value(&json!({"id": "https://v/secrets/x"})).unwrap_err();
        assert!(err.to_string().starts_with("SecretItem is invalid"));
    }

    #[test]
    fn test_deleted_secret_bundle_parse() {
        let deleted = DeletedSecretBundle::from_value(&json!({
            "recoveryId": "https://myvault.vault.azure.net/deletedsecrets/GetDeletedSecretTest",
            "deletedDate": 1493938433,
            "scheduledPurgeDate": 1501714433,
            "id": "https://myvault.vault.azure.net/secrets/GetDeletedSecretTest/1e0f8fd4fd1d4ee5b3bd25a4a3b9da11",
            "attributes": {"enabled": true, "recoveryLevel": "Recoverable+Purgeable"}
        }))
        .unwrap();
        assert_eq!(deleted.name().unwrap(), "GetDeletedSecretTest");
        assert_eq!(deleted.deleted_date, Some(1493938433));
        assert_eq!(deleted.scheduled_purge_date, Some(1501714433));
        assert!(deleted.value.is_none());
    }

    #[test]
    fn test_deleted_secret_bundle_requires_id() {
        let err = DeletedSecretBundle::from_value(&json!({"value": "x"})).unwrap_err();
        assert!(err.to_string().starts_with("DeletedSecretBundle is invalid"));
    }

    #[test]
    fn test_secret_list_result() {
        let list = SecretListResult::from_value(&json!({
            "value": [
                {"id": "https://v/secrets/one", "attributes": {}},
                {"id": "https://v/secrets/two", "attributes": {"enabled": false}}
            ],
            "nextLink": "https://v/secrets?$skiptoken=abc&api-version=7.0"
        }))
        .unwrap();
        assert_eq!(list.value.len(), 2);
        assert_eq!(list.value[1].name().unwrap(), "two");
        assert!(list.next_link.is_some());

        let last = SecretListResult::from_value(&json!({"value": [], "nextLink": null})).unwrap();
        assert!(last.next_link.is_none());
    }

    #[test]
    fn test_secret_list_result_requires_value() {
        let err = SecretListResult::from_value(&json!({"nextLink": "x"})).unwrap_err();
        assert!(err.to_string().starts_with("SecretListResult is invalid"));
    }
}
