// *arr API resource models
//
// Only the fields the engine reads are typed; everything else rides along
// in a flattened `extra` map so a GET-modify-PUT round trip never drops
// server-side settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /system/status`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    #[serde(default)]
    pub app_name: Option<String>,
    pub version: String,
}

/// A configured root folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootFolder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RootFolder {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            id: None,
            path: path.into(),
            extra: Map::new(),
        }
    }
}

/// One entry of a provider's `fields` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The shared shape of download clients, notifications, Prowlarr
/// applications, and indexers: a named implementation plus a `fields` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub implementation: String,
    #[serde(default)]
    pub config_contract: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Provider {
    pub fn new(
        name: impl Into<String>,
        implementation: impl Into<String>,
        config_contract: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            implementation: implementation.into(),
            config_contract: config_contract.into(),
            fields: Vec::new(),
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Value of the named field, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Set (or add) a field value.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        if let Some(field) = self.fields.iter_mut().find(|f| f.name == name) {
            field.value = value;
        } else {
            self.fields.push(Field {
                name: name.to_owned(),
                value,
                extra: Map::new(),
            });
        }
    }

    /// Builder-style [`set_field`](Self::set_field).
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Set a top-level attribute (`enable`, `protocol`, `syncLevel`, ...).
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_owned(), value.into());
        self
    }

    /// Top-level boolean attribute, e.g. `enable`.
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.extra.get(key).and_then(Value::as_bool)
    }

    /// `definitionName` for indexers created from the schema.
    pub fn definition_name(&self) -> Option<&str> {
        self.extra.get("definitionName").and_then(Value::as_str)
    }
}

/// A quality profile (only the fields we tweak are typed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityProfile {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub upgrade_allowed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lidarr metadata profile, needed when creating a root folder there.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataProfile {
    pub id: i64,
    pub name: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_round_trip_keeps_unknown_attributes() {
        let raw = json!({
            "id": 3,
            "name": "qBittorrent",
            "implementation": "QBittorrent",
            "configContract": "QBittorrentSettings",
            "enable": true,
            "priority": 1,
            "fields": [{ "name": "host", "value": "qbittorrent", "order": 0 }],
            "tags": []
        });
        let provider: Provider = serde_json::from_value(raw).unwrap();
        assert_eq!(provider.field("host"), Some(&json!("qbittorrent")));
        assert_eq!(provider.flag("enable"), Some(true));

        let back = serde_json::to_value(&provider).unwrap();
        assert_eq!(back["priority"], json!(1));
        assert_eq!(back["fields"][0]["order"], json!(0));
    }

    #[test]
    fn set_field_replaces_existing_value() {
        let mut provider = Provider::new("x", "Sonarr", "SonarrSettings").with_field("apiKey", "old");
        provider.set_field("apiKey", "new");
        assert_eq!(provider.fields.len(), 1);
        assert_eq!(provider.field("apiKey"), Some(&json!("new")));
    }
}
