//! The metadata document a plugin prints during the handshake.

use serde::{Deserialize, Serialize};

/// The only metadata document layout this host understands.
pub const METADATA_SCHEMA_VERSION: &str = "0.1.0";

/// Self-reported plugin description, immutable once parsed.
///
/// Field names follow the wire format of the docker cli-plugin protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PluginMetadata {
    /// Version of the document layout itself, not of the plugin.
    pub schema_version: String,

    /// Plugin author. Required; the probe rejects an empty vendor and a
    /// vendor claiming to be the host.
    pub vendor: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub short_description: Option<String>,

    #[serde(default, rename = "URL")]
    pub url: Option<String>,

    /// Marks pre-release plugins; surfaced in the listing only.
    #[serde(default)]
    pub experimental: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let raw = r#"{
            "SchemaVersion": "0.1.0",
            "Vendor": "acme corp",
            "Version": "0.0.1",
            "ShortDescription": "say things",
            "URL": "https://example.com/whalesay",
            "Experimental": true
        }"#;
        let metadata: PluginMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(metadata.schema_version, METADATA_SCHEMA_VERSION);
        assert_eq!(metadata.vendor, "acme corp");
        assert_eq!(metadata.version.as_deref(), Some("0.0.1"));
        assert_eq!(metadata.url.as_deref(), Some("https://example.com/whalesay"));
        assert!(metadata.experimental);
    }

    #[test]
    fn optional_fields_default() {
        let raw = r#"{"SchemaVersion": "0.1.0", "Vendor": "acme corp"}"#;
        let metadata: PluginMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(metadata.version, None);
        assert_eq!(metadata.short_description, None);
        assert!(!metadata.experimental);
    }

    #[test]
    fn missing_vendor_fails_to_parse() {
        let raw = r#"{"SchemaVersion": "0.1.0"}"#;
        assert!(serde_json::from_str::<PluginMetadata>(raw).is_err());
    }
}
