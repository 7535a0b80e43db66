use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata for a single Flow version, as loaded from the Tooling API or
/// scraped from the Flow Builder page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowInfo {
    pub id: String,
    pub definition_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub flow_type: String,
    pub status: String,
    /// Raw `Metadata` object of the Flow record. `None` when the API was
    /// unreachable and the record came from the page.
    pub xml_data: Option<Value>,
}

impl FlowInfo {
    pub fn new(id: impl Into<String>, definition_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            definition_id: definition_id.into(),
            name: name.into(),
            flow_type: "Unknown".to_string(),
            status: "Unknown".to_string(),
            xml_data: None,
        }
    }

    pub fn with_type(mut self, flow_type: impl Into<String>) -> Self {
        self.flow_type = flow_type.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_xml_data(mut self, xml_data: Value) -> Self {
        self.xml_data = Some(xml_data);
        self
    }

    /// The flow's description, if the metadata carries a non-empty one.
    pub fn description(&self) -> Option<&str> {
        self.metadata_str("description").filter(|d| !d.is_empty())
    }

    /// True when the metadata carries a non-null `apiVersion`, parseable or not.
    pub fn declares_api_version(&self) -> bool {
        self.xml_data
            .as_ref()
            .and_then(|data| data.get("apiVersion"))
            .map(|v| !v.is_null())
            .unwrap_or(false)
    }

    /// The metadata `apiVersion`, which the API returns either as a number
    /// or as a string like `"58.0"`.
    pub fn api_version(&self) -> Option<f64> {
        let value = self.xml_data.as_ref()?.get("apiVersion")?;
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.xml_data.as_ref()?.get(key)?.as_str()
    }
}
