use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{validate_record_id, Connection, PageSnapshot, SalesforceError};
use crate::model::FlowInfo;

/// Builds a [`FlowInfo`] from the Tooling API, filling gaps from a page
/// snapshot when one is available.
pub struct MetadataLoader<'a> {
    conn: &'a Connection,
    page: Option<PageSnapshot>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FlowRecord {
    full_name: Option<String>,
    master_label: Option<String>,
    process_type: Option<String>,
    status: Option<String>,
    metadata: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FlowDefinitionRecord {
    developer_name: Option<String>,
    master_label: Option<String>,
}

impl<'a> MetadataLoader<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn, page: None }
    }

    pub fn with_page(mut self, page: PageSnapshot) -> Self {
        self.page = Some(page);
        self
    }

    pub async fn load(
        &self,
        flow_def_id: Option<&str>,
        flow_id: Option<&str>,
    ) -> Result<FlowInfo, SalesforceError> {
        let (flow_def_id, flow_id) = match (flow_def_id, flow_id) {
            (Some(d), Some(f)) if !d.trim().is_empty() && !f.trim().is_empty() => (d, f),
            _ => return Err(SalesforceError::MissingFlowIds),
        };
        let flow_def_id = validate_record_id(flow_def_id)?;
        let flow_id = validate_record_id(flow_id)?;

        let definition = match self.fetch_definition(flow_def_id).await {
            Ok(def) => def,
            Err(e) => {
                warn!(error = %e, "FlowDefinition query failed, continuing without it");
                None
            }
        };

        match self.fetch_flow(flow_id).await {
            Ok(record) => {
                info!(flow_id, "Loaded flow metadata from Tooling API");
                Ok(self.from_record(flow_id, flow_def_id, record, definition))
            }
            Err(e) => {
                warn!(error = %e, "Error getting flow metadata, using page fallback");
                Ok(self.from_page(flow_id, flow_def_id))
            }
        }
    }

    async fn fetch_definition(
        &self,
        flow_def_id: &str,
    ) -> Result<Option<FlowDefinitionRecord>, SalesforceError> {
        let soql = format!(
            "SELECT Id, DeveloperName, MasterLabel, ActiveVersionId, LatestVersionId \
             FROM FlowDefinition WHERE Id = '{}'",
            flow_def_id
        );
        let records = self.conn.tooling_query(&soql).await?;
        debug!(count = records.len(), "FlowDefinition records");

        records
            .into_iter()
            .next()
            .map(|r| serde_json::from_value(r).map_err(|e| SalesforceError::Decode(e.to_string())))
            .transpose()
    }

    async fn fetch_flow(&self, flow_id: &str) -> Result<FlowRecord, SalesforceError> {
        let path = format!(
            "/services/data/v{}/tooling/sobjects/Flow/{}",
            self.conn.api_version(),
            flow_id
        );
        let body = self.conn.rest(&path).await?;
        serde_json::from_value(body).map_err(|e| SalesforceError::Decode(e.to_string()))
    }

    fn from_record(
        &self,
        flow_id: &str,
        flow_def_id: &str,
        record: FlowRecord,
        definition: Option<FlowDefinitionRecord>,
    ) -> FlowInfo {
        let definition = definition.unwrap_or_default();

        let name = non_empty(record.full_name)
            .or_else(|| non_empty(record.master_label))
            .or_else(|| non_empty(definition.master_label))
            .or_else(|| non_empty(definition.developer_name))
            .unwrap_or_else(|| self.page_name());
        let flow_type = non_empty(record.process_type).unwrap_or_else(|| self.page_type());
        let status = non_empty(record.status).unwrap_or_else(|| self.page_status());

        let info = FlowInfo::new(flow_id, flow_def_id, name)
            .with_type(flow_type)
            .with_status(status);
        match record.metadata {
            Some(Value::Null) | None => info,
            Some(metadata) => info.with_xml_data(metadata),
        }
    }

    fn from_page(&self, flow_id: &str, flow_def_id: &str) -> FlowInfo {
        FlowInfo::new(flow_id, flow_def_id, self.page_name())
            .with_type(self.page_type())
            .with_status(self.page_status())
    }

    fn page_name(&self) -> String {
        self.page
            .as_ref()
            .map(|p| p.flow_name())
            .unwrap_or_else(|| "Unknown Flow".to_string())
    }

    fn page_type(&self) -> String {
        self.page.as_ref().map(|p| p.flow_type()).unwrap_or("Unknown").to_string()
    }

    fn page_status(&self) -> String {
        self.page.as_ref().map(|p| p.flow_status()).unwrap_or("Unknown").to_string()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEF_ID: &str = "300000000000001AAA";
    const FLOW_ID: &str = "301000000000001AAA";

    fn connection(server: &MockServer) -> Connection {
        Connection::new(&server.uri(), "SESSION", "60.0", Duration::from_secs(5)).unwrap()
    }

    async fn mount_definition(server: &MockServer, records: Value) {
        Mock::given(method("GET"))
            .and(path("/services/data/v60.0/tooling/query/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": records })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_load_from_tooling_api() {
        let server = MockServer::start().await;
        mount_definition(&server, json!([{"DeveloperName": "Case_Router", "MasterLabel": "Case Router"}])).await;
        Mock::given(method("GET"))
            .and(path(format!("/services/data/v60.0/tooling/sobjects/Flow/{}", FLOW_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "FullName": "Case_Router-3",
                "MasterLabel": "Case Router",
                "ProcessType": "AutoLaunchedFlow",
                "Status": "Active",
                "Metadata": {"apiVersion": 60.0, "description": "Routes cases"}
            })))
            .mount(&server)
            .await;

        let conn = connection(&server);
        let flow = MetadataLoader::new(&conn)
            .load(Some(DEF_ID), Some(FLOW_ID))
            .await
            .unwrap();

        assert_eq!(flow.id, FLOW_ID);
        assert_eq!(flow.definition_id, DEF_ID);
        assert_eq!(flow.name, "Case_Router-3");
        assert_eq!(flow.flow_type, "AutoLaunchedFlow");
        assert_eq!(flow.status, "Active");
        assert_eq!(flow.description(), Some("Routes cases"));
    }

    #[tokio::test]
    async fn test_name_falls_back_to_definition_label() {
        let server = MockServer::start().await;
        mount_definition(&server, json!([{"DeveloperName": "Case_Router", "MasterLabel": "Case Router"}])).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/services/data/v60\.0/tooling/sobjects/Flow/.+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "FullName": "",
                "ProcessType": "Flow",
                "Status": "Draft",
                "Metadata": null
            })))
            .mount(&server)
            .await;

        let conn = connection(&server);
        let flow = MetadataLoader::new(&conn)
            .load(Some(DEF_ID), Some(FLOW_ID))
            .await
            .unwrap();

        assert_eq!(flow.name, "Case Router");
        assert!(flow.xml_data.is_none());
    }

    #[tokio::test]
    async fn test_api_failure_uses_page_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let page = PageSnapshot::from_html(
            "<title>Lead Intake - Flow Builder</title><body>Process Builder Draft</body>",
        );
        let conn = connection(&server);
        let flow = MetadataLoader::new(&conn)
            .with_page(page)
            .load(Some(DEF_ID), Some(FLOW_ID))
            .await
            .unwrap();

        assert_eq!(flow.name, "Lead Intake");
        assert_eq!(flow.flow_type, "Workflow");
        assert_eq!(flow.status, "Draft");
        assert!(flow.xml_data.is_none());
    }

    #[tokio::test]
    async fn test_api_failure_without_page_uses_unknowns() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let conn = connection(&server);
        let flow = MetadataLoader::new(&conn)
            .load(Some(DEF_ID), Some(FLOW_ID))
            .await
            .unwrap();

        assert_eq!(flow.name, "Unknown Flow");
        assert_eq!(flow.flow_type, "Unknown");
        assert_eq!(flow.status, "Unknown");
    }

    #[tokio::test]
    async fn test_missing_and_invalid_ids() {
        let server = MockServer::start().await;
        let conn = connection(&server);
        let loader = MetadataLoader::new(&conn);

        assert!(matches!(
            loader.load(None, Some(FLOW_ID)).await,
            Err(SalesforceError::MissingFlowIds)
        ));
        assert!(matches!(
            loader.load(Some(DEF_ID), Some("")).await,
            Err(SalesforceError::MissingFlowIds)
        ));
        assert!(matches!(
            loader.load(Some("x' OR Id != '"), Some(FLOW_ID)).await,
            Err(SalesforceError::InvalidId(_))
        ));
    }
}
