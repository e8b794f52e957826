//! Airtable REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{RecordPage, RemoteStore, MAX_BATCH_SIZE};
use crate::config::AirtableConfig;
use crate::models::{
    field_map_to_json, FieldMap, FieldSchema, FieldSpec, RemoteId, StoredRecord, TableId,
    TableSchema,
};
use crate::util::{compact_text, sanitize};
use crate::{Error, Result};

#[derive(Clone)]
pub struct AirtableClient {
    client: reqwest::Client,
    api_url: String,
    base_id: String,
    token: String,
}

impl std::fmt::Debug for AirtableClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AirtableClient")
            .field("api_url", &self.api_url)
            .field("base_id", &self.base_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TablesResponse {
    tables: Vec<TableSchema>,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<StoredRecord>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Serialize)]
struct CreateTableRequest<'a> {
    name: &'a str,
    fields: &'a [FieldSpec],
}

impl AirtableClient {
    pub fn new(config: &AirtableConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| {
                Error::Config(format!("failed to build HTTP client: {}", sanitize(&error)))
            })?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            base_id: config.base_id.clone(),
            token: config.token.clone(),
        })
    }

    fn meta_url(&self, suffix: &str) -> String {
        format!("{}/v0/meta/bases/{}/{suffix}", self.api_url, self.base_id)
    }

    fn table_url(&self, table: &TableId) -> String {
        format!(
            "{}/v0/{}/{}",
            self.api_url,
            self.base_id,
            urlencoding::encode(table.as_str())
        )
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|error| {
            Error::transport(format!("{operation} request failed: {}", sanitize(&error)))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(format!(
                "{operation} failed: {}",
                parse_api_error(status, &body)
            )));
        }

        response.json::<T>().await.map_err(|error| {
            Error::transport(format!(
                "{operation} returned an unreadable payload: {}",
                sanitize(&error)
            ))
        })
    }
}

#[async_trait]
impl RemoteStore for AirtableClient {
    async fn list_tables(&self) -> Result<Vec<TableSchema>> {
        let response: TablesResponse = self
            .send("list tables", Method::GET, &self.meta_url("tables"), None)
            .await?;
        Ok(response.tables)
    }

    async fn create_table(&self, name: &str, fields: &[FieldSpec]) -> Result<TableSchema> {
        let body = serde_json::to_value(CreateTableRequest { name, fields })?;
        self.send(
            "create table",
            Method::POST,
            &self.meta_url("tables"),
            Some(body),
        )
        .await
    }

    async fn create_field(&self, table: &TableId, field: &FieldSpec) -> Result<FieldSchema> {
        let url = self.meta_url(&format!(
            "tables/{}/fields",
            urlencoding::encode(table.as_str())
        ));
        let body = serde_json::to_value(field)?;
        self.send("create field", Method::POST, &url, Some(body))
            .await
    }

    async fn list_records(&self, table: &TableId, offset: Option<&str>) -> Result<RecordPage> {
        let mut url = self.table_url(table);
        if let Some(offset) = offset {
            url.push_str("?offset=");
            url.push_str(&urlencoding::encode(offset));
        }
        let response: RecordsResponse = self
            .send("list records", Method::GET, &url, None)
            .await?;
        Ok(RecordPage {
            records: response.records,
            offset: response.offset,
        })
    }

    async fn create_records(
        &self,
        table: &TableId,
        records: &[FieldMap],
    ) -> Result<Vec<StoredRecord>> {
        check_batch_size(records.len())?;
        let records = records
            .iter()
            .map(|fields| json!({ "fields": field_map_to_json(fields) }))
            .collect::<Vec<_>>();
        let response: RecordsResponse = self
            .send(
                "create records",
                Method::POST,
                &self.table_url(table),
                Some(json!({ "records": records })),
            )
            .await?;
        Ok(response.records)
    }

    async fn update_records(
        &self,
        table: &TableId,
        records: &[(RemoteId, FieldMap)],
    ) -> Result<Vec<StoredRecord>> {
        check_batch_size(records.len())?;
        let records = records
            .iter()
            .map(|(id, fields)| json!({ "id": id, "fields": field_map_to_json(fields) }))
            .collect::<Vec<_>>();
        let response: RecordsResponse = self
            .send(
                "update records",
                Method::PATCH,
                &self.table_url(table),
                Some(json!({ "records": records })),
            )
            .await?;
        Ok(response.records)
    }

    async fn delete_record(&self, table: &TableId, record: &RemoteId) -> Result<()> {
        let url = format!(
            "{}/{}",
            self.table_url(table),
            urlencoding::encode(record.as_str())
        );
        let response: DeleteResponse = self
            .send("delete record", Method::DELETE, &url, None)
            .await?;
        if response.deleted {
            Ok(())
        } else {
            Err(Error::transport(format!(
                "delete record {record} was not acknowledged"
            )))
        }
    }
}

fn check_batch_size(len: usize) -> Result<()> {
    if len > MAX_BATCH_SIZE {
        return Err(Error::InvalidInput(format!(
            "batch of {len} records exceeds the limit of {MAX_BATCH_SIZE}"
        )));
    }
    Ok(())
}

/// Airtable reports errors as `{"error": {"type": ..., "message": ...}}` or
/// `{"error": "NOT_FOUND"}`.
fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &payload["error"];
        let message = error["message"]
            .as_str()
            .or_else(|| error["type"].as_str())
            .or_else(|| error.as_str());
        if let Some(message) = message {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AirtableConfig {
        AirtableConfig {
            api_url: "https://api.airtable.com/".to_string(),
            base_id: "appBase".to_string(),
            token: "secret".to_string(),
        }
    }

    #[test]
    fn urls_follow_airtable_layout() {
        let client = AirtableClient::new(&config(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.meta_url("tables"),
            "https://api.airtable.com/v0/meta/bases/appBase/tables"
        );
        assert_eq!(
            client.table_url(&TableId("tbl 1".to_string())),
            "https://api.airtable.com/v0/appBase/tbl%201"
        );
    }

    #[test]
    fn debug_redacts_token() {
        let client = AirtableClient::new(&config(), Duration::from_secs(5)).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn parse_api_error_reads_nested_message() {
        let body = r#"{"error": {"type": "INVALID_REQUEST_UNKNOWN", "message": "Invalid request"}}"#;
        assert_eq!(
            parse_api_error(StatusCode::UNPROCESSABLE_ENTITY, body),
            "Invalid request (422)"
        );
    }

    #[test]
    fn parse_api_error_reads_flat_error_and_empty_body() {
        assert_eq!(
            parse_api_error(StatusCode::NOT_FOUND, r#"{"error": "NOT_FOUND"}"#),
            "NOT_FOUND (404)"
        );
        assert_eq!(
            parse_api_error(StatusCode::TOO_MANY_REQUESTS, ""),
            "HTTP 429"
        );
    }

    #[test]
    fn batch_size_is_capped() {
        assert!(check_batch_size(10).is_ok());
        assert!(check_batch_size(11).is_err());
    }

    #[test]
    fn records_response_parses_offset() {
        let payload = r#"{"records": [{"id": "rec1", "fields": {"Id": "U1"}}], "offset": "itr/rec1"}"#;
        let response: RecordsResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(response.records.len(), 1);
        assert_eq!(response.offset.as_deref(), Some("itr/rec1"));
    }
}
