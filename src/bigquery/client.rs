use super::WarehouseOperations;
use super::auth::GcpAuth;
use super::schema::{fields_json, merge_sql, missing_fields, rows_parameter, table_fields};
use crate::config::BigQueryConfig;
use crate::error::{AppError, Result};
use crate::mapping::SourceSpec;
use crate::models::TargetRow;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument};

const API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// How long one MERGE job may run before we give up on the synchronous
/// query path and report the chunk as failed.
const QUERY_TIMEOUT_MS: u64 = 60_000;

/// Bound on any single API request. Must exceed `QUERY_TIMEOUT_MS` so a
/// long-running query job is ended by the job timeout, not the socket.
const HTTP_TIMEOUT: Duration = Duration::from_secs(90);

pub struct BigQueryClient {
    http: reqwest::Client,
    auth: GcpAuth,
    project_id: String,
    dataset_id: String,
    location: String,
}

impl BigQueryClient {
    /// Create a new BigQueryClient with authenticated access
    #[instrument(name = "Authenticating to BigQuery", skip_all)]
    pub async fn new(config: &BigQueryConfig) -> Result<Self> {
        let auth = GcpAuth::new(&config.service_account_key).await?;

        Ok(Self {
            http: reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?,
            auth,
            project_id: config.project_id.clone(),
            dataset_id: config.dataset_id.clone(),
            location: config.location.clone(),
        })
    }

    fn project_url(&self, suffix: &str) -> String {
        format!("{}/projects/{}{}", API_BASE, self.project_id, suffix)
    }

    fn dataset_url(&self, suffix: &str) -> String {
        self.project_url(&format!("/datasets/{}{}", self.dataset_id, suffix))
    }

    async fn get_json(&self, url: &str) -> Result<Option<Value>> {
        let token = self.auth.bearer_token().await?;
        let response = self.http.get(url).bearer_auth(&token).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Load(format!(
                    "GET {} failed: {} - {}",
                    url, status, body
                )))
            }
        }
    }

    async fn send_json(&self, method: reqwest::Method, url: &str, body: &Value) -> Result<Value> {
        let token = self.auth.bearer_token().await?;
        let response = self
            .http
            .request(method.clone(), url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Load(format!(
                "{} {} failed: {} - {}",
                method, url, status, text
            )));
        }

        Ok(response.json().await?)
    }

    async fn ensure_dataset(&self) -> Result<()> {
        if self.get_json(&self.dataset_url("")).await?.is_some() {
            debug!(dataset = self.dataset_id, "Dataset already exists");
            return Ok(());
        }

        let body = json!({
            "datasetReference": {
                "projectId": self.project_id,
                "datasetId": self.dataset_id,
            },
            "location": self.location,
        });
        self.send_json(reqwest::Method::POST, &self.project_url("/datasets"), &body)
            .await?;
        info!(dataset = self.dataset_id, "Created dataset");

        Ok(())
    }

    async fn create_table(&self, spec: &SourceSpec) -> Result<()> {
        let fields = table_fields(spec);
        let body = json!({
            "tableReference": {
                "projectId": self.project_id,
                "datasetId": self.dataset_id,
                "tableId": spec.table,
            },
            "schema": { "fields": fields_json(&fields) },
        });
        self.send_json(reqwest::Method::POST, &self.dataset_url("/tables"), &body)
            .await?;
        info!(table = spec.table, "Created table");

        Ok(())
    }

    /// Append desired-but-missing columns to the live schema. The patch
    /// carries the existing fields untouched plus the new ones.
    async fn patch_missing_columns(&self, spec: &SourceSpec, table: Value) -> Result<()> {
        let existing_fields = table["schema"]["fields"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let existing_names: HashSet<String> = existing_fields
            .iter()
            .filter_map(|f| f["name"].as_str().map(|s| s.to_string()))
            .collect();

        let desired = table_fields(spec);
        let missing = missing_fields(&existing_names, &desired);
        if missing.is_empty() {
            return Ok(());
        }

        let mut fields = existing_fields;
        if let Value::Array(new_fields) = fields_json(&missing) {
            fields.extend(new_fields);
        }

        let url = self.dataset_url(&format!("/tables/{}", spec.table));
        let body = json!({ "schema": { "fields": fields } });
        self.send_json(reqwest::Method::PATCH, &url, &body).await?;
        info!(
            table = spec.table,
            added = missing.len(),
            "Added missing columns"
        );

        Ok(())
    }
}

#[async_trait]
impl WarehouseOperations for BigQueryClient {
    #[instrument(name = "Ensuring warehouse schema", skip_all, fields(table = spec.table))]
    async fn ensure_schema(&self, spec: &SourceSpec) -> Result<()> {
        self.ensure_dataset().await?;

        let url = self.dataset_url(&format!("/tables/{}", spec.table));
        match self.get_json(&url).await? {
            Some(table) => self.patch_missing_columns(spec, table).await,
            None => self.create_table(spec).await,
        }
    }

    #[instrument(name = "Merging chunk", skip_all, fields(table = spec.table, rows = rows.len()))]
    async fn upsert(&self, spec: &SourceSpec, rows: &[TargetRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let body = json!({
            "query": merge_sql(&self.project_id, &self.dataset_id, spec),
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": [rows_parameter(spec, rows)],
            "location": self.location,
            "timeoutMs": QUERY_TIMEOUT_MS,
        });

        let response = self
            .send_json(reqwest::Method::POST, &self.project_url("/queries"), &body)
            .await?;

        if response["jobComplete"] != Value::Bool(true) {
            return Err(AppError::Load(format!(
                "Merge into {} did not complete within {}ms",
                spec.table, QUERY_TIMEOUT_MS
            )));
        }

        if let Some(errors) = response["errors"].as_array() {
            if !errors.is_empty() {
                return Err(AppError::Load(format!(
                    "Merge into {} reported errors: {}",
                    spec.table,
                    Value::Array(errors.clone())
                )));
            }
        }

        debug!(table = spec.table, rows = rows.len(), "Chunk merged");

        Ok(())
    }
}
