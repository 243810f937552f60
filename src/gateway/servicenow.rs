//! ServiceNow Table API client
//!
//! Every call goes to `/api/now/table/{table}[/{sys_id}]` with basic auth.
//! Responses are unwrapped from the `result` envelope; errors are turned
//! into [`Failure`] values and never retried.

use crate::config::ServiceNowConfig;
use crate::error::{Result, SnowAgentError};
use crate::gateway::{Gateway, GatewayOutcome};
use crate::operations::{Failure, FailureKind, Operation, OperationCall};

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Payload returned for a 204 response
pub const NO_CONTENT_MESSAGE: &str = "Operation completed (no content returned)";

const MAX_QUERY_LIMIT: u32 = 1000;
const MAX_ERROR_DETAIL_CHARS: usize = 500;

/// Table names and sys_ids are interpolated into the URL path
const PATH_SEGMENT_PATTERN: &str = r"^[A-Za-z0-9_\-]{1,128}$";

/// Options for a table query
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Encoded query, e.g. `active=true^priority=1`
    pub query: Option<String>,
    /// Fields to return
    pub fields: Option<Vec<String>>,
    /// Maximum records (defaults to 10, capped at 1000)
    pub limit: Option<u32>,
    /// Pagination offset
    pub offset: Option<u32>,
    /// Return display values
    pub display_value: bool,
    /// Field to order by
    pub order_by: Option<String>,
}

impl QueryOptions {
    fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn display_values(mut self) -> Self {
        self.display_value = true;
        self
    }

    /// Query-string parameters for this query
    ///
    /// # Examples
    ///
    /// ```
    /// use snow_agent::gateway::QueryOptions;
    ///
    /// let options = QueryOptions {
    ///     query: Some("active=true".to_string()),
    ///     order_by: Some("number".to_string()),
    ///     limit: Some(5000),
    ///     ..Default::default()
    /// };
    /// let params = options.to_params();
    /// assert!(params.contains(&("sysparm_limit", "1000".to_string())));
    /// assert!(params.contains(&("sysparm_query", "active=true^ORDERBYnumber".to_string())));
    /// ```
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            (
                "sysparm_limit",
                self.limit.unwrap_or(10).min(MAX_QUERY_LIMIT).to_string(),
            ),
            ("sysparm_offset", self.offset.unwrap_or(0).to_string()),
        ];

        let query = self.query.as_deref().filter(|q| !q.is_empty());
        let order_by = self.order_by.as_deref().filter(|o| !o.is_empty());
        match (query, order_by) {
            (Some(q), Some(o)) => params.push(("sysparm_query", format!("{}^ORDERBY{}", q, o))),
            (Some(q), None) => params.push(("sysparm_query", q.to_string())),
            (None, Some(o)) => params.push(("sysparm_query", format!("ORDERBY{}", o))),
            (None, None) => {}
        }

        if let Some(fields) = self.fields.as_ref().filter(|f| !f.is_empty()) {
            params.push(("sysparm_fields", fields.join(",")));
        }
        if self.display_value {
            params.push(("sysparm_display_value", "true".to_string()));
        }

        params
    }
}

#[derive(Debug, Deserialize)]
struct QueryRecordsArgs {
    table: String,
    #[serde(flatten)]
    options: QueryOptions,
}

#[derive(Debug, Deserialize)]
struct GetRecordArgs {
    table: String,
    sys_id: String,
    #[serde(default)]
    fields: Option<Vec<String>>,
    #[serde(default)]
    display_value: bool,
}

#[derive(Debug, Deserialize)]
struct CreateRecordArgs {
    table: String,
    data: Map<String, Value>,
    #[serde(default)]
    input_display_value: bool,
}

#[derive(Debug, Deserialize)]
struct UpdateRecordArgs {
    table: String,
    sys_id: String,
    data: Map<String, Value>,
    #[serde(default)]
    input_display_value: bool,
}

#[derive(Debug, Deserialize)]
struct RecordRef {
    table: String,
    sys_id: String,
}

#[derive(Debug, Deserialize)]
struct TableArgs {
    table: String,
}

#[derive(Debug, Deserialize)]
struct SearchTablesArgs {
    search_term: String,
    #[serde(default = "default_list_limit")]
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct UpdateSetArgs {
    #[serde(default = "default_update_set_state")]
    state: String,
    #[serde(default = "default_list_limit")]
    limit: u32,
}

fn default_list_limit() -> u32 {
    20
}

fn default_update_set_state() -> String {
    "in progress".to_string()
}

/// Client for the ServiceNow Table API
///
/// Cheap to clone; clones share the underlying connection pool.
///
/// # Examples
///
/// ```
/// use snow_agent::config::ServiceNowConfig;
/// use snow_agent::gateway::ServiceNowClient;
///
/// let config = ServiceNowConfig {
///     instance: "dev12345".to_string(),
///     username: "admin".to_string(),
///     password: "secret".to_string(),
///     ..Default::default()
/// };
/// let client = ServiceNowClient::new(&config).unwrap();
/// assert_eq!(client.base_url(), "https://dev12345.service-now.com");
/// ```
#[derive(Debug, Clone)]
pub struct ServiceNowClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    segment_pattern: Regex,
}

impl ServiceNowClient {
    /// Create a client from connection settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the derived base URL is invalid or
    /// the HTTP client cannot be built
    pub fn new(config: &ServiceNowConfig) -> Result<Self> {
        let base_url = config.base_url();
        url::Url::parse(&base_url).map_err(|e| {
            SnowAgentError::Config(format!("Invalid instance URL '{}': {}", base_url, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("snow-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SnowAgentError::Config(format!("Failed to create HTTP client: {}", e)))?;
        let segment_pattern = Regex::new(PATH_SEGMENT_PATTERN)
            .map_err(|e| SnowAgentError::Config(format!("Invalid path pattern: {}", e)))?;

        tracing::info!("Initialized ServiceNow client: {}", base_url);

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            segment_pattern,
        })
    }

    /// Instance base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query records from any table
    pub async fn query_records(&self, table: &str, options: &QueryOptions) -> GatewayOutcome {
        let table = self.check_segment("table", table)?;
        self.send(Method::GET, table, &options.to_params(), None)
            .await
    }

    /// Fetch a single record by sys_id
    pub async fn get_record(
        &self,
        table: &str,
        sys_id: &str,
        fields: Option<&[String]>,
        display_value: bool,
    ) -> GatewayOutcome {
        let path = self.record_path(table, sys_id)?;
        let mut params = Vec::new();
        if let Some(fields) = fields.filter(|f| !f.is_empty()) {
            params.push(("sysparm_fields", fields.join(",")));
        }
        if display_value {
            params.push(("sysparm_display_value", "true".to_string()));
        }
        self.send(Method::GET, &path, &params, None).await
    }

    /// Insert a record
    pub async fn create_record(
        &self,
        table: &str,
        data: &Map<String, Value>,
        input_display_value: bool,
    ) -> GatewayOutcome {
        let table = self.check_segment("table", table)?;
        let mut params = Vec::new();
        if input_display_value {
            params.push(("sysparm_input_display_value", "true".to_string()));
        }
        let body = Value::Object(data.clone());
        self.send(Method::POST, table, &params, Some(&body)).await
    }

    /// Patch a record by sys_id
    pub async fn update_record(
        &self,
        table: &str,
        sys_id: &str,
        data: &Map<String, Value>,
        input_display_value: bool,
    ) -> GatewayOutcome {
        let path = self.record_path(table, sys_id)?;
        let mut params = Vec::new();
        if input_display_value {
            params.push(("sysparm_input_display_value", "true".to_string()));
        }
        let body = Value::Object(data.clone());
        self.send(Method::PATCH, &path, &params, Some(&body)).await
    }

    /// Delete a record by sys_id
    pub async fn delete_record(&self, table: &str, sys_id: &str) -> GatewayOutcome {
        let path = self.record_path(table, sys_id)?;
        self.send(Method::DELETE, &path, &[], None).await
    }

    /// Field definitions of a table, from sys_dictionary
    pub async fn get_table_schema(&self, table: &str) -> GatewayOutcome {
        let table = self.check_segment("table", table)?;
        let options = QueryOptions::with_query(format!(
            "name={}^active=true^elementISNOTEMPTY",
            table
        ))
        .fields(&[
            "element",
            "column_label",
            "internal_type",
            "max_length",
            "mandatory",
            "read_only",
            "reference",
            "default_value",
            "comments",
            "active",
        ])
        .limit(500)
        .display_values();
        self.query_records("sys_dictionary", &options).await
    }

    /// Tables whose name or label contains `search_term`
    pub async fn search_tables(&self, search_term: &str, limit: u32) -> GatewayOutcome {
        if search_term.trim().is_empty() || search_term.contains('^') {
            return Err(Failure::new(
                FailureKind::InvalidRequest,
                "search_term must be non-empty and must not contain '^'",
            ));
        }
        let options = QueryOptions::with_query(format!(
            "nameLIKE{0}^ORlabelLIKE{0}^super_classISNOTEMPTY",
            search_term
        ))
        .fields(&["name", "label", "super_class", "sys_scope", "is_extendable"])
        .limit(limit)
        .display_values();
        self.query_records("sys_db_object", &options).await
    }

    /// Update sets in the given state, ordered by name
    pub async fn get_update_sets(&self, state: &str, limit: u32) -> GatewayOutcome {
        let mut options = QueryOptions::with_query(format!("state={}", state))
            .fields(&[
                "name",
                "description",
                "state",
                "sys_created_by",
                "sys_created_on",
            ])
            .limit(limit)
            .display_values();
        options.order_by = Some("name".to_string());
        self.query_records("sys_update_set", &options).await
    }

    /// Active application scopes
    pub async fn get_application_scopes(&self) -> GatewayOutcome {
        let options = QueryOptions::with_query("active=true")
            .fields(&["name", "scope", "version", "active"])
            .limit(100)
            .display_values();
        self.query_records("sys_scope", &options).await
    }

    /// Fetch one user record to prove the credentials work
    pub async fn test_connection(&self) -> GatewayOutcome {
        let options = QueryOptions::default()
            .fields(&["user_name", "name", "email", "roles"])
            .limit(1);
        self.query_records("sys_user", &options).await
    }

    fn check_segment<'a>(
        &self,
        name: &str,
        value: &'a str,
    ) -> std::result::Result<&'a str, Failure> {
        if self.segment_pattern.is_match(value) {
            Ok(value)
        } else {
            Err(Failure::new(
                FailureKind::InvalidRequest,
                format!(
                    "{} '{}' may only contain letters, digits, '_' and '-'",
                    name, value
                ),
            ))
        }
    }

    fn record_path(&self, table: &str, sys_id: &str) -> std::result::Result<String, Failure> {
        let table = self.check_segment("table", table)?;
        let sys_id = self.check_segment("sys_id", sys_id)?;
        Ok(format!("{}/{}", table, sys_id))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> GatewayOutcome {
        let url = format!("{}/api/now/table/{}", self.base_url, path);
        tracing::debug!(%method, %url, "ServiceNow request");

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, "application/json")
            .query(params);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("ServiceNow request failed: {}", e);
            transport_failure(&e)
        })?;

        handle_response(response).await
    }
}

#[async_trait]
impl Gateway for ServiceNowClient {
    async fn invoke(&self, call: &OperationCall) -> GatewayOutcome {
        tracing::info!(
            operation = %call.operation,
            request_id = %call.request_id,
            "Dispatching operation"
        );
        let params = Value::Object(call.parameters.clone());

        let outcome = match call.operation {
            Operation::QueryRecords => {
                let args: QueryRecordsArgs = decode(params)?;
                self.query_records(&args.table, &args.options).await
            }
            Operation::GetRecord => {
                let args: GetRecordArgs = decode(params)?;
                self.get_record(
                    &args.table,
                    &args.sys_id,
                    args.fields.as_deref(),
                    args.display_value,
                )
                .await
            }
            Operation::CreateRecord => {
                let args: CreateRecordArgs = decode(params)?;
                self.create_record(&args.table, &args.data, args.input_display_value)
                    .await
            }
            Operation::UpdateRecord => {
                let args: UpdateRecordArgs = decode(params)?;
                self.update_record(
                    &args.table,
                    &args.sys_id,
                    &args.data,
                    args.input_display_value,
                )
                .await
            }
            Operation::DeleteRecord => {
                let args: RecordRef = decode(params)?;
                self.delete_record(&args.table, &args.sys_id).await
            }
            Operation::GetTableSchema => {
                let args: TableArgs = decode(params)?;
                self.get_table_schema(&args.table).await
            }
            Operation::SearchTables => {
                let args: SearchTablesArgs = decode(params)?;
                self.search_tables(&args.search_term, args.limit).await
            }
            Operation::GetUpdateSets => {
                let args: UpdateSetArgs = decode(params)?;
                self.get_update_sets(&args.state, args.limit).await
            }
            Operation::GetApplicationScopes => self.get_application_scopes().await,
        };

        if let Err(failure) = &outcome {
            tracing::warn!(operation = %call.operation, "Operation failed: {}", failure);
        }
        outcome
    }
}

fn decode<T: DeserializeOwned>(params: Value) -> std::result::Result<T, Failure> {
    serde_json::from_value(params).map_err(|e| {
        Failure::new(
            FailureKind::InvalidRequest,
            format!("Invalid parameters: {}", e),
        )
    })
}

fn transport_failure(error: &reqwest::Error) -> Failure {
    if error.is_timeout() {
        Failure::new(FailureKind::Timeout, "Request timed out")
    } else {
        Failure::new(FailureKind::Network, format!("Request failed: {}", error))
    }
}

fn failure_kind_for_status(status: StatusCode) -> FailureKind {
    match status.as_u16() {
        401 | 403 => FailureKind::Auth,
        404 => FailureKind::NotFound,
        500..=599 => FailureKind::Server,
        _ => FailureKind::Rejected,
    }
}

async fn handle_response(response: Response) -> GatewayOutcome {
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return Ok(json!({ "message": NO_CONTENT_MESSAGE }));
    }

    let text = response.text().await.map_err(|e| {
        Failure::new(
            FailureKind::Decode,
            format!("Failed to read response body: {}", e),
        )
        .with_status(status.as_u16())
    })?;

    if status.is_success() {
        return Ok(match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(mut body)) if body.contains_key("result") => {
                body.remove("result").unwrap_or(Value::Null)
            }
            Ok(body) => body,
            Err(_) => Value::String(text),
        });
    }

    let mut message = format!("HTTP {}", status.as_u16());
    let mut detail = None;
    match serde_json::from_str::<Value>(&text) {
        Ok(body) => {
            let error = &body["error"];
            if let Some(m) = error["message"].as_str() {
                message = m.to_string();
            }
            detail = error["detail"]
                .as_str()
                .filter(|d| !d.is_empty())
                .map(str::to_string);
        }
        Err(_) if !text.trim().is_empty() => {
            detail = Some(text.chars().take(MAX_ERROR_DETAIL_CHARS).collect());
        }
        Err(_) => {}
    }

    let mut failure =
        Failure::new(failure_kind_for_status(status), message).with_status(status.as_u16());
    failure.detail = detail;
    Err(failure)
}
