//! Operations the agent can perform against the remote instance
//!
//! The planner names operations at runtime, but dispatch only ever happens
//! for the closed set of [`Operation`] variants. A planner request is turned
//! into an [`OperationCall`] by [`OperationCatalog::resolve`], which is the
//! single gate between free-form model output and the remote gateway.

pub mod catalog;
pub mod result;

pub use catalog::{OperationCatalog, OperationSchema, ParamSpec, ParamType, SchemaViolation};
pub use result::{Failure, FailureKind, OperationResult, ResultStatus};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Every operation the remote gateway knows how to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Query any table with an encoded query
    QueryRecords,
    /// Fetch one record by sys_id
    GetRecord,
    /// Insert a record
    CreateRecord,
    /// Patch a record by sys_id
    UpdateRecord,
    /// Delete a record by sys_id
    DeleteRecord,
    /// Field definitions of a table (sys_dictionary)
    GetTableSchema,
    /// Find tables by name or label (sys_db_object)
    SearchTables,
    /// In-progress update sets
    GetUpdateSets,
    /// Active application scopes
    GetApplicationScopes,
}

impl Operation {
    /// All operations, in catalog order
    pub const ALL: [Operation; 9] = [
        Operation::QueryRecords,
        Operation::GetRecord,
        Operation::CreateRecord,
        Operation::UpdateRecord,
        Operation::DeleteRecord,
        Operation::GetTableSchema,
        Operation::SearchTables,
        Operation::GetUpdateSets,
        Operation::GetApplicationScopes,
    ];

    /// Wire name used in tool definitions and planner requests
    pub fn name(&self) -> &'static str {
        match self {
            Self::QueryRecords => "query_records",
            Self::GetRecord => "get_record",
            Self::CreateRecord => "create_record",
            Self::UpdateRecord => "update_record",
            Self::DeleteRecord => "delete_record",
            Self::GetTableSchema => "get_table_schema",
            Self::SearchTables => "search_tables",
            Self::GetUpdateSets => "get_update_sets",
            Self::GetApplicationScopes => "get_application_scopes",
        }
    }

    /// Look up an operation by its wire name
    ///
    /// # Examples
    ///
    /// ```
    /// use snow_agent::operations::Operation;
    ///
    /// assert_eq!(Operation::from_name("get_record"), Some(Operation::GetRecord));
    /// assert_eq!(Operation::from_name("drop_table"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Whether the operation changes remote state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateRecord | Self::UpdateRecord | Self::DeleteRecord
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One unit of work requested by the planner, as emitted
///
/// Nothing about a request is trusted: the name may be unknown and the
/// parameters may be any JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Correlates the eventual result with this request
    pub request_id: String,
    /// Operation name as chosen by the planner
    pub operation_name: String,
    /// Raw arguments
    pub parameters: Value,
}

impl OperationRequest {
    /// Create a new request
    ///
    /// # Examples
    ///
    /// ```
    /// use snow_agent::operations::OperationRequest;
    ///
    /// let req = OperationRequest::new("toolu_1", "get_record", serde_json::json!({}));
    /// assert_eq!(req.operation_name, "get_record");
    /// ```
    pub fn new(
        request_id: impl Into<String>,
        operation_name: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            operation_name: operation_name.into(),
            parameters,
        }
    }
}

/// A request that passed catalog validation and may be dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct OperationCall {
    /// Id of the originating request
    pub request_id: String,
    /// Resolved operation
    pub operation: Operation,
    /// Validated parameters (absent/null optionals removed)
    pub parameters: Map<String, Value>,
}

impl OperationCall {
    /// Returns a string parameter, if present
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }
}
