//! Operation catalog: parameter schemas, validation and tool definitions
//!
//! The catalog is built once at startup and never changes afterwards. It is
//! the only place that knows which parameters each operation accepts.

use super::{Failure, FailureKind, Operation, OperationCall, OperationRequest};
use serde_json::{json, Map, Value};
use std::fmt;

/// Structural type of a single parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// JSON string
    String,
    /// JSON integer
    Integer,
    /// JSON boolean
    Boolean,
    /// One of a fixed set of strings
    Enum(&'static [&'static str]),
    /// JSON object with arbitrary field/value pairs
    Mapping,
    /// JSON array of strings
    StringList,
}

impl ParamType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Enum(allowed) => value.as_str().map_or(false, |s| allowed.contains(&s)),
            Self::Mapping => value.is_object(),
            Self::StringList => value
                .as_array()
                .map_or(false, |items| items.iter().all(Value::is_string)),
        }
    }

    fn json_schema(&self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Integer => json!({ "type": "integer" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::Enum(allowed) => json!({ "type": "string", "enum": allowed }),
            Self::Mapping => json!({ "type": "object" }),
            Self::StringList => json!({ "type": "array", "items": { "type": "string" } }),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("a string"),
            Self::Integer => f.write_str("an integer"),
            Self::Boolean => f.write_str("a boolean"),
            Self::Enum(allowed) => write!(f, "one of [{}]", allowed.join(", ")),
            Self::Mapping => f.write_str("an object"),
            Self::StringList => f.write_str("an array of strings"),
        }
    }
}

/// One named parameter of an operation
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Parameter name
    pub name: &'static str,
    /// Expected type
    pub param_type: ParamType,
    /// Whether the parameter must be present and non-null
    pub required: bool,
    /// Description shown to the planner
    pub description: &'static str,
    /// Default applied by the gateway when absent, advertised to the planner
    pub default: Option<Value>,
}

impl ParamSpec {
    fn required(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            param_type,
            required: true,
            description,
            default: None,
        }
    }

    fn optional(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            param_type,
            required: false,
            description,
            default: None,
        }
    }

    fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// A single structural problem with request parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    /// Parameters were not a JSON object
    NotAnObject,
    /// Required parameter absent or null
    Missing(&'static str),
    /// Parameter present with the wrong type
    WrongType {
        /// Parameter name
        name: String,
        /// Expected type, rendered
        expected: String,
    },
    /// Parameter not declared by the schema
    Unknown(String),
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => f.write_str("parameters must be a JSON object"),
            Self::Missing(name) => write!(f, "missing required parameter '{}'", name),
            Self::WrongType { name, expected } => {
                write!(f, "parameter '{}' must be {}", name, expected)
            }
            Self::Unknown(name) => write!(f, "unknown parameter '{}'", name),
        }
    }
}

/// Parameter schema of one operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSchema {
    /// The operation described
    pub operation: Operation,
    /// Description shown to the planner
    pub description: &'static str,
    /// Declared parameters
    pub params: Vec<ParamSpec>,
}

impl OperationSchema {
    /// Check `params` against this schema
    ///
    /// A JSON `null` is treated as an empty object, and optional parameters
    /// set to `null` are treated as absent. Every violation is collected, not
    /// just the first.
    ///
    /// # Returns
    ///
    /// The validated parameter map with null optionals removed
    ///
    /// # Errors
    ///
    /// Returns all violations found
    pub fn validate(&self, params: &Value) -> Result<Map<String, Value>, Vec<SchemaViolation>> {
        let object = match params {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => return Err(vec![SchemaViolation::NotAnObject]),
        };

        let mut violations = Vec::new();
        let mut validated = Map::new();

        for (name, value) in object {
            match self.params.iter().find(|p| p.name == name) {
                None => violations.push(SchemaViolation::Unknown(name)),
                Some(_) if value.is_null() => {}
                Some(spec) if !spec.param_type.matches(&value) => {
                    violations.push(SchemaViolation::WrongType {
                        name,
                        expected: spec.param_type.to_string(),
                    });
                }
                Some(_) => {
                    validated.insert(name, value);
                }
            }
        }

        for spec in self.params.iter().filter(|p| p.required) {
            let wrong_type = violations.iter().any(
                |v| matches!(v, SchemaViolation::WrongType { name, .. } if name == spec.name),
            );
            if !validated.contains_key(spec.name) && !wrong_type {
                violations.push(SchemaViolation::Missing(spec.name));
            }
        }

        if violations.is_empty() {
            Ok(validated)
        } else {
            Err(violations)
        }
    }

    /// JSON schema of the parameters, in the form planner APIs expect
    pub fn parameters_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.params {
            let mut schema = spec.param_type.json_schema();
            if let Value::Object(ref mut obj) = schema {
                obj.insert("description".to_string(), json!(spec.description));
                if let Some(default) = &spec.default {
                    obj.insert("default".to_string(), default.clone());
                }
            }
            properties.insert(spec.name.to_string(), schema);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Tool definition: `{name, description, parameters}`
    pub fn tool_definition(&self) -> Value {
        json!({
            "name": self.operation.name(),
            "description": self.description,
            "parameters": self.parameters_json_schema(),
        })
    }
}

/// Immutable set of operation schemas
#[derive(Debug, Clone)]
pub struct OperationCatalog {
    schemas: Vec<OperationSchema>,
}

impl OperationCatalog {
    /// Build a catalog from explicit schemas
    pub fn new(schemas: Vec<OperationSchema>) -> Self {
        Self { schemas }
    }

    /// The full catalog of ServiceNow operations
    pub fn servicenow() -> Self {
        use ParamType::{Boolean, Enum, Integer, Mapping, StringList};

        Self::new(vec![
            OperationSchema {
                operation: Operation::QueryRecords,
                description: "Query records from any ServiceNow table. Use encoded query syntax \
                              (e.g. 'active=true^priority=1') to filter results.",
                params: vec![
                    ParamSpec::required(
                        "table",
                        ParamType::String,
                        "Table name, e.g. incident, sys_user, u_custom_table",
                    ),
                    ParamSpec::optional(
                        "query",
                        ParamType::String,
                        "Encoded query string, e.g. 'active=true^category=software'",
                    ),
                    ParamSpec::optional(
                        "fields",
                        StringList,
                        "Fields to return; omit for all fields",
                    ),
                    ParamSpec::optional(
                        "limit",
                        Integer,
                        "Maximum records to return (capped at 1000)",
                    )
                    .with_default(json!(10)),
                    ParamSpec::optional("offset", Integer, "Offset for pagination")
                        .with_default(json!(0)),
                    ParamSpec::optional(
                        "display_value",
                        Boolean,
                        "Return display values instead of raw values",
                    )
                    .with_default(json!(false)),
                    ParamSpec::optional(
                        "order_by",
                        ParamType::String,
                        "Field to order results by",
                    ),
                ],
            },
            OperationSchema {
                operation: Operation::GetRecord,
                description: "Get a single record by sys_id from any table.",
                params: vec![
                    ParamSpec::required("table", ParamType::String, "Table name"),
                    ParamSpec::required("sys_id", ParamType::String, "The sys_id of the record"),
                    ParamSpec::optional("fields", StringList, "Fields to return"),
                    ParamSpec::optional(
                        "display_value",
                        Boolean,
                        "Return display values instead of raw values",
                    )
                    .with_default(json!(false)),
                ],
            },
            OperationSchema {
                operation: Operation::CreateRecord,
                description: "Create a new record in any table. Use this for business rules \
                              (sys_script), client scripts (sys_script_client), UI policies \
                              (sys_ui_policy), ACLs (sys_security_acl), dictionary entries \
                              (sys_dictionary), choices (sys_choice), script includes \
                              (sys_script_include), scheduled jobs (sysauto_script) and any \
                              other record type.",
                params: vec![
                    ParamSpec::required(
                        "table",
                        ParamType::String,
                        "Table name, e.g. sys_script, sys_dictionary",
                    ),
                    ParamSpec::required("data", Mapping, "Field/value pairs for the new record"),
                    ParamSpec::optional(
                        "input_display_value",
                        Boolean,
                        "Treat reference values as display values",
                    )
                    .with_default(json!(false)),
                ],
            },
            OperationSchema {
                operation: Operation::UpdateRecord,
                description: "Update an existing record by sys_id.",
                params: vec![
                    ParamSpec::required("table", ParamType::String, "Table name"),
                    ParamSpec::required(
                        "sys_id",
                        ParamType::String,
                        "The sys_id of the record to update",
                    ),
                    ParamSpec::required("data", Mapping, "Field/value pairs to update"),
                    ParamSpec::optional(
                        "input_display_value",
                        Boolean,
                        "Treat reference values as display values",
                    )
                    .with_default(json!(false)),
                ],
            },
            OperationSchema {
                operation: Operation::DeleteRecord,
                description: "Delete a record by sys_id. Use with caution.",
                params: vec![
                    ParamSpec::required("table", ParamType::String, "Table name"),
                    ParamSpec::required(
                        "sys_id",
                        ParamType::String,
                        "The sys_id of the record to delete",
                    ),
                ],
            },
            OperationSchema {
                operation: Operation::GetTableSchema,
                description: "Get the field definitions of a table from sys_dictionary. Use \
                              this to understand a table's structure before creating or \
                              updating records.",
                params: vec![ParamSpec::required(
                    "table",
                    ParamType::String,
                    "Table name to inspect",
                )],
            },
            OperationSchema {
                operation: Operation::SearchTables,
                description: "Search for tables by name or label. Useful for finding the right \
                              table to work with.",
                params: vec![
                    ParamSpec::required(
                        "search_term",
                        ParamType::String,
                        "Term to match against table names and labels",
                    ),
                    ParamSpec::optional("limit", Integer, "Maximum tables to return")
                        .with_default(json!(20)),
                ],
            },
            OperationSchema {
                operation: Operation::GetUpdateSets,
                description: "List update sets, in progress by default. Useful to know where \
                              changes are being captured.",
                params: vec![
                    ParamSpec::optional(
                        "state",
                        Enum(&["in progress", "complete", "ignore"]),
                        "Update set state",
                    )
                    .with_default(json!("in progress")),
                    ParamSpec::optional("limit", Integer, "Maximum update sets to return")
                        .with_default(json!(20)),
                ],
            },
            OperationSchema {
                operation: Operation::GetApplicationScopes,
                description: "List active application scopes on the instance.",
                params: vec![],
            },
        ])
    }

    /// Schema for an operation name, or `None` when the name is not in the catalog
    pub fn schema_for(&self, name: &str) -> Option<&OperationSchema> {
        self.schemas.iter().find(|s| s.operation.name() == name)
    }

    /// All schemas, in catalog order
    pub fn schemas(&self) -> &[OperationSchema] {
        &self.schemas
    }

    /// Number of operations in the catalog
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true if the catalog has no operations
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Tool definitions for every operation, in catalog order
    pub fn tool_definitions(&self) -> Vec<Value> {
        self.schemas.iter().map(OperationSchema::tool_definition).collect()
    }

    /// Turn a planner request into a dispatchable call
    ///
    /// # Errors
    ///
    /// Returns a [`FailureKind::UnknownOperation`] failure when the name is not
    /// in the catalog, or a [`FailureKind::SchemaValidation`] failure listing
    /// every violation.
    ///
    /// # Examples
    ///
    /// ```
    /// use snow_agent::operations::{FailureKind, OperationCatalog, OperationRequest};
    /// use serde_json::json;
    ///
    /// let catalog = OperationCatalog::servicenow();
    /// let bad = OperationRequest::new("r1", "get_record", json!({"table": "incident"}));
    /// let failure = catalog.resolve(&bad).unwrap_err();
    /// assert_eq!(failure.kind, FailureKind::SchemaValidation);
    /// ```
    pub fn resolve(&self, request: &OperationRequest) -> Result<OperationCall, Failure> {
        let schema = self.schema_for(&request.operation_name).ok_or_else(|| {
            Failure::new(
                FailureKind::UnknownOperation,
                format!("unknown operation '{}'", request.operation_name),
            )
        })?;

        let parameters = schema.validate(&request.parameters).map_err(|violations| {
            let message = violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            Failure::new(FailureKind::SchemaValidation, message)
        })?;

        Ok(OperationCall {
            request_id: request.request_id.clone(),
            operation: schema.operation,
            parameters,
        })
    }
}

impl Default for OperationCatalog {
    fn default() -> Self {
        Self::servicenow()
    }
}
