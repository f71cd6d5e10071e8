//! Workflow definitions
//!
//! A workflow is a named script plus an optional tabular schema. Definitions
//! are read from `.toml` or `.json` files so they can be checked and
//! test-run locally.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{FlowOpsError, Result};
use crate::types::TriggerConfig;

/* ===================== Column Schema ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    LongText,
    Number,
    Date,
    Select,
    MultiSelect,
    Boolean,
    Url,
    File,
}

impl ColumnType {
    pub fn is_select(self) -> bool {
        matches!(self, ColumnType::Select | ColumnType::MultiSelect)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

/// Problems found by [`Workflow::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("workflow name must not be empty")]
    EmptyName,

    #[error("workflow script must not be empty")]
    EmptyScript,

    #[error("column #{index} has an empty id")]
    EmptyColumnId { index: usize },

    #[error("column '{id}' has an empty name")]
    EmptyColumnName { id: String },

    #[error("duplicate column name '{0}'")]
    DuplicateColumnName(String),

    #[error("column '{0}' is a select column but defines no options")]
    MissingOptions(String),

    #[error("column '{0}' defines options but is not a select column")]
    UnexpectedOptions(String),

    #[error("column '{column}' has an option with an empty {field}")]
    EmptyOptionField { column: String, field: &'static str },
}

/* ===================== Workflow ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub script: String,
    #[serde(default, alias = "database_columns", skip_serializing_if = "Option::is_none")]
    pub database_columns: Option<Vec<Column>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerConfig>,
}

/// Payload sent to the schema store when a workflow carries columns
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseDefinition {
    pub name: String,
    pub workflow_id: Option<String>,
    pub columns: Vec<Column>,
}

impl Workflow {
    /// Load a definition from a `.toml` or `.json` file, assigning an id if missing
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FlowOpsError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let parsed = match extension.as_str() {
            "toml" => toml::from_str::<Workflow>(&text).map_err(|e| e.to_string()),
            "json" => serde_json::from_str::<Workflow>(&text).map_err(|e| e.to_string()),
            other => return Err(FlowOpsError::UnsupportedFormat(other.to_string())),
        };

        let workflow = parsed.map_err(|message| FlowOpsError::Definition {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(workflow.with_assigned_id())
    }

    /// Give the workflow a fresh v4 UUID unless it already has an id
    pub fn with_assigned_id(mut self) -> Self {
        if self.id.as_deref().map_or(true, str::is_empty) {
            self.id = Some(Uuid::new_v4().to_string());
        }
        self
    }

    pub fn columns(&self) -> &[Column] {
        self.database_columns.as_deref().unwrap_or_default()
    }

    /// Check the name, script and column schema
    pub fn validate(&self) -> std::result::Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if self.script.trim().is_empty() {
            return Err(SchemaError::EmptyScript);
        }

        let mut seen = HashSet::new();
        for (index, column) in self.columns().iter().enumerate() {
            if column.id.trim().is_empty() {
                return Err(SchemaError::EmptyColumnId { index });
            }
            if column.name.trim().is_empty() {
                return Err(SchemaError::EmptyColumnName {
                    id: column.id.clone(),
                });
            }
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumnName(column.name.clone()));
            }

            match (column.column_type.is_select(), column.options.is_empty()) {
                (true, true) => return Err(SchemaError::MissingOptions(column.name.clone())),
                (false, false) => {
                    return Err(SchemaError::UnexpectedOptions(column.name.clone()))
                }
                _ => {}
            }

            for option in &column.options {
                let field = if option.id.trim().is_empty() {
                    "id"
                } else if option.label.trim().is_empty() {
                    "label"
                } else {
                    continue;
                };
                return Err(SchemaError::EmptyOptionField {
                    column: column.name.clone(),
                    field,
                });
            }
        }
        Ok(())
    }

    /// The schema-store payload, or `None` when the workflow has no columns
    pub fn database_definition(&self) -> Option<DatabaseDefinition> {
        let columns = self.database_columns.as_ref().filter(|c| !c.is_empty())?;
        Some(DatabaseDefinition {
            name: format!("{} Database", self.name),
            workflow_id: self.id.clone(),
            columns: columns.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn column(name: &str, column_type: ColumnType) -> Column {
        Column {
            id: format!("col_{}", name),
            name: name.to_string(),
            column_type,
            required: false,
            description: None,
            options: vec![],
        }
    }

    fn workflow(columns: Vec<Column>) -> Workflow {
        Workflow {
            id: Some("wf-1".to_string()),
            name: "Lead intake".to_string(),
            script: "export default async (ctx) => { return ctx }".to_string(),
            database_columns: Some(columns),
            trigger: None,
        }
    }

    #[test]
    fn test_valid_schema() {
        let mut status = column("status", ColumnType::Select);
        status.options.push(SelectOption {
            id: "opt_new".to_string(),
            label: "New".to_string(),
            color: Some("blue".to_string()),
        });
        let wf = workflow(vec![column("email", ColumnType::Text), status]);
        assert_eq!(wf.validate(), Ok(()));
    }

    #[test]
    fn test_schema_rules() {
        let wf = workflow(vec![
            column("email", ColumnType::Text),
            column("email", ColumnType::Url),
        ]);
        assert_eq!(
            wf.validate(),
            Err(SchemaError::DuplicateColumnName("email".to_string()))
        );

        let wf = workflow(vec![column("tags", ColumnType::MultiSelect)]);
        assert_eq!(wf.validate(), Err(SchemaError::MissingOptions("tags".to_string())));

        let mut notes = column("notes", ColumnType::LongText);
        notes.options.push(SelectOption {
            id: "x".to_string(),
            label: "X".to_string(),
            color: None,
        });
        let wf = workflow(vec![notes]);
        assert_eq!(wf.validate(), Err(SchemaError::UnexpectedOptions("notes".to_string())));

        let mut wf = workflow(vec![]);
        wf.name = "  ".to_string();
        assert_eq!(wf.validate(), Err(SchemaError::EmptyName));
    }

    #[test]
    fn test_database_definition_payload() {
        let wf = workflow(vec![column("email", ColumnType::Text)]);
        let payload = serde_json::to_value(wf.database_definition().unwrap()).unwrap();
        assert_eq!(payload["name"], "Lead intake Database");
        assert_eq!(payload["workflowId"], "wf-1");
        assert_eq!(payload["columns"][0]["type"], "text");

        assert!(workflow(vec![]).database_definition().is_none());
    }

    #[test]
    fn test_load_toml_assigns_id() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
name = "Support bot"
script = "export default async (ctx) => {{ return ctx.text }}"

[trigger]
integration = "slack"
event = "message"
options = {{ channel = "support" }}

[[database_columns]]
id = "c1"
name = "question"
type = "long_text"
"#
        )
        .unwrap();

        let wf = Workflow::load(file.path()).unwrap();
        assert!(Uuid::parse_str(wf.id.as_deref().unwrap()).is_ok());
        assert_eq!(wf.columns()[0].column_type, ColumnType::LongText);
        assert_eq!(wf.trigger.unwrap().option_str("channel"), Some("support"));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(
            Workflow::load(file.path()),
            Err(FlowOpsError::UnsupportedFormat(ext)) if ext == "yaml"
        ));
    }
}
