//! Database schema description used to ground SQL generation.
//!
//! A [`Schema`] is either introspected from PostgreSQL or taken from the
//! built-in description of the analytics tables the service ships with.

use serde::{Deserialize, Serialize};

/// Tables exposed to the SQL generator by default.
pub const DEFAULT_TABLES: [&str; 3] = ["ai_services", "ai_projects", "ai_service_usage"];

/// Tables and relationships visible to the SQL generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<Table>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no tables are described.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// The analytics schema the service was designed around.
    pub fn builtin() -> Self {
        Self {
            tables: vec![
                Table::new("ai_services").with_columns([
                    Column::new("id", "int"),
                    Column::new("name", "string"),
                    Column::new("provider", "string"),
                    Column::new("model", "string"),
                    Column::new("type", "string"),
                    Column::new("input_price_per_1k_tokens", "decimal"),
                    Column::new("output_price_per_1k_tokens", "decimal"),
                    Column::new("supports_sql", "boolean"),
                    Column::new("max_tokens", "int"),
                    Column::new("context_window", "string"),
                    Column::new("available", "boolean"),
                    Column::new("launched_at", "date"),
                    Column::new("description", "text"),
                ]),
                Table::new("ai_projects").with_columns([
                    Column::new("id", "int"),
                    Column::new("client_name", "string"),
                    Column::new("industry", "string"),
                    Column::new("country", "string"),
                ]),
                Table::new("ai_service_usage").with_columns([
                    Column::new("id", "int"),
                    Column::new("service_id", "int").references("ai_services", "id"),
                    Column::new("client_id", "int").references("ai_projects", "id"),
                    Column::new("user_name", "string"),
                    Column::new("usage_date", "date"),
                    Column::new("prompt_tokens", "int"),
                    Column::new("completion_tokens", "int"),
                ]),
            ],
        }
    }

    /// Formats the schema for inclusion in the generation prompt.
    ///
    /// ```text
    /// Table ai_service_usage (
    ///     service_id: int (FK to ai_services.id),
    ///     ...
    /// )
    /// ```
    pub fn format_for_prompt(&self) -> String {
        self.tables
            .iter()
            .map(Table::format_for_prompt)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A table and its columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    /// Creates a new table with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Appends columns.
    pub fn with_columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    fn format_for_prompt(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| format!("    {}", column.format_for_prompt()))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("Table {} (\n{}\n)", self.name, columns)
    }
}

/// A column, optionally referencing another table's column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    /// `table.column` this column points at, if it is a foreign key.
    pub references: Option<String>,
}

impl Column {
    /// Creates a new column with the given name and data type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            references: None,
        }
    }

    /// Marks the column as a foreign key to `table.column`.
    pub fn references(self, table: &str, column: &str) -> Self {
        Self {
            references: Some(format!("{table}.{column}")),
            ..self
        }
    }

    fn format_for_prompt(&self) -> String {
        match &self.references {
            Some(target) => format!("{}: {} (FK to {})", self.name, self.data_type, target),
            None => format!("{}: {}", self.name, self.data_type),
        }
    }
}
