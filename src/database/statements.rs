use crate::database::models::{Row, SqlValue};
use crate::database::structure::TableId;

/// Static helpers that render rows as literal SQL statements
///
/// Statements are fully literal: no placeholders are left for the driver to
/// bind. Values come from the AFDC feed, which is trusted; single quotes are
/// stripped from values rather than escaped so every statement stays
/// executable. Identifiers come from the table registry.
pub struct SqlWriter;

impl SqlWriter {
    /// `INSERT INTO table (cols...) VALUES (vals...);`
    pub fn insert(table: TableId, row: &Row) -> String {
        let columns: Vec<&str> = row.column_names().collect();
        let values: Vec<String> = row.iter().map(|(_, value)| Self::value_literal(value)).collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({});\n",
            table.name(),
            columns.join(", "),
            values.join(", ")
        )
    }

    /// `UPDATE table SET col = val, ... WHERE key = val AND ...;`
    ///
    /// Only `changed_columns` go into the SET clause; a changed column missing
    /// from the row is set to NULL. With no `where_key_columns` the statement
    /// has no WHERE clause and touches every row of the table. Returns `None`
    /// when there is nothing to set.
    pub fn update(table: TableId, row: &Row, changed_columns: &[&str], where_key_columns: &[&str]) -> Option<String> {
        if changed_columns.is_empty() {
            return None;
        }

        let assignments: Vec<String> = changed_columns
            .iter()
            .map(|column| format!("{} = {}", column, Self::column_literal(row, column)))
            .collect();

        Some(format!(
            "UPDATE {} SET {}{};\n",
            table.name(),
            assignments.join(", "),
            Self::where_clause(row, where_key_columns)
        ))
    }

    /// Update keyed by the table's registered update-key columns
    pub fn update_by_key(table: TableId, row: &Row, changed_columns: &[&str]) -> Option<String> {
        Self::update(table, row, changed_columns, table.schema().update_key_columns)
    }

    /// `DELETE FROM table WHERE key = val AND ...;` keyed by the table's delete-key columns
    pub fn delete(table: TableId, row: &Row) -> String {
        format!(
            "DELETE FROM {}{};\n",
            table.name(),
            Self::where_clause(row, table.schema().delete_key_columns)
        )
    }

    /// Literal for one value: unquoted `NULL`, or the string form in single quotes
    pub fn value_literal(value: &SqlValue) -> String {
        match value.render() {
            Some(rendered) => format!("'{}'", rendered.replace('\'', "")),
            None => "NULL".to_string(),
        }
    }

    fn column_literal(row: &Row, column: &str) -> String {
        row.get(column)
            .map(Self::value_literal)
            .unwrap_or_else(|| "NULL".to_string())
    }

    fn where_clause(row: &Row, key_columns: &[&str]) -> String {
        if key_columns.is_empty() {
            return String::new();
        }
        let predicates: Vec<String> = key_columns
            .iter()
            .map(|column| match row.get(column).filter(|v| !v.is_null()) {
                Some(value) => format!("{} = {}", column, Self::value_literal(value)),
                None => format!("{} IS NULL", column),
            })
            .collect();
        format!(" WHERE {}", predicates.join(" AND "))
    }

    /// Join statements into one batch
    pub fn batch(statements: &[String]) -> String {
        statements.concat()
    }
}

/// Double-quoted identifier, preserving case
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escaped string literal, for values that do not come from the feed
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
