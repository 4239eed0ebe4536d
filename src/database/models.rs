use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use crate::database::structure::TableId;

/// Spatial reference of station geometries (WGS 84)
pub const GEOMETRY_SRID: u32 = 4326;

/// Scalar value of a single column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Point { longitude: f64, latitude: f64 },
}

impl SqlValue {
    /// Null, NaN and points with a NaN coordinate all load as SQL NULL
    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Null => true,
            SqlValue::Float(f) => f.is_nan(),
            SqlValue::Point { longitude, latitude } => longitude.is_nan() || latitude.is_nan(),
            _ => false,
        }
    }

    /// String form of the value, `None` for anything that loads as NULL
    pub fn render(&self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        let rendered = match self {
            SqlValue::Null => return None,
            SqlValue::Text(s) => s.clone(),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Boolean(b) => b.to_string(),
            SqlValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            SqlValue::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
            SqlValue::Point { longitude, latitude } => {
                format!("SRID={};POINT({} {})", GEOMETRY_SRID, longitude, latitude)
            }
        };
        Some(rendered)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Boolean(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl From<&serde_json::Value> for SqlValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(b) => SqlValue::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => n.as_f64().map(SqlValue::Float).unwrap_or(SqlValue::Null),
            },
            serde_json::Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }
}

/// One tabular row: an ordered mapping from column name to value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Row::set`]
    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column, replacing an existing value in place
    pub fn set(&mut self, column: &str, value: impl Into<SqlValue>) {
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Row that failed its individual insert
#[derive(Debug, Clone, Serialize)]
pub struct FailedRow {
    /// Position of the row in the loaded input
    pub index: usize,
    pub row: Row,
    pub error: String,
}

/// Rows a load could not insert, returned to the caller for inspection
#[derive(Debug, Clone, Serialize)]
pub struct FailureSet {
    #[serde(serialize_with = "serialize_table")]
    pub table: TableId,
    pub attempted: usize,
    /// Whether the whole input went in as one batch
    pub batched: bool,
    pub failures: Vec<FailedRow>,
}

fn serialize_table<S: Serializer>(table: &TableId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(table.name())
}

impl FailureSet {
    pub(crate) fn empty(table: TableId, attempted: usize) -> Self {
        Self {
            table,
            attempted,
            batched: true,
            failures: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.failures.iter().map(|f| &f.row)
    }

    pub fn inserted(&self) -> usize {
        self.attempted - self.failures.len()
    }
}

/// Result of schema provisioning
#[derive(Debug, Serialize)]
pub struct DatabaseSetupResult {
    pub database: String,
    pub database_created: bool,
    pub tables_created: Vec<String>,
    pub users_provisioned: Vec<String>,
}

/// Per-table outcome of a sync run
#[derive(Debug, Serialize)]
pub struct TableLoadSummary {
    pub table: String,
    pub attempted: usize,
    pub inserted: usize,
    pub failed: usize,
}

/// Result of a full sync run
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub setup: DatabaseSetupResult,
    pub states_fetched: usize,
    pub tables: Vec<TableLoadSummary>,
    pub failures: Vec<FailureSet>,
}

impl SyncReport {
    pub fn total_failed(&self) -> usize {
        self.failures.iter().map(FailureSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_and_null_render_as_none() {
        assert_eq!(SqlValue::Null.render(), None);
        assert_eq!(SqlValue::Float(f64::NAN).render(), None);
        assert_eq!(
            SqlValue::Point { longitude: f64::NAN, latitude: 34.5 }.render(),
            None
        );
        assert_eq!(SqlValue::Float(34.5).render(), Some("34.5".to_string()));
    }

    #[test]
    fn point_renders_as_ewkt() {
        let point = SqlValue::Point { longitude: -118.25, latitude: 34.05 };
        assert_eq!(point.render(), Some("SRID=4326;POINT(-118.25 34.05)".to_string()));
    }

    #[test]
    fn json_values_convert_to_scalars() {
        assert_eq!(SqlValue::from(&serde_json::json!(null)), SqlValue::Null);
        assert_eq!(SqlValue::from(&serde_json::json!(12)), SqlValue::Integer(12));
        assert_eq!(SqlValue::from(&serde_json::json!(1.5)), SqlValue::Float(1.5));
        assert_eq!(SqlValue::from(&serde_json::json!("E")), SqlValue::Text("E".to_string()));
    }

    #[test]
    fn set_replaces_in_place() {
        let mut row = Row::new().with("id", "1").with("name", "a");
        row.set("id", "2");
        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(row.get("id"), Some(&SqlValue::Text("2".to_string())));
    }

    #[test]
    fn row_serializes_as_ordered_map() {
        let row = Row::new().with("id", "1").with("lon", Option::<f64>::None);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"id":"1","lon":null}"#);
    }
}
