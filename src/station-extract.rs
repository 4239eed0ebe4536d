use std::sync::LazyLock;
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use regex::Regex;
use serde_json::Value;
use crate::afdc_api::StateRecords;
use crate::database::{Row, SqlValue};

/// Station columns taken from each record, in table order after `id`
pub const STATION_COLUMNS: [&str; 24] = [
    "access_code",
    "status_code",
    "open_date",
    "station_name",
    "street_address",
    "city",
    "state",
    "zip",
    "latitude",
    "longitude",
    "ev_network",
    "owner_type_code",
    "ev_level1_evse_num",
    "ev_level2_evse_num",
    "ev_dc_fast_num",
    "ev_connector_types",
    "ev_pricing",
    "ev_renewable_source",
    "geocode_status",
    "facility_type",
    "maximum_vehicle_class",
    "expected_date",
    "date_last_confirmed",
    "updated_at",
];

const DATE_COLUMNS: [&str; 3] = ["open_date", "expected_date", "date_last_confirmed"];
const COORDINATE_COLUMNS: [&str; 2] = ["latitude", "longitude"];
const COUNT_COLUMNS: [&str; 3] = ["ev_level1_evse_num", "ev_level2_evse_num", "ev_dc_fast_num"];
const NETWORK_IDS: &str = "ev_network_ids";

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").expect("valid regex"));

/// Rows ready for loading
#[derive(Debug, Default)]
pub struct ExtractedRows {
    pub stations: Vec<Row>,
    pub evse: Vec<Row>,
}

/// Turn raw API records into `station` and `evse` rows
pub fn extract(feed: &[StateRecords]) -> ExtractedRows {
    info!("Extracting data from {} API responses", feed.len());
    let mut extracted = ExtractedRows::default();

    for state in feed {
        info!("Extracting data for {} ({} records)", state.state, state.records.len());
        for record in &state.records {
            extracted.stations.push(station_row(record));
            extracted.evse.extend(evse_rows(record));
        }
    }

    extracted
}

/// One `station` row: `id`, the station columns, then `geometry`
pub fn station_row(record: &Value) -> Row {
    let mut row = Row::new().with("id", text_value(&record["id"]));

    for column in STATION_COLUMNS {
        let raw = &record[column];
        let value = if DATE_COLUMNS.contains(&column) {
            date_value(raw)
        } else if COORDINATE_COLUMNS.contains(&column) {
            float_value(raw)
        } else if COUNT_COLUMNS.contains(&column) {
            SqlValue::Integer(count_value(raw))
        } else if column == "updated_at" {
            timestamp_value(raw)
        } else if column == "ev_connector_types" {
            connector_types(raw)
        } else {
            text_value(raw)
        };
        row.set(column, value);
    }

    let geometry = match (row.get("longitude"), row.get("latitude")) {
        (Some(SqlValue::Float(longitude)), Some(SqlValue::Float(latitude))) => SqlValue::Point {
            longitude: *longitude,
            latitude: *latitude,
        },
        _ => SqlValue::Null,
    };
    row.set("geometry", geometry);
    row
}

/// One `evse` row per network post of the record
///
/// `station_id` is only known when the network lists exactly one station id.
pub fn evse_rows(record: &Value) -> Vec<Row> {
    let network_ids = &record[NETWORK_IDS];
    let id = text_value(&record["id"]);

    let station_id = match network_ids["station"].as_array() {
        Some(stations) if stations.len() == 1 => text_value(&stations[0]),
        _ => SqlValue::Null,
    };

    network_ids["posts"]
        .as_array()
        .map(|posts| {
            posts
                .iter()
                .map(|post| {
                    Row::new()
                        .with("id", id.clone())
                        .with("station_id", station_id.clone())
                        .with("evse_id", text_value(post))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Text form of a feed value; null and the "None"/"nan" placeholders are NULL
fn text_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::String(s) if s == "None" || s == "nan" => SqlValue::Null,
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn date_value(value: &Value) -> SqlValue {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        .map(SqlValue::Date)
        .unwrap_or(SqlValue::Null)
}

fn timestamp_value(value: &Value) -> SqlValue {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|ts| SqlValue::Timestamp(ts.with_timezone(&Utc)))
        .unwrap_or(SqlValue::Null)
}

fn float_value(value: &Value) -> SqlValue {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .map(SqlValue::Float)
        .unwrap_or(SqlValue::Null)
}

/// EVSE counts default to 0 when absent or unparsable
fn count_value(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
        _ => 0,
    }
}

/// Connector list as `"J1772; NEMA520"`
fn connector_types(value: &Value) -> SqlValue {
    let raw = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match text_value(item) {
                SqlValue::Text(s) => Some(s),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
        Value::String(s) if s != "None" && s != "nan" => s.clone(),
        _ => return SqlValue::Null,
    };

    let words: Vec<&str> = NON_WORD.split(&raw).filter(|w| !w.is_empty()).collect();
    if words.is_empty() {
        SqlValue::Null
    } else {
        SqlValue::Text(words.join("; "))
    }
}
