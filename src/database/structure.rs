//! Typed registry of the destination tables.
//!
//! Each table is identified by a [`TableId`] and described by a static
//! [`TableSchema`]; there are no string-keyed lookups at runtime.

use std::fmt;

/// Tables managed by the sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableId {
    Station,
    Evse,
}

impl TableId {
    /// All tables, referenced tables before referencing ones
    pub const ALL: [TableId; 2] = [TableId::Station, TableId::Evse];

    pub fn schema(self) -> &'static TableSchema {
        match self {
            TableId::Station => &STATION,
            TableId::Evse => &EVSE,
        }
    }

    pub fn name(self) -> &'static str {
        self.schema().name
    }

    /// Tables that read-only users are granted SELECT on
    pub fn read_only() -> impl Iterator<Item = TableId> {
        Self::ALL.into_iter().filter(|t| t.schema().read_only)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of one table
#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub ddl: &'static str,
    /// Columns identifying a row
    pub key_columns: &'static [&'static str],
    /// WHERE columns of generated UPDATE statements
    pub update_key_columns: &'static [&'static str],
    /// WHERE columns of generated DELETE statements
    pub delete_key_columns: &'static [&'static str],
    /// Granted SELECT to read-only users
    pub read_only: bool,
}

static STATION: TableSchema = TableSchema {
    name: "station",
    ddl: STATION_DDL,
    key_columns: &["id"],
    update_key_columns: &["id"],
    delete_key_columns: &["id"],
    read_only: true,
};

// evse rows carry no unique key of their own; several posts share a station id
static EVSE: TableSchema = TableSchema {
    name: "evse",
    ddl: EVSE_DDL,
    key_columns: &["id", "evse_id"],
    update_key_columns: &["id", "evse_id"],
    delete_key_columns: &["id"],
    read_only: true,
};

const STATION_DDL: &str = r#"
CREATE TABLE station (
    id VARCHAR(255) NOT NULL,
    access_code VARCHAR(255),
    status_code VARCHAR(255),
    open_date DATE,
    station_name VARCHAR(255),
    street_address VARCHAR(255),
    city VARCHAR(255),
    state VARCHAR(255),
    zip VARCHAR(50),
    latitude NUMERIC,
    longitude NUMERIC,
    ev_network VARCHAR(255),
    owner_type_code VARCHAR(255),
    ev_level1_evse_num INTEGER,
    ev_level2_evse_num INTEGER,
    ev_dc_fast_num INTEGER,
    ev_connector_types VARCHAR(255),
    ev_pricing VARCHAR(255),
    ev_renewable_source VARCHAR(255),
    geocode_status VARCHAR(255),
    facility_type VARCHAR(255),
    maximum_vehicle_class VARCHAR(255),
    expected_date DATE,
    date_last_confirmed DATE,
    updated_at TIMESTAMPTZ,
    geometry GEOMETRY,
    PRIMARY KEY (id)
)
"#;

const EVSE_DDL: &str = r#"
CREATE TABLE evse (
    id VARCHAR(255) NOT NULL,
    station_id VARCHAR(255),
    evse_id VARCHAR(255),
    FOREIGN KEY (id)
        REFERENCES station (id)
)
"#;
