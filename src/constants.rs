/// Source name constants shared by the CLI, metrics and logs

pub const OPENADDRESSES_SOURCE: &str = "openaddresses";
pub const OSM_SOURCE: &str = "osm";
pub const TIGER_SOURCE: &str = "tiger";

// OSM address tags
pub const OSM_NODE_TYPE: &str = "node";
pub const TAG_HOUSE_NAME: &str = "addr:housename";
pub const TAG_HOUSE_NUMBER: &str = "addr:housenumber";
pub const TAG_STREET: &str = "addr:street";
pub const TAG_CITY: &str = "addr:city";
pub const TAG_STATE: &str = "addr:state";
pub const TAG_DISTRICT: &str = "addr:district";
pub const TAG_COUNTRY: &str = "addr:country";
pub const TAG_POSTCODE: &str = "addr:postcode";

// TIGER edge attributes
pub const TIGER_LINE_TYPE: &str = "LineString";
pub const TIGER_LEFT_FROM: &str = "LFROMADD";
pub const TIGER_LEFT_TO: &str = "LTOADD";
pub const TIGER_RIGHT_FROM: &str = "RFROMADD";
pub const TIGER_RIGHT_TO: &str = "RTOADD";
pub const TIGER_FULLNAME: &str = "FULLNAME";
pub const TIGER_ZIP_LEFT: &str = "ZIPL";
pub const TIGER_ZIP_RIGHT: &str = "ZIPR";

/// Every TIGER address lies in this jurisdiction
pub const TIGER_COUNTRY: &str = "US";

/// Upper bound on houses interpolated for one side of one edge
pub const MAX_HOUSES_PER_SIDE: u64 = 10_000;

/// Spherical Mercator earth radius in metres (EPSG:3857)
pub const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

// Defaults
pub const DEFAULT_ORACLE_URL: &str = "http://localhost:5000";
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 100;
pub const DEFAULT_OFFSET_DEGREES: f64 = 0.00015;
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 10;

/// Path of the oracle's batch endpoint, relative to its base URL
pub const DEDUPE_ENDPOINT_PATH: &str = "/addresses/dedupe?batch=1";

/// Concatenation order of the unified address stream
pub fn source_priority() -> [&'static str; 3] {
    [OPENADDRESSES_SOURCE, OSM_SOURCE, TIGER_SOURCE]
}
