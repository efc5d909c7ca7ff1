use serde::Deserialize;
use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;

use super::{has_text, retain_valid, SourceAdapter, SourceKind};
use crate::config::Projection;
use crate::constants::{self, WEB_MERCATOR_RADIUS};
use crate::domain::Address;

/// A decoded OSM element, as yielded by a PBF reader.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OsmNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl OsmNode {
    fn tag(&self, key: &str) -> Option<String> {
        self.tags.get(key).cloned()
    }
}

/// Keeps tagged address nodes and copies their `addr:*` tags across.
#[derive(Debug, Clone, Default)]
pub struct OsmAdapter {
    projection: Projection,
}

impl OsmAdapter {
    pub fn new(projection: Projection) -> Self {
        Self { projection }
    }

    /// Node position as (latitude, longitude) in degrees
    fn position(&self, node: &OsmNode) -> (f64, f64) {
        match self.projection {
            Projection::Wgs84 => (node.lat, node.lon),
            Projection::WebMercator => web_mercator_to_wgs84(node.lon, node.lat),
        }
    }
}

/// Inverse spherical Mercator: metres (x, y) to (latitude, longitude) degrees.
pub fn web_mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let longitude = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let latitude = (2.0 * (y / WEB_MERCATOR_RADIUS).exp().atan() - FRAC_PI_2).to_degrees();
    (latitude, longitude)
}

impl SourceAdapter for OsmAdapter {
    type Record = OsmNode;

    fn kind(&self) -> SourceKind {
        SourceKind::Osm
    }

    fn filter(&self, node: &OsmNode) -> bool {
        node.kind == constants::OSM_NODE_TYPE
            && has_text(node.tags.get(constants::TAG_STREET).map(String::as_str))
    }

    fn normalize(&self, node: OsmNode) -> Vec<Address> {
        let street = match node.tag(constants::TAG_STREET) {
            Some(street) => street,
            None => return Vec::new(),
        };
        let (latitude, longitude) = self.position(&node);

        let address = Address {
            house_name: node.tag(constants::TAG_HOUSE_NAME),
            house_number: node.tag(constants::TAG_HOUSE_NUMBER),
            street,
            locality: node.tag(constants::TAG_CITY),
            region: node
                .tag(constants::TAG_STATE)
                .or_else(|| node.tag(constants::TAG_DISTRICT)),
            country: node.tag(constants::TAG_COUNTRY),
            postal_code: node.tag(constants::TAG_POSTCODE),
            latitude,
            longitude,
            guid: None,
        };
        retain_valid(SourceKind::Osm, vec![address])
    }
}
