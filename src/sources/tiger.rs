use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use super::{has_text, retain_valid, SourceAdapter, SourceKind};
use crate::constants;
use crate::domain::Address;
use crate::metrics::SourcesMetrics;
use crate::interpolation::{AddressRange, Interpolator, Side};

/// A decoded TIGER edge feature, as yielded by a shapefile reader.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TigerFeature {
    pub geometry: TigerGeometry,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TigerGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Value,
}

impl TigerFeature {
    /// Vertices of a `LineString` geometry; `None` for any other shape.
    pub fn line_vertices(&self) -> Option<Vec<[f64; 2]>> {
        if self.geometry.kind != constants::TIGER_LINE_TYPE {
            return None;
        }
        self.geometry
            .coordinates
            .as_array()?
            .iter()
            .map(|vertex| {
                let pair = vertex.as_array()?;
                Some([pair.first()?.as_f64()?, pair.get(1)?.as_f64()?])
            })
            .collect()
    }

    /// Attribute as text; numbers are rendered, null and empty count as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Attribute as a house number. Non-numeric values (hyphenated ranges, letters)
    /// count as absent.
    pub fn number(&self, key: &str) -> Option<i64> {
        match self.properties.get(key)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn range(&self, side: Side) -> AddressRange {
        let (from, to) = match side {
            Side::Left => (constants::TIGER_LEFT_FROM, constants::TIGER_LEFT_TO),
            Side::Right => (constants::TIGER_RIGHT_FROM, constants::TIGER_RIGHT_TO),
        };
        AddressRange::new(self.number(from), self.number(to))
    }

    /// Zip code of a side, falling back to the opposite side's
    pub fn zip(&self, side: Side) -> Option<String> {
        let (own, other) = match side {
            Side::Left => (constants::TIGER_ZIP_LEFT, constants::TIGER_ZIP_RIGHT),
            Side::Right => (constants::TIGER_ZIP_RIGHT, constants::TIGER_ZIP_LEFT),
        };
        self.text(own).or_else(|| self.text(other))
    }
}

/// Interpolates house points along both sides of each TIGER edge.
#[derive(Debug, Clone, Default)]
pub struct TigerAdapter {
    interpolator: Interpolator,
}

impl TigerAdapter {
    pub fn new(interpolator: Interpolator) -> Self {
        Self { interpolator }
    }
}

impl SourceAdapter for TigerAdapter {
    type Record = TigerFeature;

    fn kind(&self) -> SourceKind {
        SourceKind::Tiger
    }

    fn filter(&self, feature: &TigerFeature) -> bool {
        let has_line = feature
            .line_vertices()
            .map(|vertices| vertices.len() >= 2)
            .unwrap_or(false);
        has_line
            && has_text(feature.text(constants::TIGER_FULLNAME).as_deref())
            && (feature.range(Side::Left).is_complete() || feature.range(Side::Right).is_complete())
    }

    fn normalize(&self, feature: TigerFeature) -> Vec<Address> {
        let (vertices, street) = match (feature.line_vertices(), feature.text(constants::TIGER_FULLNAME)) {
            (Some(vertices), Some(street)) => (vertices, street),
            _ => return Vec::new(),
        };

        let mut addresses = Vec::new();
        for side in [Side::Left, Side::Right] {
            let range = feature.range(side);
            if range.is_oversized() {
                warn!(
                    street = %street,
                    ?side,
                    start = ?range.start,
                    end = ?range.end,
                    "Skipping side with implausible house range"
                );
                SourcesMetrics::record_oversized_range(constants::TIGER_SOURCE);
                continue;
            }
            let template = Address {
                country: Some(constants::TIGER_COUNTRY.to_string()),
                postal_code: feature.zip(side),
                ..Address::new(street.clone(), 0.0, 0.0)
            };
            addresses.extend(
                self.interpolator
                    .addresses(&vertices, range, side, &template),
            );
        }
        retain_valid(SourceKind::Tiger, addresses)
    }
}
