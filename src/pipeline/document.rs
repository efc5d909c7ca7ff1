use serde::{Deserialize, Serialize};

use crate::domain::Address;

/// Projection of a deduplicated address into the search index's document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub name: String,
    pub admin0: Option<String>,
    pub admin1: Option<String>,
    pub locality: Option<String>,
    pub postal_code: Option<String>,
    pub center_point: CenterPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CenterPoint {
    pub lat: f64,
    pub lon: f64,
}

impl IndexDocument {
    /// `None` for addresses that have not been through deduplication.
    pub fn from_address(address: &Address) -> Option<Self> {
        let id = address.guid.clone()?;
        let street = address.street.trim();
        let name = match address.house_label() {
            Some(house) if !street.is_empty() => format!("{} {}", house, street),
            Some(house) => house,
            None => street.to_string(),
        };

        Some(Self {
            id,
            name,
            admin0: address.country.clone(),
            admin1: address.region.clone(),
            locality: address.locality.clone(),
            postal_code: address.postal_code.clone(),
            center_point: CenterPoint {
                lat: address.latitude,
                lon: address.longitude,
            },
        })
    }
}
