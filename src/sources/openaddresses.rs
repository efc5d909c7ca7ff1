use serde::Deserialize;

use super::{retain_valid, SourceAdapter, SourceKind};
use crate::domain::Address;

/// A decoded OpenAddresses CSV row.
///
/// The upper-case column names used by published OpenAddresses extracts are
/// accepted as aliases. City, region and postcode columns are optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OpenAddressesRow {
    #[serde(alias = "LON")]
    pub lon: String,
    #[serde(alias = "LAT")]
    pub lat: String,
    #[serde(alias = "NUMBER")]
    pub number: String,
    #[serde(alias = "STREET")]
    pub street: String,
    #[serde(default, alias = "CITY")]
    pub city: Option<String>,
    #[serde(default, alias = "REGION")]
    pub region: Option<String>,
    #[serde(default, alias = "POSTCODE")]
    pub postcode: Option<String>,
}

impl OpenAddressesRow {
    pub fn new(lon: &str, lat: &str, number: &str, street: &str) -> Self {
        Self {
            lon: lon.to_string(),
            lat: lat.to_string(),
            number: number.to_string(),
            street: street.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAddressesAdapter;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl SourceAdapter for OpenAddressesAdapter {
    type Record = OpenAddressesRow;

    fn kind(&self) -> SourceKind {
        SourceKind::OpenAddresses
    }

    fn filter(&self, row: &OpenAddressesRow) -> bool {
        [&row.lon, &row.lat, &row.number, &row.street]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    fn normalize(&self, row: OpenAddressesRow) -> Vec<Address> {
        let (latitude, longitude) = match (row.lat.trim().parse::<f64>(), row.lon.trim().parse::<f64>()) {
            (Ok(lat), Ok(lon)) => (lat, lon),
            _ => (f64::NAN, f64::NAN),
        };
        let address = Address {
            house_number: Some(row.number),
            locality: non_empty(row.city),
            region: non_empty(row.region),
            postal_code: non_empty(row.postcode),
            ..Address::new(row.street, latitude, longitude)
        };
        retain_valid(SourceKind::OpenAddresses, vec![address])
    }
}
