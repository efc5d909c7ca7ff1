use serde::{Deserialize, Serialize};

/// Canonical address produced by every source adapter.
///
/// `guid` stays `None` until the deduplication stage confirms the address is unique;
/// no other component writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub house_name: Option<String>,
    pub house_number: Option<String>,
    pub street: String,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

impl Address {
    /// A bare address at a position; optional fields start out empty.
    pub fn new(street: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            house_name: None,
            house_number: None,
            street: street.into(),
            locality: None,
            region: None,
            country: None,
            postal_code: None,
            latitude,
            longitude,
            guid: None,
        }
    }

    /// Finite and inside the WGS84 degree ranges.
    pub fn has_valid_coordinates(&self) -> bool {
        is_valid_position(self.latitude, self.longitude)
    }

    /// Single house identifier compounded from name and number.
    ///
    /// Returns `None` when neither part carries text.
    pub fn house_label(&self) -> Option<String> {
        let parts: Vec<&str> = [self.house_name.as_deref(), self.house_number.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Consumes the address, returning it with the oracle-assigned identifier.
    pub(crate) fn with_guid(mut self, guid: String) -> Self {
        self.guid = Some(guid);
        self
    }
}

pub fn is_valid_position(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}
