// Per-source filter/normalize adapters

pub mod openaddresses;
pub mod osm;
pub mod tiger;

pub use openaddresses::{OpenAddressesAdapter, OpenAddressesRow};
pub use osm::{OsmAdapter, OsmNode};
pub use tiger::{TigerAdapter, TigerFeature};

use tracing::debug;

use crate::constants;
use crate::domain::Address;
use crate::metrics::SourcesMetrics;

/// Lazy stream of normalized addresses from one source or several
pub type AddressStream = Box<dyn Iterator<Item = Address> + Send>;

/// The datasets the importer understands, in no particular order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    OpenAddresses,
    Osm,
    Tiger,
}

impl SourceKind {
    /// Concatenation order of the unified stream
    pub const PRIORITY: [SourceKind; 3] = [SourceKind::OpenAddresses, SourceKind::Osm, SourceKind::Tiger];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::OpenAddresses => constants::OPENADDRESSES_SOURCE,
            SourceKind::Osm => constants::OSM_SOURCE,
            SourceKind::Tiger => constants::TIGER_SOURCE,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter/normalize contract every dataset implements.
///
/// `filter` and `normalize` are pure; `address_stream` composes them lazily over
/// a fresh input each time it is called.
pub trait SourceAdapter: Send + 'static {
    type Record: Send + 'static;

    fn kind(&self) -> SourceKind;

    /// Whether a raw record carries enough to become an address
    fn filter(&self, record: &Self::Record) -> bool;

    /// Turn a record that passed `filter` into zero or more addresses
    fn normalize(&self, record: Self::Record) -> Vec<Address>;

    fn address_stream<I>(self, records: I) -> AddressStream
    where
        Self: Sized,
        I: IntoIterator<Item = Self::Record>,
        I::IntoIter: Send + 'static,
    {
        let source = self.kind().as_str();
        Box::new(records.into_iter().flat_map(move |record| {
            if !self.filter(&record) {
                SourcesMetrics::record_filtered(source);
                return Vec::new();
            }
            let addresses = self.normalize(record);
            SourcesMetrics::record_normalized(source, addresses.len());
            addresses
        }))
    }
}

/// Drop addresses whose coordinates are not usable WGS84 degrees.
pub(crate) fn retain_valid(kind: SourceKind, mut addresses: Vec<Address>) -> Vec<Address> {
    addresses.retain(|address| {
        let valid = address.has_valid_coordinates();
        if !valid {
            debug!(
                source = kind.as_str(),
                street = %address.street,
                latitude = address.latitude,
                longitude = address.longitude,
                "Dropping address with invalid coordinates"
            );
            SourcesMetrics::record_invalid_coordinates(kind.as_str());
        }
        valid
    });
    addresses
}

/// Non-empty after trimming
pub(crate) fn has_text(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let names: Vec<&str> = SourceKind::PRIORITY.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, constants::source_priority());
    }

    #[test]
    fn test_retain_valid_drops_bad_coordinates() {
        let addresses = vec![
            Address::new("A St", 10.0, 10.0),
            Address::new("B St", f64::NAN, 10.0),
            Address::new("C St", 10.0, 200.0),
        ];
        let kept = retain_valid(SourceKind::Osm, addresses);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].street, "A St");
    }
}
