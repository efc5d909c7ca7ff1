use address_importer::dedupe::{DedupeConfig, DedupeDecision, DedupeOracle, OracleError, StageState};
use address_importer::domain::Address;
use address_importer::error::{ImporterError, Result};
use address_importer::interpolation::Interpolator;
use address_importer::pipeline::{AddressSink, ImportPipeline, MemorySink, SourceSet};
use address_importer::readers;
use address_importer::sources::{
    AddressStream, OpenAddressesAdapter, OsmAdapter, SourceAdapter, SourceKind, TigerAdapter,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Remembers every (number, street) it has answered for; repeats are duplicates.
#[derive(Default)]
struct SeenOracle {
    seen: Mutex<HashSet<(String, String)>>,
}

#[async_trait]
impl DedupeOracle for SeenOracle {
    async fn dedupe(&self, batch: &[Address]) -> std::result::Result<Vec<DedupeDecision>, OracleError> {
        let mut seen = self.seen.lock().unwrap();
        Ok(batch
            .iter()
            .map(|address| {
                let key = (
                    address.house_number.clone().unwrap_or_default(),
                    address.street.to_lowercase(),
                );
                if seen.insert(key) {
                    DedupeDecision::unique(Uuid::new_v4().to_string())
                } else {
                    DedupeDecision::duplicate()
                }
            })
            .collect())
    }
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn pipeline(batch_size: usize, max_in_flight: usize) -> ImportPipeline {
    let oracle: Arc<dyn DedupeOracle> = Arc::new(SeenOracle::default());
    ImportPipeline::new(oracle, DedupeConfig { batch_size, max_in_flight })
        .with_progress_interval(Duration::from_millis(10))
}

fn stream_of(streets: &[&str]) -> AddressStream {
    let addresses: Vec<Address> = streets
        .iter()
        .map(|street| {
            let mut address = Address::new(*street, 10.0, 10.0);
            address.house_number = Some("1".into());
            address
        })
        .collect();
    Box::new(addresses.into_iter())
}

#[tokio::test]
async fn test_sources_reach_sink_in_priority_order() {
    let sources = SourceSet::new()
        .with(SourceKind::Tiger, stream_of(&["C1", "C2"]))
        .with(SourceKind::Osm, stream_of(&["B1"]))
        .with(SourceKind::OpenAddresses, stream_of(&["A1", "A2"]));
    let mut sink = MemorySink::new();

    // One batch at a time keeps the output in input order
    let summary = pipeline(1, 1).run(sources, &mut sink).await.unwrap();

    let streets: Vec<&str> = sink.addresses.iter().map(|a| a.street.as_str()).collect();
    assert_eq!(streets, vec!["A1", "A2", "B1", "C1", "C2"]);
    assert!(sink.flushed);
    assert_eq!(summary.imported, 5);
    assert_eq!(summary.normalized["openaddresses"], 2);
    assert_eq!(summary.normalized["osm"], 1);
    assert_eq!(summary.normalized["tiger"], 2);
}

#[tokio::test]
async fn test_end_to_end_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let oa = write_file(
        dir.path(),
        "oa.csv",
        "LON,LAT,NUMBER,STREET\n-73.98,40.75,1619,Broadway\n-73.99,40.76,1,Main St\n-73.99,,2,Main St\n",
    );
    let osm = write_file(
        dir.path(),
        "nodes.ndjson",
        concat!(
            r#"{"type":"node","lat":40.7501,"lon":-73.9801,"tags":{"addr:housenumber":"1619","addr:street":"Broadway"}}"#,
            "\n",
            r#"{"type":"way","lat":40.7,"lon":-73.9,"tags":{"addr:street":"Ignored Way"}}"#,
            "\n",
            r#"{"type":"node","lat":40.74,"lon":-73.97,"tags":{"addr:housenumber":"10","addr:street":"Park Ave","addr:state":"NY"}}"#,
            "\n",
        ),
    );
    let tiger = write_file(
        dir.path(),
        "edges.geojsonl",
        concat!(
            r#"{"geometry":{"type":"LineString","coordinates":[[-73.95,40.70],[-73.94,40.70]]},"#,
            r#""properties":{"FULLNAME":"Elm St","LFROMADD":"1","LTOADD":"5","RFROMADD":null,"RTOADD":null,"ZIPL":"10001"}}"#,
            "\n",
        ),
    );

    let sources = SourceSet::new()
        .with(
            SourceKind::OpenAddresses,
            OpenAddressesAdapter.address_stream(readers::openaddresses_rows(&oa).unwrap()),
        )
        .with(SourceKind::Osm, OsmAdapter::default().address_stream(readers::osm_nodes(&osm).unwrap()))
        .with(
            SourceKind::Tiger,
            TigerAdapter::new(Interpolator::default()).address_stream(readers::tiger_features(&tiger).unwrap()),
        );
    let mut sink = MemorySink::new();

    let summary = pipeline(2, 2).run(sources, &mut sink).await.unwrap();

    assert_eq!(summary.normalized["openaddresses"], 2);
    assert_eq!(summary.normalized["osm"], 2);
    assert_eq!(summary.normalized["tiger"], 3);
    assert_eq!(summary.dedupe.received, 7);
    assert_eq!(summary.dedupe.duplicates, 1);
    assert_eq!(summary.dedupe.final_state, StageState::Drained);
    assert_eq!(summary.imported, 6);
    assert!(summary.completed_at >= summary.started_at);

    assert_eq!(sink.addresses.len(), 6);
    assert!(sink.addresses.iter().all(|a| a.guid.is_some()));

    // OpenAddresses is read first, so its copy of the shared address wins
    let broadway: Vec<&Address> = sink.addresses.iter().filter(|a| a.street == "Broadway").collect();
    assert_eq!(broadway.len(), 1);
    assert_eq!(broadway[0].latitude, 40.75);

    let mut elm: Vec<String> = sink
        .addresses
        .iter()
        .filter(|a| a.street == "Elm St")
        .map(|a| a.house_number.clone().unwrap())
        .collect();
    elm.sort();
    assert_eq!(elm, vec!["1", "3", "5"]);
    assert!(sink
        .addresses
        .iter()
        .filter(|a| a.street == "Elm St")
        .all(|a| a.country.as_deref() == Some("US") && a.postal_code.as_deref() == Some("10001")));
}

struct FailingSink {
    writes: usize,
}

#[async_trait]
impl AddressSink for FailingSink {
    async fn write(&mut self, _address: &Address) -> Result<()> {
        self.writes += 1;
        Err(ImporterError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed")))
    }
}

#[tokio::test]
async fn test_sink_failure_fails_the_run_after_draining() {
    let sources = SourceSet::new().with(SourceKind::OpenAddresses, stream_of(&["A", "B", "C", "D", "E"]));
    let mut sink = FailingSink { writes: 0 };

    let result = pipeline(2, 1).run(sources, &mut sink).await;

    assert!(matches!(result, Err(ImporterError::Io(_))));
    assert_eq!(sink.writes, 1);
}
