use address_importer::dedupe::{DedupeDecision, DedupeOracle, HttpDedupeOracle, OracleError};
use address_importer::domain::Address;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

/// Serve `app` on an ephemeral local port and return its base URL.
fn spawn_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.into_make_service());
    tokio::spawn(server);
    format!("http://{}", addr)
}

/// Streets starting with "Dup" are duplicates; everything else gets `guid-<street>`.
async fn dedupe_handler(Query(params): Query<HashMap<String, String>>, Json(body): Json<Value>) -> impl IntoResponse {
    if params.get("batch").map(String::as_str) != Some("1") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "batch=1 required" })));
    }
    let decisions: Vec<Value> = body["addresses"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|address| {
            let street = address["street"].as_str().unwrap_or_default();
            if street.starts_with("Dup") {
                json!({ "dupe": true })
            } else {
                json!({ "dupe": false, "guid": format!("guid-{}", street) })
            }
        })
        .collect();
    (StatusCode::OK, Json(json!({ "addresses": decisions })))
}

fn batch() -> Vec<Address> {
    vec![
        Address::new("Main St", 40.0, -73.0),
        Address::new("Dup Ave", 40.1, -73.1),
    ]
}

fn oracle(base_url: &str) -> HttpDedupeOracle {
    HttpDedupeOracle::new(base_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_decisions_follow_request_order() {
    let base = spawn_server(Router::new().route("/addresses/dedupe", post(dedupe_handler)));

    let decisions = oracle(&base).dedupe(&batch()).await.unwrap();
    assert_eq!(
        decisions,
        vec![DedupeDecision::unique("guid-Main St"), DedupeDecision::duplicate()]
    );
}

#[tokio::test]
async fn test_http_error_status() {
    let app = Router::new().route(
        "/addresses/dedupe",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "index unavailable") }),
    );
    let base = spawn_server(app);

    match oracle(&base).dedupe(&batch()).await {
        Err(OracleError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "index unavailable");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_body_is_malformed() {
    let app = Router::new().route("/addresses/dedupe", post(|| async { "not json" }));
    let base = spawn_server(app);

    let err = oracle(&base).dedupe(&batch()).await.unwrap_err();
    assert_eq!(err.kind(), "malformed");
}

#[tokio::test]
async fn test_unreachable_oracle_is_transport_error() {
    // Bind then release a port so nothing is listening on it
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

    let err = oracle(&format!("http://{}", addr)).dedupe(&batch()).await.unwrap_err();
    assert!(matches!(err, OracleError::Transport(_)));
}
