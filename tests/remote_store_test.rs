//! Document store over an HTTP bucket, against a mock server

use std::sync::Arc;

use chrono::Utc;
use leadscrape::StoredLead;
use leadscrape::persistence::{
    CacheEntry, DocumentLeadStore, HttpObjectStore, ObjectStore, PersistenceError,
    PersistenceGateway,
};
use mockito::{Matcher, Server};

mod common;
use common::lead;

fn document_body(location: &str, address: &str) -> Vec<u8> {
    let now = Utc::now();
    let entry = CacheEntry {
        timestamp: now,
        leads: vec![StoredLead::new(location, lead(address), now)],
        complete: true,
        total_leads: 1,
    };
    serde_json::to_vec(&entry).unwrap()
}

#[tokio::test]
async fn test_get_treats_404_as_absent_and_sends_token() {
    let mut server = Server::new_async().await;
    let missing = server
        .mock("GET", "/batchleads_data_93720.json")
        .match_header("authorization", "Bearer s3cret")
        .with_status(404)
        .create_async()
        .await;

    let store = HttpObjectStore::new(&server.url(), Some("s3cret".to_string())).unwrap();
    assert!(store.get("batchleads_data_93720.json").await.unwrap().is_none());
    missing.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_surface_as_remote_status() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/batchleads_data_Hemet.json")
        .with_status(503)
        .create_async()
        .await;

    let store = HttpObjectStore::new(&server.url(), None).unwrap();
    let err = store
        .put("batchleads_data_Hemet.json", b"{}".to_vec(), "application/json")
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::RemoteStatus { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_list_and_exists() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/")
        .match_query(Matcher::UrlEncoded("prefix".into(), "batchleads_data_".into()))
        .with_header("content-type", "application/json")
        .with_body(r#"["batchleads_data_Corona.json","batchleads_data_Corona.csv","batchleads_data_Norco.json"]"#)
        .create_async()
        .await;
    server
        .mock("GET", "/batchleads_data_Corona.json")
        .with_header("content-type", "application/json")
        .with_body(document_body("Corona", "1 Main St"))
        .create_async()
        .await;
    server
        .mock("GET", "/batchleads_data_Norco.json")
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("HEAD", "/batchleads_data_Corona.json")
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("HEAD", "/batchleads_data_Ontario.json")
        .with_status(404)
        .create_async()
        .await;

    let objects = Arc::new(HttpObjectStore::new(&server.url(), None).unwrap());
    let store = DocumentLeadStore::new(objects as Arc<dyn ObjectStore>, "batchleads_data");

    let locations: Vec<_> = store.list_locations().await.unwrap().into_iter().collect();
    assert_eq!(locations, vec!["Corona", "Norco"]);
    assert!(store.exists("Corona").await.unwrap());
    assert!(!store.exists("Ontario").await.unwrap());
}

#[tokio::test]
async fn test_final_merge_puts_document_and_export() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/batchleads_data_Tustin.json")
        .with_status(404)
        .create_async()
        .await;
    let document = server
        .mock("PUT", "/batchleads_data_Tustin.json")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Regex(r#""complete":true"#.to_string()))
        .with_status(200)
        .create_async()
        .await;
    let export = server
        .mock("PUT", "/batchleads_data_Tustin.csv")
        .match_header("content-type", "text/csv")
        .match_body(Matcher::Regex("12 Red Hill Ave".to_string()))
        .with_status(200)
        .create_async()
        .await;

    let objects = Arc::new(HttpObjectStore::new(&server.url(), None).unwrap());
    let store = DocumentLeadStore::new(objects as Arc<dyn ObjectStore>, "batchleads_data");

    let report = store
        .merge_chunk("Tustin", vec![lead("12 Red Hill Ave")], true)
        .await
        .unwrap();
    assert_eq!(report.total, 1);

    document.assert_async().await;
    export.assert_async().await;
}

#[tokio::test]
async fn test_reserved_characters_stay_inside_one_key() {
    let mut server = Server::new_async().await;
    let read = server
        .mock("GET", "/batchleads_data_Unit%20%235.json")
        .with_status(404)
        .create_async()
        .await;
    let write = server
        .mock("PUT", "/batchleads_data_Unit%20%235.json")
        .match_body(Matcher::Regex("5 Elm St".to_string()))
        .with_status(200)
        .create_async()
        .await;
    // the truncated key a fragment would produce
    let clash = server
        .mock("PUT", "/batchleads_data_Unit%20")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let objects = Arc::new(HttpObjectStore::new(&server.url(), None).unwrap());
    let store = DocumentLeadStore::new(objects as Arc<dyn ObjectStore>, "batchleads_data");
    assert_eq!(store.document_key("Unit #5"), "batchleads_data_Unit #5.json");

    store
        .merge_chunk("Unit #5", vec![lead("5 Elm St")], false)
        .await
        .unwrap();

    read.assert_async().await;
    write.assert_async().await;
    clash.assert_async().await;
}

#[tokio::test]
async fn test_keys_nest_under_base_path() {
    let mut server = Server::new_async().await;
    let read = server
        .mock("GET", "/bucket/leads/batchleads_data_100%25%20Oak.json")
        .with_status(404)
        .create_async()
        .await;

    let store = HttpObjectStore::new(&format!("{}/bucket/leads", server.url()), None).unwrap();
    assert!(store.get("batchleads_data_100% Oak.json").await.unwrap().is_none());
    read.assert_async().await;
}
