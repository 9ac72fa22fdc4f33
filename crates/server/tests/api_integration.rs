//! Operator API and bridge tests, driven in-process.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{fixtures, sent_lines, TestFixture};

const LISTING_NAME: &str = "SearchOok_results_for_Twelve_Days_epub_rar.txt.zip";

/// Submit "Twelve Days" and walk it to a delivered listing.
async fn search_with_listing(fixture: &TestFixture) -> String {
    let response = fixture
        .post("/api/v1/searches", json!({ "query": "Twelve Days" }))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let id = response.body["id"].as_str().unwrap().to_string();

    fixture
        .reply("SearchOok", "Your search for \"Twelve Days epub rar\" has been accepted.")
        .await;
    fixture
        .reply("SearchOok", "Your search for \"Twelve Days epub rar\" returned 3 matches.")
        .await;

    let retail = fixtures::listing_line("Ook", "Alex Berenson", "Twelve Days", Some("retail"));
    let v4 = fixtures::listing_line("Xon", "Berenson, Alex", "Twelve Days", Some("v4.0"));
    let other = fixtures::listing_line("Xon", "Alex Berenson", "The Ghost War", None);
    let zip = fixtures::listing_zip_bytes(&["Search results from SearchOok.", &retail, &v4, &other]);

    let response = fixture
        .upload_file(Some("SearchOok"), LISTING_NAME, &zip)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["outcome"], "listing_delivered");
    assert_eq!(response.body["search_ids"][0], id.as_str());

    id
}

fn record_index(records: &Value, edition: &str) -> u64 {
    records
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["edition_tag"] == edition)
        .and_then(|r| r["index"].as_u64())
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_bridge() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["bridge_connected"], false);

    let _client = fixture.attach_client();
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.body["bridge_connected"], true);
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["chat"]["nickname"], "bookworm");
    assert_eq!(response.body["search"]["suffix"], "epub rar");
}

#[tokio::test]
async fn test_search_to_download() {
    let fixture = TestFixture::new();
    let mut client = fixture.attach_client();

    let id = search_with_listing(&fixture).await;
    assert_eq!(
        sent_lines(&mut client),
        vec!["@searchook Twelve Days epub rar".to_string()]
    );

    let response = fixture.get(&format!("/api/v1/searches/{}", id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "results_found");
    assert_eq!(response.body["expected_count"], 3);
    assert_eq!(response.body["result_count"], 3);
    assert_eq!(response.body["live"], false);

    let response = fixture
        .get(&format!("/api/v1/searches/{}/results", id))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["view"], "grouped");
    let groups = response.body["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    let twelve = groups
        .iter()
        .find(|g| g["key"]["title"] == "twelve days")
        .unwrap();
    assert_eq!(twelve["records"].as_array().unwrap().len(), 2);
    assert_eq!(twelve["records"][0]["origin_peer"], "Ook");

    let index = record_index(&twelve["records"], "retail");
    let response = fixture
        .post("/api/v1/downloads", json!({ "search_id": id, "index": index }))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(
        response.body["line"],
        "!Ook Alex Berenson - Twelve Days (retail) (epub).rar"
    );
    assert_eq!(
        sent_lines(&mut client),
        vec!["!Ook Alex Berenson - Twelve Days (retail) (epub).rar".to_string()]
    );

    let response = fixture
        .upload_file(
            Some("Ook"),
            "Alex Berenson - Twelve Days (retail) (epub).rar",
            b"rar bytes",
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["outcome"], "saved");
    assert!(fixture
        .temp_dir
        .path()
        .join("Alex Berenson - Twelve Days (retail) (epub).rar")
        .exists());

    let response = fixture.get("/api/v1/downloads").await;
    assert_eq!(response.body["total"], 1);
    assert_eq!(response.body["downloads"][0]["from"], "Ook");
}

#[tokio::test]
async fn test_search_without_chat_client_fails() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/api/v1/searches", json!({ "query": "Dune" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);

    let response = fixture.get("/api/v1/searches?view=completed").await;
    assert_eq!(response.body["total"], 1);
    assert_eq!(response.body["searches"][0]["status"], "error");
}

#[tokio::test]
async fn test_duplicate_search_conflicts() {
    let fixture = TestFixture::new();
    let _client = fixture.attach_client();

    let response = fixture
        .post("/api/v1/searches", json!({ "query": "Twelve Days" }))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let response = fixture
        .post("/api/v1/searches", json!({ "query": "twelve   days" }))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = fixture.get("/api/v1/searches?view=active").await;
    assert_eq!(response.body["total"], 1);
}

#[tokio::test]
async fn test_empty_query_is_bad_request() {
    let fixture = TestFixture::new();
    let _client = fixture.attach_client();

    let response = fixture
        .post("/api/v1/searches", json!({ "query": "   " }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_search() {
    let fixture = TestFixture::new();

    let response = fixture
        .get("/api/v1/searches/550e8400-e29b-41d4-a716-446655440000")
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = fixture.get("/api/v1/searches/not-a-uuid").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_view_is_rejected() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/searches?view=recent").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_search() {
    let fixture = TestFixture::new();
    let _client = fixture.attach_client();

    let response = fixture
        .post("/api/v1/searches", json!({ "query": "Twelve Days" }))
        .await;
    let id = response.body["id"].as_str().unwrap().to_string();

    let response = fixture.delete(&format!("/api/v1/searches/{}", id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "error");
    assert_eq!(response.body["failure"], "cancelled");

    let response = fixture
        .post("/api/v1/searches", json!({ "query": "Twelve Days" }))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_results_follow_preferred_downloader() {
    let fixture = TestFixture::new();
    let _client = fixture.attach_client();
    let id = search_with_listing(&fixture).await;

    let response = fixture
        .get(&format!("/api/v1/searches/{}/downloaders", id))
        .await;
    assert_eq!(response.body["downloaders"], json!(["Ook", "Xon"]));

    let response = fixture
        .put("/api/v1/preferences", json!({ "preferred_downloader": "xon" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["preferred_downloader"], "Xon");

    let response = fixture
        .get(&format!("/api/v1/searches/{}/results?view=all", id))
        .await;
    assert_eq!(response.body["downloader"], "Xon");
    assert_eq!(response.body["records"].as_array().unwrap().len(), 2);

    let response = fixture
        .get(&format!("/api/v1/searches/{}/results?view=all&peer=Ook", id))
        .await;
    assert_eq!(response.body["records"].as_array().unwrap().len(), 1);

    let response = fixture
        .get(&format!("/api/v1/searches/{}/results?view=all&all=true", id))
        .await;
    assert!(response.body["downloader"].is_null());
    assert_eq!(response.body["records"].as_array().unwrap().len(), 3);

    let response = fixture
        .get(&format!("/api/v1/searches/{}/results?view=editions&all=true", id))
        .await;
    let editions = response.body["records"].as_array().unwrap();
    assert_eq!(editions[0]["edition_tag"], "retail");

    let response = fixture
        .put("/api/v1/preferences", json!({ "preferred_downloader": "Nobody" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_preferences_and_peers() {
    let fixture = TestFixture::new();
    let mut client = fixture.attach_client();
    fixture.join("Welcome! Search with @SearchOok or @otherSearch").await;

    let response = fixture.get("/api/v1/peers").await;
    assert_eq!(response.body["peers"], json!(["searchook", "othersearch"]));
    assert_eq!(response.body["search_peer"], "searchook");

    let response = fixture
        .put("/api/v1/preferences", json!({ "search_peer": "nosuchpeer" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture
        .put(
            "/api/v1/preferences",
            json!({ "download_dir": "/nonexistent/bookhound/dir" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture
        .put(
            "/api/v1/preferences",
            json!({ "search_peer": "OtherSearch", "suffix": "mobi" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["search_peer"], "othersearch");
    assert_eq!(response.body["search_suffix"], "mobi");

    fixture
        .post("/api/v1/searches", json!({ "query": "Dune" }))
        .await;
    assert_eq!(sent_lines(&mut client), vec!["@othersearch Dune mobi".to_string()]);

    let response = fixture.get("/api/v1/preferences").await;
    assert_eq!(response.body["search_suffix"], "mobi");
}

#[tokio::test]
async fn test_repeated_listing_lines_get_distinct_indices() {
    let fixture = TestFixture::new();
    let mut client = fixture.attach_client();

    let response = fixture
        .post("/api/v1/searches", json!({ "query": "Dune" }))
        .await;
    let id = response.body["id"].as_str().unwrap().to_string();
    fixture.reply("searchook", "dune epub rar accepted").await;
    fixture.reply("searchook", "dune epub rar returned 2 matches").await;

    let line = fixtures::listing_line("Ook", "Frank Herbert", "Dune", None);
    let zip = fixtures::listing_zip_bytes(&[&line, &line]);
    let response = fixture
        .upload_file(Some("searchook"), "SearchOok_results_for_dune_epub_rar.txt.zip", &zip)
        .await;
    assert_eq!(response.body["outcome"], "listing_delivered");

    let response = fixture
        .get(&format!("/api/v1/searches/{}/results?view=all", id))
        .await;
    let indices: Vec<u64> = response.body["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["index"].as_u64().unwrap())
        .collect();
    assert_eq!(indices, vec![0, 1]);

    let response = fixture
        .get(&format!("/api/v1/searches/{}/results", id))
        .await;
    assert_eq!(response.body["groups"][0]["records"][1]["index"], 1);

    sent_lines(&mut client);
    let response = fixture
        .post("/api/v1/downloads", json!({ "search_id": id, "index": 1 }))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(sent_lines(&mut client), vec!["!Ook Frank Herbert - Dune (epub).rar".to_string()]);
}

#[tokio::test]
async fn test_download_line() {
    let fixture = TestFixture::new();
    let mut client = fixture.attach_client();

    let line = fixtures::listing_line("Ook", "Frank Herbert", "Dune", None);
    let response = fixture
        .post("/api/v1/downloads", json!({ "line": line }))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(sent_lines(&mut client), vec!["!Ook Frank Herbert - Dune (epub).rar".to_string()]);

    let response = fixture
        .post("/api/v1/downloads", json!({ "line": "not a listing line" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unreadable_listing_fails_search() {
    let fixture = TestFixture::new();
    let _client = fixture.attach_client();

    let response = fixture
        .post("/api/v1/searches", json!({ "query": "Twelve Days" }))
        .await;
    let id = response.body["id"].as_str().unwrap().to_string();
    fixture.reply("searchook", "twelve days epub rar accepted").await;
    fixture.reply("searchook", "twelve days epub rar returned 2 matches").await;

    let response = fixture
        .upload_file(
            Some("searchook"),
            "SearchOok_results_for_twelve_days_epub_rar.rar",
            b"not a zip",
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["outcome"], "listing_unreadable");

    let response = fixture.get(&format!("/api/v1/searches/{}", id)).await;
    assert_eq!(response.body["status"], "error");
}

#[tokio::test]
async fn test_upload_requires_sender() {
    let fixture = TestFixture::new();
    let response = fixture.upload_file(None, "book.epub", b"data").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("bookhound_http_requests_total"));
    assert!(response.text.contains("bookhound_searches_by_status"));
}
