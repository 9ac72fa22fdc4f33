//! Session lifecycle integration tests.
//!
//! These tests drive a session the way a chat client would:
//! join -> search -> acknowledgement -> result count -> listing -> download

use chrono::{Duration, Utc};
use tempfile::TempDir;

use bookhound_core::{
    testing::{fixtures, MockTransport},
    ChatEvent, EventOutcome, FileOutcome, PreferencesUpdate, SearchError, SearchStatus,
    SessionController, SessionError, SessionSettings,
};

/// Test helper holding a session and its download directory.
struct TestHarness {
    session: SessionController<MockTransport>,
    transport: MockTransport,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_settings(|_| {})
    }

    fn with_settings(adjust: impl FnOnce(&mut SessionSettings)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut settings = fixtures::session_settings(temp_dir.path());
        adjust(&mut settings);
        let transport = MockTransport::new();
        let session = SessionController::new(transport.clone(), settings);
        Self {
            session,
            transport,
            temp_dir,
        }
    }

    fn join(&mut self, topic: &str) {
        self.session
            .handle_event(ChatEvent::Joined {
                topic: topic.to_string(),
            })
            .expect("join");
    }

    fn reply(&mut self, from: &str, text: &str) -> EventOutcome {
        self.session
            .handle_event(ChatEvent::PrivateMessage {
                from: from.to_string(),
                text: text.to_string(),
            })
            .expect("reply")
    }

    fn offer(&mut self, from: &str, filename: &str, data: Vec<u8>) -> EventOutcome {
        self.session
            .handle_event(ChatEvent::FileOffer {
                from: from.to_string(),
                filename: filename.to_string(),
                data,
            })
            .expect("file offer")
    }
}

#[test]
fn test_search_to_download() {
    let mut h = TestHarness::new();
    h.join("Welcome! Search with @SearchOok or @search. Rules at example.org");

    let id = h.session.submit_search("Twelve Days").unwrap().id();
    assert_eq!(
        h.transport.lines(),
        vec!["@searchook Twelve Days epub rar".to_string()]
    );

    h.reply(
        "SearchOok",
        "Your search for \"Twelve Days epub rar\" has been accepted. Searching...",
    );
    assert_eq!(
        h.session.search(id).unwrap().status(),
        SearchStatus::InProgress
    );

    h.reply(
        "SearchOok",
        "Your search for \"Twelve Days epub rar\" returned 3 matches. Sending results...",
    );
    assert_eq!(
        h.session.search(id).unwrap().status(),
        SearchStatus::ResultsFound
    );
    assert_eq!(h.session.search(id).unwrap().expected_count(), Some(3));

    let retail = fixtures::listing_line("Ook", "Alex Berenson", "Twelve Days", Some("retail"));
    let v4 = fixtures::listing_line("Xon", "Berenson, Alex", "Twelve Days", Some("v4.0"));
    let other = fixtures::listing_line("Xon", "Alex Berenson", "The Ghost War", None);
    let outcome = h.offer(
        "SearchOok",
        "SearchOok_results_for_Twelve_Days_epub_rar.txt.zip",
        fixtures::listing_zip_bytes(&[
            "Search results from SearchOok.",
            &retail,
            &v4,
            &other,
            "!Broken",
        ]),
    );
    assert_eq!(
        outcome,
        EventOutcome::File(FileOutcome::ListingDelivered {
            search_ids: vec![id]
        })
    );

    let search = h.session.search(id).unwrap();
    assert_eq!(search.results().len(), 3);
    assert_eq!(search.malformed_lines(), 1);
    assert!(h.session.active_searches().is_empty());
    assert_eq!(h.session.completed_searches().len(), 1);

    let groups = h.session.grouped_results(id, None).unwrap();
    assert_eq!(groups.len(), 2);
    let twelve = groups
        .iter()
        .find(|g| g.representative().title == "Twelve Days")
        .unwrap();
    assert_eq!(twelve.records.len(), 2);
    assert_eq!(twelve.representative().origin_peer, "Ook");

    // Pick the retail edition and ask its peer for it.
    let index = search
        .results()
        .iter()
        .position(|r| r.edition_tag.as_deref() == Some("retail"))
        .unwrap();
    let line = h.session.request_download(id, index).unwrap();
    assert_eq!(
        line,
        "!Ook Alex Berenson - Twelve Days (retail) (epub).rar"
    );

    // The book itself arrives unsolicited.
    let outcome = h.offer(
        "Ook",
        "Alex Berenson - Twelve Days (retail) (epub).rar",
        b"rar bytes".to_vec(),
    );
    assert!(matches!(outcome, EventOutcome::File(FileOutcome::Saved(_))));
    let saved = h
        .temp_dir
        .path()
        .join("Alex Berenson - Twelve Days (retail) (epub).rar");
    assert!(saved.exists());
    assert_eq!(h.session.downloads().len(), 1);
}

#[test]
fn test_duplicate_search_while_in_progress() {
    let mut h = TestHarness::new();
    h.session.submit_search("Twelve Days").unwrap();
    h.reply("searchook", "twelve days epub rar accepted");

    let err = h.session.submit_search("twelve_days").unwrap_err();
    assert!(matches!(
        err,
        SessionError::Search(SearchError::DuplicateSearch { .. })
    ));
    // Only the first request went out.
    assert_eq!(h.transport.lines().len(), 1);
}

#[test]
fn test_no_results() {
    let mut h = TestHarness::new();
    let id = h.session.submit_search("Nonexistent Book").unwrap().id();
    h.reply("searchook", "Your search for nonexistent book epub rar has been accepted");
    let outcome = h.reply(
        "searchook",
        "Sorry, your search for nonexistent book epub rar returned no matches",
    );

    match outcome {
        EventOutcome::Transitioned(changes) => {
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].to, SearchStatus::NoResults);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(h.session.search(id).unwrap().results().is_empty());
}

#[test]
fn test_timeout_moves_silent_search_to_error() {
    let mut h = TestHarness::with_settings(|s| s.timeout = Some(Duration::seconds(60)));
    let id = h.session.submit_search("Twelve Days").unwrap().id();

    assert!(h.session.expire_overdue(Utc::now()).is_empty());
    let changes = h.session.expire_overdue(Utc::now() + Duration::seconds(120));
    assert_eq!(changes.len(), 1);

    let search = h.session.search(id).unwrap();
    assert_eq!(search.status(), SearchStatus::Error);
    assert_eq!(search.failure(), Some("timed out waiting for peer"));

    // A late acknowledgement is no longer routed to it.
    let outcome = h.reply("searchook", "twelve days epub rar accepted");
    assert!(matches!(
        outcome,
        EventOutcome::UnknownPeerAcknowledgement { .. }
    ));
}

#[test]
fn test_preferences_change_peer_and_suffix() {
    let mut h = TestHarness::new();
    h.join("@searchook @otherSearch");

    h.session
        .update_preferences(PreferencesUpdate {
            search_peer: Some("othersearch".to_string()),
            suffix: Some("mobi".to_string()),
            ..Default::default()
        })
        .unwrap();

    h.session.submit_search("Dune").unwrap();
    assert_eq!(h.transport.lines(), vec!["@othersearch Dune mobi".to_string()]);
}

#[test]
fn test_cancel_search() {
    let mut h = TestHarness::new();
    let id = h.session.submit_search("Twelve Days").unwrap().id();

    let search = h.session.cancel_search(id).unwrap();
    assert_eq!(search.status(), SearchStatus::Error);
    assert_eq!(search.failure(), Some("cancelled"));

    // Resubmitting is allowed once the first search is gone.
    assert!(h.session.submit_search("Twelve Days").is_ok());
}
