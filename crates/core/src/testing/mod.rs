//! Testing utilities and mock implementations.
//!
//! This module provides a recording chat transport and fixtures for driving
//! a session without a chat network.
//!
//! # Example
//!
//! ```rust,ignore
//! use bookhound_core::testing::{fixtures, MockTransport};
//! use bookhound_core::SessionController;
//!
//! let transport = MockTransport::new();
//! let mut session = SessionController::new(transport.clone(), fixtures::session_settings(dir));
//!
//! session.submit_search("twelve days")?;
//! assert_eq!(transport.lines(), vec!["@searchook twelve days epub rar"]);
//! ```

mod mock_transport;

pub use mock_transport::MockTransport;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::{Cursor, Write};
    use std::path::Path;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use crate::config::{load_config_from_str, Config};
    use crate::listing::{parse_line, Record};
    use crate::session::SessionSettings;

    /// Session settings with the usual defaults and downloads in `dir`.
    pub fn session_settings(dir: &Path) -> SessionSettings {
        SessionSettings {
            channel: "#ebooks".to_string(),
            sentinel: "@".to_string(),
            default_peer: Some("searchook".to_string()),
            suffix: "epub rar".to_string(),
            download_dir: dir.to_path_buf(),
            timeout: None,
        }
    }

    /// A valid configuration with downloads in `dir`.
    pub fn config(dir: &Path) -> Config {
        let toml = format!(
            r#"
[chat]
nickname = "bookworm"

[downloads]
path = "{}"
"#,
            dir.display()
        );
        load_config_from_str(&toml).expect("fixture config parses")
    }

    /// Parse a listing line that is known to be valid.
    pub fn record(line: &str) -> Record {
        parse_line(line).expect("fixture line parses")
    }

    /// A listing line for `author` and `title` advertised by `peer`.
    pub fn listing_line(peer: &str, author: &str, title: &str, edition: Option<&str>) -> String {
        let edition = edition.map(|e| format!(" ({})", e)).unwrap_or_default();
        format!("!{} {} - {}{} (epub).rar ::INFO:: 512KB", peer, author, title, edition)
    }

    /// Zip archive bytes holding one text member with `lines`.
    pub fn listing_zip_bytes(lines: &[&str]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("SearchOok_results.txt", SimpleFileOptions::default())
            .expect("start zip entry");
        writer
            .write_all(lines.join("\r\n").as_bytes())
            .expect("write zip entry");
        writer.finish().expect("finish zip").into_inner()
    }

    /// Write a zip archive with the given (name, content) members to `path`.
    pub fn write_listing_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).expect("create zip file");
        let mut writer = ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start zip entry");
            writer.write_all(content.as_bytes()).expect("write zip entry");
        }
        writer.finish().expect("finish zip");
    }
}
