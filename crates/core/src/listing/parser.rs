//! Listing line parser.
//!
//! A listing line has the shape:
//!
//! ```text
//! !<peer> <author> [- <series> <number>] - <title> (<annotation>)... .<ext> ::INFO:: <size>
//! ```
//!
//! There is exactly one grammar. A line either decomposes into a [`Record`]
//! or fails with a [`ParseError`] naming the step that failed; nothing is
//! retried with a different grammar.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::debug;

use super::types::{ParseError, ParseStep, Record};
use crate::metrics::LISTING_LINES;

/// First character of every listing line.
pub const LINE_MARKER: char = '!';

/// Token separating the descriptor from the size field.
pub const INFO_MARKER: &str = "::INFO::";

/// Separator between author, series and title segments.
pub const SEGMENT_SEPARATOR: &str = " - ";

/// Annotation tokens recognised as content formats.
pub const FORMAT_VOCABULARY: &[&str] = &[
    "epub", "mobi", "azw", "azw3", "kfx", "pdf", "txt", "rtf", "lit", "doc", "docx", "djvu",
    "fb2", "cbr", "cbz", "lrf", "pdb", "htm", "html",
];

static EDITION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:retail|v\d+(?:\.\d+)?)$").unwrap());

static COUNTRY_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").unwrap());

static SERIES_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(.+?)\s+)?#?(\d+(?:\.\d+)?)$").unwrap());

static EMBEDDED_SERIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]]*\S\s+#?\d+(?:\.\d+)?)\]").unwrap());

/// Outcome of parsing every line of a listing.
#[derive(Debug, Clone, Default)]
pub struct ParsedListing {
    /// Successfully parsed records, in line order.
    pub records: Vec<Record>,
    /// Lines that carried the marker but did not fit the grammar.
    pub failures: Vec<ParseError>,
    /// Lines without the marker (headers, blank lines, banners).
    pub ignored: usize,
}

/// Parse one raw listing line.
pub fn parse_line(line: &str) -> Result<Record, ParseError> {
    let text = line.trim();
    let body = text
        .strip_prefix(LINE_MARKER)
        .ok_or(ParseError::NotAListingLine)?;

    let (peer, rest) = body
        .split_once(char::is_whitespace)
        .filter(|(peer, rest)| !peer.is_empty() && !rest.trim().is_empty())
        .ok_or_else(|| malformed(line, ParseStep::PeerIdentity, "no descriptor after peer"))?;

    let (descriptor, size_text) = match rest.split_once(INFO_MARKER) {
        Some((descriptor, size)) => {
            let size = size.trim();
            (descriptor.trim(), (!size.is_empty()).then(|| size.to_string()))
        }
        None => (rest.trim(), None),
    };
    if descriptor.is_empty() {
        return Err(malformed(line, ParseStep::Descriptor, "empty descriptor"));
    }

    let (stem, extension) = descriptor
        .rsplit_once('.')
        .filter(|(stem, ext)| {
            !stem.trim().is_empty()
                && !ext.is_empty()
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .ok_or_else(|| malformed(line, ParseStep::ContainerFormat, "no file extension"))?;
    let container_format = extension.to_ascii_lowercase();

    let (remaining, annotations) = strip_annotations(stem);

    let segments = split_segments(remaining);
    if segments.len() < 2 {
        return Err(malformed(line, ParseStep::Segments, "no author/title separator"));
    }

    let (author_text, series_block, title) = if segments.len() >= 3 {
        (
            segments[0].to_string(),
            Some(segments[1]),
            segments[2..].join(SEGMENT_SEPARATOR),
        )
    } else {
        let (author, block) = split_embedded_series(segments[0]);
        (author, block, segments[1].to_string())
    };

    let author = normalize_author(&author_text);
    if author.is_empty() {
        return Err(malformed(line, ParseStep::Segments, "empty author"));
    }
    let (series, series_number) = series_block.map(parse_series).unwrap_or((None, None));

    Ok(Record {
        origin_peer: peer.to_string(),
        author,
        title: title.trim().to_string(),
        series,
        series_number,
        content_format: annotations
            .format
            .unwrap_or_else(|| container_format.clone()),
        container_format,
        edition_tag: annotations.edition,
        country_tag: annotations.country,
        labels: annotations.labels,
        size_text,
        raw_filename: descriptor.to_string(),
        raw_line: line.to_string(),
    })
}

/// Parse every line of a listing, keeping successes and counting the rest.
pub fn parse_lines<I, S>(lines: I) -> ParsedListing
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = ParsedListing::default();
    for line in lines {
        match parse_line(line.as_ref()) {
            Ok(record) => {
                LISTING_LINES.with_label_values(&["parsed"]).inc();
                parsed.records.push(record);
            }
            Err(ParseError::NotAListingLine) => {
                LISTING_LINES.with_label_values(&["ignored"]).inc();
                parsed.ignored += 1;
            }
            Err(err) => {
                debug!("Skipping listing line: {}", err);
                LISTING_LINES.with_label_values(&["malformed"]).inc();
                parsed.failures.push(err);
            }
        }
    }
    parsed
}

/// Normalize an author to "First Last" order with single spaces.
///
/// "Last, First" is inverted. The result never contains a comma, so the
/// function is idempotent.
pub fn normalize_author(raw: &str) -> String {
    let ordered = match raw.split_once(',') {
        Some((last, first)) => format!("{} {}", first.replace(',', " "), last),
        None => raw.to_string(),
    };
    ordered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn malformed(line: &str, step: ParseStep, reason: &'static str) -> ParseError {
    ParseError::Malformed {
        line: line.to_string(),
        step,
        reason,
    }
}

#[derive(Debug, Default)]
struct Annotations {
    edition: Option<String>,
    format: Option<String>,
    country: Option<String>,
    labels: Vec<String>,
}

/// Strip trailing `(..)`/`[..]` groups and classify their comma-separated
/// tokens. Returns the descriptor stem left over.
fn strip_annotations(stem: &str) -> (&str, Annotations) {
    let mut remaining = stem.trim_end();
    let mut groups = Vec::new();
    while let Some((head, inner)) = split_trailing_annotation(remaining) {
        groups.push(inner);
        remaining = head;
    }
    // Stripped right to left; classify in line order.
    groups.reverse();

    let tokens = groups
        .iter()
        .flat_map(|group| group.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    (remaining, classify_tokens(tokens))
}

fn split_trailing_annotation(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_end();
    let open = match text.chars().last()? {
        ')' => '(',
        ']' => '[',
        _ => return None,
    };
    let open_idx = text.rfind(open)?;
    let head = text[..open_idx].trim_end();
    if head.is_empty() {
        return None;
    }
    Some((head, &text[open_idx + 1..text.len() - 1]))
}

fn classify_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> Annotations {
    let mut annotations = Annotations::default();
    let mut unclaimed = Vec::new();

    for token in tokens {
        if EDITION_TOKEN.is_match(token) {
            if annotations.edition.is_none() {
                annotations.edition = Some(token.to_ascii_lowercase());
            } else {
                debug!("Dropping extra edition annotation {:?}", token);
            }
        } else if let Some(format) = known_format(token) {
            if annotations.format.is_none() {
                annotations.format = Some(format);
            } else {
                debug!("Dropping extra format annotation {:?}", token);
            }
        } else {
            unclaimed.push(token);
        }
    }

    for token in unclaimed {
        if !COUNTRY_TOKEN.is_match(token) {
            annotations.labels.push(token.to_string());
        } else if annotations.country.is_none() {
            annotations.country = Some(token.to_string());
        } else {
            debug!("Dropping extra country annotation {:?}", token);
        }
    }

    annotations
}

fn known_format(token: &str) -> Option<String> {
    let lowered = token.to_ascii_lowercase();
    FORMAT_VOCABULARY
        .contains(&lowered.as_str())
        .then_some(lowered)
}

/// Split on the segment separator, dropping a trailing duplicate of the
/// author (or of the segment just before it).
fn split_segments(descriptor: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = descriptor
        .split(SEGMENT_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() > 2 {
        let last = normalize_author(segments[segments.len() - 1]);
        let previous = normalize_author(segments[segments.len() - 2]);
        let first = normalize_author(segments[0]);
        if last.eq_ignore_ascii_case(&first) || last.eq_ignore_ascii_case(&previous) {
            segments.pop();
        }
    }
    segments
}

/// Pull a `[Series 03]` block out of an author segment.
fn split_embedded_series(segment: &str) -> (String, Option<&str>) {
    let Some(caps) = EMBEDDED_SERIES.captures(segment) else {
        return (segment.to_string(), None);
    };
    let (Some(whole), Some(block)) = (caps.get(0), caps.get(1)) else {
        return (segment.to_string(), None);
    };

    let author = format!("{} {}", &segment[..whole.start()], &segment[whole.end()..]);
    if author.trim().is_empty() {
        return (segment.to_string(), None);
    }
    (author, Some(block.as_str()))
}

fn parse_series(block: &str) -> (Option<String>, Option<String>) {
    let block = block
        .trim()
        .trim_matches(|c| matches!(c, '[' | ']' | '(' | ')'))
        .trim();
    if block.is_empty() {
        return (None, None);
    }

    match SERIES_BLOCK.captures(block) {
        Some(caps) => (
            caps.get(1)
                .map(|name| name.as_str().trim().to_string())
                .filter(|name| !name.is_empty()),
            caps.get(2).map(|number| number.as_str().to_string()),
        ),
        None => (Some(block.to_string()), None),
    }
}
