//! Grouping and ranking of parsed records for presentation.

use std::borrow::Borrow;
use std::cmp::Reverse;
use std::collections::HashMap;

use serde::Serialize;

use super::types::Record;

/// Case-insensitive identity of one logical work.
///
/// Field order is the sort order: country, author, series, series number,
/// title. Missing values sort as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub country: String,
    pub author: String,
    pub series: String,
    pub series_number: String,
    pub title: String,
}

impl GroupKey {
    pub fn of(record: &Record) -> Self {
        let lower = |value: Option<&str>| value.unwrap_or_default().to_lowercase();
        Self {
            country: lower(record.country_tag.as_deref()),
            author: lower(Some(&record.author)),
            series: lower(record.series.as_deref()),
            series_number: lower(record.series_number.as_deref()),
            title: lower(Some(&record.title)),
        }
    }
}

/// All records for one logical work, best edition first.
///
/// Members are plain records or anything that borrows as one, such as
/// [`IndexedRecord`](super::IndexedRecord).
#[derive(Debug, Clone, Serialize)]
pub struct RecordGroup<T = Record> {
    pub key: GroupKey,
    /// Never empty.
    pub records: Vec<T>,
}

impl<T: Borrow<Record>> RecordGroup<T> {
    /// The best-ranked record of the group.
    pub fn representative(&self) -> &Record {
        record_of(&self.records[0])
    }

    /// Label for menus: "Author <-> Series (N) <-> Title".
    pub fn display_name(&self) -> String {
        let top = self.representative();
        let series = match &top.series {
            Some(series) => format!(
                "{} ({})",
                series,
                top.series_number.as_deref().unwrap_or("?")
            ),
            None => String::new(),
        };
        format!("{} <-> {} <-> {}", top.author, series, top.title)
    }
}

/// Group records by logical work.
///
/// Members of a group are ordered by edition rank, best first; groups are
/// ordered by key. Both sorts are stable, so ties keep insertion order.
pub fn group_records<I, T>(records: I) -> Vec<RecordGroup<T>>
where
    I: IntoIterator<Item = T>,
    T: Borrow<Record>,
{
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<RecordGroup<T>> = Vec::new();

    for record in records {
        let key = GroupKey::of(record_of(&record));
        match index.get(&key) {
            Some(&i) => groups[i].records.push(record),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(RecordGroup {
                    key,
                    records: vec![record],
                });
            }
        }
    }

    for group in &mut groups {
        group.records.sort_by_key(|r| Reverse(record_of(r).edition_rank()));
    }
    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups
}

/// Keep one record per distinct edition rank, best rank first.
///
/// The first record seen for a rank wins.
pub fn unique_editions<I, T>(records: I) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    T: Borrow<Record>,
{
    let mut records: Vec<T> = records.into_iter().collect();
    records.sort_by_key(|r| Reverse(record_of(r).edition_rank()));
    records.dedup_by_key(|r| record_of(r).edition_rank());
    records
}

fn record_of<T: Borrow<Record>>(item: &T) -> &Record {
    item.borrow()
}

/// Distinct origin peers, in first-seen order.
pub fn downloaders(records: &[Record]) -> Vec<String> {
    let mut peers: Vec<String> = Vec::new();
    for record in records {
        if !peers
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&record.origin_peer))
        {
            peers.push(record.origin_peer.clone());
        }
    }
    peers
}

/// Records advertised by one peer (case-insensitive).
pub fn filter_by_peer(records: &[Record], peer: &str) -> Vec<Record> {
    records
        .iter()
        .filter(|r| r.origin_peer.eq_ignore_ascii_case(peer))
        .cloned()
        .collect()
}
