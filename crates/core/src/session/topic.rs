//! Discovery of search peers from the channel topic.

/// Candidate search peers named in a channel topic.
///
/// A token counts when it starts with `sentinel` and contains "search"
/// (any case). The sentinel is stripped and the name lower-cased; duplicates
/// are dropped and topic order is kept.
pub fn parse_search_peers(topic: &str, sentinel: &str) -> Vec<String> {
    let mut peers: Vec<String> = Vec::new();
    for token in topic.split_whitespace() {
        let Some(name) = token.strip_prefix(sentinel) else {
            continue;
        };
        let name = name.to_lowercase();
        if name.is_empty() || !name.contains("search") || peers.contains(&name) {
            continue;
        }
        peers.push(name);
    }
    peers
}
