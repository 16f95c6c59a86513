use std::sync::LazyLock;

use regex::Regex;

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(#[\p{L}\p{N}_-]+)").expect("hashtag pattern")
});

static TRAILING_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)@([\w.-]+)$").expect("mention pattern"));

/// Hashtags of a changeset comment, in order, without duplicates.
pub fn changeset_hashtags(comment: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cap in HASHTAG.captures_iter(comment) {
        let tag = cap[1].to_string();
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Username prefix being typed at the end of the comment, if any.
pub fn mention_prefix(comment: &str) -> Option<&str> {
    TRAILING_MENTION
        .captures(comment)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Replaces the trailing `@prefix` with the full `@username `.
pub fn complete_mention(comment: &str, username: &str) -> String {
    match TRAILING_MENTION.captures(comment).and_then(|c| c.get(1)) {
        Some(m) => format!("{}{username} ", &comment[..m.start()]),
        None => comment.to_string(),
    }
}
