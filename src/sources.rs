use crate::types::SourceRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static CITATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").expect("citation pattern is valid")
});

/// Append every record of `incoming` not already present in `into`.
///
/// Membership is a linear scan over structural equality, which keeps the
/// first occurrence and its position.
pub fn merge_unique<'a, I>(into: &mut Vec<SourceRecord>, incoming: I)
where
    I: IntoIterator<Item = &'a SourceRecord>,
{
    for source in incoming {
        if !into.contains(source) {
            into.push(source.clone());
        }
    }
}

/// Truncate `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", &text[..cut]),
    }
}

/// Numbered (1-based) listing used in prompts.
pub fn format_sources(sources: &[SourceRecord]) -> String {
    if sources.is_empty() {
        return "No sources found.".to_string();
    }

    let mut formatted = String::from("Sources:\n");
    for (i, source) in sources.iter().enumerate() {
        let title = if source.title.is_empty() { "Untitled" } else { source.title.as_str() };
        let url = if source.url.is_empty() { "No URL" } else { source.url.as_str() };
        let published = source.published_date.as_deref().unwrap_or("Unknown date");
        formatted.push_str(&format!(
            "{}. {}\n   URL: {}\n   Published: {}\n\n",
            i + 1,
            title,
            url,
            published
        ));
    }
    formatted
}

/// Bracketed source numbers cited in an answer, e.g. `[1]` or `[2, 3]`.
pub fn cited_sources(text: &str) -> BTreeSet<usize> {
    CITATION
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .flat_map(|group| {
            group
                .as_str()
                .split(',')
                .filter_map(|n| n.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<SourceRecord> {
        vec![
            SourceRecord::new("A", "u1"),
            SourceRecord::new("B", "u2"),
            SourceRecord::new("A", "u1"),
        ]
    }

    #[test]
    fn test_merge_drops_structural_duplicates() {
        let mut merged = Vec::new();
        merge_unique(&mut merged, &sample());
        assert_eq!(merged, vec![SourceRecord::new("A", "u1"), SourceRecord::new("B", "u2")]);
    }

    #[test]
    fn test_merge_with_self_is_idempotent() {
        let mut merged = Vec::new();
        merge_unique(&mut merged, &sample());
        let before = merged.clone();
        merge_unique(&mut merged, &before);
        assert_eq!(merged, before);
    }

    #[test]
    fn test_records_differing_in_content_are_distinct() {
        let mut other = SourceRecord::new("A", "u1");
        other.content = "different".into();
        let mut merged = vec![SourceRecord::new("A", "u1")];
        merge_unique(&mut merged, [&other]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_excerpt_marks_truncation() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("héllo wörld", 5), "héllo...");
        assert_eq!(excerpt(&"x".repeat(1000), 1000).len(), 1000);
    }

    #[test]
    fn test_format_sources_placeholders() {
        assert_eq!(format_sources(&[]), "No sources found.");
        let mut dated = SourceRecord::new("A", "u1");
        dated.published_date = Some("2024-05-01".into());
        let listing = format_sources(&[dated, SourceRecord::default()]);
        assert_eq!(
            listing,
            "Sources:\n1. A\n   URL: u1\n   Published: 2024-05-01\n\n2. Untitled\n   URL: No URL\n   Published: Unknown date\n\n"
        );
    }

    #[test]
    fn test_cited_sources() {
        let cited = cited_sources("AI shifts work [1]. Others disagree [2, 4] and [x].");
        assert_eq!(cited.into_iter().collect::<Vec<_>>(), vec![1, 2, 4]);
    }
}
