use crate::error::ParseError;
use serde::de::DeserializeOwned;

/// Slice from the first `{` to the last `}` of a model response.
fn json_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Pull the embedded JSON object out of free text and deserialize it.
///
/// Models wrap JSON in prose or code fences, so everything outside the
/// outermost braces is ignored.
pub fn parse_structured_response<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let span = json_object_span(text).ok_or(ParseError::NoObject)?;
    Ok(serde_json::from_str(span)?)
}

/// Like [`parse_structured_response`], but builds a fallback value on failure.
pub fn parse_or_else<T, F>(text: &str, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce(ParseError) -> T,
{
    parse_structured_response(text).unwrap_or_else(fallback)
}
