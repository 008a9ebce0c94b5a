//! Recovery of JSON records from model text.
//!
//! Models asked for "only JSON" still wrap it in code fences, add a sentence
//! of preamble, or typeset quotes. [`normalize_model_output`] undoes those
//! habits in one place. [`decode`] tries a strict `serde_json` decode first
//! and only falls back to the normalized text when that fails.

use serde::de::DeserializeOwned;

/// Cleans raw model text so it can be decoded as a JSON object.
///
/// 1. Code-fence markers (```` ```json ```` and ```` ``` ````) are removed.
/// 2. Typographic double quotes (`“ ” „ ‟`) become `"`, single quotes
///    (`‘ ’ ‚ ‛`) become `'`.
/// 3. The result is trimmed; if it is still not a `{ ... }` object, the span
///    from the first `{` to the last `}` is taken.
///
/// ```
/// use dayfeed::llm::normalize_model_output;
///
/// let raw = "```json\n{“greeting”: “Hi”}\n```";
/// assert_eq!(normalize_model_output(raw), r#"{"greeting": "Hi"}"#);
/// ```
pub fn normalize_model_output(raw: &str) -> String {
    let cleaned: String = raw
        .replace("```json", "")
        .replace("```", "")
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            other => other,
        })
        .collect();

    let trimmed = cleaned.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed.to_string();
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => trimmed[start..=end].to_string(),
        _ => trimmed.to_string(),
    }
}

/// Decodes `raw` as `T`, retrying on [`normalize_model_output`] when the
/// text is not valid JSON as sent.
///
/// Typographic quotes inside string values of otherwise valid JSON are kept.
/// The error returned is the one from the recovery attempt.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(raw.trim()).or_else(|_| serde_json::from_str(&normalize_model_output(raw)))
}
