//! Pull the first JSON object out of free-form model output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use std::io;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)```(?:json)?\s*([\s\S]*?)```").expect("valid fenced-block regex")
});

/// Return the first parseable JSON value in `text` as single-line JSON, or `""`.
///
/// A fenced code block (```` ```json ```` or bare ```` ``` ````) is tried
/// first. Otherwise every balanced `{...}` span is tried in order of its
/// opening brace. Items are separated by `", "` and keys by `": "`, key
/// order is preserved, and non-ASCII text is not escaped.
pub fn extract_first_json(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    if let Some(caps) = FENCED_BLOCK.captures(text) {
        if let Some(value) = caps.get(1).and_then(|m| parse(m.as_str().trim())) {
            return to_line(&value);
        }
    }

    balanced_spans(text)
        .find_map(parse)
        .map(|value| to_line(&value))
        .unwrap_or_default()
}

fn parse(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate).ok()
}

fn to_line(value: &Value) -> String {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
    if value.serialize(&mut ser).is_err() {
        return String::new();
    }
    String::from_utf8(out).unwrap_or_default()
}

/// Single-line output with a space after every `,` and `:`.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Balanced `{...}` spans by brace depth, in order of the opening brace.
///
/// After a span closes, scanning resumes just after it. Braces inside JSON
/// strings are counted like any other; such spans simply fail to parse.
fn balanced_spans(text: &str) -> impl Iterator<Item = &str> {
    let mut start: Option<usize> = None;
    let mut depth = 0usize;
    let mut spans = Vec::new();
    for (i, ch) in text.char_indices() {
        match ch {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    spans.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_block() {
        let text = "Here you go:\n```json\n{\"name\": \"Kim\", \"age\": 30}\n```\nThanks";
        assert_eq!(extract_first_json(text), r#"{"name": "Kim", "age": 30}"#);
    }

    #[test]
    fn test_fenced_block_case_insensitive_and_unlabelled() {
        assert_eq!(extract_first_json("```JSON\n{\"a\":1}\n```"), r#"{"a": 1}"#);
        assert_eq!(extract_first_json("```\n{\"a\":2}\n```"), r#"{"a": 2}"#);
    }

    #[test]
    fn test_object_inside_prose() {
        assert_eq!(extract_first_json("result: {\"a\":1} end"), r#"{"a": 1}"#);
    }

    #[test]
    fn test_no_braces() {
        assert_eq!(extract_first_json("no json here"), "");
        assert_eq!(extract_first_json(""), "");
    }

    #[test]
    fn test_unbalanced_braces() {
        assert_eq!(extract_first_json("{\"a\": 1"), "");
    }

    #[test]
    fn test_skips_unparseable_span() {
        let text = "{not json} then {\"ok\": true}";
        assert_eq!(extract_first_json(text), r#"{"ok": true}"#);
    }

    #[test]
    fn test_bad_fence_falls_back_to_scan() {
        let text = "```json\nnot json\n``` but {\"b\": [1, 2]}";
        assert_eq!(extract_first_json(text), r#"{"b": [1, 2]}"#);
    }

    #[test]
    fn test_nested_object_and_key_order() {
        let text = "{\"z\": 1, \"a\": {\"y\": 2, \"b\": 3}}";
        assert_eq!(extract_first_json(text), r#"{"z": 1, "a": {"y": 2, "b": 3}}"#);
    }

    #[test]
    fn test_non_ascii_unescaped() {
        assert_eq!(extract_first_json("{\"이름\": \"김철수\"}"), r#"{"이름": "김철수"}"#);
    }

    #[test]
    fn test_separators_are_spaced() {
        let text = "```json\n{\"a\":1,\"b\":[1,2],\"c\":{},\"d\":[]}\n```";
        assert_eq!(extract_first_json(text), r#"{"a": 1, "b": [1, 2], "c": {}, "d": []}"#);
    }

    #[test]
    fn test_top_level_array_in_fence() {
        assert_eq!(extract_first_json("```json\n[1,\"x\"]\n```"), r#"[1, "x"]"#);
    }
}
