use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

/// Byte ranges of closed ```` ``` ```` code fences, any language.
pub(super) fn fence_ranges(text: &str) -> Vec<Range<usize>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"```[\s\S]*?```").expect("valid regex"));
    re.find_iter(text).map(|m| m.range()).collect()
}

/// End (exclusive) of the JSON object opening at `start`, honoring strings
/// and escapes. `None` when the object never closes.
pub(super) fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Spans of the outermost balanced objects outside code fences, in order.
///
/// A `{` that never closes is skipped so later objects are still found.
pub(super) fn top_level_objects(text: &str) -> Vec<Range<usize>> {
    let fences = fence_ranges(text);
    let mut spans = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find('{') {
        let start = cursor + offset;
        if let Some(fence) = fences.iter().find(|f| f.contains(&start)) {
            cursor = fence.end;
            continue;
        }
        match balanced_object_end(text, start) {
            Some(end) => {
                spans.push(start..end);
                cursor = end;
            }
            None => cursor = start + 1,
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_matching_brace_across_nesting() {
        let text = r#"x {"a": {"b": 1}} y"#;
        assert_eq!(balanced_object_end(text, 2), Some(17));
    }

    #[test]
    fn braces_in_strings_do_not_count() {
        let text = r#"{"a": "}\"{"}"#;
        assert_eq!(balanced_object_end(text, 0), Some(text.len()));
    }

    #[test]
    fn unclosed_object_has_no_end() {
        assert_eq!(balanced_object_end(r#"{"a": {"#, 0), None);
        assert_eq!(balanced_object_end("abc", 0), None);
    }

    #[test]
    fn fences_are_closed_pairs() {
        let text = "a ```x``` b ```open";
        assert_eq!(fence_ranges(text), vec![2..9]);
    }

    #[test]
    fn nested_objects_are_not_top_level() {
        let text = r#"a {"x": {"y": 1}} b { c {"z": 2} ```{"f": 1}```"#;
        let spans: Vec<_> = top_level_objects(text)
            .into_iter()
            .map(|r| &text[r])
            .collect();
        assert_eq!(spans, vec![r#"{"x": {"y": 1}}"#, r#"{"z": 2}"#]);
    }
}
