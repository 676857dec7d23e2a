// src/testgen/extract.rs
//
// Normalises raw model output into a test file body.

use std::sync::OnceLock;

use regex::Regex;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("valid fence regex")
    })
}

/// Returns the first fenced code block if the output contains one, otherwise
/// the whole output. Surrounding `"""` quoting is removed and the result is
/// trimmed.
pub fn extract_test_code(raw: &str) -> String {
    let unquoted = strip_triple_quotes(raw.trim());

    let body = match fence_re().captures(unquoted) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(""),
        None => unquoted,
    };

    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!("{body}\n")
    }
}

fn strip_triple_quotes(s: &str) -> &str {
    s.strip_prefix("\"\"\"")
        .and_then(|rest| rest.strip_suffix("\"\"\""))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_is_trimmed() {
        assert_eq!(extract_test_code("\n test('x', () => {});\n\n"), "test('x', () => {});\n");
    }

    #[test]
    fn takes_first_fenced_block() {
        let raw = "Here are the tests:\n```js\nit('a', () => {});\n```\nand also\n```js\nother\n```";
        assert_eq!(extract_test_code(raw), "it('a', () => {});\n");
    }

    #[test]
    fn unwraps_triple_quoted_fence() {
        let raw = "\"\"\"\n```ts\ndescribe('B', () => {});\n```\n\"\"\"";
        assert_eq!(extract_test_code(raw), "describe('B', () => {});\n");
    }

    #[test]
    fn blank_fence_yields_empty() {
        assert_eq!(extract_test_code("```js\n   \n```"), "");
        assert_eq!(extract_test_code("  \n "), "");
    }
}
