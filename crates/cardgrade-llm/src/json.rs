use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::LlmError;

/// Recover the first JSON object from free-form model output.
///
/// Accepts bare JSON, fenced ```json blocks and objects embedded in prose.
/// Returns `None` when no balanced, parseable object is present.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = strip_fence(text.trim());
    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    let bytes = trimmed.as_bytes();
    let mut start = 0;
    while let Some(off) = trimmed[start..].find('{') {
        let open = start + off;
        if let Some(close) = matching_brace(bytes, open) {
            if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(&trimmed[open..=close]) {
                return Some(v);
            }
        }
        start = open + 1;
    }
    None
}

/// Extract the first JSON object and deserialize it into `T`.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let value = extract_json_object(text).ok_or_else(|| {
        let head: String = text.chars().take(120).collect();
        LlmError::NotJson(head)
    })?;
    Ok(serde_json::from_value(value)?)
}

fn strip_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Index of the `}` closing the object opened at `open`, skipping string literals.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_str {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_str = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn bare_object() {
        let v = extract_json_object(r#"{"set_code": "SVI"}"#).unwrap();
        assert_eq!(v["set_code"], "SVI");
    }

    #[test]
    fn fenced_block() {
        let text = "```json\n{\"card_name\": \"Pikachu\"}\n```";
        assert_eq!(extract_json_object(text).unwrap()["card_name"], "Pikachu");
    }

    #[test]
    fn object_inside_prose_with_braces_in_strings() {
        let text = r#"Sure! Here you go: {"summary": "corner {tl} worn", "n": 2} Hope it helps {"#;
        let v = extract_json_object(text).unwrap();
        assert_eq!(v["summary"], "corner {tl} worn");
        assert_eq!(v["n"], 2);
    }

    #[test]
    fn skips_unparseable_prefix_object() {
        let text = r#"{not json} then {"ok": true}"#;
        assert_eq!(extract_json_object(text).unwrap()["ok"], true);
    }

    #[test]
    fn arrays_and_garbage_are_rejected() {
        assert!(extract_json_object("[1, 2, 3]").is_none());
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{\"open\": ").is_none());
    }

    #[test]
    fn typed_reply() {
        #[derive(Deserialize)]
        struct Code {
            set_code: String,
        }
        let c: Code = parse_json_reply("Answer: {\"set_code\": \"PAL\"}").unwrap();
        assert_eq!(c.set_code, "PAL");
        assert!(matches!(
            parse_json_reply::<Code>("nothing"),
            Err(LlmError::NotJson(_))
        ));
    }
}
