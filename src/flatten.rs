use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::models::{FlatAttempt, RawAttempt};

/// Field carrying the serialized LTI passback parameters.
const PASSBACK_FIELD: &str = "passback_params";

/// Merges each attempt's serialized passback parameters into its top-level
/// fields. Output has the same length and order as the input. Parameter keys
/// win over top-level keys on collision.
///
/// Malformed passback text never fails the batch: the record keeps its
/// top-level fields only, a warning is logged, and the drop is counted in the
/// second return value.
pub fn flatten_attempts(raw: &[RawAttempt]) -> (Vec<FlatAttempt>, usize) {
    let mut flattened = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;

    for (index, attempt) in raw.iter().enumerate() {
        let mut flat: FlatAttempt = attempt
            .iter()
            .filter(|(key, _)| key.as_str() != PASSBACK_FIELD)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        match attempt.get(PASSBACK_FIELD) {
            None => {}
            Some(Value::String(text)) => match parse_mapping_literal(text) {
                Some(params) => {
                    for (key, value) in params {
                        flat.insert(key, value);
                    }
                }
                None => {
                    dropped += 1;
                    warn!(index, text = %text, "dropping malformed passback_params");
                }
            },
            Some(other) => {
                dropped += 1;
                warn!(index, value = %other, "passback_params is not a string, dropping");
            }
        }

        flattened.push(flat);
    }

    (flattened, dropped)
}

/// Parses a flat Python-style mapping literal such as
/// `{'user_id': 'u-1', 'weight': 1.5, 'hint': None}` into a JSON map.
/// Returns `None` on any syntax error or trailing garbage.
pub fn parse_mapping_literal(text: &str) -> Option<Map<String, Value>> {
    let mut parser = LiteralParser {
        chars: text.trim().chars().collect(),
        pos: 0,
    };
    let map = parser.mapping()?;
    parser.skip_whitespace();
    if parser.pos == parser.chars.len() {
        Some(map)
    } else {
        None
    }
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, wanted: char) -> Option<()> {
        (self.bump()? == wanted).then_some(())
    }

    fn mapping(&mut self) -> Option<Map<String, Value>> {
        self.skip_whitespace();
        self.expect('{')?;
        let mut map = Map::new();

        self.skip_whitespace();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Some(map);
        }

        loop {
            self.skip_whitespace();
            let key = self.quoted_string()?;
            self.skip_whitespace();
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.bump()? {
                ',' => continue,
                '}' => return Some(map),
                _ => return None,
            }
        }
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_whitespace();
        match self.peek()? {
            '\'' | '"' => self.quoted_string().map(Value::String),
            'N' => self.keyword("None", Value::Null),
            'T' => self.keyword("True", Value::Bool(true)),
            'F' => self.keyword("False", Value::Bool(false)),
            '-' | '0'..='9' => self.number(),
            _ => None,
        }
    }

    fn keyword(&mut self, word: &str, value: Value) -> Option<Value> {
        for wanted in word.chars() {
            self.expect(wanted)?;
        }
        Some(value)
    }

    fn quoted_string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        if quote != '\'' && quote != '"' {
            return None;
        }
        let mut out = String::new();
        loop {
            match self.bump()? {
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    escaped => out.push(escaped),
                },
                ch if ch == quote => return Some(out),
                ch => out.push(ch),
            }
        }
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => self.pos += 1,
                '.' | 'e' | 'E' | '+' | '-' if self.pos > start => {
                    is_float = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            let parsed: f64 = text.parse().ok()?;
            Number::from_f64(parsed).map(Value::Number)
        } else {
            let parsed: i64 = text.parse().ok()?;
            Some(Value::Number(parsed.into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(fields: Value) -> RawAttempt {
        fields.as_object().unwrap().clone()
    }

    #[test]
    fn parses_single_quoted_mapping() {
        let map = parse_mapping_literal(
            "{'oauth_consumer_key': 'key-1', 'lis_result_sourcedid': 'sid-9'}",
        )
        .unwrap();
        assert_eq!(map["oauth_consumer_key"], json!("key-1"));
        assert_eq!(map["lis_result_sourcedid"], json!("sid-9"));
    }

    #[test]
    fn parses_scalars_and_none() {
        let map =
            parse_mapping_literal("{'a': None, 'b': True, 'c': 2, 'd': 1.5}").unwrap();
        assert_eq!(map["a"], Value::Null);
        assert_eq!(map["b"], json!(true));
        assert_eq!(map["c"], json!(2));
        assert_eq!(map["d"], json!(1.5));
    }

    #[test]
    fn rejects_trailing_garbage_and_bad_syntax() {
        assert!(parse_mapping_literal("{'a': 'b'} extra").is_none());
        assert!(parse_mapping_literal("{'a' 'b'}").is_none());
        assert!(parse_mapping_literal("not a mapping").is_none());
        assert!(parse_mapping_literal("{'a': }").is_none());
    }

    #[test]
    fn output_matches_input_length_and_order() {
        let attempts = vec![
            raw(json!({"user_id": "u-1", "passback_params": "{'k': 'v1'}"})),
            raw(json!({"user_id": "u-2", "passback_params": "{'k': 'v2'}"})),
            raw(json!({"user_id": "u-3"})),
        ];
        let (flat, dropped) = flatten_attempts(&attempts);
        assert_eq!(flat.len(), 3);
        assert_eq!(dropped, 0);
        assert_eq!(flat[0]["k"], json!("v1"));
        assert_eq!(flat[1]["k"], json!("v2"));
        assert_eq!(flat[0]["user_id"], json!("u-1"));
        assert!(!flat[2].contains_key("k"));
    }

    #[test]
    fn malformed_passback_keeps_top_level_fields_only() {
        let attempts = vec![raw(json!({
            "user_id": "u-1",
            "is_correct": 1.0,
            "passback_params": "{'broken': ",
        }))];
        let (flat, dropped) = flatten_attempts(&attempts);
        assert_eq!(dropped, 1);
        assert_eq!(flat[0]["user_id"], json!("u-1"));
        assert_eq!(flat[0]["is_correct"], json!(1.0));
        assert!(!flat[0].contains_key("passback_params"));
        assert!(!flat[0].contains_key("broken"));
    }

    #[test]
    fn passback_keys_win_on_collision() {
        let attempts = vec![raw(json!({
            "user_id": "outer",
            "passback_params": "{'user_id': 'inner'}",
        }))];
        let (flat, _) = flatten_attempts(&attempts);
        assert_eq!(flat[0]["user_id"], json!("inner"));
    }

    #[test]
    fn non_string_passback_counts_as_dropped() {
        let attempts = vec![raw(json!({"user_id": "u-1", "passback_params": 42}))];
        let (flat, dropped) = flatten_attempts(&attempts);
        assert_eq!(dropped, 1);
        assert_eq!(flat[0]["user_id"], json!("u-1"));
    }
}
