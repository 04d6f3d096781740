//! InnerTube ペイロード用の軽量 JSON エンジン
//!
//! フィードのレスポンスは巨大かつレンダラーごとに形が異なるため、
//! 型付きスキーマではなく汎用ツリー（`JsonValue`）に変換して扱う。
//! エンコーダーはInnerTube APIが受け付ける程度の緩いJSONを出力する。

use indexmap::IndexMap;

use crate::youtube::errors::LiveChatError;

/// 挿入順を保持するマッピング（キーは階層ごとに一意）
pub type JsonMap = IndexMap<String, JsonValue>;

/// 汎用JSONツリーのノード
///
/// 整数と小数はパース時に区別して保持する。
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<JsonValue>),
    Object(JsonMap),
}

impl JsonValue {
    /// `(キー, 値)`の並びからオブジェクトを組み立てる
    pub fn object<'a>(entries: impl IntoIterator<Item = (&'a str, JsonValue)>) -> Self {
        JsonValue::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )
    }

    pub fn as_object(&self) -> Option<&JsonMap> {
        match self {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<JsonValue>> {
        match self {
            JsonValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// 整数として取得（小数は切り捨て）
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JsonValue::Integer(n) => Some(*n),
            JsonValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }
}

impl From<&str> for JsonValue {
    fn from(value: &str) -> Self {
        JsonValue::String(value.to_string())
    }
}

impl From<String> for JsonValue {
    fn from(value: String) -> Self {
        JsonValue::String(value)
    }
}

impl From<bool> for JsonValue {
    fn from(value: bool) -> Self {
        JsonValue::Bool(value)
    }
}

impl From<i64> for JsonValue {
    fn from(value: i64) -> Self {
        JsonValue::Integer(value)
    }
}

impl From<f64> for JsonValue {
    fn from(value: f64) -> Self {
        JsonValue::Float(value)
    }
}

impl From<JsonMap> for JsonValue {
    fn from(value: JsonMap) -> Self {
        JsonValue::Object(value)
    }
}

impl<T: Into<JsonValue>> From<Option<T>> for JsonValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(JsonValue::Null)
    }
}

/// JSONテキストをパースする（先頭の非空白文字は`{`または`[`であること）
pub fn parse(text: &str) -> Result<JsonValue, LiveChatError> {
    let mut scanner = Scanner::new(text);
    scanner.skip_whitespace();
    match scanner.peek() {
        Some(b'{') => scanner.parse_object().map(JsonValue::Object),
        Some(b'[') => scanner.parse_array().map(JsonValue::Array),
        _ => Err(malformed("This is not json(map or list)!")),
    }
}

/// JSONオブジェクトをパースする（先頭の非空白文字は`{`であること）
pub fn parse_object(text: &str) -> Result<JsonMap, LiveChatError> {
    let mut scanner = Scanner::new(text);
    scanner.skip_whitespace();
    if scanner.peek() != Some(b'{') {
        return Err(malformed("This is not json(map)!"));
    }
    scanner.parse_object()
}

/// マッピングをJSONテキストにエンコードする
///
/// 真偽値と数値はクォートせず、ネストしたマッピングは再帰的に出力、
/// それ以外はクォートしてエスケープする。
pub fn serialize(map: &JsonMap) -> String {
    let mut out = String::new();
    write_object(map, &mut out);
    out
}

/// 入れ子の上限（超えるとスタックを使い切る前に`MalformedInput`を返す）
const MAX_DEPTH: usize = 128;

fn malformed(message: impl Into<String>) -> LiveChatError {
    LiveChatError::MalformedInput(message.into())
}

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn enter(&mut self) -> Result<(), LiveChatError> {
        if self.depth >= MAX_DEPTH {
            return Err(malformed(format!("Nesting too deep at {}", self.pos)));
        }
        self.depth += 1;
        Ok(())
    }

    /// `{`の位置から対応する`}`の直後までを読む
    fn parse_object(&mut self) -> Result<JsonMap, LiveChatError> {
        self.enter()?;
        let result = self.parse_object_entries();
        self.depth -= 1;
        result
    }

    fn parse_object_entries(&mut self) -> Result<JsonMap, LiveChatError> {
        self.pos += 1;
        let mut map = JsonMap::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(malformed("Unterminated object")),
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(map);
                }
                Some(b',') => self.pos += 1,
                Some(b'"') => {
                    let key = self.parse_string()?;
                    self.skip_whitespace();
                    if self.peek() != Some(b':') {
                        return Err(malformed(format!("Expected ':' at {}", self.pos)));
                    }
                    self.pos += 1;
                    let value = self.parse_value()?;
                    map.insert(key, value);
                }
                Some(other) => {
                    return Err(malformed(format!(
                        "Unexpected '{}' at {}",
                        other as char, self.pos
                    )))
                }
            }
        }
    }

    /// `[`の位置から対応する`]`の直後までを読む
    fn parse_array(&mut self) -> Result<Vec<JsonValue>, LiveChatError> {
        self.enter()?;
        let result = self.parse_array_items();
        self.depth -= 1;
        result
    }

    fn parse_array_items(&mut self) -> Result<Vec<JsonValue>, LiveChatError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(malformed("Unterminated list")),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(b',') => self.pos += 1,
                Some(_) => items.push(self.parse_value()?),
            }
        }
    }

    fn parse_value(&mut self) -> Result<JsonValue, LiveChatError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(malformed("Unexpected end of input")),
            Some(b'"') => self.parse_string().map(JsonValue::String),
            Some(b'{') => self.parse_object().map(JsonValue::Object),
            Some(b'[') => self.parse_array().map(JsonValue::Array),
            // リテラルは先頭文字で判定し、リテラル全体を読み飛ばす
            Some(b't') => self.skip_literal(4, JsonValue::Bool(true)),
            Some(b'f') => self.skip_literal(5, JsonValue::Bool(false)),
            Some(b'n') => self.skip_literal(4, JsonValue::Null),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(other) => Err(malformed(format!(
                "Unexpected '{}' at {}",
                other as char, self.pos
            ))),
        }
    }

    fn skip_literal(&mut self, len: usize, value: JsonValue) -> Result<JsonValue, LiveChatError> {
        if self.pos + len > self.bytes.len() {
            return Err(malformed("Unterminated literal"));
        }
        self.pos += len;
        Ok(value)
    }

    fn parse_number(&mut self) -> Result<JsonValue, LiveChatError> {
        let start = self.pos;
        let mut is_float = false;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        loop {
            match self.peek() {
                Some(b'0'..=b'9') => self.pos += 1,
                Some(b'.') if !is_float => {
                    is_float = true;
                    self.pos += 1;
                }
                Some(b'e' | b'E') => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some(b'+' | b'-')) {
                        self.pos += 1;
                    }
                }
                Some(_) => break,
                None => return Err(malformed("Unterminated number")),
            }
        }

        let token = &self.text[start..self.pos];
        if is_float {
            token
                .parse::<f64>()
                .map(JsonValue::Float)
                .map_err(|e| malformed(format!("Invalid number '{}': {}", token, e)))
        } else {
            match token.parse::<i64>() {
                Ok(n) => Ok(JsonValue::Integer(n)),
                // i64に収まらない整数は小数として保持する
                Err(_) => token
                    .parse::<f64>()
                    .map(JsonValue::Float)
                    .map_err(|e| malformed(format!("Invalid number '{}': {}", token, e))),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, LiveChatError> {
        self.pos += 1;
        let mut out = String::new();
        let mut run_start = self.pos;
        loop {
            match self.peek() {
                None => return Err(malformed("Unterminated string")),
                Some(b'"') => {
                    out.push_str(&self.text[run_start..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    out.push_str(&self.text[run_start..self.pos]);
                    self.pos += 1;
                    self.parse_escape(&mut out)?;
                    run_start = self.pos;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// バックスラッシュ直後の文字を処理する
    ///
    /// `\uXXXX`はコードポイントとして、`\n`は改行としてデコードし、
    /// それ以外はバックスラッシュを取り除くだけ。
    fn parse_escape(&mut self, out: &mut String) -> Result<(), LiveChatError> {
        let Some(escaped) = self.text[self.pos..].chars().next() else {
            return Err(malformed("Unterminated string"));
        };
        self.pos += escaped.len_utf8();
        match escaped {
            'u' => {
                let unit = self.read_hex4()?;
                out.push(self.decode_code_unit(unit)?);
            }
            'n' => out.push('\n'),
            other => out.push(other),
        }
        Ok(())
    }

    fn read_hex4(&mut self) -> Result<u32, LiveChatError> {
        let hex = self
            .text
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| malformed("Unterminated unicode escape"))?;
        let unit = u32::from_str_radix(hex, 16)
            .map_err(|_| malformed(format!("Invalid unicode escape '\\u{}'", hex)))?;
        self.pos += 4;
        Ok(unit)
    }

    /// サロゲートペアは直後の`\uXXXX`と結合する（片割れのみの場合は置換文字）
    fn decode_code_unit(&mut self, unit: u32) -> Result<char, LiveChatError> {
        if (0xD800..0xDC00).contains(&unit) && self.text[self.pos..].starts_with("\\u") {
            let saved = self.pos;
            self.pos += 2;
            let low = self.read_hex4()?;
            if (0xDC00..0xE000).contains(&low) {
                let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            self.pos = saved;
        }
        Ok(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

fn write_object(map: &JsonMap, out: &mut String) {
    out.push('{');
    for (index, (key, value)) in map.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write_string(key, out);
        out.push_str(": ");
        write_value(value, out);
    }
    out.push('}');
}

fn write_value(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        JsonValue::Integer(n) => out.push_str(&n.to_string()),
        // Debug表記は常に小数点を含むため、再パース時も小数として扱われる
        JsonValue::Float(f) if f.is_finite() => out.push_str(&format!("{:?}", f)),
        JsonValue::Float(_) | JsonValue::Null => out.push_str("null"),
        JsonValue::Object(map) => write_object(map, out),
        JsonValue::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_value(item, out);
            }
            out.push(']');
        }
        JsonValue::String(s) => write_string(s, out),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_nested_containers() {
        let value = parse(r#"{"a": {"b": [1, "two", {"c": true}]}, "d": false}"#).unwrap();
        let a = value.as_object().unwrap()["a"].as_object().unwrap();
        let b = a["b"].as_array().unwrap();
        assert_eq!(b[0], JsonValue::Integer(1));
        assert_eq!(b[1], JsonValue::String("two".to_string()));
        assert_eq!(b[2].as_object().unwrap()["c"], JsonValue::Bool(true));
        assert_eq!(value.as_object().unwrap()["d"], JsonValue::Bool(false));
    }

    #[test]
    fn test_parse_preserves_key_order() {
        let map = parse_object(r#"{"z":1,"a":2,"m":3}"#).unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_parse_integer_and_float_are_distinct() {
        let map = parse_object(r#"{"i": -42, "f": 3.5, "big": 4294967295}"#).unwrap();
        assert_eq!(map["i"], JsonValue::Integer(-42));
        assert_eq!(map["f"], JsonValue::Float(3.5));
        assert_eq!(map["big"], JsonValue::Integer(4294967295));
    }

    #[test]
    fn test_parse_exponent_number() {
        let map = parse_object(r#"{"e": 1.5e3}"#).unwrap();
        assert_eq!(map["e"], JsonValue::Float(1500.0));
    }

    #[test]
    fn test_parse_null_literal() {
        let map = parse_object(r#"{"a": null, "b": 1}"#).unwrap();
        assert!(map["a"].is_null());
        assert_eq!(map["b"], JsonValue::Integer(1));
    }

    #[test]
    fn test_unicode_escape_matches_literal() {
        let escaped = parse_object(r#"{"s": "a\u0041b"}"#).unwrap();
        let literal = parse_object(r#"{"s": "aAb"}"#).unwrap();
        assert_eq!(escaped, literal);
    }

    #[test]
    fn test_unicode_escape_non_ascii() {
        let map = parse_object(r#"{"s": "\u3042\u3044"}"#).unwrap();
        assert_eq!(map["s"].as_str(), Some("あい"));
    }

    #[test]
    fn test_surrogate_pair_is_combined() {
        let map = parse_object(r#"{"s": "\ud83d\ude00"}"#).unwrap();
        assert_eq!(map["s"].as_str(), Some("😀"));
    }

    #[test]
    fn test_lone_surrogate_becomes_replacement_char() {
        let map = parse_object(r#"{"s": "x\ud83dy"}"#).unwrap();
        assert_eq!(map["s"].as_str(), Some("x\u{FFFD}y"));
    }

    #[test]
    fn test_escapes() {
        let map = parse_object(r#"{"s": "line1\nline2 \"q\" back\\slash \/ \t"}"#).unwrap();
        // \n 以外のエスケープはバックスラッシュを取り除くだけ
        assert_eq!(map["s"].as_str(), Some("line1\nline2 \"q\" back\\slash / t"));
    }

    #[test]
    fn test_raw_utf8_is_kept() {
        let map = parse_object(r#"{"名前": "こんにちは🎉"}"#).unwrap();
        assert_eq!(map["名前"].as_str(), Some("こんにちは🎉"));
    }

    #[test]
    fn test_parse_top_level_list() {
        let value = parse(" [1, [2, 3], {\"a\": 4}] ").unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_rejects_wrong_opener() {
        assert!(matches!(parse("\"x\""), Err(LiveChatError::MalformedInput(_))));
        assert!(matches!(parse_object("[1]"), Err(LiveChatError::MalformedInput(_))));
        assert!(matches!(parse_object(""), Err(LiveChatError::MalformedInput(_))));
    }

    #[test]
    fn test_parse_rejects_unterminated_string() {
        assert!(matches!(
            parse_object(r#"{"a": "abc"#),
            Err(LiveChatError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unterminated_number() {
        assert!(matches!(
            parse_object(r#"{"a": 123"#),
            Err(LiveChatError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_parse_rejects_excessive_nesting() {
        let depth = 200_000;
        let text = format!(r#"{{"a":{}{}}}"#, "[".repeat(depth), "]".repeat(depth));
        assert!(matches!(parse(&text), Err(LiveChatError::MalformedInput(_))));
    }

    #[test]
    fn test_parse_accepts_nesting_within_limit() {
        let depth = MAX_DEPTH - 1;
        let text = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        assert!(parse(&text).is_ok());
        // 兄弟要素は深さに加算されない
        let siblings = format!("[{}]", vec!["[[1]]"; 1000].join(","));
        assert_eq!(parse(&siblings).unwrap().as_array().unwrap().len(), 1000);
    }

    #[test]
    fn test_parse_stops_at_matching_closer() {
        // 閉じ括弧以降のテキストは無視される
        let map = parse_object(r#"{"a": {"b": 1}};</script>"#).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_serialize_quoting() {
        let value = JsonValue::object([
            ("flag", true.into()),
            ("n", 5i64.into()),
            ("f", 0.5f64.into()),
            ("s", "say \"hi\" \\ ok".into()),
            ("nested", JsonValue::object([("k", "v".into())])),
        ]);
        let text = serialize(value.as_object().unwrap());
        assert_eq!(
            text,
            r#"{"flag": true, "n": 5, "f": 0.5, "s": "say \"hi\" \\ ok", "nested": {"k": "v"}}"#
        );
    }

    #[test]
    fn test_serialize_empty_map() {
        assert_eq!(serialize(&JsonMap::new()), "{}");
    }

    #[test]
    fn test_serialize_round_trip() {
        let value = JsonValue::object([
            ("text", "multi\nline \"quoted\" \\ path あ".into()),
            ("count", 12i64.into()),
            ("ratio", 1.0f64.into()),
            ("enabled", false.into()),
            (
                "context",
                JsonValue::object([(
                    "client",
                    JsonValue::object([("clientName", "WEB".into()), ("gl", "US".into())]),
                )]),
            ),
        ]);
        let first = serialize(value.as_object().unwrap());
        let reparsed = parse_object(&first).unwrap();
        assert_eq!(&reparsed, value.as_object().unwrap());
        assert_eq!(serialize(&reparsed), first);
    }
}
