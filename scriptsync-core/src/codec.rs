//! Metadata codec for script files.
//!
//! # File grammar
//!
//! ```text
//! file          := header-region [ end-line [ blank-line ] verbatim-body ]
//!                | header-region body
//! header-region := { header-line | blank-line }
//! header-line   := "// @script-" key ":" [ " " value ] EOL
//! end-line      := "// @script-end" EOL
//! key           := 1*( ALPHA / DIGIT / "_" )
//! blank-line    := *WSP EOL
//! verbatim-body := everything after, byte for byte
//! body          := first other line .. EOF, trailing whitespace trimmed
//! ```
//!
//! A line that starts with the header prefix but breaks the grammar is a
//! [`DecodeError`]; it never falls through into the body. Files without an
//! end line are read the older way: any other line ends the header region.
//!
//! [`encode`] writes `id`, `title`, `name` (server only), then the variant's
//! flags in fixed order under the variant's [`FlagEmission`] policy, the end
//! line, a blank line, and the body verbatim.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::DecodeError;
use crate::types::{FlagEmission, ScriptFlag, ScriptId, ScriptRecord, ScriptVariant};

/// Namespace segment of every header key.
pub const HEADER_NAMESPACE: &str = "script";

const HEADER_PREFIX: &str = "// @script-";

/// Closes the header region; everything after it is body.
pub const HEADER_END: &str = "// @script-end";

// ---------------------------------------------------------------------------
// Header values
// ---------------------------------------------------------------------------

/// A type-coerced header value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl HeaderValue {
    /// `true`/`false` become booleans, fully numeric strings become numbers,
    /// anything else stays text.
    pub fn coerce(raw: &str) -> HeaderValue {
        match raw {
            "true" => return HeaderValue::Bool(true),
            "false" => return HeaderValue::Bool(false),
            _ => {}
        }
        if let Ok(n) = raw.parse::<i64>() {
            return HeaderValue::Integer(n);
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => HeaderValue::Float(n),
            _ => HeaderValue::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Bool(b) => b.fmt(f),
            HeaderValue::Integer(n) => n.fmt(f),
            HeaderValue::Float(n) => n.fmt(f),
            HeaderValue::Text(s) => s.fmt(f),
        }
    }
}

/// One `key: value` pair from the header region.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderField {
    pub key: String,
    /// Value text exactly as written (after the separator space).
    pub raw: String,
    pub value: HeaderValue,
}

/// Raw result of scanning a file: header fields in file order plus the body.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFile {
    pub fields: Vec<HeaderField>,
    pub body: String,
}

impl DecodedFile {
    /// Last occurrence of `key` wins.
    pub fn get(&self, key: &str) -> Option<&HeaderField> {
        self.fields.iter().rev().find(|field| field.key == key)
    }
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Scan `text` into header fields and body.
pub fn decode(text: &str) -> Result<DecodedFile, DecodeError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut fields = Vec::new();
    let mut offset = 0;

    for (index, line) in text.split_inclusive('\n').enumerate() {
        let content = line.trim_end_matches(|c| c == '\n' || c == '\r');
        if content.trim_end() == HEADER_END {
            let rest = &text[offset + line.len()..];
            let body = rest
                .strip_prefix("\r\n")
                .or_else(|| rest.strip_prefix('\n'))
                .unwrap_or(rest);
            return Ok(DecodedFile {
                fields,
                body: body.to_string(),
            });
        }
        if content.trim().is_empty() {
            offset += line.len();
            continue;
        }
        if let Some(rest) = content.strip_prefix(HEADER_PREFIX) {
            fields.push(parse_header(rest, index + 1)?);
            offset += line.len();
            continue;
        }
        break;
    }

    Ok(DecodedFile {
        fields,
        body: text[offset..].trim_end().to_string(),
    })
}

fn parse_header(rest: &str, line: usize) -> Result<HeaderField, DecodeError> {
    let Some((key, value)) = rest.split_once(':') else {
        return Err(DecodeError::MalformedHeader {
            line,
            reason: "missing ':' after header key".to_string(),
        });
    };
    if key.is_empty() {
        return Err(DecodeError::MalformedHeader {
            line,
            reason: "empty header key".to_string(),
        });
    }
    if let Some(bad) = key.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(DecodeError::MalformedHeader {
            line,
            reason: format!("invalid character {bad:?} in header key `{key}`"),
        });
    }
    let raw = value.strip_prefix(' ').unwrap_or(value).trim_end().to_string();
    Ok(HeaderField {
        key: key.to_string(),
        value: HeaderValue::coerce(&raw),
        raw,
    })
}

/// The fields a script file declares, before identity resolution and layering.
///
/// Fields the file leaves out stay `None` (or absent from `flags`) so they
/// can fall back to a previously pulled record.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialScript {
    pub variant: ScriptVariant,
    pub id: Option<ScriptId>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub body: String,
    pub flags: BTreeMap<ScriptFlag, bool>,
    pub unknown_headers: BTreeMap<String, HeaderValue>,
}

impl PartialScript {
    /// Interpret decoded header fields for `variant`.
    pub fn from_decoded(decoded: DecodedFile, variant: ScriptVariant) -> Result<Self, DecodeError> {
        let mut script = PartialScript {
            variant,
            id: None,
            title: None,
            name: None,
            body: decoded.body,
            flags: BTreeMap::new(),
            unknown_headers: BTreeMap::new(),
        };

        for field in decoded.fields {
            match field.key.as_str() {
                "id" => match field.value {
                    HeaderValue::Integer(n) if n >= 0 => script.id = Some(ScriptId(n as u64)),
                    _ => {
                        return Err(DecodeError::InvalidValue {
                            key: field.key,
                            expected: "a non-negative integer",
                            raw: field.raw,
                        })
                    }
                },
                "title" => script.title = Some(field.raw),
                "name" if variant.has_name() => script.name = Some(field.raw),
                key => match ScriptFlag::from_header_key(variant, key) {
                    Some(flag) => match field.value {
                        HeaderValue::Bool(b) => {
                            script.flags.insert(flag, b);
                        }
                        _ => {
                            return Err(DecodeError::InvalidValue {
                                key: field.key,
                                expected: "true or false",
                                raw: field.raw,
                            })
                        }
                    },
                    None => {
                        script.unknown_headers.insert(field.key, field.value);
                    }
                },
            }
        }
        Ok(script)
    }

    /// A standalone record; `fallback_title` is used when no title header exists.
    pub fn into_record(self, fallback_title: &str) -> ScriptRecord {
        let mut record = ScriptRecord::new(self.variant, fallback_title);
        self.apply(&mut record);
        record
    }

    /// Lay the declared fields over a copy of `base`; undeclared fields keep
    /// `base`'s values.
    pub fn layer_onto(self, base: &ScriptRecord) -> ScriptRecord {
        let mut record = base.clone();
        self.apply(&mut record);
        record
    }

    fn apply(self, record: &mut ScriptRecord) {
        if self.id.is_some() {
            record.id = self.id;
        }
        if let Some(title) = self.title {
            record.title = title;
        }
        if self.name.is_some() {
            record.name = self.name;
        }
        record.body = self.body;
        for (flag, value) in self.flags {
            record.set_flag(flag, value);
        }
        record.unknown_headers.extend(self.unknown_headers);
    }
}

/// Decode `text` as a script of `variant`.
pub fn decode_script(text: &str, variant: ScriptVariant) -> Result<PartialScript, DecodeError> {
    PartialScript::from_decoded(decode(text)?, variant)
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Serialize a record into file text.
pub fn encode(record: &ScriptRecord) -> String {
    let mut out = String::new();
    if let Some(id) = record.id {
        push_header(&mut out, "id", &id.to_string());
    }
    push_header(&mut out, "title", &record.title);
    if record.variant.has_name() {
        if let Some(name) = &record.name {
            push_header(&mut out, "name", name);
        }
    }

    let emission = record.variant.flag_emission();
    for flag in record.variant.flags() {
        let value = record.flag(*flag);
        if emission == FlagEmission::TrueOnly && !value {
            continue;
        }
        push_header(&mut out, flag.header_key(), if value { "true" } else { "false" });
    }

    out.push_str(HEADER_END);
    out.push_str("\n\n");
    out.push_str(&record.body);
    out
}

fn push_header(out: &mut String, key: &str, value: &str) {
    let value = value.replace(['\r', '\n'], " ");
    out.push_str(HEADER_PREFIX);
    out.push_str(key);
    out.push(':');
    if !value.is_empty() {
        out.push(' ');
        out.push_str(&value);
    }
    out.push('\n');
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ScriptRecord {
        ScriptRecord::new(ScriptVariant::Server, "Validate order")
            .with_id(42u64)
            .with_body("context.Log('hi');")
            .with_flag(ScriptFlag::BeforeCreate, true)
            .with_flag(ScriptFlag::TryCatch, true)
    }

    #[test]
    fn server_encoding_omits_false_flags() {
        let text = encode(&server());
        assert_eq!(
            text,
            "// @script-id: 42\n\
             // @script-title: Validate order\n\
             // @script-beforeCreate: true\n\
             // @script-tryCatch: true\n\
             // @script-end\n\
             \n\
             context.Log('hi');"
        );
    }

    #[test]
    fn client_encoding_emits_every_flag() {
        let record = ScriptRecord::new(ScriptVariant::Client, "Banner")
            .with_id(7u64)
            .with_flag(ScriptFlag::Edit, true);
        let text = encode(&record);
        for flag in ScriptVariant::Client.flags() {
            let line = format!("// @script-{}: {}", flag.header_key(), *flag == ScriptFlag::Edit);
            assert!(text.contains(&line), "missing `{line}` in:\n{text}");
        }
    }

    #[test]
    fn round_trip_preserves_flags_and_body() {
        let record = server();
        let decoded = decode_script(&encode(&record), ScriptVariant::Server)
            .expect("decode")
            .into_record("fallback");
        assert_eq!(decoded, record);
    }

    #[test]
    fn blank_lines_do_not_end_the_header() {
        let text = "// @script-id: 3\n\n   \n// @script-title: T\n\nbody();\n";
        let decoded = decode(text).expect("decode");
        assert_eq!(decoded.fields.len(), 2);
        assert_eq!(decoded.body, "body();");
    }

    #[test]
    fn plain_comment_starts_the_body() {
        let text = "// @script-id: 3\n// regular comment\n// @script-title: late\n";
        let decoded = decode(text).expect("decode");
        assert_eq!(decoded.fields.len(), 1);
        assert_eq!(decoded.body, "// regular comment\n// @script-title: late");
    }

    #[test]
    fn body_indentation_survives() {
        let decoded = decode("// @script-id: 1\n\n    indented();\n  \n").expect("decode");
        assert_eq!(decoded.body, "    indented();");
    }

    #[test]
    fn values_are_type_coerced() {
        assert_eq!(HeaderValue::coerce("true"), HeaderValue::Bool(true));
        assert_eq!(HeaderValue::coerce("12"), HeaderValue::Integer(12));
        assert_eq!(HeaderValue::coerce("1.5"), HeaderValue::Float(1.5));
        assert_eq!(HeaderValue::coerce("NaN"), HeaderValue::Text("NaN".into()));
        assert_eq!(HeaderValue::coerce("12 monkeys"), HeaderValue::Text("12 monkeys".into()));
    }

    #[test]
    fn numeric_title_keeps_raw_text() {
        let partial =
            decode_script("// @script-title: 007\n\nx", ScriptVariant::Client).expect("decode");
        assert_eq!(partial.title.as_deref(), Some("007"));
    }

    #[test]
    fn header_without_colon_is_rejected() {
        let err = decode("// @script-id 4\nbody").unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedHeader {
                line: 1,
                reason: "missing ':' after header key".into()
            }
        );
    }

    #[test]
    fn negative_id_is_rejected() {
        let err = decode_script("// @script-id: -1\n", ScriptVariant::Server).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { ref key, .. } if key == "id"));
    }

    #[test]
    fn non_boolean_flag_is_rejected() {
        let err = decode_script("// @script-shared: yes\n", ScriptVariant::Server).unwrap_err();
        assert!(err.to_string().contains("true or false"));
    }

    #[test]
    fn unknown_keys_are_kept_but_not_encoded() {
        let text = "// @script-future: 3\n// @script-title: t\n\nb";
        let partial = decode_script(text, ScriptVariant::Client).expect("decode");
        assert_eq!(partial.unknown_headers.get("future"), Some(&HeaderValue::Integer(3)));
        let record = partial.into_record("t");
        assert!(!encode(&record).contains("future"));
    }

    #[test]
    fn client_name_header_is_not_a_field() {
        let partial = decode_script("// @script-name: n\n", ScriptVariant::Client).expect("decode");
        assert!(partial.name.is_none());
        assert!(partial.unknown_headers.contains_key("name"));
    }

    #[test]
    fn layering_keeps_undeclared_fields() {
        let mut base = server();
        base.name = Some("validate".into());
        let partial =
            decode_script("// @script-id: 42\n\nnew body", ScriptVariant::Server).expect("decode");
        let layered = partial.layer_onto(&base);
        assert_eq!(layered.body, "new body");
        assert_eq!(layered.title, "Validate order");
        assert_eq!(layered.name.as_deref(), Some("validate"));
        assert!(layered.flag(ScriptFlag::BeforeCreate));
    }

    #[test]
    fn header_values_never_span_lines() {
        let record = ScriptRecord::new(ScriptVariant::Client, "two\nlines");
        let text = encode(&record);
        assert!(text.starts_with("// @script-title: two lines\n"));
    }

    #[test]
    fn end_line_keeps_header_shaped_body_lines() {
        let text =
            "// @script-id: 3\n// @script-end\n\n// @script-note: keep\n// @script-todo fix\n";
        let decoded = decode(text).expect("decode");
        assert_eq!(decoded.fields.len(), 1);
        assert_eq!(decoded.body, "// @script-note: keep\n// @script-todo fix\n");
    }

    #[test]
    fn end_line_without_separator_or_crlf() {
        assert_eq!(decode("// @script-end\nx();").expect("decode").body, "x();");
        assert_eq!(
            decode("// @script-id: 1\r\n// @script-end\r\n\r\n\r\nx();").expect("decode").body,
            "\r\nx();"
        );
    }

    #[test]
    fn files_without_end_line_still_trim_body() {
        let decoded = decode("// @script-id: 3\n\nbody();\n\n").expect("decode");
        assert_eq!(decoded.body, "body();");
    }
}
