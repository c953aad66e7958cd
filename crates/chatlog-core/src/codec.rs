//! Entry codec: canonical byte form of conversation entries and log documents.
//!
//! An entry's canonical encoding is single-line JSON with `", "` and `": "`
//! separators and every character outside printable ASCII escaped as
//! `\uXXXX`. Its length is the entry's contribution to a context budget.
//! Log documents are JSON arrays, indented for human inspection.

use std::io;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_json::{Map, Value};

use crate::error::{ChatLogError, Result};

/// An opaque conversation record.
pub type Entry = Value;

/// Conventional role + content record, with any auxiliary fields kept inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: String,
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            extra: Map::new(),
        }
    }

    /// Attach an auxiliary field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Single-line JSON with spaced separators and ASCII-only strings.
#[derive(Debug, Clone, Copy, Default)]
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
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

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(fragment[start..idx].as_bytes())?;
            // Astral characters become a UTF-16 surrogate pair.
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Sink that only counts the bytes written to it.
#[derive(Debug, Default)]
struct ByteCount(usize);

impl io::Write for ByteCount {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn write_canonical<W, T>(writer: W, entry: &T) -> Result<()>
where
    W: io::Write,
    T: Serialize + ?Sized,
{
    let mut ser = serde_json::Serializer::with_formatter(writer, CanonicalFormatter);
    entry.serialize(&mut ser).map_err(ChatLogError::Encode)
}

/// Encode a single entry to its canonical bytes.
pub fn encode<T: Serialize + ?Sized>(entry: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_canonical(&mut out, entry)?;
    Ok(out)
}

/// Size in bytes an entry contributes to a context budget: the length of
/// [`encode`]'s output, computed without buffering it.
pub fn encoded_size<T: Serialize + ?Sized>(entry: &T) -> Result<usize> {
    let mut count = ByteCount::default();
    write_canonical(&mut count, entry)?;
    Ok(count.0)
}

/// Decode a single entry previously produced by [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(ChatLogError::Decode)
}

/// Decode a whole log document (a JSON array of entries).
pub fn decode_document<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    serde_json::from_slice(bytes).map_err(ChatLogError::Decode)
}

/// Encode a sequence of entries as an indented JSON array.
///
/// Entries that fail to serialize are left out of the document; each one is
/// reported to `on_skip` with its index in `entries`.
pub fn encode_document<T, F>(entries: &[T], mut on_skip: F) -> Result<Vec<u8>>
where
    T: Serialize,
    F: FnMut(usize, ChatLogError),
{
    let mut values = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        match serde_json::to_value(entry) {
            Ok(value) => values.push(value),
            Err(e) => on_skip(idx, ChatLogError::Encode(e)),
        }
    }

    let mut out = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    values.serialize(&mut ser).map_err(ChatLogError::Encode)?;
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Test record that is either plain JSON or refuses to serialize.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum TestEntry {
        Json(Value),
        Broken,
    }

    impl Serialize for TestEntry {
        fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
            match self {
                Self::Json(v) => v.serialize(s),
                Self::Broken => Err(serde::ser::Error::custom("cannot serialize this entry")),
            }
        }
    }

    #[test]
    fn test_encode_uses_spaced_separators_and_is_deterministic() {
        let e = json!({"role": "user", "content": "hi"});
        let a = encode(&e).unwrap();
        let b = encode(&e).unwrap();
        assert_eq!(a, b);
        assert_eq!(String::from_utf8(a).unwrap(), r#"{"content": "hi", "role": "user"}"#);
        assert_eq!(encoded_size(&e).unwrap(), 33);

        let nested = json!(["a", 1, null, {"k": [true]}]);
        assert_eq!(
            String::from_utf8(encode(&nested).unwrap()).unwrap(),
            r#"["a", 1, null, {"k": [true]}]"#
        );
    }

    #[test]
    fn test_non_ascii_is_escaped_and_counted_escaped() {
        let e = json!({"content": "é"});
        assert_eq!(String::from_utf8(encode(&e).unwrap()).unwrap(), r#"{"content": "\u00e9"}"#);
        assert_eq!(encoded_size(&e).unwrap(), 21);

        let e = json!({"role": "user", "content": "é"});
        assert_eq!(encoded_size(&e).unwrap(), 37);

        let astral = json!({"content": "\u{1F600}"});
        assert_eq!(
            String::from_utf8(encode(&astral).unwrap()).unwrap(),
            r#"{"content": "\ud83d\ude00"}"#
        );
        assert_eq!(encoded_size(&astral).unwrap(), 27);

        // DEL is outside printable ASCII; control characters keep their short escapes.
        assert_eq!(encode(&json!("\u{7f}")).unwrap(), br#""\u007f""#.to_vec());
        assert_eq!(encode(&json!("a\nb")).unwrap(), br#""a\nb""#.to_vec());
    }

    #[test]
    fn test_size_matches_encoding_length() {
        let e = json!({"role": "assistant", "content": "naïve \"quote\" \u{1F600}", "n": 1.5});
        assert_eq!(encoded_size(&e).unwrap(), encode(&e).unwrap().len());
        let back: Value = decode(&encode(&e).unwrap()).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn test_budget_counts_escaped_size() {
        // Two 33-byte entries do not fit in 60 bytes together.
        let e = json!({"role": "user", "content": "hi"});
        let history = vec![e.clone(), e.clone()];
        assert_eq!(crate::window::build_rolling_history(&history, 60), vec![e.clone()]);

        let mut log = history.clone();
        crate::legacy::LegacyLog::new(60).truncate(&mut log);
        assert_eq!(log, vec![e]);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let e = json!({
            "role": "assistant",
            "content": "héllo \"world\"",
            "meta": {"tokens": 12, "tags": ["a", null, true, 1.5]}
        });
        let decoded: Entry = decode(&encode(&e).unwrap()).unwrap();
        assert_eq!(decoded, e);
    }

    #[test]
    fn test_chat_entry_flattens_extra_fields() {
        let entry = ChatEntry::new("user", "hello").with_field("turn", 3);
        let value: Value = decode(&encode(&entry).unwrap()).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hello", "turn": 3}));

        let back: ChatEntry = decode(&encode(&value).unwrap()).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_encode_failure_is_encode_error() {
        let err = encode(&TestEntry::Broken).unwrap_err();
        assert!(matches!(err, ChatLogError::Encode(_)));
    }

    #[test]
    fn test_document_is_indented_array() {
        let doc = encode_document(&[json!({"a": 1})], |_, _| panic!("no skips")).unwrap();
        let text = String::from_utf8(doc).unwrap();
        assert!(text.starts_with('['));
        assert!(text.contains("\n        \"a\": 1"));
    }

    #[test]
    fn test_document_skips_unencodable_entries() {
        let entries = vec![
            TestEntry::Json(json!("first")),
            TestEntry::Broken,
            TestEntry::Json(json!("third")),
        ];
        let mut skipped = Vec::new();
        let doc = encode_document(&entries, |idx, err| {
            assert!(matches!(err, ChatLogError::Encode(_)));
            skipped.push(idx);
        })
        .unwrap();

        assert_eq!(skipped, vec![1]);
        let decoded: Vec<Value> = decode_document(&doc).unwrap();
        assert_eq!(decoded, vec![json!("first"), json!("third")]);
    }

    #[test]
    fn test_decode_document_rejects_non_arrays_and_garbage() {
        assert!(matches!(
            decode_document::<Value>(br#"{"role":"user"}"#),
            Err(ChatLogError::Decode(_))
        ));
        assert!(matches!(
            decode_document::<Value>(b"[{\"role\":"),
            Err(ChatLogError::Decode(_))
        ));
        assert!(matches!(decode_document::<Value>(b""), Err(ChatLogError::Decode(_))));
    }
}
