// Canonical JSON for everything that is hashed or signed. Peers written in
// other languages serialize with Python's `json.dumps` defaults, so the byte
// layout here has to match it exactly: `", "` and `": "` separators and
// ASCII-only output.
use crate::error::{LedgerError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;

#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalFormatter;

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
            writer.write_all(&fragment.as_bytes()[start..idx])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

/// Serialize with the canonical (hash/sign) layout
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| LedgerError::Serialization(format!("Serialization failed: {e}")))?;
    String::from_utf8(buf)
        .map_err(|e| LedgerError::Serialization(format!("Serialization produced invalid UTF-8: {e}")))
}

pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json)
        .map_err(|e| LedgerError::Serialization(format!("Deserialization failed: {e}")))
}
