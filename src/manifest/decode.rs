//! Multi-document YAML/JSON stream decoding
//!
//! The stream is split into documents before parsing, so a malformed document
//! only costs itself: it is logged, counted and skipped while the decoder
//! moves on to the next one. Concatenated JSON values recover the same way,
//! one value at a time.

use serde_json::Value;
use tracing::warn;

use super::ManifestDocument;
use crate::Error;

/// Decode `bytes` into a lazy sequence of manifest documents
pub fn decode_documents(bytes: &[u8]) -> DocumentDecoder<'_> {
    DocumentDecoder::new(bytes)
}

/// Iterator over the documents of one manifest stream
///
/// Finite and not restartable. Empty documents are dropped silently, invalid
/// documents are skipped with a warning.
pub struct DocumentDecoder<'a> {
    rest: &'a [u8],
    json: &'a [u8],
    position: usize,
    skipped: usize,
}

impl<'a> DocumentDecoder<'a> {
    /// Create a decoder over a raw byte stream
    ///
    /// The stream is split on `---` lines and each document is parsed as
    /// YAML. A document that is not valid YAML but starts with `{` or `[` is
    /// read as concatenated JSON values, resuming after a malformed value at
    /// the next line that opens a new one.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            rest: bytes,
            json: &[],
            position: 0,
            skipped: 0,
        }
    }

    /// Number of documents skipped because they failed to decode
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn next_raw(&mut self) -> Option<Result<Option<ManifestDocument>, Error>> {
        if let Some(result) = next_json_value(&mut self.json) {
            return Some(result);
        }

        let chunk = next_yaml_chunk(&mut self.rest)?;
        Some(match decode_yaml_chunk(chunk) {
            Err(_) if opens_json_value(chunk) => {
                self.json = chunk;
                next_json_value(&mut self.json).unwrap_or(Ok(None))
            }
            result => result,
        })
    }
}

impl Iterator for DocumentDecoder<'_> {
    type Item = ManifestDocument;

    fn next(&mut self) -> Option<ManifestDocument> {
        loop {
            let result = self.next_raw()?;
            self.position += 1;

            match result {
                Ok(Some(doc)) => return Some(doc),
                Ok(None) => continue,
                Err(e) => {
                    self.skipped += 1;
                    warn!(document = self.position, error = %e, "skipping invalid manifest document");
                }
            }
        }
    }
}

/// Split off the next document, advancing `rest` past its separator line
fn next_yaml_chunk<'a>(rest: &mut &'a [u8]) -> Option<&'a [u8]> {
    if rest.is_empty() {
        return None;
    }

    let input = *rest;
    let mut pos = 0;
    while pos < input.len() {
        let line_end = input[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i + 1)
            .unwrap_or(input.len());

        if is_separator(&input[pos..line_end]) {
            *rest = &input[line_end..];
            return Some(&input[..pos]);
        }
        pos = line_end;
    }

    *rest = &[];
    Some(input)
}

/// A `---` line, optionally followed by whitespace or a comment
fn is_separator(line: &[u8]) -> bool {
    match line.strip_prefix(b"---") {
        Some(after) => {
            let after = after.trim_ascii();
            after.is_empty() || after.starts_with(b"#")
        }
        None => false,
    }
}

fn opens_json_value(bytes: &[u8]) -> bool {
    matches!(bytes.trim_ascii_start().first(), Some(b'{' | b'['))
}

/// Decode the next value of a concatenated JSON document
fn next_json_value<'a>(
    rest: &mut &'a [u8],
) -> Option<Result<Option<ManifestDocument>, Error>> {
    let input: &'a [u8] = *rest;
    let input = input.trim_ascii_start();
    if input.is_empty() {
        *rest = &[];
        return None;
    }

    let mut values = serde_json::Deserializer::from_slice(input).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => {
            *rest = &input[values.byte_offset()..];
            Some(ManifestDocument::from_value(value).map(Some))
        }
        Some(Err(e)) => {
            *rest = skip_malformed_value(input);
            Some(Err(Error::decode(format!("invalid JSON: {e}"))))
        }
        None => {
            *rest = &[];
            None
        }
    }
}

/// Skip to the next line after `input`'s first that starts with `{` or `[`
fn skip_malformed_value(input: &[u8]) -> &[u8] {
    let mut pos = match input.iter().position(|&b| b == b'\n') {
        Some(i) => i + 1,
        None => return &[],
    };

    while pos < input.len() {
        if matches!(input[pos], b'{' | b'[') {
            return &input[pos..];
        }
        pos = match input[pos..].iter().position(|&b| b == b'\n') {
            Some(i) => pos + i + 1,
            None => input.len(),
        };
    }
    &[]
}

fn decode_yaml_chunk(chunk: &[u8]) -> Result<Option<ManifestDocument>, Error> {
    let text =
        std::str::from_utf8(chunk).map_err(|e| Error::decode(format!("invalid UTF-8: {e}")))?;

    if is_blank(text) {
        return Ok(None);
    }

    let value: Value =
        serde_yaml::from_str(text).map_err(|e| Error::decode(format!("invalid YAML: {e}")))?;
    if value.is_null() {
        return Ok(None);
    }

    ManifestDocument::from_value(value).map(Some)
}

fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}
