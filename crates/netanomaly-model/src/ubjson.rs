//! Universal Binary JSON reader.
//!
//! Decodes a UBJSON document (draft 12, including the optimized `$`/`#` container headers)
//! into a [`serde_json::Value`], so that binary and textual model documents share one schema.
//! All multi-byte numbers are big-endian.

use serde_json::{Map, Number, Value};

const MAX_DEPTH: usize = 128;
const MAX_EMPTY_ELEMENTS: usize = 1 << 24;

/// Errors returned while decoding UBJSON.
#[derive(Debug, thiserror::Error)]
pub enum UbjsonError {
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },
    #[error("invalid marker {marker:?} at offset {offset}")]
    InvalidMarker { marker: char, offset: usize },
    #[error("invalid length at offset {offset}")]
    InvalidLength { offset: usize },
    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("invalid high-precision number: {0}")]
    InvalidNumber(String),
    #[error("document nesting exceeds {MAX_DEPTH} levels")]
    TooDeep,
    #[error("trailing bytes after document at offset {offset}")]
    TrailingBytes { offset: usize },
}

/// Decode a complete UBJSON document.
pub fn from_slice(bytes: &[u8]) -> Result<Value, UbjsonError> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let value = reader.value(0)?;
    reader.skip_noop();
    if reader.pos != bytes.len() {
        return Err(UbjsonError::TrailingBytes { offset: reader.pos });
    }
    Ok(value)
}

/// Whether `marker` can start a UBJSON value or an optimized container header.
pub(crate) fn is_marker(marker: u8) -> bool {
    matches!(
        marker,
        b'Z' | b'N'
            | b'T'
            | b'F'
            | b'i'
            | b'U'
            | b'I'
            | b'l'
            | b'L'
            | b'd'
            | b'D'
            | b'H'
            | b'C'
            | b'S'
            | b'['
            | b'{'
            | b'}'
            | b'$'
            | b'#'
    )
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take(&mut self, len: usize) -> Result<&[u8], UbjsonError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(UbjsonError::UnexpectedEof { offset: self.pos })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, UbjsonError> {
        Ok(self.take(1)?[0])
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn skip_noop(&mut self) {
        while self.peek() == Some(b'N') {
            self.pos += 1;
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], UbjsonError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn invalid(&self, marker: u8) -> UbjsonError {
        UbjsonError::InvalidMarker {
            marker: marker as char,
            offset: self.pos.saturating_sub(1),
        }
    }

    /// Read an integer given its marker, as used by lengths and counts.
    fn integer(&mut self, marker: u8) -> Result<i64, UbjsonError> {
        Ok(match marker {
            b'i' => i8::from_be_bytes(self.array()?) as i64,
            b'U' => self.byte()? as i64,
            b'I' => i16::from_be_bytes(self.array()?) as i64,
            b'l' => i32::from_be_bytes(self.array()?) as i64,
            b'L' => i64::from_be_bytes(self.array()?),
            other => return Err(self.invalid(other)),
        })
    }

    fn length(&mut self) -> Result<usize, UbjsonError> {
        let offset = self.pos;
        let marker = self.byte()?;
        let len = self.integer(marker)?;
        usize::try_from(len).map_err(|_| UbjsonError::InvalidLength { offset })
    }

    fn string(&mut self) -> Result<String, UbjsonError> {
        let len = self.length()?;
        let offset = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| UbjsonError::InvalidUtf8 { offset })
    }

    fn value(&mut self, depth: usize) -> Result<Value, UbjsonError> {
        self.skip_noop();
        let marker = self.byte()?;
        self.typed_value(marker, depth)
    }

    fn typed_value(&mut self, marker: u8, depth: usize) -> Result<Value, UbjsonError> {
        Ok(match marker {
            b'Z' => Value::Null,
            b'T' => Value::Bool(true),
            b'F' => Value::Bool(false),
            b'i' | b'U' | b'I' | b'l' | b'L' => Value::from(self.integer(marker)?),
            b'd' => float(f32::from_be_bytes(self.array()?) as f64),
            b'D' => float(f64::from_be_bytes(self.array()?)),
            b'H' => {
                let text = self.string()?;
                let number = text
                    .parse::<Number>()
                    .map_err(|_| UbjsonError::InvalidNumber(text.clone()))?;
                Value::Number(number)
            }
            b'C' => Value::String((self.byte()? as char).to_string()),
            b'S' => Value::String(self.string()?),
            b'[' => self.container(depth, false)?,
            b'{' => self.container(depth, true)?,
            other => return Err(self.invalid(other)),
        })
    }

    fn container(&mut self, depth: usize, object: bool) -> Result<Value, UbjsonError> {
        if depth >= MAX_DEPTH {
            return Err(UbjsonError::TooDeep);
        }
        let (element_type, count) = self.container_header()?;
        if let Some(count) = count {
            self.check_count(element_type, count)?;
        }

        let mut array = Vec::new();
        let mut map = Map::new();
        let mut read = 0usize;
        loop {
            match count {
                Some(count) if read == count => break,
                None => {
                    self.skip_noop();
                    let end = if object { b'}' } else { b']' };
                    if self.peek() == Some(end) {
                        self.pos += 1;
                        break;
                    }
                }
                _ => {}
            }

            let key = if object { Some(self.string()?) } else { None };
            let value = match element_type {
                Some(marker) => self.typed_value(marker, depth + 1)?,
                None => self.value(depth + 1)?,
            };
            match key {
                Some(key) => {
                    map.insert(key, value);
                }
                None => array.push(value),
            }
            read += 1;
        }

        Ok(if object {
            Value::Object(map)
        } else {
            Value::Array(array)
        })
    }

    fn container_header(&mut self) -> Result<(Option<u8>, Option<usize>), UbjsonError> {
        let mut element_type = None;
        if self.peek() == Some(b'$') {
            self.pos += 1;
            element_type = Some(self.byte()?);
        }
        let count = if self.peek() == Some(b'#') {
            self.pos += 1;
            Some(self.length()?)
        } else {
            None
        };
        if element_type.is_some() && count.is_none() {
            return Err(UbjsonError::InvalidMarker {
                marker: '$',
                offset: self.pos,
            });
        }
        Ok((element_type, count))
    }

    /// Reject counts that cannot possibly fit in the remaining input.
    fn check_count(&self, element_type: Option<u8>, count: usize) -> Result<(), UbjsonError> {
        let width = match element_type {
            Some(b'i' | b'U' | b'C') => 1,
            Some(b'I') => 2,
            Some(b'l' | b'd') => 4,
            Some(b'L' | b'D') => 8,
            Some(b'Z' | b'T' | b'F') => 0,
            _ => 1,
        };
        let fits = if width == 0 {
            count <= MAX_EMPTY_ELEMENTS
        } else {
            count
                .checked_mul(width)
                .is_some_and(|bytes| bytes <= self.remaining())
        };
        if fits {
            Ok(())
        } else {
            Err(UbjsonError::InvalidLength { offset: self.pos })
        }
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
