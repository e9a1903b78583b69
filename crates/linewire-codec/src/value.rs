use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{decode, Decodable, Encodable};
use crate::cursor::Cursor;
use crate::error::{CodecError, Result};

/// An owned buffer holding exactly one JSON-encoded value.
///
/// The content is always a complete JSON value and never contains a newline
/// byte, so it can be framed on a line-oriented transport as-is. Clones share
/// the underlying buffer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncodedValue {
    bytes: Bytes,
}

impl EncodedValue {
    /// The literal `null`.
    pub fn null() -> Self {
        Self {
            bytes: Bytes::from_static(b"null"),
        }
    }

    /// Wrap bytes produced by the encoder, which never emits a newline.
    pub(crate) fn from_encoded(bytes: Bytes) -> Self {
        debug_assert!(!bytes.contains(&b'\n'));
        Self { bytes }
    }

    /// Validate raw JSON text and take ownership of it.
    ///
    /// Surrounding whitespace is trimmed. Newlines between tokens are
    /// replaced by spaces, which keeps the value intact because a raw newline
    /// can never appear inside a valid JSON string.
    pub fn from_raw(raw: impl Into<Bytes>) -> Result<Self> {
        let raw: Bytes = raw.into();
        let mut cur = Cursor::new(&raw);
        cur.skip_space();
        let start = cur.position();
        cur.skip_value()?;
        let end = cur.position();
        cur.finish()?;

        let content = raw.slice(start..end);
        if !content.contains(&b'\n') {
            return Ok(Self { bytes: content });
        }
        let mut flat = BytesMut::with_capacity(content.len());
        flat.extend(content.iter().map(|&b| if b == b'\n' { b' ' } else { b }));
        Ok(Self {
            bytes: flat.freeze(),
        })
    }

    /// True if this value is the literal `null`.
    pub fn is_null(&self) -> bool {
        self.bytes.as_ref() == b"null"
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// The content as text. Malformed UTF-8 inside strings is replaced.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the content into a typed value.
    pub fn decode<T: Decodable>(&self) -> Result<T> {
        decode(&self.bytes)
    }
}

impl Default for EncodedValue {
    fn default() -> Self {
        Self::null()
    }
}

impl AsRef<[u8]> for EncodedValue {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl FromStr for EncodedValue {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_raw(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl TryFrom<String> for EncodedValue {
    type Error = CodecError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_raw(s)
    }
}

impl fmt::Display for EncodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl fmt::Debug for EncodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncodedValue").field(&self.as_str()).finish()
    }
}

/// Spliced verbatim into the surrounding output.
impl Encodable for EncodedValue {
    fn json_size(&self) -> usize {
        self.bytes.len()
    }

    fn write_json(&self, out: &mut BytesMut) {
        out.put_slice(&self.bytes);
    }
}

/// Captures the raw text of whatever value sits at the cursor.
impl Decodable for EncodedValue {
    fn read_json(cur: &mut Cursor<'_>) -> Result<Self> {
        cur.skip_space();
        let start = cur.position();
        cur.skip_value()?;
        let raw = cur.slice(start, cur.position());
        Ok(Self {
            bytes: Bytes::from(
                raw.iter()
                    .map(|&b| if b == b'\n' { b' ' } else { b })
                    .collect::<Vec<u8>>(),
            ),
        })
    }
}
