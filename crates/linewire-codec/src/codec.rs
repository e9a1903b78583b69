use bytes::BytesMut;

use crate::cursor::Cursor;
use crate::error::Result;
use crate::value::EncodedValue;

/// A type that can be written as JSON.
///
/// Encoding is two-pass: [`json_size`](Encodable::json_size) returns an upper
/// bound on the output length, then [`write_json`](Encodable::write_json)
/// appends at most that many bytes. [`encode`] allocates exactly once from the
/// bound, so the bound must never under-estimate.
pub trait Encodable {
    /// Upper bound on the number of bytes `write_json` appends.
    fn json_size(&self) -> usize;

    /// Append the JSON text for `self` to `out`.
    fn write_json(&self, out: &mut BytesMut);
}

/// A type that can be read back from JSON.
///
/// Implementations skip leading whitespace themselves, consume exactly one
/// value, and leave the cursor just past it. After an error the cursor
/// position is unspecified.
pub trait Decodable: Sized {
    fn read_json(cur: &mut Cursor<'_>) -> Result<Self>;
}

impl<T: Encodable + ?Sized> Encodable for &T {
    fn json_size(&self) -> usize {
        (**self).json_size()
    }

    fn write_json(&self, out: &mut BytesMut) {
        (**self).write_json(out);
    }
}

/// Encode a value into a fresh [`EncodedValue`].
pub fn encode<T: Encodable + ?Sized>(value: &T) -> EncodedValue {
    let bound = value.json_size();
    let mut out = BytesMut::with_capacity(bound);
    value.write_json(&mut out);
    debug_assert!(
        out.len() <= bound,
        "json_size under-estimated: wrote {} bytes, bound {bound}",
        out.len()
    );
    EncodedValue::from_encoded(out.freeze())
}

/// Decode one value from `input`.
///
/// Whitespace around the value is allowed; anything else after it is
/// [`CodecError::TrailingData`](crate::CodecError::TrailingData).
pub fn decode<T: Decodable>(input: &[u8]) -> Result<T> {
    let mut cur = Cursor::new(input);
    let value = T::read_json(&mut cur)?;
    cur.finish()?;
    Ok(value)
}
