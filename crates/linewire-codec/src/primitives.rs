//! Encodable/Decodable impls for scalars and text.

use std::fmt::Write as _;

use bytes::{BufMut, BytesMut};

use crate::codec::{Decodable, Encodable};
use crate::cursor::Cursor;
use crate::error::{CodecError, Result};

/// Longest `Debug` rendering of a finite `f32`/`f64`, rounded up.
const FLOAT_MAX_LEN: usize = 32;

impl Encodable for bool {
    fn json_size(&self) -> usize {
        5
    }

    fn write_json(&self, out: &mut BytesMut) {
        out.put_slice(if *self { b"true" } else { b"false" });
    }
}

impl Decodable for bool {
    fn read_json(cur: &mut Cursor<'_>) -> Result<Self> {
        cur.skip_space();
        if cur.match_literal(b"true") {
            Ok(true)
        } else if cur.match_literal(b"false") {
            Ok(false)
        } else {
            Err(cur.unexpected("'true' or 'false'"))
        }
    }
}

macro_rules! impl_integer {
    ($($ty:ty => $max_len:expr),* $(,)?) => {$(
        impl Encodable for $ty {
            fn json_size(&self) -> usize {
                $max_len
            }

            fn write_json(&self, out: &mut BytesMut) {
                // Writing into BytesMut cannot fail.
                let _ = write!(out, "{self}");
            }
        }

        impl Decodable for $ty {
            fn read_json(cur: &mut Cursor<'_>) -> Result<Self> {
                cur.skip_space();
                let offset = cur.position();
                let token = cur.read_number_token()?;
                if token.iter().any(|b| matches!(b, b'.' | b'e' | b'E')) {
                    return Err(CodecError::InvalidNumber { offset });
                }
                std::str::from_utf8(token)
                    .ok()
                    .and_then(|text| text.parse::<$ty>().ok())
                    .ok_or(CodecError::InvalidNumber { offset })
            }
        }
    )*};
}

impl_integer! {
    i8 => 4,
    i16 => 6,
    i32 => 11,
    i64 => 20,
    isize => 20,
    u8 => 3,
    u16 => 5,
    u32 => 10,
    u64 => 20,
    usize => 20,
}

// Non-finite floats have no JSON spelling. They are written as `null`, and
// `null` reads back as NaN.
macro_rules! impl_float {
    ($($ty:ty),*) => {$(
        impl Encodable for $ty {
            fn json_size(&self) -> usize {
                FLOAT_MAX_LEN
            }

            fn write_json(&self, out: &mut BytesMut) {
                if self.is_finite() {
                    // `Debug` is the shortest representation that round-trips.
                    let _ = write!(out, "{self:?}");
                } else {
                    out.put_slice(b"null");
                }
            }
        }

        impl Decodable for $ty {
            fn read_json(cur: &mut Cursor<'_>) -> Result<Self> {
                cur.skip_space();
                if cur.match_literal(b"null") {
                    return Ok(<$ty>::NAN);
                }
                let offset = cur.position();
                let token = cur.read_number_token()?;
                std::str::from_utf8(token)
                    .ok()
                    .and_then(|text| text.parse::<$ty>().ok())
                    .ok_or(CodecError::InvalidNumber { offset })
            }
        }
    )*};
}

impl_float!(f32, f64);

/// Bytes needed to write `bytes` as a quoted, escaped JSON string.
pub(crate) fn string_json_size(bytes: &[u8]) -> usize {
    2 + bytes
        .iter()
        .map(|&b| match b {
            b'"' | b'\\' | b'\n' | b'\r' | b'\t' | 0x08 | 0x0c => 2,
            0x00..=0x1f => 6,
            _ => 1,
        })
        .sum::<usize>()
}

/// Write `bytes` as a JSON string literal.
///
/// Bytes >= 0x80 are written unchanged; no UTF-8 validation happens here.
pub(crate) fn write_json_string(bytes: &[u8], out: &mut BytesMut) {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    out.put_u8(b'"');
    let mut run_start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let short = match b {
            b'"' => b'"',
            b'\\' => b'\\',
            b'\n' => b'n',
            b'\r' => b'r',
            b'\t' => b't',
            0x08 => b'b',
            0x0c => b'f',
            0x00..=0x1f => 0,
            _ => continue,
        };
        out.put_slice(&bytes[run_start..i]);
        run_start = i + 1;
        if short != 0 {
            out.put_slice(&[b'\\', short]);
        } else {
            out.put_slice(b"\\u00");
            out.put_slice(&[HEX[usize::from(b >> 4)], HEX[usize::from(b & 0xf)]]);
        }
    }
    out.put_slice(&bytes[run_start..]);
    out.put_u8(b'"');
}

impl Encodable for str {
    fn json_size(&self) -> usize {
        string_json_size(self.as_bytes())
    }

    fn write_json(&self, out: &mut BytesMut) {
        write_json_string(self.as_bytes(), out);
    }
}

impl Encodable for String {
    fn json_size(&self) -> usize {
        self.as_str().json_size()
    }

    fn write_json(&self, out: &mut BytesMut) {
        self.as_str().write_json(out);
    }
}

impl Decodable for String {
    /// Invalid UTF-8 inside the literal is replaced with U+FFFD.
    fn read_json(cur: &mut Cursor<'_>) -> Result<Self> {
        cur.skip_space();
        let bytes = cur.read_string_bytes()?;
        Ok(String::from_utf8(bytes)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::codec::{decode, encode};
    use crate::error::CodecError;

    #[test]
    fn booleans() {
        assert_eq!(encode(&true).as_bytes(), b"true");
        assert_eq!(encode(&false).as_bytes(), b"false");
        assert!(!decode::<bool>(b" false ").unwrap());
        assert!(decode::<bool>(b"tru").is_err());
    }

    #[test]
    fn integer_extremes() {
        assert_eq!(encode(&i64::MIN).as_bytes(), b"-9223372036854775808");
        assert_eq!(encode(&u64::MAX).as_bytes(), b"18446744073709551615");
        assert_eq!(encode(&0u8).as_bytes(), b"0");
        assert_eq!(decode::<i64>(b"-9223372036854775808").unwrap(), i64::MIN);
        assert_eq!(decode::<u64>(b"18446744073709551615").unwrap(), u64::MAX);
    }

    #[test]
    fn integer_size_bound_holds_at_extremes() {
        use crate::codec::Encodable;
        assert!(i8::MIN.json_size() >= encode(&i8::MIN).len());
        assert!(i16::MIN.json_size() >= encode(&i16::MIN).len());
        assert!(i32::MIN.json_size() >= encode(&i32::MIN).len());
        assert!(u32::MAX.json_size() >= encode(&u32::MAX).len());
    }

    #[test]
    fn integer_rejects_out_of_range_and_fractions() {
        assert!(matches!(decode::<u8>(b"256"), Err(CodecError::InvalidNumber { .. })));
        assert!(matches!(decode::<u32>(b"-1"), Err(CodecError::InvalidNumber { .. })));
        assert!(matches!(decode::<i32>(b"1.5"), Err(CodecError::InvalidNumber { .. })));
        assert!(matches!(decode::<i32>(b"1e3"), Err(CodecError::InvalidNumber { .. })));
    }

    #[test]
    fn floats_use_shortest_form() {
        assert_eq!(encode(&0.1f64).as_bytes(), b"0.1");
        assert_eq!(encode(&1.0f64).as_bytes(), b"1.0");
        assert_eq!(encode(&1e300f64).as_bytes(), b"1e300");
        assert_eq!(encode(&0.1f32).as_bytes(), b"0.1");
        assert_eq!(decode::<f64>(b"1e300").unwrap(), 1e300);
        assert_eq!(decode::<f64>(b"3").unwrap(), 3.0);
    }

    #[test]
    fn non_finite_floats_map_to_null() {
        assert_eq!(encode(&f64::NAN).as_bytes(), b"null");
        assert_eq!(encode(&f64::INFINITY).as_bytes(), b"null");
        assert_eq!(encode(&f32::NEG_INFINITY).as_bytes(), b"null");
        assert!(decode::<f64>(b"null").unwrap().is_nan());
        assert!(decode::<f32>(b"null").unwrap().is_nan());
    }

    #[test]
    fn string_escaping() {
        assert_eq!(encode("a\nb").as_bytes(), br#""a\nb""#);
        assert_eq!(encode("\u{1}").as_bytes(), br#""\u0001""#);
        assert_eq!(encode("\u{1f}\u{8}\u{c}").as_bytes(), br#""\u001f\b\f""#);
        assert_eq!(encode("caf\u{e9}").as_bytes(), "\"caf\u{e9}\"".as_bytes());
        assert_eq!(encode("").as_bytes(), br#""""#);
    }

    #[test]
    fn string_lossy_on_malformed_utf8() {
        let s = decode::<String>(b"\"a\xffb\"").unwrap();
        assert_eq!(s, "a\u{fffd}b");
    }

    proptest! {
        #[test]
        fn f64_roundtrip_is_bit_exact(bits in any::<u64>()) {
            let value = f64::from_bits(bits);
            prop_assume!(value.is_finite());
            let encoded = encode(&value);
            prop_assert!(encoded.len() <= 32);
            let back = decode::<f64>(encoded.as_bytes()).unwrap();
            prop_assert_eq!(back.to_bits(), value.to_bits());
        }

        #[test]
        fn f32_roundtrip_is_bit_exact(bits in any::<u32>()) {
            let value = f32::from_bits(bits);
            prop_assume!(value.is_finite());
            let back = decode::<f32>(encode(&value).as_bytes()).unwrap();
            prop_assert_eq!(back.to_bits(), value.to_bits());
        }

        #[test]
        fn string_roundtrip(text in any::<String>()) {
            let encoded = encode(&text);
            prop_assert!(!encoded.as_bytes().contains(&b'\n'));
            prop_assert_eq!(decode::<String>(encoded.as_bytes()).unwrap(), text);
        }
    }
}
