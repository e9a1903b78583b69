use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use linewire_codec::{decode, CodecError, Decodable, EncodedValue};

/// Terminates every record on the wire.
pub const RECORD_DELIMITER: u8 = b'\n';

/// One line received from the wire, without its trailing newline.
///
/// Content is not validated until it is decoded.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Record {
    bytes: Bytes,
}

impl Record {
    /// A record from one line of wire data, without its newline.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the record into a typed value.
    pub fn decode<T: Decodable>(&self) -> Result<T, CodecError> {
        decode(&self.bytes)
    }

    /// Validate the record as a single JSON value.
    pub fn to_value(&self) -> Result<EncodedValue, CodecError> {
        EncodedValue::from_raw(self.bytes.clone())
    }
}

impl AsRef<[u8]> for Record {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Record").field(&self.as_str()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_on_demand() {
        let record = Record::new(Bytes::from_static(b"[1, 2]"));
        assert_eq!(record.decode::<Vec<u8>>().unwrap(), vec![1, 2]);
        assert_eq!(record.to_value().unwrap().as_bytes(), b"[1, 2]");
        assert_eq!(record.to_string(), "[1, 2]");
    }

    #[test]
    fn malformed_records_fail_only_when_decoded() {
        let record = Record::new(Bytes::from_static(b"{\"x\":"));
        assert_eq!(record.len(), 5);
        assert!(record.decode::<u8>().is_err());
        assert!(record.to_value().is_err());
    }
}
