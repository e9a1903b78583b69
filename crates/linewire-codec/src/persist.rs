//! Reading and writing encoded values to files.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::error::Result;
use crate::value::EncodedValue;

/// Gzip member header magic.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

impl EncodedValue {
    /// Write this value to `path`, followed by a newline.
    ///
    /// With `compress`, the file is a gzip stream. [`read_from_file`](Self::read_from_file)
    /// accepts either form.
    pub fn write_to_file(&self, path: impl AsRef<Path>, compress: bool) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        if compress {
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(self.as_bytes())?;
            encoder.write_all(b"\n")?;
            encoder.finish()?.sync_all()?;
        } else {
            let mut file = file;
            file.write_all(self.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        debug!(?path, len = self.len(), compress, "wrote encoded value");
        Ok(())
    }

    /// Read a value previously written with [`write_to_file`](Self::write_to_file).
    ///
    /// Returns `Ok(None)` if the file does not exist. Any other I/O failure,
    /// a corrupt gzip stream, or content that is not a single JSON value is
    /// an error.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let content = if raw.starts_with(&GZIP_MAGIC) {
            let mut inflated = Vec::with_capacity(raw.len() * 4);
            GzDecoder::new(raw.as_slice()).read_to_end(&mut inflated)?;
            debug!(?path, compressed = raw.len(), len = inflated.len(), "inflated encoded value");
            inflated
        } else {
            raw
        };

        EncodedValue::from_raw(content).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::*;
    use crate::codec::encode;
    use crate::error::CodecError;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("linewire-persist-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample() -> EncodedValue {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), vec!["x".to_string(); 64]);
        encode(&map)
    }

    #[test]
    fn plain_roundtrip() {
        let dir = temp_dir("plain");
        let path = dir.join("value.json");

        let value = sample();
        value.write_to_file(&path, false).unwrap();
        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(&on_disk[..on_disk.len() - 1], value.as_bytes());

        let back = EncodedValue::read_from_file(&path).unwrap().unwrap();
        assert_eq!(back, value);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn gzip_roundtrip_is_detected() {
        let dir = temp_dir("gzip");
        let path = dir.join("value.json.gz");

        let value = sample();
        value.write_to_file(&path, true).unwrap();
        let on_disk = std::fs::read(&path).unwrap();
        assert!(on_disk.starts_with(&GZIP_MAGIC));
        assert!(on_disk.len() < value.len());

        let back = EncodedValue::read_from_file(&path).unwrap().unwrap();
        assert_eq!(back, value);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_none() {
        let dir = temp_dir("missing");
        let result = EncodedValue::read_from_file(dir.join("nope.json")).unwrap();
        assert!(result.is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn directory_is_an_error() {
        let dir = temp_dir("isdir");
        let err = EncodedValue::read_from_file(&dir).unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_content_is_an_error() {
        let dir = temp_dir("malformed");
        let path = dir.join("bad.json");
        std::fs::write(&path, b"{\"x\":1").unwrap();
        let err = EncodedValue::read_from_file(&path).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedEnd { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
