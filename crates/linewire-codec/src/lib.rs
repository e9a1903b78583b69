//! Two-pass JSON codec for typed values.
//!
//! Encoding computes an upper bound on the output size first, allocates
//! once, then writes. Decoding walks a bounds-checked [`Cursor`] and reports
//! malformed input as a [`CodecError`], never a panic.
//!
//! - Scalars: `bool`, integers, `f32`/`f64` (non-finite values become `null`), strings.
//! - Wrappers: `Option<T>` (`None` is `null`), `Box<T>`, `Arc<T>`.
//! - Collections: `Vec<T>`, `VecDeque<T>`, slices and arrays, `BTreeMap<String, V>`.
//! - [`EncodedValue`]: an owned, already-encoded value that can also be embedded
//!   inside larger structures.
//!
//! Encoded output never contains a newline byte, so every [`EncodedValue`]
//! is a valid record for a newline-framed transport.

pub mod codec;
pub mod containers;
pub mod cursor;
pub mod error;
pub mod persist;
pub mod primitives;
pub mod value;

pub use codec::{decode, encode, Decodable, Encodable};
pub use cursor::Cursor;
pub use error::{CodecError, Result};
pub use value::EncodedValue;
