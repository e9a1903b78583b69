//! JSON values over newline-framed, non-blocking pipes and sockets.
//!
//! # Crate Structure
//!
//! - [`codec`] holds two-pass JSON encoding and bounds-checked decoding of typed values
//! - [`pipe`] holds the framed duplex transport, its poll driver and connection helpers
//!
//! ```no_run
//! use linewire::{FramedPipe, PipeConfig, UnixEndpoint};
//!
//! let pipe: FramedPipe = UnixEndpoint::connect("/tmp/app.sock", PipeConfig::default())?;
//! pipe.send(&vec![1u32, 2, 3])?;
//! pipe.tx_eof();
//! while let Some(reply) = pipe.recv::<Vec<u32>>() {
//!     println!("{:?}", reply?);
//! }
//! # Ok::<(), linewire::PipeError>(())
//! ```
//!
//! The example assumes something drives the pipe's readiness hooks, for
//! instance a thread calling [`poll_once`] in a loop.

/// Re-export codec types.
pub mod codec {
    pub use linewire_codec::*;
}

/// Re-export transport types.
pub mod pipe {
    pub use linewire_pipe::*;
}

pub use linewire_codec::{decode, encode, CodecError, Decodable, Encodable, EncodedValue};
pub use linewire_pipe::{
    connect_tcp, poll_once, Direction, FramedPipe, PipeConfig, PipeError, Pollable, Record,
    UnixEndpoint,
};
