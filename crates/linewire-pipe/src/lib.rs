//! Newline-framed, non-blocking duplex transport.
//!
//! Each record on the wire is one JSON value followed by `\n`. A
//! [`FramedPipe`] buffers partial reads and writes, supports half-closing
//! either direction of a shared socket, and can be fed from any number of
//! producer threads while consumers block on or poll its receive queue.
//!
//! The pipe never drives itself: a readiness loop calls its
//! [`Pollable`] hooks, or [`poll_once`] is used directly.

pub mod config;
pub mod endpoint;
pub mod error;
mod fd;
pub mod pipe;
pub mod reactor;
pub mod record;

pub use config::PipeConfig;
pub use endpoint::{connect_tcp, UnixEndpoint};
pub use error::{PipeError, Result};
pub use pipe::FramedPipe;
pub use reactor::{poll_once, Direction, Interest, PollSet, Pollable};
pub use record::{Record, RECORD_DELIMITER};
