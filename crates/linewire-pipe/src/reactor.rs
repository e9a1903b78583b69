//! A minimal `poll(2)` driver for readiness-driven sources.
//!
//! Sources declare the descriptors they care about in [`Pollable::pre_wait`],
//! the set is waited on once, and each source services whatever became ready
//! in [`Pollable::post_wait`]. Any other event loop can drive a
//! [`FramedPipe`](crate::FramedPipe) through the same two hooks.

use std::fmt;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// One direction of a duplex pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Transmit,
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Transmit => "transmit",
            Direction::Receive => "receive",
        })
    }
}

/// The descriptors a source wants to wait on right now.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub read: Option<RawFd>,
    pub write: Option<RawFd>,
}

impl Interest {
    pub fn is_empty(&self) -> bool {
        self.read.is_none() && self.write.is_none()
    }
}

const READABLE: libc::c_short = libc::POLLIN | libc::POLLHUP | libc::POLLERR;
const WRITABLE: libc::c_short = libc::POLLOUT | libc::POLLHUP | libc::POLLERR;

/// Requested and returned events per descriptor.
///
/// Registering the same descriptor twice merges the requested events, so a
/// duplex fd waited on in both directions appears once.
#[derive(Default)]
pub struct PollSet {
    fds: Vec<libc::pollfd>,
}

impl PollSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.fds.clear();
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    pub fn add_read(&mut self, fd: RawFd) {
        self.add(fd, libc::POLLIN);
    }

    pub fn add_write(&mut self, fd: RawFd) {
        self.add(fd, libc::POLLOUT);
    }

    pub fn add_interest(&mut self, interest: Interest) {
        if let Some(fd) = interest.read {
            self.add_read(fd);
        }
        if let Some(fd) = interest.write {
            self.add_write(fd);
        }
    }

    fn add(&mut self, fd: RawFd, events: libc::c_short) {
        match self.fds.iter_mut().find(|p| p.fd == fd) {
            Some(entry) => entry.events |= events,
            None => self.fds.push(libc::pollfd {
                fd,
                events,
                revents: 0,
            }),
        }
    }

    fn revents(&self, fd: RawFd) -> libc::c_short {
        self.fds
            .iter()
            .find(|p| p.fd == fd)
            .map_or(0, |p| p.revents)
    }

    /// Readable, hung up or in error after the last wait. Errors count as
    /// readable so the next read observes them.
    pub fn is_readable(&self, fd: RawFd) -> bool {
        self.revents(fd) & READABLE != 0
    }

    pub fn is_writable(&self, fd: RawFd) -> bool {
        self.revents(fd) & WRITABLE != 0
    }

    /// Wait once. Returns the number of descriptors with events; an
    /// interrupted wait reports zero.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        for entry in &mut self.fds {
            entry.revents = 0;
        }
        let timeout_ms = match timeout {
            None => -1,
            Some(timeout) => {
                // Round up so a sub-millisecond timeout still waits.
                let ms = timeout.as_nanos().div_ceil(1_000_000);
                libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX)
            }
        };
        // SAFETY: the pointer and length describe the live `fds` vector.
        let n = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(n as usize)
    }
}

impl fmt::Debug for PollSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.fds
                    .iter()
                    .map(|p| (p.fd, p.events, p.revents)),
            )
            .finish()
    }
}

/// A source that can be driven by a readiness loop.
pub trait Pollable {
    /// Register the descriptors this source is waiting on.
    fn pre_wait(&self, set: &mut PollSet);

    /// Service whatever the last wait reported ready.
    fn post_wait(&self, set: &PollSet);
}

/// Run one pre-wait / wait / post-wait cycle over `sources`.
///
/// Returns the number of ready descriptors. With no registered descriptors
/// and a timeout this simply sleeps for the timeout.
pub fn poll_once(sources: &[&dyn Pollable], timeout: Option<Duration>) -> io::Result<usize> {
    let mut set = PollSet::new();
    for source in sources {
        source.pre_wait(&mut set);
    }
    let ready = set.wait(timeout)?;
    if ready > 0 {
        for source in sources {
            source.post_wait(&set);
        }
    }
    Ok(ready)
}
