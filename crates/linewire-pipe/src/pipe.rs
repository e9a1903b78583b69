//! Newline-framed duplex transport over raw descriptors.
//!
//! A [`FramedPipe`] owns a transmit fd and a receive fd, which may be one
//! duplex socket. Producers enqueue [`EncodedValue`]s from any thread; the
//! pipe appends a newline and drains them as the fd becomes writable.
//! Received bytes are split on newlines into [`Record`]s that consumers
//! take with [`rx_nonblock`](FramedPipe::rx_nonblock) or
//! [`rx_block`](FramedPipe::rx_block).
//!
//! All state sits behind one mutex. Descriptors are non-blocking, so every
//! syscall made under the lock returns promptly. Readiness is driven from
//! outside, either through [`Pollable`] or the
//! [`wants_readiness`](FramedPipe::wants_readiness) /
//! [`on_readiness`](FramedPipe::on_readiness) pair.

use std::collections::VecDeque;
use std::fmt;
use std::io::ErrorKind;
use std::net::Shutdown;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::{Buf, BufMut, BytesMut};
use linewire_codec::{encode, Decodable, Encodable, EncodedValue};
use tracing::{debug, trace, warn};

use crate::config::PipeConfig;
use crate::error::{PipeError, Result};
use crate::fd;
use crate::reactor::{Direction, Interest, PollSet, Pollable};
use crate::record::{Record, RECORD_DELIMITER};

/// One configured direction. A duplex fd is shared by both directions and
/// closed when the last of them lets go.
struct Endpoint {
    fd: Arc<OwnedFd>,
    socket: bool,
}

impl Endpoint {
    fn raw(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

struct PipeState {
    configured: bool,
    tx: Option<Endpoint>,
    rx: Option<Endpoint>,
    tx_queue: VecDeque<EncodedValue>,
    /// Unsent bytes of the record currently being written, newline included.
    tx_cur: BytesMut,
    tx_eof: bool,
    /// Records discarded because transmit closed before writing them.
    tx_dropped: usize,
    rx_queue: VecDeque<Record>,
    /// Received bytes not yet terminated by a newline.
    rx_cur: BytesMut,
    scratch: Vec<u8>,
}

impl PipeState {
    fn new(config: &PipeConfig) -> Self {
        Self {
            configured: false,
            tx: None,
            rx: None,
            tx_queue: VecDeque::new(),
            tx_cur: BytesMut::new(),
            tx_eof: false,
            tx_dropped: 0,
            rx_queue: VecDeque::new(),
            rx_cur: BytesMut::new(),
            scratch: vec![0; config.read_chunk_size.max(1)],
        }
    }

    fn wants(&self, direction: Direction) -> bool {
        match direction {
            Direction::Receive => self.rx.is_some(),
            Direction::Transmit => {
                self.tx.is_some()
                    && (self.tx_eof || !self.tx_cur.is_empty() || !self.tx_queue.is_empty())
            }
        }
    }

    fn shares_fd(&self) -> bool {
        match (&self.tx, &self.rx) {
            (Some(tx), Some(rx)) => Arc::ptr_eq(&tx.fd, &rx.fd),
            _ => false,
        }
    }

    /// Read until the fd would block. Returns true if waiters should be
    /// woken: new records arrived or the direction closed.
    fn service_rx(&mut self) -> bool {
        let mut framed = 0;
        let outcome = loop {
            let Some(rx) = &self.rx else {
                return false;
            };
            match fd::read(rx.fd.as_fd(), &mut self.scratch) {
                Ok(0) => break Ok(true),
                Ok(n) => {
                    framed +=
                        frame_records(&mut self.rx_cur, &self.scratch[..n], &mut self.rx_queue);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break Ok(false),
                Err(err) => break Err(err),
            }
        };

        match outcome {
            Ok(false) => {}
            Ok(true) => {
                if !self.rx_cur.is_empty() {
                    warn!(
                        bytes = self.rx_cur.len(),
                        "discarding unterminated record at end of stream"
                    );
                }
                debug!("receive reached end of stream");
                self.close_rx();
            }
            Err(err) => {
                warn!(error = %err, "receive failed; closing receive direction");
                self.close_rx();
            }
        }
        if framed > 0 {
            trace!(framed, queued = self.rx_queue.len(), "framed records");
        }
        framed > 0 || self.rx.is_none()
    }

    /// Write queued records until the fd would block or the queue drains.
    fn service_tx(&mut self) {
        loop {
            if self.tx.is_none() {
                return;
            }
            if self.tx_cur.is_empty() {
                let Some(next) = self.tx_queue.pop_front() else {
                    if self.tx_eof {
                        debug!("transmit drained after end of stream");
                        self.close_tx();
                    }
                    return;
                };
                self.tx_cur.reserve(next.len() + 1);
                self.tx_cur.put_slice(next.as_bytes());
                self.tx_cur.put_u8(RECORD_DELIMITER);
            }

            let Some(tx) = &self.tx else {
                return;
            };
            let written = fd::write(tx.fd.as_fd(), &self.tx_cur, tx.socket);
            match written {
                Ok(n) if n >= self.tx_cur.len() => self.tx_cur.clear(),
                Ok(n) => {
                    self.tx_cur.advance(n);
                    return;
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => return,
                Err(err) => {
                    warn!(error = %err, "transmit failed; closing transmit direction");
                    self.close_tx();
                    return;
                }
            }
        }
    }

    fn close_rx(&mut self) {
        let shared = self.shares_fd();
        self.rx_cur.clear();
        let Some(rx) = self.rx.take() else {
            return;
        };
        if shared {
            if let Err(err) = fd::shutdown(rx.fd.as_fd(), Shutdown::Read) {
                debug!(error = %err, "receive half-close failed");
            }
        }
        debug!(fd = rx.raw(), shared, "receive closed");
    }

    fn close_tx(&mut self) {
        let shared = self.shares_fd();
        self.tx_eof = true;
        let undelivered = self.tx_queue.len() + usize::from(!self.tx_cur.is_empty());
        self.tx_queue.clear();
        self.tx_cur.clear();
        self.tx_dropped += undelivered;
        let Some(tx) = self.tx.take() else {
            return;
        };
        if shared {
            if let Err(err) = fd::shutdown(tx.fd.as_fd(), Shutdown::Write) {
                debug!(error = %err, "transmit half-close failed");
            }
        }
        if undelivered > 0 {
            warn!(fd = tx.raw(), shared, undelivered, "transmit closed with records unsent");
        } else {
            debug!(fd = tx.raw(), shared, "transmit closed");
        }
    }
}

/// Move every complete line of `carry + chunk` onto `out`, keeping the
/// unterminated tail in `carry`. Blank lines carry no value and are skipped.
pub(crate) fn frame_records(
    carry: &mut BytesMut,
    chunk: &[u8],
    out: &mut VecDeque<Record>,
) -> usize {
    let mut scanned = carry.len();
    carry.extend_from_slice(chunk);
    let mut framed = 0;
    while let Some(offset) = carry[scanned..].iter().position(|&b| b == RECORD_DELIMITER) {
        let mut line = carry.split_to(scanned + offset + 1);
        line.truncate(line.len() - 1);
        scanned = 0;
        if line.is_empty() {
            continue;
        }
        out.push_back(Record::new(line.freeze()));
        framed += 1;
    }
    framed
}

/// A thread-safe, newline-framed duplex transport.
pub struct FramedPipe {
    state: Mutex<PipeState>,
    rx_ready: Condvar,
    config: PipeConfig,
}

impl FramedPipe {
    /// An unconfigured pipe. Records may be queued before endpoints are set.
    pub fn new() -> Self {
        Self::with_config(PipeConfig::default())
    }

    pub fn with_config(config: PipeConfig) -> Self {
        Self {
            state: Mutex::new(PipeState::new(&config)),
            rx_ready: Condvar::new(),
            config,
        }
    }

    /// A pipe transmitting on `tx` and receiving on `rx`.
    pub fn from_fds(tx: OwnedFd, rx: OwnedFd, config: PipeConfig) -> Result<Self> {
        let pipe = Self::with_config(config);
        pipe.set_fds(tx, rx)?;
        Ok(pipe)
    }

    /// A pipe over one duplex descriptor, typically a connected socket.
    pub fn from_duplex(fd: impl Into<OwnedFd>, config: PipeConfig) -> Result<Self> {
        let pipe = Self::with_config(config);
        pipe.set_duplex(fd)?;
        Ok(pipe)
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    /// Attach separate transmit and receive descriptors.
    ///
    /// A pipe is configured at most once; a second call, or a call after
    /// [`close`](Self::close), returns [`PipeError::AlreadyConfigured`].
    /// The descriptors are closed if configuration fails.
    pub fn set_fds(&self, tx: OwnedFd, rx: OwnedFd) -> Result<()> {
        self.install(Arc::new(tx), Arc::new(rx))
    }

    /// Attach one descriptor used for both directions.
    pub fn set_duplex(&self, fd: impl Into<OwnedFd>) -> Result<()> {
        let fd = Arc::new(fd.into());
        self.install(Arc::clone(&fd), fd)
    }

    fn install(&self, tx: Arc<OwnedFd>, rx: Arc<OwnedFd>) -> Result<()> {
        let mut state = self.lock();
        if state.configured {
            return Err(PipeError::AlreadyConfigured);
        }

        let shared = Arc::ptr_eq(&tx, &rx);
        let tx_socket = self.prepare(tx.as_fd())?;
        let rx_socket = if shared {
            tx_socket
        } else {
            self.prepare(rx.as_fd())?
        };

        debug!(
            tx = tx.as_raw_fd(),
            rx = rx.as_raw_fd(),
            shared,
            "pipe configured"
        );
        state.configured = true;
        state.tx = Some(Endpoint {
            fd: tx,
            socket: tx_socket,
        });
        state.rx = Some(Endpoint {
            fd: rx,
            socket: rx_socket,
        });
        if state.tx_eof || !state.tx_queue.is_empty() {
            state.service_tx();
        }
        Ok(())
    }

    /// Make `fd` non-blocking and apply best-effort socket options.
    fn prepare(&self, fd: BorrowedFd<'_>) -> Result<bool> {
        fd::set_nonblocking(fd)?;
        let socket = fd::is_socket(fd)?;
        if socket {
            if self.config.tcp_nodelay {
                if let Err(err) = fd::set_nodelay(fd) {
                    trace!(error = %err, "TCP_NODELAY not applied");
                }
            }
            if let Err(err) = fd::set_nosigpipe(fd) {
                debug!(error = %err, "SO_NOSIGPIPE not applied");
            }
        }
        Ok(socket)
    }

    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `direction` currently needs readiness notifications.
    ///
    /// Receive wants read-readiness while open. Transmit wants
    /// write-readiness only while open with queued data, a partially
    /// written record, or a pending end of stream.
    pub fn wants_readiness(&self, direction: Direction) -> bool {
        self.lock().wants(direction)
    }

    /// Service `direction` after the reactor reported it ready.
    pub fn on_readiness(&self, direction: Direction) {
        let mut state = self.lock();
        match direction {
            Direction::Receive => {
                if state.service_rx() {
                    self.rx_ready.notify_all();
                }
            }
            Direction::Transmit => state.service_tx(),
        }
    }

    /// The descriptors and events to wait on before the next service pass.
    pub fn interest(&self) -> Interest {
        let state = self.lock();
        Interest {
            read: state
                .rx
                .as_ref()
                .filter(|_| state.wants(Direction::Receive))
                .map(Endpoint::raw),
            write: state
                .tx
                .as_ref()
                .filter(|_| state.wants(Direction::Transmit))
                .map(Endpoint::raw),
        }
    }

    /// Queue `value` for transmission.
    ///
    /// Never blocks. If the queue was empty, one transmit pass runs inline.
    /// Fails with [`PipeError::Closed`] once end of stream has been
    /// requested or the transmit direction has closed.
    pub fn tx(&self, value: EncodedValue) -> Result<()> {
        let mut state = self.lock();
        if state.tx_eof {
            return Err(PipeError::Closed(Direction::Transmit));
        }
        state.tx_queue.push_back(value);
        if state.tx_queue.len() == 1 {
            state.service_tx();
        }
        Ok(())
    }

    /// Encode and queue a typed value.
    pub fn send<T: Encodable + ?Sized>(&self, value: &T) -> Result<()> {
        self.tx(encode(value))
    }

    /// Close transmit once everything queued so far has been written.
    pub fn tx_eof(&self) {
        let mut state = self.lock();
        state.tx_eof = true;
        state.service_tx();
    }

    /// The oldest received record, if any.
    pub fn rx_nonblock(&self) -> Option<Record> {
        self.lock().rx_queue.pop_front()
    }

    /// Wait for the next record.
    ///
    /// Returns `None` once the queue is empty and the receive direction is
    /// closed or was never configured.
    pub fn rx_block(&self) -> Option<Record> {
        let mut state = self.lock();
        loop {
            if let Some(record) = state.rx_queue.pop_front() {
                return Some(record);
            }
            if state.rx.is_none() {
                return None;
            }
            state = self
                .rx_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`rx_block`](Self::rx_block), giving up after `timeout`.
    pub fn rx_block_timeout(&self, timeout: Duration) -> Option<Record> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(record) = state.rx_queue.pop_front() {
                return Some(record);
            }
            if state.rx.is_none() {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            state = self
                .rx_ready
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Wait for the next record and decode it.
    pub fn recv<T: Decodable>(&self) -> Option<Result<T>> {
        self.rx_block()
            .map(|record| record.decode().map_err(PipeError::from))
    }

    /// Decode the next record if one is already queued.
    pub fn try_recv<T: Decodable>(&self) -> Option<Result<T>> {
        self.rx_nonblock()
            .map(|record| record.decode().map_err(PipeError::from))
    }

    /// Close both directions now, dropping anything not yet written, and
    /// wake every blocked receiver. Already received records stay queued.
    pub fn close(&self) {
        let mut state = self.lock();
        state.configured = true;
        state.close_rx();
        state.close_tx();
        drop(state);
        self.rx_ready.notify_all();
    }

    /// True once `direction` was configured and has since closed.
    pub fn is_closed(&self, direction: Direction) -> bool {
        let state = self.lock();
        let open = match direction {
            Direction::Transmit => state.tx.is_some(),
            Direction::Receive => state.rx.is_some(),
        };
        state.configured && !open
    }

    /// Records not yet fully written, counting a partially written one.
    pub fn pending_tx(&self) -> usize {
        let state = self.lock();
        state.tx_queue.len() + usize::from(!state.tx_cur.is_empty())
    }

    /// Records discarded unsent because transmit closed early, either on a
    /// write error or through [`close`](Self::close). Zero after a clean
    /// [`tx_eof`](Self::tx_eof) drain.
    pub fn tx_dropped(&self) -> usize {
        self.lock().tx_dropped
    }

    /// Records received and not yet taken.
    pub fn pending_rx(&self) -> usize {
        self.lock().rx_queue.len()
    }
}

impl Default for FramedPipe {
    fn default() -> Self {
        Self::new()
    }
}

impl Pollable for FramedPipe {
    fn pre_wait(&self, set: &mut PollSet) {
        set.add_interest(self.interest());
    }

    fn post_wait(&self, set: &PollSet) {
        let mut state = self.lock();
        let readable = state
            .rx
            .as_ref()
            .is_some_and(|rx| set.is_readable(rx.raw()));
        if readable && state.service_rx() {
            self.rx_ready.notify_all();
        }
        let writable = state.wants(Direction::Transmit)
            && state
                .tx
                .as_ref()
                .is_some_and(|tx| set.is_writable(tx.raw()));
        if writable {
            state.service_tx();
        }
    }
}

impl fmt::Debug for FramedPipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("FramedPipe")
            .field("tx", &state.tx.as_ref().map(Endpoint::raw))
            .field("rx", &state.rx.as_ref().map(Endpoint::raw))
            .field("tx_queue", &state.tx_queue.len())
            .field("rx_queue", &state.rx_queue.len())
            .field("tx_eof", &state.tx_eof)
            .field("tx_dropped", &state.tx_dropped)
            .finish()
    }
}
