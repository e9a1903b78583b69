//! Thin wrappers over the descriptor syscalls the pipe needs.
//!
//! Every function here takes a borrowed descriptor, so none of them can
//! outlive or close the fd. Reads and writes retry on `EINTR`.

use std::io;
use std::net::Shutdown;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::os::unix::fs::FileTypeExt;

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
const SEND_FLAGS: libc::c_int = 0;

/// Put the descriptor in non-blocking mode.
pub(crate) fn set_nonblocking(fd: BorrowedFd<'_>) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: F_GETFL takes no argument and `raw` is a live descriptor.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK != 0 {
        return Ok(());
    }
    // SAFETY: F_SETFL takes an int flag set and `raw` is a live descriptor.
    let rc = unsafe { libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// True if the descriptor refers to a socket rather than a pipe or file.
pub(crate) fn is_socket(fd: BorrowedFd<'_>) -> io::Result<bool> {
    let file = std::fs::File::from(fd.try_clone_to_owned()?);
    Ok(file.metadata()?.file_type().is_socket())
}

fn set_int_option(
    fd: BorrowedFd<'_>,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> io::Result<()> {
    // SAFETY: the option value points to a live c_int and the length matches it.
    let rc = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            level,
            name,
            (&value as *const libc::c_int).cast(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Disable Nagle's algorithm. Fails on sockets that are not TCP.
pub(crate) fn set_nodelay(fd: BorrowedFd<'_>) -> io::Result<()> {
    set_int_option(fd, libc::IPPROTO_TCP, libc::TCP_NODELAY, 1)
}

/// Suppress `SIGPIPE` for writes on this socket where the platform has a
/// per-socket switch. Elsewhere `send` carries `MSG_NOSIGNAL` instead.
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub(crate) fn set_nosigpipe(fd: BorrowedFd<'_>) -> io::Result<()> {
    set_int_option(fd, libc::SOL_SOCKET, libc::SO_NOSIGPIPE, 1)
}

#[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "freebsd")))]
pub(crate) fn set_nosigpipe(_fd: BorrowedFd<'_>) -> io::Result<()> {
    Ok(())
}

/// One `read(2)`. `Ok(0)` means end of stream.
pub(crate) fn read(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        // SAFETY: `buf` is a valid writable region of `buf.len()` bytes.
        let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// One `send(2)` on sockets, `write(2)` on everything else.
pub(crate) fn write(fd: BorrowedFd<'_>, buf: &[u8], socket: bool) -> io::Result<usize> {
    loop {
        let raw = fd.as_raw_fd();
        // SAFETY: `buf` is a valid readable region of `buf.len()` bytes.
        let n = unsafe {
            if socket {
                libc::send(raw, buf.as_ptr().cast(), buf.len(), SEND_FLAGS)
            } else {
                libc::write(raw, buf.as_ptr().cast(), buf.len())
            }
        };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Half-close one direction of a socket.
pub(crate) fn shutdown(fd: BorrowedFd<'_>, how: Shutdown) -> io::Result<()> {
    let how = match how {
        Shutdown::Read => libc::SHUT_RD,
        Shutdown::Write => libc::SHUT_WR,
        Shutdown::Both => libc::SHUT_RDWR,
    };
    // SAFETY: shutdown takes no pointers and `fd` is a live descriptor.
    let rc = unsafe { libc::shutdown(fd.as_raw_fd(), how) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{ErrorKind, Write};
    use std::os::fd::{AsFd, OwnedFd};
    use std::os::unix::net::UnixStream;

    use super::*;

    fn pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [0; 2];
        // SAFETY: `fds` has room for the two descriptors pipe(2) writes.
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0);
        // SAFETY: both descriptors were just created and are owned by nobody else.
        unsafe {
            use std::os::fd::FromRawFd;
            (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))
        }
    }

    #[test]
    fn nonblocking_read_would_block() {
        let (a, _b) = UnixStream::pair().unwrap();
        set_nonblocking(a.as_fd()).unwrap();
        // Idempotent.
        set_nonblocking(a.as_fd()).unwrap();
        let mut buf = [0u8; 4];
        let err = read(a.as_fd(), &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn detects_sockets_and_pipes() {
        let (a, _b) = UnixStream::pair().unwrap();
        assert!(is_socket(a.as_fd()).unwrap());
        let (r, _w) = pipe();
        assert!(!is_socket(r.as_fd()).unwrap());
    }

    #[test]
    fn nodelay_fails_on_unix_socket() {
        let (a, _b) = UnixStream::pair().unwrap();
        assert!(set_nodelay(a.as_fd()).is_err());
    }

    #[test]
    fn write_and_read_on_pipe() {
        let (r, w) = pipe();
        assert_eq!(write(w.as_fd(), b"abc\n", false).unwrap(), 4);
        let mut buf = [0u8; 8];
        assert_eq!(read(r.as_fd(), &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"abc\n");
        drop(w);
        assert_eq!(read(r.as_fd(), &mut buf).unwrap(), 0);
    }

    #[test]
    fn shutdown_write_gives_peer_eof() {
        let (a, b) = UnixStream::pair().unwrap();
        assert_eq!(write(a.as_fd(), b"x", true).unwrap(), 1);
        shutdown(a.as_fd(), Shutdown::Write).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(read(b.as_fd(), &mut buf).unwrap(), 1);
        assert_eq!(read(b.as_fd(), &mut buf).unwrap(), 0);
        // The other direction still works.
        (&b).write_all(b"y").unwrap();
        assert_eq!(read(a.as_fd(), &mut buf).unwrap(), 1);
    }

    #[test]
    fn send_to_closed_peer_is_an_error_not_a_signal() {
        let (a, b) = UnixStream::pair().unwrap();
        drop(b);
        let err = write(a.as_fd(), b"x", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }
}
