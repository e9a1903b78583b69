//! Connection setup: Unix domain sockets and TCP.
//!
//! Every accepted or connected stream comes back as a configured
//! [`FramedPipe`] over the duplex socket.

use std::net::TcpStream;
use std::os::fd::AsRawFd;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::PipeConfig;
use crate::error::{PipeError, Result};
use crate::pipe::FramedPipe;
use crate::reactor::PollSet;

/// A listening filesystem-path Unix domain socket.
///
/// The socket file is removed on drop, unless something else has replaced
/// it in the meantime.
pub struct UnixEndpoint {
    listener: UnixListener,
    path: PathBuf,
    created_inode: (u64, u64),
}

impl UnixEndpoint {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// `sockaddr_un.sun_path` is 108 bytes on Linux, 104 on macOS and the BSDs.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen at `path`.
    ///
    /// A stale socket file at `path` is removed first. Any other kind of
    /// file there is left alone and binding fails.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(PipeError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_error = |source| PipeError::Bind {
            path: path.clone(),
            source,
        };

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_error(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_error)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_error)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .map_err(bind_error)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_error)?;

        info!(?path, "listening on unix domain socket");
        Ok(Self {
            listener,
            path,
            created_inode: (created.dev(), created.ino()),
        })
    }

    /// Accept one connection, blocking until it arrives.
    pub fn accept(&self, config: PipeConfig) -> Result<FramedPipe> {
        let (stream, _addr) = self.listener.accept().map_err(PipeError::Accept)?;
        debug!(path = ?self.path, "accepted connection");
        FramedPipe::from_duplex(stream, config)
    }

    /// Accept one connection, or return `Ok(None)` if none arrives within
    /// `timeout`.
    pub fn accept_timeout(
        &self,
        config: PipeConfig,
        timeout: Duration,
    ) -> Result<Option<FramedPipe>> {
        let mut set = PollSet::new();
        set.add_read(self.listener.as_raw_fd());
        set.wait(Some(timeout)).map_err(PipeError::Accept)?;
        if !set.is_readable(self.listener.as_raw_fd()) {
            return Ok(None);
        }
        self.accept(config).map(Some)
    }

    /// Connect to a listening socket at `path`.
    pub fn connect(path: impl AsRef<Path>, config: PipeConfig) -> Result<FramedPipe> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| PipeError::Connect {
            target: path.display().to_string(),
            source,
        })?;
        debug!(?path, "connected to unix domain socket");
        FramedPipe::from_duplex(stream, config)
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixEndpoint {
    fn drop(&mut self) {
        let Ok(metadata) = std::fs::symlink_metadata(&self.path) else {
            return;
        };
        let (dev, ino) = self.created_inode;
        if metadata.file_type().is_socket() && metadata.dev() == dev && metadata.ino() == ino {
            debug!(path = ?self.path, "cleaning up socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
        }
    }
}

/// Connect to `addr` (`host:port`) over TCP.
///
/// `TCP_NODELAY` follows `config.tcp_nodelay`.
pub fn connect_tcp(addr: &str, config: PipeConfig) -> Result<FramedPipe> {
    let stream = TcpStream::connect(addr).map_err(|source| PipeError::Connect {
        target: addr.to_string(),
        source,
    })?;
    stream.set_nodelay(config.tcp_nodelay)?;
    debug!(addr, "connected over tcp");
    FramedPipe::from_duplex(stream, config)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("linewire-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn bind_accept_connect() {
        let dir = temp_dir("endpoint");
        let sock_path = dir.join("test.sock");

        let endpoint = UnixEndpoint::bind(&sock_path).unwrap();
        assert!(sock_path.exists());

        let client_path = sock_path.clone();
        let client = thread::spawn(move || {
            let pipe = UnixEndpoint::connect(&client_path, PipeConfig::default()).unwrap();
            pipe.send("hello").unwrap();
            pipe.tx_eof();
        });

        let server = endpoint.accept(PipeConfig::default()).unwrap();
        client.join().unwrap();
        while !server.is_closed(crate::Direction::Receive) {
            crate::poll_once(&[&server], Some(Duration::from_millis(50))).unwrap();
        }
        assert_eq!(server.recv::<String>().unwrap().unwrap(), "hello");
        assert!(server.recv::<String>().is_none());

        drop(endpoint);
        assert!(!sock_path.exists(), "socket file should be cleaned up on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn accept_timeout_without_clients() {
        let dir = temp_dir("accept-timeout");
        let endpoint = UnixEndpoint::bind(dir.join("idle.sock")).unwrap();
        let accepted = endpoint
            .accept_timeout(PipeConfig::default(), Duration::from_millis(20))
            .unwrap();
        assert!(accepted.is_none());
        drop(endpoint);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = UnixEndpoint::bind(&long_path);
        assert!(matches!(result, Err(PipeError::PathTooLong { .. })));
    }

    #[test]
    fn default_permissions_are_owner_only() {
        let dir = temp_dir("perms");
        let sock_path = dir.join("perm.sock");

        let endpoint = UnixEndpoint::bind(&sock_path).unwrap();
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        drop(endpoint);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn stale_socket_is_replaced() {
        let dir = temp_dir("stale");
        let sock_path = dir.join("stale.sock");
        let first = UnixListener::bind(&sock_path).unwrap();
        drop(first);
        assert!(sock_path.exists());

        let endpoint = UnixEndpoint::bind(&sock_path).unwrap();
        assert_eq!(endpoint.path(), sock_path.as_path());
        drop(endpoint);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bind_rejects_existing_non_socket_file() {
        let dir = temp_dir("bind-file");
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = UnixEndpoint::bind(&sock_path);
        assert!(matches!(result, Err(PipeError::Bind { .. })));
        assert!(sock_path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn drop_does_not_remove_replaced_path() {
        let dir = temp_dir("drop-race");
        let sock_path = dir.join("drop.sock");

        let endpoint = UnixEndpoint::bind(&sock_path).unwrap();
        std::fs::remove_file(&sock_path).unwrap();
        std::fs::write(&sock_path, b"replacement-file").unwrap();

        drop(endpoint);
        assert!(
            sock_path.exists(),
            "drop must not remove path if inode identity changed"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn connect_missing_socket_fails() {
        let dir = temp_dir("connect-missing");
        let result = UnixEndpoint::connect(dir.join("absent.sock"), PipeConfig::default());
        assert!(matches!(result, Err(PipeError::Connect { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tcp_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let pipe = FramedPipe::from_duplex(stream, PipeConfig::default()).unwrap();
            while !pipe.is_closed(crate::Direction::Receive) {
                crate::poll_once(&[&pipe], Some(Duration::from_millis(50))).unwrap();
            }
            let mut values = Vec::new();
            while let Some(value) = pipe.try_recv::<u64>() {
                values.push(value.unwrap());
            }
            values
        });

        let client = connect_tcp(&addr, PipeConfig::default()).unwrap();
        client.send(&1u64).unwrap();
        client.send(&2u64).unwrap();
        client.tx_eof();
        while !client.is_closed(crate::Direction::Transmit) {
            crate::poll_once(&[&client], Some(Duration::from_millis(50))).unwrap();
        }
        assert_eq!(server.join().unwrap(), vec![1, 2]);
    }
}
