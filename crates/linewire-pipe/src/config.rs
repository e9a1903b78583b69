/// Tuning knobs for a [`FramedPipe`](crate::FramedPipe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeConfig {
    /// Size of each read issued while servicing the receive direction.
    pub read_chunk_size: usize,
    /// Set `TCP_NODELAY` on TCP endpoints. Ignored for other fd kinds.
    pub tcp_nodelay: bool,
}

impl PipeConfig {
    pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    pub fn with_tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: Self::DEFAULT_READ_CHUNK_SIZE,
            tcp_nodelay: true,
        }
    }
}
