use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, SweepError};

/// Carriage return, used by the magnet supplies
pub const CR: u8 = b'\r';
/// Line feed, used by the analyzer's raw SCPI socket
pub const LF: u8 = b'\n';

/// Terminator-framed command/response channel over any async byte stream
pub struct LineChannel<T> {
    name: String,
    io: T,
    terminator: u8,
    read_buf: Vec<u8>,
    timeout: Duration,
}

impl<T> LineChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(name: impl Into<String>, io: T, terminator: u8, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            io,
            terminator,
            read_buf: Vec::with_capacity(128),
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Write one command followed by the terminator.
    ///
    /// Replies still pending from an earlier timed-out read are dropped first, so the next
    /// `read_line` answers this command.
    pub async fn send(&mut self, command: &str) -> Result<()> {
        let stale = self.discard_stale().await?;
        if stale > 0 {
            log::debug!(target: "transport", "{}: dropped {} late response(s)", self.name, stale);
        }

        let mut framed = Vec::with_capacity(command.len() + 1);
        framed.extend_from_slice(command.as_bytes());
        framed.push(self.terminator);

        if let Err(e) = self.io.write_all(&framed).await {
            return Err(SweepError::connection(&self.name, e));
        }
        if let Err(e) = self.io.flush().await {
            return Err(SweepError::connection(&self.name, e));
        }
        Ok(())
    }

    /// Read one response without its terminator.
    ///
    /// Returns `Ok(None)` when no complete response arrives within the timeout. End of stream and
    /// I/O failures are connection errors.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let limit = self.timeout;

        let end = match tokio::time::timeout(limit, self.fill_line()).await {
            Ok(result) => result?,
            Err(_) => return Ok(None),
        };

        let line = String::from_utf8_lossy(&self.read_buf[..end])
            .trim_end_matches('\r')
            .to_string();
        self.drop_first(end + 1);

        Ok(Some(line))
    }

    /// Send a command and wait for its response
    pub async fn query(&mut self, command: &str) -> Result<Option<String>> {
        self.send(command).await?;
        self.read_line().await
    }

    pub fn into_inner(self) -> T {
        self.io
    }

    /// Read until the buffer holds a terminator; returns its index
    async fn fill_line(&mut self) -> Result<usize> {
        let mut scanned = 0;

        loop {
            if let Some(index) = self.find_terminator(scanned) {
                return Ok(index);
            }
            scanned = self.read_buf.len();

            let mut chunk = [0u8; 512];
            let read = match self.io.read(&mut chunk).await {
                Ok(0) => {
                    return Err(SweepError::connection(&self.name, "transport closed by peer"));
                }
                Ok(read) => read,
                Err(e) => {
                    self.read_buf.clear();
                    return Err(SweepError::connection(&self.name, e));
                }
            };
            self.read_buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Consume whatever is already readable and clear the buffer; returns the complete lines dropped
    async fn discard_stale(&mut self) -> Result<usize> {
        let mut chunk = [0u8; 512];

        // a zero timeout still polls the read once
        while let Ok(result) = tokio::time::timeout(Duration::ZERO, self.io.read(&mut chunk)).await {
            match result {
                Ok(0) => {
                    return Err(SweepError::connection(&self.name, "transport closed by peer"));
                }
                Ok(read) => self.read_buf.extend_from_slice(&chunk[..read]),
                Err(e) => {
                    self.read_buf.clear();
                    return Err(SweepError::connection(&self.name, e));
                }
            }
        }

        let stale = self.read_buf.iter().filter(|&&b| b == self.terminator).count();
        self.read_buf.clear();
        Ok(stale)
    }

    fn find_terminator(&self, start: usize) -> Option<usize> {
        self.read_buf[start..]
            .iter()
            .position(|&b| b == self.terminator)
            .map(|offset| start + offset)
    }

    /// Drops the first `n` bytes from the read buffer
    fn drop_first(&mut self, n: usize) {
        if n >= self.read_buf.len() {
            self.read_buf.clear();
        } else {
            self.read_buf.drain(..n);
        }
    }
}
