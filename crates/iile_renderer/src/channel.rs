//! Framed raster channel: a blocking duplex byte stream to the oracle.
//!
//! The stream carries no message boundaries. Floats are IEEE-754 binary32
//! in little-endian order, bytes are raw octets. Reads always flush pending
//! writes first, so the peer has seen every byte before we block on it.

use std::collections::VecDeque;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use iile_core::OracleCommand;
use thiserror::Error;

/// How long a closed oracle gets to exit before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Errors raised by a single channel operation.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("stream ended unexpectedly")]
    UnexpectedEof,

    #[error("channel is closed")]
    Closed,
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Ordered, blocking float/byte primitives over one duplex stream.
///
/// Failures are reported per call; the caller decides what a failure means
/// for the stream as a whole.
pub trait FramedChannel {
    fn write_f32(&mut self, value: f32) -> ChannelResult<()>;
    fn read_f32(&mut self) -> ChannelResult<f32>;
    fn write_byte(&mut self, byte: u8) -> ChannelResult<()>;
    fn read_byte(&mut self) -> ChannelResult<u8>;
    /// Push every written byte to the peer.
    fn flush(&mut self) -> ChannelResult<()>;
}

fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> ChannelResult<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ChannelError::UnexpectedEof,
        _ => ChannelError::Io(e),
    })
}

/// Channel over the stdin/stdout pipes of a long-lived child process.
///
/// The child is owned by the channel: dropping the channel closes its stdin
/// and reaps it.
pub struct ProcessChannel {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
    dirty: bool,
}

impl ProcessChannel {
    /// Spawn `command` with piped stdin/stdout. Stderr is inherited.
    pub fn spawn(command: &OracleCommand) -> ChannelResult<Self> {
        let spawn_err = |source: io::Error| ChannelError::Spawn {
            program: command.program.clone(),
            source,
        };
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_err)?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(spawn_err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "child stdio was not captured",
                )));
            }
        };

        log::info!(
            "Started oracle process {} ({} {})",
            child.id(),
            command.program,
            command.args.join(" ")
        );

        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
            dirty: false,
        })
    }

    /// OS process id of the oracle.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn writer(&mut self) -> ChannelResult<&mut BufWriter<ChildStdin>> {
        self.stdin.as_mut().ok_or(ChannelError::Closed)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> ChannelResult<()> {
        self.writer()?.write_all(bytes)?;
        self.dirty = true;
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> ChannelResult<()> {
        if self.dirty {
            self.flush()?;
        }
        read_exact_or_eof(&mut self.stdout, buf)
    }
}

impl FramedChannel for ProcessChannel {
    fn write_f32(&mut self, value: f32) -> ChannelResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn read_f32(&mut self) -> ChannelResult<f32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    fn write_byte(&mut self, byte: u8) -> ChannelResult<()> {
        self.write_bytes(&[byte])
    }

    fn read_byte(&mut self) -> ChannelResult<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    fn flush(&mut self) -> ChannelResult<()> {
        self.writer()?.flush()?;
        self.dirty = false;
        Ok(())
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        // Closing stdin is the oracle's signal to exit.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.flush();
        }

        let pid = self.child.id();
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    log::debug!("Oracle process {} exited with {}", pid, status);
                    return;
                }
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Failed to poll oracle process {}: {}", pid, e);
                    break;
                }
            }
        }

        log::warn!("Oracle process {} did not exit after stdin closed, killing it", pid);
        let _ = self.child.kill();
        if let Err(e) = self.child.wait() {
            log::warn!("Failed to reap oracle process {}: {}", pid, e);
        }
    }
}

/// In-memory channel: replies come from a preloaded byte queue and every
/// written byte is recorded.
///
/// Lets the protocol run without an external process.
#[derive(Debug, Default, Clone)]
pub struct MemoryChannel {
    reply: VecDeque<u8>,
    sent: Vec<u8>,
    flushes: usize,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel whose peer will answer with `bytes`.
    pub fn with_reply(bytes: impl IntoIterator<Item = u8>) -> Self {
        Self {
            reply: bytes.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Queue a float for the reply stream.
    pub fn push_reply_f32(&mut self, value: f32) {
        self.reply.extend(value.to_le_bytes());
    }

    pub fn push_reply_byte(&mut self, byte: u8) {
        self.reply.push_back(byte);
    }

    /// Bytes still waiting to be read.
    pub fn pending_reply(&self) -> usize {
        self.reply.len()
    }

    /// Every byte written so far.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Written bytes decoded as little-endian floats. Trailing bytes that do
    /// not form a whole float are ignored.
    pub fn sent_f32s(&self) -> Vec<f32> {
        self.sent
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl FramedChannel for MemoryChannel {
    fn write_f32(&mut self, value: f32) -> ChannelResult<()> {
        self.sent.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn read_f32(&mut self) -> ChannelResult<f32> {
        // Like `read_exact`, a short read still consumes what was there.
        let mut buf = [0u8; 4];
        for b in buf.iter_mut() {
            *b = self.reply.pop_front().ok_or(ChannelError::UnexpectedEof)?;
        }
        Ok(f32::from_le_bytes(buf))
    }

    fn write_byte(&mut self, byte: u8) -> ChannelResult<()> {
        self.sent.push(byte);
        Ok(())
    }

    fn read_byte(&mut self) -> ChannelResult<u8> {
        self.reply.pop_front().ok_or(ChannelError::UnexpectedEof)
    }

    fn flush(&mut self) -> ChannelResult<()> {
        self.flushes += 1;
        Ok(())
    }
}
