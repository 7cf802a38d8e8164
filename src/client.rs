use crate::config::SweepConfig;
use crate::error::BlockError;
use crate::protocol::{CommandSet, RECV_BUFFER_SIZE};
use log::{debug, warn};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// Connection configuration for the bias block TCP endpoint.
///
/// The original control software used bare blocking sockets with no
/// timeouts, so a silent instrument would hang a sweep forever. Here every
/// phase of the connection carries a timeout with conservative defaults.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing the TCP connection
    pub connect_timeout: Duration,
    /// Timeout for reading an instrument reply
    pub read_timeout: Duration,
    /// Timeout for writing a command
    pub write_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Builder for [`Block`] instances.
///
/// # Examples
///
/// ```no_run
/// use block_sweep::Block;
///
/// let block = Block::builder()
///     .host("192.168.1.40")
///     .port(9876)
///     .build()?;
/// # Ok::<(), block_sweep::BlockError>(())
/// ```
#[derive(Default)]
pub struct BlockBuilder {
    host: Option<String>,
    port: Option<u16>,
    device: Option<String>,
    connection: ConnectionConfig,
    sweep: SweepConfig,
}

impl BlockBuilder {
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Device channel selector, `DEV2` by default
    pub fn device(mut self, device: &str) -> Self {
        self.device = Some(device.to_string());
        self
    }

    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.connection = config;
        self
    }

    pub fn sweep_config(mut self, config: SweepConfig) -> Self {
        self.sweep = config;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connection.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.connection.read_timeout = timeout;
        self
    }

    /// Build the Block endpoint. Fails on a missing or unparseable address;
    /// no connection is opened until an operation runs.
    pub fn build(self) -> Result<Block, BlockError> {
        let host = self
            .host
            .ok_or_else(|| BlockError::Config("Host must be specified".to_string()))?;

        let port = self
            .port
            .ok_or_else(|| BlockError::Config("Port must be specified".to_string()))?;

        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| BlockError::InvalidAddress(host.clone()))?;

        let commands = match self.device {
            Some(device) => CommandSet::new(device),
            None => CommandSet::default(),
        };

        Ok(Block {
            addr,
            commands,
            connection: self.connection,
            sweep: self.sweep,
        })
    }
}

/// Endpoint handle for the bias source ("block") of a SIS junction setup.
///
/// `Block` holds the address and tuning but no open socket: one-shot
/// operations open a short-lived connection per command, while sweeps hold a
/// single connection for their whole duration. Every connection is scoped to
/// the call that opened it and closed on all exit paths.
///
/// # Examples
///
/// ```no_run
/// use block_sweep::Block;
///
/// let block = Block::new("192.168.1.40", 9876)?;
/// let raw = block.read_current()?;
/// println!("junction current: {raw}");
/// # Ok::<(), block_sweep::BlockError>(())
/// ```
#[derive(Debug)]
pub struct Block {
    addr: SocketAddr,
    commands: CommandSet,
    connection: ConnectionConfig,
    pub(crate) sweep: SweepConfig,
}

impl Block {
    /// Create an endpoint with default device channel and timeouts.
    pub fn new(host: &str, port: u16) -> Result<Self, BlockError> {
        Self::builder().host(host).port(port).build()
    }

    pub fn builder() -> BlockBuilder {
        BlockBuilder::default()
    }

    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }

    pub(crate) fn connect(&self) -> Result<Session, BlockError> {
        debug!("Connecting to block at {}", self.addr);

        let stream = TcpStream::connect_timeout(&self.addr, self.connection.connect_timeout)
            .map_err(|e| {
                warn!("Failed to connect to {}: {e}", self.addr);
                if e.kind() == std::io::ErrorKind::TimedOut {
                    BlockError::Timeout
                } else {
                    BlockError::Io(e)
                }
            })?;

        stream.set_read_timeout(Some(self.connection.read_timeout))?;
        stream.set_write_timeout(Some(self.connection.write_timeout))?;

        Ok(Session { stream })
    }

    /// Query the measured junction current, returned as raw instrument text.
    ///
    /// One connect/send/recv cycle; no numeric validation is applied.
    pub fn read_current(&self) -> Result<String, BlockError> {
        self.connect()?.query(&self.commands.query_current())
    }

    /// Query the active voltage set-point, returned as raw instrument text.
    pub fn read_voltage(&self) -> Result<String, BlockError> {
        self.connect()?.query(&self.commands.query_voltage())
    }

    /// Command a new voltage set-point. Fire-and-forget: the acknowledgement
    /// is not read.
    pub fn write_voltage(&self, volt: f64) -> Result<(), BlockError> {
        self.connect()?.send(&self.commands.set_voltage(volt))
    }
}

/// One open connection to the instrument.
///
/// The wire protocol has no message delimiter: one command per write, one
/// reply per read into a fixed 1024-byte buffer. Multi-packet replies are
/// not handled; the instrument has never been observed to send any. Known
/// limitation inherited from the original control software.
pub(crate) struct Session {
    stream: TcpStream,
}

impl Session {
    pub(crate) fn send(&mut self, cmd: &str) -> Result<(), BlockError> {
        debug!("-> {cmd}");
        self.stream.write_all(cmd.as_bytes())?;
        Ok(())
    }

    /// Read one reply, best effort, trailing whitespace trimmed.
    pub(crate) fn recv(&mut self) -> Result<String, BlockError> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let n = self.stream.read(&mut buf)?;
        let reply = String::from_utf8_lossy(&buf[..n]).trim_end().to_string();
        debug!("<- {reply}");
        Ok(reply)
    }

    pub(crate) fn query(&mut self, cmd: &str) -> Result<String, BlockError> {
        self.send(cmd)?;
        self.recv()
    }
}
