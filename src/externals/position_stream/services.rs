use std::{
    io::{self, BufReader},
    net::TcpStream,
    time::Duration,
};

use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use crate::models::position_sample::PositionSample;

use super::{
    endpoint::Endpoint,
    wire::{read_frame, write_frame, ClientInfo, Frame, ServerInfo, WireError},
};

/// One session with the position server.
pub trait PositionService: Send {
    /// Announce this client; the server answers with its own identity.
    fn register_client(&mut self, client: &ClientInfo) -> Result<ServerInfo, StreamError>;

    /// Ask for the position stream keyed by `client`.
    fn subscribe(&mut self, client: &ClientInfo) -> Result<(), StreamError>;

    /// Next position update. `Ok(None)` means nothing arrived within the
    /// poll timeout and the session is still alive.
    fn next_position(&mut self) -> Result<Option<PositionSample>, StreamError>;
}

/// Opens sessions. The client calls this again after every failure.
pub trait PositionConnector: Send + 'static {
    type Service: PositionService;

    fn connect(&self, endpoint: &Endpoint) -> Result<Self::Service, StreamError>;
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Could not resolve '{0}' to any address.")]
    Resolve(String),

    #[error("Connection failed. Error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("Server closed the stream.")]
    Ended,

    #[error("Unexpected frame from server: {0}")]
    Unexpected(String),
}

/// Connects to the position server over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub connect_timeout: Duration,
    /// How long to wait for the `Registered` answer.
    pub register_timeout: Duration,
    /// Read timeout while streaming. Bounds how long a close request can
    /// go unnoticed.
    pub poll_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            register_timeout: Duration::from_secs(5),
            poll_timeout: Duration::from_millis(250),
        }
    }
}

impl PositionConnector for TcpConnector {
    type Service = TcpPositionService;

    #[instrument(skip_all, fields(endpoint = %endpoint))]
    fn connect(&self, endpoint: &Endpoint) -> Result<Self::Service, StreamError> {
        let addresses = endpoint.resolve()?;
        trace!("Resolved {} addresses.", addresses.len());

        let mut last_error = None;
        for address in addresses {
            match TcpStream::connect_timeout(&address, self.connect_timeout) {
                Ok(stream) => {
                    debug!("Connected to {}.", address);
                    stream.set_nodelay(true)?;
                    let writer = stream.try_clone()?;
                    return Ok(TcpPositionService {
                        reader: BufReader::new(stream),
                        writer,
                        buffer: vec![],
                        register_timeout: self.register_timeout,
                        poll_timeout: self.poll_timeout,
                    });
                }
                Err(e) => {
                    debug!("Failed to connect to {}. Error: {}", address, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e.into()),
            None => Err(StreamError::Resolve(endpoint.to_string())),
        }
    }
}

pub struct TcpPositionService {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    buffer: Vec<u8>,
    register_timeout: Duration,
    poll_timeout: Duration,
}

impl TcpPositionService {
    fn set_read_timeout(&self, timeout: Duration) -> Result<(), StreamError> {
        self.reader.get_ref().set_read_timeout(Some(timeout))?;
        Ok(())
    }
}

impl PositionService for TcpPositionService {
    fn register_client(&mut self, client: &ClientInfo) -> Result<ServerInfo, StreamError> {
        self.set_read_timeout(self.register_timeout)?;
        write_frame(&mut self.writer, &Frame::RegisterClient(client.clone()))?;

        match read_frame(&mut self.reader, &mut self.buffer)? {
            Some(Frame::Registered(server)) => Ok(server),
            Some(other) => Err(StreamError::Unexpected(format!("{:?}", other))),
            None => Err(StreamError::Ended),
        }
    }

    fn subscribe(&mut self, client: &ClientInfo) -> Result<(), StreamError> {
        write_frame(&mut self.writer, &Frame::Subscribe(client.clone()))?;
        self.set_read_timeout(self.poll_timeout)
    }

    fn next_position(&mut self) -> Result<Option<PositionSample>, StreamError> {
        match read_frame(&mut self.reader, &mut self.buffer) {
            Ok(Some(Frame::Position(sample))) => Ok(Some(sample)),
            Ok(Some(other)) => {
                warn!("Ignoring unexpected frame while streaming: {:?}", other);
                Ok(None)
            }
            Ok(None) => Err(StreamError::Ended),
            Err(e) if e.is_timeout() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
