use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use derive_more::Display;
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Span};

use crate::{
    internals::core::{
        mailbox::PositionMailbox,
        pacing::{pause, LogThrottle},
    },
    models::position_sample::PositionSample,
};

use super::{
    endpoint::Endpoint,
    services::{PositionConnector, PositionService, StreamError},
    wire::{ClientInfo, ServerInfo},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ClientState {
    /// Created, receive loop not started.
    #[display(fmt = "idle")]
    Idle,

    /// Opening a session and registering.
    #[display(fmt = "connecting")]
    Connecting,

    /// Registered and receiving position updates.
    #[display(fmt = "streaming")]
    Streaming,

    /// Terminal, set by `close`.
    #[display(fmt = "closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub endpoint: Endpoint,
    /// Prefix of the identifier sent when registering.
    pub client_name: String,
    /// Wait after a failed connect or register before trying again.
    pub retry_delay: Duration,
}

impl StreamSettings {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            client_name: default_client_name(),
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            info: format!("{} client", self.client_name),
        }
    }
}

/// Host name of this machine, or a fixed name when it cannot be found.
pub fn default_client_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "pan-tilt".to_string())
}

#[derive(Error, Debug)]
pub enum StreamClientError {
    #[error("Position stream client has already been started.")]
    AlreadyStarted,

    #[error("Failed to spawn position stream thread. Error: {0}")]
    Spawn(std::io::Error),

    #[error("Position stream thread panicked.")]
    Panicked,
}

/// Keeps a session with the position server alive for as long as the
/// client is open and hands the newest sample to one reader through a
/// mailbox. Failed attempts are retried after a fixed delay, forever.
pub struct PositionStreamClient {
    shared: Arc<ClientShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

struct ClientShared {
    settings: StreamSettings,
    mailbox: Arc<PositionMailbox>,
    token: CancellationToken,
    state: Mutex<ClientState>,
    attempts: AtomicU64,
    span: Span,
}

impl PositionStreamClient {
    pub fn new(settings: StreamSettings) -> Self {
        let span = info_span!("position_stream", endpoint = %settings.endpoint);
        Self {
            shared: Arc::new(ClientShared {
                settings,
                mailbox: Arc::new(PositionMailbox::new()),
                token: CancellationToken::new(),
                state: Mutex::new(ClientState::Idle),
                attempts: AtomicU64::new(0),
                span,
            }),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the receive loop on its own thread.
    pub fn start<C: PositionConnector>(&self, connector: C) -> Result<(), StreamClientError> {
        let mut handle = self.handle.lock();
        if handle.is_some() || self.shared.token.is_cancelled() {
            return Err(StreamClientError::AlreadyStarted);
        }

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("position-stream".to_string())
            .spawn(move || shared.receive_positions(connector))
            .map_err(StreamClientError::Spawn)?;
        *handle = Some(spawned);
        Ok(())
    }

    /// Block until a sample newer than the last one returned arrives.
    /// Returns `None` once the client is closed.
    pub fn get_latest(&self) -> Option<PositionSample> {
        self.shared.mailbox.consume()
    }

    pub fn mailbox(&self) -> Arc<PositionMailbox> {
        self.shared.mailbox.clone()
    }

    pub fn state(&self) -> ClientState {
        *self.shared.state.lock()
    }

    /// Number of connect attempts made so far.
    pub fn connection_attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.settings.endpoint
    }

    /// Stop reconnecting and release any reader blocked in `get_latest`.
    pub fn close(&self) {
        self.shared.span.in_scope(|| info!("Closing."));
        self.shared.set_state(ClientState::Closed);
        self.shared.token.cancel();
        self.shared.mailbox.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    pub fn join(&self) -> Result<(), StreamClientError> {
        let handle = self.handle.lock().take();
        match handle {
            None => Ok(()),
            Some(handle) => handle.join().map_err(|_| StreamClientError::Panicked),
        }
    }
}

impl ClientShared {
    fn set_state(&self, next: ClientState) {
        let mut state = self.state.lock();
        if *state == ClientState::Closed || *state == next {
            return;
        }
        debug!("State {} -> {}.", *state, next);
        *state = next;
    }

    fn receive_positions<C: PositionConnector>(&self, connector: C) {
        let _entered = self.span.enter();
        info!("Started.");

        let client_info = self.settings.client_info();
        let mut log = ConnectionLog::default();

        while !self.token.is_cancelled() {
            self.set_state(ClientState::Connecting);
            self.attempts.fetch_add(1, Ordering::SeqCst);

            let (mut service, server_info) = match self.open_session(&connector, &client_info) {
                Ok(session) => session,
                Err(e) => {
                    if let Some(suppressed) = log.connect_failed() {
                        error!(
                            "Failed to connect to {} [{}]. {} similar failures not logged.",
                            self.settings.endpoint, e, suppressed
                        );
                    }
                    if !pause(&self.token, self.settings.retry_delay) {
                        break;
                    }
                    continue;
                }
            };

            let loud = match log.connected() {
                Some(suppressed) => {
                    info!(
                        "Connected to position server at {} [{}]. {} empty sessions not logged.",
                        self.settings.endpoint, server_info.info, suppressed
                    );
                    true
                }
                None => {
                    debug!("Connected to position server at {}.", self.settings.endpoint);
                    false
                }
            };

            self.set_state(ClientState::Streaming);
            let received = self.stream_positions(&mut service, loud);
            log.session_ended(received);
        }

        self.set_state(ClientState::Closed);
        warn!("Closed.");
    }

    fn open_session<C: PositionConnector>(
        &self,
        connector: &C,
        client_info: &ClientInfo,
    ) -> Result<(C::Service, ServerInfo), StreamError> {
        let mut service = connector.connect(&self.settings.endpoint)?;
        let server_info = service.register_client(client_info)?;
        service.subscribe(client_info)?;
        Ok((service, server_info))
    }

    /// Publish every update until the session breaks or the client closes.
    /// Returns how many samples the session delivered.
    fn stream_positions<S: PositionService>(&self, service: &mut S, loud: bool) -> u64 {
        let mut received: u64 = 0;
        loop {
            if self.token.is_cancelled() {
                debug!("Cancelled while streaming after {} samples.", received);
                return received;
            }
            match service.next_position() {
                Ok(Some(sample)) => {
                    trace!("Received {}.", sample);
                    self.mailbox.publish(sample);
                    received += 1;
                }
                Ok(None) => trace!("No update within poll timeout."),
                Err(e) if loud => {
                    info!(
                        "Disconnected from position server at {} after {} samples [{}].",
                        self.settings.endpoint, received, e
                    );
                    return received;
                }
                Err(e) => {
                    debug!("Disconnected after {} samples [{}].", received, e);
                    return received;
                }
            }
        }
    }
}

/// Throttles the connection lifecycle lines. Failed connects and sessions
/// that end before delivering a sample are each logged at the 1st, 2nd,
/// 4th, ... occurrence. Both counts start over once a session delivers.
#[derive(Debug, Default)]
struct ConnectionLog {
    failures: LogThrottle,
    empty_sessions: LogThrottle,
}

impl ConnectionLog {
    /// `Some(suppressed)` when this failure should be logged.
    fn connect_failed(&mut self) -> Option<u64> {
        self.failures.record()
    }

    /// `Some(suppressed)` when this connect (and its disconnect) should be
    /// logged.
    fn connected(&mut self) -> Option<u64> {
        self.empty_sessions.record()
    }

    fn session_ended(&mut self, received: u64) {
        if received > 0 {
            self.failures.reset();
            self.empty_sessions.reset();
        }
    }
}

#[cfg(test)]
mod testing {
    use std::{collections::VecDeque, time::Instant};

    use super::*;

    fn sample(mid_line_cross: i32) -> PositionSample {
        PositionSample {
            in_focus: true,
            mid_offset: mid_line_cross - 320,
            degrees: 90f64,
            mid_line_cross,
            width: 640,
            middle_inc: 20,
        }
    }

    fn settings() -> StreamSettings {
        StreamSettings {
            endpoint: Endpoint::new("vision.test", 50051),
            client_name: "bench".to_string(),
            retry_delay: Duration::from_millis(20),
        }
    }

    /// Fails the first `failures` connects, then serves `samples` and ends
    /// the stream.
    struct ScriptedConnector {
        failures: Arc<AtomicU64>,
        samples: Vec<PositionSample>,
        registered: Arc<Mutex<Vec<String>>>,
        attempted_at: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedConnector {
        fn new(failures: u64, samples: Vec<PositionSample>) -> Self {
            Self {
                failures: Arc::new(AtomicU64::new(failures)),
                samples,
                registered: Arc::new(Mutex::new(vec![])),
                attempted_at: Arc::new(Mutex::new(vec![])),
            }
        }
    }

    struct ScriptedService {
        samples: VecDeque<PositionSample>,
        registered: Arc<Mutex<Vec<String>>>,
    }

    impl PositionConnector for ScriptedConnector {
        type Service = ScriptedService;

        fn connect(&self, _endpoint: &Endpoint) -> Result<Self::Service, StreamError> {
            self.attempted_at.lock().push(Instant::now());
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StreamError::Io(std::io::ErrorKind::ConnectionRefused.into()));
            }
            Ok(ScriptedService {
                samples: self.samples.iter().copied().collect(),
                registered: self.registered.clone(),
            })
        }
    }

    impl PositionService for ScriptedService {
        fn register_client(&mut self, client: &ClientInfo) -> Result<ServerInfo, StreamError> {
            self.registered.lock().push(client.info.clone());
            Ok(ServerInfo {
                info: "scripted".to_string(),
            })
        }

        fn subscribe(&mut self, _client: &ClientInfo) -> Result<(), StreamError> {
            Ok(())
        }

        fn next_position(&mut self) -> Result<Option<PositionSample>, StreamError> {
            thread::sleep(Duration::from_millis(2));
            self.samples.pop_front().map(Some).ok_or(StreamError::Ended)
        }
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_retries_until_connected_then_publishes() {
        let connector = ScriptedConnector::new(3, vec![sample(250)]);
        let registered = connector.registered.clone();
        let client = PositionStreamClient::new(settings());
        client.start(connector).expect("Failed to start");

        assert_eq!(client.get_latest(), Some(sample(250)));
        assert!(client.connection_attempts() >= 4);
        assert_eq!(registered.lock().first().cloned(), Some("bench client".to_string()));

        client.close();
        client.join().expect("Client panicked");
        assert_eq!(client.state(), ClientState::Closed);
    }

    #[test]
    fn test_reconnects_after_stream_ends() {
        let connector = ScriptedConnector::new(0, vec![]);
        let registered = connector.registered.clone();
        let client = PositionStreamClient::new(settings());
        client.start(connector).expect("Failed to start");

        assert!(wait_until(Duration::from_secs(5), || registered.lock().len() >= 3));

        client.close();
        client.join().expect("Client panicked");
    }

    #[test]
    fn test_retry_attempts_keep_coming_at_fixed_delay() {
        let connector = ScriptedConnector::new(u64::MAX, vec![]);
        let attempted_at = connector.attempted_at.clone();
        let retry_delay = settings().retry_delay;
        let client = PositionStreamClient::new(settings());
        client.start(connector).expect("Failed to start");

        assert!(wait_until(Duration::from_secs(5), || client.connection_attempts() >= 6));
        assert_eq!(client.state(), ClientState::Connecting);

        client.close();
        client.join().expect("Client panicked");
        assert_eq!(client.state(), ClientState::Closed);

        let attempted_at = attempted_at.lock().clone();
        assert!(attempted_at.len() >= 6);
        for pair in attempted_at.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= retry_delay, "Retried too early: {:?}", gap);
            assert!(
                gap <= retry_delay + Duration::from_millis(250),
                "Retried too late: {:?}",
                gap
            );
        }
    }

    #[test]
    fn test_close_releases_blocked_reader() {
        let client = Arc::new(PositionStreamClient::new(settings()));
        let reader = {
            let client = client.clone();
            thread::spawn(move || client.get_latest())
        };

        thread::sleep(Duration::from_millis(30));
        client.close();

        assert_eq!(reader.join().expect("Reader panicked"), None);
        assert!(matches!(
            client.start(ScriptedConnector::new(0, vec![])),
            Err(StreamClientError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_client_info_uses_client_name() {
        assert_eq!(settings().client_info().info, "bench client");
    }

    #[test]
    fn test_default_client_name_is_machine_host_name() {
        let name = default_client_name();
        assert!(!name.trim().is_empty());

        if let Some(host) = hostname::get().ok().and_then(|host| host.into_string().ok()) {
            if !host.trim().is_empty() {
                assert_eq!(name, host);
            }
        }
    }

    #[test]
    fn test_flapping_server_connects_are_throttled() {
        let mut log = ConnectionLog::default();
        let logged: Vec<(u64, u64)> = (1..=9u64)
            .filter_map(|n| {
                let connected = log.connected().map(|skipped| (n, skipped));
                log.session_ended(0);
                connected
            })
            .collect();
        assert_eq!(logged, vec![(1, 0), (2, 0), (4, 1), (8, 3)]);

        assert_eq!(log.connected(), None);
        log.session_ended(12);
        assert_eq!(log.connected(), Some(0));
    }

    #[test]
    fn test_empty_sessions_do_not_reset_failure_throttle() {
        let mut log = ConnectionLog::default();
        assert_eq!(log.connect_failed(), Some(0));
        log.connected();
        log.session_ended(0);
        assert_eq!(log.connect_failed(), Some(0));
        assert_eq!(log.connect_failed(), None);

        log.connected();
        log.session_ended(1);
        assert_eq!(log.connect_failed(), Some(0));
    }
}
