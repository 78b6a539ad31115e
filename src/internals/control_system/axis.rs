use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Span};

use crate::{
    internals::core::{
        controls::{compute_correction, Calibration, Correction},
        pacing::pause,
        ports::{ActuatorError, AngleActuator, LocationSource, MotionEventPort},
    },
    models::motion_event::MotionEvent,
};

use super::gate::{wait_for_turn, PeerGate, ReadySignal, TurnGuard, TurnWait};

/// Everything an axis needs besides its actuator and location source.
#[derive(Debug, Clone)]
pub struct AxisSettings {
    pub name: String,
    /// Wait for the peer's hand-over before every iteration.
    pub alternate: bool,
    pub calibration: Calibration,
    /// Pause between iterations.
    pub loop_interval: Duration,
    /// How long a turn wait may last before a stall is reported.
    pub stall_warning: Duration,
}

impl AxisSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alternate: false,
            calibration: Calibration::default(),
            loop_interval: Duration::from_millis(100),
            stall_warning: Duration::from_secs(5),
        }
    }
}

#[derive(Error, Debug)]
pub enum AxisError {
    #[error("Axis '{0}' has invalid calibration {1:?}.")]
    InvalidCalibration(String, Calibration),

    #[error("Axis '{0}' has already been started.")]
    AlreadyStarted(String),

    #[error("Failed to spawn thread for axis '{0}'. Error: {1}")]
    Spawn(String, std::io::Error),

    #[error("Axis '{0}' thread panicked.")]
    Panicked(String),

    #[error("Alternation needs both axes alternating, '{0}' is not.")]
    MismatchedAlternation(String),

    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

/// Owns one axis: pulls the newest location, runs the control law and
/// drives the actuator, optionally taking turns with a peer axis.
pub struct AxisController {
    inner: Arc<AxisInner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

struct AxisInner {
    settings: AxisSettings,
    token: CancellationToken,
    ready: Arc<ReadySignal>,
    actuator: Mutex<Box<dyn AngleActuator>>,
    event_ports: Vec<Arc<dyn MotionEventPort>>,
    span: Span,
}

impl AxisController {
    pub fn new(
        settings: AxisSettings,
        actuator: impl AngleActuator + 'static,
        event_ports: Vec<Arc<dyn MotionEventPort>>,
    ) -> Result<Self, AxisError> {
        if !settings.calibration.is_valid() {
            return Err(AxisError::InvalidCalibration(
                settings.name,
                settings.calibration,
            ));
        }

        let span = info_span!("axis", axis = %settings.name);
        span.in_scope(|| {
            info!(
                "Created axis. alternate={} secs_per_180={} pixels_per_degree={}",
                settings.alternate,
                settings.calibration.secs_per_180,
                settings.calibration.pixels_per_degree
            )
        });

        Ok(Self {
            inner: Arc::new(AxisInner {
                settings,
                token: CancellationToken::new(),
                ready: Arc::new(ReadySignal::new()),
                actuator: Mutex::new(Box::new(actuator)),
                event_ports,
                span,
            }),
            handle: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.settings.name
    }

    pub fn is_alternating(&self) -> bool {
        self.inner.settings.alternate
    }

    /// Handle a peer uses to give this axis its turn.
    pub fn gate(&self) -> PeerGate {
        PeerGate::new(self.inner.ready.clone())
    }

    /// Run the control loop on the calling thread until `stop` is called.
    pub fn run<S: LocationSource>(&self, forward: bool, mut source: S, peer: Option<PeerGate>) {
        self.inner.run(forward, &mut source, peer.as_ref());
    }

    /// Run the control loop on a dedicated thread named after the axis.
    pub fn start<S: LocationSource + 'static>(
        &self,
        forward: bool,
        mut source: S,
        peer: Option<PeerGate>,
    ) -> Result<(), AxisError> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Err(AxisError::AlreadyStarted(self.name().to_string()));
        }

        let inner = self.inner.clone();
        let spawned = thread::Builder::new()
            .name(format!("axis-{}", self.name()))
            .spawn(move || inner.run(forward, &mut source, peer.as_ref()))
            .map_err(|e| AxisError::Spawn(self.name().to_string(), e))?;
        *handle = Some(spawned);
        Ok(())
    }

    /// Ask the loop to finish. Observed at the next iteration boundary or
    /// while waiting for a turn; a blocked location source must be released
    /// by its owner.
    pub fn stop(&self) {
        self.inner
            .span
            .in_scope(|| info!("Stopping axis."));
        self.inner.token.cancel();
        self.inner.ready.wake();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Wait for the thread spawned by `start`. Returns immediately if the
    /// axis was never started.
    pub fn join(&self) -> Result<(), AxisError> {
        let handle = self.handle.lock().take();
        match handle {
            None => Ok(()),
            Some(handle) => handle
                .join()
                .map_err(|_| AxisError::Panicked(self.name().to_string())),
        }
    }

    pub fn current_angle(&self) -> Result<i32, ActuatorError> {
        self.inner.actuator.lock().current_angle()
    }
}

impl AxisInner {
    fn run(&self, forward: bool, source: &mut dyn LocationSource, peer: Option<&PeerGate>) {
        let _entered = self.span.enter();
        info!("Started. forward={}", forward);

        let settings = &self.settings;
        if settings.alternate && peer.is_none() {
            warn!("Alternating without a peer, turns must be released externally.");
        }

        while !self.token.is_cancelled() {
            if settings.alternate {
                let waited = wait_for_turn(
                    &self.ready,
                    &self.token,
                    settings.loop_interval,
                    settings.stall_warning,
                );
                if waited == TurnWait::Cancelled {
                    break;
                }
            }

            {
                let _turn = TurnGuard::new(settings.alternate, peer);
                if let Err(e) = self.step(forward, source) {
                    error!("Control step failed. Error: {}", e);
                }
            }

            if !pause(&self.token, settings.loop_interval) {
                break;
            }
        }

        warn!("Stopped.");
    }

    /// One pass of the control law: read, compute, move.
    fn step(
        &self,
        forward: bool,
        source: &mut dyn LocationSource,
    ) -> Result<Correction, AxisError> {
        let reading = source.read_location();
        if !reading.is_visible() {
            info!("No target seen.");
            return Ok(Correction::NotSeen);
        }

        let mut actuator = self.actuator.lock();
        let current_angle = actuator.current_angle()?;
        let correction =
            compute_correction(&reading, current_angle, forward, &self.settings.calibration);

        match &correction {
            Correction::Move(adjustment) => {
                debug!(
                    "Off by {} pixels, going from {} to {} (step {}).",
                    adjustment.error, adjustment.from, adjustment.to, adjustment.step
                );
                actuator.set_angle(adjustment.to, adjustment.settle)?;
                drop(actuator);

                let event = MotionEvent {
                    axis: self.settings.name.clone(),
                    reading_id: reading.id,
                    from: adjustment.from,
                    to: adjustment.to,
                    settle: adjustment.settle,
                };
                for port in self.event_ports.iter() {
                    port.emit(&event);
                }
            }
            _ => trace!("Target centered at {}.", reading),
        }

        Ok(correction)
    }
}
