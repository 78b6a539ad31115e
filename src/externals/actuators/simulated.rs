use std::{sync::Arc, thread, time::Duration};

use parking_lot::Mutex;
use tracing::debug;

use crate::internals::core::ports::{ActuatorError, AngleActuator};

/// In-memory servo. Clones share the same state so a test or a UI can
/// watch the axis that owns the actuator.
#[derive(Clone)]
pub struct SimulatedActuator {
    state: Arc<Mutex<SimulatedServo>>,
}

struct SimulatedServo {
    angle: i32,
    limits: Option<(i32, i32)>,
    real_time: bool,
    moves: Vec<(i32, Duration)>,
}

impl SimulatedActuator {
    /// Starts at `angle`, unbounded, without sleeping for pauses.
    pub fn new(angle: i32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedServo {
                angle,
                limits: None,
                real_time: false,
                moves: vec![],
            })),
        }
    }

    /// Reject moves outside `min..=max`, like a servo horn hitting its stop.
    pub fn with_limits(self, min: i32, max: i32) -> Self {
        self.state.lock().limits = Some((min, max));
        self
    }

    /// Actually sleep for the settle pause on every move.
    pub fn with_real_time(self, real_time: bool) -> Self {
        self.state.lock().real_time = real_time;
        self
    }

    pub fn angle(&self) -> i32 {
        self.state.lock().angle
    }

    /// Every accepted move as `(angle, pause)`, oldest first.
    pub fn moves(&self) -> Vec<(i32, Duration)> {
        self.state.lock().moves.clone()
    }
}

impl AngleActuator for SimulatedActuator {
    fn current_angle(&mut self) -> Result<i32, ActuatorError> {
        Ok(self.state.lock().angle)
    }

    fn set_angle(&mut self, angle: i32, pause: Duration) -> Result<(), ActuatorError> {
        let real_time = {
            let mut state = self.state.lock();
            if let Some((min, max)) = state.limits {
                if angle < min || angle > max {
                    return Err(ActuatorError::OutOfRange(angle));
                }
            }
            debug!("Simulated servo {} -> {}.", state.angle, angle);
            state.angle = angle;
            state.moves.push((angle, pause));
            state.real_time
        };

        if real_time {
            thread::sleep(pause);
        }
        Ok(())
    }
}
