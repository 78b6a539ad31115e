use std::time::Duration;

use thiserror::Error;

use crate::models::{location_reading::LocationReading, motion_event::MotionEvent};

/// Capability set of whatever physically turns an axis. Implementations
/// decide how the angle is reached (PWM, serial firmware, simulation) and
/// must block for `pause` so the next command is issued only once the
/// servo has had time to arrive.
pub trait AngleActuator: Send {
    /// Current angle in degrees. Implementations that cannot know it
    /// return -1.
    fn current_angle(&mut self) -> Result<i32, ActuatorError>;

    fn set_angle(&mut self, angle: i32, pause: Duration) -> Result<(), ActuatorError>;
}

impl<A: AngleActuator + ?Sized> AngleActuator for Box<A> {
    fn current_angle(&mut self) -> Result<i32, ActuatorError> {
        (**self).current_angle()
    }

    fn set_angle(&mut self, angle: i32, pause: Duration) -> Result<(), ActuatorError> {
        (**self).set_angle(angle, pause)
    }
}

#[derive(Error, Debug)]
pub enum ActuatorError {
    /// The requested angle cannot be represented by the hardware.
    #[error("Angle {0} is outside of the actuator range.")]
    OutOfRange(i32),

    #[error("Failed to encode actuator command. Error: {0}")]
    Encode(#[from] postcard::Error),

    #[error("Failed to talk to actuator. Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open actuator port. Error: {0}")]
    Port(#[from] serialport::Error),
}

/// Supplies the newest target location to an axis. Called once per loop
/// iteration and allowed to block until a new reading exists.
pub trait LocationSource: Send {
    fn read_location(&mut self) -> LocationReading;
}

impl<F> LocationSource for F
where
    F: FnMut() -> LocationReading + Send,
{
    fn read_location(&mut self) -> LocationReading {
        self()
    }
}

/// Receives every move an axis makes.
pub trait MotionEventPort: Send + Sync {
    fn emit(&self, event: &MotionEvent);
}
