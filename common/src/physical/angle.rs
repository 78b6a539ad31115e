use core::fmt::Display;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Largest angle a hobby servo channel accepts.
pub const MAX_SERVO_DEGREES: u8 = 180;

/// Represents a commanded servo position in whole degrees, 0..=180.
///
/// ```
/// use common::physical::ServoAngle;
/// let angle = ServoAngle::try_from(90i32).expect("Failed to get ServoAngle representation");
/// assert_eq!(angle.degrees(), 90);
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServoAngle {
    degrees: u8,
}

/// Represents errors in creating or using the `ServoAngle` type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AngleError {
    /// The angle was negative or above `MAX_SERVO_DEGREES`.
    #[error("Angle {0} is outside of the servo range!")]
    OutOfRange(i32),
}

impl ServoAngle {
    /// Get the underlying angle in degrees.
    pub fn degrees(&self) -> u8 {
        self.degrees
    }

    /// The centered position of the servo.
    pub fn center() -> Self {
        Self {
            degrees: MAX_SERVO_DEGREES / 2,
        }
    }
}

impl TryFrom<i32> for ServoAngle {
    type Error = AngleError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if value < 0 || value > MAX_SERVO_DEGREES as i32 {
            return Err(AngleError::OutOfRange(value));
        }
        Ok(Self {
            degrees: value as u8,
        })
    }
}

impl From<ServoAngle> for i32 {
    fn from(value: ServoAngle) -> Self {
        value.degrees as i32
    }
}

impl Display for ServoAngle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "<ServoAngle: {} deg>", self.degrees)
    }
}
