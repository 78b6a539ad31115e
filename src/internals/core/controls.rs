use std::time::Duration;

use crate::models::location_reading::LocationReading;

/// Per-axis calibration constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Seconds the servo needs to sweep 180 degrees.
    pub secs_per_180: f64,

    /// Image pixels covered by one degree of actuator travel.
    pub pixels_per_degree: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            secs_per_180: 0.5,
            pixels_per_degree: 6.5,
        }
    }
}

impl Calibration {
    pub fn is_valid(&self) -> bool {
        self.secs_per_180.is_finite()
            && self.secs_per_180 >= 0f64
            && self.pixels_per_degree.is_finite()
            && self.pixels_per_degree > 0f64
    }
}

/// Outcome of one pass of the control law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// The reading carried the not-seen sentinel.
    NotSeen,

    /// Target is inside the dead zone, leave the axis alone.
    Centered,

    Move(Adjustment),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    /// Distance in pixels between the target and the image midpoint.
    pub error: f64,

    /// Degrees to move, never less than 1.
    pub step: i32,

    pub from: i32,
    pub to: i32,

    /// How long to wait for the servo to cover `step` degrees.
    pub settle: Duration,
}

/// Proportional control law for one axis.
///
/// A target left of `midpoint - middle_inc` turns the axis by
/// `max(floor(err / pixels_per_degree), 1)` degrees in the positive
/// direction, a target right of `midpoint + middle_inc` in the negative
/// direction. `forward == false` swaps the two for mirrored mounts.
/// Anything inside the dead zone, boundaries included, is `Centered`.
pub fn compute_correction(
    reading: &LocationReading,
    current_angle: i32,
    forward: bool,
    calibration: &Calibration,
) -> Correction {
    if !reading.is_visible() {
        return Correction::NotSeen;
    }

    // Whole-pixel midpoint, rounded down on odd widths.
    let midpoint = i64::from(reading.total).div_euclid(2);
    let position = i64::from(reading.position);
    let middle_inc = i64::from(reading.middle_inc);

    let (error, towards_positive) = if position < midpoint - middle_inc {
        ((midpoint - position) as f64, forward)
    } else if position > midpoint + middle_inc {
        ((position - midpoint) as f64, !forward)
    } else {
        return Correction::Centered;
    };

    let step = step_for_error(error, calibration.pixels_per_degree);
    let to = if towards_positive {
        current_angle.saturating_add(step)
    } else {
        current_angle.saturating_sub(step)
    };
    let delta = to.saturating_sub(current_angle).saturating_abs();

    Correction::Move(Adjustment {
        error,
        step,
        from: current_angle,
        to,
        settle: settle_delay(calibration, delta),
    })
}

/// Degrees to move for a pixel error. Rounds down but never to zero, or
/// the axis would stall just outside the dead zone.
pub fn step_for_error(error: f64, pixels_per_degree: f64) -> i32 {
    ((error / pixels_per_degree).floor() as i32).max(1)
}

/// Time for the servo to travel `delta` degrees.
pub fn settle_delay(calibration: &Calibration, delta: i32) -> Duration {
    let secs = (calibration.secs_per_180 / 180f64) * f64::from(delta.saturating_abs());
    Duration::from_secs_f64(secs.max(0f64))
}
