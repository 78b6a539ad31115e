use std::time::Duration;

use tracing::trace;

use crate::internals::core::ports::{ActuatorError, AngleActuator};

/// Dry-run actuator: knows no angle and never moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActuator;

impl AngleActuator for NoopActuator {
    fn current_angle(&mut self) -> Result<i32, ActuatorError> {
        Ok(-1)
    }

    fn set_angle(&mut self, angle: i32, pause: Duration) -> Result<(), ActuatorError> {
        trace!("Ignoring set_angle({}, {:?}).", angle, pause);
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_noop_reports_unknown_angle() {
        let mut actuator = NoopActuator;
        assert_eq!(actuator.current_angle().expect("Noop failed"), -1);
        actuator
            .set_angle(120, Duration::from_secs(60))
            .expect("Noop failed");
        assert_eq!(actuator.current_angle().expect("Noop failed"), -1);
    }
}
