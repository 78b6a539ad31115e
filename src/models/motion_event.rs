use std::{fmt::Display, time::Duration};

/// Emitted by an axis after every actuator move.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionEvent {
    pub axis: String,
    pub reading_id: u64,
    pub from: i32,
    pub to: i32,
    pub settle: Duration,
}

impl MotionEvent {
    /// Signed change in angle.
    pub fn delta(&self) -> i32 {
        self.to.saturating_sub(self.from)
    }
}

impl Display for MotionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Motion Event | axis:{}, from:{}, to:{} ({:+}), settle:{:?}, reading:{}>",
            self.axis,
            self.from,
            self.to,
            self.delta(),
            self.settle,
            self.reading_id
        )
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    fn event(from: i32, to: i32) -> MotionEvent {
        MotionEvent {
            axis: "tilt".to_string(),
            reading_id: 4,
            from,
            to,
            settle: Duration::from_millis(25),
        }
    }

    #[test]
    fn test_display_shows_signed_delta() {
        assert_eq!(
            event(90, 81).to_string(),
            "<Motion Event | axis:tilt, from:90, to:81 (-9), settle:25ms, reading:4>"
        );
    }

    #[test]
    fn test_delta_saturates() {
        assert_eq!(event(-5, i32::MAX).delta(), i32::MAX);
    }
}
