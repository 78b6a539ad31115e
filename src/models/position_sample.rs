use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// One update from the remote vision process. A newer sample always
/// supersedes the previous one, they are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Whether the tracked line is currently in focus.
    pub in_focus: bool,

    /// Signed pixel offset of the line from the image center.
    pub mid_offset: i32,

    /// Angle of the line in degrees.
    pub degrees: f64,

    /// Pixel column where the line crosses the horizontal middle.
    pub mid_line_cross: i32,

    /// Image width in pixels.
    pub width: i32,

    /// Half-width of the dead zone the vision side is using, in pixels.
    pub middle_inc: i32,
}

impl Display for PositionSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(PositionSample: in_focus={}, mid_offset={}, degrees={:.1}, mid_line_cross={}, width={}, middle_inc={})",
            self.in_focus,
            self.mid_offset,
            self.degrees,
            self.mid_line_cross,
            self.width,
            self.middle_inc
        )
    }
}
