use std::fmt::Display;

/// Sentinel used in `position` or `total` when the target is not visible.
pub const NOT_SEEN: i32 = -1;

/// What an axis consumes each iteration: where the target sits along the
/// axis, the extent of the image along that axis, and the dead-zone half-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationReading {
    pub position: i32,
    pub total: i32,
    pub middle_inc: i32,

    /// Identifies the frame this reading was derived from.
    pub id: u64,
}

impl LocationReading {
    pub fn new(position: i32, total: i32, middle_inc: i32, id: u64) -> Self {
        Self {
            position,
            total,
            middle_inc,
            id,
        }
    }

    /// A reading meaning "target not currently visible".
    pub fn not_seen(id: u64) -> Self {
        Self {
            position: NOT_SEEN,
            total: NOT_SEEN,
            middle_inc: 0,
            id,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.position != NOT_SEEN && self.total != NOT_SEEN
    }
}

impl Display for LocationReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.is_visible() {
            return write!(f, "(LocationReading #{}: not seen)", self.id);
        }
        write!(
            f,
            "(LocationReading #{}: position={}, total={}, middle_inc={})",
            self.id, self.position, self.total, self.middle_inc
        )
    }
}
