use parking_lot::Mutex;
use tracing::info;

use crate::{internals::core::ports::MotionEventPort, models::motion_event::MotionEvent};

pub struct EmitToLoggingAdapter;

impl MotionEventPort for EmitToLoggingAdapter {
    fn emit(&self, event: &MotionEvent) {
        info!("Motion event: {}", event);
    }
}

/// Keeps every motion event in memory, in emission order. Sharing one
/// recorder between axes gives the interleaving of their moves.
#[derive(Default)]
pub struct MotionRecorder {
    events: Mutex<Vec<MotionEvent>>,
}

impl MotionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MotionEvent> {
        self.events.lock().clone()
    }

    /// Axis names in emission order.
    pub fn axis_sequence(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|event| event.axis.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl MotionEventPort for MotionRecorder {
    fn emit(&self, event: &MotionEvent) {
        self.events.lock().push(event.clone());
    }
}
