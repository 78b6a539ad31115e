use std::sync::Arc;

use self::adapters::EmitToLoggingAdapter;

pub mod adapters;

pub struct EventLoggingModule {
    pub motion_event_adapter: Arc<EmitToLoggingAdapter>,
}

impl EventLoggingModule {
    pub fn initialize() -> Self {
        Self {
            motion_event_adapter: Arc::new(EmitToLoggingAdapter {}),
        }
    }
}
