pub mod actuators;
pub mod event_logging;
pub mod position_stream;
