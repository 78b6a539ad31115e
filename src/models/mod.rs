pub mod location_reading;
pub mod motion_event;
pub mod position_sample;
