pub mod control_system;
pub mod core;
