pub mod controls;
pub mod mailbox;
pub mod pacing;
pub mod ports;
