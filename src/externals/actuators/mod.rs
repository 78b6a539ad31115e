pub mod noop;
pub mod serial;
pub mod simulated;
