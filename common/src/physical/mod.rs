mod angle;

pub use angle::*;
