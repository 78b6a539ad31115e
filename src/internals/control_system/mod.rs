pub mod axis;
pub mod gate;
pub mod rig;
