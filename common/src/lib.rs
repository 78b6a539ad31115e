#![no_std]

pub mod packet;
pub mod physical;
