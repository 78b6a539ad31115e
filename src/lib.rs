pub mod config;
pub mod externals;
pub mod internals;
pub mod models;
