pub mod adapters;
pub mod client;
pub mod endpoint;
pub mod services;
pub mod wire;
