pub mod config;
pub mod notify;
pub mod score;
pub mod session;
pub mod task;
pub mod trigger;
