pub mod buttons;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod frames;
pub mod geometry;
pub mod logger;
pub mod monitor;
pub mod platform;
pub mod routines;
pub mod session;
pub mod settings;
pub mod types;
