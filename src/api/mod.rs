//! API module - REST endpoints

pub mod downloads;
pub mod health;
pub mod settings;
