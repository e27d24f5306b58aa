#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module below
mod fmt;

pub mod config;
pub mod control;
pub mod converter;
pub mod cycle;
pub mod dc_link;

pub use config::ConfigError;
pub use converter::{ControlMode, ControlSnapshot, GridRelay, Measurements, PwmLegs};
