//! Command implementations for the modfeat CLI

pub mod config;
pub mod extract;
