//! Terminal client for the PharmaGuard pharmacogenomic risk service.

pub mod cli;
pub mod config;
pub mod entities;
pub mod error;
pub mod export;
pub mod render;
pub mod session;
pub mod sources;
