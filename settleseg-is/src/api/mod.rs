//! HTTP API handlers

pub mod health;
pub mod models;
pub mod status;
pub mod upload;
