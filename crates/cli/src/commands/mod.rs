//! CLI commands

pub mod auth;
pub mod doctor;
pub mod probe;
pub mod run;
pub mod services;
