//! Infrastructure layer

pub mod config;
pub mod config_service;
pub mod email;
pub mod email_sender;
