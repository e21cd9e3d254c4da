//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Run entity lifecycle hooks around host record persistence.

pub mod attribute_service;
pub mod entity_service;
pub mod set_service;
