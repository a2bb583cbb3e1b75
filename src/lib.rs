//! SHARE provider registration and push service
//!
//! Repository operators register OAI-PMH or manually curated sources through
//! a multi-step wizard; authenticated users push individual metadata records
//! through a small REST API.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod oai;
pub mod push;
pub mod registration;
pub mod security;
pub mod sets;
pub mod store;
pub mod validators;
