//! # dirgate-core
//!
//! Core types and utilities shared by the dirgate directory gateway.
//!
//! This crate provides the error taxonomy, credential types and the environment-driven
//! configuration layer. The directory protocol itself lives in `dirgate-directory`.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and informative status code mapping
//! - [`credentials`] - Service identity and end-user credential types
//! - [`config`] - Serializable, validated directory settings

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod credentials;
pub mod error;

// Re-export commonly used types
pub use config::DirectorySettings;
pub use credentials::{Credential, ServiceIdentity};
pub use error::{Error, Result};
