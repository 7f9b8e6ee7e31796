//! Bulk provisioning of MySQL databases, service accounts and least-privilege grants
//! from a project manifest.
//!
//! Data flows manifest rows → [`identifier`] validation → [`batch`] builder (using
//! [`rbac`] and [`gen`]) → [`engine`] (live or dry-run) → [`artifact`] writer, with every
//! outcome recorded by the [`audit`] log. [`apply`] wires the stages together.

pub mod apply;
pub mod artifact;
pub mod audit;
pub mod batch;
pub mod cli;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod gen;
pub mod identifier;
pub mod manifest;
pub mod rbac;
pub mod validate;
