//! # Registry Core
//!
//! Core business logic for the patient registry.
//!
//! This crate contains pure data operations over two files in the data directory:
//! - `patients.bin`: fixed-width patient records in store order ([`codec`], [`store`])
//! - `index.dat`: the CI → position index ([`index`])
//!
//! [`PatientService`] ties them together and adds the read-only queries in [`query`].
//!
//! **No presentation concerns**: argument parsing, environment handling and output formatting
//! belong in `registry-cli`.

pub mod codec;
pub mod config;
pub mod constants;
mod durable;
pub mod error;
pub mod index;
pub mod patient;
pub mod query;
pub mod service;
pub mod store;
pub mod validation;

pub use config::{CoreConfig, MutationPolicy};
pub use error::{ErrorKind, RegistryError, RegistryResult};
pub use index::{IdentifierIndex, IndexEntry};
pub use patient::{parse_disability, Gender, Patient};
pub use query::{summarize, PatientFilter, RegistrySummary};
pub use service::{PatientService, Ready, Unloaded};
pub use store::RecordStore;

// Re-export the shared value types so callers need only this crate.
pub use registry_types::{AppointmentDate, NationalId, NonEmptyText, TypeError};
