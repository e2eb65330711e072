//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into [`PatientService`].
//! The core never reads environment variables itself; that is the job of the binary.
//!
//! [`PatientService`]: crate::PatientService

use crate::constants::{INDEX_FILENAME, MAX_INDEX, MAX_PATIENTS, PATIENTS_FILENAME};
use crate::{RegistryError, RegistryResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How the service brings memory back in line with disk after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationPolicy {
    /// Persist the change, then reload every record from disk and rebuild the index.
    ReloadAfterWrite,
    /// Stage the store and index change, persist, then swap the staged copies in.
    #[default]
    Incremental,
}

impl FromStr for MutationPolicy {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reload" | "reload-after-write" => Ok(Self::ReloadAfterWrite),
            "incremental" => Ok(Self::Incremental),
            other => Err(RegistryError::InvalidArgument(format!(
                "unknown mutation policy {other:?} (expected \"reload\" or \"incremental\")"
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    patient_data_dir: PathBuf,
    patient_capacity: usize,
    index_capacity: usize,
    mutation_policy: MutationPolicy,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidArgument` if either capacity is zero or the index has
    /// fewer slots than the store.
    pub fn new(
        patient_data_dir: PathBuf,
        patient_capacity: usize,
        index_capacity: usize,
        mutation_policy: MutationPolicy,
    ) -> RegistryResult<Self> {
        if patient_capacity == 0 || index_capacity == 0 {
            return Err(RegistryError::InvalidArgument(
                "store and index capacities must be greater than zero".into(),
            ));
        }
        if index_capacity < patient_capacity {
            return Err(RegistryError::InvalidArgument(format!(
                "index capacity {index_capacity} is smaller than store capacity {patient_capacity}"
            )));
        }

        Ok(Self {
            patient_data_dir,
            patient_capacity,
            index_capacity,
            mutation_policy,
        })
    }

    /// Configuration with the default capacities and mutation policy.
    pub fn with_defaults(patient_data_dir: PathBuf) -> Self {
        Self {
            patient_data_dir,
            patient_capacity: MAX_PATIENTS,
            index_capacity: MAX_INDEX,
            mutation_policy: MutationPolicy::default(),
        }
    }

    pub fn patient_data_dir(&self) -> &Path {
        &self.patient_data_dir
    }

    pub fn records_path(&self) -> PathBuf {
        self.patient_data_dir.join(PATIENTS_FILENAME)
    }

    pub fn index_path(&self) -> PathBuf {
        self.patient_data_dir.join(INDEX_FILENAME)
    }

    pub fn patient_capacity(&self) -> usize {
        self.patient_capacity
    }

    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    pub fn mutation_policy(&self) -> MutationPolicy {
        self.mutation_policy
    }
}
