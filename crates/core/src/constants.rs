//! Constants used throughout the registry core crate.
//!
//! Field widths here define the on-disk record layout, so changing one changes the file
//! format.

/// Default number of record slots in the store.
pub const MAX_PATIENTS: usize = 100;

/// Default number of slots in the identifier index.
pub const MAX_INDEX: usize = 1000;

/// Width of the CI field.
pub const CI_LEN: usize = registry_types::NATIONAL_ID_LEN;

/// Width of the name field.
pub const NAME_LEN: usize = 25;

/// Width of the diagnosis field.
pub const DIAG_LEN: usize = 50;

/// Width of the doctor specialty field.
pub const SPEC_LEN: usize = 50;

/// Width of the appointment date field (`YYYY-MM-DD`).
pub const DATE_LEN: usize = registry_types::APPOINTMENT_DATE_LEN;

pub const MIN_AGE: u16 = 1;
pub const MAX_AGE: u16 = 120;

/// Default directory for registry data when none is configured.
pub const DEFAULT_PATIENT_DATA_DIR: &str = "data";

/// Filename of the fixed-width records file.
pub const PATIENTS_FILENAME: &str = "patients.bin";

/// Filename of the identifier index file.
pub const INDEX_FILENAME: &str = "index.dat";
