//! Field validation.
//!
//! The core validates every record it persists, independently of whatever checks the
//! presentation layer applies first. Widths are measured in UTF-8 bytes because that is
//! what the fixed-width record layout stores.

use crate::constants::{DIAG_LEN, MAX_AGE, MIN_AGE, NAME_LEN, SPEC_LEN};
use crate::patient::Patient;
use crate::{RegistryError, RegistryResult};
use registry_types::{AppointmentDate, NationalId, NonEmptyText, TypeError};

/// Validates a CI and returns it in its typed form.
pub fn validate_id(id: &str) -> RegistryResult<NationalId> {
    NationalId::parse(id).map_err(|e| {
        let reason = match e {
            TypeError::Empty => "CI cannot be empty".to_string(),
            other => other.to_string(),
        };
        RegistryError::invalid_field("CI", reason)
    })
}

/// Validates a required text field against its storage width.
pub fn validate_text(field: &'static str, value: &str, max_len: usize) -> RegistryResult<()> {
    if NonEmptyText::new(value).is_err() {
        return Err(RegistryError::invalid_field(field, "cannot be empty"));
    }
    // NUL is the field padding byte; it cannot appear inside a value.
    if value.contains('\0') {
        return Err(RegistryError::invalid_field(
            field,
            "cannot contain NUL characters",
        ));
    }
    if value.len() > max_len {
        return Err(RegistryError::invalid_field(
            field,
            format!("exceeds {max_len} bytes ({} given)", value.len()),
        ));
    }
    Ok(())
}

pub fn validate_age(age: u16) -> RegistryResult<()> {
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(RegistryError::invalid_field(
            "age",
            format!("must be between {MIN_AGE} and {MAX_AGE}, got {age}"),
        ));
    }
    Ok(())
}

/// Validates a stored appointment date; the empty string means unscheduled.
pub fn validate_appointment_date(date: &str) -> RegistryResult<()> {
    if date.is_empty() {
        return Ok(());
    }
    AppointmentDate::parse(date)
        .map(|_| ())
        .map_err(|e| RegistryError::invalid_field("appointment date", e.to_string()))
}

/// Validates every field of a record.
///
/// # Errors
///
/// Returns `RegistryError::InvalidField` naming the first field that fails.
pub fn validate_patient(patient: &Patient) -> RegistryResult<()> {
    validate_id(&patient.id)?;
    validate_text("name", &patient.name, NAME_LEN)?;
    validate_age(patient.age)?;
    validate_text("diagnosis", &patient.diagnosis, DIAG_LEN)?;
    validate_text("doctor specialty", &patient.doc_specialty, SPEC_LEN)?;
    validate_appointment_date(&patient.appointment_date)
}
