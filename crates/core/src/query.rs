//! Read-only filters and metrics over the live records.
//!
//! Every filter preserves the original relative order of the records it keeps. An empty
//! result is a normal outcome; only a malformed filter argument is an error.

use crate::constants::{MAX_AGE, SPEC_LEN};
use crate::patient::{Gender, Patient};
use crate::{RegistryError, RegistryResult};
use registry_types::AppointmentDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A listing predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatientFilter {
    /// `disability == true`.
    Disabled,
    /// Exact match on the appointment date (`YYYY-MM-DD`).
    AppointmentDate(String),
    /// Exact match on the doctor specialty.
    Specialty(String),
    Gender(Gender),
    /// `age < limit`.
    UnderAge(u16),
}

impl PatientFilter {
    /// Checks the filter argument's shape.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidArgument` for a date that is not a real `YYYY-MM-DD`
    /// date, a blank or over-wide specialty, or an age limit outside `1..=MAX_AGE + 1`.
    pub fn validate(&self) -> RegistryResult<()> {
        match self {
            PatientFilter::Disabled | PatientFilter::Gender(_) => Ok(()),
            PatientFilter::AppointmentDate(date) => AppointmentDate::parse(date)
                .map(|_| ())
                .map_err(|e| RegistryError::InvalidArgument(format!("appointment date: {e}"))),
            PatientFilter::Specialty(specialty) => {
                if specialty.trim().is_empty() {
                    return Err(RegistryError::InvalidArgument(
                        "specialty cannot be empty".into(),
                    ));
                }
                if specialty.len() > SPEC_LEN {
                    return Err(RegistryError::InvalidArgument(format!(
                        "specialty exceeds {SPEC_LEN} bytes"
                    )));
                }
                Ok(())
            }
            PatientFilter::UnderAge(limit) => {
                let max = MAX_AGE + 1;
                if !(1..=max).contains(limit) {
                    return Err(RegistryError::InvalidArgument(format!(
                        "age limit must be between 1 and {max}, got {limit}"
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn matches(&self, patient: &Patient) -> bool {
        match self {
            PatientFilter::Disabled => patient.disability,
            PatientFilter::AppointmentDate(date) => patient.appointment_date == *date,
            PatientFilter::Specialty(specialty) => patient.doc_specialty == *specialty,
            PatientFilter::Gender(gender) => patient.gender == *gender,
            PatientFilter::UnderAge(limit) => patient.age < *limit,
        }
    }

    /// Validates the filter, then returns the matching records in their original order.
    pub fn apply(&self, patients: &[Patient]) -> RegistryResult<Vec<Patient>> {
        self.validate()?;
        Ok(patients
            .iter()
            .filter(|p| self.matches(p))
            .cloned()
            .collect())
    }
}

impl fmt::Display for PatientFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatientFilter::Disabled => write!(f, "patients with a disability"),
            PatientFilter::AppointmentDate(date) => write!(f, "appointments on {date}"),
            PatientFilter::Specialty(specialty) => write!(f, "specialty {specialty}"),
            PatientFilter::Gender(gender) => write!(f, "{gender} patients"),
            PatientFilter::UnderAge(limit) => write!(f, "patients under {limit}"),
        }
    }
}

/// Aggregate counts over the live records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub total: usize,
    pub disabled: usize,
    pub female: usize,
    pub male: usize,
    pub scheduled: usize,
    pub by_specialty: BTreeMap<String, usize>,
}

pub fn summarize<'a>(patients: impl IntoIterator<Item = &'a Patient>) -> RegistrySummary {
    let mut summary = RegistrySummary::default();
    for patient in patients {
        summary.total += 1;
        if patient.disability {
            summary.disabled += 1;
        }
        match patient.gender {
            Gender::Female => summary.female += 1,
            Gender::Male => summary.male += 1,
        }
        if patient.is_scheduled() {
            summary.scheduled += 1;
        }
        *summary
            .by_specialty
            .entry(patient.doc_specialty.clone())
            .or_default() += 1;
    }
    summary
}

impl fmt::Display for RegistrySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Patients: {}", self.total)?;
        writeln!(f, "With disability: {}", self.disabled)?;
        writeln!(f, "Female: {}", self.female)?;
        writeln!(f, "Male: {}", self.male)?;
        write!(f, "Scheduled appointments: {}", self.scheduled)?;
        for (specialty, count) in &self.by_specialty {
            write!(f, "\n  {specialty}: {count}")?;
        }
        Ok(())
    }
}
