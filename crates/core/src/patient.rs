//! The patient record, the unit of storage.

use crate::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Patient gender as recorded by the registry.
///
/// Stored on disk and serialised as the single characters `M` and `F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    /// The on-disk byte for this gender.
    pub fn as_byte(self) -> u8 {
        match self {
            Gender::Male => b'M',
            Gender::Female => b'F',
        }
    }

    /// Parses the on-disk byte; only uppercase `M` and `F` are accepted.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'M' => Some(Gender::Male),
            b'F' => Some(Gender::Female),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
        }
    }
}

impl FromStr for Gender {
    type Err = RegistryError;

    /// Accepts `M`/`F` or `male`/`female`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Gender::Male),
            "f" | "female" => Ok(Gender::Female),
            _ => Err(RegistryError::invalid_field(
                "gender",
                format!("must be 'M' or 'F', got {s:?}"),
            )),
        }
    }
}

/// A patient record.
///
/// Fields are plain values so callers can build records freely; every record is validated
/// by the codec before it reaches disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    /// National identifier (CI), the unique key.
    pub id: String,
    pub name: String,
    pub age: u16,
    pub diagnosis: String,
    pub gender: Gender,
    pub disability: bool,
    pub doc_specialty: String,
    /// `YYYY-MM-DD`, or empty when no appointment is scheduled.
    #[serde(default)]
    pub appointment_date: String,
}

impl Patient {
    pub fn is_scheduled(&self) -> bool {
        !self.appointment_date.is_empty()
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CI: {}", self.id)?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Age: {}", self.age)?;
        writeln!(f, "Diagnosis: {}", self.diagnosis)?;
        writeln!(f, "Gender: {}", self.gender)?;
        writeln!(f, "Disability: {}", if self.disability { "yes" } else { "no" })?;
        writeln!(f, "Doctor Specialty: {}", self.doc_specialty)?;
        if self.is_scheduled() {
            write!(f, "Appointment Date: {}", self.appointment_date)
        } else {
            write!(f, "Appointment Date: (none)")
        }
    }
}

/// Parses a yes/no style disability flag as entered by a person.
pub fn parse_disability(input: &str) -> RegistryResult<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "true" => Ok(true),
        "0" | "n" | "no" | "false" => Ok(false),
        _ => Err(RegistryError::invalid_field(
            "disability",
            format!("must be yes or no, got {input:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Patient {
        Patient {
            id: "12345678".into(),
            name: "Alice Johnson".into(),
            age: 34,
            diagnosis: "Hypertension".into(),
            gender: Gender::Female,
            disability: false,
            doc_specialty: "Cardiology".into(),
            appointment_date: "2023-02-15".into(),
        }
    }

    #[test]
    fn test_gender_bytes() {
        assert_eq!(Gender::from_byte(b'M'), Some(Gender::Male));
        assert_eq!(Gender::from_byte(b'F'), Some(Gender::Female));
        assert_eq!(Gender::from_byte(b'm'), None);
        assert_eq!(Gender::Female.as_byte(), b'F');
    }

    #[test]
    fn test_gender_display_and_parse() {
        assert_eq!(Gender::Male.to_string(), "Male");
        assert_eq!("f".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!("Male".parse::<Gender>().unwrap(), Gender::Male);
        assert!("X".parse::<Gender>().is_err());
    }

    #[test]
    fn test_patient_serialises_gender_as_letter() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["gender"], "F");
        assert_eq!(json["appointment_date"], "2023-02-15");
    }

    #[test]
    fn test_appointment_date_defaults_to_unscheduled() {
        let json = r#"{"id":"1","name":"A","age":30,"diagnosis":"D","gender":"M",
            "disability":false,"doc_specialty":"Gen"}"#;
        let patient: Patient = serde_json::from_str(json).unwrap();
        assert!(!patient.is_scheduled());
    }

    #[test]
    fn test_parse_disability() {
        assert!(parse_disability("Yes").unwrap());
        assert!(!parse_disability("0").unwrap());
        assert!(parse_disability("maybe").is_err());
    }
}
