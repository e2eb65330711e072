//! Fixed-width record codec.
//!
//! Each record occupies exactly [`RECORD_SIZE`] bytes:
//!
//! ```text
//! offset  size  field
//!      0     1  occupied flag (1 = record, 0 = vacant)
//!      1     8  CI
//!      9    25  name
//!     34     2  age (u16, little endian)
//!     36    50  diagnosis
//!     86     1  gender ('M' | 'F')
//!     87     1  disability (0 | 1)
//!     88    50  doctor specialty
//!    138    10  appointment date (YYYY-MM-DD, or all NUL when unscheduled)
//! ```
//!
//! Strings are UTF-8 and NUL padded. Padding must be all NUL; anything else is treated as
//! corruption rather than silently ignored.

use crate::constants::{CI_LEN, DATE_LEN, DIAG_LEN, NAME_LEN, SPEC_LEN};
use crate::patient::{Gender, Patient};
use crate::validation::validate_patient;
use crate::{RegistryError, RegistryResult};

const FLAG_OFFSET: usize = 0;
const CI_OFFSET: usize = FLAG_OFFSET + 1;
const NAME_OFFSET: usize = CI_OFFSET + CI_LEN;
const AGE_OFFSET: usize = NAME_OFFSET + NAME_LEN;
const DIAG_OFFSET: usize = AGE_OFFSET + 2;
const GENDER_OFFSET: usize = DIAG_OFFSET + DIAG_LEN;
const DISABILITY_OFFSET: usize = GENDER_OFFSET + 1;
const SPEC_OFFSET: usize = DISABILITY_OFFSET + 1;
const DATE_OFFSET: usize = SPEC_OFFSET + SPEC_LEN;

/// Size in bytes of one encoded record.
pub const RECORD_SIZE: usize = DATE_OFFSET + DATE_LEN;

const OCCUPIED: u8 = 1;
const VACANT: u8 = 0;

/// Validates a record and encodes it to its fixed-width form.
///
/// # Errors
///
/// Returns `RegistryError::InvalidField` if any field fails validation. Oversized strings
/// are rejected, never truncated.
pub fn encode(patient: &Patient) -> RegistryResult<[u8; RECORD_SIZE]> {
    validate_patient(patient)?;

    let mut out = [0u8; RECORD_SIZE];
    out[FLAG_OFFSET] = OCCUPIED;
    put_str(&mut out, CI_OFFSET, CI_LEN, &patient.id);
    put_str(&mut out, NAME_OFFSET, NAME_LEN, &patient.name);
    out[AGE_OFFSET..AGE_OFFSET + 2].copy_from_slice(&patient.age.to_le_bytes());
    put_str(&mut out, DIAG_OFFSET, DIAG_LEN, &patient.diagnosis);
    out[GENDER_OFFSET] = patient.gender.as_byte();
    out[DISABILITY_OFFSET] = u8::from(patient.disability);
    put_str(&mut out, SPEC_OFFSET, SPEC_LEN, &patient.doc_specialty);
    put_str(&mut out, DATE_OFFSET, DATE_LEN, &patient.appointment_date);
    Ok(out)
}

/// Decodes one fixed-width record.
///
/// # Errors
///
/// Returns `RegistryError::CorruptRecord` if the slice has the wrong length, the slot is
/// vacant, any field cannot be parsed, or the parsed record fails validation.
pub fn decode(bytes: &[u8]) -> RegistryResult<Patient> {
    if bytes.len() != RECORD_SIZE {
        return Err(RegistryError::CorruptRecord(format!(
            "expected {RECORD_SIZE} bytes, got {}",
            bytes.len()
        )));
    }

    match bytes[FLAG_OFFSET] {
        OCCUPIED => {}
        VACANT => return Err(RegistryError::CorruptRecord("slot is vacant".into())),
        other => {
            return Err(RegistryError::CorruptRecord(format!(
                "invalid occupied flag {other:#04x}"
            )))
        }
    }

    let gender = Gender::from_byte(bytes[GENDER_OFFSET]).ok_or_else(|| {
        RegistryError::CorruptRecord(format!(
            "invalid gender byte {:#04x}",
            bytes[GENDER_OFFSET]
        ))
    })?;
    let disability = match bytes[DISABILITY_OFFSET] {
        0 => false,
        1 => true,
        other => {
            return Err(RegistryError::CorruptRecord(format!(
                "invalid disability byte {other:#04x}"
            )))
        }
    };

    let patient = Patient {
        id: get_str(bytes, CI_OFFSET, CI_LEN, "CI")?,
        name: get_str(bytes, NAME_OFFSET, NAME_LEN, "name")?,
        age: u16::from_le_bytes([bytes[AGE_OFFSET], bytes[AGE_OFFSET + 1]]),
        diagnosis: get_str(bytes, DIAG_OFFSET, DIAG_LEN, "diagnosis")?,
        gender,
        disability,
        doc_specialty: get_str(bytes, SPEC_OFFSET, SPEC_LEN, "doctor specialty")?,
        appointment_date: get_str(bytes, DATE_OFFSET, DATE_LEN, "appointment date")?,
    };

    validate_patient(&patient).map_err(|e| RegistryError::CorruptRecord(e.to_string()))?;
    Ok(patient)
}

/// Copies `value` into a zeroed field. Callers validate the width first.
fn put_str(out: &mut [u8], offset: usize, width: usize, value: &str) {
    let bytes = value.as_bytes();
    debug_assert!(bytes.len() <= width);
    out[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn get_str(bytes: &[u8], offset: usize, width: usize, field: &str) -> RegistryResult<String> {
    let raw = &bytes[offset..offset + width];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(width);

    if raw[end..].iter().any(|&b| b != 0) {
        return Err(RegistryError::CorruptRecord(format!(
            "{field} has data after its terminator"
        )));
    }

    String::from_utf8(raw[..end].to_vec())
        .map_err(|_| RegistryError::CorruptRecord(format!("{field} is not valid UTF-8")))
}
