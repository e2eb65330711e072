//! Bounded, positional record store backed by the fixed-width records file.
//!
//! The store keeps its records in slot order with an explicit length; positions
//! `0..len()` are live and nothing past `len()` is ever observable. The capacity is a hard
//! limit enforced on append and on load.

use crate::codec::{self, RECORD_SIZE};
use crate::durable::write_atomically;
use crate::patient::Patient;
use crate::{RegistryError, RegistryResult};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStore {
    path: PathBuf,
    capacity: usize,
    records: Vec<Patient>,
}

impl RecordStore {
    /// Creates an empty store bound to the records file at `path`.
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
            records: Vec::with_capacity(capacity),
        }
    }

    /// Replaces the store's contents with the records persisted on disk.
    ///
    /// The record count is derived from the file length. A missing file is zero records.
    /// On error the in-memory contents are left as they were.
    ///
    /// # Errors
    ///
    /// - `Io` if the file exists but cannot be read,
    /// - `CorruptRecord` if the file length is not a whole number of records or any record
    ///   fails to decode,
    /// - `CapacityExceeded` if the file holds more records than the store can.
    pub fn load(&mut self) -> RegistryResult<usize> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                tracing::debug!("no records file at {}; starting empty", self.path.display());
                self.records.clear();
                return Ok(0);
            }
            Err(e) => return Err(RegistryError::io(&self.path, e)),
        };

        if bytes.len() % RECORD_SIZE != 0 {
            return Err(RegistryError::CorruptRecord(format!(
                "{} is {} bytes, not a multiple of the {RECORD_SIZE}-byte record size",
                self.path.display(),
                bytes.len()
            )));
        }

        let count = bytes.len() / RECORD_SIZE;
        if count > self.capacity {
            return Err(RegistryError::CapacityExceeded {
                what: "record store",
                capacity: self.capacity,
            });
        }

        let records = bytes
            .chunks_exact(RECORD_SIZE)
            .enumerate()
            .map(|(slot, chunk)| {
                codec::decode(chunk).map_err(|e| {
                    let detail = match e {
                        RegistryError::CorruptRecord(detail) => detail,
                        other => other.to_string(),
                    };
                    RegistryError::CorruptRecord(format!(
                        "{} slot {slot}: {detail}",
                        self.path.display()
                    ))
                })
            })
            .collect::<RegistryResult<Vec<_>>>()?;

        tracing::debug!("loaded {count} records from {}", self.path.display());
        self.records = records;
        Ok(count)
    }

    /// Writes the live records to disk in slot order, replacing the file in full.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` if a record fails validation (nothing is written), or `Io` if
    /// the file cannot be replaced.
    pub fn save(&self) -> RegistryResult<()> {
        let mut buf = Vec::with_capacity(self.records.len() * RECORD_SIZE);
        for patient in &self.records {
            buf.extend_from_slice(&codec::encode(patient)?);
        }
        write_atomically(&self.path, &buf)?;
        tracing::debug!(
            "saved {} records to {}",
            self.records.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn get_by_position(&self, position: usize) -> RegistryResult<&Patient> {
        self.records
            .get(position)
            .ok_or(RegistryError::OutOfRange {
                position,
                len: self.records.len(),
            })
    }

    /// Appends a record at position `len()` and returns that position.
    pub fn append(&mut self, patient: Patient) -> RegistryResult<usize> {
        if self.is_full() {
            return Err(RegistryError::CapacityExceeded {
                what: "record store",
                capacity: self.capacity,
            });
        }
        self.records.push(patient);
        Ok(self.records.len() - 1)
    }

    /// Replaces the record at `position`, returning the previous one.
    pub fn replace(&mut self, position: usize, patient: Patient) -> RegistryResult<Patient> {
        let len = self.records.len();
        let slot = self
            .records
            .get_mut(position)
            .ok_or(RegistryError::OutOfRange { position, len })?;
        Ok(std::mem::replace(slot, patient))
    }

    /// Removes the record at `position`; every later record moves down one position.
    pub fn remove(&mut self, position: usize) -> RegistryResult<Patient> {
        if position >= self.records.len() {
            return Err(RegistryError::OutOfRange {
                position,
                len: self.records.len(),
            });
        }
        Ok(self.records.remove(position))
    }

    /// Linear scan for the first record with `id`.
    ///
    /// Only for use where the index is unavailable; lookups normally go through
    /// [`IdentifierIndex`](crate::IdentifierIndex).
    pub fn find_position_by_id(&self, id: &str) -> RegistryResult<usize> {
        self.records
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn records(&self) -> &[Patient] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Patient> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a Patient;
    type IntoIter = std::slice::Iter<'a, Patient>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::Gender;
    use crate::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    fn patient(id: &str, age: u16) -> Patient {
        Patient {
            id: id.into(),
            name: format!("Patient {id}"),
            age,
            diagnosis: "Asthma".into(),
            gender: Gender::Female,
            disability: false,
            doc_specialty: "Pulmonology".into(),
            appointment_date: String::new(),
        }
    }

    fn store_in(temp: &TempDir, capacity: usize) -> RecordStore {
        RecordStore::new(temp.path().join("patients.bin"), capacity)
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp, 10);
        assert_eq!(store.load().unwrap(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_load_preserve_slot_order() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp, 10);
        store.append(patient("30000000", 30)).unwrap();
        store.append(patient("10000000", 10)).unwrap();
        store.append(patient("20000000", 20)).unwrap();
        store.save().unwrap();

        assert_eq!(
            fs::metadata(store.path()).unwrap().len(),
            (3 * RECORD_SIZE) as u64
        );

        let mut reloaded = store_in(&temp, 10);
        assert_eq!(reloaded.load().unwrap(), 3);
        assert_eq!(reloaded.records(), store.records());
    }

    #[test]
    fn test_append_returns_position_and_respects_capacity() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp, 2);
        assert_eq!(store.append(patient("00000001", 20)).unwrap(), 0);
        assert_eq!(store.append(patient("00000002", 20)).unwrap(), 1);

        let err = store.append(patient("00000003", 20)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_get_by_position_out_of_range() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp, 5);
        store.append(patient("00000001", 20)).unwrap();

        assert_eq!(store.get_by_position(0).unwrap().id, "00000001");
        let err = store.get_by_position(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_remove_compacts() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp, 5);
        for id in ["00000001", "00000002", "00000003"] {
            store.append(patient(id, 20)).unwrap();
        }

        let removed = store.remove(1).unwrap();
        assert_eq!(removed.id, "00000002");
        let ids: Vec<_> = store.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["00000001", "00000003"]);
        assert_eq!(store.remove(5).unwrap_err().kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_replace() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp, 5);
        store.append(patient("00000001", 20)).unwrap();

        let old = store.replace(0, patient("00000001", 21)).unwrap();
        assert_eq!(old.age, 20);
        assert_eq!(store.get_by_position(0).unwrap().age, 21);
        assert_eq!(
            store.replace(1, patient("00000001", 22)).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
    }

    #[test]
    fn test_find_position_by_id() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp, 5);
        store.append(patient("00000011", 20)).unwrap();
        store.append(patient("00000022", 20)).unwrap();

        assert_eq!(store.find_position_by_id("00000022").unwrap(), 1);
        assert_eq!(
            store.find_position_by_id("00000033").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_load_rejects_partial_record() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp, 5);
        store.append(patient("00000001", 20)).unwrap();
        store.save().unwrap();

        let mut bytes = fs::read(store.path()).unwrap();
        bytes.extend_from_slice(&[1, 2, 3]);
        fs::write(store.path(), bytes).unwrap();

        let err = store.load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptRecord);
        // The in-memory contents survive a failed load.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_rejects_zeroed_slot_instead_of_truncating() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp, 5);
        store.append(patient("00000001", 20)).unwrap();
        store.append(patient("00000002", 20)).unwrap();
        store.save().unwrap();

        let mut bytes = fs::read(store.path()).unwrap();
        bytes[..RECORD_SIZE].fill(0);
        fs::write(store.path(), bytes).unwrap();

        let err = store_in(&temp, 5).load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptRecord);
        let message = err.to_string();
        assert!(message.contains("slot 0: slot is vacant"), "{message}");
        assert_eq!(message.matches("corrupt record").count(), 1, "{message}");
    }

    #[test]
    fn test_load_rejects_more_records_than_capacity() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp, 3);
        for id in ["00000001", "00000002", "00000003"] {
            store.append(patient(id, 20)).unwrap();
        }
        store.save().unwrap();

        let err = store_in(&temp, 2).load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    }

    #[test]
    fn test_save_rejects_invalid_record_without_writing() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp, 5);
        store.append(patient("00000001", 0)).unwrap();

        let err = store.save().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidField);
        assert!(!store.path().exists());
    }
}
