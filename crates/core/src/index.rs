//! Identifier index: CI → store position.
//!
//! The index is a fixed array of slots addressed by `numeric(CI) % capacity`, with linear
//! probing on collision and backward-shift deletion so no tombstones are needed. It is a
//! derived structure and can always be rebuilt from the store with [`build_from`].
//!
//! # Persisted form
//!
//! One line per live entry in slot order:
//!
//! ```text
//! |12345678|0|
//! |87654321|1|
//! ```
//!
//! [`build_from`]: IdentifierIndex::build_from

use crate::durable::write_atomically;
use crate::store::RecordStore;
use crate::validation::validate_id;
use crate::{RegistryError, RegistryResult};
use registry_types::NationalId;
use serde::Serialize;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

/// One live index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub id: NationalId,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierIndex {
    path: PathBuf,
    slots: Vec<Option<IndexEntry>>,
    len: usize,
}

/// Outcome of probing for an identifier.
enum Probe {
    Found(usize),
    Vacant(usize),
    Full,
}

impl IdentifierIndex {
    /// Creates an empty index with `capacity` slots, persisted at `path`.
    ///
    /// `capacity` must be non-zero; [`CoreConfig`](crate::CoreConfig) guarantees this.
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            slots: vec![None; capacity.max(1)],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.len = 0;
    }

    fn home_slot(&self, id: &NationalId) -> usize {
        (id.numeric() % self.slots.len() as u64) as usize
    }

    fn probe(&self, id: &NationalId) -> Probe {
        let capacity = self.slots.len();
        let home = self.home_slot(id);
        for step in 0..capacity {
            let slot = (home + step) % capacity;
            match &self.slots[slot] {
                Some(entry) if entry.id == *id => return Probe::Found(slot),
                Some(_) => continue,
                None => return Probe::Vacant(slot),
            }
        }
        Probe::Full
    }

    /// Inserts `(id, position)` and returns the slot it landed in.
    ///
    /// # Errors
    ///
    /// - `InvalidField` if `id` is not a valid CI,
    /// - `DuplicateKey` if `id` is already indexed,
    /// - `CapacityExceeded` if every slot is taken.
    pub fn insert(&mut self, id: &str, position: usize) -> RegistryResult<usize> {
        let id = validate_id(id)?;
        match self.probe(&id) {
            Probe::Found(_) => Err(RegistryError::DuplicateKey(id.to_string())),
            Probe::Full => Err(RegistryError::CapacityExceeded {
                what: "identifier index",
                capacity: self.slots.len(),
            }),
            Probe::Vacant(slot) => {
                self.slots[slot] = Some(IndexEntry { id, position });
                self.len += 1;
                Ok(slot)
            }
        }
    }

    /// Returns the store position recorded for `id`.
    pub fn lookup(&self, id: &str) -> RegistryResult<usize> {
        let not_found = || RegistryError::NotFound(id.to_string());
        let id = NationalId::parse(id).map_err(|_| not_found())?;
        match self.probe(&id) {
            Probe::Found(slot) => self.slots[slot]
                .as_ref()
                .map(|entry| entry.position)
                .ok_or_else(not_found),
            Probe::Vacant(_) | Probe::Full => Err(not_found()),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup(id).is_ok()
    }

    /// Removes `id` and returns the position it pointed at.
    ///
    /// Later entries in the same probe run are shifted back so lookups never stop early at
    /// the hole.
    pub fn remove(&mut self, id: &str) -> RegistryResult<usize> {
        let not_found = || RegistryError::NotFound(id.to_string());
        let id = NationalId::parse(id).map_err(|_| not_found())?;
        let Probe::Found(mut hole) = self.probe(&id) else {
            return Err(not_found());
        };
        let removed = self.slots[hole].take().ok_or_else(not_found)?;
        self.len -= 1;

        let capacity = self.slots.len();
        let distance = |from: usize, to: usize| (to + capacity - from) % capacity;
        let mut next = (hole + 1) % capacity;
        while let Some(entry) = &self.slots[next] {
            let home = self.home_slot(&entry.id);
            if distance(home, hole) < distance(home, next) {
                self.slots[hole] = self.slots[next].take();
                hole = next;
            }
            next = (next + 1) % capacity;
        }

        Ok(removed.position)
    }

    /// Moves every entry pointing past `removed` down by one, following a store compaction.
    pub fn shift_positions_after(&mut self, removed: usize) {
        for entry in self.slots.iter_mut().flatten() {
            if entry.position > removed {
                entry.position -= 1;
            }
        }
    }

    /// Live entries as `(slot, entry)` in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &IndexEntry)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|e| (slot, e)))
    }

    /// Clears the index and inserts one entry per store record, in store order.
    ///
    /// On error the index is left as it was.
    ///
    /// # Errors
    ///
    /// - `UninitializedSlot` if a record inside the live range carries no patient (zero
    ///   age or empty CI), which means the store and index have fallen out of step,
    /// - `DuplicateKey` if two records share a CI,
    /// - `CapacityExceeded` if the store holds more records than the index has slots.
    pub fn build_from(&mut self, store: &RecordStore) -> RegistryResult<()> {
        let mut rebuilt = Self::new(self.path.clone(), self.slots.len());
        for (position, patient) in store.iter().enumerate() {
            if patient.age == 0 || patient.id.is_empty() {
                return Err(RegistryError::UninitializedSlot { position });
            }
            rebuilt.insert(&patient.id, position)?;
        }
        tracing::debug!("built index with {} entries", rebuilt.len);
        *self = rebuilt;
        Ok(())
    }

    /// True if the index holds exactly one correct entry for every store record.
    pub fn is_consistent_with(&self, store: &RecordStore) -> bool {
        self.len == store.len()
            && store
                .iter()
                .enumerate()
                .all(|(position, patient)| {
                    matches!(self.lookup(&patient.id), Ok(found) if found == position)
                })
    }

    /// Replaces the index with the entries persisted on disk.
    ///
    /// Returns `Ok(false)` and leaves the index empty when no index file exists.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `CorruptRecord` for a malformed line, and any
    /// error [`insert`](Self::insert) reports.
    pub fn load(&mut self) -> RegistryResult<bool> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                self.clear();
                return Ok(false);
            }
            Err(e) if e.kind() == IoErrorKind::InvalidData => {
                return Err(RegistryError::CorruptRecord(format!(
                    "{} is not valid UTF-8",
                    self.path.display()
                )))
            }
            Err(e) => return Err(RegistryError::io(&self.path, e)),
        };

        let mut loaded = Self::new(self.path.clone(), self.slots.len());
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (id, position) = parse_line(line).ok_or_else(|| {
                RegistryError::CorruptRecord(format!(
                    "{} line {}: malformed index entry {line:?}",
                    self.path.display(),
                    line_no + 1
                ))
            })?;
            loaded.insert(id, position).map_err(|e| match e {
                RegistryError::InvalidField { reason, .. } => RegistryError::CorruptRecord(
                    format!("{} line {}: {reason}", self.path.display(), line_no + 1),
                ),
                other => other,
            })?;
        }

        tracing::debug!(
            "loaded {} index entries from {}",
            loaded.len,
            self.path.display()
        );
        *self = loaded;
        Ok(true)
    }

    /// Writes every live entry to disk in slot order.
    pub fn save(&self) -> RegistryResult<()> {
        let mut out = String::new();
        for (_, entry) in self.entries() {
            out.push_str(&format!("|{}|{}|\n", entry.id, entry.position));
        }
        write_atomically(&self.path, out.as_bytes())?;
        tracing::debug!("saved {} index entries to {}", self.len, self.path.display());
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<(&str, usize)> {
    let inner = line.trim_end().strip_prefix('|')?.strip_suffix('|')?;
    let (id, position) = inner.split_once('|')?;
    Some((id, position.parse().ok()?))
}
