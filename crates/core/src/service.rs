//! Patient service façade.
//!
//! [`PatientService`] owns the record store and the identifier index and is the only way
//! callers read or change them. It keeps one invariant across every operation: for each
//! live record at position `p` with CI `id`, the index maps `id` to `p`, and the index holds
//! nothing else.
//!
//! ## Lifecycle
//!
//! ```text
//! PatientService<Unloaded> --load()--> PatientService<Ready>
//! ```
//!
//! Loading reads the records file and the persisted index. If the index file is absent or
//! disagrees with the records, the index is rebuilt from the records.
//!
//! ## Mutations
//!
//! `add`, `update`, `delete` and `schedule` stage their change on copies of the store and
//! index, so any failure that does not involve I/O happens before anything is written. The staged
//! records are then persisted, and memory is brought in line according to the configured
//! [`MutationPolicy`]. On any failure both memory and disk are left as they were.
//!
//! Mutations persist the records file only. [`save`](PatientService::save) writes both files.

use crate::config::{CoreConfig, MutationPolicy};
use crate::error::{ErrorKind, RegistryError, RegistryResult};
use crate::index::{IdentifierIndex, IndexEntry};
use crate::patient::{Gender, Patient};
use crate::query::{summarize, PatientFilter, RegistrySummary};
use crate::store::RecordStore;
use crate::validation::validate_patient;
use registry_types::AppointmentDate;
use std::sync::Arc;

// ============================================================================
// TYPE-STATE MARKERS
// ============================================================================

/// Marker type: nothing has been read from disk yet.
///
/// Only `load()` can be called in this state.
#[derive(Clone, Copy, Debug)]
pub struct Unloaded;

/// Marker type: store and index are loaded and consistent.
#[derive(Clone, Debug)]
pub struct Ready {
    store: RecordStore,
    index: IdentifierIndex,
}

// ============================================================================
// PATIENT SERVICE
// ============================================================================

/// Combined CRUD and query API over the registry.
///
/// Generic parameter `S` is either [`Unloaded`] or [`Ready`].
#[derive(Clone, Debug)]
pub struct PatientService<S> {
    cfg: Arc<CoreConfig>,
    state: S,
}

impl PatientService<Unloaded> {
    /// Creates a service that has not yet touched the data directory.
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            state: Unloaded,
        }
    }

    /// Creates a service and loads it in one step.
    pub fn open(cfg: Arc<CoreConfig>) -> RegistryResult<PatientService<Ready>> {
        Self::new(cfg).load()
    }

    /// Loads the records and the index, moving the service to [`Ready`].
    ///
    /// # Errors
    ///
    /// Anything [`RecordStore::load`] reports, an `Io` error reading the index file, or a
    /// failure rebuilding the index (for example `DuplicateKey` when the records file holds
    /// two records with the same CI).
    pub fn load(self) -> RegistryResult<PatientService<Ready>> {
        let state = load_state(&self.cfg)?;
        Ok(PatientService {
            cfg: self.cfg,
            state,
        })
    }
}

impl<S> PatientService<S> {
    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }
}

impl PatientService<Ready> {
    /// Re-reads both files from disk, discarding the in-memory state.
    ///
    /// On error the current state is kept. Returns the number of records loaded.
    pub fn load(&mut self) -> RegistryResult<usize> {
        self.state = load_state(&self.cfg)?;
        Ok(self.state.store.len())
    }

    /// Writes the records file and the index file.
    pub fn save(&self) -> RegistryResult<()> {
        self.state.store.save()?;
        self.state.index.save()?;
        tracing::info!(
            "saved {} patients to {}",
            self.state.store.len(),
            self.cfg.patient_data_dir().display()
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Fetches a patient through the index.
    ///
    /// The index is authoritative: if it has no entry for `id` the result is `NotFound`
    /// even if a linear scan of the store would find the record.
    pub fn get(&self, id: &str) -> RegistryResult<&Patient> {
        self.locate(id).map(|(_, patient)| patient)
    }

    /// Like [`get`](Self::get), also returning the record's store position.
    pub fn locate(&self, id: &str) -> RegistryResult<(usize, &Patient)> {
        let position = self.state.index.lookup(id)?;
        let patient = self.state.store.get_by_position(position)?;
        Ok((position, patient))
    }

    pub fn list_all(&self) -> &[Patient] {
        self.state.store.records()
    }

    pub fn len(&self) -> usize {
        self.state.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.store.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.state.store.capacity()
    }

    /// Live index entries as `(slot, entry)`, in slot order.
    pub fn index_entries(&self) -> Vec<(usize, &IndexEntry)> {
        self.state.index.entries().collect()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Returns the records matching `filter`, in store order.
    pub fn filter(&self, filter: &PatientFilter) -> RegistryResult<Vec<Patient>> {
        let found = filter.apply(self.state.store.records())?;
        tracing::debug!("{filter}: {} match(es)", found.len());
        Ok(found)
    }

    pub fn list_disabled(&self) -> RegistryResult<Vec<Patient>> {
        self.filter(&PatientFilter::Disabled)
    }

    pub fn list_by_appointment_date(&self, date: &str) -> RegistryResult<Vec<Patient>> {
        self.filter(&PatientFilter::AppointmentDate(date.to_string()))
    }

    pub fn list_by_specialty(&self, specialty: &str) -> RegistryResult<Vec<Patient>> {
        self.filter(&PatientFilter::Specialty(specialty.to_string()))
    }

    pub fn list_female(&self) -> RegistryResult<Vec<Patient>> {
        self.filter(&PatientFilter::Gender(Gender::Female))
    }

    pub fn list_male(&self) -> RegistryResult<Vec<Patient>> {
        self.filter(&PatientFilter::Gender(Gender::Male))
    }

    /// Patients strictly younger than `limit`.
    pub fn list_under_age(&self, limit: u16) -> RegistryResult<Vec<Patient>> {
        self.filter(&PatientFilter::UnderAge(limit))
    }

    pub fn summary(&self) -> RegistrySummary {
        summarize(&self.state.store)
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Adds a new patient and returns its store position.
    ///
    /// # Errors
    ///
    /// - `InvalidField` if any field fails validation,
    /// - `DuplicateKey` if a patient with the same CI exists,
    /// - `CapacityExceeded` if the store or index is full,
    /// - `Io` if the records file cannot be written.
    pub fn add(&mut self, patient: Patient) -> RegistryResult<usize> {
        validate_patient(&patient)?;
        if self.state.index.contains(&patient.id) {
            return Err(RegistryError::DuplicateKey(patient.id));
        }

        let id = patient.id.clone();
        let mut store = self.state.store.clone();
        let position = store.append(patient)?;
        let mut index = self.state.index.clone();
        index.insert(&id, position)?;

        self.commit(store, index)?;
        tracing::info!("added patient {id} at position {position}");
        Ok(position)
    }

    /// Replaces every field of the patient with the same CI.
    ///
    /// # Errors
    ///
    /// `InvalidField` for a bad field, `NotFound` if no patient has `patient.id`, or `Io`.
    pub fn update(&mut self, patient: Patient) -> RegistryResult<()> {
        validate_patient(&patient)?;
        let position = self.state.index.lookup(&patient.id)?;

        let id = patient.id.clone();
        let mut store = self.state.store.clone();
        store.replace(position, patient)?;
        let index = self.state.index.clone();

        self.commit(store, index)?;
        tracing::info!("updated patient {id}");
        Ok(())
    }

    /// Removes a patient and returns the removed record.
    ///
    /// Later records move down one position and their index entries follow.
    pub fn delete(&mut self, id: &str) -> RegistryResult<Patient> {
        let position = self.state.index.lookup(id)?;

        let mut store = self.state.store.clone();
        let removed = store.remove(position)?;
        let mut index = self.state.index.clone();
        index.remove(id)?;
        index.shift_positions_after(position);

        self.commit(store, index)?;
        tracing::info!("deleted patient {id}");
        Ok(removed)
    }

    /// Sets a patient's appointment date, leaving every other field unchanged.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `date` is not a real `YYYY-MM-DD` date (checked first),
    /// `NotFound` if no patient has `id`, or `Io`.
    pub fn schedule(&mut self, id: &str, date: &str) -> RegistryResult<Patient> {
        let date = AppointmentDate::parse(date)
            .map_err(|e| RegistryError::InvalidArgument(format!("appointment date: {e}")))?;
        let position = self.state.index.lookup(id)?;

        let mut patient = self.state.store.get_by_position(position)?.clone();
        patient.appointment_date = date.to_string();
        let mut store = self.state.store.clone();
        store.replace(position, patient.clone())?;
        let index = self.state.index.clone();

        self.commit(store, index)?;
        tracing::info!("scheduled patient {id} for {date}");
        Ok(patient)
    }

    /// Persists a staged store and brings memory in line with it.
    ///
    /// Nothing in `self` changes unless the records file was written.
    fn commit(&mut self, store: RecordStore, index: IdentifierIndex) -> RegistryResult<()> {
        store.save()?;

        match self.cfg.mutation_policy() {
            MutationPolicy::Incremental => {
                self.state = Ready { store, index };
            }
            MutationPolicy::ReloadAfterWrite => {
                let mut reloaded = RecordStore::new(store.path(), store.capacity());
                reloaded.load()?;
                let mut rebuilt = IdentifierIndex::new(index.path(), index.capacity());
                rebuilt.build_from(&reloaded)?;
                tracing::debug!("reloaded {} records after write", reloaded.len());
                self.state = Ready {
                    store: reloaded,
                    index: rebuilt,
                };
            }
        }
        Ok(())
    }
}

fn load_state(cfg: &CoreConfig) -> RegistryResult<Ready> {
    let mut store = RecordStore::new(cfg.records_path(), cfg.patient_capacity());
    store.load()?;

    let mut index = IdentifierIndex::new(cfg.index_path(), cfg.index_capacity());
    match index.load() {
        Ok(true) if index.is_consistent_with(&store) => {
            tracing::debug!("index at {} is up to date", index.path().display());
        }
        Ok(true) => {
            tracing::warn!(
                "index at {} does not match the records file; rebuilding",
                index.path().display()
            );
            index.build_from(&store)?;
        }
        Ok(false) => {
            if !store.is_empty() {
                tracing::warn!(
                    "no index at {}; rebuilding from {} records",
                    index.path().display(),
                    store.len()
                );
            }
            index.build_from(&store)?;
        }
        Err(e) if e.kind() == ErrorKind::Io => return Err(e),
        Err(e) => {
            tracing::warn!(
                "discarding unreadable index at {}: {e}; rebuilding",
                index.path().display()
            );
            index.build_from(&store)?;
        }
    }

    tracing::debug!(
        "loaded {} patients from {}",
        store.len(),
        cfg.patient_data_dir().display()
    );
    Ok(Ready { store, index })
}
