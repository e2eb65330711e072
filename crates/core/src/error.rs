use std::path::{Path, PathBuf};

/// Machine-checkable category of a [`RegistryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidField,
    NotFound,
    DuplicateKey,
    CapacityExceeded,
    OutOfRange,
    CorruptRecord,
    UninitializedSlot,
    Io,
    InvalidArgument,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("no patient with CI {0}")]
    NotFound(String),
    #[error("a patient with CI {0} already exists")]
    DuplicateKey(String),
    #[error("{what} is full (capacity {capacity})")]
    CapacityExceeded { what: &'static str, capacity: usize },
    #[error("position {position} is outside the live range 0..{len}")]
    OutOfRange { position: usize, len: usize },
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
    #[error("slot {position} inside the live range holds no patient")]
    UninitializedSlot { position: usize },
    #[error("I/O error on {path}: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl RegistryError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidField { .. } => ErrorKind::InvalidField,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DuplicateKey(_) => ErrorKind::DuplicateKey,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::CorruptRecord(_) => ErrorKind::CorruptRecord,
            Self::UninitializedSlot { .. } => ErrorKind::UninitializedSlot,
            Self::Io { .. } => ErrorKind::Io,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
