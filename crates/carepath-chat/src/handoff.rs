//! Single-slot, read-once store for passing a chosen doctor to the booking flow.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use carepath_core::error::{CarepathError, Result};
use carepath_core::types::DoctorRecommendation;

/// Fixed key under which the selected doctor is stored.
pub const HANDOFF_KEY: &str = "selectedDoctor";

/// A slot holding at most one pending doctor.
///
/// `put` replaces any pending value. `take` removes the value as it reads it,
/// so a second `take` observes nothing.
pub trait HandoffSlot: Send + Sync {
    fn put(&self, doctor: &DoctorRecommendation) -> Result<()>;
    fn take(&self) -> Result<Option<DoctorRecommendation>>;
}

/// In-process slot.
#[derive(Debug, Default)]
pub struct MemoryHandoff {
    slot: Mutex<Option<String>>,
}

impl MemoryHandoff {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HandoffSlot for MemoryHandoff {
    fn put(&self, doctor: &DoctorRecommendation) -> Result<()> {
        let serialized = serde_json::to_string(doctor)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| CarepathError::Handoff(format!("slot lock poisoned: {}", e)))?;
        *slot = Some(serialized);
        Ok(())
    }

    fn take(&self) -> Result<Option<DoctorRecommendation>> {
        let taken = self
            .slot
            .lock()
            .map_err(|e| CarepathError::Handoff(format!("slot lock poisoned: {}", e)))?
            .take();
        match taken {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

/// Slot backed by a JSON file named after [`HANDOFF_KEY`] in a data directory.
#[derive(Debug, Clone)]
pub struct FileHandoff {
    path: PathBuf,
}

impl FileHandoff {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{}.json", HANDOFF_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HandoffSlot for FileHandoff {
    fn put(&self, doctor: &DoctorRecommendation) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec(doctor)?)?;
        tracing::debug!(path = %self.path.display(), doctor = %doctor.name, "Handoff slot written");
        Ok(())
    }

    fn take(&self) -> Result<Option<DoctorRecommendation>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // Clear before parsing so a corrupt value is not seen again either.
        std::fs::remove_file(&self.path)?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }
}
