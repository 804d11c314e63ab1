// Local sequence store - Filesystem-backed repository and file source
//
// Layout under the root:
//   sequences.json        index of every saved sequence
//   <user>-<uuid>.mid     one MIDI file per saved sequence

use crate::collaborator::{
    FileSource, PersistReceipt, SequenceMetadata, SequenceRepository, SequenceUpload,
};
use crate::error::CollaboratorError;
use crate::storage::types::PersistedSequence;
use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

const INDEX_FILE: &str = "sequences.json";

/// Sequence repository writing to a local directory
pub struct LocalSequenceStore {
    root: PathBuf,
    /// Serializes index read-modify-write cycles
    index_lock: Mutex<()>,
}

impl LocalSequenceStore {
    /// Open a store, creating the root directory if needed
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, CollaboratorError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            CollaboratorError::Storage(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self {
            root,
            index_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn read_index(&self) -> Result<Vec<PersistedSequence>, CollaboratorError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&data).map_err(|e| {
            CollaboratorError::Storage(format!("Corrupt index {}: {}", path.display(), e))
        })
    }

    /// Written to a temporary file, then renamed into place
    fn write_index(&self, index: &[PersistedSequence]) -> Result<(), CollaboratorError> {
        let json = serde_json::to_string_pretty(index)
            .map_err(|e| CollaboratorError::Storage(e.to_string()))?;
        let tmp = self.root.join(format!("{}.tmp", INDEX_FILE));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, self.index_path())?;
        Ok(())
    }

    /// Resolve a path inside the store, refusing anything that climbs out
    fn resolve(&self, path: &str) -> Result<PathBuf, CollaboratorError> {
        let candidate = Path::new(path);
        if path.is_empty()
            || candidate
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(CollaboratorError::Storage(format!(
                "Refusing path '{}'",
                path
            )));
        }

        if candidate.is_absolute() {
            Ok(candidate.to_path_buf())
        } else {
            Ok(self.root.join(candidate))
        }
    }
}

fn check_user_id(user_id: &str) -> Result<(), CollaboratorError> {
    let valid = !user_id.is_empty()
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && user_id != "."
        && user_id != "..";
    if valid {
        Ok(())
    } else {
        Err(CollaboratorError::Storage(format!(
            "Invalid user id '{}'",
            user_id
        )))
    }
}

impl SequenceRepository for LocalSequenceStore {
    fn persist(
        &self,
        user_id: &str,
        upload: &SequenceUpload,
    ) -> Result<PersistReceipt, CollaboratorError> {
        check_user_id(user_id)?;
        let _guard = self
            .index_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let sequence_id = uuid::Uuid::new_v4().to_string();
        let file_name = format!("{}-{}.mid", user_id, sequence_id);
        std::fs::write(self.root.join(&file_name), &upload.midi)?;

        let metadata = serde_json::to_string(&SequenceMetadata {
            notes: upload.notes.clone(),
        })
        .map_err(|e| CollaboratorError::Storage(e.to_string()))?;

        let mut index = self.read_index()?;
        index.push(PersistedSequence {
            sequence_id: sequence_id.clone(),
            user_id: user_id.to_string(),
            file_path: file_name.clone(),
            metadata,
            created_at: Utc::now(),
        });
        self.write_index(&index)?;

        log::info!("Stored sequence {} as {}", sequence_id, file_name);
        Ok(PersistReceipt {
            sequence_id,
            file_name,
        })
    }

    fn list(&self, user_id: &str) -> Result<Vec<PersistedSequence>, CollaboratorError> {
        check_user_id(user_id)?;
        let _guard = self
            .index_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut sequences: Vec<PersistedSequence> = self
            .read_index()?
            .into_iter()
            .filter(|s| s.user_id == user_id)
            .collect();
        sequences.sort_by_key(|s| s.created_at);
        Ok(sequences)
    }

    fn delete(&self, user_id: &str, sequence_id: &str) -> Result<bool, CollaboratorError> {
        check_user_id(user_id)?;
        let _guard = self
            .index_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut index = self.read_index()?;
        let Some(position) = index
            .iter()
            .position(|s| s.user_id == user_id && s.sequence_id == sequence_id)
        else {
            return Ok(false);
        };

        let removed = index.remove(position);
        self.write_index(&index)?;

        if let Ok(path) = self.resolve(&removed.file_path)
            && let Err(e) = std::fs::remove_file(&path)
        {
            log::warn!("Could not remove {}: {}", path.display(), e);
        }
        Ok(true)
    }
}

impl FileSource for LocalSequenceStore {
    fn download_file(&self, path: &str) -> Result<Vec<u8>, CollaboratorError> {
        let resolved = self.resolve(path)?;
        std::fs::read(&resolved).map_err(|e| {
            CollaboratorError::Storage(format!("Failed to read {}: {}", resolved.display(), e))
        })
    }
}
