use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub mime_type: Option<String>,
    pub path: Option<PathBuf>,
}

/// A selected file. Clones share identity; two handles built from identical
/// name, size and type are still distinct files.
#[derive(Clone)]
pub struct FileHandle {
    id: Uuid,
    info: Arc<FileInfo>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, size: u64, mime_type: Option<&str>) -> Self {
        Self::from_info(FileInfo {
            name: name.into(),
            size,
            mime_type: mime_type.and_then(normalize_mime),
            path: None,
        })
    }

    /// Reads name and size from disk. The declared type is guessed from the
    /// extension, the way a browser fills in `File.type`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string());

        Ok(Self::from_info(FileInfo {
            name,
            size: metadata.len(),
            mime_type,
            path: Some(path.to_path_buf()),
        }))
    }

    fn from_info(info: FileInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            info: Arc::new(info),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn size(&self) -> u64 {
        self.info.size
    }

    /// Declared MIME type, if any.
    pub fn mime_type(&self) -> Option<&str> {
        self.info.mime_type.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.info.path.as_deref()
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }
}

fn normalize_mime(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match raw.parse::<mime::Mime>() {
        Ok(mime) => Some(mime.essence_str().to_string()),
        Err(_) => Some(raw.to_lowercase()),
    }
}

impl PartialEq for FileHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FileHandle {}

impl std::hash::Hash for FileHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("id", &self.id)
            .field("name", &self.info.name)
            .field("size", &self.info.size)
            .field("mime_type", &self.info.mime_type)
            .finish()
    }
}

impl Serialize for FileHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FileHandle", 4)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("name", &self.info.name)?;
        state.serialize_field("size", &self.info.size)?;
        state.serialize_field("type", &self.info.mime_type)?;
        state.end()
    }
}
