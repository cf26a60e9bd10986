use super::models::FileHandle;

/// Lowercased suffix after the last dot of the file name.
pub fn file_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Declared type first, then the extension lookup table. `None` means unknown.
pub fn resolve_type(file: &FileHandle) -> Option<String> {
    if let Some(declared) = file.mime_type() {
        return Some(declared.to_string());
    }

    let ext = file_extension(file.name())?;
    mime_guess::from_ext(&ext)
        .first()
        .map(|mime| mime.essence_str().to_string())
}
