pub mod models;
pub mod scan;
pub mod types;

pub use models::{FileHandle, FileInfo};
pub use scan::collect_files;
pub use types::{file_extension, resolve_type};
