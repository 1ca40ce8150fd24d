pub mod file;
pub mod filter;

pub use file::{FileRecord, FileView};
pub use filter::FileFilter;
