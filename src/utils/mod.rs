pub mod file;
pub mod format;

pub use file::validate_file_name;
pub use format::{DisplaySize, SizeFormatter};
