use crate::errors::{AppError, Result};

pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Reject names that could escape the owner's namespace or that the
/// filesystem would not round-trip.
pub fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty() {
        return Err(AppError::Validation("File name is required".to_string()));
    }

    if file_name.len() > MAX_FILE_NAME_BYTES {
        return Err(AppError::Validation(format!(
            "File name must be at most {} bytes",
            MAX_FILE_NAME_BYTES
        )));
    }

    if file_name == "." || file_name == ".." {
        return Err(AppError::Validation("Invalid file name".to_string()));
    }

    if file_name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(AppError::Validation(
            "File name contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Reduce a client-supplied name to its final path component, as browsers
/// sometimes send the full local path.
pub fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name)
}
