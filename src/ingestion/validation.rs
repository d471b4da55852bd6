use std::path::Path;

use crate::error_handling::types::ValidationError;

pub const ALLOWED_EXTENSIONS: [&str; 2] = ["pcap", "pcapng"];

/// Checks the declared name and size of an upload before anything touches disk.
pub fn validate_upload(original_name: &str, size: u64, max_bytes: u64) -> Result<(), ValidationError> {
    check_extension(original_name)?;
    if size > max_bytes {
        return Err(ValidationError::FileTooLarge { size, max_bytes });
    }
    Ok(())
}

/// Name-only half of `validate_upload`, usable before the file has been stat'd.
pub fn check_extension(original_name: &str) -> Result<(), ValidationError> {
    if has_capture_extension(original_name) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedExtension(original_name.to_string()))
    }
}

pub fn has_capture_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}
