use harbor_core::{AppError, Config};
use std::path::Path;

/// Upload pre-check errors. Raised before any storage I/O.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Content type {content_type} does not match extension {extension}")]
    ContentTypeMismatch {
        content_type: String,
        extension: String,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Content type for a (lowercase) file extension.
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "tif" | "tiff" => Some("image/tiff"),
        "bmp" => Some("image/bmp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "pdf" => Some("application/pdf"),
        "zip" => Some("application/zip"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// Upload file validator
///
/// Size, extension allow-list and content-type consistency checks, kept
/// independent of any storage backend.
#[derive(Debug, Clone)]
pub struct MediaValidator {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
}

impl MediaValidator {
    pub fn new(max_file_size: usize, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_upload_size_bytes,
            config.allowed_extensions.clone(),
        )
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate file extension, returning it lowercased.
    pub fn validate_extension(&self, filename: &str) -> Result<String, ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }

        Ok(extension)
    }

    /// Reject a declared Content-Type that disagrees with the extension.
    pub fn validate_extension_content_type_match(
        &self,
        extension: &str,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        let normalized = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();

        // image/jpg is a common non-standard alias.
        let matches = match content_type_for_extension(extension) {
            Some("image/jpeg") => normalized == "image/jpeg" || normalized == "image/jpg",
            Some(expected) => normalized == expected,
            None => normalized == "application/octet-stream",
        };

        if !matches {
            return Err(ValidationError::ContentTypeMismatch {
                content_type: content_type.to_string(),
                extension: extension.to_string(),
            });
        }

        Ok(())
    }

    /// Run every check. Returns the lowercase extension and the content type
    /// to store the file under.
    pub fn validate_all(
        &self,
        filename: &str,
        declared_content_type: Option<&str>,
        size: usize,
    ) -> Result<(String, String), ValidationError> {
        self.validate_file_size(size)?;
        let extension = self.validate_extension(filename)?;

        if let Some(content_type) = declared_content_type {
            self.validate_extension_content_type_match(&extension, content_type)?;
        }

        let content_type = content_type_for_extension(&extension)
            .unwrap_or("application/octet-stream")
            .to_string();

        Ok((extension, content_type))
    }
}
