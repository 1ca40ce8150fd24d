/// Longest display name accepted, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 255;

/// Result of validating a display name.
#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    /// Name is empty or whitespace-only.
    Empty,
    /// Name is longer than [`MAX_DISPLAY_NAME_CHARS`].
    TooLong,
    /// Name contains null bytes.
    NullByte,
    /// Name contains control characters (CR, LF, etc.).
    ControlCharacter,
}

impl FilenameError {
    /// Returns a human-readable error message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "File name cannot be empty",
            Self::TooLong => "File name exceeds 255 characters",
            Self::NullByte => "File name must not contain null bytes",
            Self::ControlCharacter => "File name must not contain control characters",
        }
    }
}

/// Normalize a user-supplied display name.
///
/// Clients sometimes send a full local path; only the final component is
/// kept. The result is trimmed and checked for characters that would break
/// headers or logs further down the line.
pub fn validate_display_name(name: &str) -> Result<&str, FilenameError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let trimmed = base.trim();

    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }

    if trimmed.contains('\0') {
        return Err(FilenameError::NullByte);
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(FilenameError::ControlCharacter);
    }

    if trimmed.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(FilenameError::TooLong);
    }

    Ok(trimmed)
}
