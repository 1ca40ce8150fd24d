use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::HubError;

/// Optional predicates for listing files. All present predicates are AND-ed.
///
/// Sizes are unsigned so negative bounds fail at deserialization.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileFilter {
    /// Case-insensitive substring of the display name. Wildcards match literally.
    pub name_contains: Option<String>,
    /// Case-insensitive exact content type.
    pub content_type_exact: Option<String>,
    /// Inclusive lower bound on size in bytes.
    pub min_size: Option<u64>,
    /// Inclusive upper bound on size in bytes.
    pub max_size: Option<u64>,
    /// First upload day included (UTC).
    pub start_date: Option<NaiveDate>,
    /// Last upload day included (UTC).
    pub end_date: Option<NaiveDate>,
    /// Name suffix after the last dot, with or without the leading dot.
    pub extension: Option<String>,
}

impl FileFilter {
    pub fn validate(&self) -> Result<(), HubError> {
        if let (Some(min), Some(max)) = (self.min_size, self.max_size)
            && min > max
        {
            return Err(HubError::InvalidFilter(format!(
                "min_size ({min}) is greater than max_size ({max})"
            )));
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && start > end
        {
            return Err(HubError::InvalidFilter(format!(
                "start_date ({start}) is after end_date ({end})"
            )));
        }

        if let Some(ref ext) = self.extension
            && normalize_extension(ext).is_empty()
        {
            return Err(HubError::InvalidFilter(
                "extension must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Trimmed name term, `None` when blank.
    pub fn name_term(&self) -> Option<&str> {
        self.name_contains
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Lowercased extension without its leading dot.
    pub fn extension_suffix(&self) -> Option<String> {
        self.extension.as_deref().map(normalize_extension)
    }

    pub fn min_size_bytes(&self) -> Option<i64> {
        self.min_size.map(clamp_size)
    }

    pub fn max_size_bytes(&self) -> Option<i64> {
        self.max_size.map(clamp_size)
    }

    /// Inclusive lower bound: midnight UTC of `start_date`.
    pub fn uploaded_from(&self) -> Option<DateTime<Utc>> {
        self.start_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// Exclusive upper bound: midnight UTC of the day after `end_date`.
    ///
    /// `None` when there is no end date or it is the last representable day,
    /// in which case the bound is unbounded anyway.
    pub fn uploaded_before(&self) -> Option<DateTime<Utc>> {
        self.end_date
            .and_then(|d| d.succ_opt())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

fn clamp_size(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// Escape LIKE wildcard characters in a search string.
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
