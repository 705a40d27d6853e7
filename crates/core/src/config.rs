//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::repositories::Page;
use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_file: Option<PathBuf>,
    default_page_size: usize,
    max_page_size: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `data_file` of `None` keeps all data in memory for the lifetime of the process.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if either page size is zero or the default
    /// exceeds the maximum.
    pub fn new(
        data_file: Option<PathBuf>,
        default_page_size: usize,
        max_page_size: usize,
    ) -> CoreResult<Self> {
        if default_page_size == 0 || max_page_size == 0 {
            return Err(CoreError::Validation(
                "page sizes must be greater than zero".into(),
            ));
        }
        if default_page_size > max_page_size {
            return Err(CoreError::Validation(format!(
                "default page size {default_page_size} exceeds maximum {max_page_size}"
            )));
        }

        Ok(Self {
            data_file,
            default_page_size,
            max_page_size,
        })
    }

    pub fn data_file(&self) -> Option<&Path> {
        self.data_file.as_deref()
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Converts 1-based `page`/`page_size` request values into an offset/limit window.
    ///
    /// A missing page means the first page; a missing size means the configured default.
    /// Sizes above the configured maximum are capped rather than rejected.
    pub fn page(&self, page: Option<usize>, page_size: Option<usize>) -> CoreResult<Page> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(CoreError::Validation("page numbers start at 1".into()));
        }
        let limit = match page_size {
            Some(0) => {
                return Err(CoreError::Validation(
                    "page size must be greater than zero".into(),
                ))
            }
            Some(size) => size.min(self.max_page_size),
            None => self.default_page_size,
        };

        Ok(Page {
            offset: (page - 1).saturating_mul(limit),
            limit,
        })
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Parse a page size from an optional environment value.
///
/// If `value` is `None` or empty/whitespace, returns `default`.
pub fn page_size_from_env_value(value: Option<String>, default: usize) -> CoreResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        Some(v) => v
            .parse::<usize>()
            .map_err(|e| CoreError::Validation(format!("invalid page size '{v}': {e}"))),
        None => Ok(default),
    }
}

/// Parse the data file location from an optional environment value.
///
/// An unset or blank value selects the in-memory store.
pub fn data_file_from_env_value(value: Option<String>) -> Option<PathBuf> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_converts_to_offset_and_limit() {
        let cfg = CoreConfig::default();
        let page = cfg.page(Some(3), Some(10)).expect("valid page");
        assert_eq!(page, Page { offset: 20, limit: 10 });
    }

    #[test]
    fn page_defaults_and_caps_size() {
        let cfg = CoreConfig::new(None, 5, 50).expect("valid config");
        assert_eq!(cfg.page(None, None).unwrap(), Page { offset: 0, limit: 5 });
        assert_eq!(cfg.page(Some(1), Some(500)).unwrap().limit, 50);
    }

    #[test]
    fn page_rejects_zero() {
        let cfg = CoreConfig::default();
        assert!(matches!(cfg.page(Some(0), None), Err(CoreError::Validation(_))));
        assert!(matches!(cfg.page(None, Some(0)), Err(CoreError::Validation(_))));
    }

    #[test]
    fn new_rejects_default_above_maximum() {
        let err = CoreConfig::new(None, 200, 100).expect_err("default above maximum");
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn env_values_fall_back_to_defaults() {
        assert_eq!(page_size_from_env_value(None, 20).unwrap(), 20);
        assert_eq!(page_size_from_env_value(Some("  ".into()), 20).unwrap(), 20);
        assert_eq!(page_size_from_env_value(Some("35".into()), 20).unwrap(), 35);
        assert!(page_size_from_env_value(Some("lots".into()), 20).is_err());
        assert_eq!(data_file_from_env_value(Some(" ".into())), None);
        assert_eq!(
            data_file_from_env_value(Some("data/carebook.db".into())),
            Some(PathBuf::from("data/carebook.db"))
        );
    }
}
