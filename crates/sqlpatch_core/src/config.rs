//! Apply configuration.

use crate::error::{ApplyError, ApplyResult};

/// Savepoint name used when none is configured.
pub const DEFAULT_SAVEPOINT: &str = "changeset_apply";

/// Configuration for applying a changeset.
#[derive(Debug, Clone)]
pub struct ApplyConfig {
    /// Name of the savepoint that brackets the apply.
    pub savepoint_name: String,

    /// Whether to defer foreign-key checks until the savepoint is released,
    /// so rows may reference rows that appear later in the changeset.
    pub defer_foreign_keys: bool,

    /// Match pre-image values with `IS ?` instead of `= ?`, which lets a
    /// NULL pre-image value match a NULL column.
    pub null_safe_predicates: bool,

    /// Apply everything, then roll back instead of releasing the savepoint.
    pub dry_run: bool,

    /// Minimum advance, in percent of the changeset, between progress events.
    /// Zero or negative disables progress events.
    pub progress_step: f64,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            savepoint_name: DEFAULT_SAVEPOINT.to_string(),
            defer_foreign_keys: true,
            null_safe_predicates: false,
            dry_run: false,
            progress_step: 0.1,
        }
    }
}

impl ApplyConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the savepoint name.
    #[must_use]
    pub fn savepoint_name(mut self, name: impl Into<String>) -> Self {
        self.savepoint_name = name.into();
        self
    }

    /// Sets whether foreign-key checks are deferred during the apply.
    #[must_use]
    pub const fn defer_foreign_keys(mut self, value: bool) -> Self {
        self.defer_foreign_keys = value;
        self
    }

    /// Sets whether predicates use `IS` instead of `=`.
    #[must_use]
    pub const fn null_safe_predicates(mut self, value: bool) -> Self {
        self.null_safe_predicates = value;
        self
    }

    /// Sets whether the apply is rolled back after succeeding.
    #[must_use]
    pub const fn dry_run(mut self, value: bool) -> Self {
        self.dry_run = value;
        self
    }

    /// Sets the progress reporting step in percent.
    #[must_use]
    pub const fn progress_step(mut self, percent: f64) -> Self {
        self.progress_step = percent;
        self
    }

    /// Checks that the configuration can be used.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::InvalidConfig`] for an empty savepoint name or a
    /// NaN progress step.
    pub fn validate(&self) -> ApplyResult<()> {
        if self.savepoint_name.trim().is_empty() {
            return Err(ApplyError::invalid_config("savepoint name is empty"));
        }
        if self.progress_step.is_nan() {
            return Err(ApplyError::invalid_config("progress step is NaN"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ApplyConfig::default();
        assert_eq!(config.savepoint_name, DEFAULT_SAVEPOINT);
        assert!(config.defer_foreign_keys);
        assert!(!config.null_safe_predicates);
        assert!(!config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = ApplyConfig::new()
            .savepoint_name("sync")
            .dry_run(true)
            .defer_foreign_keys(false)
            .progress_step(5.0);

        assert_eq!(config.savepoint_name, "sync");
        assert!(config.dry_run);
        assert!(!config.defer_foreign_keys);
        assert_eq!(config.progress_step, 5.0);
    }

    #[test]
    fn validation() {
        assert!(ApplyConfig::new().savepoint_name(" ").validate().is_err());
        assert!(ApplyConfig::new().progress_step(f64::NAN).validate().is_err());
    }
}
