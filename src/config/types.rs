//! Configuration types for the engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from the YAML configuration file. Every section has
//! defaults, so a partial file (or none at all) yields a working engine.

use serde::{Deserialize, Serialize};

use crate::calculation::{
    DEFAULT_ANNUAL_GRANT_DAYS, DEFAULT_CARRY_OVER_CAP_DAYS, DEFAULT_GRANTED_DAYS, Multipliers,
};
use crate::error::{EngineError, EngineResult};

/// Environment variable overriding [`FeatureFlags::tenancy`].
pub const TENANCY_ENV: &str = "TIMEPAY_TENANCY";
/// Environment variable overriding [`FeatureFlags::payroll_deductions`].
pub const PAYROLL_DEDUCTIONS_ENV: &str = "TIMEPAY_PAYROLL_DEDUCTIONS";
/// Environment variable overriding [`FeatureFlags::deduction_profile`].
pub const DEDUCTION_PROFILE_ENV: &str = "TIMEPAY_DEDUCTION_PROFILE";

/// Runtime feature switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Confine non-platform actors to their own organization.
    pub tenancy: bool,
    /// Allow payroll previews with deductions.
    pub payroll_deductions: bool,
    /// Allow profile-mode deductions.
    pub deduction_profile: bool,
}

impl FeatureFlags {
    /// Every feature switched on.
    pub fn all_enabled() -> Self {
        Self {
            tenancy: true,
            payroll_deductions: true,
            deduction_profile: true,
        }
    }

    /// Applies overrides read through `lookup`.
    ///
    /// A variable that is present replaces the flag: truthy values
    /// (`1`, `true`, `yes`, `on`, case-insensitive) enable it and anything
    /// else disables it. Absent variables leave the flag unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use timepay_engine::config::FeatureFlags;
    ///
    /// let flags = FeatureFlags::default().with_overrides(|name| match name {
    ///     "TIMEPAY_TENANCY" => Some(" Yes ".to_string()),
    ///     _ => None,
    /// });
    /// assert!(flags.tenancy);
    /// assert!(!flags.payroll_deductions);
    /// ```
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets = [
            (TENANCY_ENV, &mut self.tenancy),
            (PAYROLL_DEDUCTIONS_ENV, &mut self.payroll_deductions),
            (DEDUCTION_PROFILE_ENV, &mut self.deduction_profile),
        ];
        for (name, flag) in targets {
            if let Some(raw) = lookup(name) {
                *flag = is_truthy(&raw);
            }
        }
        self
    }
}

/// Whether a raw flag value reads as "on".
pub fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Payroll defaults used when a preview does not supply its own values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayrollDefaults {
    /// Hourly rate in KRW.
    pub default_hourly_rate_krw: i64,
    /// Bucket multipliers.
    pub multipliers: Multipliers,
}

impl Default for PayrollDefaults {
    fn default() -> Self {
        Self {
            default_hourly_rate_krw: 10_000,
            multipliers: Multipliers::default(),
        }
    }
}

/// Leave ledger defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaveDefaults {
    /// Days granted to a ledger created on first use.
    pub default_granted_days: i64,
    /// Days granted per settled year.
    pub annual_grant_days: i64,
    /// Most days carried into a new year.
    pub carry_over_cap_days: i64,
}

impl Default for LeaveDefaults {
    fn default() -> Self {
        Self {
            default_granted_days: DEFAULT_GRANTED_DAYS,
            annual_grant_days: DEFAULT_ANNUAL_GRANT_DAYS,
            carry_over_cap_days: DEFAULT_CARRY_OVER_CAP_DAYS,
        }
    }
}

/// The complete engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Feature switches.
    pub features: FeatureFlags,
    /// Payroll defaults.
    pub payroll: PayrollDefaults,
    /// Leave defaults.
    pub leave: LeaveDefaults,
}

impl EngineConfig {
    /// Checks the loaded values are usable.
    pub fn validate(&self) -> EngineResult<()> {
        if self.payroll.default_hourly_rate_krw <= 0 {
            return Err(EngineError::validation(
                "default_hourly_rate_krw must be positive",
            ));
        }
        self.payroll.multipliers.validate()?;
        if self.leave.default_granted_days < 0 {
            return Err(EngineError::validation(
                "default_granted_days must be non-negative",
            ));
        }
        if self.leave.annual_grant_days <= 0 {
            return Err(EngineError::validation("annual_grant_days must be positive"));
        }
        if self.leave.carry_over_cap_days < 0 {
            return Err(EngineError::validation(
                "carry_over_cap_days must be non-negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy_values() {
        for raw in ["1", "true", "TRUE", " yes ", "On"] {
            assert!(is_truthy(raw), "{raw:?} should be truthy");
        }
        for raw in ["", "0", "false", "enabled", "y"] {
            assert!(!is_truthy(raw), "{raw:?} should not be truthy");
        }
    }

    #[test]
    fn test_present_override_can_disable_a_flag() {
        let flags = FeatureFlags::all_enabled().with_overrides(|name| {
            (name == PAYROLL_DEDUCTIONS_ENV).then(|| "off".to_string())
        });
        assert!(flags.tenancy);
        assert!(!flags.payroll_deductions);
        assert!(flags.deduction_profile);
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.payroll.default_hourly_rate_krw, 10_000);
        assert_eq!(config.leave.annual_grant_days, 15);
        assert_eq!(config.leave.carry_over_cap_days, 5);
        assert_eq!(config.features, FeatureFlags::default());
    }

    #[test]
    fn test_invalid_leave_defaults_are_rejected() {
        let mut config = EngineConfig::default();
        config.leave.annual_grant_days = 0;
        assert!(config.validate().is_err());
    }
}
