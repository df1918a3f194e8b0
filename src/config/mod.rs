//! Configuration loading and management for the engine.
//!
//! This module loads the engine configuration from a YAML file: feature
//! flags, payroll defaults (hourly rate and multipliers) and leave ledger
//! defaults. Feature flags can additionally be overridden from the
//! environment.
//!
//! # Example
//!
//! ```no_run
//! use timepay_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/engine.yaml").unwrap().into_config();
//! println!("deductions enabled: {}", config.features.payroll_deductions);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    DEDUCTION_PROFILE_ENV, EngineConfig, FeatureFlags, LeaveDefaults, PAYROLL_DEDUCTIONS_ENV,
    PayrollDefaults, TENANCY_ENV, is_truthy,
};
