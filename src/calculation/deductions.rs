//! Deduction resolution.
//!
//! Deductions are either supplied by the operator for a single run or derived
//! from a versioned [`DeductionProfile`]. The caller pins the profile version
//! it expects; a profile edited since then is rejected rather than applied.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::{DeductionMode, DeductionProfile};

use super::compensation::round_krw;

/// Operator-supplied deduction amounts, all in whole KRW.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualDeductions {
    /// Income tax withheld.
    pub withholding_tax_krw: i64,
    /// Social insurance contributions.
    pub social_insurance_krw: i64,
    /// Any other deduction.
    pub other_deductions_krw: i64,
    /// Free-form named amounts recorded alongside the run. Informational only;
    /// they do not add to the total.
    #[serde(default)]
    pub breakdown: BTreeMap<String, i64>,
}

impl ManualDeductions {
    /// Checks that every amount, including breakdown entries, is non-negative.
    pub fn validate(&self) -> EngineResult<()> {
        let named = [
            ("withholdingTaxKrw", self.withholding_tax_krw),
            ("socialInsuranceKrw", self.social_insurance_krw),
            ("otherDeductionsKrw", self.other_deductions_krw),
        ];
        for (field, amount) in named {
            ensure_non_negative(field, amount)?;
        }
        for (name, amount) in &self.breakdown {
            ensure_non_negative(&format!("deductions.breakdown.{name}"), *amount)?;
        }
        Ok(())
    }
}

fn ensure_non_negative(field: &str, amount: i64) -> EngineResult<()> {
    if amount < 0 {
        return Err(EngineError::validation(format!(
            "{field} must be a non-negative integer"
        )));
    }
    Ok(())
}

/// How deductions for a payroll preview are determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeductionRequest {
    /// Amounts supplied directly.
    Manual(ManualDeductions),
    /// Amounts derived from a stored profile at a pinned version.
    Profile {
        /// Profile to apply.
        profile_id: String,
        /// Version the caller last saw. Must equal the stored version.
        expected_profile_version: i64,
    },
}

impl DeductionRequest {
    /// The mode this request resolves in.
    pub fn mode(&self) -> DeductionMode {
        match self {
            DeductionRequest::Manual(_) => DeductionMode::Manual,
            DeductionRequest::Profile { .. } => DeductionMode::Profile,
        }
    }

    /// The profile this request needs loaded, if any.
    pub fn profile_id(&self) -> Option<&str> {
        match self {
            DeductionRequest::Manual(_) => None,
            DeductionRequest::Profile { profile_id, .. } => Some(profile_id),
        }
    }
}

/// Resolved deduction amounts for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionSummary {
    /// Mode the amounts were resolved in.
    pub mode: DeductionMode,
    /// Income tax withheld.
    pub withholding_tax_krw: i64,
    /// Social insurance contributions.
    pub social_insurance_krw: i64,
    /// Any other deduction.
    pub other_deductions_krw: i64,
    /// Sum of the three amounts above.
    pub total_deductions_krw: i64,
    /// Profile applied, for profile mode.
    pub profile_id: Option<String>,
    /// Profile version applied, for profile mode.
    pub profile_version: Option<i64>,
    /// Structured record of how the amounts were derived.
    pub breakdown: Value,
}

impl DeductionSummary {
    /// Net pay for a gross amount. Not floored: deductions larger than gross
    /// pay produce a negative result.
    pub fn net_pay_krw(&self, gross_pay_krw: i64) -> i64 {
        gross_pay_krw.saturating_sub(self.total_deductions_krw)
    }
}

/// Resolves deductions against a gross amount.
///
/// `profile` is the stored profile looked up for a profile-mode request, or
/// `None` when it does not exist (or is not visible to the caller). It is
/// ignored in manual mode.
///
/// Profile-mode failures, checked in order:
/// - missing profile: `NotFound`
/// - stored version differs from `expected_profile_version`: `Conflict`
/// - profile inactive: `Conflict`
/// - profile mode is not `profile`: `Conflict`
///
/// # Examples
///
/// ```
/// use timepay_engine::calculation::{resolve_deductions, DeductionRequest, ManualDeductions};
///
/// let request = DeductionRequest::Manual(ManualDeductions {
///     withholding_tax_krw: 3_000,
///     social_insurance_krw: 4_000,
///     other_deductions_krw: 500,
///     ..Default::default()
/// });
/// let summary = resolve_deductions(100_000, &request, None).unwrap();
/// assert_eq!(summary.total_deductions_krw, 7_500);
/// assert_eq!(summary.net_pay_krw(100_000), 92_500);
/// ```
pub fn resolve_deductions(
    gross_pay_krw: i64,
    request: &DeductionRequest,
    profile: Option<&DeductionProfile>,
) -> EngineResult<DeductionSummary> {
    let summary = match request {
        DeductionRequest::Manual(manual) => resolve_manual(manual)?,
        DeductionRequest::Profile {
            profile_id,
            expected_profile_version,
        } => {
            let profile = profile
                .filter(|p| p.id == *profile_id)
                .ok_or_else(|| EngineError::not_found("deduction profile not found"))?;
            resolve_profile(gross_pay_krw, profile, *expected_profile_version)?
        }
    };

    debug!(
        mode = ?summary.mode,
        gross_pay_krw,
        total_deductions_krw = summary.total_deductions_krw,
        "resolved deductions"
    );
    Ok(summary)
}

fn resolve_manual(manual: &ManualDeductions) -> EngineResult<DeductionSummary> {
    manual.validate()?;

    let total = manual
        .withholding_tax_krw
        .saturating_add(manual.social_insurance_krw)
        .saturating_add(manual.other_deductions_krw);

    let mut breakdown = Map::new();
    breakdown.insert("mode".into(), json!(DeductionMode::Manual));
    breakdown.insert("withholdingTaxKrw".into(), json!(manual.withholding_tax_krw));
    breakdown.insert("socialInsuranceKrw".into(), json!(manual.social_insurance_krw));
    breakdown.insert("otherDeductionsKrw".into(), json!(manual.other_deductions_krw));
    if !manual.breakdown.is_empty() {
        breakdown.insert("additional".into(), json!(manual.breakdown));
    }

    Ok(DeductionSummary {
        mode: DeductionMode::Manual,
        withholding_tax_krw: manual.withholding_tax_krw,
        social_insurance_krw: manual.social_insurance_krw,
        other_deductions_krw: manual.other_deductions_krw,
        total_deductions_krw: total,
        profile_id: None,
        profile_version: None,
        breakdown: Value::Object(breakdown),
    })
}

fn resolve_profile(
    gross_pay_krw: i64,
    profile: &DeductionProfile,
    expected_version: i64,
) -> EngineResult<DeductionSummary> {
    if profile.version != expected_version {
        warn!(
            profile_id = %profile.id,
            expected_version,
            stored_version = profile.version,
            "deduction profile version mismatch"
        );
        return Err(EngineError::conflict("deduction profile version mismatch"));
    }
    if !profile.active {
        return Err(EngineError::conflict("deduction profile is inactive"));
    }
    if profile.mode != DeductionMode::Profile {
        return Err(EngineError::conflict("deduction profile mode is not profile"));
    }

    let gross = Decimal::from(gross_pay_krw);
    let withholding_rate = profile.withholding_rate.unwrap_or(Decimal::ZERO);
    let social_insurance_rate = profile.social_insurance_rate.unwrap_or(Decimal::ZERO);

    let withholding_tax_krw = round_krw(gross * withholding_rate);
    let social_insurance_krw = round_krw(gross * social_insurance_rate);
    let other_deductions_krw = profile.fixed_other_deduction_krw;
    let total = withholding_tax_krw
        .saturating_add(social_insurance_krw)
        .saturating_add(other_deductions_krw);

    let breakdown = json!({
        "mode": DeductionMode::Profile,
        "withholdingTaxKrw": withholding_tax_krw,
        "socialInsuranceKrw": social_insurance_krw,
        "otherDeductionsKrw": other_deductions_krw,
        "profile": { "id": profile.id, "version": profile.version },
        "additional": {
            "withholdingRate": withholding_rate.to_string(),
            "socialInsuranceRate": social_insurance_rate.to_string(),
            "fixedOtherDeductionKrw": profile.fixed_other_deduction_krw,
        },
    });

    Ok(DeductionSummary {
        mode: DeductionMode::Profile,
        withholding_tax_krw,
        social_insurance_krw,
        other_deductions_krw,
        total_deductions_krw: total,
        profile_id: Some(profile.id.clone()),
        profile_version: Some(profile.version),
        breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn profile(version: i64) -> DeductionProfile {
        DeductionProfile {
            id: "standard".to_string(),
            organization_id: Some("ORG-A".to_string()),
            name: "Standard".to_string(),
            mode: DeductionMode::Profile,
            withholding_rate: Some(Decimal::from_str("0.031").unwrap()),
            social_insurance_rate: Some(Decimal::from_str("0.045").unwrap()),
            fixed_other_deduction_krw: 2_000,
            active: true,
            version,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn profile_request(version: i64) -> DeductionRequest {
        DeductionRequest::Profile {
            profile_id: "standard".to_string(),
            expected_profile_version: version,
        }
    }

    #[test]
    fn test_profile_deductions_on_96000() {
        // 96,000 × 0.031 = 2,976; 96,000 × 0.045 = 4,320; fixed 2,000
        let summary = resolve_deductions(96_000, &profile_request(2), Some(&profile(2))).unwrap();
        assert_eq!(summary.withholding_tax_krw, 2_976);
        assert_eq!(summary.social_insurance_krw, 4_320);
        assert_eq!(summary.other_deductions_krw, 2_000);
        assert_eq!(summary.total_deductions_krw, 9_296);
        assert_eq!(summary.net_pay_krw(96_000), 86_704);
        assert_eq!(summary.profile_version, Some(2));
        assert_eq!(summary.breakdown["profile"]["version"], 2);
    }

    #[test]
    fn test_stale_version_is_a_conflict() {
        let err = resolve_deductions(96_000, &profile_request(1), Some(&profile(2))).unwrap_err();
        assert_eq!(err, EngineError::conflict("deduction profile version mismatch"));
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_missing_profile_is_not_found() {
        let err = resolve_deductions(96_000, &profile_request(1), None).unwrap_err();
        assert_eq!(err.status_code(), 404);

        let mut other = profile(1);
        other.id = "other".to_string();
        let err = resolve_deductions(96_000, &profile_request(1), Some(&other)).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_inactive_and_manual_profiles_conflict() {
        let mut inactive = profile(1);
        inactive.active = false;
        assert_eq!(
            resolve_deductions(96_000, &profile_request(1), Some(&inactive)).unwrap_err(),
            EngineError::conflict("deduction profile is inactive")
        );

        let mut manual = profile(1);
        manual.mode = DeductionMode::Manual;
        assert_eq!(
            resolve_deductions(96_000, &profile_request(1), Some(&manual)).unwrap_err(),
            EngineError::conflict("deduction profile mode is not profile")
        );
    }

    #[test]
    fn test_version_is_checked_before_activity() {
        let mut inactive = profile(3);
        inactive.active = false;
        assert_eq!(
            resolve_deductions(96_000, &profile_request(1), Some(&inactive)).unwrap_err(),
            EngineError::conflict("deduction profile version mismatch")
        );
    }

    #[test]
    fn test_null_rates_count_as_zero() {
        let mut p = profile(1);
        p.withholding_rate = None;
        p.social_insurance_rate = None;
        let summary = resolve_deductions(50_000, &profile_request(1), Some(&p)).unwrap();
        assert_eq!(summary.total_deductions_krw, 2_000);
    }

    #[test]
    fn test_manual_deductions_may_exceed_gross() {
        let request = DeductionRequest::Manual(ManualDeductions {
            withholding_tax_krw: 10_000,
            social_insurance_krw: 5_000,
            other_deductions_krw: 0,
            breakdown: BTreeMap::from([("union_fee".to_string(), 1_000)]),
        });
        let summary = resolve_deductions(12_000, &request, None).unwrap();
        assert_eq!(summary.total_deductions_krw, 15_000);
        assert_eq!(summary.net_pay_krw(12_000), -3_000);
        assert_eq!(summary.breakdown["additional"]["union_fee"], 1_000);
    }

    #[test]
    fn test_manual_negative_amount_is_rejected() {
        let request = DeductionRequest::Manual(ManualDeductions {
            withholding_tax_krw: -1,
            ..Default::default()
        });
        assert_eq!(
            resolve_deductions(12_000, &request, None).unwrap_err(),
            EngineError::validation("withholdingTaxKrw must be a non-negative integer")
        );
    }

    #[test]
    fn test_request_deserializes_tagged_by_mode() {
        let request: DeductionRequest = serde_json::from_str(
            r#"{"mode": "profile", "profile_id": "standard", "expected_profile_version": 2}"#,
        )
        .unwrap();
        assert_eq!(request, profile_request(2));
        assert_eq!(request.mode(), DeductionMode::Profile);
        assert_eq!(request.profile_id(), Some("standard"));
    }
}
