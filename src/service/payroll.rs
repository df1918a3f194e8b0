//! Payroll preview, confirmation and deduction profile operations.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::access::{Permission, TenantScope, require_permission};
use crate::calculation::{
    DeductionRequest, GrossPayBreakdown, Multipliers, PayableMinutes,
    calculate_gross_pay_breakdown, resolve_deductions,
};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Actor, AttendanceState, DeductionMode, DeductionProfile, EventName, PayrollRun, PayrollState,
};
use crate::store::{DeductionProfileDraft, PeriodQuery, new_id};

use super::{Activity, ServiceContext, ensure_valid_period};

const RUN_ENTITY: &str = "PayrollRun";
const PROFILE_ENTITY: &str = "DeductionProfile";
const RUN_NOT_FOUND: &str = "payroll run not found";
const PROFILE_NOT_FOUND: &str = "deduction profile not found";

/// Input for [`preview_payroll`] and [`preview_payroll_with_deductions`].
#[derive(Debug, Clone, Deserialize)]
pub struct PayrollPreviewInput {
    /// Period start.
    pub period_start: DateTime<FixedOffset>,
    /// Period end, after the start.
    pub period_end: DateTime<FixedOffset>,
    /// Restrict the run to one employee.
    #[serde(default)]
    pub employee_id: Option<String>,
    /// Hourly rate. Falls back to the configured default.
    #[serde(default)]
    pub hourly_rate_krw: Option<i64>,
    /// Multipliers. Fall back to the configured defaults.
    #[serde(default)]
    pub multipliers: Option<Multipliers>,
}

/// A computed run together with the inputs it was priced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayrollPreview {
    /// The persisted run.
    pub run: PayrollRun,
    /// Unrounded per-bucket pay.
    pub breakdown: GrossPayBreakdown,
    /// Hourly rate applied.
    pub hourly_rate_krw: i64,
    /// Multipliers applied.
    pub multipliers: Multipliers,
}

/// Input for [`upsert_deduction_profile`].
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertDeductionProfileInput {
    /// Display name.
    pub name: String,
    /// Application mode.
    pub mode: DeductionMode,
    /// Withholding tax rate in `0..=1`.
    #[serde(default)]
    pub withholding_rate: Option<Decimal>,
    /// Social insurance rate in `0..=1`.
    #[serde(default)]
    pub social_insurance_rate: Option<Decimal>,
    /// Flat amount per run.
    #[serde(default)]
    pub fixed_other_deduction_krw: i64,
    /// Whether the profile may be used. Defaults to true.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Rate-applied minute totals before deductions.
struct PricedPeriod {
    totals: PayableMinutes,
    source_record_count: usize,
    breakdown: GrossPayBreakdown,
    hourly_rate_krw: i64,
    multipliers: Multipliers,
}

fn ensure_rate(field: &str, rate: Option<Decimal>) -> EngineResult<()> {
    if rate.is_some_and(|r| r < Decimal::ZERO || r > Decimal::ONE) {
        return Err(EngineError::validation(format!(
            "{field} must be between 0 and 1"
        )));
    }
    Ok(())
}

fn validate_profile_input(profile_id: &str, input: &UpsertDeductionProfileInput) -> EngineResult<()> {
    if profile_id.trim().is_empty() {
        return Err(EngineError::validation("profileId is required"));
    }
    if input.name.trim().is_empty() {
        return Err(EngineError::validation("name is required"));
    }
    ensure_rate("withholdingRate", input.withholding_rate)?;
    ensure_rate("socialInsuranceRate", input.social_insurance_rate)?;
    if input.fixed_other_deduction_krw < 0 {
        return Err(EngineError::validation(
            "fixedOtherDeductionKrw must be a non-negative integer",
        ));
    }
    Ok(())
}

/// Sums the approved records of the period and prices them.
///
/// Records without a check-out are not payable and are skipped.
async fn price_period(
    ctx: &ServiceContext,
    scope: &TenantScope,
    input: &PayrollPreviewInput,
) -> EngineResult<PricedPeriod> {
    ensure_valid_period(&input.period_start, &input.period_end)?;
    let hourly_rate_krw = input
        .hourly_rate_krw
        .unwrap_or(ctx.config.payroll.default_hourly_rate_krw);
    if hourly_rate_krw <= 0 {
        return Err(EngineError::validation(
            "hourlyRateKrw must be a positive integer",
        ));
    }
    let multipliers = input.multipliers.unwrap_or(ctx.config.payroll.multipliers);
    multipliers.validate()?;

    if let Some(employee_id) = &input.employee_id {
        ctx.require_employee(scope, employee_id).await?;
    }

    let query = PeriodQuery {
        organization_id: scope.organization_id().map(str::to_string),
        employee_id: input.employee_id.clone(),
        period_start: input.period_start,
        period_end: input.period_end,
    };
    let records = ctx
        .data
        .attendance
        .list(&query, Some(AttendanceState::Approved))
        .await?;

    let totals = records
        .iter()
        .filter_map(|record| record.work_interval())
        .map(|interval| interval.split())
        .fold(PayableMinutes::default(), |acc, minutes| acc + minutes);
    let breakdown = calculate_gross_pay_breakdown(&totals, hourly_rate_krw, &multipliers);

    Ok(PricedPeriod {
        totals,
        source_record_count: records.len(),
        breakdown,
        hourly_rate_krw,
        multipliers,
    })
}

fn new_run(
    scope: &TenantScope,
    input: &PayrollPreviewInput,
    priced: &PricedPeriod,
) -> PayrollRun {
    let now = Utc::now();
    PayrollRun {
        id: new_id("PR"),
        organization_id: scope.organization_id().map(str::to_string),
        employee_id: input.employee_id.clone(),
        period_start: input.period_start,
        period_end: input.period_end,
        state: PayrollState::Previewed,
        totals: priced.totals,
        gross_pay_krw: priced.breakdown.gross_pay_krw,
        deductions: None,
        net_pay_krw: None,
        source_record_count: priced.source_record_count,
        confirmed_at: None,
        confirmed_by: None,
        created_at: now,
        updated_at: now,
    }
}

fn into_preview(run: PayrollRun, priced: PricedPeriod) -> PayrollPreview {
    PayrollPreview {
        run,
        breakdown: priced.breakdown,
        hourly_rate_krw: priced.hourly_rate_krw,
        multipliers: priced.multipliers,
    }
}

/// Computes gross pay over the approved attendance of a period and stores
/// the result as a `PREVIEWED` run.
pub async fn preview_payroll(
    ctx: &ServiceContext,
    input: PayrollPreviewInput,
) -> EngineResult<PayrollPreview> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(
        actor,
        Permission::PayrollRunPreview,
        "payroll preview requires admin or payroll_operator role",
    )?;

    let priced = price_period(ctx, &scope, &input).await?;
    let run = ctx.data.payroll.insert(new_run(&scope, &input, &priced)).await?;
    info!(
        run_id = %run.id,
        actor_id = %actor.id,
        source_record_count = run.source_record_count,
        gross_pay_krw = run.gross_pay_krw,
        "payroll previewed"
    );

    ctx.record(
        actor,
        Activity::new("payroll.calculated", RUN_ENTITY, &run.id)
            .event(EventName::PayrollCalculated)
            .organization(run.organization_id.clone())
            .payload(json!({
                "employeeId": run.employee_id,
                "periodStart": run.period_start,
                "periodEnd": run.period_end,
                "totals": run.totals,
                "grossPayKrw": run.gross_pay_krw,
                "sourceRecordCount": run.source_record_count,
            })),
    )
    .await?;
    Ok(into_preview(run, priced))
}

/// Fails with a conflict, audited as a disabled preview, when `enabled` is
/// false.
async fn ensure_feature(
    ctx: &ServiceContext,
    actor: &Actor,
    scope: &TenantScope,
    enabled: bool,
    flag: &str,
) -> EngineResult<()> {
    if enabled {
        return Ok(());
    }
    let error = EngineError::conflict(format!("{flag} feature flag is disabled"));
    warn!(actor_id = %actor.id, flag, "payroll deduction preview disabled");
    ctx.record(
        actor,
        Activity::untargeted("payroll.deductions.preview_disabled", RUN_ENTITY)
            .organization(scope.organization_id().map(str::to_string))
            .payload(json!({
                "status": error.status_code(),
                "message": error.to_string(),
            })),
    )
    .await?;
    Err(error)
}

/// Computes gross pay like [`preview_payroll`], then applies deductions
/// and stores the run with its net pay.
///
/// Requires the payroll deductions feature, and for profile mode the
/// deduction profile feature as well; either being off is an audited
/// conflict. Any other conflict (stale profile version, inactive profile,
/// profile of the wrong mode) is audited too before it is returned.
/// Validation failures are not audited.
pub async fn preview_payroll_with_deductions(
    ctx: &ServiceContext,
    input: PayrollPreviewInput,
    deductions: DeductionRequest,
) -> EngineResult<PayrollPreview> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(
        actor,
        Permission::PayrollRunPreview,
        "payroll preview requires admin or payroll_operator role",
    )?;

    let features = ctx.config.features;
    ensure_feature(
        ctx,
        actor,
        &scope,
        features.payroll_deductions,
        "payroll_deductions_v1",
    )
    .await?;
    if deductions.mode() == DeductionMode::Profile {
        ensure_feature(
            ctx,
            actor,
            &scope,
            features.deduction_profile,
            "deduction_profile_v1",
        )
        .await?;
    }

    match price_with_deductions(ctx, actor, &scope, &input, &deductions).await {
        Err(error) if error.is_conflict() => {
            warn!(actor_id = %actor.id, %error, "payroll deduction preview conflict");
            ctx.record(
                actor,
                Activity::untargeted("payroll.deductions.preview_conflict", RUN_ENTITY)
                    .organization(scope.organization_id().map(str::to_string))
                    .payload(json!({
                        "status": error.status_code(),
                        "message": error.to_string(),
                        "deductionMode": deductions.mode(),
                        "profileId": deductions.profile_id(),
                    })),
            )
            .await?;
            Err(error)
        }
        result => result,
    }
}

async fn price_with_deductions(
    ctx: &ServiceContext,
    actor: &Actor,
    scope: &TenantScope,
    input: &PayrollPreviewInput,
    deductions: &DeductionRequest,
) -> EngineResult<PayrollPreview> {
    let priced = price_period(ctx, scope, input).await?;

    // The version check and the amounts use this one snapshot.
    let profile = match deductions.profile_id() {
        Some(profile_id) => ctx
            .data
            .deduction_profiles
            .find(profile_id)
            .await?
            .filter(|p| scope.permits(p.organization_id.as_deref())),
        None => None,
    };
    let summary = resolve_deductions(priced.breakdown.gross_pay_krw, deductions, profile.as_ref())?;
    let net_pay_krw = summary.net_pay_krw(priced.breakdown.gross_pay_krw);

    let run = PayrollRun {
        deductions: Some(summary),
        net_pay_krw: Some(net_pay_krw),
        ..new_run(scope, input, &priced)
    };
    let run = ctx.data.payroll.insert(run).await?;
    info!(
        run_id = %run.id,
        actor_id = %actor.id,
        gross_pay_krw = run.gross_pay_krw,
        net_pay_krw,
        "payroll previewed with deductions"
    );
    if net_pay_krw < 0 {
        warn!(run_id = %run.id, net_pay_krw, "deductions exceed gross pay");
    }

    let summary = run.deductions.as_ref();
    ctx.record(
        actor,
        Activity::new("payroll.deductions_calculated", RUN_ENTITY, &run.id)
            .event(EventName::PayrollDeductionsCalculated)
            .organization(run.organization_id.clone())
            .payload(json!({
                "employeeId": run.employee_id,
                "periodStart": run.period_start,
                "periodEnd": run.period_end,
                "grossPayKrw": run.gross_pay_krw,
                "deductionMode": deductions.mode(),
                "totalDeductionsKrw": summary.map(|s| s.total_deductions_krw),
                "netPayKrw": net_pay_krw,
                "deductionProfileId": summary.and_then(|s| s.profile_id.clone()),
                "deductionProfileVersion": summary.and_then(|s| s.profile_version),
            })),
    )
    .await?;
    Ok(into_preview(run, priced))
}

/// Confirms a `PREVIEWED` run. Confirming twice is a conflict.
pub async fn confirm_payroll_run(ctx: &ServiceContext, run_id: &str) -> EngineResult<PayrollRun> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(
        actor,
        Permission::PayrollRunConfirm,
        "payroll confirm requires admin or payroll_operator role",
    )?;

    let existing = scope.visible(ctx.data.payroll.find(run_id).await?, RUN_NOT_FOUND)?;
    if existing.state != PayrollState::Previewed {
        warn!(run_id = %existing.id, "payroll run already confirmed");
        return Err(EngineError::conflict("payroll run already confirmed"));
    }

    let run = ctx
        .data
        .payroll
        .confirm(&existing.id, &actor.id, Utc::now())
        .await?;
    info!(run_id = %run.id, actor_id = %actor.id, "payroll confirmed");

    ctx.record(
        actor,
        Activity::new("payroll.confirmed", RUN_ENTITY, &run.id)
            .event(EventName::PayrollConfirmed)
            .organization(run.organization_id.clone())
            .payload(json!({
                "employeeId": run.employee_id,
                "grossPayKrw": run.gross_pay_krw,
                "netPayKrw": run.net_pay_krw,
                "confirmedAt": run.confirmed_at,
            })),
    )
    .await?;
    Ok(run)
}

/// Lists runs in the caller's tenant, newest first.
pub async fn list_payroll_runs(
    ctx: &ServiceContext,
    employee_id: Option<&str>,
    state: Option<PayrollState>,
) -> EngineResult<Vec<PayrollRun>> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(actor, Permission::PayrollRunList, "insufficient permissions")?;
    ctx.data
        .payroll
        .list(scope.organization_id(), employee_id, state)
        .await
}

/// Reads a deduction profile.
pub async fn read_deduction_profile(
    ctx: &ServiceContext,
    profile_id: &str,
) -> EngineResult<DeductionProfile> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(
        actor,
        Permission::PayrollDeductionProfileRead,
        "insufficient permissions",
    )?;

    let profile = scope.visible(
        ctx.data.deduction_profiles.find(profile_id).await?,
        PROFILE_NOT_FOUND,
    )?;
    ctx.record(
        actor,
        Activity::new("payroll.deduction_profile.read", PROFILE_ENTITY, &profile.id)
            .organization(profile.organization_id.clone())
            .payload(json!({ "version": profile.version })),
    )
    .await?;
    Ok(profile)
}

/// Creates a deduction profile at version 1, or overwrites it and bumps the
/// version.
///
/// A new profile is owned by the caller's organization (none when
/// unscoped). A profile id already owned by another tenant is reported as
/// not found.
pub async fn upsert_deduction_profile(
    ctx: &ServiceContext,
    profile_id: &str,
    input: UpsertDeductionProfileInput,
) -> EngineResult<DeductionProfile> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(
        actor,
        Permission::PayrollDeductionProfileWrite,
        "insufficient permissions",
    )?;
    validate_profile_input(profile_id, &input)?;
    let profile_id = profile_id.trim();

    let profile = ctx
        .data
        .deduction_profiles
        .upsert(
            &scope,
            DeductionProfileDraft {
                id: profile_id.to_string(),
                organization_id: scope.organization_id().map(str::to_string),
                name: input.name.trim().to_string(),
                mode: input.mode,
                withholding_rate: input.withholding_rate,
                social_insurance_rate: input.social_insurance_rate,
                fixed_other_deduction_krw: input.fixed_other_deduction_krw,
                active: input.active,
            },
        )
        .await?;
    info!(profile_id = %profile.id, version = profile.version, actor_id = %actor.id, "deduction profile updated");

    ctx.record(
        actor,
        Activity::new("payroll.deduction_profile.updated", PROFILE_ENTITY, &profile.id)
            .event(EventName::DeductionProfileUpdated)
            .organization(profile.organization_id.clone())
            .payload(json!({
                "name": profile.name,
                "mode": profile.mode,
                "withholdingRate": profile.withholding_rate,
                "socialInsuranceRate": profile.social_insurance_rate,
                "fixedOtherDeductionKrw": profile.fixed_other_deduction_krw,
                "active": profile.active,
                "version": profile.version,
            })),
    )
    .await?;
    Ok(profile)
}
