use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::errors::AppError;
use crate::models::{Proposal, ProposalAction, ValuedRow};
use crate::services::statistics_service::sector_totals;

/// Differences smaller than this share of total value are left alone.
pub const DEAD_ZONE: f64 = 0.01;

/// Rejects allocations that cannot be acted on: empty maps, blank sectors,
/// percents outside [0, 100], or totals above 100.
pub fn validate_target(target: &BTreeMap<String, f64>) -> Result<(), AppError> {
    if target.is_empty() {
        return Err(AppError::Validation("target_allocation must not be empty".to_string()));
    }

    for (sector, percent) in target {
        if sector.trim().is_empty() {
            return Err(AppError::Validation("target_allocation has a blank sector".to_string()));
        }
        if !percent.is_finite() || *percent < 0.0 || *percent > 100.0 {
            return Err(AppError::Validation(format!(
                "target for {} must be between 0 and 100, got {}",
                sector, percent
            )));
        }
    }

    let total: f64 = target.values().sum();
    if total > 100.0 + 1e-9 {
        return Err(AppError::Validation(format!(
            "target_allocation sums to {:.2}%, which exceeds 100%",
            total
        )));
    }
    Ok(())
}

/// Sector-level buy/sell deltas toward `target` (percent of total value),
/// largest first.
pub fn propose(rows: &[ValuedRow], target: &BTreeMap<String, f64>) -> Vec<Proposal> {
    let total: f64 = rows.iter().map(|r| r.current_value).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let current = sector_totals(rows);
    let threshold = total * DEAD_ZONE;

    let mut proposals: Vec<Proposal> = target
        .iter()
        .filter_map(|(sector, percent)| {
            let current_value = current.get(sector).copied().unwrap_or(0.0);
            let target_value = total * percent / 100.0;
            let diff = target_value - current_value;
            if diff.abs() < threshold {
                return None;
            }

            Some(Proposal {
                sector: sector.clone(),
                action: if diff > 0.0 { ProposalAction::Buy } else { ProposalAction::Sell },
                amount: diff.abs(),
                current_value,
                target_value,
                current_percent: current_value / total * 100.0,
                target_percent: *percent,
            })
        })
        .collect();

    proposals.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(Ordering::Equal));
    proposals
}
