use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::attribution::ResourceDelta;
use super::parse_resource_type;
use crate::models::Confidence;

/// Minimum day-over-day increase, in currency units, for a spike.
pub const DEFAULT_SPIKE_THRESHOLD: Decimal = dec!(5);

/// Multiple of the baseline the latest total must exceed.
const SPIKE_BASELINE_FACTOR: Decimal = dec!(1.5);

/// A single increase at or above this amount is large enough to be actionable.
const DOMINANT_INCREASE_FLOOR: Decimal = dec!(5);

/// Share of the summed positive deltas above which the top resource is
/// considered dominant.
const DOMINANT_SHARE: Decimal = dec!(0.65);

pub const NO_SPIKE_SUGGESTION: &str = "No spike detected today.";

/// A requested threshold must be positive; anything else falls back to the
/// default.
pub fn effective_threshold(requested: Option<Decimal>) -> Decimal {
    match requested {
        Some(value) if value > Decimal::ZERO => value,
        _ => DEFAULT_SPIKE_THRESHOLD,
    }
}

/// A day spikes when a positive baseline exists, the latest total clears
/// 1.5x that baseline, and the day-over-day difference clears the threshold.
/// All three conditions are required.
pub fn is_spike(
    baseline: Decimal,
    latest_total: Decimal,
    difference: Decimal,
    threshold: Decimal,
) -> bool {
    baseline > Decimal::ZERO
        && latest_total > baseline * SPIKE_BASELINE_FACTOR
        && difference > threshold
}

/// Grade how clearly the increase points at a single resource.
///
/// High: one resource dominates (at least 5 currency units, and either no
/// runner-up, at least twice the runner-up, or at least 65% of the summed
/// positive deltas). Medium: several resources contributed. Low: no positive
/// delta, or a single delta too small to act on.
pub fn score_confidence(deltas: &[ResourceDelta]) -> Confidence {
    let mut increases: Vec<Decimal> = deltas.iter().map(|d| d.increase).collect();
    increases.sort_unstable_by(|a, b| b.cmp(a));

    let Some(&top) = increases.first() else {
        return Confidence::Low;
    };
    let second = increases.get(1).copied().unwrap_or_default();
    let total_positive: Decimal = increases.iter().sum();
    let top_share = if total_positive > Decimal::ZERO {
        top / total_positive
    } else {
        Decimal::ZERO
    };

    if top >= DOMINANT_INCREASE_FLOOR
        && (second <= Decimal::ZERO || top >= second * dec!(2) || top_share >= DOMINANT_SHARE)
    {
        Confidence::High
    } else if increases.len() >= 2 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Human-readable follow-up for the dashboard, keyed by the top cause's
/// resource type.
pub fn build_suggestion(top_resource_id: Option<&str>, spike_flag: bool) -> String {
    if !spike_flag {
        return NO_SPIKE_SUGGESTION.to_string();
    }

    let resource_type = top_resource_id
        .map(parse_resource_type)
        .unwrap_or_else(|| "unknown".to_string())
        .to_lowercase();

    let text = if resource_type.contains("microsoft.compute/virtualmachines") {
        "VM cost increased. Check VM size, uptime schedule, and autoscaling settings."
    } else if resource_type.contains("microsoft.compute/disks") {
        "Disk cost increased. Check unattached disks and premium tier allocations."
    } else if resource_type.contains("microsoft.network/publicipaddresses") {
        "Public IP cost increased. Review unattached or idle public IPs."
    } else if resource_type.contains("microsoft.web/serverfarms")
        || resource_type.contains("microsoft.web/sites")
    {
        "App Service cost increased. Verify plan tier changes and scaling activity."
    } else {
        "Review this resource in Azure Cost Analysis and compare today versus yesterday usage."
    };
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn deltas(values: &[Decimal]) -> Vec<ResourceDelta> {
        values
            .iter()
            .enumerate()
            .map(|(i, &increase)| ResourceDelta {
                resource_id: format!("res-{i}"),
                increase,
            })
            .collect()
    }

    #[test]
    fn spike_requires_all_three_conditions() {
        let threshold = DEFAULT_SPIKE_THRESHOLD;
        // All three hold.
        assert!(is_spike(dec!(10), dec!(20), dec!(8), threshold));
        // Zero baseline can never spike.
        assert!(!is_spike(dec!(0), dec!(20), dec!(8), threshold));
        // Latest at exactly 1.5x baseline is not above it.
        assert!(!is_spike(dec!(10), dec!(15), dec!(8), threshold));
        // Difference at exactly the threshold does not clear it.
        assert!(!is_spike(dec!(10), dec!(20), dec!(5), threshold));
    }

    #[test]
    fn non_positive_threshold_falls_back_to_default() {
        assert_eq!(effective_threshold(None), DEFAULT_SPIKE_THRESHOLD);
        assert_eq!(effective_threshold(Some(dec!(0))), DEFAULT_SPIKE_THRESHOLD);
        assert_eq!(effective_threshold(Some(dec!(-3))), DEFAULT_SPIKE_THRESHOLD);
        assert_eq!(effective_threshold(Some(dec!(12))), dec!(12));
    }

    #[test]
    fn no_positive_deltas_scores_low() {
        assert_eq!(score_confidence(&[]), Confidence::Low);
    }

    #[test]
    fn single_small_delta_scores_low() {
        assert_eq!(score_confidence(&deltas(&[dec!(4.99)])), Confidence::Low);
    }

    #[test]
    fn single_actionable_delta_scores_high() {
        let scored = score_confidence(&deltas(&[dec!(5)]));
        assert_eq!(scored, Confidence::High);
    }

    #[test]
    fn doubled_runner_up_scores_high() {
        // top 10 vs second 5: top >= second * 2.
        assert_eq!(
            score_confidence(&deltas(&[dec!(10), dec!(5)])),
            Confidence::High
        );
    }

    #[test]
    fn dominant_share_scores_high() {
        // top 13 of 20 total = 0.65 share, though below twice the runner-up.
        assert_eq!(
            score_confidence(&deltas(&[dec!(13), dec!(7)])),
            Confidence::High
        );
    }

    #[test]
    fn split_increase_scores_medium() {
        // 8 vs 7: no dominance test passes, two contributors.
        assert_eq!(
            score_confidence(&deltas(&[dec!(8), dec!(7)])),
            Confidence::Medium
        );
    }

    #[test]
    fn many_small_deltas_score_medium() {
        assert_eq!(
            score_confidence(&deltas(&[dec!(2), dec!(2), dec!(1)])),
            Confidence::Medium
        );
    }

    #[test]
    fn high_confidence_implies_actionable_top_delta() {
        // Property sweep: High always comes with a top delta of at least 5.
        let cases: Vec<Vec<Decimal>> = vec![
            vec![dec!(4)],
            vec![dec!(5)],
            vec![dec!(6), dec!(3)],
            vec![dec!(9), dec!(8), dec!(1)],
            vec![dec!(100), dec!(1)],
        ];
        for case in cases {
            let scored = score_confidence(&deltas(&case));
            if scored == Confidence::High {
                assert!(case.iter().copied().max().unwrap() >= dec!(5));
            }
        }
    }

    #[test]
    fn suggestions_follow_resource_type() {
        let vm = "/subscriptions/s/resourceGroups/g/providers/Microsoft.Compute/virtualMachines/vm";
        let disk = "/subscriptions/s/resourceGroups/g/providers/Microsoft.Compute/disks/d";
        let ip = "/subscriptions/s/resourceGroups/g/providers/Microsoft.Network/publicIPAddresses/p";
        let app = "/subscriptions/s/resourceGroups/g/providers/Microsoft.Web/sites/a";
        let sql = "/subscriptions/s/resourceGroups/g/providers/Microsoft.Sql/servers/x/databases/y";

        assert!(build_suggestion(Some(vm), true).starts_with("VM cost increased"));
        assert!(build_suggestion(Some(disk), true).starts_with("Disk cost increased"));
        assert!(build_suggestion(Some(ip), true).starts_with("Public IP cost increased"));
        assert!(build_suggestion(Some(app), true).starts_with("App Service cost increased"));
        assert!(build_suggestion(Some(sql), true).starts_with("Review this resource"));
        assert_eq!(build_suggestion(Some(vm), false), NO_SPIKE_SUGGESTION);
        assert!(build_suggestion(None, true).starts_with("Review this resource"));
    }
}
