use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::attribution::normalize_resource_id;
use super::CostSample;

/// Fraction of the prior day's total (and distinct-resource count) below
/// which yesterday is treated as a partial ingestion.
const COMPLETENESS_RATIO: Decimal = dec!(0.4);

/// Pick the most recent calendar date with complete billing data.
///
/// Providers commit cost rows with lag, so the newest day is often a partial
/// read. Only dates up to `current_date - 1` are considered. When yesterday
/// has rows, it is accepted unless both its total and its distinct-resource
/// count collapse below 40% of the prior day's; in that case the prior day is
/// returned. When yesterday has no rows at all, the most recent date with any
/// data wins. `None` means there is nothing to evaluate.
pub fn resolve_billing_date(samples: &[CostSample], current_date: NaiveDate) -> Option<NaiveDate> {
    let yesterday = current_date.pred_opt()?;

    let mut per_date: BTreeMap<NaiveDate, DayShape> = BTreeMap::new();
    for sample in samples.iter().filter(|s| s.date <= yesterday) {
        let entry = per_date.entry(sample.date).or_default();
        entry.total += sample.cost;
        entry.resources.insert(normalize_resource_id(&sample.resource_id));
    }

    let (&newest, _) = per_date.last_key_value()?;
    if newest != yesterday {
        return Some(newest);
    }

    let prior = yesterday.pred_opt()?;
    match (per_date.get(&yesterday), per_date.get(&prior)) {
        (Some(latest), Some(previous)) if looks_incomplete(latest, previous) => Some(prior),
        _ => Some(yesterday),
    }
}

#[derive(Debug, Default)]
struct DayShape {
    total: Decimal,
    resources: HashSet<String>,
}

fn looks_incomplete(latest: &DayShape, previous: &DayShape) -> bool {
    let count_floor = std::cmp::max(1, previous.resources.len() * 2 / 5);
    latest.total < previous.total * COMPLETENESS_RATIO
        && latest.resources.len() < count_floor
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, n).unwrap()
    }

    fn sample(n: u32, resource: &str, cost: Decimal) -> CostSample {
        CostSample::new(day(n), resource, cost)
    }

    #[test]
    fn no_records_resolves_to_none() {
        assert_eq!(resolve_billing_date(&[], day(20)), None);
    }

    #[test]
    fn complete_yesterday_is_accepted() {
        let samples = vec![
            sample(18, "res-a", dec!(10)),
            sample(18, "res-b", dec!(10)),
            sample(19, "res-a", dec!(9)),
            sample(19, "res-b", dec!(11)),
        ];
        assert_eq!(resolve_billing_date(&samples, day(20)), Some(day(19)));
    }

    #[test]
    fn partial_yesterday_falls_back_to_prior_day() {
        // Yesterday: total 3 over 1 resource. Prior day: total 10 over 5.
        // Both ratios sit below 40%, so the prior day wins.
        let samples = vec![
            sample(18, "res-a", dec!(2)),
            sample(18, "res-b", dec!(2)),
            sample(18, "res-c", dec!(2)),
            sample(18, "res-d", dec!(2)),
            sample(18, "res-e", dec!(2)),
            sample(19, "res-a", dec!(3)),
        ];
        assert_eq!(resolve_billing_date(&samples, day(20)), Some(day(18)));
    }

    #[test]
    fn low_total_alone_does_not_reject_yesterday() {
        // Total collapsed but the resource count held up, so yesterday stands.
        let samples = vec![
            sample(18, "res-a", dec!(5)),
            sample(18, "res-b", dec!(5)),
            sample(19, "res-a", dec!(1)),
            sample(19, "res-b", dec!(1)),
        ];
        assert_eq!(resolve_billing_date(&samples, day(20)), Some(day(19)));
    }

    #[test]
    fn few_resources_alone_does_not_reject_yesterday() {
        let samples = vec![
            sample(18, "res-a", dec!(2)),
            sample(18, "res-b", dec!(2)),
            sample(18, "res-c", dec!(2)),
            sample(18, "res-d", dec!(2)),
            sample(18, "res-e", dec!(2)),
            sample(19, "res-a", dec!(9)),
        ];
        assert_eq!(resolve_billing_date(&samples, day(20)), Some(day(19)));
    }

    #[test]
    fn missing_yesterday_resolves_to_newest_date_with_data() {
        let samples = vec![sample(14, "res-a", dec!(1)), sample(16, "res-a", dec!(2))];
        assert_eq!(resolve_billing_date(&samples, day(20)), Some(day(16)));
    }

    #[test]
    fn future_and_current_dates_are_ignored() {
        let samples = vec![
            sample(19, "res-a", dec!(4)),
            sample(20, "res-a", dec!(50)),
            sample(21, "res-a", dec!(60)),
        ];
        assert_eq!(resolve_billing_date(&samples, day(20)), Some(day(19)));
    }

    #[test]
    fn partial_yesterday_without_prior_day_is_still_accepted() {
        let samples = vec![sample(19, "res-a", dec!(1))];
        assert_eq!(resolve_billing_date(&samples, day(20)), Some(day(19)));
    }
}
