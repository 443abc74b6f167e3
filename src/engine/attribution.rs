use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{CauseAttribution, CostSample};

/// A strictly positive day-over-day cost increase for one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDelta {
    pub resource_id: String,
    pub increase: Decimal,
}

/// Resource identifiers compare case-insensitively everywhere.
pub fn normalize_resource_id(resource_id: &str) -> String {
    resource_id.trim().to_lowercase()
}

/// Compute the strictly positive deltas between `latest` and `previous` over
/// the union of resources seen on either date. A resource absent on one of
/// the days counts as zero for that day.
pub fn positive_increases(
    samples: &[CostSample],
    latest: NaiveDate,
    previous: NaiveDate,
) -> Vec<ResourceDelta> {
    let latest_by_resource = totals_by_resource(samples, latest);
    let previous_by_resource = totals_by_resource(samples, previous);

    let mut deltas = Vec::new();
    for (key, (display_id, latest_cost)) in &latest_by_resource {
        let previous_cost = previous_by_resource
            .get(key)
            .map(|(_, cost)| *cost)
            .unwrap_or_default();
        let increase = *latest_cost - previous_cost;
        if increase > Decimal::ZERO {
            deltas.push(ResourceDelta {
                resource_id: display_id.clone(),
                increase,
            });
        }
    }
    // Resources that disappeared entirely can only have shrunk, so the
    // previous-only side of the union never yields a positive delta.
    deltas
}

/// Pick the resource with the strictly largest increase. An exact tie is
/// broken by whichever candidate is enumerated first.
pub fn top_cause(deltas: &[ResourceDelta]) -> Option<CauseAttribution> {
    let mut top: Option<&ResourceDelta> = None;
    for delta in deltas {
        if top.map_or(true, |t| delta.increase > t.increase) {
            top = Some(delta);
        }
    }
    top.map(|delta| CauseAttribution {
        resource_id: delta.resource_id.clone(),
        resource_name: parse_resource_name(&delta.resource_id),
        resource_type: parse_resource_type(&delta.resource_id),
        increase: delta.increase,
    })
}

fn totals_by_resource(
    samples: &[CostSample],
    date: NaiveDate,
) -> HashMap<String, (String, Decimal)> {
    let mut totals: HashMap<String, (String, Decimal)> = HashMap::new();
    for sample in samples.iter().filter(|s| s.date == date) {
        let key = normalize_resource_id(&sample.resource_id);
        let entry = totals
            .entry(key)
            .or_insert_with(|| (sample.resource_id.clone(), Decimal::ZERO));
        entry.1 += sample.cost;
    }
    totals
}

/// Last path segment of an ARM resource identifier.
pub fn parse_resource_name(resource_id: &str) -> String {
    segments(resource_id)
        .last()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "Unknown Resource".to_string())
}

/// Provider namespace plus the alternating type segments that follow the
/// `providers` path marker, e.g. `Microsoft.Compute/virtualMachines`.
/// Identifiers without the marker map to `unknown`.
pub fn parse_resource_type(resource_id: &str) -> String {
    let parts: Vec<&str> = segments(resource_id).collect();
    let Some(marker) = parts
        .iter()
        .position(|part| part.eq_ignore_ascii_case("providers"))
    else {
        return "unknown".to_string();
    };
    let Some(provider) = parts.get(marker + 1) else {
        return "unknown".to_string();
    };

    let type_segments: Vec<&str> = parts[marker + 2..].iter().step_by(2).copied().collect();
    if type_segments.is_empty() {
        provider.to_string()
    } else {
        format!("{provider}/{}", type_segments.join("/"))
    }
}

fn segments(resource_id: &str) -> impl Iterator<Item = &str> {
    resource_id
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, n).unwrap()
    }

    const VM: &str = "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm-1";

    #[test]
    fn parses_name_and_type_from_arm_id() {
        assert_eq!(parse_resource_name(VM), "vm-1");
        assert_eq!(parse_resource_type(VM), "Microsoft.Compute/virtualMachines");
    }

    #[test]
    fn nested_types_keep_alternating_segments() {
        let id = "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Sql/servers/sql-1/databases/appdb";
        assert_eq!(parse_resource_name(id), "appdb");
        assert_eq!(parse_resource_type(id), "Microsoft.Sql/servers/databases");
    }

    #[test]
    fn identifiers_without_provider_marker_are_unknown() {
        assert_eq!(parse_resource_type("not-an-arm-id"), "unknown");
        assert_eq!(parse_resource_type(""), "unknown");
        assert_eq!(parse_resource_name(""), "Unknown Resource");
    }

    #[test]
    fn deltas_cover_union_with_missing_day_as_zero() {
        let samples = vec![
            // res-a only yesterday, res-b both days, res-c only today.
            CostSample::new(day(18), "res-a", dec!(5)),
            CostSample::new(day(18), "res-b", dec!(2)),
            CostSample::new(day(19), "res-b", dec!(6)),
            CostSample::new(day(19), "res-c", dec!(3)),
        ];
        let mut deltas = positive_increases(&samples, day(19), day(18));
        deltas.sort_by(|a, b| b.increase.cmp(&a.increase));

        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].resource_id, "res-b");
        assert_eq!(deltas[0].increase, dec!(4));
        assert_eq!(deltas[1].resource_id, "res-c");
        assert_eq!(deltas[1].increase, dec!(3));
    }

    #[test]
    fn resource_ids_merge_case_insensitively() {
        let samples = vec![
            CostSample::new(day(18), "/RES/One", dec!(1)),
            CostSample::new(day(19), "/res/one", dec!(2)),
            CostSample::new(day(19), "/RES/ONE", dec!(2)),
        ];
        let deltas = positive_increases(&samples, day(19), day(18));
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].increase, dec!(3));
    }

    #[test]
    fn top_cause_picks_strictly_largest_increase() {
        let deltas = vec![
            ResourceDelta {
                resource_id: "res-small".into(),
                increase: dec!(1),
            },
            ResourceDelta {
                resource_id: VM.into(),
                increase: dec!(9),
            },
        ];
        let cause = top_cause(&deltas).unwrap();
        assert_eq!(cause.resource_id, VM);
        assert_eq!(cause.resource_name, "vm-1");
        assert_eq!(cause.increase, dec!(9));
    }

    #[test]
    fn exact_tie_still_yields_a_maximal_cause() {
        // The winner between equal deltas is unspecified; assert only that
        // one of the tied resources is chosen with the tied amount.
        let deltas = vec![
            ResourceDelta {
                resource_id: "res-a".into(),
                increase: dec!(4),
            },
            ResourceDelta {
                resource_id: "res-b".into(),
                increase: dec!(4),
            },
        ];
        let cause = top_cause(&deltas).unwrap();
        assert!(cause.resource_id == "res-a" || cause.resource_id == "res-b");
        assert_eq!(cause.increase, dec!(4));
    }

    #[test]
    fn no_positive_delta_means_no_cause() {
        let samples = vec![
            CostSample::new(day(18), "res-a", dec!(5)),
            CostSample::new(day(19), "res-a", dec!(5)),
        ];
        let deltas = positive_increases(&samples, day(19), day(18));
        assert!(deltas.is_empty());
        assert!(top_cause(&deltas).is_none());
    }
}
