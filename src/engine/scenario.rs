use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::FindingType;

/// Synthetic cost scenarios for exercising the detection engine without a
/// live billing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Normal,
    Spike,
    NoisyIncreases,
    MissingData,
    IdleResources,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidScenario(pub String);

impl std::fmt::Display for InvalidScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scenario '{}' is not valid. Use one of: normal, spike, noisy_increases, missing_data, idle_resources.",
            self.0
        )
    }
}

impl std::error::Error for InvalidScenario {}

impl std::str::FromStr for Scenario {
    type Err = InvalidScenario;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "normal" => Ok(Self::Normal),
            "spike" => Ok(Self::Spike),
            "noisy" | "noisy_increases" => Ok(Self::NoisyIncreases),
            "missing" | "missing_data" => Ok(Self::MissingData),
            "idle" | "idle_resources" => Ok(Self::IdleResources),
            _ => Err(InvalidScenario(raw.trim().to_string())),
        }
    }
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Spike => "spike",
            Self::NoisyIncreases => "noisy_increases",
            Self::MissingData => "missing_data",
            Self::IdleResources => "idle_resources",
        }
    }

    pub fn note(&self) -> &'static str {
        match self {
            Self::Normal => "Stable weekday/weekend pattern with normal variance.",
            Self::Spike => {
                "Latest complete billing day has a sharp SQL cost increase to trigger spike detection."
            }
            Self::NoisyIncreases => {
                "Multiple resources increase together, producing a noisy upward trend."
            }
            Self::MissingData => {
                "Latest day is intentionally missing to simulate delayed or incomplete ingestion."
            }
            Self::IdleResources => {
                "Costs are near-zero and idle resource findings are created for savings tests."
            }
        }
    }
}

pub const MIN_SEED_DAYS: i64 = 7;
pub const MAX_SEED_DAYS: i64 = 60;

pub fn clamp_days(days: i64) -> i64 {
    days.clamp(MIN_SEED_DAYS, MAX_SEED_DAYS)
}

#[derive(Debug, Clone)]
pub struct SeedCostRow {
    pub date: NaiveDate,
    pub resource_id: String,
    pub cost: Decimal,
    pub currency: &'static str,
}

#[derive(Debug, Clone)]
pub struct SeedWasteFinding {
    pub finding_type: FindingType,
    pub resource_id: String,
    pub resource_name: &'static str,
    pub estimated_monthly_cost: Decimal,
    pub detected_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ScenarioPlan {
    pub scenario: Scenario,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub rows: Vec<SeedCostRow>,
    pub findings: Vec<SeedWasteFinding>,
    pub note: &'static str,
}

struct ResourceTemplate {
    key: &'static str,
    base_daily_cost: f64,
    volatility: f64,
    resource_id_template: &'static str,
}

const RESOURCE_TEMPLATES: [ResourceTemplate; 6] = [
    ResourceTemplate {
        key: "vm",
        base_daily_cost: 2.80,
        volatility: 0.08,
        resource_id_template: "/subscriptions/{subscriptionId}/resourceGroups/azcost-app-rg/providers/Microsoft.Compute/virtualMachines/app-vm-01",
    },
    ResourceTemplate {
        key: "sql",
        base_daily_cost: 3.90,
        volatility: 0.07,
        resource_id_template: "/subscriptions/{subscriptionId}/resourceGroups/azcost-data-rg/providers/Microsoft.Sql/servers/sql-prod-01/databases/appdb",
    },
    ResourceTemplate {
        key: "appservice",
        base_daily_cost: 1.45,
        volatility: 0.10,
        resource_id_template: "/subscriptions/{subscriptionId}/resourceGroups/azcost-app-rg/providers/Microsoft.Web/sites/api-app-01",
    },
    ResourceTemplate {
        key: "storage",
        base_daily_cost: 0.95,
        volatility: 0.06,
        resource_id_template: "/subscriptions/{subscriptionId}/resourceGroups/azcost-storage-rg/providers/Microsoft.Storage/storageAccounts/appstorage01",
    },
    ResourceTemplate {
        key: "monitor",
        base_daily_cost: 0.70,
        volatility: 0.12,
        resource_id_template: "/subscriptions/{subscriptionId}/resourceGroups/azcost-monitor-rg/providers/Microsoft.OperationalInsights/workspaces/app-law",
    },
    ResourceTemplate {
        key: "publicip",
        base_daily_cost: 0.18,
        volatility: 0.15,
        resource_id_template: "/subscriptions/{subscriptionId}/resourceGroups/azcost-net-rg/providers/Microsoft.Network/publicIPAddresses/app-pip-01",
    },
];

/// Generate the cost rows (and, for `idle_resources`, the fixture waste
/// findings) for one scenario window ending at `to_date`. A seed makes the
/// series reproducible; without one the series varies per call.
pub fn build_plan(
    scenario: Scenario,
    subscription_id: &str,
    days: i64,
    to_date: NaiveDate,
    now: DateTime<Utc>,
    seed: Option<u64>,
) -> ScenarioPlan {
    let days = clamp_days(days);
    let from_date = to_date - Duration::days(days - 1);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut rows = Vec::new();
    for offset in 0..days {
        let date = from_date + Duration::days(offset);
        for template in &RESOURCE_TEMPLATES {
            if scenario == Scenario::MissingData && skip_for_missing_data(date, to_date, template.key)
            {
                continue;
            }

            let resource_id = template
                .resource_id_template
                .replace("{subscriptionId}", subscription_id);
            let cost = scenario_cost(scenario, date, to_date, offset, template, &mut rng);
            let cost = Decimal::from_f64_retain(cost).unwrap_or_default().round_dp(4);
            if cost <= Decimal::ZERO {
                continue;
            }

            rows.push(SeedCostRow {
                date,
                resource_id,
                cost,
                currency: "USD",
            });
        }
    }

    ScenarioPlan {
        scenario,
        from_date,
        to_date,
        rows,
        findings: build_waste_fixtures(scenario, subscription_id, now),
        note: scenario.note(),
    }
}

fn scenario_cost(
    scenario: Scenario,
    date: NaiveDate,
    to_date: NaiveDate,
    offset: i64,
    template: &ResourceTemplate,
    rng: &mut StdRng,
) -> f64 {
    let base = template.base_daily_cost * week_factor(date.weekday()) * noise_factor(rng, template.volatility);

    match scenario {
        Scenario::Normal => base,
        Scenario::Spike => spike_cost(base, date, to_date, template, rng),
        Scenario::NoisyIncreases => noisy_increase_cost(base, date, to_date, rng),
        Scenario::MissingData => missing_data_cost(base, date, to_date, offset),
        Scenario::IdleResources => idle_cost(template, rng),
    }
}

fn spike_cost(
    base: f64,
    date: NaiveDate,
    to_date: NaiveDate,
    template: &ResourceTemplate,
    rng: &mut StdRng,
) -> f64 {
    let latest_complete_day = to_date - Duration::days(1);
    let secondary_spike_day = to_date - Duration::days(4);
    if date != latest_complete_day && date != secondary_spike_day {
        return base;
    }

    match template.key {
        "sql" => {
            let (multiplier, additive) = if date == latest_complete_day {
                (4.8, 15.0)
            } else {
                (3.1, 7.0)
            };
            base * multiplier + additive
        }
        "monitor" => {
            if date == latest_complete_day {
                base * 1.7
            } else {
                base * 1.35
            }
        }
        _ => base * (1.05 + rng.gen::<f64>() * 0.08),
    }
}

fn noisy_increase_cost(base: f64, date: NaiveDate, to_date: NaiveDate, rng: &mut StdRng) -> f64 {
    if date == to_date {
        base * (1.55 + rng.gen::<f64>() * 0.2)
    } else if date == to_date - Duration::days(1) {
        base * (1.25 + rng.gen::<f64>() * 0.15)
    } else if date >= to_date - Duration::days(3) {
        base * (1.08 + rng.gen::<f64>() * 0.1)
    } else {
        base
    }
}

fn missing_data_cost(base: f64, date: NaiveDate, to_date: NaiveDate, offset: i64) -> f64 {
    if date == to_date {
        return 0.0;
    }
    if offset % 11 == 0 {
        return base * 0.85;
    }
    base
}

fn idle_cost(template: &ResourceTemplate, rng: &mut StdRng) -> f64 {
    let idle_base = match template.key {
        "vm" => 0.09,
        "sql" => 0.05,
        "appservice" => 0.04,
        "storage" => 0.12,
        "monitor" => 0.03,
        "publicip" => 0.07,
        _ => 0.02,
    };
    idle_base * (0.8 + rng.gen::<f64>() * 0.25)
}

fn skip_for_missing_data(date: NaiveDate, to_date: NaiveDate, resource_key: &str) -> bool {
    if date == to_date {
        return true;
    }
    match resource_key {
        "appservice" => date == to_date - Duration::days(3),
        "storage" => date == to_date - Duration::days(8),
        _ => false,
    }
}

fn week_factor(weekday: Weekday) -> f64 {
    match weekday {
        Weekday::Mon => 1.06,
        Weekday::Tue => 1.08,
        Weekday::Wed => 1.04,
        Weekday::Thu => 1.03,
        Weekday::Fri => 0.97,
        Weekday::Sat => 0.86,
        Weekday::Sun => 0.83,
    }
}

fn noise_factor(rng: &mut StdRng, volatility: f64) -> f64 {
    let signed = rng.gen::<f64>() * 2.0 - 1.0;
    1.0 + signed * volatility
}

fn build_waste_fixtures(
    scenario: Scenario,
    subscription_id: &str,
    now: DateTime<Utc>,
) -> Vec<SeedWasteFinding> {
    if scenario != Scenario::IdleResources {
        return Vec::new();
    }

    vec![
        SeedWasteFinding {
            finding_type: FindingType::StoppedVm,
            resource_id: format!(
                "/subscriptions/{subscription_id}/resourceGroups/azcost-idle-rg/providers/Microsoft.Compute/virtualMachines/stopped-vm-01"
            ),
            resource_name: "stopped-vm-01",
            estimated_monthly_cost: dec!(14.80),
            detected_at_utc: now - Duration::minutes(15),
        },
        SeedWasteFinding {
            finding_type: FindingType::UnattachedDisk,
            resource_id: format!(
                "/subscriptions/{subscription_id}/resourceGroups/azcost-idle-rg/providers/Microsoft.Compute/disks/orphaned-disk-01"
            ),
            resource_name: "orphaned-disk-01",
            estimated_monthly_cost: dec!(8.40),
            detected_at_utc: now - Duration::minutes(12),
        },
        SeedWasteFinding {
            finding_type: FindingType::UnusedPublicIp,
            resource_id: format!(
                "/subscriptions/{subscription_id}/resourceGroups/azcost-idle-rg/providers/Microsoft.Network/publicIPAddresses/unused-ip-01"
            ),
            resource_name: "unused-ip-01",
            estimated_monthly_cost: dec!(3.70),
            detected_at_utc: now - Duration::minutes(10),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use rust_decimal_macros::dec;

    const SUB: &str = "11111111-1111-1111-1111-111111111111";

    fn to_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
    }

    fn now() -> DateTime<Utc> {
        to_date().and_time(NaiveTime::from_hms_opt(8, 30, 0).unwrap()).and_utc()
    }

    #[test]
    fn scenario_names_parse_with_aliases() {
        assert_eq!("spike".parse::<Scenario>().unwrap(), Scenario::Spike);
        assert_eq!("Noisy".parse::<Scenario>().unwrap(), Scenario::NoisyIncreases);
        assert_eq!("noisy-increases".parse::<Scenario>().unwrap(), Scenario::NoisyIncreases);
        assert_eq!("missing data".parse::<Scenario>().unwrap(), Scenario::MissingData);
        assert_eq!("IDLE_RESOURCES".parse::<Scenario>().unwrap(), Scenario::IdleResources);
        assert!("seasonal".parse::<Scenario>().is_err());
    }

    #[test]
    fn day_count_is_clamped() {
        assert_eq!(clamp_days(1), 7);
        assert_eq!(clamp_days(30), 30);
        assert_eq!(clamp_days(365), 60);
    }

    #[test]
    fn seeded_plans_are_reproducible() {
        let a = build_plan(Scenario::Normal, SUB, 30, to_date(), now(), Some(7));
        let b = build_plan(Scenario::Normal, SUB, 30, to_date(), now(), Some(7));
        assert_eq!(a.rows.len(), b.rows.len());
        for (left, right) in a.rows.iter().zip(&b.rows) {
            assert_eq!(left.date, right.date);
            assert_eq!(left.resource_id, right.resource_id);
            assert_eq!(left.cost, right.cost);
        }
    }

    #[test]
    fn idle_resources_seed_42_produces_three_findings_and_near_zero_costs() {
        let plan = build_plan(Scenario::IdleResources, SUB, 30, to_date(), now(), Some(42));

        // 30 days x 6 templates, nothing skipped, nothing rounds to zero.
        assert_eq!(plan.rows.len(), 180);
        for row in &plan.rows {
            assert!(row.cost > Decimal::ZERO);
            // Largest idle base is 0.12, scaled by at most 1.05.
            assert!(row.cost < dec!(0.15), "idle cost {} out of range", row.cost);
        }

        let ids: Vec<&str> = plan.findings.iter().map(|f| f.resource_id.as_str()).collect();
        assert_eq!(plan.findings.len(), 3);
        assert_eq!(plan.findings[0].finding_type, FindingType::StoppedVm);
        assert_eq!(plan.findings[1].finding_type, FindingType::UnattachedDisk);
        assert_eq!(plan.findings[2].finding_type, FindingType::UnusedPublicIp);
        assert!(ids[0].ends_with("virtualMachines/stopped-vm-01"));
        assert!(ids[1].ends_with("disks/orphaned-disk-01"));
        assert!(ids[2].ends_with("publicIPAddresses/unused-ip-01"));
        for finding in &plan.findings {
            assert!(finding.resource_id.contains(SUB));
        }
    }

    #[test]
    fn non_idle_scenarios_seed_no_findings() {
        let plan = build_plan(Scenario::Spike, SUB, 30, to_date(), now(), Some(42));
        assert!(plan.findings.is_empty());
    }

    #[test]
    fn missing_data_drops_the_latest_day_and_selected_gaps() {
        let plan = build_plan(Scenario::MissingData, SUB, 30, to_date(), now(), Some(9));

        assert!(plan.rows.iter().all(|r| r.date != to_date()));
        let appservice_gap = to_date() - Duration::days(3);
        assert!(!plan
            .rows
            .iter()
            .any(|r| r.resource_id.contains("sites/api-app-01") && r.date == appservice_gap));
        let storage_gap = to_date() - Duration::days(8);
        assert!(!plan
            .rows
            .iter()
            .any(|r| r.resource_id.contains("storageAccounts") && r.date == storage_gap));
        // Other resources still have rows on the partial days.
        assert!(plan.rows.iter().any(|r| r.date == appservice_gap));
    }

    #[test]
    fn spike_scenario_inflates_sql_on_the_latest_complete_day() {
        let plan = build_plan(Scenario::Spike, SUB, 30, to_date(), now(), Some(42));
        let latest_complete = to_date() - Duration::days(1);

        let sql_spike = plan
            .rows
            .iter()
            .find(|r| r.resource_id.contains("databases/appdb") && r.date == latest_complete)
            .expect("sql row on the spike day");
        // Base 3.90 * 4.8 + 15 puts the spike well above 25 even at minimum
        // weekday/noise factors.
        assert!(sql_spike.cost > dec!(25));

        let plan_rows: Vec<_> = plan
            .rows
            .iter()
            .filter(|r| r.resource_id.contains("databases/appdb") && r.date < to_date() - Duration::days(5))
            .collect();
        assert!(plan_rows.iter().all(|r| r.cost < dec!(5)));
    }

    #[test]
    fn spike_scenario_feeds_the_detector_end_to_end() {
        let plan = build_plan(Scenario::Spike, SUB, 30, to_date(), now(), Some(42));
        let samples: Vec<crate::engine::CostSample> = plan
            .rows
            .iter()
            .map(|r| crate::engine::CostSample::new(r.date, r.resource_id.clone(), r.cost))
            .collect();

        let eval = crate::engine::evaluate(&samples, to_date(), None).unwrap();
        assert_eq!(eval.date, to_date() - Duration::days(1));
        assert!(eval.spike_flag);
        let cause = eval.top_cause.expect("spike has a top cause");
        assert_eq!(cause.resource_name, "appdb");
    }
}
