use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::attribution::{normalize_resource_id, parse_resource_name};
use super::CostSample;
use crate::models::{
    Confidence, FindingType, InventorySnapshot, StoppedVmRow, UnattachedDiskRow, UnusedPublicIpRow,
    WasteClassification,
};

/// Days of cost history consulted when deciding how long a VM has been idle.
const VM_LOOKBACK_DAYS: i64 = 30;

/// A VM cost-active on at least this many of the trailing 14 days is cycling
/// on a schedule, not wasting money.
const SUPPRESSION_WINDOW_DAYS: i64 = 14;
const SUPPRESSION_ACTIVE_DAYS: usize = 6;

/// Findings for VMs idle less than this are withheld; a freshly stopped VM
/// is not waste yet.
const MIN_INACTIVE_DAYS: Decimal = dec!(2);

/// Above this many idle days the classification hardens to "Likely unused".
const LIKELY_UNUSED_AFTER_DAYS: Decimal = dec!(7);

const STOPPED_VM_MONTHLY_ESTIMATE: Decimal = dec!(20);
const UNKNOWN_SIZE_DISK_ESTIMATE: Decimal = dec!(10);

/// Per-resource cost activity for one user, indexed up front so each
/// inventory row classifies against the same snapshot.
#[derive(Debug, Default)]
pub struct ActivityProfile {
    today: NaiveDate,
    active_dates: HashMap<String, BTreeSet<NaiveDate>>,
    trailing_week_cost: HashMap<String, Decimal>,
}

impl ActivityProfile {
    /// Index `samples` relative to `today`: which dates each resource had
    /// cost > 0 inside the 30-day lookback, and each resource's summed cost
    /// over the trailing 7 days (used by the estimate resolver).
    pub fn build(samples: &[CostSample], today: NaiveDate) -> Self {
        let lookback_start = today - Duration::days(VM_LOOKBACK_DAYS - 1);
        let week_start = today - Duration::days(6);

        let mut active_dates: HashMap<String, BTreeSet<NaiveDate>> = HashMap::new();
        let mut trailing_week_cost: HashMap<String, Decimal> = HashMap::new();
        for sample in samples {
            if sample.date > today {
                continue;
            }
            let key = normalize_resource_id(&sample.resource_id);
            if sample.cost > Decimal::ZERO && sample.date >= lookback_start {
                active_dates.entry(key.clone()).or_default().insert(sample.date);
            }
            if sample.date >= week_start {
                *trailing_week_cost.entry(key).or_default() += sample.cost;
            }
        }

        Self {
            today,
            active_dates,
            trailing_week_cost,
        }
    }

    /// Most recent lookback date on which the resource had cost > 0.
    fn last_active(&self, key: &str) -> Option<NaiveDate> {
        self.active_dates
            .get(key)
            .and_then(|dates| dates.iter().next_back())
            .copied()
    }

    fn active_days_in_suppression_window(&self, key: &str) -> usize {
        let window_start = self.today - Duration::days(SUPPRESSION_WINDOW_DAYS - 1);
        self.active_dates
            .get(key)
            .map(|dates| dates.range(window_start..=self.today).count())
            .unwrap_or(0)
    }

    fn trailing_week_cost(&self, key: &str) -> Option<Decimal> {
        self.trailing_week_cost.get(key).copied()
    }
}

/// What survives from the previous scan's snapshot for one resource.
#[derive(Debug, Clone)]
pub struct PriorFindingState {
    pub last_seen_active_utc: Option<DateTime<Utc>>,
    pub detected_at_utc: DateTime<Utc>,
}

/// A classified finding before persistence identifiers are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct WasteCandidate {
    pub finding_type: FindingType,
    pub resource_id: String,
    pub resource_name: String,
    pub estimated_monthly_cost: Option<Decimal>,
    pub classification: Option<WasteClassification>,
    pub inactive_duration_days: Option<Decimal>,
    pub waste_confidence_level: Option<Confidence>,
    pub last_seen_active_utc: Option<DateTime<Utc>>,
}

/// Classify one subscription's inventory snapshot against the user's cost
/// activity and the carried-over prior findings (keyed by normalized
/// resource id).
pub fn classify_inventory(
    inventory: &InventorySnapshot,
    profile: &ActivityProfile,
    prior_findings: &HashMap<String, PriorFindingState>,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<WasteCandidate> {
    let mut candidates = Vec::new();

    for disk in &inventory.unattached_disks {
        if disk.resource_id.trim().is_empty() {
            continue;
        }
        candidates.push(with_resolved_estimate(disk_candidate(disk), profile));
    }

    for ip in &inventory.unused_public_ips {
        if ip.resource_id.trim().is_empty() {
            continue;
        }
        candidates.push(with_resolved_estimate(public_ip_candidate(ip), profile));
    }

    for vm in &inventory.stopped_vms {
        if vm.resource_id.trim().is_empty() {
            continue;
        }
        if let Some(candidate) = classify_stopped_vm(vm, profile, prior_findings, today, now) {
            candidates.push(with_resolved_estimate(candidate, profile));
        }
    }

    candidates
}

fn disk_candidate(disk: &UnattachedDiskRow) -> WasteCandidate {
    WasteCandidate {
        finding_type: FindingType::UnattachedDisk,
        resource_id: disk.resource_id.clone(),
        resource_name: display_name(&disk.name, &disk.resource_id),
        estimated_monthly_cost: Some(estimate_unattached_disk(disk.size_gb, &disk.sku)),
        classification: None,
        inactive_duration_days: None,
        waste_confidence_level: None,
        last_seen_active_utc: None,
    }
}

fn public_ip_candidate(ip: &UnusedPublicIpRow) -> WasteCandidate {
    WasteCandidate {
        finding_type: FindingType::UnusedPublicIp,
        resource_id: ip.resource_id.clone(),
        resource_name: display_name(&ip.name, &ip.resource_id),
        estimated_monthly_cost: Some(estimate_unused_public_ip(&ip.sku, &ip.allocation)),
        classification: None,
        inactive_duration_days: None,
        waste_confidence_level: None,
        last_seen_active_utc: None,
    }
}

/// Classify a powered-off VM from its cost-activity trail.
///
/// Returns `None` when the VM cycles on a stop/start schedule (cost-active
/// on 6+ of the last 14 days) or when it has not been idle long enough to
/// call waste (under 2 days, or no way to tell at all).
pub fn classify_stopped_vm(
    vm: &StoppedVmRow,
    profile: &ActivityProfile,
    prior_findings: &HashMap<String, PriorFindingState>,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Option<WasteCandidate> {
    let key = normalize_resource_id(&vm.resource_id);

    if profile.active_days_in_suppression_window(&key) >= SUPPRESSION_ACTIVE_DAYS {
        return None;
    }

    let last_cost_active = profile.last_active(&key);
    let prior = prior_findings.get(&key);
    let carried_last_seen = prior.and_then(|p| p.last_seen_active_utc);

    let last_seen_active_utc = last_cost_active.map(midnight_utc).or(carried_last_seen);

    let inactive_duration_days = if let Some(active_date) = last_cost_active {
        Some(Decimal::from((today - active_date).num_days()))
    } else if let Some(carried) = carried_last_seen {
        Some(Decimal::from((today - carried.date_naive()).num_days()))
    } else {
        prior.map(|p| fractional_days_between(now, p.detected_at_utc))
    };

    let inactive_duration_days = inactive_duration_days?;
    if inactive_duration_days < MIN_INACTIVE_DAYS {
        return None;
    }

    let (classification, confidence) = if last_cost_active.is_none() && carried_last_seen.is_none()
    {
        (WasteClassification::PossiblyUnused, Confidence::Low)
    } else if inactive_duration_days > LIKELY_UNUSED_AFTER_DAYS {
        (WasteClassification::LikelyUnused, Confidence::High)
    } else {
        (WasteClassification::PossiblyUnused, Confidence::Medium)
    };

    Some(WasteCandidate {
        finding_type: FindingType::StoppedVm,
        resource_id: vm.resource_id.clone(),
        resource_name: display_name(&vm.name, &vm.resource_id),
        estimated_monthly_cost: Some(STOPPED_VM_MONTHLY_ESTIMATE),
        classification: Some(classification),
        inactive_duration_days: Some(inactive_duration_days),
        waste_confidence_level: Some(confidence),
        last_seen_active_utc,
    })
}

/// Prefer a projection from real spend over the per-type heuristic: with any
/// cost recorded in the trailing 7 days, the estimate becomes that sum scaled
/// to 30 days. Estimates round to 2 decimal places either way.
pub fn resolve_estimate(
    heuristic: Option<Decimal>,
    trailing_week_cost: Option<Decimal>,
) -> Option<Decimal> {
    if let Some(weekly) = trailing_week_cost {
        if weekly > Decimal::ZERO {
            return Some((weekly * dec!(30) / dec!(7)).round_dp(2));
        }
    }
    heuristic.map(|h| h.round_dp(2))
}

fn with_resolved_estimate(mut candidate: WasteCandidate, profile: &ActivityProfile) -> WasteCandidate {
    let key = normalize_resource_id(&candidate.resource_id);
    candidate.estimated_monthly_cost = resolve_estimate(
        candidate.estimated_monthly_cost,
        profile.trailing_week_cost(&key),
    );
    candidate
}

/// Rough monthly price of an unattached managed disk, tiered by SKU.
pub fn estimate_unattached_disk(size_gb: Option<i32>, sku: &str) -> Decimal {
    let gb = size_gb.unwrap_or(0);
    if gb <= 0 {
        return UNKNOWN_SIZE_DISK_ESTIMATE;
    }

    let sku = sku.to_lowercase();
    let rate_per_gb = if sku.contains("premium") {
        dec!(0.15)
    } else if sku.contains("standardssd") || sku.contains("standard_ssd") {
        dec!(0.08)
    } else if sku.contains("standard") {
        dec!(0.05)
    } else {
        dec!(0.07)
    };

    Decimal::from(gb) * rate_per_gb
}

/// Rough monthly price of an idle public IP.
pub fn estimate_unused_public_ip(sku: &str, allocation: &str) -> Decimal {
    if sku.to_lowercase().contains("standard") {
        dec!(3.5)
    } else if allocation.to_lowercase().contains("static") {
        dec!(2.5)
    } else {
        dec!(2)
    }
}

fn display_name(name: &str, resource_id: &str) -> String {
    if name.trim().is_empty() {
        parse_resource_name(resource_id)
    } else {
        name.trim().to_string()
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn fractional_days_between(now: DateTime<Utc>, earlier: DateTime<Utc>) -> Decimal {
    let seconds = (now - earlier).num_seconds();
    (Decimal::from(seconds) / dec!(86400)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const VM_ID: &str =
        "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/batch-vm";

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, n).unwrap()
    }

    fn vm_row() -> StoppedVmRow {
        StoppedVmRow {
            resource_id: VM_ID.to_string(),
            name: "batch-vm".to_string(),
            power_state: "PowerState/deallocated".to_string(),
        }
    }

    fn active_on(days: &[u32]) -> Vec<CostSample> {
        days.iter()
            .map(|&n| CostSample::new(day(n), VM_ID, dec!(1.5)))
            .collect()
    }

    fn no_priors() -> HashMap<String, PriorFindingState> {
        HashMap::new()
    }

    fn noon(n: u32) -> DateTime<Utc> {
        day(n).and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap()).and_utc()
    }

    #[test]
    fn vm_active_six_of_fourteen_days_is_suppressed() {
        // today = 28, suppression window 15..=28.
        let samples = active_on(&[15, 17, 19, 21, 23, 25]);
        let profile = ActivityProfile::build(&samples, day(28));
        let finding = classify_stopped_vm(&vm_row(), &profile, &no_priors(), day(28), noon(28));
        assert!(finding.is_none());
    }

    #[test]
    fn vm_active_five_of_fourteen_days_is_not_suppressed() {
        let samples = active_on(&[15, 17, 19, 21, 23]);
        let profile = ActivityProfile::build(&samples, day(28));
        let finding = classify_stopped_vm(&vm_row(), &profile, &no_priors(), day(28), noon(28))
            .expect("five active days must not suppress");
        assert_eq!(finding.inactive_duration_days, Some(dec!(5)));
    }

    #[test]
    fn vm_idle_one_day_is_withheld() {
        let samples = active_on(&[27]);
        let profile = ActivityProfile::build(&samples, day(28));
        assert!(classify_stopped_vm(&vm_row(), &profile, &no_priors(), day(28), noon(28)).is_none());
    }

    #[test]
    fn vm_idle_exactly_two_days_is_emitted() {
        let samples = active_on(&[26]);
        let profile = ActivityProfile::build(&samples, day(28));
        let finding = classify_stopped_vm(&vm_row(), &profile, &no_priors(), day(28), noon(28))
            .expect("two idle days is reportable");
        assert_eq!(finding.inactive_duration_days, Some(dec!(2)));
        assert_eq!(finding.classification, Some(WasteClassification::PossiblyUnused));
        assert_eq!(finding.waste_confidence_level, Some(Confidence::Medium));
        assert_eq!(finding.last_seen_active_utc, Some(midnight_utc(day(26))));
    }

    #[test]
    fn vm_idle_over_seven_days_is_likely_unused() {
        let samples = active_on(&[10]);
        let profile = ActivityProfile::build(&samples, day(28));
        let finding = classify_stopped_vm(&vm_row(), &profile, &no_priors(), day(28), noon(28)).unwrap();
        assert_eq!(finding.inactive_duration_days, Some(dec!(18)));
        assert_eq!(finding.classification, Some(WasteClassification::LikelyUnused));
        assert_eq!(finding.waste_confidence_level, Some(Confidence::High));
    }

    #[test]
    fn vm_idle_exactly_seven_days_stays_possibly_unused() {
        let samples = active_on(&[21]);
        let profile = ActivityProfile::build(&samples, day(28));
        let finding = classify_stopped_vm(&vm_row(), &profile, &no_priors(), day(28), noon(28)).unwrap();
        assert_eq!(finding.inactive_duration_days, Some(dec!(7)));
        assert_eq!(finding.classification, Some(WasteClassification::PossiblyUnused));
        assert_eq!(finding.waste_confidence_level, Some(Confidence::Medium));
    }

    #[test]
    fn carried_last_seen_preserves_duration_across_scans() {
        // No cost history at all, but the prior snapshot knew when the VM
        // was last active.
        let profile = ActivityProfile::build(&[], day(28));
        let mut priors = HashMap::new();
        priors.insert(
            normalize_resource_id(VM_ID),
            PriorFindingState {
                last_seen_active_utc: Some(midnight_utc(day(16))),
                detected_at_utc: noon(20),
            },
        );
        let finding = classify_stopped_vm(&vm_row(), &profile, &priors, day(28), noon(28)).unwrap();
        assert_eq!(finding.inactive_duration_days, Some(dec!(12)));
        assert_eq!(finding.last_seen_active_utc, Some(midnight_utc(day(16))));
        assert_eq!(finding.classification, Some(WasteClassification::LikelyUnused));
    }

    #[test]
    fn no_signal_at_all_falls_back_to_prior_detection_time() {
        let profile = ActivityProfile::build(&[], day(28));
        let mut priors = HashMap::new();
        priors.insert(
            normalize_resource_id(VM_ID),
            PriorFindingState {
                last_seen_active_utc: None,
                detected_at_utc: noon(24),
            },
        );
        let finding = classify_stopped_vm(&vm_row(), &profile, &priors, day(28), noon(28)).unwrap();
        assert_eq!(finding.inactive_duration_days, Some(dec!(4)));
        assert_eq!(finding.classification, Some(WasteClassification::PossiblyUnused));
        assert_eq!(finding.waste_confidence_level, Some(Confidence::Low));
        assert_eq!(finding.last_seen_active_utc, None);
    }

    #[test]
    fn vm_with_no_history_and_no_prior_is_withheld() {
        let profile = ActivityProfile::build(&[], day(28));
        assert!(classify_stopped_vm(&vm_row(), &profile, &no_priors(), day(28), noon(28)).is_none());
    }

    #[test]
    fn disk_estimates_tier_by_sku() {
        assert_eq!(estimate_unattached_disk(Some(100), "Premium_LRS"), dec!(15.00));
        assert_eq!(estimate_unattached_disk(Some(100), "StandardSSD_LRS"), dec!(8.00));
        assert_eq!(estimate_unattached_disk(Some(100), "Standard_LRS"), dec!(5.00));
        assert_eq!(estimate_unattached_disk(Some(100), "UltraSSD_LRS"), dec!(7.00));
        assert_eq!(estimate_unattached_disk(None, "Premium_LRS"), dec!(10));
        assert_eq!(estimate_unattached_disk(Some(0), "Standard_LRS"), dec!(10));
    }

    #[test]
    fn public_ip_estimates_tier_by_sku_then_allocation() {
        assert_eq!(estimate_unused_public_ip("Standard", "Dynamic"), dec!(3.5));
        assert_eq!(estimate_unused_public_ip("Basic", "Static"), dec!(2.5));
        assert_eq!(estimate_unused_public_ip("Basic", "Dynamic"), dec!(2));
    }

    #[test]
    fn actual_weekly_cost_overrides_heuristic_estimate() {
        assert_eq!(
            resolve_estimate(Some(dec!(20)), Some(dec!(1.4))),
            Some(dec!(6.00))
        );
    }

    #[test]
    fn heuristic_estimate_survives_without_cost_signal() {
        assert_eq!(resolve_estimate(Some(dec!(20)), None), Some(dec!(20.00)));
        assert_eq!(resolve_estimate(Some(dec!(20)), Some(dec!(0))), Some(dec!(20.00)));
        assert_eq!(resolve_estimate(None, None), None);
    }

    #[test]
    fn inventory_classification_covers_all_three_types() {
        let inventory = InventorySnapshot {
            unattached_disks: vec![UnattachedDiskRow {
                resource_id: "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Compute/disks/old-disk".into(),
                name: "old-disk".into(),
                sku: "Standard_LRS".into(),
                size_gb: Some(64),
            }],
            unused_public_ips: vec![UnusedPublicIpRow {
                resource_id: "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/spare-ip".into(),
                name: "spare-ip".into(),
                sku: "Basic".into(),
                allocation: "Static".into(),
            }],
            stopped_vms: vec![vm_row()],
        };
        let samples = active_on(&[20]);
        let profile = ActivityProfile::build(&samples, day(28));
        let candidates =
            classify_inventory(&inventory, &profile, &no_priors(), day(28), noon(28));

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].finding_type, FindingType::UnattachedDisk);
        assert_eq!(candidates[0].estimated_monthly_cost, Some(dec!(3.20)));
        assert_eq!(candidates[1].finding_type, FindingType::UnusedPublicIp);
        assert_eq!(candidates[1].estimated_monthly_cost, Some(dec!(2.50)));
        assert_eq!(candidates[2].finding_type, FindingType::StoppedVm);
        assert_eq!(candidates[2].inactive_duration_days, Some(dec!(8)));
    }
}
