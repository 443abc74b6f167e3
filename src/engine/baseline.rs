use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use super::CostSample;

/// Days in the trailing window the baseline averages over, the resolved
/// billing date included.
pub const BASELINE_WINDOW_DAYS: i64 = 7;

/// Per-date cost totals for one user, aggregated from raw samples.
#[derive(Debug, Default)]
pub struct DailyTotals {
    totals: BTreeMap<NaiveDate, Decimal>,
}

impl DailyTotals {
    pub fn from_samples(samples: &[CostSample]) -> Self {
        let mut totals: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for sample in samples {
            *totals.entry(sample.date).or_default() += sample.cost;
        }
        Self { totals }
    }

    /// Total cost on `date`; a date without rows totals zero.
    pub fn total_on(&self, date: NaiveDate) -> Decimal {
        self.totals.get(&date).copied().unwrap_or_default()
    }

    /// Arithmetic mean of the totals over the trailing seven calendar dates
    /// ending at `date` inclusive. Dates without data are excluded from the
    /// average rather than counted as zero; a window with no data at all
    /// yields zero.
    pub fn baseline_ending_at(&self, date: NaiveDate) -> Decimal {
        let window_start = date - Duration::days(BASELINE_WINDOW_DAYS - 1);
        let mut sum = Decimal::ZERO;
        let mut count = 0u32;
        for (_, total) in self.totals.range(window_start..=date) {
            sum += *total;
            count += 1;
        }
        if count == 0 {
            Decimal::ZERO
        } else {
            sum / Decimal::from(count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, n).unwrap()
    }

    #[test]
    fn totals_sum_across_resources() {
        let samples = vec![
            CostSample::new(day(10), "res-a", dec!(1.5)),
            CostSample::new(day(10), "res-b", dec!(2.5)),
            CostSample::new(day(11), "res-a", dec!(3)),
        ];
        let totals = DailyTotals::from_samples(&samples);
        assert_eq!(totals.total_on(day(10)), dec!(4));
        assert_eq!(totals.total_on(day(11)), dec!(3));
        assert_eq!(totals.total_on(day(12)), Decimal::ZERO);
    }

    #[test]
    fn baseline_averages_only_dates_with_data() {
        // Window 9..=15, data on three of the seven dates.
        let samples = vec![
            CostSample::new(day(9), "res-a", dec!(10)),
            CostSample::new(day(12), "res-a", dec!(20)),
            CostSample::new(day(15), "res-a", dec!(30)),
        ];
        let totals = DailyTotals::from_samples(&samples);
        assert_eq!(totals.baseline_ending_at(day(15)), dec!(20));
    }

    #[test]
    fn baseline_ignores_dates_outside_the_window() {
        let samples = vec![
            CostSample::new(day(1), "res-a", dec!(1000)),
            CostSample::new(day(14), "res-a", dec!(6)),
            CostSample::new(day(15), "res-a", dec!(8)),
            CostSample::new(day(16), "res-a", dec!(1000)),
        ];
        let totals = DailyTotals::from_samples(&samples);
        assert_eq!(totals.baseline_ending_at(day(15)), dec!(7));
    }

    #[test]
    fn empty_window_baseline_is_zero() {
        let samples = vec![CostSample::new(day(1), "res-a", dec!(5))];
        let totals = DailyTotals::from_samples(&samples);
        assert_eq!(totals.baseline_ending_at(day(20)), Decimal::ZERO);
    }
}
