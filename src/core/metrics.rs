//! Derived metrics computed from raw price series
//!
//! Every function returns `None` when the input cannot support the metric
//! instead of producing NaN or infinities.

use crate::core::payload::AnnualReturns;
use crate::core::series::RawSeries;
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::prelude::*;
use rust_finprim::rate::cagr as finprim_cagr;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::fmt::Display;
use tracing::debug;

pub const DAYS_PER_YEAR: f64 = 365.25;
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

// Growth factors outside this range are computed in f64. Decimal overflows
// near 7.9e28 and `powd` panics when a result underflows its 28 digits.
const DECIMAL_GROWTH_RANGE: std::ops::RangeInclusive<f64> = 1e-20..=1e6;

/// Compound annual growth rate between the first and last point, as a fraction.
pub fn cagr(series: &RawSeries) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }
    let (start_date, start) = series.first()?;
    let (end_date, end) = series.last()?;
    cagr_between(start, end, (end_date - start_date).num_days())
}

/// Compound annual growth rate from `start` to `end` over `days`.
pub fn cagr_between(start: f64, end: f64, days: i64) -> Option<f64> {
    if days <= 0 {
        return None;
    }
    cagr_over_years(start, end, days as f64 / DAYS_PER_YEAR)
}

/// Compound annual growth rate from `start` to `end` over a fractional
/// number of `years`.
pub fn cagr_over_years(start: f64, end: f64, years: f64) -> Option<f64> {
    if !start.is_finite() || !end.is_finite() || !years.is_finite() {
        return None;
    }
    if start <= 0.0 || end < 0.0 || years <= 0.0 {
        return None;
    }
    if end == 0.0 {
        return Some(-1.0);
    }

    let ratio = end / start;
    let approx = ratio.powf(1.0 / years) - 1.0;
    if !approx.is_finite() {
        return None;
    }
    if !DECIMAL_GROWTH_RANGE.contains(&ratio) || !DECIMAL_GROWTH_RANGE.contains(&(1.0 + approx)) {
        return Some(approx);
    }

    let begin_bal = Decimal::from_f64(start)?;
    let end_bal = Decimal::from_f64(end)?;
    let n_years = Decimal::from_f64(years)?;
    if n_years.is_zero() || begin_bal.is_zero() {
        return None;
    }

    let rate = finprim_cagr(begin_bal, end_bal, n_years);
    debug!("cagr: {begin_bal}, {end_bal}, {n_years} = {rate}");
    rate.to_f64()
}

/// Sample standard deviation of simple daily returns, annualized by
/// `sqrt(252)`.
pub fn trailing_volatility(series: &RawSeries) -> Option<f64> {
    let prices = series.prices();
    if prices.is_empty() || prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return None;
    }

    let returns: Vec<f64> = prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    if returns.len() < 2 {
        return Some(0.0);
    }

    let std_dev = returns.iter().std_dev();
    let annualized = std_dev * TRADING_DAYS_PER_YEAR.sqrt();
    annualized.is_finite().then_some(annualized)
}

/// Point whose date is closest to `target`; on a tie the earlier point wins.
pub fn nearest_point(series: &RawSeries, target: NaiveDate) -> Option<(NaiveDate, f64)> {
    let dates = series.dates();
    let prices = series.prices();
    if dates.is_empty() {
        return None;
    }

    let idx = dates.partition_point(|d| *d < target);
    let after = (idx < dates.len()).then_some(idx);
    let before = idx.checked_sub(1);

    let chosen = match (before, after) {
        (Some(b), Some(a)) => {
            let to_before = (target - dates[b]).num_days();
            let to_after = (dates[a] - target).num_days();
            if to_after < to_before { a } else { b }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };
    Some((dates[chosen], prices[chosen]))
}

/// Growth from the point nearest `target` to the latest point, as a fraction.
pub fn growth_since(series: &RawSeries, target: NaiveDate) -> Option<f64> {
    let (_, base) = nearest_point(series, target)?;
    let (_, latest) = series.last()?;
    if base <= 0.0 {
        return None;
    }
    let growth = latest / base - 1.0;
    growth.is_finite().then_some(growth)
}

pub fn growth_last_year(series: &RawSeries, today: NaiveDate) -> Option<f64> {
    growth_since(series, today.checked_sub_months(Months::new(12))?)
}

/// CAGR from the point nearest five years before `today` to the latest point.
pub fn cagr_5y(series: &RawSeries, today: NaiveDate) -> Option<f64> {
    let target = today.checked_sub_months(Months::new(60))?;
    let (base_date, base) = nearest_point(series, target)?;
    let (last_date, latest) = series.last()?;
    cagr_between(base, latest, (last_date - base_date).num_days())
}

/// `last / first - 1` over the whole series.
pub fn total_return(series: &RawSeries) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }
    let (_, first) = series.first()?;
    let (_, last) = series.last()?;
    if first <= 0.0 {
        return None;
    }
    let ret = last / first - 1.0;
    ret.is_finite().then_some(ret)
}

/// Return of every calendar year present in the series. A year is measured
/// from the previous year's last close, or from the first close for the
/// first year.
pub fn annual_returns(series: &RawSeries) -> AnnualReturns {
    let mut returns = AnnualReturns::new();
    let Some((_, first_close)) = series.first() else {
        return returns;
    };

    let mut year_ends: Vec<(i32, f64)> = Vec::new();
    for (date, price) in series.points() {
        match year_ends.last_mut() {
            Some((year, close)) if *year == date.year() => *close = price,
            _ => year_ends.push((date.year(), price)),
        }
    }

    let mut base = first_close;
    for (year, close) in year_ends {
        if base > 0.0 {
            let ret = close / base - 1.0;
            if ret.is_finite() {
                returns.insert(year, ret);
            }
        }
        base = close;
    }
    returns
}

/// Heuristic 0 to 5 star score derived from return per unit of volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct StarRating(u8);

impl StarRating {
    pub const MAX: u8 = 5;

    pub fn from_score(score: f64) -> Self {
        let stars = if score > 120.0 {
            5
        } else if score > 100.0 {
            4
        } else if score > 80.0 {
            3
        } else if score > 60.0 {
            2
        } else if score > 40.0 {
            1
        } else {
            0
        };
        StarRating(stars)
    }

    /// Rates `total_return` against `volatility`; both must use the same unit.
    /// Missing inputs or zero volatility rate as zero stars.
    pub fn rate(total_return: Option<f64>, volatility: Option<f64>) -> Self {
        match (total_return, volatility) {
            (Some(ret), Some(vol)) if ret.is_finite() && vol.is_finite() && vol != 0.0 => {
                Self::from_score(ret / vol * 100.0)
            }
            _ => StarRating(0),
        }
    }

    pub fn stars(self) -> u8 {
        self.0
    }
}

impl Display for StarRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let filled = usize::from(self.0);
        let empty = usize::from(Self::MAX - self.0);
        write!(f, "{}{}", "★".repeat(filled), "☆".repeat(empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(points: &[(NaiveDate, f64)]) -> RawSeries {
        RawSeries::new(
            points.iter().map(|p| p.0).collect(),
            points.iter().map(|p| p.1).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_cagr_doubling_over_one_year() {
        let rate = cagr_between(100.0, 200.0, 365).unwrap();
        assert!((rate - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_cagr_doubling_over_exactly_one_year() {
        // Whole-day spans never equal 365.25 days, so use fractional years.
        let rate = cagr_over_years(100.0, 200.0, 1.0).unwrap();
        assert!((rate - 1.0).abs() < 1e-9, "got {rate}");
        assert_eq!(cagr_over_years(100.0, 200.0, 0.0), None);
        assert_eq!(cagr_over_years(100.0, 200.0, f64::NAN), None);
    }

    #[test]
    fn test_cagr_steep_loss_over_short_span() {
        let today = d(2024, 6, 28);
        let s = series(&[(d(2024, 6, 27), 100.0), (today, 80.0)]);

        for rate in [cagr(&s), cagr_5y(&s, today)] {
            let rate = rate.unwrap();
            assert!(rate.is_finite());
            assert!((-1.0..-0.99).contains(&rate), "got {rate}");
        }
    }

    #[test]
    fn test_cagr_extreme_ratios_stay_finite() {
        let gain = cagr_between(1.0, 1e12, 30).unwrap();
        assert!(gain.is_finite() && gain > 1e6);

        let loss = cagr_between(1e12, 1.0, 3650).unwrap();
        let rebuilt = 1e12 * (1.0 + loss).powf(3650.0 / DAYS_PER_YEAR);
        assert!((rebuilt - 1.0).abs() < 1e-4, "got {rebuilt}");
    }

    #[test]
    fn test_cagr_scenario_full_year_span() {
        // 4 years = 1461 days = 4 * 365.25
        let s = series(&[(d(2020, 1, 1), 100.0), (d(2024, 1, 1), 1600.0)]);
        let rate = cagr(&s).unwrap();
        assert!((rate - 1.0).abs() < 1e-6, "got {rate}");
    }

    #[test]
    fn test_cagr_round_trip() {
        let start = 250.0;
        let end = 410.0;
        let days = 1200;
        let rate = cagr_between(start, end, days).unwrap();
        let years = days as f64 / DAYS_PER_YEAR;
        let rebuilt = start * (1.0 + rate).powf(years);
        assert!((rebuilt - end).abs() / end < 1e-6);
    }

    #[test]
    fn test_cagr_undefined_inputs() {
        assert_eq!(cagr_between(0.0, 10.0, 365), None);
        assert_eq!(cagr_between(-5.0, 10.0, 365), None);
        assert_eq!(cagr_between(10.0, 20.0, 0), None);
        assert_eq!(cagr(&series(&[(d(2024, 1, 1), 10.0)])), None);
        assert_eq!(cagr(&RawSeries::default()), None);
    }

    #[test]
    fn test_trailing_volatility() {
        assert_eq!(trailing_volatility(&RawSeries::default()), None);

        let flat = series(&[
            (d(2024, 1, 1), 10.0),
            (d(2024, 1, 2), 10.0),
            (d(2024, 1, 3), 10.0),
        ]);
        assert_eq!(trailing_volatility(&flat), Some(0.0));

        let with_zero = series(&[(d(2024, 1, 1), 10.0), (d(2024, 1, 2), 0.0)]);
        assert_eq!(trailing_volatility(&with_zero), None);

        // returns: +10%, -10%; sample std = 0.1414..
        let s = series(&[
            (d(2024, 1, 1), 100.0),
            (d(2024, 1, 2), 110.0),
            (d(2024, 1, 3), 99.0),
        ]);
        let expected = (0.02_f64).sqrt() * 252.0_f64.sqrt();
        let vol = trailing_volatility(&s).unwrap();
        assert!((vol - expected).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_is_non_negative() {
        let prices = [5.0, 9.0, 3.0, 3.5, 12.0, 11.9, 0.5, 40.0];
        for n in 2..=prices.len() {
            let points: Vec<_> = prices[..n]
                .iter()
                .enumerate()
                .map(|(i, p)| (d(2024, 1, 1 + i as u32), *p))
                .collect();
            let vol = trailing_volatility(&series(&points)).unwrap();
            assert!(vol >= 0.0);
        }
    }

    #[test]
    fn test_nearest_point_tie_picks_earlier() {
        let s = series(&[(d(2024, 1, 1), 1.0), (d(2024, 1, 5), 2.0)]);
        assert_eq!(nearest_point(&s, d(2024, 1, 3)), Some((d(2024, 1, 1), 1.0)));
        assert_eq!(nearest_point(&s, d(2024, 1, 4)), Some((d(2024, 1, 5), 2.0)));
        assert_eq!(nearest_point(&s, d(2023, 1, 1)), Some((d(2024, 1, 1), 1.0)));
        assert_eq!(nearest_point(&s, d(2025, 1, 1)), Some((d(2024, 1, 5), 2.0)));
        assert_eq!(nearest_point(&RawSeries::default(), d(2024, 1, 1)), None);
    }

    #[test]
    fn test_growth_windows() {
        let today = d(2024, 6, 30);
        let s = series(&[
            (d(2019, 6, 28), 50.0),
            (d(2021, 6, 30), 80.0),
            (d(2023, 7, 3), 100.0),
            (d(2024, 6, 28), 125.0),
        ]);

        let growth = growth_last_year(&s, today).unwrap();
        assert!((growth - 0.25).abs() < 1e-12);

        let rate = cagr_5y(&s, today).unwrap();
        let days = (d(2024, 6, 28) - d(2019, 6, 28)).num_days();
        let expected = (125.0_f64 / 50.0).powf(DAYS_PER_YEAR / days as f64) - 1.0;
        assert!((rate - expected).abs() < 1e-6);
    }

    #[test]
    fn test_total_return() {
        let s = series(&[(d(2024, 1, 1), 80.0), (d(2024, 3, 1), 100.0)]);
        assert!((total_return(&s).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(total_return(&series(&[(d(2024, 1, 1), 80.0)])), None);
    }

    #[test]
    fn test_annual_returns() {
        let s = series(&[
            (d(2022, 3, 1), 100.0),
            (d(2022, 12, 30), 110.0),
            (d(2023, 6, 1), 90.0),
            (d(2023, 12, 29), 121.0),
            (d(2024, 2, 1), 133.1),
        ]);
        let returns = annual_returns(&s);
        assert_eq!(returns.len(), 3);
        assert!((returns[&2022] - 0.10).abs() < 1e-12);
        assert!((returns[&2023] - 0.10).abs() < 1e-12);
        assert!((returns[&2024] - 0.10).abs() < 1e-9);
        assert!(annual_returns(&RawSeries::default()).is_empty());
    }

    #[test]
    fn test_star_rating_thresholds() {
        assert_eq!(StarRating::from_score(121.0).stars(), 5);
        assert_eq!(StarRating::from_score(120.0).stars(), 4);
        assert_eq!(StarRating::from_score(100.5).stars(), 4);
        assert_eq!(StarRating::from_score(85.0).stars(), 3);
        assert_eq!(StarRating::from_score(61.0).stars(), 2);
        assert_eq!(StarRating::from_score(40.5).stars(), 1);
        assert_eq!(StarRating::from_score(40.0).stars(), 0);
        assert_eq!(StarRating::from_score(-300.0).stars(), 0);
        assert_eq!(StarRating::from_score(f64::NAN).stars(), 0);
    }

    #[test]
    fn test_star_rating_is_monotonic_and_bounded() {
        let mut previous = StarRating::from_score(-1000.0);
        let mut score = -1000.0;
        while score < 1000.0 {
            let rating = StarRating::from_score(score);
            assert!(rating >= previous);
            assert!(rating.stars() <= StarRating::MAX);
            previous = rating;
            score += 0.5;
        }
    }

    #[test]
    fn test_rating_missing_inputs() {
        assert_eq!(StarRating::rate(Some(8.0), None).stars(), 0);
        assert_eq!(StarRating::rate(None, Some(0.2)).stars(), 0);
        assert_eq!(StarRating::rate(Some(0.3), Some(0.0)).stars(), 0);
        assert_eq!(StarRating::rate(Some(0.3), Some(0.2)).stars(), 5);
        assert_eq!(StarRating::rate(Some(0.3), Some(0.2)).to_string(), "★★★★★");
        assert_eq!(StarRating::rate(Some(0.09), Some(0.1)).to_string(), "★★★☆☆");
    }
}
