//! Normalized price series

use crate::core::error::SeriesError;
use chrono::NaiveDate;
use serde::Serialize;

/// One daily observation as reported by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<u64>,
}

impl Bar {
    pub fn close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }
}

/// Columns parallel to [`RawSeries::dates`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Ohlcv {
    pub open: Vec<Option<f64>>,
    pub high: Vec<Option<f64>>,
    pub low: Vec<Option<f64>>,
    pub close: Vec<f64>,
    pub volume: Vec<Option<u64>>,
}

/// Date-ordered price series with one entry per date.
///
/// Dates are strictly ascending and every column has the same length as
/// `dates`. Build through [`RawSeries::from_bars`] or [`RawSeries::new`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RawSeries {
    dates: Vec<NaiveDate>,
    prices: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ohlcv: Option<Ohlcv>,
}

impl RawSeries {
    /// Sorts by date and keeps the last bar seen for a repeated date. Bars
    /// with a non-finite close are dropped.
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut bars: Vec<Bar> = bars.into_iter().filter(|b| b.close.is_finite()).collect();
        bars.sort_by_key(|b| b.date);

        let mut unique: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match unique.last_mut() {
                Some(prev) if prev.date == bar.date => *prev = bar,
                _ => unique.push(bar),
            }
        }

        let detailed = unique
            .iter()
            .any(|b| b.open.is_some() || b.high.is_some() || b.low.is_some() || b.volume.is_some());

        let ohlcv = detailed.then(|| Ohlcv {
            open: unique.iter().map(|b| b.open).collect(),
            high: unique.iter().map(|b| b.high).collect(),
            low: unique.iter().map(|b| b.low).collect(),
            close: unique.iter().map(|b| b.close).collect(),
            volume: unique.iter().map(|b| b.volume).collect(),
        });

        Self {
            dates: unique.iter().map(|b| b.date).collect(),
            prices: unique.iter().map(|b| b.close).collect(),
            ohlcv,
        }
    }

    /// Builds a close-only series from parallel columns.
    pub fn new(dates: Vec<NaiveDate>, prices: Vec<f64>) -> Result<Self, SeriesError> {
        if dates.len() != prices.len() {
            return Err(SeriesError::LengthMismatch {
                column: "prices",
                dates: dates.len(),
                values: prices.len(),
            });
        }
        Ok(Self::from_bars(
            dates
                .into_iter()
                .zip(prices)
                .map(|(date, close)| Bar::close(date, close)),
        ))
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn ohlcv(&self) -> Option<&Ohlcv> {
        self.ohlcv.as_ref()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first(&self) -> Option<(NaiveDate, f64)> {
        self.points().next()
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        self.points().next_back()
    }

    pub fn points(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.prices.iter().copied())
    }

    /// Points dated on or after `start`.
    pub fn since(&self, start: NaiveDate) -> RawSeries {
        let from = self.dates.partition_point(|d| *d < start);
        RawSeries {
            dates: self.dates[from..].to_vec(),
            prices: self.prices[from..].to_vec(),
            ohlcv: self.ohlcv.as_ref().map(|o| Ohlcv {
                open: o.open[from..].to_vec(),
                high: o.high[from..].to_vec(),
                low: o.low[from..].to_vec(),
                close: o.close[from..].to_vec(),
                volume: o.volume[from..].to_vec(),
            }),
        }
    }
}

/// Price series plus the descriptive fields chart endpoints return with it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PriceHistory {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub series: RawSeries,
}
