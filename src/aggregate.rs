//! Regrouping of fine-grained candles into coarser ones (e.g. four 60-minute
//! bars into one 4-hour bar).

use crate::error::{AppError, Result};
use crate::model::candle::Candle;

/// Accumulates contiguous candles into one coarser candle.
#[derive(Debug, Clone)]
pub struct CandleMerger {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    quote_volume: Option<f64>,
    count: usize,
}

impl CandleMerger {
    /// Start a group from its first candle.
    pub fn new(first: &Candle) -> Self {
        Self {
            timestamp: first.timestamp,
            open: first.open,
            high: first.high,
            low: first.low,
            close: first.close,
            volume: first.volume,
            quote_volume: first.quote_volume,
            count: 1,
        }
    }

    /// Fold the next candle of the group in.
    pub fn merge(&mut self, candle: &Candle) {
        self.high = self.high.max(candle.high);
        self.low = self.low.min(candle.low);
        self.close = candle.close;
        self.volume += candle.volume;
        self.quote_volume = match (self.quote_volume, candle.quote_volume) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        };
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn finish(&self) -> Candle {
        Candle {
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            quote_volume: self.quote_volume,
        }
    }
}

/// Merge every `group_size` consecutive candles into one.
///
/// The output has `ceil(len / group_size)` candles. A trailing group with
/// fewer than `group_size` members is still emitted; callers that need
/// strict alignment trim their input to a multiple of `group_size` first.
pub fn aggregate(candles: &[Candle], group_size: usize) -> Result<Vec<Candle>> {
    if group_size == 0 {
        return Err(AppError::invalid_argument("group size must be > 0"));
    }
    Ok(candles
        .chunks(group_size)
        .filter_map(|chunk| {
            let (first, rest) = chunk.split_first()?;
            let mut merger = CandleMerger::new(first);
            for c in rest {
                merger.merge(c);
            }
            Some(merger.finish())
        })
        .collect())
}

/// Number of `source_minutes` candles that make up one `target_minutes` candle.
pub fn group_size_for(target_minutes: u32, source_minutes: u32) -> Result<usize> {
    if target_minutes == 0 || source_minutes == 0 {
        return Err(AppError::invalid_argument(format!(
            "interval minutes must be > 0 (target {}, source {})",
            target_minutes, source_minutes
        )));
    }
    if target_minutes % source_minutes != 0 {
        return Err(AppError::invalid_argument(format!(
            "{}-minute candles cannot be built from {}-minute candles",
            target_minutes, source_minutes
        )));
    }
    Ok((target_minutes / source_minutes) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle::new(ts, open, high, low, close, volume)
    }

    #[test]
    fn merges_one_group() {
        let candles = vec![
            bar(0, 8.0, 10.0, 5.0, 9.0, 100.0),
            bar(3_600_000, 9.0, 12.0, 6.0, 7.0, 150.0),
            bar(7_200_000, 7.0, 9.0, 4.0, 8.0, 80.0),
            bar(10_800_000, 8.0, 11.0, 7.0, 10.5, 120.0),
        ];
        let out = aggregate(&candles, 4).unwrap();
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.timestamp, 0);
        assert_eq!(c.open, 8.0);
        assert_eq!(c.close, 10.5);
        assert_eq!(c.high, 12.0);
        assert_eq!(c.low, 4.0);
        assert_eq!(c.volume, 450.0);
        assert_eq!(c.quote_volume, None);
    }

    #[test]
    fn quote_volume_missing_members_count_as_zero() {
        let candles = vec![
            bar(0, 1.0, 1.0, 1.0, 1.0, 1.0).with_quote_volume(10.0),
            bar(1, 1.0, 1.0, 1.0, 1.0, 1.0),
            bar(2, 1.0, 1.0, 1.0, 1.0, 1.0).with_quote_volume(5.0),
        ];
        let out = aggregate(&candles, 3).unwrap();
        assert_eq!(out[0].quote_volume, Some(15.0));
    }

    #[test]
    fn trailing_partial_group_is_emitted() {
        let candles: Vec<Candle> = (0..10)
            .map(|i| bar(i, i as f64, i as f64 + 1.0, i as f64 - 1.0, i as f64, 1.0))
            .collect();
        let out = aggregate(&candles, 4).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].timestamp, 8);
        assert_eq!(out[2].volume, 2.0);
        assert_eq!(out[2].close, 9.0);
    }

    #[test]
    fn merger_tracks_count() {
        let mut m = CandleMerger::new(&bar(0, 1.0, 2.0, 0.5, 1.5, 1.0));
        m.merge(&bar(1, 1.5, 3.0, 1.0, 2.5, 2.0));
        assert_eq!(m.len(), 2);
        assert_eq!(m.finish().high, 3.0);
    }

    #[test]
    fn empty_and_invalid_inputs() {
        assert!(aggregate(&[], 4).unwrap().is_empty());
        assert!(aggregate(&[bar(0, 1.0, 1.0, 1.0, 1.0, 1.0)], 0).is_err());
    }

    #[test]
    fn group_size_from_minutes() {
        assert_eq!(group_size_for(240, 60).unwrap(), 4);
        assert_eq!(group_size_for(240, 30).unwrap(), 8);
        assert!(group_size_for(240, 0).is_err());
        assert!(group_size_for(240, 7).is_err());
    }
}
