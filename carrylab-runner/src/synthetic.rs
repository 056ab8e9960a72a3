//! Deterministic synthetic perp series for demos and tests.
//!
//! A seeded random walk of hourly bars with a slowly mean-reverting funding
//! rate. The same `(n, seed)` always produces the same series. The output is
//! clearly fake and should never be mistaken for market data.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use carrylab_core::{PriceSeries, SeriesError};

const START_PRICE: f64 = 100.0;
const BASE_FUNDING: f64 = 0.0001;

/// First bar of every synthetic series.
pub fn synthetic_start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0)
        .single()
        .unwrap_or_default()
}

/// Generate `n` hourly bars with funding attached.
pub fn synthetic_series(n: usize, seed: u64) -> Result<PriceSeries, SeriesError> {
    let seed_bytes = blake3::hash(format!("carrylab-synthetic-{seed}").as_bytes());
    let mut rng = StdRng::from_seed(*seed_bytes.as_bytes());

    let start = synthetic_start();
    let mut timestamps = Vec::with_capacity(n);
    let mut open = Vec::with_capacity(n);
    let mut high = Vec::with_capacity(n);
    let mut low = Vec::with_capacity(n);
    let mut close = Vec::with_capacity(n);
    let mut volume = Vec::with_capacity(n);
    let mut funding = Vec::with_capacity(n);

    let mut price = START_PRICE;
    let mut rate = BASE_FUNDING;
    for i in 0..n {
        let bar_return: f64 = rng.gen_range(-0.01..0.01);
        let o = price;
        let c = price * (1.0 + bar_return);
        timestamps.push(start + Duration::hours(i as i64));
        open.push(o);
        close.push(c);
        high.push(o.max(c) * (1.0 + rng.gen_range(0.0..0.004)));
        low.push(o.min(c) * (1.0 - rng.gen_range(0.0..0.004)));
        volume.push(rng.gen_range(100.0..1_000.0));

        rate += 0.05 * (BASE_FUNDING - rate) + rng.gen_range(-0.00002..0.00002);
        funding.push(rate);
        price = c;
    }

    PriceSeries::new(timestamps, open, high, low, close, volume)?.with_funding(funding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_series() {
        assert_eq!(synthetic_series(100, 42).unwrap(), synthetic_series(100, 42).unwrap());
    }

    #[test]
    fn different_seed_different_series() {
        let a = synthetic_series(100, 1).unwrap();
        let b = synthetic_series(100, 2).unwrap();
        assert_ne!(a.close(), b.close());
    }

    #[test]
    fn bars_are_well_formed() {
        let s = synthetic_series(500, 3).unwrap();
        assert_eq!(s.len(), 500);
        assert_eq!(s.timestamps()[0], synthetic_start());
        assert_eq!(s.timeframe_seconds_inferred().unwrap(), 3600.0);
        for i in 0..s.len() {
            assert!(s.low()[i] <= s.open()[i].min(s.close()[i]));
            assert!(s.high()[i] >= s.open()[i].max(s.close()[i]));
            assert!(s.close()[i] > 0.0);
        }
        let funding = s.funding().unwrap();
        assert!(funding.iter().all(|f| f.abs() < 0.01));
    }

    #[test]
    fn zero_bars_is_empty() {
        assert!(synthetic_series(0, 1).unwrap().is_empty());
    }
}
