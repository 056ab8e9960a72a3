//! Performance metrics: pure functions over the simulator's bar records.
//!
//! Returns are per bar (`nav[i] / nav[i-1] - 1` for `i >= 1`) and are
//! annualized with a periods-per-year figure inferred from the median bar
//! spacing, so hourly and daily runs share one code path.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carrylab_core::domain::series::median_spacing_seconds;
use carrylab_core::domain::{BarResult, Regime};
use carrylab_core::indicators::drawdown;
use carrylab_core::SimulationResult;

pub const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// Aggregate statistics for one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    /// Positive fraction, e.g. 0.15 for a 15% drawdown.
    pub max_drawdown: f64,
    /// Fraction of bars with a positive return.
    pub win_rate: f64,
    /// Mean of `gross_exposure / nav`.
    pub exposure_utilization: f64,
    pub funding_contribution: f64,
    pub directional_contribution: f64,
    /// Mean bar return keyed by the regime of the bar the return ends on.
    pub regime_returns: BTreeMap<Regime, f64>,
    pub periods_per_year: f64,
    pub trade_count: usize,
    pub lifecycle_count: usize,
    pub kill_switch_bars: usize,
}

/// Compute every metric from a finished simulation.
pub fn compute_metrics(result: &SimulationResult) -> Metrics {
    let bars = &result.bars;
    let navs: Vec<f64> = bars.iter().map(|b| b.nav).collect();
    let timestamps: Vec<DateTime<Utc>> = bars.iter().map(|b| b.ts).collect();
    let periods_per_year = periods_per_year(&timestamps);
    let returns = bar_returns(&navs);

    Metrics {
        total_return: total_return(&navs),
        cagr: cagr(&navs, &timestamps),
        sharpe: sharpe_ratio(&returns, periods_per_year),
        sortino: sortino_ratio(&returns, periods_per_year),
        max_drawdown: max_drawdown(&navs),
        win_rate: win_rate(&returns),
        exposure_utilization: exposure_utilization(bars),
        funding_contribution: contribution(bars, |b| b.pnl_funding),
        directional_contribution: contribution(bars, |b| {
            b.pnl_directional_price + b.pnl_directional_funding
        }),
        regime_returns: regime_returns(bars),
        periods_per_year,
        trade_count: result.trades.len(),
        lifecycle_count: result.lifecycles.len(),
        kill_switch_bars: bars.iter().filter(|b| b.kill_switch_active).count(),
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// `(last - first) / first`, 0 for fewer than two points.
pub fn total_return(navs: &[f64]) -> f64 {
    match (navs.first(), navs.last()) {
        (Some(&first), Some(&last)) if navs.len() >= 2 && first > 0.0 => (last - first) / first,
        _ => 0.0,
    }
}

/// `(nav_end / nav_start)^(1/years) - 1` with years measured between the
/// first and last timestamps.
pub fn cagr(navs: &[f64], timestamps: &[DateTime<Utc>]) -> f64 {
    let (Some(&first), Some(&last)) = (navs.first(), navs.last()) else {
        return 0.0;
    };
    let (Some(&t0), Some(&t1)) = (timestamps.first(), timestamps.last()) else {
        return 0.0;
    };
    let years = (t1 - t0).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_YEAR;
    if navs.len() < 2 || years <= 0.0 || first <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    (last / first).powf(1.0 / years) - 1.0
}

/// Bars per year from the median inter-bar delta. Needs at least three
/// timestamps; returns 0 otherwise.
pub fn periods_per_year(timestamps: &[DateTime<Utc>]) -> f64 {
    if timestamps.len() < 3 {
        return 0.0;
    }
    let spacing = median_spacing_seconds(timestamps);
    if spacing <= 0.0 {
        return 0.0;
    }
    SECONDS_PER_YEAR / spacing
}

/// Annualized Sharpe ratio: `mean / std * sqrt(periods_per_year)`, population std.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 || periods_per_year <= 0.0 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean(returns) / std * periods_per_year.sqrt()
}

/// Annualized Sortino ratio.
///
/// The downside deviation is the population std of the negative returns
/// around their own mean. Returns 0 with no negative returns or when they
/// are all equal.
pub fn sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.is_empty() || periods_per_year <= 0.0 {
        return 0.0;
    }
    let negative: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if negative.is_empty() {
        return 0.0;
    }
    let downside_std = std_dev(&negative);
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean(returns) / downside_std * periods_per_year.sqrt()
}

/// Deepest peak-to-trough decline as a positive fraction, `max(1 - nav / peak)`.
pub fn max_drawdown(navs: &[f64]) -> f64 {
    drawdown(navs)
        .map(|dd| dd.into_iter().fold(0.0_f64, |worst, d| worst.max(-d)))
        .unwrap_or(0.0)
}

pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
}

pub fn exposure_utilization(bars: &[BarResult]) -> f64 {
    let ratios: Vec<f64> = bars
        .iter()
        .filter(|b| b.nav > 0.0)
        .map(|b| b.gross_exposure / b.nav)
        .collect();
    mean(&ratios)
}

/// Share of the total NAV change (first bar to last) explained by `component`.
///
/// Components are summed over bars `1..n` so they line up with the NAV
/// difference. Returns 0 when the NAV did not move.
pub fn contribution(bars: &[BarResult], component: impl Fn(&BarResult) -> f64) -> f64 {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return 0.0;
    };
    let total = last.nav - first.nav;
    if total.abs() < 1e-12 {
        return 0.0;
    }
    bars.iter().skip(1).map(component).sum::<f64>() / total
}

/// Mean bar return per regime. A regime that never ends a bar is absent.
pub fn regime_returns(bars: &[BarResult]) -> BTreeMap<Regime, f64> {
    let mut buckets: BTreeMap<Regime, (f64, usize)> = BTreeMap::new();
    for w in bars.windows(2) {
        if w[0].nav <= 0.0 {
            continue;
        }
        let entry = buckets.entry(w[1].regime).or_insert((0.0, 0));
        entry.0 += w[1].nav / w[0].nav - 1.0;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(regime, (sum, n))| (regime, sum / n as f64))
        .collect()
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive NAVs.
pub fn bar_returns(navs: &[f64]) -> Vec<f64> {
    navs.windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrylab_core::domain::RiskMode;
    use chrono::{Duration, TimeZone};

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    fn hourly(n: usize) -> Vec<DateTime<Utc>> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| t0 + Duration::hours(i as i64)).collect()
    }

    fn bar(i: usize, nav: f64, regime: Regime) -> BarResult {
        BarResult {
            bar_index: i,
            ts: hourly(i + 1)[i],
            price: 100.0,
            nav,
            regime,
            mode: RiskMode::Normal,
            expansion: false,
            carry_notional: 0.0,
            directional_notional: 0.0,
            gross_exposure: nav * 0.5,
            leverage: 0.5,
            pnl_price: 0.0,
            pnl_carry_price: 0.0,
            pnl_directional_price: 0.0,
            pnl_funding: 0.0,
            pnl_carry_funding: 0.0,
            pnl_directional_funding: 0.0,
            pnl_fees: 0.0,
            pnl_slippage: 0.0,
            kill_switch_active: false,
        }
    }

    // ── Returns ──

    #[test]
    fn total_return_basic() {
        approx(total_return(&[100.0, 110.0, 120.0]), 0.2);
        assert_eq!(total_return(&[100.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn cagr_uses_calendar_years() {
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + Duration::milliseconds((2.0 * SECONDS_PER_YEAR * 1000.0) as i64);
        approx(cagr(&[100.0, 121.0], &[t0, t1]), 0.1);
        assert_eq!(cagr(&[100.0, 121.0], &[t0, t0]), 0.0);
    }

    #[test]
    fn periods_per_year_is_robust_to_one_gap() {
        let mut ts = hourly(5);
        ts[4] = ts[3] + Duration::hours(24);
        approx(periods_per_year(&ts), SECONDS_PER_YEAR / 3600.0);
        assert_eq!(periods_per_year(&ts[..2]), 0.0);
    }

    // ── Risk-adjusted ──

    #[test]
    fn sharpe_zero_for_constant_returns() {
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01], 8766.0), 0.0);
    }

    #[test]
    fn sharpe_hand_computed() {
        // mean 0.005, population std 0.015
        let r = [0.02, -0.01];
        approx(sharpe_ratio(&r, 4.0), 0.005 / 0.015 * 2.0);
    }

    #[test]
    fn sortino_uses_dispersion_of_negative_returns() {
        // mean -0.0025; negatives [-0.01, -0.03] have population std 0.01
        let r = [0.02, -0.01, -0.03, 0.01];
        approx(sortino_ratio(&r, 1.0), -0.25);
        approx(sortino_ratio(&r, 4.0), -0.5);
        assert_eq!(sortino_ratio(&[0.01, 0.02], 1.0), 0.0);
        // A single negative return has no dispersion.
        assert_eq!(sortino_ratio(&[0.02, -0.01, 0.03], 1.0), 0.0);
    }

    #[test]
    fn max_drawdown_is_positive() {
        approx(max_drawdown(&[100.0, 120.0, 90.0, 130.0]), 0.25);
        assert_eq!(max_drawdown(&[100.0, 101.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn win_rate_counts_positive_bars() {
        approx(win_rate(&[0.01, -0.01, 0.0, 0.02]), 0.5);
        assert_eq!(win_rate(&[]), 0.0);
    }

    // ── Attribution ──

    #[test]
    fn contribution_divides_by_nav_change() {
        let mut bars = vec![
            bar(0, 100.0, Regime::Neutral),
            bar(1, 104.0, Regime::Neutral),
            bar(2, 110.0, Regime::RiskOn),
        ];
        // First bar's funding is outside the window.
        bars[0].pnl_funding = 50.0;
        bars[1].pnl_funding = 1.0;
        bars[2].pnl_funding = 2.0;
        approx(contribution(&bars, |b| b.pnl_funding), 0.3);

        let flat = vec![bar(0, 100.0, Regime::Neutral), bar(1, 100.0, Regime::Neutral)];
        assert_eq!(contribution(&flat, |b| b.pnl_funding), 0.0);
    }

    #[test]
    fn regime_returns_keyed_by_ending_bar() {
        let bars = vec![
            bar(0, 100.0, Regime::RiskOff),
            bar(1, 110.0, Regime::RiskOn),
            bar(2, 99.0, Regime::Neutral),
            bar(3, 108.9, Regime::RiskOn),
        ];
        let rr = regime_returns(&bars);
        assert!(!rr.contains_key(&Regime::RiskOff));
        approx(rr[&Regime::RiskOn], 0.1);
        approx(rr[&Regime::Neutral], -0.1);
    }

    #[test]
    fn compute_metrics_on_empty_result() {
        let m = compute_metrics(&SimulationResult::default());
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.trade_count, 0);
        assert!(m.regime_returns.is_empty());
    }

    #[test]
    fn exposure_utilization_is_mean_leverage() {
        let bars = vec![bar(0, 100.0, Regime::Neutral), bar(1, 200.0, Regime::Neutral)];
        approx(exposure_utilization(&bars), 0.5);
    }
}
