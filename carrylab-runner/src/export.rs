//! Export of run records: CSV per record type, JSON for the whole result.
//!
//! Persisted JSON carries a `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use carrylab_core::domain::{BarResult, TradeEvent, TradeLifecycle};
use carrylab_core::engine::FeatureFrame;
use carrylab_core::PriceSeries;

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::shadow::ShadowLogRow;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn ts(t: &chrono::DateTime<chrono::Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// One row per bar with the full PnL split.
pub fn export_bars_csv(bars: &[BarResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "bar_index",
        "ts",
        "price",
        "nav",
        "regime",
        "mode",
        "expansion",
        "carry_notional",
        "directional_notional",
        "gross_exposure",
        "leverage",
        "pnl_price",
        "pnl_carry_price",
        "pnl_directional_price",
        "pnl_funding",
        "pnl_carry_funding",
        "pnl_directional_funding",
        "pnl_fees",
        "pnl_slippage",
        "kill_switch_active",
    ])?;

    for b in bars {
        wtr.write_record([
            b.bar_index.to_string(),
            ts(&b.ts),
            format!("{:.6}", b.price),
            format!("{:.6}", b.nav),
            b.regime.as_str().to_string(),
            mode_str(b.mode).to_string(),
            b.expansion.to_string(),
            format!("{:.6}", b.carry_notional),
            format!("{:.6}", b.directional_notional),
            format!("{:.6}", b.gross_exposure),
            format!("{:.6}", b.leverage),
            format!("{:.6}", b.pnl_price),
            format!("{:.6}", b.pnl_carry_price),
            format!("{:.6}", b.pnl_directional_price),
            format!("{:.6}", b.pnl_funding),
            format!("{:.6}", b.pnl_carry_funding),
            format!("{:.6}", b.pnl_directional_funding),
            format!("{:.6}", b.pnl_fees),
            format!("{:.6}", b.pnl_slippage),
            b.kill_switch_active.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_trades_csv(trades: &[TradeEvent]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "bar_index",
        "ts",
        "sleeve",
        "leg",
        "qty_delta",
        "price",
        "notional",
        "fee",
        "slippage",
    ])?;

    for t in trades {
        wtr.write_record([
            t.bar_index.to_string(),
            ts(&t.ts),
            sleeve_str(t.sleeve).to_string(),
            leg_str(t.leg).to_string(),
            format!("{:.8}", t.qty_delta),
            format!("{:.6}", t.price),
            format!("{:.6}", t.notional),
            format!("{:.6}", t.fee),
            format!("{:.6}", t.slippage),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_lifecycles_csv(lifecycles: &[TradeLifecycle]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "kind",
        "side",
        "open_bar",
        "close_bar",
        "open_ts",
        "close_ts",
        "qty",
        "peak_qty",
        "entry_price",
        "exit_price",
        "nav_entry",
        "nav_exit",
        "regime_at_open",
        "pnl_price",
        "pnl_funding",
        "pnl_fees",
        "pnl_slippage",
        "pnl_net",
        "bars_held",
        "close_reason",
    ])?;

    for l in lifecycles {
        wtr.write_record([
            sleeve_str(l.kind).to_string(),
            side_str(l.side).to_string(),
            l.open_bar.to_string(),
            l.close_bar.to_string(),
            ts(&l.open_ts),
            ts(&l.close_ts),
            format!("{:.8}", l.qty),
            format!("{:.8}", l.peak_qty),
            format!("{:.6}", l.entry_price),
            format!("{:.6}", l.exit_price),
            format!("{:.6}", l.nav_entry),
            format!("{:.6}", l.nav_exit),
            l.regime_at_open.as_str().to_string(),
            format!("{:.6}", l.pnl_price),
            format!("{:.6}", l.pnl_funding),
            format!("{:.6}", l.pnl_fees),
            format!("{:.6}", l.pnl_slippage),
            format!("{:.6}", l.pnl_net()),
            l.bars_held.to_string(),
            close_reason_str(l.close_reason).to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Per-bar regime labels with the features that drove them.
///
/// Warmup values are written as empty cells.
pub fn export_regimes_csv(series: &PriceSeries, features: &FeatureFrame) -> Result<String> {
    if features.len() != series.len() {
        bail!(
            "feature frame has {} bars, series has {}",
            features.len(),
            series.len()
        );
    }
    let opt = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
    let nan_empty = |x: f64| if x.is_nan() { String::new() } else { format!("{x:.6}") };

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ts",
        "close",
        "regime",
        "trend",
        "realized_vol",
        "vol_percentile",
        "compression_score",
        "expansion",
    ])?;
    for (i, t) in series.timestamps().iter().enumerate() {
        wtr.write_record([
            ts(t),
            format!("{:.6}", series.close()[i]),
            features.regimes[i].as_str().to_string(),
            features.regime_features.trend[i].as_i8().to_string(),
            opt(features.realized_vol(i)),
            opt(features.vol_percentile(i)),
            nan_empty(features.compression.score[i]),
            features.expansion[i].to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Shadow log rows; the header comes from the row's field names.
pub fn export_shadow_csv(rows: &[ShadowLogRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn leg_str(leg: carrylab_core::domain::Leg) -> &'static str {
    use carrylab_core::domain::Leg;
    match leg {
        Leg::Spot => "spot",
        Leg::Perp => "perp",
    }
}

fn side_str(side: carrylab_core::domain::PositionSide) -> &'static str {
    use carrylab_core::domain::PositionSide;
    match side {
        PositionSide::Long => "long",
        PositionSide::Short => "short",
    }
}

fn mode_str(mode: carrylab_core::domain::RiskMode) -> &'static str {
    use carrylab_core::domain::RiskMode;
    match mode {
        RiskMode::Normal => "normal",
        RiskMode::CarryOnly => "carry_only",
        RiskMode::Flat => "flat",
    }
}

fn sleeve_str(sleeve: carrylab_core::domain::Sleeve) -> &'static str {
    use carrylab_core::domain::Sleeve;
    match sleeve {
        Sleeve::Carry => "carry",
        Sleeve::Directional => "directional",
    }
}

fn close_reason_str(reason: carrylab_core::domain::CloseReason) -> &'static str {
    use carrylab_core::domain::CloseReason;
    match reason {
        CloseReason::Closed => "closed",
        CloseReason::Flipped => "flipped",
        CloseReason::RegimeChange => "regime_change",
        CloseReason::EndOfData => "end_of_data",
    }
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write the full artifact set for one run into `output_dir`.
///
/// - `result.json`: the full `BacktestResult`
/// - `bars.csv`, `trades.csv`, `lifecycles.csv`
///
/// Returns the paths written, in that order.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;

    let artifacts = [
        ("result.json", export_json(result)?),
        ("bars.csv", export_bars_csv(&result.result.bars)?),
        ("trades.csv", export_trades_csv(&result.result.trades)?),
        ("lifecycles.csv", export_lifecycles_csv(&result.result.lifecycles)?),
    ];

    let mut written = Vec::with_capacity(artifacts.len());
    for (name, content) in artifacts {
        let path = output_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Load a `BacktestResult` from an artifact directory's `result.json`.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BacktestConfig;
    use crate::runner::run_backtest;
    use crate::synthetic::synthetic_series;

    fn sample() -> BacktestResult {
        run_backtest(&synthetic_series(60, 11).unwrap(), &BacktestConfig::default()).unwrap()
    }

    #[test]
    fn json_roundtrip() {
        let result = sample();
        let json = export_json(&result).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back.fingerprint, result.fingerprint);
        assert_eq!(back.bar_count, result.bar_count);
        assert_eq!(back.result.trades.len(), result.result.trades.len());
    }

    #[test]
    fn future_schema_version_rejected() {
        let mut result = sample();
        result.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&result).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn missing_schema_version_defaults() {
        let result = sample();
        let mut value: serde_json::Value = serde_json::from_str(&export_json(&result).unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");
        let back = import_json(&value.to_string()).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn bars_csv_has_one_line_per_bar() {
        let result = sample();
        let csv = export_bars_csv(&result.result.bars).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), result.result.bars.len() + 1);
        assert!(lines[0].starts_with("bar_index,ts,price,nav,regime"));
        assert!(lines[1].starts_with("0,2024-01-01T00:00:00Z,"));
    }

    #[test]
    fn trades_and_lifecycles_csv_headers() {
        let result = sample();
        let trades = export_trades_csv(&result.result.trades).unwrap();
        assert!(trades.starts_with("bar_index,ts,sleeve,leg,"));
        assert_eq!(trades.lines().count(), result.result.trades.len() + 1);

        let lifecycles = export_lifecycles_csv(&result.result.lifecycles).unwrap();
        assert!(lifecycles.starts_with("kind,side,open_bar,"));
        assert_eq!(lifecycles.lines().count(), result.result.lifecycles.len() + 1);
    }

    #[test]
    fn trade_and_lifecycle_rows_mix_labels_and_numbers() {
        use carrylab_core::domain::{CloseReason, Leg, PositionSide, Regime, Sleeve};
        use chrono::{TimeZone, Utc};

        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
        let trade = TradeEvent {
            bar_index: 3,
            ts: t0,
            sleeve: Sleeve::Carry,
            leg: Leg::Spot,
            qty_delta: 1.5,
            price: 100.0,
            notional: 150.0,
            fee: 0.075,
            slippage: 0.01,
        };
        let csv = export_trades_csv(&[trade]).unwrap();
        assert_eq!(
            csv.lines().nth(1).unwrap(),
            "3,2024-01-01T00:00:00Z,carry,spot,1.50000000,100.000000,150.000000,0.075000,0.010000"
        );

        let lifecycle = TradeLifecycle {
            kind: Sleeve::Directional,
            side: PositionSide::Short,
            open_bar: 0,
            close_bar: 3,
            open_ts: t0,
            close_ts: t1,
            qty: 2.0,
            peak_qty: 5.0,
            entry_price: 100.0,
            exit_price: 99.0,
            nav_entry: 1000.0,
            nav_exit: 1001.5,
            regime_at_open: Regime::RiskOn,
            pnl_price: 2.0,
            pnl_funding: 0.0,
            pnl_fees: -0.25,
            pnl_slippage: -0.25,
            bars_held: 3,
            close_reason: CloseReason::Flipped,
        };
        let csv = export_lifecycles_csv(&[lifecycle]).unwrap();
        assert_eq!(
            csv.lines().nth(1).unwrap(),
            "directional,short,0,3,2024-01-01T00:00:00Z,2024-01-01T03:00:00Z,2.00000000,5.00000000,\
             100.000000,99.000000,1000.000000,1001.500000,RISK_ON,2.000000,0.000000,-0.250000,\
             -0.250000,1.500000,3,flipped"
        );
    }

    #[test]
    fn regimes_csv_leaves_warmup_blank() {
        let series = synthetic_series(30, 2).unwrap();
        let sim = carrylab_core::Simulator::new(BacktestConfig::default().strategy()).unwrap();
        let features = sim.features(&series).unwrap();
        let csv = export_regimes_csv(&series, &features).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 31);
        assert!(lines[0].starts_with("ts,close,regime,trend,"));
        // Default windows never warm up on 30 bars.
        assert!(lines[1].ends_with(",NEUTRAL,0,,,,false"), "{}", lines[1]);
    }

    #[test]
    fn shadow_csv_header_from_fields() {
        use carrylab_core::control::SkipReason;
        use carrylab_core::domain::Regime;
        use carrylab_core::venue::{FillReport, FillStatus, OrderRequest, OrderSide};
        use chrono::{TimeZone, Utc};

        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let filled = ShadowLogRow {
            timestamp: ts,
            regime: Regime::RiskOn,
            intended_order: Some(OrderRequest {
                client_order_id: "c1".into(),
                symbol: "BTC-PERP".into(),
                side: OrderSide::Buy,
                qty: 1.0,
                reduce_only: false,
            }),
            hypothetical_fill: Some(FillReport {
                order_id: "o1".into(),
                client_order_id: "c1".into(),
                symbol: "BTC-PERP".into(),
                side: OrderSide::Buy,
                requested_qty: 1.0,
                filled_qty: 1.0,
                fill_price: 100.0,
                mark_price: 100.0,
                slippage_bps: 0.0,
                status: FillStatus::Filled,
                reason: None,
                ts,
            }),
            slippage_estimate_bps: 0.0,
            skipped: false,
            reason: None,
            route_hint: "mev_guard_placeholder",
        };
        let waiting = ShadowLogRow {
            regime: Regime::Neutral,
            intended_order: None,
            hypothetical_fill: None,
            skipped: true,
            reason: Some(SkipReason::RebalanceWait),
            ..filled.clone()
        };
        let csv = export_shadow_csv(&[filled, waiting]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,regime,intended_order,hypothetical_fill,slippage_estimate_bps,skipped,reason,route_hint"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2024-01-01T00:00:00Z,RISK_ON,buy:1.000000,filled:1.000000@100.00,0.000000,0,,mev_guard_placeholder"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2024-01-01T00:00:00Z,NEUTRAL,,,0.000000,1,rebalance_wait,mev_guard_placeholder"
        );
    }
}
