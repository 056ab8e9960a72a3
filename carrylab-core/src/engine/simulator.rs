use tracing::{info, warn};

use super::config::{SimulatorConfig, StrategyConfig};
use super::cost_model::{FeeModel, SlippageModel};
use super::execution::{BarContext, BarCosts, Executor};
use super::lifecycle::{BarMark, LifecycleTracker};
use super::precompute::{precompute_features, FeatureFrame};
use super::targets::{apply_risk_constraints, PositionTargets, VolTarget};
use super::{SimError, SimulationResult};
use crate::compression::CompressionDetector;
use crate::config::ConfigError;
use crate::domain::{BarResult, PortfolioState, PriceSeries, Regime, Sleeve};
use crate::guidance::GuidancePolicy;
use crate::regime::RegimeClassifier;
use crate::risk::RiskGovernor;

/// Per-bar PnL booked before trading.
#[derive(Debug, Clone, Copy, Default)]
struct MarkPnl {
    carry_price: f64,
    directional_price: f64,
    carry_funding: f64,
    directional_funding: f64,
}

/// Deterministic event-driven portfolio simulator.
///
/// Construction validates every config; `run` owns a fresh `PortfolioState`
/// per call, so one simulator can replay many series.
#[derive(Debug, Clone)]
pub struct Simulator {
    classifier: RegimeClassifier,
    detector: CompressionDetector,
    guidance: GuidancePolicy,
    risk: RiskGovernor,
    config: SimulatorConfig,
    fees: FeeModel,
    slippage: SlippageModel,
}

impl Simulator {
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            classifier: RegimeClassifier::new(config.regime, Regime::Neutral)?,
            detector: CompressionDetector::new(config.compression)?,
            guidance: GuidancePolicy::new(config.guidance)?,
            risk: RiskGovernor::new(config.risk)?,
            config: config.simulator,
            fees: config.fees,
            slippage: config.slippage,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Effective leverage ceiling after the liquidation buffer.
    pub fn max_leverage(&self) -> f64 {
        self.risk.config().leverage_cap * (1.0 - self.config.liquidation_buffer)
    }

    pub fn features(&self, series: &PriceSeries) -> Result<FeatureFrame, SimError> {
        precompute_features(series, &self.classifier, &self.detector)
    }

    pub fn run(&self, series: &PriceSeries) -> Result<SimulationResult, SimError> {
        check_prices(series.close())?;
        let features = self.features(series)?;
        self.run_with_features(series, &features)
    }

    /// Run the bar loop over features computed by [`Simulator::features`].
    pub fn run_with_features(
        &self,
        series: &PriceSeries,
        features: &FeatureFrame,
    ) -> Result<SimulationResult, SimError> {
        let n = series.len();
        if features.len() != n {
            return Err(SimError::FeatureLengthMismatch {
                expected: n,
                actual: features.len(),
            });
        }
        info!(bars = n, initial_nav = self.config.initial_nav, "simulation start");

        let close = series.close();
        let timestamps = series.timestamps();
        let funding = series.funding();
        let executor = Executor::new(&self.fees, &self.slippage);
        let max_leverage = self.max_leverage();

        let mut state = PortfolioState::new(self.config.initial_nav);
        let mut tracker = LifecycleTracker::new();
        let mut bars = Vec::with_capacity(n);
        let mut trades = Vec::new();
        let mut funding_accum = 0.0;
        let mut last_mark: Option<BarMark> = None;

        for i in 0..n {
            let price = close[i];
            if !(price.is_finite() && price > 0.0) {
                return Err(SimError::InvalidPrice { index: i, price });
            }
            let ts = timestamps[i];
            let regime = features.regimes[i];

            // 1-2. Price PnL and funding on the positions carried into this bar.
            let mut pnl = MarkPnl::default();
            if i > 0 {
                let dpx = price - close[i - 1];
                pnl.directional_price = state.dir_perp_qty * dpx;
                pnl.carry_price = (state.carry_spot_qty + state.carry_perp_qty) * dpx;
                state.cash += state.net_perp_qty() * dpx;

                if let Some(f) = funding {
                    funding_accum += f[i];
                }
                if i % self.config.carry_funding_freq_hours == 0 {
                    pnl.carry_funding = -funding_accum * state.carry_perp_qty * price;
                    pnl.directional_funding = -funding_accum * state.dir_perp_qty * price;
                    state.cash += pnl.carry_funding + pnl.directional_funding;
                    funding_accum = 0.0;
                }
            }
            tracker.accrue(Sleeve::Carry, pnl.carry_price, pnl.carry_funding);
            tracker.accrue(Sleeve::Directional, pnl.directional_price, pnl.directional_funding);

            // 3. NAV and peak.
            let nav = state.nav(price);
            if !(nav.is_finite() && nav > 0.0) {
                return Err(SimError::NonPositiveNav { index: i, nav });
            }
            state.peak_nav = state.peak_nav.max(nav);

            // 4. Risk decision.
            let expansion = features.expansion[i];
            let requested = regime == Regime::RiskOn && expansion;
            let decision =
                self.risk
                    .decide(nav, state.peak_nav, features.vol_percentile(i), requested)?;
            if decision.mode != state.mode {
                if decision.kill_switch_active {
                    warn!(
                        bar = i,
                        nav,
                        peak_nav = state.peak_nav,
                        mode = ?decision.mode,
                        "kill switch engaged"
                    );
                } else {
                    info!(bar = i, nav, "kill switch released");
                }
            }
            state.mode = decision.mode;

            // 5-7. Targets, quantities, pre-trade leverage.
            let alloc = apply_risk_constraints(
                self.guidance.targets(regime),
                &decision,
                expansion,
                VolTarget {
                    realized_vol: features.realized_vol(i),
                    target_dir_vol: self.config.target_dir_vol,
                    min_dir_vol: self.config.min_dir_vol,
                },
            );
            let targets = PositionTargets::from_allocations(alloc, nav, price)
                .within_leverage(nav, price, max_leverage);

            // 8-9. Execute, then unwind anything costs pushed over the cap.
            let prev_carry = state.carry_spot_qty;
            let prev_dir = state.dir_perp_qty;
            let ctx = BarContext { index: i, ts, price };
            let mut costs = BarCosts::default();
            executor.rebalance(&mut state, ctx, &targets, &mut costs, &mut trades)?;
            executor.enforce_leverage(&mut state, ctx, max_leverage, &mut costs, &mut trades)?;

            // 10. Lifecycles.
            let nav = state.nav(price);
            let at = BarMark {
                index: i,
                ts,
                price,
                nav,
                regime,
            };
            let regime_changed = i > 0 && features.regimes[i - 1] != regime;
            tracker.on_bar(
                Sleeve::Carry,
                at,
                prev_carry,
                state.carry_spot_qty,
                costs.carry,
                regime_changed,
            );
            tracker.on_bar(
                Sleeve::Directional,
                at,
                prev_dir,
                state.dir_perp_qty,
                costs.directional,
                false,
            );
            last_mark = Some(at);

            // 11. Bar record.
            let gross_exposure = state.gross_exposure(price);
            bars.push(BarResult {
                bar_index: i,
                ts,
                price,
                nav,
                regime,
                mode: state.mode,
                expansion,
                carry_notional: state.carry_spot_qty * price,
                directional_notional: state.dir_perp_qty * price,
                gross_exposure,
                leverage: if nav > 0.0 { gross_exposure / nav } else { 0.0 },
                pnl_price: pnl.carry_price + pnl.directional_price,
                pnl_carry_price: pnl.carry_price,
                pnl_directional_price: pnl.directional_price,
                pnl_funding: pnl.carry_funding + pnl.directional_funding,
                pnl_carry_funding: pnl.carry_funding,
                pnl_directional_funding: pnl.directional_funding,
                pnl_fees: -costs.fees(),
                pnl_slippage: -costs.slippage(),
                kill_switch_active: decision.kill_switch_active,
            });
        }

        let lifecycles = match last_mark {
            Some(at) => tracker.finish(at),
            None => Vec::new(),
        };
        info!(
            bars = bars.len(),
            trades = trades.len(),
            lifecycles = lifecycles.len(),
            final_nav = bars.last().map(|b| b.nav).unwrap_or(self.config.initial_nav),
            kill_switch_bars = bars.iter().filter(|b| b.kill_switch_active).count(),
            "simulation complete"
        );

        Ok(SimulationResult {
            bars,
            trades,
            lifecycles,
        })
    }
}

fn check_prices(close: &[f64]) -> Result<(), SimError> {
    match close.iter().position(|p| !(p.is_finite() && *p > 0.0)) {
        Some(index) => Err(SimError::InvalidPrice {
            index,
            price: close[index],
        }),
        None => Ok(()),
    }
}
