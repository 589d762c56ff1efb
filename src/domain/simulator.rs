//! Equity simulation with one-bar execution lag.
//!
//! `equity[0] = initial_cash` and
//! `equity[i] = equity[i-1] * (1 + pos[i-1] * (price[i] / price[i-1] - 1))`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AlphaginiError;
use super::ohlcv::BarSeries;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: DateTime<Utc>,
    pub equity: f64,
}

/// Simulate `positions` against the closes of `series`.
pub fn simulate(
    series: &BarSeries,
    positions: &[f64],
    initial_cash: f64,
) -> Result<Vec<EquityPoint>, AlphaginiError> {
    let prices = series.closes();
    let equity = compound_equity(&prices, positions, initial_cash)?;
    Ok(series
        .bars()
        .iter()
        .zip(equity)
        .map(|(bar, equity)| EquityPoint { ts: bar.ts, equity })
        .collect())
}

/// Returns-compounding equity path. Accepts fractional exposure in [0, 1].
pub fn compound_equity(
    prices: &[f64],
    positions: &[f64],
    initial_cash: f64,
) -> Result<Vec<f64>, AlphaginiError> {
    check_inputs(prices, positions, initial_cash)?;

    let mut equity = Vec::with_capacity(prices.len());
    equity.push(initial_cash);
    for i in 1..prices.len() {
        let r = prices[i] / prices[i - 1] - 1.0;
        let prev = equity[i - 1];
        equity.push(prev * (1.0 + positions[i - 1] * r));
    }
    Ok(equity)
}

/// Unit/cash bookkeeping for binary positions: buy with all cash when the
/// position turns on, sell everything when it turns off.
///
/// Yields the same path as [`compound_equity`] for positions in {0, 1}.
pub fn simulate_units(
    prices: &[f64],
    positions: &[f64],
    initial_cash: f64,
) -> Result<Vec<f64>, AlphaginiError> {
    check_inputs(prices, positions, initial_cash)?;
    if let Some(p) = positions.iter().find(|&&p| p != 0.0 && p != 1.0) {
        return Err(AlphaginiError::invalid(
            "unit bookkeeping",
            format!("position {p} is not binary; use compounding for fractional exposure"),
        ));
    }

    let mut cash = initial_cash;
    let mut units = 0.0_f64;
    let mut equity = Vec::with_capacity(prices.len());

    for (&price, &pos) in prices.iter().zip(positions) {
        equity.push(cash + units * price);
        if pos == 1.0 && units == 0.0 {
            units = cash / price;
            cash = 0.0;
        } else if pos == 0.0 && units > 0.0 {
            cash = units * price;
            units = 0.0;
        }
    }
    Ok(equity)
}

fn check_inputs(prices: &[f64], positions: &[f64], initial_cash: f64) -> Result<(), AlphaginiError> {
    if prices.len() != positions.len() {
        return Err(AlphaginiError::misaligned(
            "price vs position",
            prices.len(),
            positions.len(),
        ));
    }
    if prices.is_empty() {
        return Err(AlphaginiError::empty("price series for simulation"));
    }
    if !initial_cash.is_finite() || initial_cash <= 0.0 {
        return Err(AlphaginiError::invalid(
            "simulation",
            format!("initial cash {initial_cash} must be positive"),
        ));
    }
    if let Some(i) = prices.iter().position(|p| !p.is_finite() || *p <= 0.0) {
        return Err(AlphaginiError::invalid(
            "simulation",
            format!("price {} at index {i} must be positive", prices[i]),
        ));
    }
    if let Some(i) = positions
        .iter()
        .position(|p| !p.is_finite() || !(0.0..=1.0).contains(p))
    {
        return Err(AlphaginiError::invalid(
            "simulation",
            format!("position {} at index {i} outside [0, 1]", positions[i]),
        ));
    }
    Ok(())
}
