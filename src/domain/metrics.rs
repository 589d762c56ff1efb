//! Strategy performance and forecast error statistics.

use serde::{Deserialize, Serialize};

use super::error::AlphaginiError;
use super::simulator::EquityPoint;

/// Guards the ratio denominators against a constant equity path.
const EPSILON: f64 = 1e-9;
const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    /// Periods with a non-zero strategy return.
    pub trades: usize,
    pub abs_return: f64,
    pub rel_return: f64,
    /// `None` when the equity curve spans no time.
    pub cagr: Option<f64>,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub mape: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelErrors {
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub mape: Option<f64>,
}

pub fn score(
    equity: &[EquityPoint],
    periods_per_year: f64,
    initial_cash: f64,
    y_true: Option<&[f64]>,
    y_pred: Option<&[f64]>,
) -> Result<MetricsRecord, AlphaginiError> {
    let (first, last) = match (equity.first(), equity.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(AlphaginiError::empty("equity series")),
    };
    if !periods_per_year.is_finite() || periods_per_year <= 0.0 {
        return Err(AlphaginiError::invalid(
            "metrics",
            format!("periods_per_year {periods_per_year} must be positive"),
        ));
    }
    if !initial_cash.is_finite() || initial_cash <= 0.0 {
        return Err(AlphaginiError::invalid(
            "metrics",
            format!("initial cash {initial_cash} must be positive"),
        ));
    }

    let errors = match (y_true, y_pred) {
        (Some(t), Some(p)) => model_errors(t, p)?,
        (None, None) => ModelErrors {
            rmse: None,
            mae: None,
            mape: None,
        },
        _ => {
            return Err(AlphaginiError::invalid(
                "metrics",
                "y_true and y_pred must be supplied together",
            ));
        }
    };

    let returns = period_returns(equity);
    let (sharpe, sortino) = compute_risk_adjusted(&returns, periods_per_year);

    let wins = returns.iter().filter(|&&r| r > 0.0).count();
    let win_rate = if returns.is_empty() {
        0.0
    } else {
        wins as f64 / returns.len() as f64
    };
    let trades = returns.iter().filter(|&&r| r != 0.0).count();

    // very short spans overflow the exponent; report those as undefined
    let years = (last.ts - first.ts).num_seconds() as f64 / SECONDS_PER_YEAR;
    let cagr = if years > 0.0 {
        Some((last.equity / initial_cash).powf(1.0 / years) - 1.0).filter(|c| c.is_finite())
    } else {
        None
    };

    Ok(MetricsRecord {
        sharpe,
        sortino,
        max_drawdown: compute_drawdown(equity),
        win_rate,
        trades,
        abs_return: last.equity - initial_cash,
        rel_return: last.equity / initial_cash - 1.0,
        cagr,
        rmse: errors.rmse,
        mae: errors.mae,
        mape: errors.mape,
    })
}

/// Forecast errors over the indices where both values are finite.
/// MAPE additionally skips points where the realized value is zero.
pub fn model_errors(y_true: &[f64], y_pred: &[f64]) -> Result<ModelErrors, AlphaginiError> {
    if y_true.len() != y_pred.len() {
        return Err(AlphaginiError::misaligned(
            "y_true vs y_pred",
            y_true.len(),
            y_pred.len(),
        ));
    }

    let pairs: Vec<(f64, f64)> = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t.is_finite() && p.is_finite())
        .map(|(&t, &p)| (t, p))
        .collect();

    let mean = |values: Vec<f64>| -> Option<f64> {
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    };

    let rmse = mean(pairs.iter().map(|(t, p)| (t - p).powi(2)).collect()).map(f64::sqrt);
    let mae = mean(pairs.iter().map(|(t, p)| (t - p).abs()).collect());
    let mape = mean(
        pairs
            .iter()
            .filter(|(t, _)| *t != 0.0)
            .map(|(t, p)| (t - p).abs() / t.abs())
            .collect(),
    )
    .map(|m| m * 100.0);

    Ok(ModelErrors { rmse, mae, mape })
}

fn period_returns(equity: &[EquityPoint]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| w[1].equity / w[0].equity - 1.0)
        .collect()
}

/// Largest relative decline from the running peak, as a non-positive number.
fn compute_drawdown(equity: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for point in equity {
        peak = peak.max(point.equity);
        let dd = point.equity / peak - 1.0;
        if dd < max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

fn compute_risk_adjusted(returns: &[f64], periods_per_year: f64) -> (f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let scale = periods_per_year.sqrt();

    let sharpe = mean / (sample_std(returns) + EPSILON) * scale;

    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    let sortino = mean / (sample_std(&downside) + EPSILON) * scale;

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                ts: start + Duration::days(i as i64),
                equity,
            })
            .collect()
    }

    #[test]
    fn empty_equity_is_an_error() {
        let err = score(&[], 365.0, 1000.0, None, None).unwrap_err();
        assert!(matches!(err, AlphaginiError::EmptyInput { .. }));
    }

    #[test]
    fn constant_equity_is_degenerate_but_finite() {
        let curve = make_equity_curve(&[1000.0; 10]);
        let m = score(&curve, 365.0, 1000.0, None, None).unwrap();
        assert_eq!(m.sharpe, 0.0);
        assert_eq!(m.sortino, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.trades, 0);
        assert_eq!(m.abs_return, 0.0);
        assert_relative_eq!(m.cagr.unwrap(), 0.0);
    }

    #[test]
    fn returns_and_drawdown() {
        let curve = make_equity_curve(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        let m = score(&curve, 365.0, 100.0, None, None).unwrap();
        assert_relative_eq!(m.max_drawdown, 80.0 / 110.0 - 1.0, epsilon = 1e-12);
        assert_eq!(m.abs_return, 0.0);
        assert_eq!(m.rel_return, 0.0);
        assert_relative_eq!(m.win_rate, 3.0 / 5.0);
        assert_eq!(m.trades, 5);
    }

    #[test]
    fn sharpe_matches_formula() {
        let curve = make_equity_curve(&[100.0, 101.0, 100.5, 102.0]);
        let m = score(&curve, 252.0, 100.0, None, None).unwrap();

        let r = [0.01, 100.5 / 101.0 - 1.0, 102.0 / 100.5 - 1.0];
        let mean = r.iter().sum::<f64>() / 3.0;
        let var = r.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 2.0;
        let expected = mean / (var.sqrt() + 1e-9) * 252.0_f64.sqrt();
        assert_relative_eq!(m.sharpe, expected, max_relative = 1e-12);
        assert!(m.sortino.is_finite());
    }

    #[test]
    fn sortino_uses_negative_returns_only() {
        let curve = make_equity_curve(&[100.0, 90.0, 99.0, 89.1, 120.0]);
        let m = score(&curve, 365.0, 100.0, None, None).unwrap();
        // downside returns are both -10%, so their deviation is zero
        assert!(m.sortino > m.sharpe);
    }

    #[test]
    fn single_point_has_no_returns() {
        let curve = make_equity_curve(&[500.0]);
        let m = score(&curve, 365.0, 500.0, None, None).unwrap();
        assert_eq!(m.sharpe, 0.0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.cagr, None);
    }

    #[test]
    fn cagr_over_one_year() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let curve = vec![
            EquityPoint {
                ts: start,
                equity: 1000.0,
            },
            EquityPoint {
                ts: start + Duration::days(365),
                equity: 1210.0,
            },
        ];
        let m = score(&curve, 365.0, 1000.0, None, None).unwrap();
        assert_relative_eq!(m.cagr.unwrap(), 0.21, epsilon = 1e-12);
        assert_relative_eq!(m.rel_return, 0.21, epsilon = 1e-12);
        assert_relative_eq!(m.abs_return, 210.0, epsilon = 1e-9);
    }

    #[test]
    fn cagr_over_minutes_is_undefined() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let curve = vec![
            EquityPoint {
                ts: start,
                equity: 1000.0,
            },
            EquityPoint {
                ts: start + Duration::minutes(5),
                equity: 1100.0,
            },
        ];
        let m = score(&curve, 105_120.0, 1000.0, None, None).unwrap();
        assert_eq!(m.cagr, None);
        assert_relative_eq!(m.rel_return, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn record_survives_json_round_trip() {
        let curve = make_equity_curve(&[1000.0, 1100.0, 1050.0, 1234.5678, 999.9]);
        let y_true = [100.0, 110.0, 105.0, 123.45678, 99.99];
        let y_pred = [101.0, 108.3, 0.0, 120.0, 100.1];
        let m = score(&curve, 365.0, 1000.0, Some(&y_true), Some(&y_pred)).unwrap();

        let json = serde_json::to_string(&m).unwrap();
        let back: MetricsRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);

        let mut short = make_equity_curve(&[1000.0, 1100.0]);
        short[1].ts = short[0].ts + Duration::minutes(5);
        let m = score(&short, 105_120.0, 1000.0, None, None).unwrap();
        let back: MetricsRecord = serde_json::from_str(&serde_json::to_string(&m).unwrap()).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn rejects_bad_frequency() {
        let curve = make_equity_curve(&[1.0, 2.0]);
        assert!(score(&curve, 0.0, 1.0, None, None).is_err());
        assert!(score(&curve, f64::NAN, 1.0, None, None).is_err());
    }

    #[test]
    fn model_errors_basic() {
        let e = model_errors(&[100.0, 200.0], &[110.0, 190.0]).unwrap();
        assert_relative_eq!(e.rmse.unwrap(), 10.0);
        assert_relative_eq!(e.mae.unwrap(), 10.0);
        assert_relative_eq!(e.mape.unwrap(), (10.0 + 5.0) / 2.0);
    }

    #[test]
    fn model_errors_skip_undefined() {
        let e = model_errors(&[100.0, f64::NAN, 0.0], &[90.0, 5.0, 1.0]).unwrap();
        // pairs used: (100, 90) and (0, 1); mape skips the zero
        assert_relative_eq!(e.mae.unwrap(), 5.5);
        assert_relative_eq!(e.mape.unwrap(), 10.0);
    }

    #[test]
    fn model_errors_all_undefined() {
        let e = model_errors(&[f64::NAN], &[1.0]).unwrap();
        assert_eq!(e.rmse, None);
        assert_eq!(e.mae, None);
        assert_eq!(e.mape, None);
    }

    #[test]
    fn model_errors_misaligned() {
        assert!(matches!(
            model_errors(&[1.0], &[1.0, 2.0]),
            Err(AlphaginiError::MisalignedSeries { .. })
        ));
    }

    #[test]
    fn score_carries_model_errors() {
        let curve = make_equity_curve(&[100.0, 101.0]);
        let m = score(&curve, 365.0, 100.0, Some(&[1.0, 2.0]), Some(&[1.0, 3.0])).unwrap();
        assert_relative_eq!(m.mae.unwrap(), 0.5);
        assert!(score(&curve, 365.0, 100.0, Some(&[1.0]), None).is_err());
    }
}
