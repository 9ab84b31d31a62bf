use serde::Serialize;

use crate::error::ForecastError;

/// Share of the anchor price used as the stand-in standard deviation when the
/// original statistics were not retained.
pub const ANCHOR_STD_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizationStats {
    pub mean: f64,
    pub std: f64,
}

/// How normalized values are mapped back to price space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Denormalization {
    /// Exact inverse of `normalize` using the statistics it returned.
    Stats(NormalizationStats),
    /// Lossy fallback: treats the anchor as the mean and 10% of it as the std.
    /// Only a rough rescaling around the last known price, not an inverse.
    Anchor(f64),
}

impl Denormalization {
    pub fn stats(self) -> NormalizationStats {
        match self {
            Self::Stats(stats) => stats,
            Self::Anchor(anchor) => NormalizationStats {
                mean: anchor,
                std: anchor * ANCHOR_STD_FRACTION,
            },
        }
    }
}

/// Z-score `series` with its own population mean and std.
pub fn normalize(series: &[f64]) -> Result<(Vec<f64>, NormalizationStats), ForecastError> {
    let stats = normalization_stats(series)?;
    let normalized = series
        .iter()
        .map(|x| (x - stats.mean) / stats.std)
        .collect();
    Ok((normalized, stats))
}

pub fn normalization_stats(series: &[f64]) -> Result<NormalizationStats, ForecastError> {
    if series.is_empty() {
        return Err(ForecastError::DegenerateInput(
            "cannot normalize an empty series".to_string(),
        ));
    }
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let var = series.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
    let std = var.sqrt();
    // Also catches NaN/inf inputs, which poison both moments.
    if !(std > 0.0) || !std.is_finite() || !mean.is_finite() {
        return Err(ForecastError::DegenerateInput(format!(
            "series of {} values has zero or undefined variance",
            series.len()
        )));
    }
    Ok(NormalizationStats { mean, std })
}

pub fn denormalize(
    normalized: &[f64],
    basis: Denormalization,
) -> Result<Vec<f64>, ForecastError> {
    if let Denormalization::Anchor(anchor) = basis {
        if !anchor.is_finite() {
            return Err(ForecastError::DegenerateInput(
                "anchor price must be finite".to_string(),
            ));
        }
    }
    let stats = basis.stats();
    Ok(normalized.iter().map(|x| x * stats.std + stats.mean).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_series_has_zero_mean_unit_std() {
        let (z, stats) = normalize(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std - 2.0).abs() < 1e-12);
        let mean = z.iter().sum::<f64>() / z.len() as f64;
        assert!(mean.abs() < 1e-12);
        assert!((z[0] + 1.5).abs() < 1e-12);
    }

    #[test]
    fn empty_and_constant_series_are_degenerate() {
        assert!(matches!(
            normalize(&[]),
            Err(ForecastError::DegenerateInput(_))
        ));
        assert!(matches!(
            normalize(&[3.0, 3.0, 3.0]),
            Err(ForecastError::DegenerateInput(_))
        ));
        assert!(matches!(
            normalize(&[1.0, f64::NAN]),
            Err(ForecastError::DegenerateInput(_))
        ));
    }

    #[test]
    fn anchor_mode_uses_ten_percent_heuristic() {
        let out = denormalize(&[0.0, 1.0, -2.0], Denormalization::Anchor(200.0)).unwrap();
        assert_eq!(out, vec![200.0, 220.0, 160.0]);
    }
}
