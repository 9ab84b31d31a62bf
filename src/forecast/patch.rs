use std::fmt;

use crate::error::ForecastError;

pub const DEFAULT_PATCH_LENGTH: usize = 32;

/// Fixed-length window of normalized prices fed to the sequence model.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePatch {
    values: Vec<f64>,
}

impl PricePatch {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn summary(&self) -> PatchSummary {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in &self.values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        let first = self.values.first().copied().unwrap_or(0.0);
        let last = self.values.last().copied().unwrap_or(0.0);
        let rate_of_change_pct = if first.abs() > f64::EPSILON {
            Some((last - first) / first * 100.0)
        } else {
            None
        };
        PatchSummary {
            len: self.values.len(),
            min,
            max,
            mean: sum / self.values.len().max(1) as f64,
            rate_of_change_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchSummary {
    pub len: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub rate_of_change_pct: Option<f64>,
}

impl fmt::Display for PatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Price Patch Analysis:")?;
        writeln!(f, "Minimum Normalized Price: {:.4}", self.min)?;
        writeln!(f, "Maximum Normalized Price: {:.4}", self.max)?;
        writeln!(f, "Average Normalized Price: {:.4}", self.mean)?;
        match self.rate_of_change_pct {
            Some(roc) => writeln!(f, "Normalized Rate of Change: {:.4}%", roc)?,
            None => writeln!(f, "Normalized Rate of Change: n/a")?,
        }
        write!(f, "Patch Length: {} bars", self.len)
    }
}

/// Split a normalized series into consecutive, non-overlapping patches.
/// A trailing remainder shorter than `patch_length` is dropped.
pub fn make_patches(series: &[f64], patch_length: usize) -> Result<Vec<PricePatch>, ForecastError> {
    if patch_length == 0 {
        return Err(ForecastError::InvalidParameter(
            "patch length must be > 0".to_string(),
        ));
    }
    if series.len() < patch_length {
        return Err(ForecastError::InsufficientData {
            required: patch_length,
            available: series.len(),
        });
    }
    Ok(series
        .chunks_exact(patch_length)
        .map(|chunk| PricePatch {
            values: chunk.to_vec(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_remainder_is_dropped() {
        let series: Vec<f64> = (0..10).map(f64::from).collect();
        let patches = make_patches(&series, 4).unwrap();
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[1].values(), &[4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn short_series_is_rejected() {
        let err = make_patches(&[1.0, 2.0], 4).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                required: 4,
                available: 2
            }
        );
        assert!(matches!(
            make_patches(&[1.0], 0),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn summary_reports_range_and_rate_of_change() {
        let patch = make_patches(&[1.0, 3.0, 2.0, 2.0], 4).unwrap().remove(0);
        let s = patch.summary();
        assert_eq!(s.len, 4);
        assert!((s.min - 1.0).abs() < f64::EPSILON);
        assert!((s.max - 3.0).abs() < f64::EPSILON);
        assert!((s.mean - 2.0).abs() < f64::EPSILON);
        assert_eq!(s.rate_of_change_pct, Some(100.0));
        let text = s.to_string();
        assert!(text.contains("Patch Length: 4 bars"));
        assert!(text.contains("100.0000%"));
    }

    #[test]
    fn summary_skips_rate_of_change_from_zero() {
        let patch = make_patches(&[0.0, 1.0], 2).unwrap().remove(0);
        assert_eq!(patch.summary().rate_of_change_pct, None);
    }
}
