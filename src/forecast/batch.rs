use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub target_time: DateTime<Utc>,
    pub price: f64,
}

/// Output of a single forecast call; not modified after scheduling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastBatch {
    issued_at: DateTime<Utc>,
    timeframe: Timeframe,
    points: Vec<ForecastPoint>,
}

impl ForecastBatch {
    /// Tags prediction `i` with `issued_at + target_interval * (i + 1)`.
    pub fn schedule(
        prices: &[f64],
        timeframe: Timeframe,
        issued_at: DateTime<Utc>,
        target_interval_ms: u64,
    ) -> Self {
        let step = Duration::milliseconds(target_interval_ms as i64);
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| ForecastPoint {
                target_time: issued_at + step * (i as i32 + 1),
                price,
            })
            .collect();
        Self {
            issued_at,
            timeframe,
            points,
        }
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn targets_step_by_interval() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let batch = ForecastBatch::schedule(&[1.0, 2.0, 3.0], Timeframe::FiveMin, t0, 300_000);
        let targets: Vec<_> = batch.points().iter().map(|p| p.target_time).collect();
        assert_eq!(targets[0], t0 + Duration::minutes(5));
        assert_eq!(targets[2], t0 + Duration::minutes(15));
        assert_eq!(batch.prices(), vec![1.0, 2.0, 3.0]);
    }
}
