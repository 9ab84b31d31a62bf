use serde::Serialize;

use crate::tracker::store::PredictionRecord;

/// Accuracy of reconciled predictions. Error fields are absolute percentage
/// errors; the `accuracy_within_*` fields are fractions in [0, 1]. Every
/// optional field is `None` when no record has been reconciled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccuracyStatistics {
    pub total_predictions: usize,
    pub reconciled: usize,
    pub average_error: Option<f64>,
    pub min_error: Option<f64>,
    pub max_error: Option<f64>,
    /// Share of reconciled records with |error| <= 1%, in [0, 1]. Multiply
    /// by 100 to display it as a percentage.
    pub accuracy_within_1_percent: Option<f64>,
    /// Share of reconciled records with |error| <= 5%, in [0, 1].
    pub accuracy_within_5_percent: Option<f64>,
}

pub fn statistics(records: &[PredictionRecord]) -> AccuracyStatistics {
    let abs_errors: Vec<f64> = records
        .iter()
        .filter(|r| r.actual_price.is_some())
        .filter_map(|r| r.error_percentage)
        .map(f64::abs)
        .collect();

    let mut stats = AccuracyStatistics {
        total_predictions: records.len(),
        reconciled: abs_errors.len(),
        ..AccuracyStatistics::default()
    };
    if abs_errors.is_empty() {
        return stats;
    }

    let n = abs_errors.len() as f64;
    let within = |limit: f64| abs_errors.iter().filter(|e| **e <= limit).count() as f64 / n;
    stats.average_error = Some(abs_errors.iter().sum::<f64>() / n);
    stats.min_error = abs_errors.iter().copied().reduce(f64::min);
    stats.max_error = abs_errors.iter().copied().reduce(f64::max);
    stats.accuracy_within_1_percent = Some(within(1.0));
    stats.accuracy_within_5_percent = Some(within(5.0));
    stats
}

/// Signed error of a prediction relative to the predicted price, in percent.
pub fn error_percentage(predicted_price: f64, actual_price: f64) -> Option<f64> {
    if predicted_price == 0.0 {
        return None;
    }
    let pct = (actual_price - predicted_price) / predicted_price * 100.0;
    pct.is_finite().then_some(pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InstrumentClass, Timeframe};
    use chrono::Utc;

    fn record(id: i64, predicted: f64, actual: Option<f64>) -> PredictionRecord {
        let now = Utc::now();
        PredictionRecord {
            id,
            ticker: "BTCUSDT".to_string(),
            market_type: InstrumentClass::Crypto,
            prediction_time: now,
            target_time: now,
            predicted_price: predicted,
            actual_price: actual,
            error_percentage: actual.and_then(|a| error_percentage(predicted, a)),
            timeframe: Timeframe::OneHour,
            created_at: now,
        }
    }

    #[test]
    fn empty_input_is_all_none() {
        let stats = statistics(&[]);
        assert_eq!(stats, AccuracyStatistics::default());
        assert_eq!(stats.reconciled, 0);
        assert!(stats.average_error.is_none());
    }

    #[test]
    fn pending_records_count_but_do_not_score() {
        let stats = statistics(&[record(1, 100.0, None), record(2, 100.0, None)]);
        assert_eq!(stats.total_predictions, 2);
        assert_eq!(stats.reconciled, 0);
        assert!(stats.accuracy_within_5_percent.is_none());
    }

    #[test]
    fn aggregates_absolute_errors() {
        let stats = statistics(&[
            record(1, 100.0, Some(100.5)),
            record(2, 100.0, Some(97.0)),
            record(3, 100.0, Some(110.0)),
            record(4, 100.0, None),
        ]);
        assert_eq!(stats.total_predictions, 4);
        assert_eq!(stats.reconciled, 3);
        assert!((stats.average_error.unwrap() - 4.5).abs() < 1e-9);
        assert!((stats.min_error.unwrap() - 0.5).abs() < 1e-9);
        assert!((stats.max_error.unwrap() - 10.0).abs() < 1e-9);
        assert!((stats.accuracy_within_1_percent.unwrap() - 1.0 / 3.0).abs() < 1e-9);
        assert!((stats.accuracy_within_5_percent.unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn perfect_accuracy_is_one_not_one_hundred() {
        let stats = statistics(&[record(1, 100.0, Some(100.0)), record(2, 100.0, Some(100.2))]);
        assert_eq!(stats.accuracy_within_1_percent, Some(1.0));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["accuracy_within_5_percent"], serde_json::json!(1.0));
    }

    #[test]
    fn error_percentage_is_signed() {
        assert_eq!(error_percentage(200.0, 210.0), Some(5.0));
        assert_eq!(error_percentage(200.0, 190.0), Some(-5.0));
        assert_eq!(error_percentage(0.0, 1.0), None);
    }
}
