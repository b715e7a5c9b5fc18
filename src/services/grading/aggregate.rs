use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const DEFAULT_REVIEW_THRESHOLD: f64 = 0.80;

/// One graded question as folded into the aggregate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct QuestionOutcome {
    pub(crate) question_number: i32,
    pub(crate) points_awarded: f64,
    pub(crate) points_available: f64,
    pub(crate) confidence: f64,
    pub(crate) feedback: String,
    pub(crate) illegible: bool,
}

/// Persisted shape of a question outcome: confidence as a percentage.
#[derive(Debug, Serialize)]
struct QuestionOutcomeRecord<'a> {
    question_number: i32,
    points_awarded: f64,
    points_available: f64,
    confidence: f64,
    illegible: bool,
    feedback: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Aggregate {
    pub(crate) ai_score: f64,
    pub(crate) confidence_score: f64,
    pub(crate) needs_review: bool,
    pub(crate) question_results: Value,
    pub(crate) feedback: String,
}

pub(crate) fn aggregate(outcomes: &[QuestionOutcome], review_threshold: f64) -> Aggregate {
    let mut ordered: Vec<&QuestionOutcome> = outcomes.iter().collect();
    ordered.sort_by_key(|outcome| outcome.question_number);

    let total_awarded: f64 = ordered.iter().map(|outcome| outcome.points_awarded).sum();
    let total_available: f64 = ordered.iter().map(|outcome| outcome.points_available).sum();

    let ai_score = if total_available == 0.0 {
        0.0
    } else {
        round_half_up(total_awarded / total_available * 100.0, 2)
    };

    let confidence_score = if ordered.is_empty() {
        0.0
    } else {
        let mean = ordered.iter().map(|outcome| outcome.confidence).sum::<f64>()
            / ordered.len() as f64;
        round_half_up(mean * 100.0, 2)
    };

    let needs_review = ordered
        .iter()
        .any(|outcome| outcome.confidence < review_threshold || outcome.illegible);

    Aggregate {
        ai_score,
        confidence_score,
        needs_review,
        question_results: serialize_outcomes(&ordered),
        feedback: combine_feedback(&ordered),
    }
}

/// Teacher override wins when it lies in `[0, 1]`, then the configured
/// default, then [`DEFAULT_REVIEW_THRESHOLD`].
pub(crate) fn resolve_review_threshold(configured: f64, teacher_override: Option<f64>) -> f64 {
    if let Some(value) = teacher_override {
        if is_valid_threshold(value) {
            return value;
        }
        tracing::warn!(threshold = value, "Ignoring out-of-range teacher review threshold");
    }

    if is_valid_threshold(configured) {
        return configured;
    }

    tracing::warn!(
        threshold = configured,
        fallback = DEFAULT_REVIEW_THRESHOLD,
        "Configured review threshold out of range, using fallback"
    );
    DEFAULT_REVIEW_THRESHOLD
}

fn is_valid_threshold(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// Half-up rounding to `places` decimals. The nudge keeps values such as
/// `2.675` from rounding down because of their binary representation.
pub(crate) fn round_half_up(value: f64, places: u32) -> f64 {
    let factor = 10_f64.powi(places as i32);
    let scaled = value * factor;
    (scaled + scaled.signum() * 1e-9).round() / factor
}

fn serialize_outcomes(ordered: &[&QuestionOutcome]) -> Value {
    let records: Vec<QuestionOutcomeRecord<'_>> = ordered
        .iter()
        .map(|outcome| QuestionOutcomeRecord {
            question_number: outcome.question_number,
            points_awarded: outcome.points_awarded,
            points_available: outcome.points_available,
            confidence: round_half_up(outcome.confidence * 100.0, 2),
            illegible: outcome.illegible,
            feedback: &outcome.feedback,
        })
        .collect();

    serde_json::to_value(&records).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Failed to serialize question results, storing empty list");
        Value::Array(Vec::new())
    })
}

fn combine_feedback(ordered: &[&QuestionOutcome]) -> String {
    ordered
        .iter()
        .map(|outcome| format!("Q{}: {}", outcome.question_number, outcome.feedback))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(question_number: i32, awarded: f64, available: f64, confidence: f64) -> QuestionOutcome {
        QuestionOutcome {
            question_number,
            points_awarded: awarded,
            points_available: available,
            confidence,
            feedback: format!("feedback {question_number}"),
            illegible: false,
        }
    }

    #[test]
    fn two_questions_of_five_points_score_ninety() {
        let result = aggregate(&[outcome(1, 4.5, 5.0, 0.9), outcome(2, 4.5, 5.0, 0.9)], 0.8);
        assert_eq!(result.ai_score, 90.0);
        assert_eq!(result.confidence_score, 90.0);
        assert!(!result.needs_review);
    }

    #[test]
    fn zero_available_points_score_zero() {
        let result = aggregate(&[outcome(1, 0.0, 0.0, 0.95)], 0.8);
        assert_eq!(result.ai_score, 0.0);
    }

    #[test]
    fn single_question_scenario() {
        let result = aggregate(&[outcome(1, 4.5, 5.0, 0.92)], 0.8);
        assert_eq!(result.ai_score, 90.0);
        assert_eq!(result.confidence_score, 92.0);
        assert!(!result.needs_review);
        assert_eq!(result.question_results[0]["confidence"], 92.0);
        assert_eq!(result.question_results[0]["points_available"], 5.0);
    }

    #[test]
    fn review_flag_follows_low_confidence_or_illegible() {
        let cases: [(&[f64], &[bool], bool); 5] = [
            (&[0.95, 0.85], &[false, false], false),
            (&[0.95, 0.79], &[false, false], true),
            (&[0.80, 0.80], &[false, false], false),
            (&[0.99, 0.99], &[false, true], true),
            (&[0.10], &[true], true),
        ];

        for (confidences, illegible, expected) in cases {
            let outcomes: Vec<QuestionOutcome> = confidences
                .iter()
                .zip(illegible)
                .enumerate()
                .map(|(idx, (confidence, illegible))| QuestionOutcome {
                    illegible: *illegible,
                    ..outcome(idx as i32 + 1, 1.0, 1.0, *confidence)
                })
                .collect();
            assert_eq!(
                aggregate(&outcomes, 0.8).needs_review,
                expected,
                "confidences {confidences:?} illegible {illegible:?}"
            );
        }
    }

    #[test]
    fn feedback_is_prefixed_and_ordered_by_question() {
        let result = aggregate(&[outcome(3, 1.0, 1.0, 0.9), outcome(1, 1.0, 1.0, 0.9)], 0.8);
        assert_eq!(result.feedback, "Q1: feedback 1\nQ3: feedback 3");
        assert_eq!(result.question_results[0]["question_number"], 1);
        assert_eq!(result.question_results[1]["question_number"], 3);
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_half_up(2.675, 2), 2.68);
        assert_eq!(round_half_up(66.666_666, 2), 66.67);
        assert_eq!(round_half_up(12.344_9, 2), 12.34);
        assert_eq!(round_half_up(0.0, 2), 0.0);

        let thirds = aggregate(&[outcome(1, 1.0, 3.0, 0.9)], 0.8);
        assert_eq!(thirds.ai_score, 33.33);
    }

    #[test]
    fn threshold_resolution_prefers_valid_teacher_override() {
        assert_eq!(resolve_review_threshold(0.8, Some(0.6)), 0.6);
        assert_eq!(resolve_review_threshold(0.7, Some(1.5)), 0.7);
        assert_eq!(resolve_review_threshold(0.7, None), 0.7);
        assert_eq!(resolve_review_threshold(-0.1, None), DEFAULT_REVIEW_THRESHOLD);
        assert_eq!(resolve_review_threshold(2.0, Some(-1.0)), DEFAULT_REVIEW_THRESHOLD);
    }
}
