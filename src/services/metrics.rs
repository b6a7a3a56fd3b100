//! Insight arithmetic.
//!
//! Pure functions only. Every division is guarded: an empty input or a zero
//! denominator yields `0.0`, never NaN.

use crate::domain::models::{ComparisonResponse, SurveyResponse, VariantCounts};

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 10.0).round() / 10.0
}

/// `numerator / denominator * 100`, rounded to one decimal; `0.0` for a zero denominator.
pub fn percentage(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round1(numerator as f64 / denominator as f64 * 100.0)
}

/// Arithmetic mean of the numeric entries; missing and non-finite entries are skipped.
pub fn mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0_f64, 0_u32), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

/// Mean of one survey's five sub-scores.
pub fn survey_average(survey: &SurveyResponse) -> f64 {
    mean(survey.sub_scores())
}

/// Mean of the per-survey averages, rounded to one decimal. `0.0` with no surveys.
pub fn value_score(surveys: &[SurveyResponse]) -> f64 {
    round1(mean(surveys.iter().map(|s| Some(survey_average(s)))))
}

pub fn share_of_buy(counts: &VariantCounts) -> f64 {
    percentage(counts.chosen_times, counts.total_clicks)
}

pub fn share_of_click(counts: &VariantCounts) -> f64 {
    percentage(counts.choice_events, counts.total_clicks)
}

/// Rounded means of the five relative scores over one competitor's comparisons,
/// in the order value, aesthetics, utility, trust, convenience.
pub fn comparison_scores(comparisons: &[&ComparisonResponse]) -> [f64; 5] {
    [
        round1(mean(comparisons.iter().map(|c| c.value))),
        round1(mean(comparisons.iter().map(|c| c.aesthetics))),
        round1(mean(comparisons.iter().map(|c| c.utility))),
        round1(mean(comparisons.iter().map(|c| c.trust))),
        round1(mean(comparisons.iter().map(|c| c.convenience))),
    ]
}
