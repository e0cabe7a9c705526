use crate::forest::{ScoreModel, FEATURE_COUNT};
use crate::models::{ChartPoint, Projection, UserProfile};

pub const CHART_CATEGORIES: [&str; FEATURE_COUNT] =
    ["Savings", "Investing", "Spending", "Debt", "Stability"];

/// Maps the 0–12 month stability buffer onto the 0–100 chart range.
pub const STABILITY_SCALE: f64 = 8.33;

/// Dollar-scale feature vector in the exact training order:
/// [savings, investment, expenses, debt, income]. Percentages are taken
/// against the salary, which floors at 1 to keep the conversion defined.
pub fn feature_vector(profile: &UserProfile) -> [f64; FEATURE_COUNT] {
    let salary = profile.salary.max(1.0);
    [
        salary * profile.savings_percentage / 100.0,
        salary * profile.investing_rate / 100.0,
        salary * profile.spending_rate / 100.0,
        salary * profile.debt_load / 100.0,
        salary,
    ]
}

/// Raw chart standings before importance weighting. Spending and debt are
/// inverted so that higher always reads as healthier; the stability buffer is
/// rescaled and capped at 100.
pub fn display_values(profile: &UserProfile) -> [f64; FEATURE_COUNT] {
    [
        profile.savings_percentage,
        profile.investing_rate,
        100.0 - profile.spending_rate,
        100.0 - profile.debt_load,
        (profile.stability_buffer * STABILITY_SCALE).min(100.0),
    ]
}

pub fn project(model: &ScoreModel, profile: &UserProfile) -> Projection {
    let features = feature_vector(profile);
    let prediction = model.predict(&features);
    let dispersion = model.dispersion(&features);

    // Confidence heuristic carried over from the product: a 99.0% base minus
    // scaled tree disagreement, floored at 88%. Not a calibrated interval.
    let accuracy = round1((0.990 - dispersion / 200.0).max(0.88) * 100.0);

    let importances = model.importances();
    let visualization = CHART_CATEGORIES
        .iter()
        .zip(display_values(profile))
        .enumerate()
        .map(|(i, (category, value))| ChartPoint {
            category: (*category).to_string(),
            value: round2(value * (0.8 + importances[i])),
        })
        .collect();

    Projection {
        score: prediction.round() as i64,
        visualization,
        accuracy,
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset;
    use crate::models::FinancialSummary;
    use crate::trainer;

    fn sample_profile() -> UserProfile {
        UserProfile {
            salary: 5000.0,
            savings_percentage: 20.0,
            investing_rate: 10.0,
            spending_rate: 50.0,
            debt_load: 30.0,
            stability_buffer: 6.0,
        }
    }

    fn savings_driven_summaries() -> Vec<FinancialSummary> {
        (0..25)
            .map(|i| {
                let mut summary = FinancialSummary {
                    dataset_user_id: format!("u{i:02}"),
                    income: 5000.0,
                    expenses: 2500.0,
                    savings: 200.0 * i as f64,
                    debt: 500.0,
                    investment: 100.0,
                    financial_score: 0.0,
                };
                summary.financial_score = dataset::financial_score(&summary);
                summary
            })
            .collect()
    }

    #[test]
    fn feature_vector_converts_percentages_to_dollars() {
        let features = feature_vector(&sample_profile());
        assert_eq!(features[0], 1000.0); // savings
        assert_eq!(features[1], 500.0); // investment
        assert_eq!(features[2], 2500.0); // expenses
        assert_eq!(features[3], 1500.0); // debt
        assert_eq!(features[4], 5000.0); // income
    }

    #[test]
    fn zero_salary_floors_to_one() {
        let mut profile = sample_profile();
        profile.salary = 0.0;
        assert_eq!(feature_vector(&profile)[4], 1.0);
    }

    #[test]
    fn display_values_invert_spending_and_debt() {
        let values = display_values(&sample_profile());
        assert_eq!(values[0], 20.0);
        assert_eq!(values[1], 10.0);
        assert_eq!(values[2], 50.0); // 100 - 50 spending
        assert_eq!(values[3], 70.0); // 100 - 30 debt
        assert!((values[4] - 49.98).abs() < 1e-9); // 6 * 8.33
    }

    #[test]
    fn stability_display_caps_at_one_hundred() {
        let mut profile = sample_profile();
        profile.stability_buffer = 24.0;
        assert_eq!(display_values(&profile)[4], 100.0);
    }

    #[test]
    fn missing_profile_fields_default_to_zero() {
        let profile: UserProfile = serde_json::from_str(r#"{"salary": 4000}"#).unwrap();
        assert_eq!(profile.salary, 4000.0);
        assert_eq!(profile.savings_percentage, 0.0);
        assert_eq!(profile.debt_load, 0.0);
    }

    #[test]
    fn accuracy_stays_within_heuristic_bounds() {
        let model = trainer::train(&dataset::seed_summaries()).unwrap();
        for salary in [1.0, 800.0, 5000.0, 250_000.0] {
            let mut profile = sample_profile();
            profile.salary = salary;
            let projection = project(&model, &profile);
            assert!(projection.accuracy >= 88.0);
            assert!(projection.accuracy <= 99.0);
        }
    }

    #[test]
    fn projection_is_idempotent() {
        let model = trainer::train(&savings_driven_summaries()).unwrap();
        let profile = sample_profile();

        let first = project(&model, &profile);
        let second = project(&model, &profile);
        assert_eq!(first.score, second.score);
        assert_eq!(first.accuracy, second.accuracy);
        for (a, b) in first.visualization.iter().zip(second.visualization.iter()) {
            assert_eq!(a.category, b.category);
            assert_eq!(a.value, b.value);
        }
    }

    #[test]
    fn feature_order_holds_end_to_end() {
        // The training set only rewards savings, so a profile with a high
        // savings percentage must out-score a low one. A swapped feature
        // column between training and inference breaks this.
        let model = trainer::train(&savings_driven_summaries()).unwrap();

        let mut thrifty = sample_profile();
        thrifty.savings_percentage = 80.0;
        let mut spendy = sample_profile();
        spendy.savings_percentage = 2.0;

        let high = project(&model, &thrifty);
        let low = project(&model, &spendy);
        assert!(high.score > low.score + 20);
    }

    #[test]
    fn visualization_keeps_the_fixed_category_order() {
        let model = trainer::train(&dataset::seed_summaries()).unwrap();
        let projection = project(&model, &sample_profile());
        let categories: Vec<&str> = projection
            .visualization
            .iter()
            .map(|point| point.category.as_str())
            .collect();
        assert_eq!(categories, CHART_CATEGORIES);
    }
}
