use crate::forest::{ScoreModel, FEATURE_COUNT};
use crate::models::{FinancialReport, ReportMetric, UserProfile};
use crate::projection;

pub const REPORT_FEATURES: [&str; FEATURE_COUNT] = [
    "Savings Rate",
    "Investment Velocity",
    "Spending Control",
    "Debt Management",
    "Stability Buffer",
];

pub const SCORE_TARGET_DELTA: f64 = 10.0;
pub const MAX_SIMULATION_STEPS: u32 = 50;

/// Ranks bottlenecks by importance × improvement headroom, then simulates
/// improving the worst one until the predicted score lifts by the target
/// delta or the step cap is hit.
pub fn analyze(model: &ScoreModel, profile: &UserProfile) -> FinancialReport {
    let values = projection::display_values(profile);
    let importances = model.importances();

    let mut metrics: Vec<ReportMetric> = REPORT_FEATURES
        .iter()
        .enumerate()
        .map(|(i, feature)| ReportMetric {
            feature: (*feature).to_string(),
            impact: importances[i] * (100.0 - values[i]),
            value: values[i],
        })
        .collect();
    metrics.sort_by(|a, b| {
        b.impact
            .partial_cmp(&a.impact)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let primary_issue = metrics[0].feature.clone();
    let primary_index = REPORT_FEATURES
        .iter()
        .position(|feature| *feature == primary_issue)
        .unwrap_or(0);

    let enhancement_rate = simulate_enhancement(model, profile, primary_index);

    FinancialReport {
        recommendation: format!(
            "The analysis identified {primary_issue} as your primary growth constraint. \
             Improving this by {enhancement_rate}% would statistically shift your \
             efficiency score into a higher tier."
        ),
        primary_issue,
        accuracy: projection::round1(model.oob_score().max(0.0) * 100.0),
        all_metrics: metrics,
    }
}

/// Perturbs one feature by 1% of salary per step, re-predicting each time.
/// The step cap is a hard bound: an insensitive feature exhausts all 50
/// steps rather than looping.
pub fn simulate_enhancement(model: &ScoreModel, profile: &UserProfile, feature_index: usize) -> u32 {
    let salary = profile.salary.max(1.0);
    let step = salary / 100.0;

    let mut features = projection::feature_vector(profile);
    let current = model.predict(&features);
    let target = current + SCORE_TARGET_DELTA;

    let mut simulated = current;
    let mut steps = 0u32;
    while simulated < target && steps < MAX_SIMULATION_STEPS {
        steps += 1;
        features[feature_index] += step;
        simulated = model.predict(&features);
    }
    steps
}
