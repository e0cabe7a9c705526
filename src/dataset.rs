use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::PipelineError;
use crate::models::{FinancialSummary, TransactionRecord};

pub fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    // Dataset amounts are free-text; anything unparseable counts as zero.
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| value.trim().parse::<f64>().ok())
        .unwrap_or(0.0))
}

pub fn load_ledger(path: &Path) -> Result<Vec<TransactionRecord>, PipelineError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|err| PipelineError::DatasetUnavailable(format!("{}: {err}", path.display())))?;

    let mut records = Vec::new();
    for row in reader.deserialize::<TransactionRecord>() {
        match row {
            Ok(record) => records.push(record),
            Err(err) => log::warn!("skipping malformed ledger row: {err}"),
        }
    }
    Ok(records)
}

pub fn aggregate(records: &[TransactionRecord]) -> Vec<FinancialSummary> {
    let mut groups: HashMap<String, FinancialSummary> = HashMap::new();

    for record in records {
        let entry = groups
            .entry(record.dataset_user_id.clone())
            .or_insert_with(|| FinancialSummary {
                dataset_user_id: record.dataset_user_id.clone(),
                income: 0.0,
                expenses: 0.0,
                savings: 0.0,
                debt: 0.0,
                investment: 0.0,
                financial_score: 0.0,
            });

        let transaction_type = record.transaction_type.to_lowercase();
        let category = record.category.to_lowercase();

        if transaction_type.contains("income") {
            entry.income += record.amount;
        }
        if transaction_type.contains("expense") {
            entry.expenses += record.amount;
        }
        if category.contains("savings") || category.contains("emergency") {
            entry.savings += record.amount;
        }
        if category.contains("loan")
            || category.contains("emi")
            || category.contains("credit card")
            || category.contains("debt")
        {
            entry.debt += record.amount;
        }
        if category.contains("investment") || category.contains("stocks") || category.contains("equity")
        {
            entry.investment += record.amount;
        }
    }

    let mut summaries: Vec<FinancialSummary> = groups.into_values().collect();
    for summary in summaries.iter_mut() {
        summary.financial_score = financial_score(summary);
    }
    summaries.sort_by(|a, b| a.dataset_user_id.cmp(&b.dataset_user_id));
    summaries
}

/// (Savings + Investment − 0.5·Debt) / Income, as a 0–100 health score.
/// The unit floor applies to the denominator only.
pub fn financial_score(summary: &FinancialSummary) -> f64 {
    let income = summary.income.max(1.0);
    let raw = (summary.savings + summary.investment - 0.5 * summary.debt) / income * 100.0;
    raw.clamp(0.0, 100.0)
}

/// Synthetic calibration profiles spanning the score range. Only used when
/// no ledger exists and the caller explicitly opted into the fallback.
pub fn seed_summaries() -> Vec<FinancialSummary> {
    const ROWS: [([f64; 5], f64); 6] = [
        ([80.0, 40.0, 90.0, 95.0, 100.0], 98.0),
        ([10.0, 5.0, 20.0, 10.0, 10.0], 20.0),
        ([30.0, 10.0, 60.0, 50.0, 40.0], 55.0),
        ([50.0, 20.0, 80.0, 90.0, 60.0], 82.0),
        ([5.0, 0.0, 10.0, 5.0, 0.0], 5.0),
        ([100.0, 50.0, 100.0, 100.0, 100.0], 100.0),
    ];

    ROWS.iter()
        .enumerate()
        .map(|(i, (features, score))| FinancialSummary {
            dataset_user_id: format!("seed-{:03}", i + 1),
            savings: features[0],
            investment: features[1],
            expenses: features[2],
            debt: features[3],
            income: features[4],
            financial_score: *score,
        })
        .collect()
}
