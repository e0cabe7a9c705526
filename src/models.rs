use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::forest::FEATURE_COUNT;

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "user_id")]
    pub dataset_user_id: String,
    pub category: String,
    pub transaction_type: String,
    #[serde(deserialize_with = "crate::dataset::lenient_amount")]
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinancialSummary {
    pub dataset_user_id: String,
    pub income: f64,
    pub expenses: f64,
    pub savings: f64,
    pub debt: f64,
    pub investment: f64,
    pub financial_score: f64,
}

impl FinancialSummary {
    /// Training feature order. Inference must build its vectors in the same
    /// order or predictions are silently corrupted.
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.savings,
            self.investment,
            self.expenses,
            self.debt,
            self.income,
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub salary: f64,
    pub savings_percentage: f64,
    pub investing_rate: f64,
    pub spending_rate: f64,
    pub debt_load: f64,
    pub stability_buffer: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartPoint {
    pub category: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    pub score: i64,
    pub visualization: Vec<ChartPoint>,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetric {
    pub feature: String,
    pub impact: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialReport {
    pub primary_issue: String,
    pub recommendation: String,
    pub accuracy: f64,
    pub all_metrics: Vec<ReportMetric>,
}

#[derive(Debug, Clone)]
pub struct StoredReport {
    pub id: Uuid,
    pub user_id: String,
    pub primary_issue: String,
    pub recommendation: String,
    pub accuracy: f64,
    pub all_metrics: Vec<ReportMetric>,
    pub created_at: DateTime<Utc>,
}
