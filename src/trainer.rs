use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Context;

use crate::dataset;
use crate::error::PipelineError;
use crate::forest::{ScoreModel, FEATURE_COUNT};
use crate::models::FinancialSummary;

pub const DEFAULT_DATASET_PATH: &str = "model/budgetwise_finance_dataset.csv";
pub const DEFAULT_MODEL_PATH: &str = "model/financial_model.json";

/// Fits the score model over the aggregated summaries. An empty dataset is a
/// normal condition and yields no model, never an error.
pub fn train(summaries: &[FinancialSummary]) -> Option<ScoreModel> {
    if summaries.is_empty() {
        log::warn!("no user summaries to train on; no model produced");
        return None;
    }

    let rows: Vec<[f64; FEATURE_COUNT]> =
        summaries.iter().map(|summary| summary.features()).collect();
    let labels: Vec<f64> = summaries
        .iter()
        .map(|summary| summary.financial_score)
        .collect();

    let model = ScoreModel::fit(&rows, &labels)?;
    log::info!(
        "trained on {} unique user profiles (oob score {:.3})",
        summaries.len(),
        model.oob_score()
    );
    Some(model)
}

/// End-to-end training: ledger to fitted model. A missing ledger falls back
/// to the seed profiles only when the caller opted in; otherwise the failure
/// is swallowed into "no model produced".
pub fn train_from_dataset(dataset_path: &Path, allow_seed: bool) -> Option<ScoreModel> {
    let summaries = match dataset::load_ledger(dataset_path) {
        Ok(records) => dataset::aggregate(&records),
        Err(err) => {
            if allow_seed {
                log::warn!("{err}; falling back to the synthetic seed profiles");
                dataset::seed_summaries()
            } else {
                log::warn!("{err}; no model produced");
                return None;
            }
        }
    };
    train(&summaries)
}

pub fn save_model(model: &ScoreModel, path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let blob = serde_json::to_vec(model).context("failed to serialize model")?;
    std::fs::write(path, blob).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_model(path: &Path) -> anyhow::Result<Option<ScoreModel>> {
    if !path.exists() {
        return Ok(None);
    }
    let blob =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let model = serde_json::from_slice(&blob)
        .with_context(|| format!("corrupt model blob at {}", path.display()))?;
    Ok(Some(model))
}

/// Shared handle to the single active model. Readers take an `Arc` snapshot,
/// so a training run that finishes mid-request can never expose a partially
/// constructed model; installation is one pointer swap.
#[derive(Clone, Default)]
pub struct ModelHandle {
    inner: Arc<RwLock<Option<Arc<ScoreModel>>>>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Result<Arc<ScoreModel>, PipelineError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| PipelineError::ModelUnavailable)?;
        guard.as_ref().cloned().ok_or(PipelineError::ModelUnavailable)
    }

    pub fn ready(&self) -> bool {
        self.current().is_ok()
    }

    pub fn install(&self, model: ScoreModel) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(Arc::new(model));
        }
    }

    /// Trains off the request path. Inference against this handle keeps
    /// reporting "model not ready" until the task installs a model; resolves
    /// to whether a model was produced.
    pub fn spawn_training(
        &self,
        dataset_path: PathBuf,
        model_path: PathBuf,
        allow_seed: bool,
    ) -> tokio::task::JoinHandle<bool> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || match train_from_dataset(&dataset_path, allow_seed) {
            Some(model) => {
                if let Err(err) = save_model(&model, &model_path) {
                    log::warn!("trained model could not be persisted: {err:#}");
                }
                handle.install(model);
                true
            }
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn empty_summaries_yield_no_model() {
        assert!(train(&[]).is_none());
    }

    #[test]
    fn missing_dataset_yields_no_model() {
        assert!(train_from_dataset(Path::new("no/such/ledger.csv"), false).is_none());
    }

    #[test]
    fn empty_ledger_yields_no_model() {
        let path = std::env::temp_dir().join(format!("finwell-ledger-{}.csv", Uuid::new_v4()));
        std::fs::write(&path, "user_id,category,transaction_type,amount\n").unwrap();

        let model = train_from_dataset(&path, false);
        std::fs::remove_file(&path).ok();
        assert!(model.is_none());
    }

    #[test]
    fn missing_dataset_with_seed_fallback_trains() {
        let model = train_from_dataset(Path::new("no/such/ledger.csv"), true).unwrap();
        assert_eq!(model.trained_on(), 6);
    }

    #[test]
    fn seed_training_is_reproducible() {
        let first = train(&dataset::seed_summaries()).unwrap();
        let second = train(&dataset::seed_summaries()).unwrap();
        let probe = [50.0, 20.0, 80.0, 90.0, 60.0];
        assert_eq!(first.predict(&probe), second.predict(&probe));
    }

    #[test]
    fn model_persists_and_reloads() {
        let model = train(&dataset::seed_summaries()).unwrap();
        let path = std::env::temp_dir().join(format!("finwell-model-{}.json", Uuid::new_v4()));

        save_model(&model, &path).unwrap();
        let restored = load_model(&path).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        let probe = [30.0, 10.0, 60.0, 50.0, 40.0];
        assert_eq!(model.predict(&probe), restored.predict(&probe));
        assert_eq!(model.oob_score(), restored.oob_score());
    }

    #[test]
    fn absent_model_file_loads_as_none() {
        let path = std::env::temp_dir().join(format!("finwell-missing-{}.json", Uuid::new_v4()));
        assert!(load_model(&path).unwrap().is_none());
    }

    #[test]
    fn handle_is_not_ready_until_a_model_is_installed() {
        let handle = ModelHandle::new();
        assert!(matches!(
            handle.current(),
            Err(PipelineError::ModelUnavailable)
        ));

        let model = train(&dataset::seed_summaries()).unwrap();
        handle.install(model);
        assert!(handle.ready());
    }

    #[tokio::test]
    async fn background_training_without_dataset_leaves_handle_empty() {
        let handle = ModelHandle::new();
        let produced = handle
            .spawn_training(
                PathBuf::from("no/such/ledger.csv"),
                std::env::temp_dir().join(format!("finwell-model-{}.json", Uuid::new_v4())),
                false,
            )
            .await
            .unwrap();

        assert!(!produced);
        assert!(matches!(
            handle.current(),
            Err(PipelineError::ModelUnavailable)
        ));
    }

    #[tokio::test]
    async fn background_training_installs_atomically() {
        let handle = ModelHandle::new();
        let model_path = std::env::temp_dir().join(format!("finwell-model-{}.json", Uuid::new_v4()));
        let produced = handle
            .spawn_training(PathBuf::from("no/such/ledger.csv"), model_path.clone(), true)
            .await
            .unwrap();
        std::fs::remove_file(&model_path).ok();

        assert!(produced);
        let model = handle.current().unwrap();
        assert_eq!(model.trained_on(), 6);
    }
}
