use credit_ai::config::AppConfig;
use credit_ai::credit::{
    CreditEvaluationService, DecisionPolicy, EvaluationEngine, InMemoryApplicationRepository,
    ModelStatus, Scorer,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type CreditService = CreditEvaluationService<InMemoryApplicationRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) model: ModelStatus,
}

/// Engine wired from configuration: configured or baseline artifact plus thresholds.
pub(crate) fn evaluation_engine(config: &AppConfig) -> EvaluationEngine {
    let scorer = Scorer::from_config(&config.scoring);
    EvaluationEngine::new(scorer, DecisionPolicy::from(&config.scoring))
}

pub(crate) fn credit_service(config: &AppConfig) -> Arc<CreditService> {
    Arc::new(CreditEvaluationService::new(
        Arc::new(InMemoryApplicationRepository::default()),
        evaluation_engine(config),
    ))
}
