//! The analytics engine: one stateless pipeline per request.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   Classification:
//!     1. Loader      (read both ledger tables)
//!     2. Aggregator  (join, group, derive ratios)
//!     3. Segmenter   (standardise, cluster, reorder segment ids)
//!     4. Classifier  (threshold label, forest, predict full population)
//!   Forecast:
//!     1. Finance fetch (caller credential forwarded)
//!     2. Forecaster    (per-metric trend fit, extrapolate)
//!
//! RULES:
//!   - Scalers, cluster models, forests and regressions live for one call.
//!   - A fresh RngBank is built from the configured seed on every call.
//!   - Nothing is cached between calls, so concurrent calls share no state.

use crate::{
    aggregator::{aggregate, PartyAggregate},
    classifier::{ClassificationReport, Classifier},
    config::EngineConfig,
    error::{EngineError, EngineResult},
    finance::FinanceSource,
    forecaster::{self, ForecastPoint},
    loader::{Ledger, Loader},
    rng::{RngBank, StageSlot},
    segmenter::{SegmentSummary, Segmenter},
    types::PartyScope,
};

/// Everything one classification call produced.
#[derive(Debug, Clone)]
pub struct ClassificationRun {
    pub scope: PartyScope,
    pub parties: Vec<PartyAggregate>,
    pub segments: Vec<SegmentSummary>,
    pub report: ClassificationReport,
}

pub struct AnalyticsEngine {
    config: EngineConfig,
}

impl AnalyticsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load the current snapshot and run the classification pipeline on it.
    pub fn classify(&self, scope: PartyScope) -> EngineResult<ClassificationRun> {
        let ledger = Loader::new(self.config.data_source.clone()).load()?;
        self.classify_ledger(&ledger, scope)
    }

    /// Aggregate, segment and classify an already-loaded ledger.
    pub fn classify_ledger(&self, ledger: &Ledger, scope: PartyScope) -> EngineResult<ClassificationRun> {
        let mut parties = aggregate(ledger, scope);
        if parties.is_empty() {
            return Err(EngineError::computation(format!(
                "no transactions carry a {}",
                scope.key_name()
            )));
        }

        let rng_bank = RngBank::new(self.config.seed);
        let segments = Segmenter::new(&self.config)
            .segment(&mut parties, &mut rng_bank.for_stage(StageSlot::Segmenter))?;
        let report = Classifier::new(&self.config).classify(
            &mut parties,
            &mut rng_bank.for_stage(StageSlot::Split),
            &mut rng_bank.for_stage(StageSlot::Forest),
        )?;

        log::info!(
            "Classified {} {} parties into {} segments",
            parties.len(),
            scope.key_name(),
            segments.len()
        );
        Ok(ClassificationRun {
            scope,
            parties,
            segments,
            report,
        })
    }

    /// Fetch the budget history with the caller's credential and forecast
    /// `months` points. Any upstream failure fails the whole call.
    pub fn forecast_budget(
        &self,
        source: &dyn FinanceSource,
        authorization: &str,
        months: u32,
    ) -> EngineResult<Vec<ForecastPoint>> {
        let history = source.fetch_budget_history(authorization)?;
        let points = forecaster::forecast(&history, months)?;
        log::info!(
            "Forecast {} months from {} budget periods",
            points.len(),
            history.len()
        );
        Ok(points)
    }
}
