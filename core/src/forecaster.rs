//! Forecaster: per-metric linear trends over (month, year), extrapolated
//! month by month past the latest historical record.
//!
//! Each of the four budget metrics gets its own independent regression.
//! Models are fitted per request from the freshly fetched history.

use crate::{
    error::{EngineError, EngineResult},
    finance::BudgetPeriod,
    regression::LinearRegression,
    types::round_to,
};
use chrono::Datelike;
use ndarray::{array, Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMetric {
    TotalIncomeBrut,
    TotalIncomeNet,
    TotalExpenses,
    NetBalance,
}

impl BudgetMetric {
    pub const ALL: [BudgetMetric; 4] = [
        Self::TotalIncomeBrut,
        Self::TotalIncomeNet,
        Self::TotalExpenses,
        Self::NetBalance,
    ];

    pub fn value(&self, period: &BudgetPeriod) -> f64 {
        match self {
            Self::TotalIncomeBrut => period.total_income_brut,
            Self::TotalIncomeNet => period.total_income_net,
            Self::TotalExpenses => period.total_expenses,
            Self::NetBalance => period.net_balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// "YYYY-MM"
    pub month: String,
    pub total_income_brut: f64,
    pub total_income_net: f64,
    pub total_expenses: f64,
    pub net_balance: f64,
}

/// A calendar month, with year rollover at month 13.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(period: &BudgetPeriod) -> Self {
        Self {
            year: period.month_date.year(),
            month: period.month_date.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month >= 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    fn features(&self) -> Array1<f64> {
        array![self.month as f64, self.year as f64]
    }
}

/// The four fitted trend models.
pub struct BudgetModels {
    models: Vec<(BudgetMetric, LinearRegression)>,
    latest: YearMonth,
}

impl BudgetModels {
    pub fn fit(history: &[BudgetPeriod]) -> EngineResult<Self> {
        let latest = history
            .iter()
            .map(YearMonth::of)
            .max()
            .ok_or_else(|| EngineError::computation("no historical budget data to forecast from"))?;

        let months: Vec<YearMonth> = history.iter().map(YearMonth::of).collect();
        let x = Array2::from_shape_fn((months.len(), 2), |(i, j)| months[i].features()[j]);
        let models = BudgetMetric::ALL
            .iter()
            .map(|metric| {
                let y: Array1<f64> = history.iter().map(|p| metric.value(p)).collect();
                LinearRegression::fit(&x, &y).map(|model| (*metric, model))
            })
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(Self { models, latest })
    }

    pub fn latest(&self) -> YearMonth {
        self.latest
    }

    pub fn predict(&self, at: YearMonth, metric: BudgetMetric) -> f64 {
        self.models
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, model)| round_to(model.predict_one(at.features().view()), 2))
            .unwrap_or(0.0)
    }

    /// `months` consecutive points starting the month after the latest record.
    pub fn forecast(&self, months: u32) -> Vec<ForecastPoint> {
        let mut cursor = self.latest;
        (0..months)
            .map(|_| {
                cursor = cursor.next();
                ForecastPoint {
                    month: cursor.label(),
                    total_income_brut: self.predict(cursor, BudgetMetric::TotalIncomeBrut),
                    total_income_net: self.predict(cursor, BudgetMetric::TotalIncomeNet),
                    total_expenses: self.predict(cursor, BudgetMetric::TotalExpenses),
                    net_balance: self.predict(cursor, BudgetMetric::NetBalance),
                }
            })
            .collect()
    }
}

/// Fit on `history` and extrapolate `months` points in chronological order.
pub fn forecast(history: &[BudgetPeriod], months: u32) -> EngineResult<Vec<ForecastPoint>> {
    let models = BudgetModels::fit(history)?;
    let points = models.forecast(months);
    log::debug!(
        "Forecast {} months from {} historical rows (latest {})",
        points.len(),
        history.len(),
        models.latest().label()
    );
    Ok(points)
}
