//! Feature matrix construction and standardisation.
//!
//! RULE: A scaler is fitted on one request's population and dropped with it.
//! Standardised values are only comparable within that population.

use crate::{
    aggregator::PartyAggregate,
    error::{EngineError, EngineResult},
};
use ndarray::{Array1, Array2, Axis};

/// Feature matrix, one row per party.
pub type Matrix = Array2<f64>;

pub fn feature_matrix(parties: &[PartyAggregate]) -> Matrix {
    let rows: Vec<[f64; 4]> = parties.iter().map(PartyAggregate::features).collect();
    Array2::from_shape_fn((rows.len(), 4), |(i, j)| rows[i][j])
}

/// Zero mean / unit variance per column, population statistics (ddof = 0).
#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub means: Array1<f64>,
    pub scales: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &Matrix) -> EngineResult<Self> {
        let means = rows
            .mean_axis(Axis(0))
            .filter(|_| rows.ncols() > 0)
            .ok_or_else(|| EngineError::computation("cannot standardise an empty population"))?;
        // Constant columns are only centred.
        let scales = rows
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std > f64::EPSILON { std } else { 1.0 });
        Ok(Self { means, scales })
    }

    pub fn transform(&self, rows: &Matrix) -> Matrix {
        (rows - &self.means) / &self.scales
    }

    pub fn fit_transform(rows: &Matrix) -> EngineResult<(Self, Matrix)> {
        let scaler = Self::fit(rows)?;
        let scaled = scaler.transform(rows);
        Ok((scaler, scaled))
    }
}
