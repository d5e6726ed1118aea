//! Seasonal ARIMA models and their parameter types

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod optimizer;
pub mod sarima;

pub use optimizer::OptimizationMethod;
pub use sarima::{EstimationOptions, FittedSarima, Sarima, SarimaCoefficients};

/// Non-seasonal order (p, d, q)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Order {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl Order {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.p, self.d, self.q)
    }
}

/// Seasonal order (P, D, Q, s)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub period: usize,
}

impl SeasonalOrder {
    pub const fn new(p: usize, d: usize, q: usize, period: usize) -> Self {
        Self { p, d, q, period }
    }

    /// No seasonal component
    pub const fn none() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

impl fmt::Display for SeasonalOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.p, self.d, self.q, self.period)
    }
}

/// One point of the search space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterCandidate {
    pub order: Order,
    pub seasonal: SeasonalOrder,
    pub method: OptimizationMethod,
}

impl ParameterCandidate {
    pub const fn new(order: Order, seasonal: SeasonalOrder, method: OptimizationMethod) -> Self {
        Self {
            order,
            seasonal,
            method,
        }
    }

    /// Total lag consumed by differencing
    pub fn differencing_lag(&self) -> usize {
        self.order.d + self.seasonal.period * self.seasonal.d
    }

    /// Whether a mean term is estimated (only for undifferenced models)
    pub fn includes_mean(&self) -> bool {
        self.order.d + self.seasonal.d == 0
    }
}

impl fmt::Display for ParameterCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}, {}", self.method, self.order, self.seasonal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_display() {
        let candidate = ParameterCandidate::new(
            Order::new(1, 1, 0),
            SeasonalOrder::new(0, 1, 1, 12),
            OptimizationMethod::Lbfgs,
        );
        assert_eq!(candidate.to_string(), "lbfgs: (1, 1, 0), (0, 1, 1, 12)");
        assert_eq!(candidate.differencing_lag(), 13);
        assert!(!candidate.includes_mean());
    }
}
