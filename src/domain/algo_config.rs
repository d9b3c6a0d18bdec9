//! Per-instrument trading parameters attached to an algo-managed fund.

#[derive(Debug, Clone, PartialEq)]
pub struct AlgoConfig {
    code: String,
    quantity: i64,
    base_price: f64,
    std_dev_range: i32,
    std_dev_multiplier: f64,
    gross_amount: f64,
}

impl AlgoConfig {
    pub fn new(
        code: impl Into<String>,
        quantity: i64,
        base_price: f64,
        std_dev_range: i32,
        std_dev_multiplier: f64,
        gross_amount: f64,
    ) -> Self {
        AlgoConfig {
            code: code.into(),
            quantity,
            base_price,
            std_dev_range,
            std_dev_multiplier,
            gross_amount,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Lot size traded per signal.
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Number of bars in the standard deviation window.
    pub fn std_dev_range(&self) -> i32 {
        self.std_dev_range
    }

    pub fn std_dev_multiplier(&self) -> f64 {
        self.std_dev_multiplier
    }

    pub fn gross_amount(&self) -> f64 {
        self.gross_amount
    }
}
