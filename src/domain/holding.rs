//! Per-instrument holdings.
//!
//! [`StoredHolding`] carries only what is persisted. [`FundHolding`] wraps it with the
//! transient spot price, which has no stored counterpart and so cannot be written by
//! accident.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::{FundbookError, Result};

/// Persisted state of a holding.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHolding {
    pub code: String,
    pub quantity: i64,
    /// Total cost basis of the current quantity.
    pub gross: Decimal,
    pub date: DateTime<Utc>,
    /// Epoch millis of the most recent trade; `None` until the first trade.
    pub latest_trade_time: Option<i64>,
}

/// A live holding: stored state plus the last observed market price.
#[derive(Debug, Clone, PartialEq)]
pub struct FundHolding {
    stored: StoredHolding,
    spot_price: Option<Decimal>,
}

impl FundHolding {
    pub fn new(code: impl Into<String>, date: DateTime<Utc>) -> Self {
        FundHolding {
            stored: StoredHolding {
                code: code.into(),
                quantity: 0,
                gross: Decimal::ZERO,
                date,
                latest_trade_time: None,
            },
            spot_price: None,
        }
    }

    /// Rebuild a live holding from storage. The spot price starts unset.
    pub fn from_stored(stored: StoredHolding) -> Self {
        FundHolding {
            stored,
            spot_price: None,
        }
    }

    pub fn to_stored(&self) -> StoredHolding {
        self.stored.clone()
    }

    pub fn stored(&self) -> &StoredHolding {
        &self.stored
    }

    pub fn code(&self) -> &str {
        &self.stored.code
    }

    pub fn quantity(&self) -> i64 {
        self.stored.quantity
    }

    pub fn gross(&self) -> Decimal {
        self.stored.gross
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.stored.date
    }

    pub fn latest_trade_time(&self) -> Option<i64> {
        self.stored.latest_trade_time
    }

    /// Average cost per unit, or `None` for an empty holding.
    pub fn price(&self) -> Option<Decimal> {
        if self.stored.quantity > 0 {
            Some(self.stored.gross / Decimal::from(self.stored.quantity))
        } else {
            None
        }
    }

    pub fn apply_buy(&mut self, quantity: i64, cost: Decimal, at: DateTime<Utc>) -> Result<()> {
        if quantity <= 0 {
            return Err(self.invalid_trade(format!("buy quantity must be positive, got {quantity}")));
        }
        if cost < Decimal::ZERO {
            return Err(self.invalid_trade(format!("buy cost must not be negative, got {cost}")));
        }
        let new_quantity = self
            .stored
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| self.invalid_trade("quantity overflow".to_string()))?;

        let new_gross = self
            .stored
            .gross
            .checked_add(cost)
            .ok_or_else(|| self.invalid_trade("gross cost overflow".to_string()))?;

        self.stored.quantity = new_quantity;
        self.stored.gross = new_gross;
        self.touch(at);
        Ok(())
    }

    /// Remove `quantity` units at the pre-sell average cost and return the realized gain.
    pub fn apply_sell(
        &mut self,
        quantity: i64,
        proceeds: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Decimal> {
        if quantity <= 0 {
            return Err(self.invalid_trade(format!("sell quantity must be positive, got {quantity}")));
        }
        if proceeds < Decimal::ZERO {
            return Err(self.invalid_trade(format!(
                "sell proceeds must not be negative, got {proceeds}"
            )));
        }
        let held = self.stored.quantity;
        if quantity > held {
            return Err(FundbookError::InsufficientQuantity {
                code: self.stored.code.clone(),
                held,
                requested: quantity,
            });
        }

        // gross * q / held == average * q, without rounding the average first
        let removed_cost = if quantity == held {
            self.stored.gross
        } else {
            self.stored
                .gross
                .checked_mul(Decimal::from(quantity))
                .and_then(|cost| cost.checked_div(Decimal::from(held)))
                .ok_or_else(|| self.invalid_trade("cost basis overflow".to_string()))?
        };
        let realized = proceeds
            .checked_sub(removed_cost)
            .ok_or_else(|| self.invalid_trade("realized gain overflow".to_string()))?;

        self.stored.quantity = held - quantity;
        self.stored.gross -= removed_cost;
        self.touch(at);
        Ok(realized)
    }

    pub fn mark_spot_price(&mut self, price: Decimal) {
        self.spot_price = Some(price);
    }

    pub fn spot_price(&self) -> Result<Decimal> {
        self.spot_price.ok_or_else(|| FundbookError::SpotPriceNotSet {
            code: self.stored.code.clone(),
        })
    }

    pub fn has_spot_price(&self) -> bool {
        self.spot_price.is_some()
    }

    pub fn market_value(&self) -> Result<Decimal> {
        self.spot_price()?
            .checked_mul(Decimal::from(self.stored.quantity))
            .ok_or_else(|| self.invalid_trade("market value overflow".to_string()))
    }

    pub fn unrealized_profit(&self) -> Result<Decimal> {
        self.market_value()?
            .checked_sub(self.stored.gross)
            .ok_or_else(|| self.invalid_trade("unrealized profit overflow".to_string()))
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.stored.date = at;
        self.stored.latest_trade_time = Some(at.timestamp_millis());
    }

    fn invalid_trade(&self, reason: String) -> FundbookError {
        FundbookError::InvalidTrade {
            code: self.stored.code.clone(),
            reason,
        }
    }
}
