//! The fund aggregate: holdings, algo configs, and profit/cash-flow accumulators.
//!
//! Trade operations take `&self`. Holdings live in a [`DashMap`], so callers sharing a
//! fund can trade different instrument codes concurrently; each buy or sell is applied
//! under that code's entry lock. Accumulators sit behind a single mutex; when both are
//! needed the holding entry is always locked first.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::algo_config::AlgoConfig;
use super::error::{FundbookError, Result};
use super::holding::{FundHolding, StoredHolding};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FundId(String);

impl FundId {
    pub fn new(id: impl Into<String>) -> Self {
        FundId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FundType {
    #[default]
    Manual,
    Algo,
}

impl FundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundType::Manual => "MANUAL",
            FundType::Algo => "ALGO",
        }
    }
}

impl fmt::Display for FundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FundType {
    type Err = FundbookError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MANUAL" => Ok(FundType::Manual),
            "ALGO" => Ok(FundType::Algo),
            _ => Err(FundbookError::UnknownFundType {
                value: s.to_string(),
                fund: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashFlowDirection {
    In,
    Out,
}

/// Scalar accumulators of a fund.
#[derive(Debug, Clone, PartialEq)]
pub struct FundTotals {
    pub date: DateTime<Utc>,
    pub profit: Decimal,
    pub net_profit: Decimal,
    pub cashout_amount: Decimal,
    pub cashin_amount: Decimal,
}

impl FundTotals {
    pub fn zeroed(date: DateTime<Utc>) -> Self {
        FundTotals {
            date,
            profit: Decimal::ZERO,
            net_profit: Decimal::ZERO,
            cashout_amount: Decimal::ZERO,
            cashin_amount: Decimal::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct Fund {
    id: Option<FundId>,
    user_id: String,
    name: String,
    fund_type: FundType,
    totals: Mutex<FundTotals>,
    holdings: DashMap<String, FundHolding>,
    algo_configs: DashMap<String, AlgoConfig>,
}

impl Fund {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, fund_type: FundType) -> Self {
        Self::restore(
            None,
            user_id,
            name,
            fund_type,
            FundTotals::zeroed(Utc::now()),
            Vec::new(),
            Vec::new(),
        )
    }

    /// Reassemble a fund from previously persisted parts.
    pub fn restore(
        id: Option<FundId>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        fund_type: FundType,
        totals: FundTotals,
        holdings: impl IntoIterator<Item = (String, FundHolding)>,
        algo_configs: impl IntoIterator<Item = (String, AlgoConfig)>,
    ) -> Self {
        Fund {
            id,
            user_id: user_id.into(),
            name: name.into(),
            fund_type,
            totals: Mutex::new(totals),
            holdings: holdings.into_iter().collect(),
            algo_configs: algo_configs.into_iter().collect(),
        }
    }

    pub fn id(&self) -> Option<&FundId> {
        self.id.as_ref()
    }

    /// Set the id handed out by the store on first save. A fund keeps its id for life.
    pub(crate) fn assign_id(&mut self, id: FundId) {
        if self.id.is_none() {
            self.id = Some(id);
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fund_type(&self) -> FundType {
        self.fund_type
    }

    pub fn totals(&self) -> FundTotals {
        self.lock_totals().clone()
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.lock_totals().date
    }

    pub fn profit(&self) -> Decimal {
        self.lock_totals().profit
    }

    pub fn net_profit(&self) -> Decimal {
        self.lock_totals().net_profit
    }

    pub fn cashin_amount(&self) -> Decimal {
        self.lock_totals().cashin_amount
    }

    pub fn cashout_amount(&self) -> Decimal {
        self.lock_totals().cashout_amount
    }

    pub fn buy_stock(&self, code: &str, quantity: i64, cost: Decimal) -> Result<()> {
        self.buy_stock_at(code, quantity, cost, Utc::now())
    }

    pub fn buy_stock_at(
        &self,
        code: &str,
        quantity: i64,
        cost: Decimal,
        at: DateTime<Utc>,
    ) -> Result<()> {
        match self.holdings.entry(code.to_string()) {
            Entry::Occupied(mut entry) => entry.get_mut().apply_buy(quantity, cost, at)?,
            Entry::Vacant(entry) => {
                let mut holding = FundHolding::new(code, at);
                holding.apply_buy(quantity, cost, at)?;
                entry.insert(holding);
            }
        }
        self.lock_totals().date = at;
        debug!(fund = %self.label(), code, quantity, %cost, "buy applied");
        Ok(())
    }

    /// Sell from an existing holding and return the realized gain.
    ///
    /// The gain is added to `profit`. When `fee` is given, `gain - fee` is also added to
    /// `net_profit`. A holding sold down to zero stays in the fund with zero gross.
    pub fn sell_stock(
        &self,
        code: &str,
        quantity: i64,
        proceeds: Decimal,
        fee: Option<Decimal>,
    ) -> Result<Decimal> {
        self.sell_stock_at(code, quantity, proceeds, fee, Utc::now())
    }

    pub fn sell_stock_at(
        &self,
        code: &str,
        quantity: i64,
        proceeds: Decimal,
        fee: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> Result<Decimal> {
        let mut holding = self
            .holdings
            .get_mut(code)
            .ok_or_else(|| self.unknown_holding(code))?;
        let mut updated = holding.clone();
        let realized = updated.apply_sell(quantity, proceeds, at)?;

        // Totals are checked before the holding is committed. Lock order: entry, then totals.
        let mut totals = self.lock_totals();
        let overflow = |what: &str| FundbookError::InvalidTrade {
            code: code.to_string(),
            reason: format!("{what} overflow"),
        };
        let profit = totals
            .profit
            .checked_add(realized)
            .ok_or_else(|| overflow("profit"))?;
        let net_profit = match fee {
            Some(fee) => realized
                .checked_sub(fee)
                .and_then(|net| totals.net_profit.checked_add(net))
                .ok_or_else(|| overflow("net profit"))?,
            None => totals.net_profit,
        };

        *holding = updated;
        totals.profit = profit;
        totals.net_profit = net_profit;
        totals.date = at;
        drop(totals);
        drop(holding);

        debug!(fund = %self.label(), code, quantity, %proceeds, %realized, "sell applied");
        Ok(realized)
    }

    pub fn record_cash_flow(&self, amount: Decimal, direction: CashFlowDirection) -> Result<()> {
        self.record_cash_flow_at(amount, direction, Utc::now())
    }

    pub fn record_cash_flow_at(
        &self,
        amount: Decimal,
        direction: CashFlowDirection,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if amount < Decimal::ZERO {
            return Err(FundbookError::InvalidCashFlow {
                amount,
                reason: "must not be negative".into(),
            });
        }
        let mut totals = self.lock_totals();
        let total = match direction {
            CashFlowDirection::In => &mut totals.cashin_amount,
            CashFlowDirection::Out => &mut totals.cashout_amount,
        };
        *total = total
            .checked_add(amount)
            .ok_or_else(|| FundbookError::InvalidCashFlow {
                amount,
                reason: "accumulated total would overflow".into(),
            })?;
        totals.date = at;
        Ok(())
    }

    pub fn set_algo_config(&self, code: &str, config: AlgoConfig) -> Option<AlgoConfig> {
        self.set_algo_config_at(code, config, Utc::now())
    }

    pub fn set_algo_config_at(
        &self,
        code: &str,
        config: AlgoConfig,
        at: DateTime<Utc>,
    ) -> Option<AlgoConfig> {
        let previous = self.algo_configs.insert(code.to_string(), config);
        self.lock_totals().date = at;
        previous
    }

    pub fn remove_algo_config(&self, code: &str) -> Option<AlgoConfig> {
        self.remove_algo_config_at(code, Utc::now())
    }

    /// Remove a config. `date` moves only when something was removed.
    pub fn remove_algo_config_at(&self, code: &str, at: DateTime<Utc>) -> Option<AlgoConfig> {
        let removed = self.algo_configs.remove(code).map(|(_, config)| config);
        if removed.is_some() {
            self.lock_totals().date = at;
        }
        removed
    }

    pub fn algo_config(&self, code: &str) -> Option<AlgoConfig> {
        self.algo_configs.get(code).map(|c| c.value().clone())
    }

    pub fn algo_configs(&self) -> BTreeMap<String, AlgoConfig> {
        self.algo_configs
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn mark_spot_price(&self, code: &str, price: Decimal) -> Result<()> {
        let mut holding = self
            .holdings
            .get_mut(code)
            .ok_or_else(|| self.unknown_holding(code))?;
        holding.mark_spot_price(price);
        Ok(())
    }

    pub fn holding(&self, code: &str) -> Option<FundHolding> {
        self.holdings.get(code).map(|h| h.value().clone())
    }

    pub fn has_holding(&self, code: &str) -> bool {
        self.holdings.contains_key(code)
    }

    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }

    /// Live holdings, spot prices included.
    pub fn holdings(&self) -> BTreeMap<String, FundHolding> {
        self.holdings
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Persistable view of every holding.
    pub fn stored_holdings(&self) -> BTreeMap<String, StoredHolding> {
        self.holdings
            .iter()
            .map(|e| (e.key().clone(), e.value().to_stored()))
            .collect()
    }

    /// Total cost basis across holdings.
    pub fn gross_value(&self) -> Result<Decimal> {
        self.holdings.iter().try_fold(Decimal::ZERO, |total, h| {
            total
                .checked_add(h.gross())
                .ok_or_else(|| self.valuation_overflow(h.code()))
        })
    }

    /// Market value of every non-empty holding. Fails if any of them lacks a spot price.
    pub fn market_value(&self) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for holding in self.holdings.iter().filter(|h| h.quantity() > 0) {
            total = total
                .checked_add(holding.market_value()?)
                .ok_or_else(|| self.valuation_overflow(holding.code()))?;
        }
        Ok(total)
    }

    pub fn unrealized_profit(&self) -> Result<Decimal> {
        let market = self.market_value()?;
        let gross = self.gross_value()?;
        market
            .checked_sub(gross)
            .ok_or_else(|| FundbookError::InvalidTrade {
                code: self.label(),
                reason: "unrealized profit overflow".into(),
            })
    }

    fn lock_totals(&self) -> MutexGuard<'_, FundTotals> {
        self.totals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn label(&self) -> String {
        match &self.id {
            Some(id) => id.to_string(),
            None => format!("'{}' (unsaved)", self.name),
        }
    }

    fn valuation_overflow(&self, code: &str) -> FundbookError {
        FundbookError::InvalidTrade {
            code: code.to_string(),
            reason: format!("valuation of {} overflowed", self.label()),
        }
    }

    fn unknown_holding(&self, code: &str) -> FundbookError {
        FundbookError::UnknownHolding {
            fund: self.label(),
            code: code.to_string(),
        }
    }
}

impl Clone for Fund {
    fn clone(&self) -> Self {
        Fund {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            fund_type: self.fund_type,
            totals: Mutex::new(self.totals()),
            holdings: self.holdings.clone(),
            algo_configs: self.algo_configs.clone(),
        }
    }
}

impl PartialEq for Fund {
    fn eq(&self, other: &Self) -> bool {
        let ours = self.totals();
        let theirs = other.totals();
        self.id == other.id
            && self.user_id == other.user_id
            && self.name == other.name
            && self.fund_type == other.fund_type
            && ours == theirs
            && self.holdings() == other.holdings()
            && self.algo_configs() == other.algo_configs()
    }
}
