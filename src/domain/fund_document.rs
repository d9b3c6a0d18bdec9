//! Mapping between [`Fund`] and its stored [`Document`] form.
//!
//! Stored layout:
//!
//! ```text
//! { _id?, userId, name, date, profit, netProfit, cashoutAmount, cashinAmount, type,
//!   holdings:    { <encoded code>: { code, quantity, gross, date, latestTradeTime? } },
//!   algoConfigs: { <encoded code>: { code, quantity, basePrice, stdDevRange,
//!                                    stdDevMultiplier, grossAmount } } }
//! ```
//!
//! Map keys go through [`key_codec`](super::key_codec). Holdings are written from
//! [`StoredHolding`], which has no spot price field.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use super::algo_config::AlgoConfig;
use super::document::{Document, DocumentId, ID_FIELD, Value};
use super::error::{FundbookError, Result};
use super::fund::{Fund, FundId, FundTotals, FundType};
use super::holding::{FundHolding, StoredHolding};
use super::key_codec::{decode_key, encode_key, is_encodable, is_storage_safe};

pub const USER_ID: &str = "userId";
pub const NAME: &str = "name";
pub const DATE: &str = "date";
pub const PROFIT: &str = "profit";
pub const NET_PROFIT: &str = "netProfit";
pub const CASHOUT_AMOUNT: &str = "cashoutAmount";
pub const CASHIN_AMOUNT: &str = "cashinAmount";
pub const TYPE: &str = "type";
pub const HOLDINGS: &str = "holdings";
pub const ALGO_CONFIGS: &str = "algoConfigs";

const CODE: &str = "code";
const QUANTITY: &str = "quantity";
const GROSS: &str = "gross";
const LATEST_TRADE_TIME: &str = "latestTradeTime";
const BASE_PRICE: &str = "basePrice";
const STD_DEV_RANGE: &str = "stdDevRange";
const STD_DEV_MULTIPLIER: &str = "stdDevMultiplier";
const GROSS_AMOUNT: &str = "grossAmount";

pub fn encode_fund(fund: &Fund) -> Result<Document> {
    encode_fields(fund).map_err(|e| match fund.id() {
        Some(id) => e.in_stored_fund(id.as_str()),
        None => e,
    })
}

fn encode_fields(fund: &Fund) -> Result<Document> {
    let totals = fund.totals();
    let mut doc = Document::new();

    if let Some(id) = fund.id() {
        doc.insert(ID_FIELD, id.as_str());
    }
    doc.insert(USER_ID, fund.user_id());
    doc.insert(NAME, fund.name());
    doc.insert(DATE, totals.date);
    doc.insert(PROFIT, totals.profit);
    doc.insert(NET_PROFIT, totals.net_profit);
    doc.insert(CASHOUT_AMOUNT, totals.cashout_amount);
    doc.insert(CASHIN_AMOUNT, totals.cashin_amount);
    doc.insert(TYPE, fund.fund_type().as_str());

    let mut holdings = Document::new();
    for (code, holding) in fund.stored_holdings() {
        holdings.insert(storage_key(HOLDINGS, &code)?, encode_holding(&holding));
    }
    doc.insert(HOLDINGS, holdings);

    let mut algo_configs = Document::new();
    for (code, config) in fund.algo_configs() {
        let key = storage_key(ALGO_CONFIGS, &code)?;
        let encoded = encode_algo_config(&format!("{ALGO_CONFIGS}.{key}"), &config)?;
        algo_configs.insert(key, encoded);
    }
    doc.insert(ALGO_CONFIGS, algo_configs);

    Ok(doc)
}

fn storage_key(field: &str, code: &str) -> Result<String> {
    if !is_encodable(code) {
        return Err(FundbookError::malformed(
            format!("{field}.{code}"),
            "instrument code contains the reserved key sentinel",
        ));
    }
    Ok(encode_key(code))
}

fn encode_holding(holding: &StoredHolding) -> Document {
    let mut doc = Document::new();
    doc.insert(CODE, holding.code.as_str());
    doc.insert(QUANTITY, holding.quantity);
    doc.insert(GROSS, holding.gross);
    doc.insert(DATE, holding.date);
    if let Some(millis) = holding.latest_trade_time {
        doc.insert(LATEST_TRADE_TIME, millis);
    }
    doc
}

/// `path` is the config's stored location, e.g. `algoConfigs.0700[dot]HK`.
fn encode_algo_config(path: &str, config: &AlgoConfig) -> Result<Document> {
    let mut doc = Document::new();
    doc.insert(CODE, config.code());
    doc.insert(QUANTITY, config.quantity());
    doc.insert(STD_DEV_RANGE, config.std_dev_range());
    for (field, value) in [
        (BASE_PRICE, config.base_price()),
        (STD_DEV_MULTIPLIER, config.std_dev_multiplier()),
        (GROSS_AMOUNT, config.gross_amount()),
    ] {
        // NaN and infinities have no stored form.
        if !value.is_finite() {
            return Err(FundbookError::malformed(
                format!("{path}.{field}"),
                format!("{value} is not a finite number"),
            ));
        }
        doc.insert(field, value);
    }
    Ok(doc)
}

pub fn decode_fund(doc: &Document) -> Result<Fund> {
    let fields = Fields::root(doc);

    let id = match fields.get(ID_FIELD) {
        None => None,
        Some(value) => Some(
            DocumentId::from_value(value)
                .map(FundId::from)
                .ok_or_else(|| fields.wrong_type(ID_FIELD, "string or objectId", value))?,
        ),
    };

    decode_fields(&fields, id.clone()).map_err(|e| match &id {
        Some(id) => e.in_stored_fund(id.as_str()),
        None => e,
    })
}

fn decode_fields(fields: &Fields<'_>, id: Option<FundId>) -> Result<Fund> {
    let fund_type: FundType = fields.string(TYPE)?.parse()?;

    let totals = FundTotals {
        date: fields.date(DATE)?,
        profit: fields.decimal_or_zero(PROFIT)?,
        net_profit: fields.decimal_or_zero(NET_PROFIT)?,
        cashout_amount: fields.decimal_or_zero(CASHOUT_AMOUNT)?,
        cashin_amount: fields.decimal_or_zero(CASHIN_AMOUNT)?,
    };

    let holdings = match fields.sub_document(HOLDINGS)? {
        Some(sub) => decode_holdings(sub)?,
        None => Vec::new(),
    };
    let algo_configs = match fields.sub_document(ALGO_CONFIGS)? {
        Some(sub) => decode_algo_configs(sub)?,
        None => Vec::new(),
    };

    Ok(Fund::restore(
        id,
        fields.string(USER_ID)?,
        fields.string(NAME)?,
        fund_type,
        totals,
        holdings,
        algo_configs,
    ))
}

fn decode_holdings(sub: &Document) -> Result<Vec<(String, FundHolding)>> {
    sub.iter()
        .map(|(stored_key, value)| {
            let path = format!("{HOLDINGS}.{stored_key}");
            let code = domain_key(&path, stored_key)?;
            let fields = Fields::nested(value, path)?;

            let quantity = fields.int(QUANTITY)?;
            if quantity < 0 {
                return Err(FundbookError::malformed(
                    fields.key(QUANTITY),
                    format!("quantity must not be negative, found {quantity}"),
                ));
            }
            let stored = StoredHolding {
                code: fields.string(CODE)?,
                quantity,
                gross: fields.decimal(GROSS)?,
                date: fields.date(DATE)?,
                latest_trade_time: fields.optional_int(LATEST_TRADE_TIME)?,
            };
            if stored.code != code {
                return Err(FundbookError::malformed(
                    fields.key(CODE),
                    format!("code '{}' does not match key '{code}'", stored.code),
                ));
            }
            Ok((code, FundHolding::from_stored(stored)))
        })
        .collect()
}

fn decode_algo_configs(sub: &Document) -> Result<Vec<(String, AlgoConfig)>> {
    sub.iter()
        .map(|(stored_key, value)| {
            let path = format!("{ALGO_CONFIGS}.{stored_key}");
            let code = domain_key(&path, stored_key)?;
            let fields = Fields::nested(value, path)?;

            let range = fields.int(STD_DEV_RANGE)?;
            let std_dev_range = i32::try_from(range).map_err(|_| {
                FundbookError::malformed(
                    fields.key(STD_DEV_RANGE),
                    format!("{range} is out of range"),
                )
            })?;
            let config = AlgoConfig::new(
                fields.string(CODE)?,
                fields.int(QUANTITY)?,
                fields.double(BASE_PRICE)?,
                std_dev_range,
                fields.double(STD_DEV_MULTIPLIER)?,
                fields.double(GROSS_AMOUNT)?,
            );
            Ok((code, config))
        })
        .collect()
}

fn domain_key(path: &str, stored_key: &str) -> Result<String> {
    if !is_storage_safe(stored_key) {
        return Err(FundbookError::malformed(
            path,
            "stored key contains '.' and was not written by the key codec",
        ));
    }
    Ok(decode_key(stored_key))
}

/// Typed field access over one level of a document, with the path used in errors.
struct Fields<'a> {
    doc: &'a Document,
    path: String,
}

impl<'a> Fields<'a> {
    fn root(doc: &'a Document) -> Self {
        Fields {
            doc,
            path: String::new(),
        }
    }

    fn nested(value: &'a Value, path: String) -> Result<Self> {
        match value {
            Value::Document(doc) => Ok(Fields { doc, path }),
            other => Err(FundbookError::malformed(
                path,
                format!("expected document, found {}", other.type_name()),
            )),
        }
    }

    fn key(&self, field: &str) -> String {
        if self.path.is_empty() {
            field.to_string()
        } else {
            format!("{}.{field}", self.path)
        }
    }

    /// Explicit nulls are treated as absent.
    fn get(&self, field: &str) -> Option<&'a Value> {
        match self.doc.get(field) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn required(&self, field: &str) -> Result<&'a Value> {
        self.get(field)
            .ok_or_else(|| FundbookError::malformed(self.key(field), "missing required field"))
    }

    fn wrong_type(&self, field: &str, expected: &str, found: &Value) -> FundbookError {
        FundbookError::malformed(
            self.key(field),
            format!("expected {expected}, found {}", found.type_name()),
        )
    }

    fn string(&self, field: &str) -> Result<String> {
        match self.required(field)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(self.wrong_type(field, "string", other)),
        }
    }

    fn int(&self, field: &str) -> Result<i64> {
        let value = self.required(field)?;
        let int = match value {
            Value::Int(i) => Some(*i),
            Value::Double(f) if f.fract() == 0.0 => f.to_i64(),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            _ => None,
        };
        int.ok_or_else(|| self.wrong_type(field, "integer", value))
    }

    fn optional_int(&self, field: &str) -> Result<Option<i64>> {
        match self.get(field) {
            None => Ok(None),
            Some(_) => self.int(field).map(Some),
        }
    }

    fn decimal(&self, field: &str) -> Result<Decimal> {
        let value = self.required(field)?;
        let decimal = match value {
            Value::Decimal(d) => Some(*d),
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Double(f) => Decimal::from_f64(*f),
            Value::String(s) => s.trim().parse::<Decimal>().ok(),
            _ => None,
        };
        decimal.ok_or_else(|| self.wrong_type(field, "decimal", value))
    }

    /// Accumulators added after the first documents were written default to zero.
    fn decimal_or_zero(&self, field: &str) -> Result<Decimal> {
        match self.get(field) {
            None => Ok(Decimal::ZERO),
            Some(_) => self.decimal(field),
        }
    }

    fn double(&self, field: &str) -> Result<f64> {
        let value = self.required(field)?;
        let double = match value {
            Value::Double(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        };
        double.ok_or_else(|| self.wrong_type(field, "number", value))
    }

    fn date(&self, field: &str) -> Result<DateTime<Utc>> {
        let value = self.required(field)?;
        let date = match value {
            Value::DateTime(d) => Some(*d),
            Value::Int(millis) => DateTime::<Utc>::from_timestamp_millis(*millis),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            _ => None,
        };
        date.ok_or_else(|| self.wrong_type(field, "date", value))
    }

    fn sub_document(&self, field: &str) -> Result<Option<&'a Document>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Document(doc)) => Ok(Some(doc)),
            Some(other) => Err(self.wrong_type(field, "document", other)),
        }
    }
}
