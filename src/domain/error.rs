//! Domain error types.

use rust_decimal::Decimal;

/// Top-level error type for fundbook.
#[derive(Debug, thiserror::Error)]
pub enum FundbookError {
    #[error("invalid trade on {code}: {reason}")]
    InvalidTrade { code: String, reason: String },

    #[error("insufficient quantity of {code}: hold {held}, asked to sell {requested}")]
    InsufficientQuantity {
        code: String,
        held: i64,
        requested: i64,
    },

    #[error("fund {fund} has no holding for {code}")]
    UnknownHolding { fund: String, code: String },

    #[error("fund {fund} has no algo config for {code}")]
    UnknownAlgoConfig { fund: String, code: String },

    #[error("fund {id} not found")]
    FundNotFound { id: String },

    #[error("spot price for {code} has not been set")]
    SpotPriceNotSet { code: String },

    #[error("unknown fund type '{value}'{}", in_fund(.fund))]
    UnknownFundType { value: String, fund: Option<String> },

    #[error("malformed document at {key}{}: {reason}", in_fund(.fund))]
    MalformedDocument {
        key: String,
        reason: String,
        fund: Option<String>,
    },

    #[error("invalid cash flow amount {amount}: {reason}")]
    InvalidCashFlow { amount: Decimal, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FundbookError {
    pub(crate) fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        FundbookError::MalformedDocument {
            key: key.into(),
            reason: reason.into(),
            fund: None,
        }
    }

    /// Attach the id of the stored fund a decode error came from.
    pub(crate) fn in_stored_fund(self, id: &str) -> Self {
        match self {
            FundbookError::UnknownFundType { value, fund: None } => {
                FundbookError::UnknownFundType {
                    value,
                    fund: Some(id.to_string()),
                }
            }
            FundbookError::MalformedDocument {
                key,
                reason,
                fund: None,
            } => FundbookError::MalformedDocument {
                key,
                reason,
                fund: Some(id.to_string()),
            },
            other => other,
        }
    }
}

fn in_fund(fund: &Option<String>) -> String {
    fund.as_deref()
        .map(|id| format!(" in fund {id}"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, FundbookError>;

impl From<&FundbookError> for std::process::ExitCode {
    fn from(err: &FundbookError) -> Self {
        let code: u8 = match err {
            FundbookError::Io(_) => 1,
            FundbookError::ConfigParse { .. }
            | FundbookError::ConfigMissing { .. }
            | FundbookError::ConfigInvalid { .. } => 2,
            FundbookError::Database { .. } | FundbookError::DatabaseQuery { .. } => 3,
            FundbookError::InvalidTrade { .. }
            | FundbookError::InsufficientQuantity { .. }
            | FundbookError::UnknownHolding { .. }
            | FundbookError::UnknownAlgoConfig { .. }
            | FundbookError::FundNotFound { .. }
            | FundbookError::SpotPriceNotSet { .. }
            | FundbookError::InvalidCashFlow { .. } => 4,
            FundbookError::UnknownFundType { .. } | FundbookError::MalformedDocument { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_identifying_context() {
        let err = FundbookError::UnknownHolding {
            fund: "65f0c1".into(),
            code: "0700.HK".into(),
        };
        assert_eq!(err.to_string(), "fund 65f0c1 has no holding for 0700.HK");

        let err = FundbookError::InsufficientQuantity {
            code: "2828".into(),
            held: 100,
            requested: 150,
        };
        assert_eq!(
            err.to_string(),
            "insufficient quantity of 2828: hold 100, asked to sell 150"
        );
    }

    #[test]
    fn malformed_helper_builds_variant() {
        match FundbookError::malformed("holdings.2828", "expected a document") {
            FundbookError::MalformedDocument { key, reason, fund } => {
                assert_eq!(key, "holdings.2828");
                assert_eq!(reason, "expected a document");
                assert_eq!(fund, None);
            }
            other => panic!("expected MalformedDocument, got: {other}"),
        }
    }

    #[test]
    fn stored_fund_id_lands_in_message() {
        let err = FundbookError::UnknownFundType {
            value: "HEDGE".into(),
            fund: None,
        };
        assert_eq!(err.to_string(), "unknown fund type 'HEDGE'");

        let err = err.in_stored_fund("fund-42");
        assert_eq!(err.to_string(), "unknown fund type 'HEDGE' in fund fund-42");

        let err = FundbookError::malformed("holdings.2828.gross", "missing required field")
            .in_stored_fund("65f0c1");
        assert_eq!(
            err.to_string(),
            "malformed document at holdings.2828.gross in fund 65f0c1: missing required field"
        );
    }

    #[test]
    fn stored_fund_id_leaves_other_errors_alone() {
        let err = FundbookError::SpotPriceNotSet {
            code: "2828".into(),
        }
        .in_stored_fund("fund-42");
        assert!(matches!(err, FundbookError::SpotPriceNotSet { .. }));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FundbookError = io.into();
        assert!(matches!(err, FundbookError::Io(_)));
    }
}
