#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use fundbook::domain::algo_config::AlgoConfig;
use fundbook::domain::fund::{CashFlowDirection, Fund, FundType};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Write;

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, day, hour, 0, 0).unwrap()
}

/// Tracker fund position built up by two buys: 1400 units at an average of 100.
pub fn tracker_fund() -> Fund {
    let fund = Fund::new("user-1", "HK Trackers", FundType::Manual);
    fund.buy_stock_at("2828", 400, dec!(40000), at(1, 9)).unwrap();
    fund.buy_stock_at("2828", 1000, dec!(100000), at(2, 9)).unwrap();
    fund
}

/// A fund exercising every persisted field, including dotted codes in both maps.
pub fn full_fund() -> Fund {
    let fund = Fund::new("user-2", "Asia Algo", FundType::Algo);
    fund.buy_stock_at("0700.HK", 200, dec!(64100.40), at(1, 10)).unwrap();
    fund.buy_stock_at("9988.HK", 500, dec!(40250), at(2, 10)).unwrap();
    fund.buy_stock_at("BRK.B.US", 10, dec!(4100.75), at(3, 10)).unwrap();
    fund.sell_stock_at("9988.HK", 100, dec!(9000), Some(dec!(12.5)), at(4, 10))
        .unwrap();
    fund.record_cash_flow_at(dec!(250000), CashFlowDirection::In, at(5, 9))
        .unwrap();
    fund.record_cash_flow_at(dec!(10000), CashFlowDirection::Out, at(6, 9))
        .unwrap();
    fund.set_algo_config_at(
        "0700.HK",
        AlgoConfig::new("0700.HK", 100, 320.5, 20, 2.0, 32050.0),
        at(7, 9),
    );
    fund.set_algo_config_at(
        "2800.HK",
        AlgoConfig::new("2800.HK", 500, 18.25, 10, 1.5, 9125.0),
        at(7, 10),
    );
    fund
}

pub fn assert_same_persisted_state(actual: &Fund, expected: &Fund) {
    assert_eq!(actual.user_id(), expected.user_id());
    assert_eq!(actual.name(), expected.name());
    assert_eq!(actual.fund_type(), expected.fund_type());
    assert_eq!(actual.totals(), expected.totals());
    assert_eq!(actual.stored_holdings(), expected.stored_holdings());
    assert_eq!(actual.algo_configs(), expected.algo_configs());
}

pub fn decimal(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
