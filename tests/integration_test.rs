//! Integration tests for the fund aggregate, its document mapping, and both stores.
//!
//! Tests cover:
//! - The tracker-fund buy/sell walkthrough (average price kept across sells)
//! - Spot price is never persisted and must be re-observed after a load
//! - Encode/decode round trips, including dotted codes and legacy id forms
//! - FundRepository over MemoryStore and SqliteStore

mod common;

use common::*;
use fundbook::adapters::memory_store::MemoryStore;
use fundbook::domain::algo_config::AlgoConfig;
use fundbook::domain::document::{Document, ID_FIELD, ObjectId, Value};
use fundbook::domain::error::FundbookError;
use fundbook::domain::fund::{Fund, FundId, FundType};
use fundbook::domain::fund_document::{decode_fund, encode_fund, HOLDINGS, TYPE};
use fundbook::domain::repository::FundRepository;
use fundbook::ports::document_store::DocumentStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod trade_walkthrough {
    use super::*;

    #[test]
    fn two_buys_average_to_one_hundred() {
        let fund = tracker_fund();
        let h = fund.holding("2828").unwrap();
        assert_eq!(h.quantity(), 1400);
        assert_eq!(h.gross(), dec!(140000));
        assert_eq!(h.price(), Some(dec!(100)));
    }

    #[test]
    fn partial_sell_keeps_average_and_books_gain() {
        let fund = tracker_fund();
        let realized = fund
            .sell_stock_at("2828", 200, dec!(25000), None, at(3, 9))
            .unwrap();

        let h = fund.holding("2828").unwrap();
        assert_eq!(realized, dec!(5000));
        assert_eq!(h.quantity(), 1200);
        assert_eq!(h.gross(), dec!(120000));
        assert_eq!(h.price(), Some(dec!(100)));
        assert_eq!(fund.profit(), dec!(5000));
    }

    #[test]
    fn spot_price_unset_right_after_buy() {
        let fund = tracker_fund();
        match fund.holding("2828").unwrap().spot_price() {
            Err(FundbookError::SpotPriceNotSet { code }) => assert_eq!(code, "2828"),
            other => panic!("expected SpotPriceNotSet, got: {other:?}"),
        }
    }

    #[test]
    fn uneven_average_survives_partial_sells() {
        let fund = Fund::new("user-1", "Odd lots", FundType::Manual);
        fund.buy_stock("0005.HK", 3, dec!(100)).unwrap();
        let avg_before = fund.holding("0005.HK").unwrap().price().unwrap();

        fund.sell_stock("0005.HK", 1, dec!(40), None).unwrap();
        let avg_after = fund.holding("0005.HK").unwrap().price().unwrap();
        assert_eq!(avg_before.round_dp(20), avg_after.round_dp(20));

        fund.sell_stock("0005.HK", 2, dec!(70), None).unwrap();
        let h = fund.holding("0005.HK").unwrap();
        assert_eq!(h.quantity(), 0);
        assert_eq!(h.gross(), Decimal::ZERO);
        assert_eq!(fund.profit(), dec!(10));
    }
}

mod document_mapping {
    use super::*;

    #[test]
    fn full_fund_round_trips() {
        let fund = full_fund();
        let decoded = decode_fund(&encode_fund(&fund).unwrap()).unwrap();
        assert_same_persisted_state(&decoded, &fund);
        assert_eq!(decoded.holding("BRK.B.US").unwrap().code(), "BRK.B.US");
    }

    #[test]
    fn spot_price_never_reaches_the_document() {
        let fund = full_fund();
        fund.mark_spot_price("0700.HK", dec!(410.2)).unwrap();
        let doc = encode_fund(&fund).unwrap();

        let text = serde_json::to_string(&doc).unwrap();
        assert!(!text.contains("410.2"));
        assert!(!text.to_lowercase().contains("spot"));

        let decoded = decode_fund(&doc).unwrap();
        assert!(decoded.holding("0700.HK").unwrap().spot_price().is_err());
    }

    #[test]
    fn no_stored_key_contains_a_dot() {
        let doc = encode_fund(&full_fund()).unwrap();
        for field in [HOLDINGS, "algoConfigs"] {
            let sub = doc.get(field).and_then(Value::as_document).unwrap();
            assert!(!sub.is_empty());
            assert!(
                sub.keys().all(|k| !k.contains('.')),
                "{field}: {:?}",
                sub.keys().collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn reencoding_a_decoded_fund_is_stable() {
        let first = decode_fund(&encode_fund(&full_fund()).unwrap()).unwrap();
        let second = decode_fund(&encode_fund(&first).unwrap()).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut doc = encode_fund(&full_fund()).unwrap();
        doc.insert(TYPE, "PASSIVE");
        assert!(matches!(
            decode_fund(&doc),
            Err(FundbookError::UnknownFundType { value, .. }) if value == "PASSIVE"
        ));
    }

    #[test]
    fn legacy_document_without_accumulators() {
        let mut doc = Document::new();
        doc.insert(ID_FIELD, ObjectId::from_bytes([7; 12]));
        doc.insert("userId", "legacy-user");
        doc.insert("name", "Old fund");
        doc.insert("date", at(1, 0));
        doc.insert(TYPE, "MANUAL");

        let fund = decode_fund(&doc).unwrap();
        assert_eq!(fund.id(), Some(&FundId::new("070707070707070707070707")));
        assert_eq!(fund.profit(), Decimal::ZERO);
        assert_eq!(fund.cashin_amount(), Decimal::ZERO);
        assert_eq!(fund.holding_count(), 0);
    }
}

mod repository {
    use super::*;

    fn exercise_store<S: DocumentStore>(repo: FundRepository<S>) {
        let mut fund = full_fund();
        fund.mark_spot_price("9988.HK", dec!(88)).unwrap();
        let id = repo.save(&mut fund).unwrap();

        let loaded = repo.find_by_id(&id).unwrap().unwrap();
        assert_eq!(loaded.id(), Some(&id));
        assert_same_persisted_state(&loaded, &fund);
        assert!(loaded.holding("9988.HK").unwrap().spot_price().is_err());

        let mut loaded = loaded;
        loaded.sell_stock("0700.HK", 50, dec!(17000), Some(dec!(20))).unwrap();
        assert_eq!(repo.save(&mut loaded).unwrap(), id);

        let reloaded = repo.find_by_id(&id).unwrap().unwrap();
        assert_eq!(reloaded.holding("0700.HK").unwrap().quantity(), 150);
        assert_eq!(reloaded.profit(), loaded.profit());

        let mut other = tracker_fund();
        repo.save(&mut other).unwrap();
        assert_eq!(repo.find_all().unwrap().len(), 2);
        assert_eq!(repo.find_by_user("user-1").unwrap().len(), 1);

        assert!(repo.delete(&id).unwrap());
        assert!(repo.find_by_id(&id).unwrap().is_none());
        repo.delete_all().unwrap();
        assert!(repo.find_all().unwrap().is_empty());
    }

    #[test]
    fn memory_store_repository() {
        exercise_store(FundRepository::new(MemoryStore::new()));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_store_repository() {
        let store = fundbook::adapters::sqlite_store::SqliteStore::in_memory().unwrap();
        exercise_store(FundRepository::new(store));
    }

    #[test]
    fn broken_stored_fund_is_named_by_find_all() {
        let repo = FundRepository::new(MemoryStore::new());
        repo.save(&mut tracker_fund()).unwrap();

        let mut broken = encode_fund(&full_fund()).unwrap();
        broken.insert(ID_FIELD, "fund-42");
        broken.insert(TYPE, "HEDGE");
        repo.store().save(broken).unwrap();

        let err = repo.find_all().unwrap_err();
        assert!(err.to_string().contains("fund-42"), "{err}");
        assert!(matches!(
            err,
            FundbookError::UnknownFundType { fund: Some(ref id), .. } if id == "fund-42"
        ));
    }

    #[test]
    fn non_finite_algo_config_is_never_stored() {
        let repo = FundRepository::new(MemoryStore::new());
        let mut fund = full_fund();
        let id = repo.save(&mut fund).unwrap();

        fund.set_algo_config(
            "0700.HK",
            AlgoConfig::new("0700.HK", 100, f64::NAN, 20, 2.0, 32050.0),
        );
        assert!(matches!(
            repo.save(&mut fund),
            Err(FundbookError::MalformedDocument { .. })
        ));

        let loaded = repo.find_by_id(&id).unwrap().unwrap();
        assert_eq!(loaded.algo_config("0700.HK").unwrap().base_price(), 320.5);
    }

    #[test]
    fn native_id_document_loads_and_resaves_under_same_id() {
        let store = MemoryStore::new();
        let mut doc = encode_fund(&tracker_fund()).unwrap();
        doc.remove(ID_FIELD);
        let id = store.save(doc).unwrap();
        let raw = store.find_by_id(&id).unwrap().unwrap();
        assert!(matches!(raw.get(ID_FIELD), Some(Value::ObjectId(_))));

        let repo = FundRepository::new(store);
        let mut fund = repo.find_by_id(&id).unwrap().unwrap();
        fund.buy_stock("2828", 100, dec!(10000)).unwrap();
        assert_eq!(repo.save(&mut fund).unwrap(), id);
        assert_eq!(repo.store().len(), 1);

        let raw = repo.store().find_by_id(&id).unwrap().unwrap();
        assert_eq!(raw.get(ID_FIELD), Some(&Value::from(id.as_str())));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_file_store_survives_reopen() {
        use fundbook::adapters::file_config_adapter::FileConfigAdapter;
        use fundbook::adapters::sqlite_store::SqliteStore;

        let dir = tempfile::tempdir().unwrap();
        let ini = format!("[store]\npath = {}\n", dir.path().join("funds.db").display());
        let config = FileConfigAdapter::from_string(&ini).unwrap();

        let id = {
            let repo = FundRepository::new(SqliteStore::from_config(&config).unwrap());
            repo.save(&mut full_fund()).unwrap()
        };

        let repo = FundRepository::new(SqliteStore::from_config(&config).unwrap());
        let loaded = repo.find_by_id(&id).unwrap().unwrap();
        assert_same_persisted_state(&loaded, &full_fund());
    }
}
