//! Core domain types and logic.

pub mod key_codec;
pub mod document;
pub mod holding;
pub mod algo_config;
pub mod fund;
pub mod fund_document;
pub mod repository;
pub mod error;
