//! Document store port trait.

use crate::domain::document::Document;
use crate::domain::error::FundbookError;
use crate::domain::fund::FundId;

/// Persistence for fund documents, keyed by `_id`.
///
/// Writes are last-writer-wins per id; implementations add no version checks.
pub trait DocumentStore {
    /// Insert or replace a document and return its id. A document without an `_id`
    /// is given a fresh store-native id, which is written into the stored copy.
    fn save(&self, document: Document) -> Result<FundId, FundbookError>;

    fn find_by_id(&self, id: &FundId) -> Result<Option<Document>, FundbookError>;

    fn find_all(&self) -> Result<Vec<Document>, FundbookError>;

    /// Returns whether a document was removed.
    fn delete_by_id(&self, id: &FundId) -> Result<bool, FundbookError>;

    fn delete_all(&self) -> Result<(), FundbookError>;
}
