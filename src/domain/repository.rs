//! Fund persistence on top of a [`DocumentStore`].

use tracing::{debug, warn};

use super::error::Result;
use super::fund::{Fund, FundId};
use super::fund_document::{decode_fund, encode_fund};
use super::document::Document;
use crate::ports::document_store::DocumentStore;

pub struct FundRepository<S> {
    store: S,
}

impl<S: DocumentStore> FundRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist the fund and return its id. An unsaved fund takes the id the store assigns.
    pub fn save(&self, fund: &mut Fund) -> Result<FundId> {
        let document = encode_fund(fund)?;
        let id = self.store.save(document)?;
        fund.assign_id(id.clone());
        debug!(%id, holdings = fund.holding_count(), "fund saved");
        Ok(id)
    }

    pub fn find_by_id(&self, id: &FundId) -> Result<Option<Fund>> {
        match self.store.find_by_id(id)? {
            Some(document) => decode_logged(&document).map(Some),
            None => Ok(None),
        }
    }

    pub fn find_all(&self) -> Result<Vec<Fund>> {
        self.store
            .find_all()?
            .iter()
            .map(decode_logged)
            .collect()
    }

    pub fn find_by_user(&self, user_id: &str) -> Result<Vec<Fund>> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|fund| fund.user_id() == user_id)
            .collect())
    }

    pub fn delete(&self, id: &FundId) -> Result<bool> {
        let removed = self.store.delete_by_id(id)?;
        debug!(%id, removed, "fund delete");
        Ok(removed)
    }

    pub fn delete_all(&self) -> Result<()> {
        self.store.delete_all()
    }
}

fn decode_logged(document: &Document) -> Result<Fund> {
    decode_fund(document).inspect_err(|e| {
        let id = document.id().map(|id| FundId::from(id).to_string());
        warn!(id = id.as_deref().unwrap_or("<none>"), error = %e, "stored fund failed to decode");
    })
}
