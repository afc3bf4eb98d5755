//! In-memory lookup over preloaded names and taxa.
//!
//! Used for offline fixtures and tests. Behaves like the HTTP client: short
//! search strings issue no request, unknown ids are a missing-data failure.

use crate::{suggestion_terms, LookupError, NameLookup, SUGGESTION_LIMIT};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use wfo_pages_model::{parse_wfo_id, Name, Taxon};

#[derive(Debug, Default)]
pub struct MemoryLookup {
    names: Vec<Name>,
    taxa: HashMap<String, Taxon>,
    unreachable: HashSet<String>,
    suggest_requests: Cell<usize>,
    detail_requests: Cell<usize>,
}

impl MemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// A name returned by [`NameLookup::suggest`] when its plain form contains
    /// the search terms (case-insensitive).
    pub fn with_name(mut self, name: Name) -> Self {
        self.names.push(name);
        self
    }

    /// A taxon returned by [`NameLookup::fetch_detail`] for its name id.
    pub fn with_taxon(mut self, taxon: Taxon) -> Self {
        self.taxa.insert(taxon.has_name.id.clone(), taxon);
        self
    }

    /// Make detail requests for `wfo_id` fail as if the network were down.
    pub fn with_unreachable(mut self, wfo_id: &str) -> Self {
        self.unreachable.insert(wfo_id.to_string());
        self
    }

    pub fn insert_taxon(&mut self, taxon: Taxon) {
        self.taxa.insert(taxon.has_name.id.clone(), taxon);
    }

    /// Requests that would have reached a server.
    pub fn suggest_requests(&self) -> usize {
        self.suggest_requests.get()
    }

    pub fn detail_requests(&self) -> usize {
        self.detail_requests.get()
    }
}

impl NameLookup for MemoryLookup {
    fn suggest(&self, text: &str) -> Result<Vec<Name>, LookupError> {
        let Some(terms) = suggestion_terms(text) else {
            return Ok(Vec::new());
        };
        self.suggest_requests.set(self.suggest_requests.get() + 1);

        let needle = terms.to_lowercase();
        Ok(self
            .names
            .iter()
            .filter(|n| n.plain_name().to_lowercase().contains(&needle))
            .take(SUGGESTION_LIMIT)
            .cloned()
            .collect())
    }

    fn fetch_detail(&self, wfo_id: &str) -> Result<Taxon, LookupError> {
        let wfo_id = parse_wfo_id(wfo_id)?;
        self.detail_requests.set(self.detail_requests.get() + 1);

        if self.unreachable.contains(&wfo_id) {
            return Err(LookupError::Network {
                url: "memory://".to_string(),
                reason: format!("{wfo_id} is unreachable"),
            });
        }
        self.taxa
            .get(&wfo_id)
            .cloned()
            .ok_or(LookupError::MissingData {
                field: "data.taxonConceptById",
                detail: format!(" (no taxon for {wfo_id})"),
            })
    }
}
