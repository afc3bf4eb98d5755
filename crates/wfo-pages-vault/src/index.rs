//! Ancestor → descendant index.
//!
//! Maps an ancestor's name id to the stubs of every taxon with a page that
//! has it on its path. Stubs are keyed by their own name id, so re-adding a
//! taxon replaces its stub instead of duplicating it.
//!
//! Persisted as a JSON array of `[key, [stub, ...]]` pairs in
//! `wfo-pages/ancestors.json`, rewritten after every change.

use crate::page::scan_taxon_pages;
use crate::store::{write_atomic, PageStore, StoreError};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use wfo_pages_model::{Taxon, TaxonStub};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to decode ancestor index {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode ancestor index: {0}")]
    Encode(#[source] serde_json::Error),
}

type Descendants = BTreeMap<String, TaxonStub>;

#[derive(Debug)]
pub struct AncestorIndex {
    path: PathBuf,
    entries: BTreeMap<String, Descendants>,
}

impl AncestorIndex {
    /// Load the index, or create it by scanning the existing pages when the
    /// index file is missing.
    pub fn open(store: &PageStore) -> Result<Self, IndexError> {
        let path = store.index_path();
        if path.is_file() {
            let index = Self::load(&path)?;
            tracing::debug!(keys = index.len(), "loaded ancestor index");
            return Ok(index);
        }

        let mut index = Self {
            path,
            entries: BTreeMap::new(),
        };
        index.save()?;
        let pages = index.rebuild(store)?;
        tracing::info!(pages, "initialized ancestor index from existing pages");
        Ok(index)
    }

    fn load(path: &Path) -> Result<Self, IndexError> {
        let text = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let pairs: Vec<(String, Vec<TaxonStub>)> =
            serde_json::from_str(&text).map_err(|source| IndexError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        let mut entries: BTreeMap<String, Descendants> = BTreeMap::new();
        for (key, stubs) in pairs {
            let descendants = entries.entry(key.clone()).or_default();
            for stub in stubs {
                if stub.id != key {
                    descendants.insert(stub.id.clone(), stub);
                }
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Clear and re-add the snapshot of every taxon page. Returns the number
    /// of pages indexed.
    pub fn rebuild(&mut self, store: &PageStore) -> Result<usize, IndexError> {
        self.entries.clear();
        let pages = scan_taxon_pages(store)?;
        for (_, taxon) in &pages {
            self.insert_taxon(taxon);
        }
        self.save()?;
        Ok(pages.len())
    }

    fn insert_taxon(&mut self, taxon: &Taxon) -> bool {
        let stub = taxon.stub();
        let mut changed = false;
        for ancestor in taxon.ancestors_nearest_first() {
            let key = ancestor.name_id();
            if key == stub.id {
                continue;
            }
            let descendants = self.entries.entry(key.to_string()).or_default();
            if descendants.get(&stub.id) != Some(&stub) {
                descendants.insert(stub.id.clone(), stub.clone());
                changed = true;
            }
        }
        changed
    }

    /// Record `taxon` as a descendant of every ancestor on its path.
    /// Returns whether the index changed.
    pub fn add_taxon(&mut self, taxon: &Taxon) -> Result<bool, IndexError> {
        let changed = self.insert_taxon(taxon);
        if changed {
            self.save()?;
        }
        Ok(changed)
    }

    /// Drop `taxon` from its ancestors' descendant sets and delete its own
    /// key. Never creates entries. Returns whether the index changed.
    pub fn remove_taxon(&mut self, taxon: &Taxon) -> Result<bool, IndexError> {
        let mut changed = self.detach(taxon, &HashSet::new());
        changed |= self.entries.remove(taxon.name_id()).is_some();

        if changed {
            self.save()?;
        }
        Ok(changed)
    }

    /// Record a re-fetched snapshot of a taxon. Its stub leaves the ancestors
    /// `previous` had and `current` no longer has; its own key is kept.
    pub fn replace_taxon(&mut self, previous: &Taxon, current: &Taxon) -> Result<bool, IndexError> {
        let keep: HashSet<&str> = current
            .ancestors_nearest_first()
            .map(|a| a.name_id())
            .collect();
        let mut changed = self.detach(previous, &keep);
        changed |= self.insert_taxon(current);

        if changed {
            self.save()?;
        }
        Ok(changed)
    }

    /// Remove the stub of `taxon` from every ancestor entry not in `keep`,
    /// dropping entries that become empty.
    fn detach(&mut self, taxon: &Taxon, keep: &HashSet<&str>) -> bool {
        let id = taxon.name_id();
        let mut changed = false;
        for ancestor in &taxon.path {
            let key = ancestor.name_id();
            if keep.contains(key) {
                continue;
            }
            if let Some(descendants) = self.entries.get_mut(key) {
                changed |= descendants.remove(id).is_some();
                if descendants.is_empty() {
                    self.entries.remove(key);
                }
            }
        }
        changed
    }

    /// Known descendants of `name_id`; empty when the key is unknown.
    pub fn descendants_of(&self, name_id: &str) -> Vec<&TaxonStub> {
        self.entries
            .get(name_id)
            .map(|d| d.values().collect())
            .unwrap_or_default()
    }

    /// Ancestor ids that have at least one recorded descendant, sorted.
    pub fn ancestor_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains_key(&self, name_id: &str) -> bool {
        self.entries.contains_key(name_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), IndexError> {
        let pairs: Vec<(&String, Vec<&TaxonStub>)> = self
            .entries
            .iter()
            .map(|(key, d)| (key, d.values().collect()))
            .collect();
        let json = serde_json::to_string_pretty(&pairs).map_err(IndexError::Encode)?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }
}
