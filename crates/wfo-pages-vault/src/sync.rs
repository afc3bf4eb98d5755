//! Page synchronization.
//!
//! Synchronizing a taxon makes sure its page exists, holds a taxon snapshot
//! in its front matter and carries an up-to-date navigation block. Related
//! pages (ancestors, children, recorded descendants) that already exist are
//! then synchronized too, so their links pick up the new page.
//!
//! Work runs off one breadth-first queue. A single visited set (keyed by page
//! stem) is shared by every branch and the number of pages visited per run is
//! bounded, so cyclic or very wide classifications always terminate.
//!
//! A page is written before the index records it, and the contents page is
//! regenerated once at the end of every run.

use crate::contents::write_contents;
use crate::index::{AncestorIndex, IndexError};
use crate::page::{render_navigation, scan_taxon_pages, PageDocument, PageError};
use crate::store::{PageStore, StoreError};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use wfo_pages_lookup::{LookupError, NameLookup};
use wfo_pages_model::{parse_wfo_id, ModelError, Taxon, TaxonStub};

/// Default bound on pages visited by one synchronization run.
pub const DEFAULT_MAX_PAGES: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("lookup failed for {wfo_id}: {source}")]
    Lookup {
        wfo_id: String,
        #[source]
        source: LookupError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{}: {source}", path.display())]
    Page {
        path: PathBuf,
        #[source]
        source: PageError,
    },
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    InvalidId(#[from] ModelError),
    #[error("no taxon page records {0}")]
    NotFound(String),
}

/// One page to synchronize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Plain display name; determines the page file.
    pub plain_name: String,
    /// WFO name id used when the snapshot has to be fetched.
    pub wfo_id: String,
    /// Re-fetch even when the page holds a snapshot.
    pub force: bool,
}

impl SyncRequest {
    pub fn new(plain_name: impl Into<String>, wfo_id: impl Into<String>) -> Self {
        Self {
            plain_name: plain_name.into(),
            wfo_id: wfo_id.into(),
            force: false,
        }
    }

    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn for_taxon(taxon: &Taxon, force: bool) -> Self {
        Self::new(taxon.plain_name(), taxon.name_id()).forced(force)
    }

    pub fn for_stub(stub: &TaxonStub, force: bool) -> Self {
        Self::new(stub.plain_name(), stub.id.clone()).forced(force)
    }
}

#[derive(Debug)]
pub struct SyncFailure {
    pub request: SyncRequest,
    pub error: SyncError,
}

/// What a synchronization run did.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Pages created by this run.
    pub created: Vec<PathBuf>,
    /// Existing pages whose contents changed.
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Name ids fetched from the lookup service.
    pub fetched: Vec<String>,
    pub failed: Vec<SyncFailure>,
    /// Requests dropped because their plain name was empty.
    pub skipped: usize,
    /// The page bound was reached before the queue drained.
    pub truncated: bool,
    /// The contents page was written or deleted.
    pub contents_updated: bool,
    /// Regenerating the contents page failed.
    pub contents_error: Option<SyncError>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.truncated && self.contents_error.is_none()
    }

    /// The failure recorded for `plain_name`, if any.
    pub fn failure_for(&self, plain_name: &str) -> Option<&SyncFailure> {
        let stem = PageStore::page_stem(plain_name);
        self.failed
            .iter()
            .find(|f| PageStore::page_stem(&f.request.plain_name) == stem)
    }

    pub fn touched(&self) -> usize {
        self.created.len() + self.written.len() + self.unchanged.len()
    }
}

/// Per-node outcome handed back to the queue loop.
struct NodeOutcome {
    related: Vec<SyncRequest>,
}

pub struct PageSynchronizer<'a> {
    lookup: &'a dyn NameLookup,
    store: &'a PageStore,
    index: &'a mut AncestorIndex,
    max_pages: usize,
}

impl<'a> PageSynchronizer<'a> {
    pub fn new(
        lookup: &'a dyn NameLookup,
        store: &'a PageStore,
        index: &'a mut AncestorIndex,
    ) -> Self {
        Self {
            lookup,
            store,
            index,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Synchronize one taxon page and, transitively, the existing pages
    /// related to it.
    pub fn synchronize(&mut self, request: SyncRequest) -> SyncReport {
        let mut report = SyncReport::default();
        self.run(vec![request], &mut report);
        self.update_contents(&mut report);
        report
    }

    /// Synchronize every taxon page in the folder. With `force`, every
    /// snapshot is re-fetched and the index is rebuilt afterwards so moved
    /// taxa drop out of their old ancestors.
    pub fn refresh_all(&mut self, force: bool) -> Result<SyncReport, SyncError> {
        let requests: Vec<SyncRequest> = scan_taxon_pages(self.store)?
            .into_iter()
            .filter_map(|(path, taxon)| {
                let stem = path.file_stem()?.to_string_lossy().into_owned();
                Some(SyncRequest::new(stem, taxon.name_id()).forced(force))
            })
            .collect();
        tracing::info!(pages = requests.len(), force, "refreshing taxon pages");

        let mut report = SyncReport::default();
        self.run(requests, &mut report);
        if force {
            self.index.rebuild(self.store)?;
        }
        self.update_contents(&mut report);
        Ok(report)
    }

    /// Delete the page of the taxon named `wfo_id`, drop it from the index
    /// and re-synchronize the pages that linked to it.
    pub fn remove(&mut self, wfo_id: &str) -> Result<SyncReport, SyncError> {
        let wfo_id = parse_wfo_id(wfo_id)?;
        let (path, taxon) = scan_taxon_pages(self.store)?
            .into_iter()
            .find(|(_, taxon)| taxon.name_id() == wfo_id)
            .ok_or_else(|| SyncError::NotFound(wfo_id.clone()))?;

        let mut related: Vec<SyncRequest> = self.related_requests(&taxon, false);
        self.index.remove_taxon(&taxon)?;
        self.store.remove(&path)?;
        tracing::info!(page = %path.display(), "removed taxon page");

        let mut report = SyncReport {
            removed: vec![path],
            ..SyncReport::default()
        };
        related.retain(|r| self.store.page_exists(&r.plain_name));
        self.run(related, &mut report);
        self.update_contents(&mut report);
        Ok(report)
    }

    fn update_contents(&self, report: &mut SyncReport) {
        match write_contents(self.store, self.index) {
            Ok(changed) => report.contents_updated = changed,
            Err(e) => {
                tracing::warn!("failed to update contents page: {e}");
                report.contents_error = Some(e.into());
            }
        }
    }

    fn run(&mut self, roots: Vec<SyncRequest>, report: &mut SyncReport) {
        let mut queue: VecDeque<SyncRequest> = roots.into();
        let mut visited: HashSet<String> = HashSet::new();

        while let Some(request) = queue.pop_front() {
            let stem = PageStore::page_stem(&request.plain_name);
            if stem.is_empty() {
                report.skipped += 1;
                continue;
            }
            if visited.contains(&stem) {
                continue;
            }
            if visited.len() >= self.max_pages {
                tracing::warn!(max_pages = self.max_pages, "page bound reached, stopping");
                report.truncated = true;
                break;
            }
            visited.insert(stem);

            match self.sync_page(&request, report) {
                Ok(outcome) => {
                    for next in outcome.related {
                        if !visited.contains(&PageStore::page_stem(&next.plain_name)) {
                            queue.push_back(next);
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(page = %request.plain_name, "synchronization failed: {error}");
                    report.failed.push(SyncFailure { request, error });
                }
            }
        }
    }

    fn sync_page(
        &mut self,
        request: &SyncRequest,
        report: &mut SyncReport,
    ) -> Result<NodeOutcome, SyncError> {
        let store = self.store;
        let (path, created) = store.ensure_page(&request.plain_name)?;

        let result = self.regenerate(request, &path, created, report);
        if result.is_err() && created {
            // Do not leave an empty page behind for a taxon we could not load.
            if let Err(e) = store.remove(&path) {
                tracing::warn!(page = %path.display(), "failed to clean up empty page: {e}");
            }
        }
        result
    }

    fn regenerate(
        &mut self,
        request: &SyncRequest,
        path: &Path,
        created: bool,
        report: &mut SyncReport,
    ) -> Result<NodeOutcome, SyncError> {
        let store = self.store;
        let text = store.read(path)?;
        let doc = PageDocument::parse(&text).map_err(|source| SyncError::Page {
            path: path.to_path_buf(),
            source,
        })?;

        let previous = doc.cached_taxon();
        let cached = if request.force {
            None
        } else {
            previous.clone()
        };

        let (taxon, front_matter, fetched) = match (cached, doc.front_matter_text()) {
            (Some(taxon), Some(front_matter)) => (taxon, front_matter, false),
            _ => {
                let taxon = self.lookup.fetch_detail(&request.wfo_id).map_err(|source| {
                    SyncError::Lookup {
                        wfo_id: request.wfo_id.clone(),
                        source,
                    }
                })?;
                report.fetched.push(taxon.name_id().to_string());
                let front_matter =
                    doc.front_matter_with_taxon(&taxon)
                        .map_err(|source| SyncError::Page {
                            path: path.to_path_buf(),
                            source,
                        })?;
                (taxon, front_matter, true)
            }
        };

        let navigation = render_navigation(&taxon, |plain| store.page_exists(plain));
        let contents = format!("{front_matter}{navigation}{}", doc.user_text());
        let changed = contents != text;
        if changed {
            store.write(path, &contents)?;
            tracing::debug!(page = %path.display(), "wrote page");
        }

        // Only a page that holds the snapshot is recorded.
        if fetched {
            match &previous {
                Some(previous) => self.index.replace_taxon(previous, &taxon)?,
                None => self.index.add_taxon(&taxon)?,
            };
        }

        if !changed {
            report.unchanged.push(path.to_path_buf());
        } else if created {
            report.created.push(path.to_path_buf());
        } else {
            report.written.push(path.to_path_buf());
        }

        let related = self
            .related_requests(&taxon, request.force)
            .into_iter()
            .filter(|r| store.page_exists(&r.plain_name))
            .collect();
        Ok(NodeOutcome { related })
    }

    /// Ancestors, children and recorded descendants of `taxon`.
    fn related_requests(&self, taxon: &Taxon, force: bool) -> Vec<SyncRequest> {
        let mut out: Vec<SyncRequest> = Vec::new();
        out.extend(
            taxon
                .ancestors_nearest_first()
                .map(|a| SyncRequest::for_taxon(a, force)),
        );
        out.extend(taxon.children().map(|c| SyncRequest::for_taxon(c, force)));
        out.extend(
            self.index
                .descendants_of(taxon.name_id())
                .into_iter()
                .map(|stub| SyncRequest::for_stub(stub, force)),
        );
        out
    }
}
