//! Page commands: add, remove, refresh and the ancestor index.

use crate::settings::Settings;
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use wfo_pages_lookup::{LookupError, NameLookup, WfoClient};
use wfo_pages_model::{parse_wfo_id, Name, Taxon};
use wfo_pages_vault::page::scan_taxon_pages;
use wfo_pages_vault::{
    write_contents, AncestorIndex, PageStore, PageSynchronizer, SyncReport, SyncRequest,
    CONTENTS_PAGE, PAGES_FOLDER,
};

/// Everything one run works against: settings, the page folder, the ancestor
/// index and the lookup service.
pub struct Workspace {
    pub settings: Settings,
    pub store: PageStore,
    pub index: AncestorIndex,
    lookup: Box<dyn NameLookup>,
}

/// Effective settings for `vault` and a client configured from them. Opens
/// nothing inside the vault.
pub fn configured_client(vault: &Path) -> Result<(Settings, WfoClient)> {
    let settings = Settings::load(vault)?.with_env_overrides();
    settings
        .validate()
        .with_context(|| format!("invalid settings in {}", Settings::path(vault).display()))?;
    let client = WfoClient::new(settings.client_config())?;
    Ok((settings, client))
}

impl Workspace {
    pub fn open(vault: &Path) -> Result<Self> {
        let (settings, client) = configured_client(vault)?;
        Self::with_lookup(vault, settings, Box::new(client))
    }

    pub fn with_lookup(
        vault: &Path,
        settings: Settings,
        lookup: Box<dyn NameLookup>,
    ) -> Result<Self> {
        let store = PageStore::open(vault)?;
        let index = AncestorIndex::open(&store)?;
        Ok(Self {
            settings,
            store,
            index,
            lookup,
        })
    }

    pub fn lookup(&self) -> &dyn NameLookup {
        self.lookup.as_ref()
    }

    /// Synchronize one page (and its existing relatives).
    pub fn sync(&mut self, request: SyncRequest) -> SyncReport {
        PageSynchronizer::new(self.lookup.as_ref(), &self.store, &mut self.index)
            .synchronize(request)
    }

    /// Add the page for `wfo_id`. An existing page for the id keeps its file
    /// name; otherwise the taxon is fetched once to learn its name.
    pub fn add(&mut self, wfo_id: &str, force: bool) -> Result<(SyncRequest, SyncReport)> {
        let wfo_id = parse_wfo_id(wfo_id)?;

        let existing = scan_taxon_pages(&self.store)?
            .into_iter()
            .find(|(_, taxon)| taxon.name_id() == wfo_id)
            .and_then(|(path, _)| Some(path.file_stem()?.to_string_lossy().into_owned()));
        if let Some(stem) = existing {
            let request = SyncRequest::new(stem, wfo_id).forced(force);
            let report = self.sync(request.clone());
            return Ok((request, report));
        }

        let taxon = self.lookup.fetch_detail(&wfo_id)?;
        let request = SyncRequest::for_taxon(&taxon, force);
        tracing::info!(name = %request.plain_name, "adding taxon page");
        let prefetched = Prefetched::new(self.lookup.as_ref(), taxon);
        let report = PageSynchronizer::new(&prefetched, &self.store, &mut self.index)
            .synchronize(request.clone());
        Ok((request, report))
    }

    pub fn remove(&mut self, wfo_id: &str) -> Result<SyncReport> {
        let report = PageSynchronizer::new(self.lookup.as_ref(), &self.store, &mut self.index)
            .remove(wfo_id)?;
        Ok(report)
    }

    pub fn refresh(&mut self, force: bool) -> Result<SyncReport> {
        let report = PageSynchronizer::new(self.lookup.as_ref(), &self.store, &mut self.index)
            .refresh_all(force)?;
        Ok(report)
    }
}

/// Serves one already-fetched taxon before falling through to `inner`.
struct Prefetched<'a> {
    inner: &'a dyn NameLookup,
    taxon: RefCell<Option<Taxon>>,
}

impl<'a> Prefetched<'a> {
    fn new(inner: &'a dyn NameLookup, taxon: Taxon) -> Self {
        Self {
            inner,
            taxon: RefCell::new(Some(taxon)),
        }
    }
}

impl NameLookup for Prefetched<'_> {
    fn suggest(&self, text: &str) -> Result<Vec<Name>, LookupError> {
        self.inner.suggest(text)
    }

    fn fetch_detail(&self, wfo_id: &str) -> Result<Taxon, LookupError> {
        let id = parse_wfo_id(wfo_id)?;
        let mut slot = self.taxon.borrow_mut();
        if slot.as_ref().is_some_and(|t| t.name_id() == id) {
            if let Some(taxon) = slot.take() {
                return Ok(taxon);
            }
        }
        drop(slot);
        self.inner.fetch_detail(wfo_id)
    }
}

// ============================================================================
// Commands
// ============================================================================

pub fn cmd_add(vault: &Path, wfo_id: &str, force: bool) -> Result<()> {
    let mut ws = Workspace::open(vault)?;
    let (request, report) = ws.add(wfo_id, force)?;
    print_report(ws.store.vault_root(), &report);
    ensure_root_ok(&request, &report)?;
    let path = ws.store.page_path(&request.plain_name);
    println!("{} {}", "page:".green().bold(), path.display());
    Ok(())
}

pub fn cmd_remove(vault: &Path, wfo_id: &str) -> Result<()> {
    let mut ws = Workspace::open(vault)?;
    let report = ws.remove(wfo_id)?;
    print_report(ws.store.vault_root(), &report);
    Ok(())
}

pub fn cmd_refresh(vault: &Path, force: bool) -> Result<()> {
    let mut ws = Workspace::open(vault)?;
    let report = ws.refresh(force)?;
    print_report(ws.store.vault_root(), &report);
    if !report.failed.is_empty() {
        return Err(anyhow!("{} page(s) failed to refresh", report.failed.len()));
    }
    Ok(())
}

pub fn cmd_index_rebuild(vault: &Path) -> Result<()> {
    let store = PageStore::open(vault)?;
    let mut index = AncestorIndex::open(&store)?;
    let pages = index.rebuild(&store)?;
    println!(
        "{} indexed {pages} page(s), {} ancestor key(s) -> {}",
        "ok:".green().bold(),
        index.len(),
        index.path().display()
    );
    if write_contents(&store, &index)? {
        let path = store.contents_path();
        let shown = path.strip_prefix(vault).unwrap_or(&path).display().to_string();
        println!("{} {}", "updated".yellow(), shown);
    }
    Ok(())
}

pub fn cmd_index_descendants(vault: &Path, wfo_id: &str) -> Result<()> {
    let wfo_id = parse_wfo_id(wfo_id)?;
    let store = PageStore::open(vault)?;
    let index = AncestorIndex::open(&store)?;
    let descendants = index.descendants_of(&wfo_id);
    if descendants.is_empty() {
        println!("no descendants recorded for {wfo_id}");
        return Ok(());
    }
    for stub in descendants {
        println!("{}  {}", stub.plain_name(), stub.id.dimmed());
    }
    Ok(())
}

/// Error out when the page the user asked for was not synchronized.
pub fn ensure_root_ok(request: &SyncRequest, report: &SyncReport) -> Result<()> {
    match report.failure_for(&request.plain_name) {
        Some(failure) => Err(anyhow!(
            "failed to synchronize {}: {}",
            request.plain_name,
            failure.error
        )),
        None => Ok(()),
    }
}

pub fn print_report(vault: &Path, report: &SyncReport) {
    let show = |p: &Path| p.strip_prefix(vault).unwrap_or(p).display().to_string();

    for path in &report.created {
        println!("{} {}", "created".green().bold(), show(path));
    }
    for path in &report.written {
        println!("{} {}", "updated".yellow(), show(path));
    }
    for path in &report.removed {
        println!("{} {}", "removed".red(), show(path));
    }
    if report.contents_updated {
        println!("{} {PAGES_FOLDER}/{CONTENTS_PAGE}", "contents".dimmed());
    }
    if let Some(e) = &report.contents_error {
        eprintln!("{} contents page: {e}", "error:".red().bold());
    }
    for failure in &report.failed {
        eprintln!(
            "{} {}: {}",
            "error:".red().bold(),
            failure.request.plain_name,
            failure.error
        );
    }
    if report.skipped > 0 {
        eprintln!(
            "{} skipped {} taxon(s) without a name",
            "warning:".yellow().bold(),
            report.skipped
        );
    }
    if report.truncated {
        eprintln!(
            "{} page limit reached; some related pages were not refreshed",
            "warning:".yellow().bold()
        );
    }
    println!(
        "{}",
        format!(
            "{} created, {} updated, {} unchanged, {} fetched",
            report.created.len(),
            report.written.len(),
            report.unchanged.len(),
            report.fetched.len()
        )
        .dimmed()
    );
}

/// Print a page's location and contents.
pub fn print_page(path: &Path) -> Result<()> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    println!("{} {}", "page:".green().bold(), path.display());
    println!("{text}");
    Ok(())
}
