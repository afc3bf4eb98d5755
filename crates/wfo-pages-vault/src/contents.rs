//! The pages folder's contents page.
//!
//! `wfo-pages/_index.md` lists every taxon page, then every ancestor the
//! index records with the pages filed under it. It is regenerated in full
//! after each run that can change the page set; user text is not kept.

use crate::index::AncestorIndex;
use crate::page::{scan_taxon_pages, wiki_link};
use crate::store::{PageStore, StoreError};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::PathBuf;
use wfo_pages_model::Taxon;

/// File name of the contents page inside the pages folder.
pub const CONTENTS_PAGE: &str = "_index.md";

/// Render the contents page for the taxon pages in `pages`.
pub fn render_contents(index: &AncestorIndex, pages: &[(PathBuf, Taxon)]) -> String {
    let stems: BTreeSet<String> = pages
        .iter()
        .filter_map(|(path, _)| Some(path.file_stem()?.to_string_lossy().into_owned()))
        .collect();

    // Best known plain name per name id, pages first.
    let mut names: HashMap<&str, String> = HashMap::new();
    for (_, taxon) in pages {
        names.insert(taxon.name_id(), taxon.plain_name());
    }
    for (_, taxon) in pages {
        for ancestor in &taxon.path {
            names
                .entry(ancestor.name_id())
                .or_insert_with(|| ancestor.plain_name());
        }
    }
    let label = |plain: &str| {
        if stems.contains(&PageStore::page_stem(plain)) {
            wiki_link(plain)
        } else {
            plain.trim().to_string()
        }
    };

    let mut out = String::from("# WFO pages\n\n## All pages\n\n");
    for (path, taxon) in pages {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let plain = taxon.plain_name();
        if PageStore::page_stem(&plain) == stem {
            let _ = writeln!(out, "- {}", wiki_link(&plain));
        } else {
            let _ = writeln!(out, "- [[{stem}|{}]]", plain.trim());
        }
    }

    let mut groups: Vec<(String, Vec<String>)> = index
        .ancestor_ids()
        .map(|id| {
            let heading = match names.get(id) {
                Some(plain) if !plain.trim().is_empty() => label(plain),
                _ => id.to_string(),
            };
            let mut entries: Vec<String> = index
                .descendants_of(id)
                .into_iter()
                .map(|stub| label(&stub.plain_name()))
                .collect();
            entries.sort();
            (heading, entries)
        })
        .collect();
    groups.sort();

    if !groups.is_empty() {
        out.push_str("\n## By ancestor\n");
        for (heading, entries) in groups {
            let _ = write!(out, "\n### {heading}\n\n");
            for entry in entries {
                let _ = writeln!(out, "- {entry}");
            }
        }
    }
    out
}

/// Regenerate the contents page. It is deleted when the folder holds no
/// taxon pages. Returns whether the file changed.
pub fn write_contents(store: &PageStore, index: &AncestorIndex) -> Result<bool, StoreError> {
    let path = store.contents_path();
    let pages = scan_taxon_pages(store)?;
    if pages.is_empty() {
        if path.is_file() {
            store.remove(&path)?;
            tracing::debug!(page = %path.display(), "removed contents page");
            return Ok(true);
        }
        return Ok(false);
    }

    let contents = render_contents(index, &pages);
    if path.is_file() && store.read(&path)? == contents {
        return Ok(false);
    }
    store.write(&path, &contents)?;
    tracing::debug!(page = %path.display(), pages = pages.len(), "wrote contents page");
    Ok(true)
}
