//! Taxon page layout.
//!
//! ```text
//! ---
//! wfoTaxon:            <- last fetched Taxon snapshot (other keys are kept)
//!   id: wfo-...-2024-06
//!   ...
//! ---
//! [[Rosaceae Juss.]]   <- ancestors with pages, nearest first
//! [[Rosales Bercht. & J.Presl]]
//! # *Rosa* L.
//! - [[Rosa gallica L.]]  <- children with pages
//! ----                 <- GENERATED_MARKER
//! free text kept verbatim
//! ```

use crate::store::PageStore;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use wfo_pages_model::Taxon;

/// Front matter property holding the taxon snapshot.
pub const TAXON_KEY: &str = "wfoTaxon";

/// Line that ends the generated block.
pub const GENERATED_MARKER: &str = "----";

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("front matter is not valid YAML: {0}")]
    FrontMatterYaml(#[source] serde_yaml::Error),
    #[error("front matter must be a YAML mapping")]
    FrontMatterShape,
    #[error("failed to encode taxon as YAML: {0}")]
    Encode(#[source] serde_yaml::Error),
}

#[derive(Debug, Clone)]
struct FrontMatter {
    /// The block as it appears in the file, delimiters included.
    raw: String,
    fields: Mapping,
}

/// A parsed page: optional front matter plus the markdown body.
#[derive(Debug, Clone)]
pub struct PageDocument {
    front_matter: Option<FrontMatter>,
    body: String,
}

/// Byte offset just past the line starting at `start`, and the line itself
/// without its terminator.
fn next_line(text: &str, start: usize) -> Option<(&str, usize)> {
    if start >= text.len() {
        return None;
    }
    let rest = &text[start..];
    match rest.find('\n') {
        Some(i) => Some((rest[..i].trim_end_matches('\r'), start + i + 1)),
        None => Some((rest.trim_end_matches('\r'), text.len())),
    }
}

impl PageDocument {
    pub fn parse(text: &str) -> Result<Self, PageError> {
        let Some((first, mut pos)) = next_line(text, 0) else {
            return Ok(Self::without_front_matter(text));
        };
        if first != "---" {
            return Ok(Self::without_front_matter(text));
        }

        let yaml_start = pos;
        while let Some((line, next)) = next_line(text, pos) {
            if line == "---" || line == "..." {
                let yaml = &text[yaml_start..pos];
                let fields = parse_fields(yaml)?;
                return Ok(Self {
                    front_matter: Some(FrontMatter {
                        raw: text[..next].to_string(),
                        fields,
                    }),
                    body: text[next..].to_string(),
                });
            }
            pos = next;
        }

        // An opening delimiter without a closing one is ordinary text.
        Ok(Self::without_front_matter(text))
    }

    fn without_front_matter(text: &str) -> Self {
        Self {
            front_matter: None,
            body: text.to_string(),
        }
    }

    pub fn has_front_matter(&self) -> bool {
        self.front_matter.is_some()
    }

    /// The front matter block exactly as read, ending in a newline.
    pub fn front_matter_text(&self) -> Option<String> {
        self.front_matter.as_ref().map(|fm| {
            let mut raw = fm.raw.clone();
            if !raw.ends_with('\n') {
                raw.push('\n');
            }
            raw
        })
    }

    /// The cached snapshot, if present and decodable.
    pub fn cached_taxon(&self) -> Option<Taxon> {
        let value = self.front_matter.as_ref()?.fields.get(TAXON_KEY)?;
        match serde_yaml::from_value::<Taxon>(value.clone()) {
            Ok(taxon) => Some(taxon),
            Err(e) => {
                tracing::warn!("ignoring undecodable {TAXON_KEY} front matter: {e}");
                None
            }
        }
    }

    /// Front matter text with `taxon` stored under [`TAXON_KEY`], keeping any
    /// other properties.
    pub fn front_matter_with_taxon(&self, taxon: &Taxon) -> Result<String, PageError> {
        let mut fields = self
            .front_matter
            .as_ref()
            .map(|fm| fm.fields.clone())
            .unwrap_or_default();
        let value = serde_yaml::to_value(taxon).map_err(PageError::Encode)?;
        fields.insert(Value::String(TAXON_KEY.to_string()), value);

        let yaml = serde_yaml::to_string(&fields).map_err(PageError::Encode)?;
        Ok(format!("---\n{yaml}---\n"))
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// User text to carry over into the regenerated page.
    ///
    /// Pages that already hold a snapshot were generated before: their text
    /// after the first [`GENERATED_MARKER`] line is kept. Other pages have no
    /// generated block yet, so the whole body is kept.
    pub fn user_text(&self) -> &str {
        let generated_before = self
            .front_matter
            .as_ref()
            .is_some_and(|fm| fm.fields.contains_key(TAXON_KEY));
        if !generated_before {
            return &self.body;
        }

        let mut pos = 0;
        while let Some((line, next)) = next_line(&self.body, pos) {
            if line == GENERATED_MARKER {
                return &self.body[next..];
            }
            pos = next;
        }
        &self.body
    }
}

fn parse_fields(yaml: &str) -> Result<Mapping, PageError> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(yaml).map_err(PageError::FrontMatterYaml)? {
        Value::Mapping(m) => Ok(m),
        Value::Null => Ok(Mapping::new()),
        _ => Err(PageError::FrontMatterShape),
    }
}

/// Wiki link to the page for `plain_name`.
pub fn wiki_link(plain_name: &str) -> String {
    let plain = plain_name.trim();
    let stem = PageStore::page_stem(plain);
    if stem == plain {
        format!("[[{stem}]]")
    } else {
        format!("[[{stem}|{plain}]]")
    }
}

/// The generated navigation block, marker line included.
///
/// `page_exists` decides which ancestors and children get a link.
pub fn render_navigation(taxon: &Taxon, page_exists: impl Fn(&str) -> bool) -> String {
    let mut out = String::new();

    for ancestor in taxon.ancestors_nearest_first() {
        let plain = ancestor.plain_name();
        if page_exists(&plain) {
            out.push_str(&wiki_link(&plain));
            out.push('\n');
        }
    }

    out.push_str("# ");
    out.push_str(&taxon.has_name.markdown_name());
    out.push('\n');

    for child in taxon.children() {
        let plain = child.plain_name();
        if page_exists(&plain) {
            out.push_str("- ");
            out.push_str(&wiki_link(&plain));
            out.push('\n');
        }
    }

    out.push_str(GENERATED_MARKER);
    out.push('\n');
    out
}

/// Every page in the folder whose front matter holds a decodable snapshot.
/// Unreadable pages are logged and skipped.
pub fn scan_taxon_pages(store: &PageStore) -> Result<Vec<(PathBuf, Taxon)>, crate::StoreError> {
    let mut out = Vec::new();
    for path in store.list_pages()? {
        match read_taxon_page(store, &path) {
            Ok(Some(taxon)) => out.push((path, taxon)),
            Ok(None) => tracing::debug!(page = %path.display(), "no taxon snapshot"),
            Err(e) => tracing::warn!(page = %path.display(), "skipping page: {e}"),
        }
    }
    Ok(out)
}

fn read_taxon_page(store: &PageStore, path: &Path) -> Result<Option<Taxon>, Box<dyn std::error::Error>> {
    let text = store.read(path)?;
    Ok(PageDocument::parse(&text)?.cached_taxon())
}
