//! WFO Pages data model
//!
//! Mirrors the subset of the World Flora Online GraphQL schema that the page
//! generator consumes:
//!
//! ```text
//!   Name ──currentPreferredUsage──► Taxon ──hasName──► Name
//!                                     │
//!                                     ├── path      (ancestors, root → parent)
//!                                     ├── hasSynonym
//!                                     └── hasPart   (direct children)
//! ```
//!
//! Field names serialize in the API's camelCase so a fetched `Taxon` can be
//! written into page front matter and read back unchanged.

pub mod html;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ============================================================================
// Identifiers
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("not a WFO name id (expected `wfo-` followed by 10 digits): {0:?}")]
    InvalidWfoId(String),
}

fn wfo_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^wfo-\d{10}$").expect("static regex"))
}

/// True for a bare WFO name id such as `wfo-0000000001`.
pub fn is_wfo_id(s: &str) -> bool {
    wfo_id_regex().is_match(s)
}

/// Normalize user input into a WFO name id.
///
/// Accepts surrounding whitespace, an upper-case prefix and a trailing
/// classification version (`wfo-4000032999-2024-06`), which is dropped.
pub fn parse_wfo_id(input: &str) -> Result<String, ModelError> {
    let lowered = input.trim().to_ascii_lowercase();
    let candidate = lowered.get(..14).unwrap_or(&lowered);
    let rest = lowered.get(14..).unwrap_or("");
    let rest_ok = rest.is_empty() || rest.starts_with('-');
    if is_wfo_id(candidate) && rest_ok {
        Ok(candidate.to_string())
    } else {
        Err(ModelError::InvalidWfoId(input.to_string()))
    }
}

// ============================================================================
// Names and taxa
// ============================================================================

/// The API sends `null` for empty lists on some records.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A taxonomic name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Name {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name_string_html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name_string_plain: Option<String>,
    /// Placement of this name. `None` for unplaced names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_preferred_usage: Option<Box<Taxon>>,
}

/// How a name relates to the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStatus<'a> {
    Accepted,
    /// Placed as a synonym of the given accepted name.
    Synonym { accepted: &'a Name },
    Unplaced,
}

impl Name {
    pub fn new(id: impl Into<String>, full_name_string_html: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name_string_html: full_name_string_html.into(),
            full_name_string_plain: None,
            current_preferred_usage: None,
        }
    }

    /// Plain display form: the API's plain string when present, otherwise the
    /// text content of the HTML form.
    pub fn plain_name(&self) -> String {
        match self.full_name_string_plain.as_deref().map(str::trim) {
            Some(plain) if !plain.is_empty() => plain.to_string(),
            _ => html::html_to_plain(&self.full_name_string_html),
        }
    }

    /// Markdown display form (italics kept).
    pub fn markdown_name(&self) -> String {
        html::html_to_markdown(&self.full_name_string_html)
    }

    pub fn status(&self) -> NameStatus<'_> {
        match self.current_preferred_usage.as_deref() {
            None => NameStatus::Unplaced,
            Some(usage) if usage.has_name.id == self.id => NameStatus::Accepted,
            Some(usage) => NameStatus::Synonym {
                accepted: &usage.has_name,
            },
        }
    }

    /// The accepted name this one resolves to, if placed.
    pub fn accepted_name(&self) -> Option<&Name> {
        match self.status() {
            NameStatus::Accepted => Some(self),
            NameStatus::Synonym { accepted } => Some(accepted),
            NameStatus::Unplaced => None,
        }
    }
}

/// A placement of a name within a classification version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taxon {
    /// Taxon concept id, `<wfo name id>-<classification version>`.
    pub id: String,
    pub has_name: Name,
    /// Ancestors, root first.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Taxon>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub has_synonym: Vec<Name>,
    /// Direct children.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub has_part: Vec<Taxon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts_count: Option<u32>,
}

impl Taxon {
    pub fn new(id: impl Into<String>, has_name: Name) -> Self {
        Self {
            id: id.into(),
            has_name,
            path: Vec::new(),
            has_synonym: Vec::new(),
            has_part: Vec::new(),
            parts_count: None,
        }
    }

    pub fn name_id(&self) -> &str {
        &self.has_name.id
    }

    pub fn plain_name(&self) -> String {
        self.has_name.plain_name()
    }

    /// True when `other` denotes the same taxon (by concept or name id).
    pub fn is_same_taxon(&self, other: &Taxon) -> bool {
        self.id == other.id || self.has_name.id == other.has_name.id
    }

    /// Ancestors nearest first. The API's path may include the taxon itself;
    /// that entry is skipped.
    pub fn ancestors_nearest_first(&self) -> impl Iterator<Item = &Taxon> + '_ {
        self.path
            .iter()
            .rev()
            .filter(move |ancestor| !ancestor.is_same_taxon(self))
    }

    pub fn children(&self) -> impl Iterator<Item = &Taxon> + '_ {
        self.has_part
            .iter()
            .filter(move |child| !child.is_same_taxon(self))
    }

    pub fn stub(&self) -> TaxonStub {
        TaxonStub::from(self)
    }
}

/// Just enough of a taxon to render a link to its page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonStub {
    /// Name id; the stable key used for de-duplication.
    pub id: String,
    pub taxon_id: String,
    #[serde(default)]
    pub full_name_string_html: String,
    #[serde(default)]
    pub full_name_string_plain: String,
}

impl From<&Taxon> for TaxonStub {
    fn from(taxon: &Taxon) -> Self {
        Self {
            id: taxon.has_name.id.clone(),
            taxon_id: taxon.id.clone(),
            full_name_string_html: taxon.has_name.full_name_string_html.clone(),
            full_name_string_plain: taxon.plain_name(),
        }
    }
}

impl TaxonStub {
    pub fn plain_name(&self) -> String {
        if self.full_name_string_plain.trim().is_empty() {
            html::html_to_plain(&self.full_name_string_html)
        } else {
            self.full_name_string_plain.trim().to_string()
        }
    }
}
