//! World Flora Online name lookup
//!
//! Two query shapes against the WFO Plant List GraphQL endpoint:
//!
//! - name suggestion: up to [`SUGGESTION_LIMIT`] names matching a search string
//! - taxon detail: one taxon concept (`<wfo id>-<classification version>`)
//!   with its full path, synonyms and direct children
//!
//! Every call returns an explicit `Result`; nothing is retried.

pub mod client;
pub mod memory;
pub mod query;

pub use client::{ClientConfig, WfoClient};
pub use memory::MemoryLookup;

use wfo_pages_model::{ModelError, Name, Taxon};

/// Shortest (trimmed) search string that is sent to the server.
pub const MIN_SUGGEST_CHARS: usize = 3;

/// Maximum names requested per suggestion query.
pub const SUGGESTION_LIMIT: usize = 30;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("network error calling {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("http status {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("invalid JSON response: {0}")]
    Decode(String),
    #[error("response is missing `{field}`{detail}")]
    MissingData { field: &'static str, detail: String },
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error(transparent)]
    InvalidId(#[from] ModelError),
}

/// The lookup operations the page generator needs.
pub trait NameLookup {
    /// Names matching `text`, in server order. Inputs shorter than
    /// [`MIN_SUGGEST_CHARS`] after trimming return no names and issue no request.
    fn suggest(&self, text: &str) -> Result<Vec<Name>, LookupError>;

    /// The taxon whose accepted name is `wfo_id`, in the configured
    /// classification version.
    fn fetch_detail(&self, wfo_id: &str) -> Result<Taxon, LookupError>;

    /// Calls `on_each` once per suggested name, in order; returns the count.
    fn for_each_suggestion(
        &self,
        text: &str,
        on_each: &mut dyn FnMut(&Name),
    ) -> Result<usize, LookupError> {
        let names = self.suggest(text)?;
        for name in &names {
            on_each(name);
        }
        Ok(names.len())
    }
}

impl<T: NameLookup + ?Sized> NameLookup for &T {
    fn suggest(&self, text: &str) -> Result<Vec<Name>, LookupError> {
        (**self).suggest(text)
    }

    fn fetch_detail(&self, wfo_id: &str) -> Result<Taxon, LookupError> {
        (**self).fetch_detail(wfo_id)
    }
}

/// The trimmed search terms, or `None` when too short to query.
pub fn suggestion_terms(text: &str) -> Option<&str> {
    let terms = text.trim();
    (terms.chars().count() >= MIN_SUGGEST_CHARS).then_some(terms)
}

/// Taxon concept id for a name in a classification version.
pub fn concept_id(wfo_id: &str, classification_version: &str) -> String {
    format!("{wfo_id}-{classification_version}")
}
