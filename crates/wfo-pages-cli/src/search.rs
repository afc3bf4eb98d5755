//! Debounced name search and result rendering.

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::time::{Duration, Instant};
use wfo_pages_lookup::{suggestion_terms, NameLookup};
use wfo_pages_model::{Name, NameStatus};
use wfo_pages_vault::SyncRequest;

/// Quiet period before a typed query is sent.
pub const DEBOUNCE: Duration = Duration::from_millis(800);

/// Holds the latest input until it has been quiet for the debounce period.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: Option<(String, Instant)>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    /// Record an input event; restarts the quiet period.
    pub fn input(&mut self, text: impl Into<String>, now: Instant) {
        self.pending = Some((text.into(), now));
    }

    /// When the pending input settles.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.quiet)
    }

    /// The settled query, once the quiet period has passed. Inputs too short
    /// to query are consumed and yield nothing.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    /// Settle the pending input immediately.
    pub fn flush(&mut self) -> Option<String> {
        let (text, _) = self.pending.take()?;
        suggestion_terms(&text).map(str::to_string)
    }
}

/// The numbered results of the last search.
#[derive(Debug, Default)]
pub struct SearchView {
    query: Option<String>,
    entries: Vec<Name>,
}

impl SearchView {
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn entries(&self) -> &[Name] {
        &self.entries
    }

    /// Run `query` against `lookup`, replacing the previous results. Each
    /// entry is printed as it arrives.
    pub fn run(&mut self, lookup: &dyn NameLookup, query: &str) -> Result<usize> {
        self.query = Some(query.to_string());
        self.entries.clear();
        let mut entries: Vec<Name> = Vec::new();
        let count = lookup.for_each_suggestion(query, &mut |name| {
            println!("{}", render_entry(entries.len() + 1, name));
            entries.push(name.clone());
        })?;
        self.entries = entries;
        Ok(count)
    }

    /// The page to add for entry `number` (1-based).
    pub fn add_target(&self, number: usize, force: bool) -> Result<SyncRequest> {
        let name = number
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .ok_or_else(|| {
                anyhow!(
                    "no result numbered {number} ({} result(s) shown)",
                    self.entries.len()
                )
            })?;
        add_target(name)
            .map(|request| request.forced(force))
            .ok_or_else(|| anyhow!("{} is an unplaced name and cannot be added", name.plain_name()))
    }
}

/// The page an "add" on `name` creates: the name itself when accepted, its
/// accepted name when a synonym, nothing when unplaced.
pub fn add_target(name: &Name) -> Option<SyncRequest> {
    name.accepted_name()
        .map(|accepted| SyncRequest::new(accepted.plain_name(), accepted.id.clone()))
}

pub fn render_entry(number: usize, name: &Name) -> String {
    let label = format!("{number:>3}.");
    match name.status() {
        NameStatus::Accepted => format!(
            "{} {}  {}",
            label.dimmed(),
            name.plain_name().bold(),
            name.id.dimmed()
        ),
        NameStatus::Synonym { accepted } => format!(
            "{} {}  {} {}  {}",
            label.dimmed(),
            name.plain_name(),
            "synonym of".dimmed(),
            accepted.plain_name().bold(),
            accepted.id.dimmed()
        ),
        NameStatus::Unplaced => format!(
            "{} {}  {}",
            label.dimmed(),
            name.plain_name(),
            "Unplaced name".yellow()
        ),
    }
}
