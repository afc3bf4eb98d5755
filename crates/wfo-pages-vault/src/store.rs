//! Files in the vault's pages folder.

use crate::contents::CONTENTS_PAGE;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Folder (relative to the vault root) holding taxon pages and the index.
pub const PAGES_FOLDER: &str = "wfo-pages";

/// Ancestor index file inside [`PAGES_FOLDER`].
pub const INDEX_FILE: &str = "ancestors.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("page name is empty")]
    EmptyName,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `contents` to `path` through a temp file in the same directory and
/// an atomic rename.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err(path))?;
    tmp.write_all(contents.as_bytes()).map_err(io_err(path))?;
    tmp.persist(path).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// The pages folder of one vault.
#[derive(Debug, Clone)]
pub struct PageStore {
    vault_root: PathBuf,
    pages_dir: PathBuf,
}

impl PageStore {
    /// Open the vault at `vault_root`, creating the pages folder if needed.
    pub fn open(vault_root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let vault_root = vault_root.into();
        let pages_dir = vault_root.join(PAGES_FOLDER);
        if !pages_dir.is_dir() {
            fs::create_dir_all(&pages_dir).map_err(io_err(&pages_dir))?;
            tracing::info!(dir = %pages_dir.display(), "created pages folder");
        }
        Ok(Self {
            vault_root,
            pages_dir,
        })
    }

    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.pages_dir.join(INDEX_FILE)
    }

    pub fn contents_path(&self) -> PathBuf {
        self.pages_dir.join(CONTENTS_PAGE)
    }

    /// File stem for a plain display name. Characters that are illegal in
    /// file names or break wiki links become `_`.
    pub fn page_stem(plain_name: &str) -> String {
        let mut stem: String = plain_name
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '^' | '[' | ']' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        if stem.starts_with('.') {
            stem.replace_range(..1, "_");
        }
        stem
    }

    pub fn page_path(&self, plain_name: &str) -> PathBuf {
        self.pages_dir
            .join(format!("{}.md", Self::page_stem(plain_name)))
    }

    pub fn page_exists(&self, plain_name: &str) -> bool {
        !Self::page_stem(plain_name).is_empty() && self.page_path(plain_name).is_file()
    }

    /// The page for `plain_name`, created empty if missing. The flag is true
    /// when the page was created by this call.
    pub fn ensure_page(&self, plain_name: &str) -> Result<(PathBuf, bool), StoreError> {
        if Self::page_stem(plain_name).is_empty() {
            return Err(StoreError::EmptyName);
        }
        let path = self.page_path(plain_name);
        if path.is_file() {
            return Ok((path, false));
        }
        fs::write(&path, "").map_err(io_err(&path))?;
        tracing::debug!(page = %path.display(), "created empty page");
        Ok((path, true))
    }

    pub fn read(&self, path: &Path) -> Result<String, StoreError> {
        fs::read_to_string(path).map_err(io_err(path))
    }

    pub fn write(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        write_atomic(path, contents)
    }

    pub fn remove(&self, path: &Path) -> Result<(), StoreError> {
        fs::remove_file(path).map_err(io_err(path))
    }

    /// Markdown files directly inside the pages folder, sorted by path. The
    /// contents page is not one of them.
    pub fn list_pages(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut pages = Vec::new();
        for entry in fs::read_dir(&self.pages_dir).map_err(io_err(&self.pages_dir))? {
            let entry = entry.map_err(io_err(&self.pages_dir))?;
            let path = entry.path();
            let is_md = path.extension().and_then(|e| e.to_str()) == Some("md");
            if is_md && path.is_file() && entry.file_name() != CONTENTS_PAGE {
                pages.push(path);
            }
        }
        pages.sort();
        Ok(pages)
    }
}
