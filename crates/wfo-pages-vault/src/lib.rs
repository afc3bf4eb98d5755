//! WFO Pages vault layer
//!
//! ```text
//!              ┌──────────────┐   fetch_detail   ┌───────────────┐
//!  SyncRequest │     Page     │ ───────────────► │  NameLookup   │
//!  ──────────► │ Synchronizer │                  └───────────────┘
//!              │  (BFS queue) │ ──add/remove───► ┌───────────────┐
//!              └──────┬───────┘                  │ AncestorIndex │──► ancestors.json
//!                     │ read/write               └───────────────┘
//!                     ▼
//!              ┌──────────────┐
//!              │  PageStore   │──► wfo-pages/<plain name>.md
//!              └──────────────┘──► wfo-pages/_index.md  (contents page)
//! ```
//!
//! One store, one index and one lookup are created per run and passed to the
//! synchronizer by reference.

pub mod contents;
pub mod index;
pub mod page;
pub mod store;
pub mod sync;

pub use contents::{write_contents, CONTENTS_PAGE};
pub use index::{AncestorIndex, IndexError};
pub use page::{PageDocument, PageError, GENERATED_MARKER, TAXON_KEY};
pub use store::{PageStore, StoreError, INDEX_FILE, PAGES_FOLDER};
pub use sync::{PageSynchronizer, SyncError, SyncFailure, SyncReport, SyncRequest};
