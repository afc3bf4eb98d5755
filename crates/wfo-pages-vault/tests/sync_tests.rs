//! End-to-end synchronization against a temp vault and an in-memory lookup.

use std::fs;
use tempfile::tempdir;
use wfo_pages_lookup::MemoryLookup;
use wfo_pages_model::{Name, Taxon};
use wfo_pages_vault::{
    AncestorIndex, PageDocument, PageStore, PageSynchronizer, SyncError, SyncRequest,
    CONTENTS_PAGE,
};

const ROSALES: &str = "wfo-7000000554";
const ROSACEAE: &str = "wfo-7000000520";
const ROSA: &str = "wfo-4000032999";
const CANINA: &str = "wfo-0000900001";

fn bare(name_id: &str, html: &str) -> Taxon {
    Taxon::new(format!("{name_id}-2024-06"), Name::new(name_id, html))
}

/// Rosales > Rosaceae > Rosa > Rosa canina, as the detail query returns them.
fn rosaceae_lookup() -> MemoryLookup {
    let rosales = bare(ROSALES, "Rosales Bercht. &amp; J.Presl");
    let rosaceae = bare(ROSACEAE, "Rosaceae Juss.");
    let rosa = bare(ROSA, "<i>Rosa</i> L.");
    let canina = bare(CANINA, "<i>Rosa canina</i> L.");

    let mut rosales_detail = rosales.clone();
    rosales_detail.has_part = vec![rosaceae.clone()];

    let mut rosaceae_detail = rosaceae.clone();
    rosaceae_detail.path = vec![rosales.clone()];
    rosaceae_detail.has_part = vec![rosa.clone()];

    let mut rosa_detail = rosa.clone();
    // The path as served includes the taxon itself.
    rosa_detail.path = vec![rosales.clone(), rosaceae.clone(), rosa.clone()];
    rosa_detail.has_part = vec![canina.clone()];
    rosa_detail.has_synonym = vec![Name::new("wfo-0000000002", "<i>Rosa gallica</i>")];

    let mut canina_detail = canina.clone();
    canina_detail.path = vec![rosales, rosaceae, rosa];

    MemoryLookup::new()
        .with_taxon(rosales_detail)
        .with_taxon(rosaceae_detail)
        .with_taxon(rosa_detail)
        .with_taxon(canina_detail)
}

fn sync(
    lookup: &MemoryLookup,
    store: &PageStore,
    index: &mut AncestorIndex,
    request: SyncRequest,
) -> wfo_pages_vault::SyncReport {
    PageSynchronizer::new(lookup, store, index).synchronize(request)
}

#[test]
fn adding_a_genus_links_existing_ancestors_and_updates_them() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup();

    let report = sync(&lookup, &store, &mut index, SyncRequest::new("Rosaceae Juss.", ROSACEAE));
    assert!(report.is_clean(), "{report:?}");

    let report = sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    assert!(report.is_clean(), "{report:?}");
    let rosa_path = dir.path().join("wfo-pages").join("Rosa L..md");
    assert_eq!(report.created, vec![rosa_path.clone()]);
    assert_eq!(report.written, vec![store.page_path("Rosaceae Juss.")]);
    assert_eq!(report.fetched, vec![ROSA.to_string()]);

    let text = fs::read_to_string(&rosa_path).unwrap();
    assert!(text.starts_with("---\nwfoTaxon:\n"), "{text}");
    let doc = PageDocument::parse(&text).unwrap();
    assert_eq!(doc.cached_taxon().unwrap().id, format!("{ROSA}-2024-06"));

    let body: Vec<&str> = doc.body().lines().collect();
    assert_eq!(body[0], "[[Rosaceae Juss.]]");
    assert!(body[1].starts_with("# ") && body[1].contains("Rosa"), "{body:?}");
    assert_eq!(body[2], "----");
    assert_eq!(body.len(), 3, "no child or Rosales links without pages");

    let family = fs::read_to_string(store.page_path("Rosaceae Juss.")).unwrap();
    assert!(family.contains("\n- [[Rosa L.]]\n"), "{family}");

    let stubs = index.descendants_of(ROSACEAE);
    assert_eq!(stubs.len(), 1);
    assert_eq!(stubs[0].id, ROSA);
    assert!(index.descendants_of(ROSA).is_empty());
}

#[test]
fn cached_snapshot_is_reused_and_user_text_kept() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup();

    sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    assert_eq!(lookup.detail_requests(), 1);

    let path = store.page_path("Rosa L.");
    let first = fs::read_to_string(&path).unwrap();
    let front_matter = PageDocument::parse(&first).unwrap().front_matter_text().unwrap();
    fs::write(&path, format!("{first}My field notes.\n----\nstill mine\n")).unwrap();

    // A new child page appears; the genus page picks it up from its cache.
    sync(&lookup, &store, &mut index, SyncRequest::new("Rosa canina L.", CANINA));
    assert_eq!(lookup.detail_requests(), 2);

    let after = fs::read_to_string(&path).unwrap();
    assert!(after.starts_with(&front_matter), "front matter must be untouched");
    assert!(after.contains("\n- [[Rosa canina L.]]\n----\n"), "{after}");
    assert!(after.ends_with("----\nMy field notes.\n----\nstill mine\n"), "{after}");
}

#[test]
fn synchronizing_twice_is_byte_identical() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup();

    sync(&lookup, &store, &mut index, SyncRequest::new("Rosaceae Juss.", ROSACEAE));
    sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    let before = fs::read_to_string(store.page_path("Rosa L.")).unwrap();

    let report = sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    assert!(report.written.is_empty() && report.created.is_empty(), "{report:?}");
    assert_eq!(report.unchanged.len(), 2);
    assert_eq!(fs::read_to_string(store.page_path("Rosa L.")).unwrap(), before);
}

#[test]
fn existing_front_matter_keys_survive_first_fetch() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup();

    let path = store.page_path("Rosa L.");
    fs::write(&path, "---\ntags:\n- garden\n---\nPlanted 2019.\n").unwrap();

    let report = sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    assert_eq!(report.written, vec![path.clone()]);

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("---\ntags:\n- garden\nwfoTaxon:\n"), "{text}");
    assert!(text.ends_with("----\nPlanted 2019.\n"), "{text}");
}

#[test]
fn forced_refresh_refetches_and_propagates() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup();

    sync(&lookup, &store, &mut index, SyncRequest::new("Rosaceae Juss.", ROSACEAE));
    sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    assert_eq!(lookup.detail_requests(), 2);

    let path = store.page_path("Rosa L.");
    let mut text = fs::read_to_string(&path).unwrap();
    text.push_str("Hips are edible.\n----\nstill mine\n");
    fs::write(&path, &text).unwrap();

    let report = sync(
        &lookup,
        &store,
        &mut index,
        SyncRequest::new("Rosa L.", ROSA).forced(true),
    );
    assert_eq!(report.fetched.len(), 2, "{report:?}");
    assert_eq!(lookup.detail_requests(), 4);

    // A fresh snapshot replaces the front matter, never the user's text.
    let after = fs::read_to_string(&path).unwrap();
    assert_eq!(after, text);
    assert!(after.ends_with("----\nHips are edible.\n----\nstill mine\n"), "{after}");
}

#[test]
fn forced_refetch_moves_taxon_out_of_its_old_ancestor() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();

    sync(&rosaceae_lookup(), &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    sync(&rosaceae_lookup(), &store, &mut index, SyncRequest::new("Rosa canina L.", CANINA));
    assert_eq!(index.descendants_of(ROSACEAE).len(), 2);

    // The next classification files Rosa under another family.
    let rosales = bare(ROSALES, "Rosales Bercht. &amp; J.Presl");
    let hulthemiaceae = bare("wfo-7000000999", "Hulthemiaceae");
    let rosa = bare(ROSA, "<i>Rosa</i> L.");
    let mut moved = rosa.clone();
    moved.path = vec![rosales, hulthemiaceae, rosa];
    let lookup = MemoryLookup::new().with_taxon(moved);

    let report = PageSynchronizer::new(&lookup, &store, &mut index)
        .synchronize(SyncRequest::new("Rosa L.", ROSA).forced(true));
    assert_eq!(report.fetched, vec![ROSA.to_string()]);

    let under_old: Vec<&str> = index
        .descendants_of(ROSACEAE)
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(under_old, vec![CANINA]);
    assert_eq!(index.descendants_of("wfo-7000000999")[0].id, ROSA);
    assert_eq!(index.descendants_of(ROSALES).len(), 2);
    assert_eq!(index.descendants_of(ROSA)[0].id, CANINA);

    // Reopening reads the same state back.
    let reopened = AncestorIndex::open(&store).unwrap();
    assert_eq!(reopened.descendants_of(ROSACEAE).len(), 1);
}

#[cfg(unix)]
#[test]
fn page_write_failure_leaves_index_untouched() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup();

    let path = store.page_path("Rosa L.");
    fs::write(&path, "my notes\n").unwrap();
    fs::set_permissions(store.pages_dir(), fs::Permissions::from_mode(0o555)).unwrap();
    let restore = || {
        fs::set_permissions(store.pages_dir(), fs::Permissions::from_mode(0o755)).unwrap();
    };

    // Privileged users ignore directory permissions; nothing to check then.
    let writable = store.pages_dir().join("writable-check");
    if fs::write(&writable, "").is_ok() {
        let _ = fs::remove_file(&writable);
        restore();
        return;
    }

    let report = sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    restore();

    let failure = report.failure_for("Rosa L.").expect("write failure recorded");
    assert!(matches!(failure.error, SyncError::Store(_)), "{:?}", failure.error);
    assert_eq!(report.fetched, vec![ROSA.to_string()]);
    assert!(index.is_empty());
    assert!(AncestorIndex::open(&store).unwrap().is_empty());
    assert_eq!(fs::read_to_string(&path).unwrap(), "my notes\n");
}

#[test]
fn failed_fetch_is_reported_and_leaves_no_empty_page() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup().with_unreachable(ROSA);

    let report = sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    let failure = report.failure_for("Rosa L.").expect("root failure recorded");
    assert!(matches!(failure.error, SyncError::Lookup { .. }));
    assert!(!store.page_exists("Rosa L."));
    assert!(index.is_empty());
}

#[test]
fn empty_name_is_skipped() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup();

    let report = sync(&lookup, &store, &mut index, SyncRequest::new("  ", ROSA));
    assert_eq!(report.skipped, 1);
    assert_eq!(lookup.detail_requests(), 0);
    assert!(store.list_pages().unwrap().is_empty());
}

#[test]
fn cyclic_classification_terminates() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();

    // A and B each claim the other as parent and child.
    let a = bare("wfo-0000000101", "Alpha");
    let b = bare("wfo-0000000102", "Beta");
    let mut a_detail = a.clone();
    a_detail.path = vec![b.clone()];
    a_detail.has_part = vec![b.clone()];
    let mut b_detail = b.clone();
    b_detail.path = vec![a.clone()];
    b_detail.has_part = vec![a];
    let lookup = MemoryLookup::new().with_taxon(a_detail).with_taxon(b_detail);

    sync(&lookup, &store, &mut index, SyncRequest::new("Alpha", "wfo-0000000101"));
    let report = sync(&lookup, &store, &mut index, SyncRequest::new("Beta", "wfo-0000000102"));
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.touched(), 2);
}

#[test]
fn page_bound_truncates_the_run() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup();

    for (name, id) in [("Rosales Bercht. & J.Presl", ROSALES), ("Rosaceae Juss.", ROSACEAE)] {
        sync(&lookup, &store, &mut index, SyncRequest::new(name, id));
    }

    let report = PageSynchronizer::new(&lookup, &store, &mut index)
        .with_max_pages(1)
        .synchronize(SyncRequest::new("Rosa L.", ROSA));
    assert!(report.truncated);
    assert_eq!(report.touched(), 1);
}

#[test]
fn remove_deletes_page_and_unlinks_it() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup();

    sync(&lookup, &store, &mut index, SyncRequest::new("Rosaceae Juss.", ROSACEAE));
    sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    assert!(fs::read_to_string(store.page_path("Rosaceae Juss.")).unwrap().contains("[[Rosa L.]]"));

    let report = PageSynchronizer::new(&lookup, &store, &mut index)
        .remove(ROSA)
        .unwrap();
    assert_eq!(report.removed, vec![store.page_path("Rosa L.")]);
    assert_eq!(report.written, vec![store.page_path("Rosaceae Juss.")]);
    assert!(!store.page_exists("Rosa L."));
    assert!(!fs::read_to_string(store.page_path("Rosaceae Juss.")).unwrap().contains("[[Rosa L.]]"));
    assert!(index.descendants_of(ROSACEAE).is_empty());

    let err = PageSynchronizer::new(&lookup, &store, &mut index)
        .remove(ROSA)
        .unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[test]
fn index_is_rebuilt_from_existing_pages() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    {
        let mut index = AncestorIndex::open(&store).unwrap();
        let lookup = rosaceae_lookup();
        sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
        sync(&lookup, &store, &mut index, SyncRequest::new("Rosa canina L.", CANINA));
    }
    fs::remove_file(store.index_path()).unwrap();

    let index = AncestorIndex::open(&store).unwrap();
    let under_family: Vec<&str> = index
        .descendants_of(ROSACEAE)
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(under_family, vec![CANINA, ROSA]);
    assert_eq!(index.descendants_of(ROSA).len(), 1);
}

#[test]
fn refresh_all_refetches_every_page_when_forced() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup();

    sync(&lookup, &store, &mut index, SyncRequest::new("Rosaceae Juss.", ROSACEAE));
    sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    fs::write(store.pages_dir().join("Scratch.md"), "not a taxon page\n").unwrap();

    let mut synchronizer = PageSynchronizer::new(&lookup, &store, &mut index);
    let report = synchronizer.refresh_all(false).unwrap();
    assert!(report.fetched.is_empty());
    assert_eq!(report.unchanged.len(), 2);

    let report = synchronizer.refresh_all(true).unwrap();
    assert_eq!(report.fetched.len(), 2);
    assert_eq!(
        fs::read_to_string(store.pages_dir().join("Scratch.md")).unwrap(),
        "not a taxon page\n"
    );
}

#[test]
fn contents_page_follows_add_and_remove() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(dir.path()).unwrap();
    let mut index = AncestorIndex::open(&store).unwrap();
    let lookup = rosaceae_lookup();
    let contents = store.pages_dir().join(CONTENTS_PAGE);

    let report = sync(&lookup, &store, &mut index, SyncRequest::new("Rosaceae Juss.", ROSACEAE));
    assert!(report.contents_updated);
    let report = sync(&lookup, &store, &mut index, SyncRequest::new("Rosa L.", ROSA));
    assert!(report.is_clean(), "{report:?}");
    assert!(report.contents_updated);

    let text = fs::read_to_string(&contents).unwrap();
    assert!(text.contains("## All pages\n\n- [[Rosa L.]]\n- [[Rosaceae Juss.]]\n"), "{text}");
    assert!(text.contains("### [[Rosaceae Juss.]]\n\n- [[Rosa L.]]\n"), "{text}");
    assert!(
        text.contains("### Rosales Bercht. & J.Presl\n\n- [[Rosa L.]]\n- [[Rosaceae Juss.]]\n"),
        "{text}"
    );

    // The contents page is not a taxon page and is left alone by refresh.
    assert_eq!(store.list_pages().unwrap().len(), 2);
    let report = PageSynchronizer::new(&lookup, &store, &mut index)
        .refresh_all(false)
        .unwrap();
    assert_eq!(report.unchanged.len(), 2);
    assert!(!report.contents_updated);
    assert_eq!(fs::read_to_string(&contents).unwrap(), text);

    let report = PageSynchronizer::new(&lookup, &store, &mut index)
        .remove(ROSA)
        .unwrap();
    assert!(report.contents_updated);
    let text = fs::read_to_string(&contents).unwrap();
    assert!(!text.contains("Rosa L."), "{text}");
    assert!(text.contains("- [[Rosaceae Juss.]]\n"), "{text}");

    // Removing the last page removes the contents page too.
    let report = PageSynchronizer::new(&lookup, &store, &mut index)
        .remove(ROSACEAE)
        .unwrap();
    assert!(report.contents_updated);
    assert!(!contents.exists());
}
