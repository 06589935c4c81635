//! History capture through the public store API: dedup policies, the
//! history cap and the exclude filter, driven by an in-memory pasteboard.

use shelf::environment::{Environment, ManualClock};
use shelf::pasteboard::{MemoryPasteboard, PasteboardValue};
use shelf::poller::TickOutcome;
use shelf::preferences::Preferences;
use shelf::{ExcludedApplication, ShelfStore};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

struct Harness {
    _dir: tempfile::TempDir,
    pasteboard: Arc<MemoryPasteboard>,
    clock: Arc<ManualClock>,
    store: ShelfStore,
}

fn harness(prefs: Preferences) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pasteboard = Arc::new(MemoryPasteboard::new());
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let env = Environment::in_memory(dir.path(), pasteboard.clone(), prefs, clock.clone()).unwrap();
    Harness {
        _dir: dir,
        pasteboard,
        clock,
        store: ShelfStore::with_environment(env),
    }
}

#[test]
fn test_dedup_on_overwrite() {
    let h = harness(Preferences {
        overwrite_same_history: true,
        ..Preferences::default()
    });

    h.pasteboard.write_string("repeat me");
    assert!(h.store.poll_once());
    let second_time = h.clock.advance(30);
    h.pasteboard.write_string("repeat me");
    assert!(h.store.poll_once());

    let clips = h.store.clips().unwrap();
    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].update_time, second_time);
    assert_eq!(std::fs::read_dir(h.store.environments().current().paths.history_dir()).unwrap().count(), 1);
}

#[test]
fn test_no_dedup_default_creates_distinct_records() {
    let h = harness(Preferences {
        overwrite_same_history: false,
        copy_same_history: true,
        ..Preferences::default()
    });

    h.pasteboard.write_string("twice");
    h.store.poll_once();
    h.clock.advance(1);
    h.pasteboard.write_string("twice");
    h.store.poll_once();

    let clips = h.store.clips().unwrap();
    assert_eq!(clips.len(), 2);
    assert_ne!(clips[0].data_hash, clips[1].data_hash);
    assert!(clips.iter().all(|c| c.title == "twice"));
}

#[test]
fn test_history_cap_keeps_newest() {
    const N: usize = 7;
    let h = harness(Preferences {
        max_history_size: N,
        ..Preferences::default()
    });

    for i in 0..N + 5 {
        h.clock.advance(1);
        h.pasteboard.write_string(&format!("distinct clip {}", i));
        assert!(h.store.poll_once());
    }

    let clips = h.store.clips().unwrap();
    assert_eq!(clips.len(), N);
    let kept: HashSet<String> = clips.iter().map(|c| c.title.clone()).collect();
    let expected: HashSet<String> = (5..N + 5).map(|i| format!("distinct clip {}", i)).collect();
    assert_eq!(kept, expected);
    assert!(clips.iter().all(|c| Path::new(&c.data_path).exists()));
}

#[test]
fn test_exclude_filter_is_marker_presence_only() {
    let h = harness(Preferences::default());
    h.store
        .add_excluded_application(ExcludedApplication {
            identifier: "com.example.vault".into(),
            name: "Vault".into(),
        })
        .unwrap();

    h.pasteboard.write(vec![
        ("public.utf8-plain-text", PasteboardValue::Text("password".into())),
        ("com.example.vault", PasteboardValue::Marker),
    ]);
    assert!(h.store.is_pasteboard_excluded());
    assert_eq!(h.store.poll(), TickOutcome::Excluded);

    // Same app, but this write carries no marker
    h.pasteboard.write_string("not secret");
    assert!(!h.store.is_pasteboard_excluded());
    assert!(h.store.poll_once());

    let titles: Vec<_> = h.store.clips().unwrap().into_iter().map(|c| c.title).collect();
    assert_eq!(titles, vec!["not secret"]);
}

#[test]
fn test_sleep_wake_skips_writes_made_while_asleep() {
    let h = harness(Preferences::default());

    h.store.system_will_sleep();
    h.pasteboard.write_string("copied before sleep finished");
    assert!(!h.store.poll_once());
    h.store.system_did_wake();
    assert!(!h.store.poll_once());

    h.pasteboard.write_string("after wake");
    assert!(h.store.poll_once());
    assert_eq!(h.store.clips().unwrap().len(), 1);
}

#[test]
fn test_missing_payload_file_reads_as_none() {
    let h = harness(Preferences::default());
    h.pasteboard.write_string("soon gone");
    h.store.poll_once();
    let clip = h.store.clips().unwrap().remove(0);

    std::fs::remove_file(&clip.data_path).unwrap();
    assert!(h.store.clip_content(clip.data_hash.clone()).is_none());
    assert!(h.store.select_clip(clip.data_hash).unwrap().is_none());
}

#[test]
fn test_environment_push_swaps_collaborators() {
    let h = harness(Preferences::default());
    h.pasteboard.write_string("base environment");
    h.store.poll_once();

    let dir = tempfile::tempdir().unwrap();
    let scratch = Environment::in_memory(
        dir.path(),
        Arc::new(MemoryPasteboard::new()),
        Preferences::default(),
        Arc::new(ManualClock::new(0)),
    )
    .unwrap();
    {
        let _guard = h.store.environments().push(scratch);
        assert!(h.store.clips().unwrap().is_empty());
    }
    assert_eq!(h.store.clips().unwrap().len(), 1);
}

#[test]
fn test_store_reopens_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let support = dir.path().to_string_lossy().into_owned();
    let pasteboard = Arc::new(MemoryPasteboard::new());

    {
        let store = ShelfStore::new(support.clone(), pasteboard.clone()).unwrap();
        store.set_max_history_size(3).unwrap();
        pasteboard.write_string("persisted");
        assert!(store.poll_once());
    }

    let reopened = ShelfStore::new(support, pasteboard).unwrap();
    assert_eq!(reopened.max_history_size(), 3);
    let clip = reopened.clips().unwrap().remove(0);
    let content = reopened.clip_content(clip.data_hash).unwrap();
    assert_eq!(content.string_value, "persisted");
}
