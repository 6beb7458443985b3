use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cidrtree::{Af, Error, IpTable};

fn filled() -> IpTable<i32> {
    let mut t = IpTable::new();
    t.set("0.0.0.0/0", 1).expect("set");
    t.set("10.0.0.0/8", 2).expect("set");
    t.set("10.10.0.0/16", 4).expect("set");
    t.set("10.10.10.0/24", 8).expect("set");
    t.set("10.10.10.128/25", 16).expect("set");
    t
}

#[test]
fn session_when_delete_mid_walk_then_soft_and_lookups_skip_it() {
    let mut t = filled();

    let mut seen = Vec::new();
    {
        let mut s = t.walk_session(Af::V4);
        let first = s.next_prefix().expect("first leaf");
        assert_eq!(first.prefix.to_string(), "0.0.0.0/0");

        s.delete("10.10.10.0/24").expect("soft delete mid-walk");

        // lookups treat the flagged leaf as absent
        assert_eq!(s.get("10.10.10.0/24").expect("get"), None);
        let (p, v) = s.lpm("10.10.10.1").expect("lpm").expect("fallback");
        assert_eq!((p.to_string().as_str(), *v), ("10.10.0.0/16", 4));

        // the walk still visits the flagged leaf, marked
        while let Some(leaf) = s.next_prefix() {
            seen.push((leaf.prefix.to_string(), leaf.deleted));
        }
    }

    assert!(
        seen.contains(&("10.10.10.0/24".to_string(), true)),
        "soft-deleted leaf should stay visible to the walk: {seen:?}"
    );
    assert_eq!(t.count_v4(), 4);
}

#[test]
fn session_when_deleting_twice_then_second_is_not_found() {
    let mut t = filled();
    let mut s = t.walk_session(Af::V4);

    s.delete("10.10.10.0/24").expect("first delete");
    match s.delete("10.10.10.0/24") {
        Err(Error::NotFound { .. }) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn table_when_soft_deleted_entry_reset_then_reactivated_with_new_value() {
    let mut t = filled();
    {
        let mut s = t.walk_session(Af::V4);
        s.delete("10.10.10.0/24").expect("soft delete");
    }
    assert_eq!(t.count_v4(), 4);

    t.set("10.10.10.0/24", 80).expect("resurrect");
    assert_eq!(t.count_v4(), 5);
    assert_eq!(t.get("10.10.10.0/24").expect("get"), Some(&80));
    let (p, v) = t.lpm("10.10.10.1").expect("lpm").expect("hit");
    assert_eq!((p.to_string().as_str(), *v), ("10.10.10.0/24", 80));
}

#[test]
fn table_when_sweep_after_session_then_flagged_leaves_collected() {
    let mut t = filled();
    {
        let mut s = t.walk_session(Af::V4);
        s.delete("10.10.10.0/24").expect("soft delete");
        s.delete("10.0.0.0/8").expect("soft delete");
    }
    assert_eq!(t.count_v4(), 3);

    let collected = t.sweep().expect("sweep");
    assert_eq!(collected, 2);
    assert_eq!(t.count_v4(), 3);
    assert_eq!(t.get("10.10.10.0/24").expect("get"), None);

    // nothing left to collect
    assert_eq!(t.sweep().expect("sweep again"), 0);

    // enumeration no longer sees the collected leaves
    let all: Vec<String> = t.prefixes(Af::V4).map(|(p, _)| p.to_string()).collect();
    assert_eq!(all, vec!["0.0.0.0/0", "10.10.0.0/16", "10.10.10.128/25"]);
}

#[test]
fn table_when_hard_delete_hits_flagged_leaf_then_collected_but_not_found() {
    let mut t = filled();
    {
        let mut s = t.walk_session(Af::V4);
        s.delete("10.10.10.0/24").expect("soft delete");
    }

    // logically absent, so delete reports NotFound while collecting the cell
    match t.delete("10.10.10.0/24") {
        Err(Error::NotFound { .. }) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert_eq!(t.count_v4(), 4);
    assert_eq!(t.sweep().expect("sweep"), 0);
}

#[test]
fn session_when_soft_delete_then_value_purged_immediately() {
    let purged = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&purged);
    let mut t: IpTable<i32> = IpTable::with_purge(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    t.set("10.0.0.0/8", 1).expect("set");
    t.set("10.10.0.0/16", 2).expect("set");

    {
        let mut s = t.walk_session(Af::V4);
        s.delete("10.10.0.0/16").expect("soft delete");
        assert_eq!(purged.load(Ordering::SeqCst), 1);
    }

    // collection later must not purge again
    t.sweep().expect("sweep");
    assert_eq!(purged.load(Ordering::SeqCst), 1);

    drop(t);
    assert_eq!(purged.load(Ordering::SeqCst), 2);
}

#[test]
fn session_when_inserting_mid_walk_then_entry_lands() {
    let mut t = filled();
    {
        let mut s = t.walk_session(Af::V4);
        let _ = s.next_prefix();
        s.set("172.16.0.0/12", 99).expect("insert mid-walk");
        assert_eq!(s.get("172.16.0.0/12").expect("get"), Some(&99));
    }
    assert_eq!(t.count_v4(), 6);
    assert_eq!(t.get("172.16.0.0/12").expect("get"), Some(&99));
}

#[test]
fn lpm_when_most_specific_flagged_then_next_wider_wins() {
    let mut t = filled();
    {
        let mut s = t.walk_session(Af::V4);
        s.delete("10.10.10.128/25").expect("soft delete");

        let (p, v) = s.lpm("10.10.10.129").expect("lpm").expect("fallback");
        assert_eq!((p.to_string().as_str(), *v), ("10.10.10.0/24", 8));
    }
}
