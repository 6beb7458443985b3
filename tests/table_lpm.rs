use cidrtree::IpTable;

fn lpm_value(t: &IpTable<i32>, addr: &str) -> Option<i32> {
    t.lpm(addr).expect("parse").map(|(_, v)| *v)
}

fn lsm_value(t: &IpTable<i32>, pfx: &str) -> Option<i32> {
    t.lsm(pfx).expect("parse").map(|(_, v)| *v)
}

#[test]
fn lpm_when_nested_prefixes_then_longest_mask_wins() {
    let mut t = IpTable::new();
    t.set("0.0.0.0/0", 1).expect("set");
    t.set("10.0.0.0/8", 2).expect("set");
    t.set("10.10.0.0/16", 4).expect("set");
    t.set("10.10.10.0/24", 8).expect("set");
    t.set("10.10.10.128/25", 16).expect("set");

    assert_eq!(lpm_value(&t, "10.10.10.129"), Some(16));
    assert_eq!(lpm_value(&t, "10.10.10.1"), Some(8));
    assert_eq!(lpm_value(&t, "10.10.0.1"), Some(4));
    assert_eq!(lpm_value(&t, "10.0.0.1"), Some(2));
    assert_eq!(lpm_value(&t, "11.0.0.0"), Some(1));
}

#[test]
fn lpm_when_no_default_route_then_uncovered_address_misses() {
    let mut t = IpTable::new();
    t.set("10.0.0.0/8", 2).expect("set");

    assert_eq!(lpm_value(&t, "11.0.0.1"), None);
    assert_eq!(lpm_value(&t, "10.200.0.1"), Some(2));
}

#[test]
fn lpm_when_query_carries_mask_then_mask_ignored() {
    let mut t = IpTable::new();
    t.set("10.10.0.0/16", 4).expect("set");

    // lpm is an address lookup; /8 does not widen the search
    assert_eq!(lpm_value(&t, "10.10.10.1/8"), Some(4));
}

#[test]
fn lpm_when_v6_prefixes_then_family_isolated() {
    let mut t = IpTable::new();
    t.set("2001:db8::/32", 1).expect("set");
    t.set("2001:db8:1::/48", 2).expect("set");
    t.set("10.0.0.0/8", 99).expect("v4 stays out of the way");

    assert_eq!(lpm_value(&t, "2001:db8:1::42"), Some(2));
    assert_eq!(lpm_value(&t, "2001:db8:2::42"), Some(1));
    assert_eq!(lpm_value(&t, "2001:db9::1"), None);
}

#[test]
fn lpm_when_only_host_route_then_exact_address_matches() {
    let mut t = IpTable::new();
    t.set("10.10.10.10", 5).expect("host route");

    assert_eq!(lpm_value(&t, "10.10.10.10"), Some(5));
    assert_eq!(lpm_value(&t, "10.10.10.11"), None);
}

#[test]
fn lsm_when_host_query_then_widest_covering_prefix_wins() {
    let mut t = IpTable::new();
    t.set("1.2.3.0/24", 1).expect("set");
    t.set("1.2.3.0/25", 2).expect("set");
    t.set("1.2.3.128/25", 4).expect("set");
    t.set("1.2.3.128/26", 8).expect("set");
    t.set("1.2.3.128/27", 16).expect("set");
    t.set("1.2.3.128/28", 32).expect("set");

    assert_eq!(lsm_value(&t, "1.2.3.128"), Some(1));
    assert_eq!(lsm_value(&t, "1.2.3.4"), Some(1));
}

#[test]
fn lsm_when_query_masked_then_result_mask_no_longer_than_query() {
    let mut t = IpTable::new();
    t.set("1.2.3.0/24", 1).expect("set");
    t.set("1.2.3.0/25", 2).expect("set");
    t.set("1.2.3.128/25", 4).expect("set");
    t.set("1.2.3.128/26", 8).expect("set");

    assert_eq!(lsm_value(&t, "1.2.3.128/25"), Some(1));
    assert_eq!(lsm_value(&t, "1.2.3.0/24"), Some(1));

    // nothing at /23 or wider covers the masked query address
    assert_eq!(lsm_value(&t, "1.2.3.0/23"), None);
    assert_eq!(lsm_value(&t, "1.2.3.4/8"), None);

    // addresses outside every stored block miss
    assert_eq!(lsm_value(&t, "3.2.3.0/24"), None);
    assert_eq!(lsm_value(&t, "3.2.3.4"), None);
}

#[test]
fn lsm_when_default_route_stored_then_it_is_the_floor() {
    let mut t = IpTable::new();
    t.set("0.0.0.0/0", 1).expect("set");
    t.set("1.2.3.0/25", 2).expect("set");
    t.set("1.2.3.128/25", 4).expect("set");

    assert_eq!(lsm_value(&t, "1.2.3.128"), Some(1));
    assert_eq!(lsm_value(&t, "9.9.9.9"), Some(1));
    // the default route is its own least-specific match
    assert_eq!(lsm_value(&t, "0/0"), Some(1));
}

#[test]
fn pair_when_both_halves_stored_then_each_finds_the_other() {
    let mut t = IpTable::new();
    t.set("192.168.1.0/25", 1).expect("set");
    t.set("192.168.1.128/25", 2).expect("set");

    let (p, v) = t
        .pair("192.168.1.0/25")
        .expect("parse")
        .expect("sibling stored");
    assert_eq!((p.to_string().as_str(), *v), ("192.168.1.128/25", 2));

    let (p, v) = t
        .pair("192.168.1.128/25")
        .expect("parse")
        .expect("sibling stored");
    assert_eq!((p.to_string().as_str(), *v), ("192.168.1.0/25", 1));
}

#[test]
fn pair_when_sibling_missing_or_other_length_then_none() {
    let mut t = IpTable::new();
    t.set("192.168.1.0/25", 1).expect("set");

    assert!(t.pair("192.168.1.0/25").expect("parse").is_none());

    // a /26 in the sibling's range does not pair with a /25
    t.set("192.168.1.128/26", 3).expect("set");
    assert!(t.pair("192.168.1.0/25").expect("parse").is_none());

    // the default route has no pair
    t.set("0.0.0.0/0", 9).expect("set");
    assert!(t.pair("0.0.0.0/0").expect("parse").is_none());
}

#[test]
fn pair_when_host_blocks_then_neighbor_address_pairs() {
    let mut t = IpTable::new();
    t.set("10.0.0.4/31", 1).expect("set");
    t.set("10.0.0.6/31", 2).expect("set");
    t.set("10.0.0.4", 10).expect("host");
    t.set("10.0.0.5", 11).expect("host");

    let (p, v) = t.pair("10.0.0.4/32").expect("parse").expect("host pair");
    assert_eq!((p.to_string().as_str(), *v), ("10.0.0.5/32", 11));

    let (p, v) = t.pair("10.0.0.4/31").expect("parse").expect("sibling /31");
    assert_eq!((p.to_string().as_str(), *v), ("10.0.0.6/31", 2));
}
