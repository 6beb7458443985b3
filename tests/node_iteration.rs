use cidrtree::{Af, FrameKind, IpTable, NodeView};

fn drain(t: &mut IpTable<i32>, af: Af) -> Vec<NodeView> {
    t.first_node(af);
    let mut out = Vec::new();
    while let Some(view) = t.next_node() {
        out.push(view);
    }
    out
}

#[test]
fn traversal_when_table_empty_then_only_heads_appear() {
    let mut t: IpTable<i32> = IpTable::new();
    let views = drain(&mut t, Af::V4);

    let kinds: Vec<FrameKind> = views.iter().map(|v| v.kind).collect();
    assert_eq!(kinds, vec![FrameKind::NodeHead, FrameKind::MaskHead]);
}

#[test]
fn traversal_when_heads_pop_then_head_comes_before_mask_head() {
    let mut t: IpTable<i32> = IpTable::new();
    t.set("10.0.0.0/8", 1).expect("set");

    let views = drain(&mut t, Af::V4);
    let head = views
        .iter()
        .position(|v| v.kind == FrameKind::NodeHead)
        .expect("node head");
    let mask_head = views
        .iter()
        .position(|v| v.kind == FrameKind::MaskHead)
        .expect("mask head");
    assert!(head < mask_head);
}

#[test]
fn traversal_when_prefixes_stored_then_every_leaf_is_visited() {
    let mut t = IpTable::new();
    t.set("1.2.3.0/24", 1).expect("set");
    t.set("1.2.3.0/25", 2).expect("set");
    t.set("1.2.128.0/17", 3).expect("set");

    let views = drain(&mut t, Af::V4);
    let mut leaves: Vec<(String, u8)> = views
        .iter()
        .filter(|v| v.kind == FrameKind::Node && v.leaf)
        .map(|v| {
            (
                v.prefix.clone().expect("leaf prefix"),
                v.masklen.expect("leaf masklen"),
            )
        })
        .collect();
    leaves.sort();
    assert_eq!(
        leaves,
        vec![
            ("1.2.128.0".to_string(), 17),
            ("1.2.3.0".to_string(), 24),
            ("1.2.3.0".to_string(), 25),
        ]
    );

    // the mask tree carries one leaf per distinct mask
    let mut mask_leaves: Vec<u8> = views
        .iter()
        .filter(|v| v.kind == FrameKind::MaskNode && v.leaf)
        .map(|v| v.masklen.expect("mask length"))
        .collect();
    mask_leaves.sort();
    assert_eq!(mask_leaves, vec![17, 24, 25]);
}

#[test]
fn traversal_when_masks_lifted_then_mask_refs_appear() {
    let mut t = IpTable::new();
    // sibling keys below a common node force an annotation for the /24
    t.set("1.2.3.0/24", 1).expect("set");
    t.set("1.2.3.0/25", 2).expect("set");
    t.set("1.2.3.128/25", 3).expect("set");

    let views = drain(&mut t, Af::V4);
    let refs: Vec<&NodeView> = views
        .iter()
        .filter(|v| v.kind == FrameKind::MaskRef)
        .collect();
    assert!(!refs.is_empty(), "expected at least one mask reference");
    assert!(refs.iter().all(|v| v.refs == Some(0)));
    assert!(refs.iter().any(|v| v.masklen == Some(24)));
}

#[test]
fn traversal_when_end_marker_chains_exist_then_their_leaves_are_visited() {
    let mut t = IpTable::new();
    t.set("0.0.0.0/0", 1).expect("set");
    t.set("255.255.255.255/32", 2).expect("set");

    let views = drain(&mut t, Af::V4);
    let leaves: Vec<(String, u8)> = views
        .iter()
        .filter(|v| v.kind == FrameKind::Node && v.leaf)
        .map(|v| {
            (
                v.prefix.clone().expect("leaf prefix"),
                v.masklen.expect("leaf masklen"),
            )
        })
        .collect();
    assert!(leaves.contains(&("0.0.0.0".to_string(), 0)));
    assert!(leaves.contains(&("255.255.255.255".to_string(), 32)));
}

#[test]
fn traversal_when_internal_nodes_popped_then_parents_precede_descendants() {
    let mut t = IpTable::new();
    t.set("10.0.0.0/8", 1).expect("set");
    t.set("10.10.0.0/16", 2).expect("set");
    t.set("10.10.10.0/24", 3).expect("set");

    let views = drain(&mut t, Af::V4);
    let node_bits: Vec<i16> = views
        .iter()
        .filter(|v| v.kind == FrameKind::Node && !v.leaf)
        .map(|v| v.bit)
        .collect();
    // internal nodes test higher bits the deeper they sit; popping order
    // follows the left spine here, so bits never decrease
    for w in node_bits.windows(2) {
        assert!(w[0] <= w[1], "descendant popped before parent: {node_bits:?}");
    }
}

#[test]
fn traversal_when_family_switched_then_stack_resets() {
    let mut t = IpTable::new();
    t.set("10.0.0.0/8", 1).expect("set");
    t.set("2001:db8::/32", 2).expect("set");

    t.first_node(Af::V4);
    assert!(t.next_node().is_some());

    // switching families restarts from the other head
    t.first_node(Af::V6);
    let views: Vec<NodeView> = std::iter::from_fn(|| t.next_node()).collect();
    assert_eq!(views.first().map(|v| v.kind), Some(FrameKind::NodeHead));
    assert!(
        views
            .iter()
            .any(|v| v.kind == FrameKind::Node && v.leaf && v.prefix.as_deref() == Some("2001:db8::"))
    );
}
