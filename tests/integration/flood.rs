use crate::*;

/// In a triangle every node forwards a query at most once, so the flood
/// dies out after exactly four query hops: A→B, A→C, then one hop out of
/// each of B and C.
#[tokio::test]
async fn test_triangle_flood_forwards_once_per_node() {
    let overlay = Overlay::build(&[("a", "b"), ("b", "c"), ("a", "c")], protocol(5));

    assert!(overlay.node("a").finder.search(&x10()).is_empty());
    overlay.quiesce().await;

    assert_eq!(overlay.hops_of("query"), 4, "hops: {:?}", overlay.hops());
    for id in ["a", "b", "c"] {
        assert_eq!(overlay.node(id).handler.forwarding().len(), 1, "node {id}");
    }

    overlay.shutdown().await;
}

/// Answering is not deduplicated: C replies to every copy of the query it
/// receives, yet A's result set holds the endpoint once.
#[tokio::test]
async fn test_duplicate_answers_merge_idempotently() {
    let overlay = Overlay::build(&[("a", "b"), ("b", "c"), ("a", "c")], protocol(5));
    overlay.node("c").offer("http://c-resource", ResourceDescriptor::new("X", "1.0"));

    overlay.node("a").finder.search(&x10());
    overlay.quiesce().await;

    let from_c = overlay
        .hops()
        .into_iter()
        .filter(|h| h.from == "c" && h.kind == "reply")
        .count();
    assert!(from_c >= 1);
    assert_eq!(from_c, overlay.received("c", "query"));
    assert_eq!(overlay.node("a").found(&x10()), vec!["http://c-resource".to_string()]);

    overlay.shutdown().await;
}

/// With TTL 2 on the chain A-B-C-D, the query reaches C but not D. C still
/// answers the query it received.
#[tokio::test]
async fn test_ttl_bounds_the_flood() {
    let overlay = Overlay::build(&[("a", "b"), ("b", "c"), ("c", "d")], protocol(2));
    overlay.node("c").offer("http://c-resource", ResourceDescriptor::new("X", "1.0"));
    overlay.node("d").offer("http://d-resource", ResourceDescriptor::new("X", "1.0"));

    overlay.node("a").finder.search(&x10());
    overlay.quiesce().await;

    assert_eq!(overlay.received("c", "query"), 1);
    assert_eq!(overlay.received("d", "query"), 0);
    // hop limit reached at C: nothing recorded there
    assert!(overlay.node("c").handler.forwarding().is_empty());
    assert_eq!(overlay.node("a").found(&x10()), vec!["http://c-resource".to_string()]);

    overlay.shutdown().await;
}

/// A search nobody can answer stays pending with no results.
#[tokio::test]
async fn test_unanswered_search_stays_empty() {
    let overlay = Overlay::build(&[("a", "b")], protocol(3));

    assert!(overlay.node("a").finder.search(&x10()).is_empty());
    overlay.quiesce().await;

    assert_eq!(overlay.hops_of("query"), 1);
    assert_eq!(overlay.hops_of("reply"), 0);
    assert!(overlay.node("a").found(&x10()).is_empty());
    assert_eq!(overlay.node("a").handler.searches().len(), 1);

    overlay.shutdown().await;
}
