use crate::*;

/// A (ttl 3) → B → C. Only C has X-1.0; the reply retraces C → B → A and
/// lands in A's search cache.
#[tokio::test]
async fn test_reply_retraces_chain_to_origin() {
    let overlay = Overlay::build(&[("a", "b"), ("b", "c")], protocol(3));
    overlay.node("c").offer("http://c-resource", ResourceDescriptor::new("X", "1.0"));

    let a = overlay.node("a");
    assert!(a.finder.search(&x10()).is_empty(), "nothing known locally yet");

    eventually(Duration::from_secs(2), || a.found(&x10()) == vec!["http://c-resource".to_string()])
        .await
        .unwrap();

    // the intermediate node only relays
    assert!(overlay.node("b").handler.searches().is_empty());
    assert_eq!(overlay.received("b", "reply"), 1);
    assert_eq!(overlay.received("a", "reply"), 1);

    // asking again reuses the in-flight search
    assert_eq!(a.finder.search(&x10()), vec!["http://c-resource".to_string()]);
    overlay.quiesce().await;
    assert_eq!(overlay.received("b", "query"), 1);

    overlay.shutdown().await;
}

/// Local matches are returned at once, merged with remote ones.
#[tokio::test]
async fn test_local_and_remote_results_merge() {
    let overlay = Overlay::build(&[("a", "b")], protocol(3));
    overlay.node("a").offer("http://a-resource", ResourceDescriptor::new("X", "1.0"));
    overlay.node("b").offer("http://b-resource", ResourceDescriptor::new("X", "1.0"));

    let a = overlay.node("a");
    assert_eq!(a.finder.search(&x10()), vec!["http://a-resource".to_string()]);

    eventually(Duration::from_secs(2), || !a.found(&x10()).is_empty())
        .await
        .unwrap();
    assert_eq!(
        a.finder.search(&x10()),
        vec!["http://a-resource".to_string(), "http://b-resource".to_string()]
    );

    overlay.shutdown().await;
}

/// Messages claiming to come from a node that is not a neighbor are refused.
#[tokio::test]
async fn test_unknown_sender_dropped() {
    let overlay = Overlay::build(&[("a", "b")], protocol(3));
    let b = overlay.node("b");

    let q = QueryMessage::originate(finder_core::MessageId::generate(), 3, x10());
    assert!(!b.gateway.query(NodeId::from("mallory"), q.clone()));
    assert!(b.gateway.query(NodeId::from("a"), q));

    overlay.quiesce().await;
    assert_eq!(b.handler.forwarding().len(), 1);

    overlay.shutdown().await;
}
