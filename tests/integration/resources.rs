use std::collections::HashSet;

use finder_services::{Detection, ResourceCacheUpdater, ResourceProbe};

use crate::*;

/// Compute endpoints whose answers the test controls.
#[derive(Clone, Default)]
struct FakeCompute {
    online: Arc<Mutex<HashMap<String, Vec<ResourceDescriptor>>>>,
}

#[async_trait]
impl ResourceProbe for FakeCompute {
    async fn try_get_resources(&self, endpoint: &str) -> Result<Detection, TransportError> {
        let listed = self.online.lock().unwrap().get(endpoint).cloned();
        match listed {
            Some(resources) => Ok(Detection {
                resources: resources.into_iter().collect::<HashSet<_>>(),
                detected_at_ms: finder_services::now_ms(),
            }),
            None => Err(TransportError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: "offline".into(),
            }),
        }
    }
}

/// Resources discovered by C's poller become searchable from A; once the
/// compute endpoint goes away for long enough, new searches miss it.
#[tokio::test]
async fn test_polled_resources_are_found_and_evicted() {
    let overlay = Overlay::build(&[("a", "b"), ("b", "c")], protocol(3));
    let compute = FakeCompute::default();
    compute
        .online
        .lock()
        .unwrap()
        .insert("http://gpu-1".into(), vec![ResourceDescriptor::new("X", "1.0")]);

    let updater = ResourceCacheUpdater::new(
        overlay.node("c").handler.resources().clone(),
        Arc::new(compute.clone()),
        vec!["http://gpu-1".into()],
        2,
    );
    let summary = updater.refresh_all().await.unwrap();
    assert_eq!(summary.detected, 1);

    let a = overlay.node("a");
    a.finder.search(&x10());
    eventually(Duration::from_secs(2), || a.found(&x10()) == vec!["http://gpu-1".to_string()])
        .await
        .unwrap();

    compute.online.lock().unwrap().clear();
    updater.refresh_all().await;
    assert_eq!(overlay.node("c").handler.resources().len(), 1);
    let summary = updater.refresh_all().await.unwrap();
    assert_eq!(summary.evicted, 1);
    assert!(overlay.node("c").handler.resources().is_empty());

    // a fresh search from B (no in-flight entry there) finds nothing
    let b = overlay.node("b");
    assert!(b.finder.search(&x10()).is_empty());
    overlay.quiesce().await;
    assert!(b.found(&x10()).is_empty());

    overlay.shutdown().await;
}
