mod common;

use common::{open_project, setup};
use uplink_bridge::{BridgeError, ErrorKind, HandleKind, Listing, ListingState, Value};
use uplink_runtime::{error_codes, Bucket, NativeError, Object};

#[tokio::test]
async fn cursor_protocol_walks_every_item() {
    let (storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    for i in 0..5 {
        storage.seed_object("bucket", &format!("k{i}"), b"x");
    }

    let iterator = bridge
        .call_async(
            "listObjectsCreate",
            vec![project.into(), "bucket".into(), Value::Undefined],
        )
        .await
        .unwrap();
    let mut keys = Vec::new();
    while bridge
        .call_async("objectIteratorNext", vec![iterator.clone()])
        .await
        .unwrap()
        == Value::Bool(true)
    {
        let item = bridge
            .call_async("objectIteratorItem", vec![iterator.clone()])
            .await
            .unwrap();
        keys.push(item.get("key").and_then(Value::as_str).unwrap().to_string());
    }
    let err = bridge
        .call_async("objectIteratorErr", vec![iterator.clone()])
        .await
        .unwrap();
    let item = bridge
        .call_async("objectIteratorItem", vec![iterator.clone()])
        .await
        .unwrap();
    bridge
        .call_async("freeObjectIterator", vec![iterator.clone()])
        .await
        .unwrap();

    assert_eq!(keys, ["k0", "k1", "k2", "k3", "k4"]);
    assert!(err.is_nullish());
    assert_eq!(item, Value::Null);
    assert!(matches!(
        bridge.call("objectIteratorNext", vec![iterator]).err(),
        Some(BridgeError::InvalidHandle {
            expected: HandleKind::ObjectIterator
        })
    ));
    common::close_project(&bridge, access, project).await;
    assert!(bridge.registry_is_empty());
}

#[tokio::test]
async fn collect_all_frees_the_cursor() {
    let (storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    for i in 0..7 {
        storage.seed_object("bucket", &format!("obj-{i}"), &[0u8; 3]);
    }
    let handles = bridge.open_handles();

    let objects: Vec<Object> = Listing::objects(&bridge, project, "bucket", None)
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    assert_eq!(objects.len(), 7);
    assert!(objects.iter().all(|o| o.system.content_length == 3));
    assert_eq!(bridge.open_handles(), handles);
    common::close_project(&bridge, access, project).await;
}

#[tokio::test]
async fn listing_options_are_honored() {
    let (storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    storage.seed_object("bucket", "logs/1", b"1");
    storage.seed_object("bucket", "logs/2", b"2");
    storage.seed_object("bucket", "top", b"t");

    let options = Value::object([
        ("prefix", Value::from("logs/")),
        ("recursive", Value::Bool(true)),
    ]);
    let objects = Listing::<Object>::open(
        &bridge,
        vec![project.into(), "bucket".into(), options],
    )
    .await
    .unwrap()
    .collect_all()
    .await
    .unwrap();

    let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, ["logs/1", "logs/2"]);
    common::close_project(&bridge, access, project).await;
}

#[tokio::test]
async fn buckets_are_listed() {
    let (_storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    for name in ["alpha", "beta", "gamma"] {
        bridge
            .call_async("createBucket", vec![project.into(), name.into()])
            .await
            .unwrap();
    }

    let buckets: Vec<Bucket> = Listing::buckets(&bridge, project, None)
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    let names: Vec<&str> = buckets.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["alpha", "beta", "gamma"]);
    common::close_project(&bridge, access, project).await;
}

#[tokio::test]
async fn listing_error_is_deferred_to_the_cursor() {
    let (_storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;

    // Creating a listing of a missing bucket succeeds
    let mut listing = Listing::objects(&bridge, project, "missing", None)
        .await
        .unwrap();
    let pending = listing.error().await.unwrap();
    assert_eq!(pending.map(|e| e.kind), Some(ErrorKind::BucketNotFound));

    let err = listing.next().await.unwrap_err();

    assert!(matches!(err, BridgeError::Storage(ref e) if e.kind == ErrorKind::BucketNotFound));
    assert_eq!(listing.state(), ListingState::Errored);
    assert!(matches!(
        listing.next().await,
        Err(BridgeError::Closed { what: "listing", .. })
    ));
    listing.free().await.unwrap();
    listing.free().await.unwrap();
    assert_eq!(listing.state(), ListingState::Freed);
    common::close_project(&bridge, access, project).await;
    assert!(bridge.registry_is_empty());
}

#[tokio::test]
async fn failure_mid_listing_ends_it() {
    let (storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    for i in 0..3 {
        storage.seed_object("bucket", &format!("k{i}"), b"x");
    }
    let mut listing = Listing::objects(&bridge, project, "bucket", None)
        .await
        .unwrap();
    let first = listing.next().await.unwrap().unwrap();
    assert_eq!(first.key, "k0");

    storage.fail_next(
        "iterator_next",
        NativeError::new(error_codes::TOO_MANY_REQUESTS, "throttled"),
    );
    let err = listing.next().await.unwrap_err();

    assert!(matches!(err, BridgeError::Storage(ref e) if e.kind == ErrorKind::TooManyRequests));
    listing.free().await.unwrap();
    common::close_project(&bridge, access, project).await;
    assert!(bridge.registry_is_empty());
}

#[tokio::test]
async fn collect_all_frees_after_an_error() {
    let (_storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    let handles = bridge.open_handles();

    let err = Listing::objects(&bridge, project, "missing", None)
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Storage(ref e) if e.kind == ErrorKind::BucketNotFound));
    assert_eq!(bridge.open_handles(), handles);
    common::close_project(&bridge, access, project).await;
}
