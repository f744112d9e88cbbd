//! Concurrency tests for the reservation engine.
//!
//! The contended resource is a single product's stock counter; these tests
//! hammer it from many tasks and assert the ledger invariants hold.

use common::{OrderId, ProductId};
use inventory::{InventoryError, ReservationEngine, ReservationService};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_reserves_never_oversell() {
    let engine = ReservationEngine::new();
    let sku = ProductId::new("SKU-HOT");
    engine.register_product(sku.clone(), 50).await.unwrap();

    // 100 tasks each try to take one unit; only 50 can win.
    let mut handles = Vec::new();
    for _ in 0..100 {
        let engine = engine.clone();
        let sku = sku.clone();
        handles.push(tokio::spawn(async move {
            engine.reserve(&sku, 1, OrderId::new()).await
        }));
    }

    let mut successes = 0;
    let mut rejections = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(InventoryError::InsufficientStock { .. }) => rejections += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 50);
    assert_eq!(rejections, 50);

    let level = engine.stock(&sku).await.unwrap();
    assert_eq!(level.available, 0);
    assert_eq!(level.reserved, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_checkouts_race_for_five_units() {
    // stock=5, two concurrent checkouts each want 3: exactly one wins.
    let engine = ReservationEngine::new();
    let sku = ProductId::new("SKU-001");
    engine.register_product(sku.clone(), 5).await.unwrap();

    let a = {
        let engine = engine.clone();
        let sku = sku.clone();
        tokio::spawn(async move { engine.reserve(&sku, 3, OrderId::new()).await })
    };
    let b = {
        let engine = engine.clone();
        let sku = sku.clone();
        tokio::spawn(async move { engine.reserve(&sku, 3, OrderId::new()).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one of the two racing reserves may win");

    let level = engine.stock(&sku).await.unwrap();
    assert_eq!(level.available, 2);
    assert_eq!(level.reserved, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn products_are_serialized_independently() {
    let engine = ReservationEngine::new();
    for i in 0..4 {
        engine
            .register_product(ProductId::new(format!("SKU-{i:03}")), 25)
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..4 {
        for _ in 0..25 {
            let engine = engine.clone();
            let sku = ProductId::new(format!("SKU-{i:03}"));
            handles.push(tokio::spawn(async move {
                engine.reserve(&sku, 1, OrderId::new()).await
            }));
        }
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for i in 0..4 {
        let level = engine.stock(&ProductId::new(format!("SKU-{i:03}"))).await.unwrap();
        assert_eq!(level.available, 0);
        assert_eq!(level.reserved, 25);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn racing_confirm_and_release_resolve_exactly_once() {
    // A confirm and a release racing for the same reservation: whichever
    // loses gets the terminal-state error, and the counters reflect exactly
    // one resolution.
    for _ in 0..20 {
        let engine = ReservationEngine::new();
        let sku = ProductId::new("SKU-001");
        engine.register_product(sku.clone(), 10).await.unwrap();
        let id = engine.reserve(&sku, 4, OrderId::new()).await.unwrap();

        let confirm = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.confirm(id).await })
        };
        let release = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.release(id).await })
        };

        let confirmed = confirm.await.unwrap().is_ok();
        let released = release.await.unwrap().is_ok();
        assert!(confirmed ^ released, "exactly one resolution must win");

        let level = engine.stock(&sku).await.unwrap();
        if confirmed {
            assert_eq!((level.available, level.reserved), (6, 0));
        } else {
            assert_eq!((level.available, level.reserved), (10, 0));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn reserve_release_churn_preserves_totals() {
    let engine = ReservationEngine::new();
    let sku = ProductId::new("SKU-001");
    engine.register_product(sku.clone(), 20).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let engine = engine.clone();
        let sku = sku.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..10 {
                if let Ok(id) = engine.reserve(&sku, 2, OrderId::new()).await {
                    engine.release(id).await.unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Every hold was released, so the full quantity is back.
    let level = engine.stock(&sku).await.unwrap();
    assert_eq!(level.available, 20);
    assert_eq!(level.reserved, 0);
}
