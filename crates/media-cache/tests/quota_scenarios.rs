//! End-to-end quota and expiry behavior against the on-disk stores

use media_cache::{
    CacheConfig, CacheSettings, ManualClock, MediaBlob, MediaCacheManager, Priority,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const MB: usize = 1024 * 1024;

fn open_cache() -> (TempDir, MediaCacheManager, Arc<ManualClock>) {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(0));
    let cache = MediaCacheManager::open(CacheSettings {
        cache_dir: dir.path().to_path_buf(),
        namespace: "media-cache-v1".to_string(),
    })
    .with_clock(clock.clone());
    (dir, cache, clock)
}

fn image(megabytes: usize) -> MediaBlob {
    MediaBlob::new(vec![0xAB; megabytes * MB], "image/jpeg")
}

fn ten_mb(priority: Priority) -> CacheConfig {
    CacheConfig::new(10, Duration::from_secs(24 * 60 * 60), priority)
}

#[tokio::test]
async fn low_priority_item_evicted_for_high_priority_write() {
    let (_dir, cache, clock) = open_cache();

    assert!(cache.cache_media("A", image(6), &ten_mb(Priority::Low)).await);
    clock.set(1);
    assert!(cache.cache_media("B", image(5), &ten_mb(Priority::High)).await);

    assert!(cache.get_media("A").await.is_none());
    assert!(cache.get_media("B").await.is_some());
    assert_eq!(cache.stats().await.total_size, 5 * MB as u64);
}

#[tokio::test]
async fn equal_priority_evicts_oldest_first() {
    let (_dir, cache, clock) = open_cache();

    for (t, key) in ["A", "B", "C"].into_iter().enumerate() {
        clock.set(t as i64);
        assert!(cache.cache_media(key, image(4), &ten_mb(Priority::High)).await);
    }

    assert!(cache.get_media("A").await.is_none());
    assert!(cache.get_media("B").await.is_some());
    assert!(cache.get_media("C").await.is_some());
    assert!(cache.stats().await.total_size <= 10 * MB as u64);
}

#[tokio::test]
async fn no_eviction_while_under_quota() {
    let (_dir, cache, clock) = open_cache();
    let keys = ["poster-1", "poster-2", "poster-3", "backdrop-1", "backdrop-2"];

    for (t, key) in keys.iter().enumerate() {
        clock.set(t as i64);
        let priority = if t % 2 == 0 { Priority::Low } else { Priority::High };
        assert!(cache.cache_media(key, image(2), &ten_mb(priority)).await);
    }

    for key in keys {
        assert!(cache.get_media(key).await.is_some(), "{key} should be cached");
    }
    assert_eq!(cache.stats().await.entries, 5);
}

#[tokio::test]
async fn never_evicts_higher_priority_while_lower_remains() {
    let (_dir, cache, clock) = open_cache();

    assert!(cache.cache_media("high-old", image(3), &ten_mb(Priority::High)).await);
    clock.set(10);
    assert!(cache.cache_media("medium", image(3), &ten_mb(Priority::Medium)).await);
    clock.set(20);
    assert!(cache.cache_media("low-new", image(3), &ten_mb(Priority::Low)).await);
    clock.set(30);
    assert!(cache.cache_media("incoming", image(3), &ten_mb(Priority::Medium)).await);

    assert!(cache.get_media("low-new").await.is_none());
    assert!(cache.get_media("high-old").await.is_some());
    assert!(cache.get_media("medium").await.is_some());
    assert!(cache.get_media("incoming").await.is_some());
    assert!(cache.stats().await.total_size <= 10 * MB as u64);
}

#[tokio::test]
async fn rewriting_same_key_keeps_single_record() {
    let (_dir, cache, clock) = open_cache();

    assert!(cache.cache_media("A", image(6), &ten_mb(Priority::Low)).await);
    clock.set(50);
    assert!(cache.cache_media("A", image(6), &ten_mb(Priority::Low)).await);

    let stats = cache.stats().await;
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.total_size, 6 * MB as u64);

    // The refreshed timestamp decides expiry
    clock.set(100);
    assert_eq!(cache.clear_expired_media(Duration::from_millis(60)).await, 0);
    assert!(cache.get_media("A").await.is_some());
}

#[tokio::test]
async fn expiry_sweep_removes_exactly_the_stale_entries() {
    let (_dir, cache, clock) = open_cache();
    let cfg = CacheConfig::new(10, Duration::from_secs(1), Priority::High);

    clock.set(0);
    assert!(cache.cache_media("stale-high", image(1), &cfg).await);
    clock.set(400);
    assert!(
        cache
            .cache_media("boundary", image(1), &cfg.clone().with_priority(Priority::Low))
            .await
    );
    clock.set(900);
    assert!(
        cache
            .cache_media("fresh-low", image(1), &cfg.clone().with_priority(Priority::Low))
            .await
    );

    clock.set(1_400);
    assert_eq!(cache.clear_expired_media(cfg.max_age).await, 1);

    assert!(cache.get_media("stale-high").await.is_none());
    assert!(cache.get_media("boundary").await.is_some());
    assert!(cache.get_media("fresh-low").await.is_some());
}

#[tokio::test]
async fn unknown_and_evicted_keys_read_as_absent() {
    let (_dir, cache, _clock) = open_cache();

    assert!(cache.get_media("never-written").await.is_none());

    assert!(cache.cache_media("gone", image(1), &ten_mb(Priority::Low)).await);
    assert!(cache.clear().await);
    assert!(cache.get_media("gone").await.is_none());
    assert_eq!(cache.stats().await.misses, 2);
}

#[tokio::test]
async fn namespace_bump_invalidates_previous_generation() {
    let dir = tempdir().unwrap();
    let v1 = MediaCacheManager::open(CacheSettings {
        cache_dir: dir.path().to_path_buf(),
        namespace: "media-cache-v1".to_string(),
    });
    assert!(v1.cache_media("poster", image(1), &ten_mb(Priority::High)).await);
    drop(v1);

    let v2 = MediaCacheManager::open(CacheSettings {
        cache_dir: dir.path().to_path_buf(),
        namespace: "media-cache-v2".to_string(),
    });
    assert!(v2.get_media("poster").await.is_none());
    assert_eq!(v2.stats().await.entries, 0);
}
