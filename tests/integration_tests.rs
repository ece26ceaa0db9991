//! tiercache Integration Tests
//!
//! End-to-end flows through the public API:
//! - Feature 1: Backend discovery and binding
//! - Feature 2: Two-tier read/write path over a real backend
//! - Feature 3: Activation policy

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use tiercache::cache::{
    ActivationContext, BackendSelector, CacheConfig, CacheFacade, Clock, Expiry, ManualClock,
    ProcessTier,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Product {
    id: u64,
    name: String,
    tags: Vec<String>,
}

fn product() -> Product {
    Product {
        id: 7,
        name: "Lampe « Été »".into(),
        tags: vec!["light".into(), "summer".into()],
    }
}

// =============================================================================
// Feature 1: Backend Discovery
// =============================================================================

mod discovery_tests {
    use super::*;

    #[tokio::test]
    async fn test_yaml_config_drives_selection() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "namespace:\n  site: shop\n  stage: test\nbackends:\n  file_dir: {}\n",
            dir.path().display()
        );
        let config = CacheConfig::from_yaml_str(&yaml).unwrap();
        let selector = BackendSelector::from_config(&config);

        let facade = CacheFacade::builder()
            .config(config)
            .build_with_selector(&selector)
            .await;

        assert!(facade.is_ready());
        assert_eq!(facade.backend_name(), Some("file"));
        assert_eq!(facade.prefix(), "shop_test_");
    }

    #[tokio::test]
    async fn test_facades_share_one_selection() {
        let selector = BackendSelector::from_config(&CacheConfig::default());

        let first = CacheFacade::builder().build_with_selector(&selector).await;
        let second = CacheFacade::builder().build_with_selector(&selector).await;

        assert_eq!(first.backend_name(), Some("memory"));
        assert_eq!(second.backend_name(), Some("memory"));

        first.set("k", "shared", Expiry::Never).await.unwrap();
        let value: Option<String> = second.get("k").await.unwrap();
        assert_eq!(value.as_deref(), Some("shared"));
    }

    #[tokio::test]
    async fn test_empty_selector_leaves_facade_unready() {
        let selector = BackendSelector::new(Vec::new());
        let facade = CacheFacade::builder().build_with_selector(&selector).await;

        assert!(!facade.is_ready());
        assert!(!facade.set("k", &1, Expiry::Never).await.unwrap());
        assert_eq!(facade.get::<i32>("k").await.unwrap(), None);
    }
}

// =============================================================================
// Feature 2: Two-Tier Read/Write Path
// =============================================================================

mod facade_tests {
    use super::*;

    async fn file_facade(
        dir: &std::path::Path,
        clock: Arc<ManualClock>,
        tier: Arc<ProcessTier>,
    ) -> CacheFacade {
        let mut config = CacheConfig::default();
        config.backends.file_dir = Some(dir.to_path_buf());
        config.prefix = Some("it:".into());
        let selector = BackendSelector::from_config_with_clock(&config, clock.clone());

        CacheFacade::builder()
            .config(config)
            .clock(clock)
            .tier(tier)
            .build_with_selector(&selector)
            .await
    }

    #[tokio::test]
    async fn test_struct_round_trip_and_promotion() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let facade = file_facade(dir.path(), clock(), Arc::new(ProcessTier::new())).await;

        assert!(facade
            .set("product/7", &product(), Expiry::Seconds(300))
            .await
            .unwrap());

        for _ in 0..4 {
            let cached: Option<Product> = facade.get("product/7").await.unwrap();
            assert_eq!(cached, Some(product()));
        }

        let metrics = facade.metrics();
        assert_eq!(metrics.backend_hits, 3);
        assert_eq!(metrics.tier_hits, 1);
        assert_eq!(metrics.promotions, 1);
        assert_eq!(facade.tier().promoted_len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_applies_to_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        let facade = file_facade(dir.path(), clock.clone(), Arc::new(ProcessTier::new())).await;

        facade.set("k", "v", Expiry::Seconds(1)).await.unwrap();
        let _: Option<String> = facade.get_with_threshold("k", 1).await.unwrap();
        assert!(facade.exists("k").await);

        clock.advance(Duration::seconds(2));
        assert!(!facade.exists("k").await);
        assert_eq!(facade.get::<String>("k").await.unwrap(), None);
        assert!(facade.tier().is_empty());
    }

    #[tokio::test]
    async fn test_set_at_date() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        let facade = file_facade(dir.path(), clock.clone(), Arc::new(ProcessTier::new())).await;

        let at = clock.now() + Duration::minutes(5);
        assert!(facade.set_at_date("k", &product(), at).await.unwrap());
        assert!(facade
            .set_at_date("k", &product(), clock.now() - Duration::minutes(5))
            .await
            .is_err());

        clock.advance(Duration::minutes(4));
        assert_eq!(facade.get::<Product>("k").await.unwrap(), Some(product()));
        clock.advance(Duration::minutes(2));
        assert_eq!(facade.get::<Product>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shared_tier_sees_promotion_from_other_facade() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        let tier = Arc::new(ProcessTier::new());
        let writer = file_facade(dir.path(), clock.clone(), tier.clone()).await;
        let reader = file_facade(dir.path(), clock.clone(), tier.clone()).await;

        writer.set("k", &1u32, Expiry::Never).await.unwrap();
        let _: Option<u32> = writer.get_with_threshold("k", 1).await.unwrap();

        let value: Option<u32> = reader.get("k").await.unwrap();
        assert_eq!(value, Some(1));
        assert_eq!(reader.metrics().tier_hits, 1);
        assert_eq!(reader.metrics().backend_hits, 0);

        writer.set("k", &2u32, Expiry::Never).await.unwrap();
        assert_eq!(reader.get::<u32>("k").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_remove_and_remove_all() {
        let dir = tempfile::tempdir().unwrap();
        let facade = file_facade(dir.path(), clock(), Arc::new(ProcessTier::new())).await;

        for key in ["a", "b", "c"] {
            facade.set(key, key, Expiry::Never).await.unwrap();
        }
        assert!(facade.remove("a").await);
        assert!(!facade.exists("a").await);
        assert!(facade.exists("b").await);

        assert!(facade.remove_all().await);
        assert!(!facade.exists("b").await);
        assert!(!facade.exists("c").await);
    }

    #[tokio::test]
    async fn test_get_or_set_with_populates_backend() {
        let dir = tempfile::tempdir().unwrap();
        let facade = file_facade(dir.path(), clock(), Arc::new(ProcessTier::new())).await;

        let value = facade
            .get_or_set_with("computed", Expiry::Seconds(60), || async { Ok(product()) })
            .await
            .unwrap();
        assert_eq!(value, product());
        assert!(facade.exists("computed").await);
    }
}

// =============================================================================
// Feature 3: Activation Policy
// =============================================================================

mod activation_tests {
    use super::*;

    #[tokio::test]
    async fn test_developer_requests_bypass_cache() {
        let config = CacheConfig {
            disable_for_developers: true,
            ..Default::default()
        };
        let selector = BackendSelector::from_config(&config);
        let local = ActivationContext {
            remote_addr: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            ..Default::default()
        };

        let facade = CacheFacade::builder()
            .config(config)
            .activation(local)
            .build_with_selector(&selector)
            .await;

        assert!(facade.is_ready());
        assert!(!facade.is_active());
        assert!(!facade.set("k", "v", Expiry::Never).await.unwrap());
        assert!(!facade.exists("k").await);
    }

    #[tokio::test]
    async fn test_override_enables_disabled_cache() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let selector = BackendSelector::from_config(&config);
        let facade = CacheFacade::builder()
            .config(config)
            .activation(ActivationContext {
                test_override: Some(true),
                ..Default::default()
            })
            .build_with_selector(&selector)
            .await;

        assert!(facade.is_active());
        assert!(facade.set("k", "v", Expiry::Never).await.unwrap());
        assert_eq!(facade.get::<String>("k").await.unwrap().as_deref(), Some("v"));
    }
}
