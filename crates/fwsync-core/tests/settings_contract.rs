//! Contract Test: System Settings
//!
//! Constraints verified:
//! - Load fetches both the settings and the current public IP
//! - Invalid settings are rejected before the store is called
//! - An IP sync refreshes the current IP afterwards

mod common;

use common::*;
use fwsync_core::config::ManagerConfig;
use fwsync_core::manager::{ManagerEvent, SettingsManager};
use fwsync_core::model::SystemConfig;
use std::sync::Arc;

fn manager(store: Arc<MockSystemStore>) -> (SettingsManager, tokio::sync::mpsc::Receiver<ManagerEvent>) {
    SettingsManager::new(store, &ManagerConfig::default()).expect("manager construction succeeds")
}

#[tokio::test]
async fn load_fetches_config_and_ip() {
    let store = Arc::new(MockSystemStore::new("203.0.113.1"));
    let (mut settings, _rx) = manager(store.clone());

    assert_eq!(settings.current_ip(), None);
    settings.load().await.expect("load succeeds");

    assert_eq!(settings.config(), &SystemConfig::default());
    assert_eq!(settings.current_ip(), Some("203.0.113.1"));
    assert_eq!(store.current_ip_call_count(), 1);
}

#[tokio::test]
async fn invalid_settings_never_reach_store() {
    let store = Arc::new(MockSystemStore::new("203.0.113.1"));
    let (mut settings, _rx) = manager(store.clone());

    for bad in [
        SystemConfig {
            ip_fetch_url: String::new(),
            ..SystemConfig::default()
        },
        SystemConfig {
            ip_fetch_url: "ftp://4.ipw.cn".to_string(),
            ..SystemConfig::default()
        },
        SystemConfig {
            ip_check_interval: 0,
            ..SystemConfig::default()
        },
    ] {
        let err = settings.save(bad).await.expect_err("rejected");
        assert!(err.is_validation());
    }

    assert_eq!(store.save_call_count(), 0);
}

#[tokio::test]
async fn valid_settings_are_saved() {
    let store = Arc::new(MockSystemStore::new("203.0.113.1"));
    let (mut settings, mut rx) = manager(store.clone());

    let config = SystemConfig {
        ip_fetch_url: "http://ip.example.net/plain".to_string(),
        ip_check_interval: 1,
        cron_enabled: false,
    };
    settings.save(config.clone()).await.expect("save succeeds");

    assert_eq!(store.save_call_count(), 1);
    assert_eq!(store.stored_config(), config);
    assert_eq!(settings.config(), &config);
    assert_eq!(rx.try_recv().ok(), Some(ManagerEvent::SettingsSaved));
}

#[tokio::test]
async fn sync_refreshes_current_ip() {
    let store = Arc::new(MockSystemStore::new("203.0.113.1"));
    let (mut settings, mut rx) = manager(store.clone());
    settings.load().await.unwrap();

    let message = settings.sync_ip_now().await.expect("sync succeeds");

    assert_eq!(message, "IP sync completed");
    assert_eq!(store.sync_call_count(), 1);
    assert_eq!(settings.current_ip(), Some("198.51.100.20"));
    assert_eq!(
        drain_events(&mut rx),
        vec![ManagerEvent::IpSynced {
            current_ip: "198.51.100.20".to_string()
        }]
    );
}
