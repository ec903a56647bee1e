//! Pensebête Agent - headless sync client.
//!
//! Keeps the local pending queue flowing to the remote store and logs
//! reminder notifications as they come due.

use async_trait::async_trait;
use pensebete_engine::{Notice, Permission, PlatformSupport};
use pensebete_sync::{
    Config, DeliveryError, FileStorage, HttpRemoteStore, NotificationPlatform, ServiceDeps,
    SyncService, SystemClock,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Notifications written to the log.
struct LogPlatform;

#[async_trait]
impl NotificationPlatform for LogPlatform {
    fn support(&self) -> PlatformSupport {
        PlatformSupport {
            supported: true,
            installed: true,
            install_required: false,
        }
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn request_permission(&self) -> Result<Permission, DeliveryError> {
        Ok(Permission::Granted)
    }

    async fn show(&self, notice: &Notice) -> Result<(), DeliveryError> {
        tracing::info!(tag = %notice.tag, "{}: {}", notice.title, notice.body);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pensebete_sync=debug,pensebete_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        "Starting Pensebête agent for {} against {}",
        config.user_id,
        config.remote_url
    );

    let storage = Arc::new(FileStorage::open(config.data_dir.clone()).await?);
    let remote = Arc::new(HttpRemoteStore::new(
        config.remote_url.clone(),
        config.user_id.clone(),
        config.request_timeout,
    )?);

    let deps = ServiceDeps {
        storage,
        tables: remote.clone(),
        reminders: remote.clone(),
        platform: Arc::new(LogPlatform),
        probe: Some(remote),
        clock: Arc::new(SystemClock),
    };
    let service = SyncService::start(deps, config.service_settings()).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    service.shutdown().await;

    Ok(())
}
