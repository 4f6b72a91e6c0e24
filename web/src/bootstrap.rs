//! Wires collaborators from [`Config`] into an [`AppState`].

use crate::config::{Config, ImageConfig, NotifierConfig, StorageConfig};
use crate::state::AppState;
use eventday_core::environment::{
    Clock, CodeGenerator, ImageStore, Notifier, RandomCodeGenerator, RecordStore, SystemClock,
};
use eventday_postgres::PostgresRecordStore;
use eventday_providers::{
    CloudinaryConfig, CloudinaryImageStore, ConsoleNotifier, InMemoryRecordStore, SmtpConfig,
    SmtpNotifier, UnconfiguredImageStore,
};
use eventday_runtime::{EngineConfig, EngineEnvironment, LifecycleEngine};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Open the record store: `PostgreSQL` when a URL is configured, memory
/// otherwise. Migrations run on connect.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn record_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    if let Some(url) = &config.database_url {
        let store = PostgresRecordStore::connect_with(url, config.max_connections).await?;
        store.migrate().await?;
        Ok(Arc::new(store))
    } else {
        warn!("DATABASE_URL not set, events are kept in memory only");
        Ok(Arc::new(InMemoryRecordStore::new()))
    }
}

/// Cloudinary when fully configured; otherwise a store whose uploads fail
/// with a remediation hint.
#[must_use]
pub fn image_store(config: &ImageConfig) -> Arc<dyn ImageStore> {
    let Some((cloud, key, secret)) = config.credentials() else {
        warn!("Cloudinary credentials not set, image uploads will fail");
        return Arc::new(UnconfiguredImageStore);
    };
    let settings = CloudinaryConfig::new(cloud, key, secret)
        .with_folder_root(config.folder_root.clone())
        .with_timeout(config.upload_timeout);
    match CloudinaryImageStore::new(settings) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "Cloudinary store unavailable, image uploads will fail");
            Arc::new(UnconfiguredImageStore)
        },
    }
}

/// SMTP when a relay host is configured, console logging otherwise.
///
/// # Errors
///
/// Returns an error if the SMTP transport cannot be built.
pub fn notifier(config: &NotifierConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    let Some(host) = &config.smtp_host else {
        info!("SMTP_HOST not set, OTP codes are logged to the console");
        return Ok(Arc::new(ConsoleNotifier::new()));
    };
    let notifier = SmtpNotifier::new(SmtpConfig {
        host: host.clone(),
        port: config.smtp_port,
        username: config.smtp_username.clone(),
        password: config.smtp_password.clone(),
        from: config.smtp_from.clone(),
        timeout: Duration::from_secs(10),
    })?;
    Ok(Arc::new(notifier))
}

/// Build the engine and handler state.
///
/// # Errors
///
/// Returns an error if a collaborator cannot be constructed.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let store = record_store(&config.storage).await?;
    let images = image_store(&config.images);
    let notifier = notifier(&config.notifier)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let codes: Arc<dyn CodeGenerator> = Arc::new(RandomCodeGenerator);

    let engine = LifecycleEngine::new(
        EngineEnvironment::new(store, images, notifier, clock, codes),
        EngineConfig {
            otp_ttl: config.otp_ttl,
            ..EngineConfig::default()
        },
    );

    if config.vendors.is_empty() {
        warn!("VENDOR_TOKENS not set, every API request will be unauthorized");
    }

    Ok(AppState::new(
        engine,
        config.vendors.clone(),
        config.server.code_exposure(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    #[tokio::test]
    async fn defaults_build_in_memory_state() {
        let state = build_state(&config(&[("OTP_TTL_SECS", "120")])).await.unwrap();
        let env = state.engine.environment();
        assert_eq!(env.store.name(), "memory");
        assert_eq!(env.images.name(), "unconfigured");
        assert_eq!(env.notifier.name(), "console");
        assert_eq!(state.engine.config().otp_ttl, chrono::Duration::minutes(2));
    }

    #[test]
    fn cloudinary_is_used_when_configured() {
        let config = config(&[
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "secret"),
        ]);
        assert_eq!(image_store(&config.images).name(), "cloudinary");
    }
}
