//! Per-session application state

use tracing::{error, info};

use crate::ai::{CopyClient, GenerationError};
use crate::billing::BillingState;
use crate::config::{AppConfig, StoreBackend};
use crate::identity::OperatorPolicy;
use crate::store::{FailoverStore, LocalStore, RemoteStore, StoreError};

/// Everything a command needs, built once at startup
pub struct AppState {
    pub config: AppConfig,
    pub billing: BillingState,
    /// `None` when no API key is configured
    pub generator: Option<CopyClient>,
}

impl AppState {
    /// Open the configured store and generation client
    ///
    /// A store that cannot be opened degrades to simulated metering rather
    /// than failing startup.
    pub fn from_config(config: AppConfig) -> Self {
        let store = match open_store(&config.store) {
            Ok(store) => store,
            Err(e) => {
                error!(backend = config.store.name(), error = %e, "Failed to open account store");
                FailoverStore::simulated()
            }
        };

        let generator = match config.generator_config().map(CopyClient::new) {
            Some(Ok(client)) => {
                info!(model = client.model(), "Ad generation enabled");
                Some(client)
            }
            Some(Err(e)) => {
                error!(error = %e, "Failed to create generation client");
                None
            }
            None => None,
        };

        Self::new(config, store, generator)
    }

    /// Assemble state from parts
    pub fn new(config: AppConfig, store: FailoverStore, generator: Option<CopyClient>) -> Self {
        let operator = OperatorPolicy::new(config.operator_email.as_deref());
        let billing = BillingState::new(store, operator, config.free_limit);
        Self {
            config,
            billing,
            generator,
        }
    }

    /// The generation client, or `Unavailable` when none is configured
    pub fn generator(&self) -> Result<&CopyClient, GenerationError> {
        self.generator.as_ref().ok_or(GenerationError::Unavailable)
    }
}

fn open_store(backend: &StoreBackend) -> Result<FailoverStore, StoreError> {
    let store = match backend {
        StoreBackend::Firestore(config) => FailoverStore::new(Box::new(RemoteStore::new(config.clone())?)),
        StoreBackend::Sqlite(path) => FailoverStore::new(Box::new(LocalStore::open(path)?)),
        StoreBackend::Memory => FailoverStore::simulated(),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_is_simulated() {
        let state = AppState::from_config(AppConfig::default());
        assert!(state.billing.metering.is_simulated());
        assert!(state.generator.is_none());
        assert!(matches!(state.generator(), Err(GenerationError::Unavailable)));
    }

    #[test]
    fn test_sqlite_backend_opens_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            store: StoreBackend::Sqlite(dir.path().join("nested").join("accounts.db")),
            ..Default::default()
        };
        let state = AppState::from_config(config);
        assert!(!state.billing.metering.is_simulated());
        assert_eq!(state.billing.metering.store_backend(), "sqlite");
    }

    #[test]
    fn test_generator_built_from_key() {
        let config = AppConfig {
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let state = AppState::from_config(config);
        assert!(state.generator().is_ok());
    }
}
