//! Runtime configuration from the environment

use std::path::PathBuf;

use tracing::warn;

use crate::ai::{CredentialManager, GeneratorConfig, OPENAI_PROVIDER};
use crate::store::{FirestoreConfig, LocalStore};

/// Free-tier generations allowed when `DEFAULT_FREE_LIMIT` is unset
pub const DEFAULT_FREE_LIMIT: u32 = 3;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Which account store backs metering
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Firestore(FirestoreConfig),
    Sqlite(PathBuf),
    /// Simulated mode: nothing outlives the process
    Memory,
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Firestore(_) => "firestore",
            Self::Sqlite(_) => "sqlite",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub free_limit: u32,
    pub operator_email: Option<String>,
    pub store: StoreBackend,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            free_limit: DEFAULT_FREE_LIMIT,
            operator_email: None,
            store: StoreBackend::Memory,
        }
    }
}

impl AppConfig {
    /// Read configuration from process environment, then the keychain for
    /// a missing API key
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|name| std::env::var(name).ok());
        if config.openai_api_key.is_none() {
            config.openai_api_key = CredentialManager::get_api_key(OPENAI_PROVIDER).ok();
        }
        config
    }

    /// Build configuration from an arbitrary variable lookup. Blank values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let free_limit = match var("DEFAULT_FREE_LIMIT") {
            Some(raw) => raw.parse::<u32>().unwrap_or_else(|_| {
                warn!(value = %raw, default = DEFAULT_FREE_LIMIT, "Invalid DEFAULT_FREE_LIMIT, using default");
                DEFAULT_FREE_LIMIT
            }),
            None => DEFAULT_FREE_LIMIT,
        };

        let project_id = var("FIRESTORE_PROJECT_ID");
        let requested = var("ANUNCIA_STORE").map(|s| s.to_lowercase());
        let backend = requested.as_deref().unwrap_or(if project_id.is_some() {
            "firestore"
        } else {
            "sqlite"
        });

        let store = match backend {
            "firestore" => match project_id {
                Some(project_id) => {
                    let mut firestore = FirestoreConfig {
                        project_id,
                        access_token: var("FIRESTORE_ACCESS_TOKEN"),
                        api_key: var("FIRESTORE_API_KEY"),
                        ..Default::default()
                    };
                    if let Some(base_url) = var("FIRESTORE_BASE_URL") {
                        firestore.base_url = base_url;
                    }
                    StoreBackend::Firestore(firestore)
                }
                None => {
                    warn!("ANUNCIA_STORE=firestore but FIRESTORE_PROJECT_ID is not set, metering is simulated");
                    StoreBackend::Memory
                }
            },
            "sqlite" => match var("ANUNCIA_DB_PATH")
                .map(PathBuf::from)
                .or_else(LocalStore::default_path)
            {
                Some(path) => StoreBackend::Sqlite(path),
                None => {
                    warn!("No config directory for the account database, metering is simulated");
                    StoreBackend::Memory
                }
            },
            "memory" => StoreBackend::Memory,
            other => {
                warn!(value = %other, "Unknown ANUNCIA_STORE, metering is simulated");
                StoreBackend::Memory
            }
        };

        Self {
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            free_limit,
            operator_email: var("OPERATOR_EMAIL"),
            store,
        }
    }

    /// Generator settings, or `None` when no API key is available
    pub fn generator_config(&self) -> Option<GeneratorConfig> {
        let api_key = self.openai_api_key.clone()?;
        Some(GeneratorConfig {
            api_key,
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
            ..Default::default()
        })
    }
}
