use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use keyring::Entry;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

const SERVICE_NAME: &str = "app.anuncia.cli";

/// Keychain account name for the generation API key
pub const OPENAI_PROVIDER: &str = "openai";

/// Credential manager using the OS keychain with file fallback for development
pub struct CredentialManager;

impl CredentialManager {
    /// Get the fallback file path for storing credentials (dev mode only)
    #[cfg(debug_assertions)]
    fn get_fallback_path(provider: &str) -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("anuncia").join(format!("{}_key", provider)))
    }

    /// Store an API key in the keychain (with file fallback in dev mode)
    pub fn store_api_key(provider: &str, api_key: &str) -> Result<(), String> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err("API key is empty".to_string());
        }

        match Entry::new(SERVICE_NAME, provider) {
            Ok(entry) => match entry.set_password(api_key) {
                Ok(()) => {
                    debug!(provider, "Stored API key in keychain");
                    return Ok(());
                }
                Err(e) => warn!(provider, error = %e, "Keychain write failed"),
            },
            Err(e) => warn!(error = %e, "Keychain unavailable"),
        }

        #[cfg(debug_assertions)]
        {
            let path = Self::get_fallback_path(provider)
                .ok_or_else(|| "Could not determine config directory".to_string())?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create config directory: {}", e))?;
            }

            // base64 only keeps the key out of casual greps
            fs::write(&path, BASE64.encode(api_key))
                .map_err(|e| format!("Failed to write API key: {}", e))?;

            warn!(path = %path.display(), "DEV MODE: stored API key in file");
            Ok(())
        }

        #[cfg(not(debug_assertions))]
        Err("Secure credential storage (keychain) unavailable".to_string())
    }

    /// Get an API key from the keychain (with file fallback in dev mode)
    pub fn get_api_key(provider: &str) -> Result<String, String> {
        if let Ok(entry) = Entry::new(SERVICE_NAME, provider) {
            if let Ok(password) = entry.get_password() {
                debug!(provider, "Retrieved API key from keychain");
                return Ok(password);
            }
        }

        #[cfg(debug_assertions)]
        {
            if let Some(path) = Self::get_fallback_path(provider) {
                if path.exists() {
                    let encoded = fs::read_to_string(&path)
                        .map_err(|e| format!("Failed to read API key: {}", e))?;
                    let decoded = decode_key(&encoded)?;
                    debug!(path = %path.display(), "DEV MODE: retrieved API key from file");
                    return Ok(decoded);
                }
            }
        }

        Err("API key not found".to_string())
    }

    /// Delete an API key from the keychain and file storage
    pub fn delete_api_key(provider: &str) -> Result<(), String> {
        if let Ok(entry) = Entry::new(SERVICE_NAME, provider) {
            if entry.delete_credential().is_ok() {
                debug!(provider, "Deleted API key from keychain");
            }
        }

        #[cfg(debug_assertions)]
        {
            if let Some(path) = Self::get_fallback_path(provider) {
                if path.exists() {
                    fs::remove_file(&path)
                        .map_err(|e| format!("Failed to delete API key file: {}", e))?;
                    debug!(path = %path.display(), "DEV MODE: deleted API key file");
                }
            }
        }

        Ok(())
    }
}

#[cfg_attr(not(debug_assertions), allow(dead_code))]
fn decode_key(encoded: &str) -> Result<String, String> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| format!("Invalid base64: {}", e))?;
    String::from_utf8(bytes).map_err(|e| format!("Invalid UTF-8: {}", e))
}
