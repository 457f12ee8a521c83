use std::path::{Path, PathBuf};

use fieldwork_core::util::normalize_text_option;
use serde::Serialize;

use crate::config::{default_config_path, normalize_base_url, CliConfig, Settings};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct EffectiveConfig<'a> {
    config_path: String,
    db_path: String,
    api_base_url: Option<&'a str>,
    auth_token: Option<&'static str>,
    sync: &'a fieldwork_core::SyncConfig,
}

/// `config init` against the default config location
pub fn run_config_init_default(
    api_base_url: Option<String>,
    auth_token: Option<String>,
    data_dir: Option<PathBuf>,
) -> Result<(), CliError> {
    let path = default_config_path();
    run_config_init(&path, api_base_url, auth_token, data_dir)?;
    println!("Saved config to {}", path.display());
    Ok(())
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    path: &Path,
    api_base_url: Option<String>,
    auth_token: Option<String>,
    data_dir: Option<PathBuf>,
) -> Result<CliConfig, CliError> {
    let mut config = CliConfig::load_from_path(path).map_err(CliError::Config)?;
    config.version = config.version.max(1);

    if let Some(url) = normalize_text_option(api_base_url) {
        config.api_base_url = Some(normalize_base_url(&url).map_err(CliError::Config)?);
    }
    if let Some(token) = normalize_text_option(auth_token) {
        config.auth_token = Some(token);
    }
    if let Some(dir) = data_dir {
        config.data_dir = Some(dir);
    }
    if config.sync.is_none() {
        config.sync = Some(fieldwork_core::SyncConfig::default());
    }

    config.save_to_path(path).map_err(CliError::Config)?;
    Ok(config)
}

pub fn run_config_show(settings: &Settings, as_json: bool) -> Result<(), CliError> {
    let effective = EffectiveConfig {
        config_path: default_config_path().display().to_string(),
        db_path: settings.db_path().display().to_string(),
        api_base_url: settings.api_base_url.as_deref(),
        auth_token: settings.auth_token.as_ref().map(|_| "[REDACTED]"),
        sync: &settings.sync,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    println!("config:    {}", effective.config_path);
    println!("database:  {}", effective.db_path);
    println!(
        "api:       {}",
        effective.api_base_url.unwrap_or("(not configured)")
    );
    println!("token:     {}", effective.auth_token.unwrap_or("(none)"));
    println!(
        "sync:      every {}s, batch {}, max {} retries, capacity {}",
        settings.sync.sync_interval_secs,
        settings.sync.batch_size,
        settings.sync.max_retries,
        settings.sync.capacity
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_init_merges_with_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cli-config.json");

        run_config_init(
            &path,
            Some("https://api.example.com/".to_string()),
            Some("token-1".to_string()),
            None,
        )
        .unwrap();
        let updated = run_config_init(&path, None, None, Some(PathBuf::from("/data"))).unwrap();

        assert_eq!(updated.api_base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(updated.auth_token.as_deref(), Some("token-1"));
        assert_eq!(updated.data_dir, Some(PathBuf::from("/data")));
        assert_eq!(CliConfig::load_from_path(&path).unwrap(), updated);
    }

    #[test]
    fn config_init_rejects_invalid_url() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cli-config.json");

        let result = run_config_init(&path, Some("ftp://nope".to_string()), None, None);
        assert!(matches!(result, Err(CliError::Config(_))));
        assert!(!path.exists());
    }
}
