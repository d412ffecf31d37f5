//! Runtime settings.
//!
//! Read from the JSON file named by `NETKEEP_CONFIG` when set, then
//! overridden by `NETKEEP_DATA_DIR`, `NETKEEP_RADIO` and `NETKEEP_BIND`.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use netkeep_core::{OrchestratorConfig, StoreConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    /// JSON description of the simulated air. No networks when unset.
    pub radio_file: Option<PathBuf>,
    pub orchestrator: OrchestratorConfig,
    pub store: StoreConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: PathBuf::from("netkeep-data"),
            radio_file: None,
            orchestrator: OrchestratorConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::resolve(|name| std::env::var(name).ok())
    }

    fn resolve(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut settings = match var("NETKEEP_CONFIG") {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading settings from {}", path))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing settings in {}", path))?
            }
            None => Settings::default(),
        };

        if let Some(dir) = var("NETKEEP_DATA_DIR") {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = var("NETKEEP_RADIO") {
            settings.radio_file = Some(PathBuf::from(path));
        }
        if let Some(bind) = var("NETKEEP_BIND") {
            settings.bind = bind
                .parse()
                .with_context(|| format!("invalid NETKEEP_BIND '{}'", bind))?;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(vars(&[])).unwrap();
        assert_eq!(settings.bind.port(), 8080);
        assert_eq!(settings.orchestrator.attempt_timeout_ms, 15_000);
        assert_eq!(settings.store.namespace, "wifi");
    }

    #[test]
    fn test_file_then_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netkeep.json");
        std::fs::write(
            &path,
            r#"{"bind":"127.0.0.1:9000","orchestrator":{"attemptTimeoutMs":5000}}"#,
        )
        .unwrap();

        let settings = Settings::resolve(vars(&[
            ("NETKEEP_CONFIG", path.display().to_string()),
            ("NETKEEP_DATA_DIR", "/var/lib/netkeep".to_string()),
        ]))
        .unwrap();
        assert_eq!(settings.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(settings.orchestrator.attempt_timeout_ms, 5000);
        assert_eq!(settings.orchestrator.poll_interval_ms, 250);
        assert_eq!(settings.data_dir, PathBuf::from("/var/lib/netkeep"));
    }

    #[test]
    fn test_bad_bind_is_an_error() {
        let result = Settings::resolve(vars(&[("NETKEEP_BIND", "nowhere".to_string())]));
        assert!(result.is_err());
    }
}
