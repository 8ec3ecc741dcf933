use std::env;
use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

const DEFAULT_CONFIG_DIR: &str = "/models/";

/// Runtime settings, resolved once at startup and passed down
/// explicitly. Nothing below `main` reads the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding `default.json`.
    pub config_dir: PathBuf,
    /// SQLite database for cluster metadata.
    pub metadata_db: PathBuf,
    pub cluster_id: Option<String>,
    pub gce_metadata_host: Option<String>,
    pub api_key: Option<String>,
}

/// Optional `config.toml` in the platform config directory.
#[derive(Debug, Deserialize, Default)]
struct FileSettings {
    config_dir: Option<PathBuf>,
    metadata_db: Option<PathBuf>,
    cluster_id: Option<String>,
    api_key: Option<String>,
}

fn default_metadata_db() -> PathBuf {
    ProjectDirs::from("", "", "cloudcost")
        .map(|d| d.data_dir().join("clusters.db"))
        .unwrap_or_else(|| PathBuf::from("clusters.db"))
}

fn load_file_settings() -> FileSettings {
    let Some(dirs) = ProjectDirs::from("", "", "cloudcost") else {
        return FileSettings::default();
    };

    let path = dirs.config_dir().join("config.toml");
    let Ok(data) = fs::read_to_string(&path) else {
        return FileSettings::default();
    };

    match toml::from_str(&data) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid config, ignoring");
            FileSettings::default()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl Settings {
    /// Config file first, then `CONFIG_PATH`, `SQL_ADDRESS`, `CLUSTER_ID`,
    /// `GCE_METADATA_HOST` and `PRICING_API_KEY` on top.
    pub fn load() -> Self {
        let file = load_file_settings();
        Self::resolve(file, |name| env::var(name).ok())
    }

    fn resolve(file: FileSettings, var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            config_dir: non_empty(var("CONFIG_PATH"))
                .map(PathBuf::from)
                .or(file.config_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
            metadata_db: non_empty(var("SQL_ADDRESS"))
                .map(PathBuf::from)
                .or(file.metadata_db)
                .unwrap_or_else(default_metadata_db),
            cluster_id: non_empty(var("CLUSTER_ID")).or(file.cluster_id),
            gce_metadata_host: non_empty(var("GCE_METADATA_HOST")),
            api_key: non_empty(var("PRICING_API_KEY")).or(file.api_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn resolve(file: FileSettings, vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::resolve(file, |name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_file_or_env() {
        let s = resolve(FileSettings::default(), &[]);
        assert_eq!(s.config_dir, PathBuf::from("/models/"));
        assert_eq!(s.cluster_id, None);
        assert_eq!(s.api_key, None);
    }

    #[test]
    fn env_overrides_file() {
        let file: FileSettings = toml::from_str(
            r#"
            config_dir = "/etc/cloudcost"
            cluster_id = "from-file"
            metadata_db = "/var/lib/cloudcost/meta.db"
            "#,
        )
        .unwrap();
        let s = resolve(file, &[("CLUSTER_ID", "from-env"), ("CONFIG_PATH", "")]);
        assert_eq!(s.cluster_id.as_deref(), Some("from-env"));
        assert_eq!(s.config_dir, PathBuf::from("/etc/cloudcost"));
        assert_eq!(s.metadata_db, PathBuf::from("/var/lib/cloudcost/meta.db"));
    }

    #[test]
    fn metadata_host_only_from_env() {
        let s = resolve(
            FileSettings::default(),
            &[("GCE_METADATA_HOST", "169.254.169.254")],
        );
        assert_eq!(s.gce_metadata_host.as_deref(), Some("169.254.169.254"));
    }
}
