use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

const DB_ENV: &str = "SUPPER_DB";
const WEBHOOK_SECRET_ENV: &str = "SUPPER_WEBHOOK_SECRET";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    /// Resolve paths from the platform data directory. `SUPPER_DB` overrides
    /// the database location.
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "supper").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = match std::env::var_os(DB_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => data_dir.join("supper.db"),
        };

        Ok(Config { db_path, data_dir })
    }

    /// Shared secret the calendar webhook must present. `None` when unset,
    /// in which case every ingest request is refused.
    pub fn webhook_secret() -> Option<String> {
        std::env::var(WEBHOOK_SECRET_ENV)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Load the API key from disk, or generate a new one.
    pub fn load_or_create_api_key(&self) -> Result<String> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: dir.path().join("supper.db"),
            data_dir: dir.path().to_path_buf(),
        };

        let key = config.load_or_create_api_key().unwrap();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(config.load_or_create_api_key().unwrap(), key);
    }

    #[cfg(unix)]
    #[test]
    fn test_api_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: dir.path().join("supper.db"),
            data_dir: dir.path().to_path_buf(),
        };
        config.load_or_create_api_key().unwrap();
        let mode = std::fs::metadata(dir.path().join("api_key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
