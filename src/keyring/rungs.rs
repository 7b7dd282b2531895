//! Local keyring rungs: environment variables and a JSON key file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::keyring::chain::KeyStore;
use crate::keyring::error::{KeyringError, KeyringResult};
use crate::keyring::key::{BearerToken, KeySpec, SharedKey};

/// Resolves `<prefix><NAME>` environment variables.
///
/// A value starting with `{` is parsed as a JSON `KeySpec`; anything else is
/// treated as a bearer token. Read-only.
#[derive(Debug, Clone)]
pub struct EnvRung {
    prefix: String,
}

impl EnvRung {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable consulted for `name`.
    pub fn variable(&self, name: &str) -> String {
        let normalized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{}", self.prefix, normalized)
    }

    fn parse(name: &str, raw: &str) -> KeyringResult<SharedKey> {
        let raw = raw.trim();
        if raw.starts_with('{') {
            let spec: KeySpec = serde_json::from_str(raw).map_err(|e| KeyringError::InvalidKey {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
            Ok(spec.into_key())
        } else {
            Ok(std::sync::Arc::new(BearerToken::new(raw)))
        }
    }
}

#[async_trait]
impl KeyStore for EnvRung {
    fn label(&self) -> &str {
        "env"
    }

    async fn get_key(&self, name: &str) -> KeyringResult<SharedKey> {
        match std::env::var(self.variable(name)) {
            Ok(raw) if !raw.trim().is_empty() => Self::parse(name, &raw),
            _ => Err(KeyringError::KeyNotFound(name.to_string())),
        }
    }

    async fn add_key(&self, _name: &str, _key: SharedKey) -> KeyringResult<()> {
        Err(KeyringError::ReadOnly { store: "env" })
    }

    async fn remove_key(&self, _name: &str) -> KeyringResult<()> {
        Err(KeyringError::ReadOnly { store: "env" })
    }
}

/// JSON file of `name → KeySpec`. Writes go straight to disk.
#[derive(Debug)]
pub struct FileRung {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRung {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> KeyringResult<BTreeMap<String, KeySpec>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|e| KeyringError::InvalidKey {
            name: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn store(&self, keys: &BTreeMap<String, KeySpec>) -> KeyringResult<()> {
        let json = serde_json::to_vec_pretty(keys).map_err(|e| KeyringError::InvalidKey {
            name: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        restrict_permissions(&tmp).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl KeyStore for FileRung {
    fn label(&self) -> &str {
        "file"
    }

    async fn get_key(&self, name: &str) -> KeyringResult<SharedKey> {
        self.load()
            .await?
            .remove(name)
            .map(KeySpec::into_key)
            .ok_or_else(|| KeyringError::KeyNotFound(name.to_string()))
    }

    async fn add_key(&self, name: &str, key: SharedKey) -> KeyringResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut keys = self.load().await?;
        if keys.contains_key(name) {
            return Err(KeyringError::KeyExists(name.to_string()));
        }
        keys.insert(name.to_string(), KeySpec::from_key(key.as_ref()));
        self.store(&keys).await?;
        tracing::info!(path = %self.path.display(), key = %name, "Key written to key file");
        Ok(())
    }

    async fn remove_key(&self, name: &str) -> KeyringResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut keys = self.load().await?;
        if keys.remove(name).is_none() {
            return Err(KeyringError::KeyNotFound(name.to_string()));
        }
        self.store(&keys).await?;
        tracing::info!(path = %self.path.display(), key = %name, "Key removed from key file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::key::BasicAuth;
    use std::sync::Arc;

    #[test]
    fn test_env_variable_name() {
        let rung = EnvRung::new("YOSAI_KEY_");
        assert_eq!(rung.variable("cloud-api.token"), "YOSAI_KEY_CLOUD_API_TOKEN");
    }

    #[test]
    fn test_env_parse_raw_and_json() {
        let key = EnvRung::parse("x", "  plain-token \n").unwrap();
        assert_eq!(key.prepare(), "Bearer plain-token");

        let key = EnvRung::parse("x", r#"{"kind":"basic","username":"a","password":"b"}"#).unwrap();
        assert_eq!(key.kind(), "basic");

        let err = EnvRung::parse("x", "{not json").unwrap_err();
        assert!(matches!(err, KeyringError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn test_env_rung_is_read_only() {
        let rung = EnvRung::new("YOSAI_TEST_RO_");
        let err = rung
            .add_key("a", Arc::new(BearerToken::new("t")))
            .await
            .unwrap_err();
        assert!(matches!(err, KeyringError::ReadOnly { store: "env" }));
        assert!(matches!(
            rung.get_key("definitely-unset").await,
            Err(KeyringError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_file_rung_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let rung = FileRung::new(dir.path().join("keys.json"));

        assert!(matches!(
            rung.get_key("vault").await,
            Err(KeyringError::KeyNotFound(_))
        ));

        rung.add_key("vault", Arc::new(BasicAuth::new("svc", "pw")))
            .await
            .unwrap();
        let key = rung.get_key("vault").await.unwrap();
        assert_eq!(key.public(), "svc");
        assert_eq!(key.secret(), "pw");

        let err = rung
            .add_key("vault", Arc::new(BearerToken::new("t")))
            .await
            .unwrap_err();
        assert!(matches!(err, KeyringError::KeyExists(_)));

        rung.remove_key("vault").await.unwrap();
        assert!(matches!(
            rung.remove_key("vault").await,
            Err(KeyringError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_file_rung_reads_hand_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        std::fs::write(
            &path,
            r#"{"cloud": {"kind": "bearer", "token": "abc"}, "deploy": {"kind": "ssh", "public_key": "ssh-ed25519 AAAA", "private_key": "PRIV"}}"#,
        )
        .unwrap();

        let rung = FileRung::new(&path);
        assert_eq!(rung.get_key("cloud").await.unwrap().prepare(), "Bearer abc");
        assert_eq!(rung.get_key("deploy").await.unwrap().kind(), "ssh");
    }
}
