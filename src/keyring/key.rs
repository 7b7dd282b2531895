//! Credential variants.
//!
//! Every variant renders its own authorization value; the keyring never
//! branches on the credential scheme.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Capability set shared by all credentials.
pub trait Key: Send + Sync + fmt::Debug {
    /// Materialized authorization value for this credential's scheme.
    fn prepare(&self) -> String;

    /// Non-secret half of the credential (username, client id, public key).
    fn public(&self) -> String;

    /// Secret half of the credential.
    fn secret(&self) -> String;

    /// Short variant label for listings.
    fn kind(&self) -> &'static str;
}

/// Shared handle to a resolved credential.
pub type SharedKey = Arc<dyn Key>;

/// Writes `[redacted]` in place of secrets in Debug output.
struct Redacted;

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Static bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken").field("token", &Redacted).finish()
    }
}

impl Key for BearerToken {
    fn prepare(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn public(&self) -> String {
        String::new()
    }

    fn secret(&self) -> String {
        self.token.clone()
    }

    fn kind(&self) -> &'static str {
        "bearer"
    }
}

/// HTTP basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &Redacted)
            .finish()
    }
}

impl Key for BasicAuth {
    fn prepare(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(raw))
    }

    fn public(&self) -> String {
        self.username.clone()
    }

    fn secret(&self) -> String {
        self.password.clone()
    }

    fn kind(&self) -> &'static str {
        "basic"
    }
}

/// OAuth2 client-credentials grant.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientCredentials {
    client_id: String,
    client_secret: String,
    scope: Option<String>,
}

impl OAuthClientCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: Option<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope,
        }
    }
}

impl fmt::Debug for OAuthClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &Redacted)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Key for OAuthClientCredentials {
    /// URL-encoded token request body.
    fn prepare(&self) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret);
        if let Some(scope) = &self.scope {
            form.append_pair("scope", scope);
        }
        form.finish()
    }

    fn public(&self) -> String {
        self.client_id.clone()
    }

    fn secret(&self) -> String {
        self.client_secret.clone()
    }

    fn kind(&self) -> &'static str {
        "oauth"
    }
}

/// SSH keypair in OpenSSH text form.
#[derive(Clone, PartialEq, Eq)]
pub struct SshKeypair {
    public_key: String,
    private_key: String,
}

impl SshKeypair {
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }
}

impl fmt::Debug for SshKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshKeypair")
            .field("public_key", &self.public_key)
            .field("private_key", &Redacted)
            .finish()
    }
}

impl Key for SshKeypair {
    /// The authorized_keys line.
    fn prepare(&self) -> String {
        self.public_key.trim().to_string()
    }

    fn public(&self) -> String {
        self.public_key.clone()
    }

    fn secret(&self) -> String {
        self.private_key.clone()
    }

    fn kind(&self) -> &'static str {
        "ssh"
    }
}

/// Item fetched from the secrets vault.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultItem {
    pub id: String,
    #[serde(default)]
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl fmt::Debug for VaultItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultItem")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &Redacted)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Key for VaultItem {
    fn prepare(&self) -> String {
        format!("Bearer {}", self.password)
    }

    fn public(&self) -> String {
        self.username.clone()
    }

    fn secret(&self) -> String {
        self.password.clone()
    }

    fn kind(&self) -> &'static str {
        "vault"
    }
}

/// Serialized form of a credential, as accepted on the socket and in key files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeySpec {
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    #[serde(rename = "oauth")]
    OAuth {
        client_id: String,
        client_secret: String,
        #[serde(default)]
        scope: Option<String>,
    },
    Ssh {
        public_key: String,
        private_key: String,
    },
    Vault(VaultItem),
}

impl KeySpec {
    /// Materialize the credential.
    pub fn into_key(self) -> SharedKey {
        match self {
            KeySpec::Bearer { token } => Arc::new(BearerToken::new(token)),
            KeySpec::Basic { username, password } => Arc::new(BasicAuth::new(username, password)),
            KeySpec::OAuth {
                client_id,
                client_secret,
                scope,
            } => Arc::new(OAuthClientCredentials::new(client_id, client_secret, scope)),
            KeySpec::Ssh {
                public_key,
                private_key,
            } => Arc::new(SshKeypair::new(public_key, private_key)),
            KeySpec::Vault(item) => Arc::new(item),
        }
    }

    /// Serialized form of a resolved key, for rungs that persist what they store.
    pub fn from_key(key: &dyn Key) -> Self {
        match key.kind() {
            "basic" => KeySpec::Basic {
                username: key.public(),
                password: key.secret(),
            },
            "ssh" => KeySpec::Ssh {
                public_key: key.public(),
                private_key: key.secret(),
            },
            "oauth" => KeySpec::OAuth {
                client_id: key.public(),
                client_secret: key.secret(),
                scope: None,
            },
            "vault" => KeySpec::Vault(VaultItem {
                id: String::new(),
                username: key.public(),
                password: key.secret(),
                fields: BTreeMap::new(),
            }),
            _ => KeySpec::Bearer {
                token: key.secret(),
            },
        }
    }
}
