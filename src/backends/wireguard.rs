//! WireGuard interface configuration and control.
//!
//! # Responsibilities
//! - Render the server's wg-quick INI from the live topology
//! - Write it under the configured directory with owner-only permissions
//! - Bring the interface up/down through `wg-quick`

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::backends::error::{BackendError, BackendResult};
use crate::topology::{NetworkBlock, VpnClient};

/// Interface-level settings for the rendered config.
#[derive(Debug, Clone)]
pub struct InterfaceSettings<'a> {
    pub network: NetworkBlock,
    pub server_address: std::net::Ipv4Addr,
    pub listen_port: u16,
    pub private_key: &'a str,
}

/// Render a wg-quick config: one `[Interface]` plus one `[Peer]` per client.
pub fn render_config(settings: &InterfaceSettings<'_>, clients: &[VpnClient]) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "[Interface]");
    let _ = writeln!(
        out,
        "Address = {}/{}",
        settings.server_address,
        settings.network.prefix()
    );
    let _ = writeln!(out, "ListenPort = {}", settings.listen_port);
    let _ = writeln!(out, "PrivateKey = {}", settings.private_key.trim());

    for client in clients {
        let _ = writeln!(out);
        let _ = writeln!(out, "# {}", client.name);
        let _ = writeln!(out, "[Peer]");
        let _ = writeln!(out, "PublicKey = {}", client.public_key);
        let _ = writeln!(out, "AllowedIPs = {}/32", client.vpn_address);
    }
    out
}

/// Write `contents` to `<dir>/<interface>.conf`, mode 0600 on unix.
pub async fn write_config(dir: &Path, interface: &str, contents: &str) -> BackendResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = config_path(dir, interface);
    tokio::fs::write(&path, contents).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    tracing::info!(path = %path.display(), "WireGuard config written");
    Ok(path)
}

pub fn config_path(dir: &Path, interface: &str) -> PathBuf {
    dir.join(format!("{interface}.conf"))
}

/// Interface control contract.
#[async_trait]
pub trait WireguardControl: Send + Sync {
    async fn up(&self, config: &Path) -> BackendResult<()>;

    async fn down(&self, config: &Path) -> BackendResult<()>;
}

/// Shells out to `wg-quick up|down <config>`.
#[derive(Debug, Clone)]
pub struct WgQuick {
    program: String,
}

impl WgQuick {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, action: &str, config: &Path) -> BackendResult<()> {
        tracing::info!(program = %self.program, action, config = %config.display(), "Running wg-quick");
        let output = tokio::process::Command::new(&self.program)
            .arg(action)
            .arg(config)
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(BackendError::Command {
                program: format!("{} {action}", self.program),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl Default for WgQuick {
    fn default() -> Self {
        Self::new("wg-quick")
    }
}

#[async_trait]
impl WireguardControl for WgQuick {
    async fn up(&self, config: &Path) -> BackendResult<()> {
        self.run("up", config).await
    }

    async fn down(&self, config: &Path) -> BackendResult<()> {
        self.run("down", config).await
    }
}
