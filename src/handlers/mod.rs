//! Request handlers, one module per target.
//!
//! | target | methods |
//! |---|---|
//! | `config` | show, add, delete, save, reload, set-network |
//! | `keyring` | show, add, delete, reload, bootstrap |
//! | `cloud` | add, delete, poll, regions |
//! | `automation-hosts` | add, delete |
//! | `automation-job` | run, poll, setup |
//! | `daemon` | status, render-config, wg-up, wg-down |

pub mod automation;
pub mod cloud;
pub mod config;
pub mod daemon;
pub mod keyring;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::DaemonResult;
use crate::protocol::Message;
use crate::routing::{with_state, Router};
use crate::state::DaemonState;

pub const TARGET_CONFIG: &str = "config";
pub const TARGET_KEYRING: &str = "keyring";
pub const TARGET_CLOUD: &str = "cloud";
pub const TARGET_AUTOMATION_HOSTS: &str = "automation-hosts";
pub const TARGET_AUTOMATION_JOB: &str = "automation-job";
pub const TARGET_DAEMON: &str = "daemon";

/// Register every handler against `state`.
pub fn build_router(state: &Arc<DaemonState>) -> Router {
    let mut router = Router::new();

    router
        .register(TARGET_CONFIG, "show", with_state(state, config::show))
        .register(TARGET_CONFIG, "add", with_state(state, config::add))
        .register(TARGET_CONFIG, "delete", with_state(state, config::delete))
        .register(TARGET_CONFIG, "save", with_state(state, config::save))
        .register(TARGET_CONFIG, "reload", with_state(state, config::reload))
        .register(TARGET_CONFIG, "set-network", with_state(state, config::set_network));

    router
        .register(TARGET_KEYRING, "show", with_state(state, keyring::show))
        .register(TARGET_KEYRING, "add", with_state(state, keyring::add))
        .register(TARGET_KEYRING, "delete", with_state(state, keyring::delete))
        .register(TARGET_KEYRING, "reload", with_state(state, keyring::reload))
        .register(TARGET_KEYRING, "bootstrap", with_state(state, keyring::bootstrap));

    router
        .register(TARGET_CLOUD, "add", with_state(state, cloud::add))
        .register(TARGET_CLOUD, "delete", with_state(state, cloud::delete))
        .register(TARGET_CLOUD, "poll", with_state(state, cloud::poll))
        .register(TARGET_CLOUD, "regions", with_state(state, cloud::regions));

    router
        .register(TARGET_AUTOMATION_HOSTS, "add", with_state(state, automation::add_host))
        .register(TARGET_AUTOMATION_HOSTS, "delete", with_state(state, automation::delete_host))
        .register(TARGET_AUTOMATION_JOB, "run", with_state(state, automation::run_job))
        .register(TARGET_AUTOMATION_JOB, "poll", with_state(state, automation::poll_job))
        .register(TARGET_AUTOMATION_JOB, "setup", with_state(state, automation::setup));

    router
        .register(TARGET_DAEMON, "status", with_state(state, daemon::status))
        .register(TARGET_DAEMON, "render-config", with_state(state, daemon::render_config))
        .register(TARGET_DAEMON, "wg-up", with_state(state, daemon::wg_up))
        .register(TARGET_DAEMON, "wg-down", with_state(state, daemon::wg_down));

    tracing::debug!(targets = router.targets().len(), "Router built");
    router
}

/// Decode the request body as JSON.
pub(crate) fn body<T: DeserializeOwned>(request: &Message) -> DaemonResult<T> {
    Ok(serde_json::from_slice(&request.body)?)
}

/// Decode the request body, treating an empty body as `T::default()`.
pub(crate) fn optional_body<T: DeserializeOwned + Default>(request: &Message) -> DaemonResult<T> {
    if request.body.iter().all(u8::is_ascii_whitespace) {
        Ok(T::default())
    } else {
        body(request)
    }
}
