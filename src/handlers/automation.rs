//! `automation-hosts` and `automation-job` targets.

use std::sync::Arc;

use serde::Deserialize;

use crate::backends::{HostEntry, Repository};
use crate::error::DaemonResult;
use crate::handlers::body;
use crate::keyring::KeyStore;
use crate::protocol::Message;
use crate::routing::Reply;
use crate::state::DaemonState;

#[derive(Debug, Deserialize)]
struct HostRequest {
    /// VPN server to put under automation.
    name: String,
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    template: String,
}

#[derive(Debug, Deserialize)]
struct PollRequest {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct SetupRequest {
    project: String,
    repository: Repository,
}

/// Upload the automation SSH key and add a known server to the inventory.
pub async fn add_host(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let req: HostRequest = body(&request)?;
    let automation = state.automation()?;
    let server = state.topology.get_server(&req.name)?;

    let key_name = &state.config.backends.automation_ssh_key;
    let key = state.keyring.get_key(key_name).await?;
    let key_id = automation.add_ssh_key(key_name, key.as_ref()).await?;

    let host = HostEntry {
        name: server.name,
        address: server.wan_address,
        ssh_key_id: Some(key_id),
    };
    automation.add_host(&host).await?;
    Reply::json(&host)
}

pub async fn delete_host(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let req: HostRequest = body(&request)?;
    state.automation()?.remove_host(&req.name).await?;
    Reply::json(&serde_json::json!({ "removed": req.name }))
}

/// Start a job and reply ACCEPTED; `poll` reports progress.
pub async fn run_job(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let req: RunRequest = body(&request)?;
    let job = state.automation()?.run_job(&req.template).await?;
    Reply::accepted(&job)
}

/// OK once the job has finished, ACCEPTED while it is still running.
pub async fn poll_job(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let req: PollRequest = body(&request)?;
    let job = state.automation()?.poll_job(req.id).await?;
    if job.is_finished() {
        Reply::json(&job)
    } else {
        Reply::accepted(&job)
    }
}

/// Create a project and attach the playbook repository to it.
pub async fn setup(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let req: SetupRequest = body(&request)?;
    let automation = state.automation()?;
    let project = automation.create_project(&req.project).await?;
    let repository = automation.add_repository(project.id, &req.repository).await?;
    Reply::json(&serde_json::json!({ "project": project, "repository": repository }))
}
