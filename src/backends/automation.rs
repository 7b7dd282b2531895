//! Automation/CI collaborator: projects, repositories, inventory hosts and jobs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backends::error::BackendResult;
use crate::backends::http::RestClient;
use crate::keyring::Key;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub git_url: String,
    #[serde(default = "default_branch")]
    pub git_branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

/// Inventory entry for one managed host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub ssh_key_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub template: String,
}

impl Job {
    /// True once the job has stopped running, successfully or not.
    pub fn is_finished(&self) -> bool {
        matches!(self.status.as_str(), "success" | "error" | "stopped")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct Created {
    id: u64,
}

/// Automation backend contract.
#[async_trait]
pub trait AutomationServer: Send + Sync {
    async fn create_project(&self, name: &str) -> BackendResult<Project>;

    async fn add_repository(&self, project: u64, repository: &Repository) -> BackendResult<u64>;

    /// Upload an SSH keypair; returns the backend's key id.
    async fn add_ssh_key(&self, name: &str, key: &dyn Key) -> BackendResult<u64>;

    async fn add_host(&self, host: &HostEntry) -> BackendResult<()>;

    async fn remove_host(&self, name: &str) -> BackendResult<()>;

    async fn run_job(&self, template: &str) -> BackendResult<Job>;

    async fn poll_job(&self, id: u64) -> BackendResult<Job>;
}

/// REST implementation; hosts, keys and jobs live in the configured project.
#[derive(Debug, Clone)]
pub struct HttpAutomation {
    client: RestClient,
    project: String,
}

impl HttpAutomation {
    pub fn new(client: RestClient, project: u64) -> Self {
        Self {
            client,
            project: project.to_string(),
        }
    }
}

#[async_trait]
impl AutomationServer for HttpAutomation {
    async fn create_project(&self, name: &str) -> BackendResult<Project> {
        let project: Project = self
            .client
            .post_json(&["projects"], &serde_json::json!({ "name": name }))
            .await?;
        tracing::info!(id = project.id, name = %project.name, "Automation project created");
        Ok(project)
    }

    async fn add_repository(&self, project: u64, repository: &Repository) -> BackendResult<u64> {
        let created: Created = self
            .client
            .post_json(&["projects", &project.to_string(), "repositories"], repository)
            .await?;
        Ok(created.id)
    }

    async fn add_ssh_key(&self, name: &str, key: &dyn Key) -> BackendResult<u64> {
        let body = serde_json::json!({
            "name": name,
            "type": "ssh",
            "ssh": { "public_key": key.public(), "private_key": key.secret() },
        });
        let created: Created = self
            .client
            .post_json(&["projects", &self.project, "keys"], &body)
            .await?;
        Ok(created.id)
    }

    async fn add_host(&self, host: &HostEntry) -> BackendResult<()> {
        let _: Created = self
            .client
            .post_json(&["projects", &self.project, "inventory"], host)
            .await?;
        tracing::info!(host = %host.name, address = %host.address, "Automation host added");
        Ok(())
    }

    async fn remove_host(&self, name: &str) -> BackendResult<()> {
        self.client
            .delete(&["projects", &self.project, "inventory", name])
            .await
    }

    async fn run_job(&self, template: &str) -> BackendResult<Job> {
        let job: Job = self
            .client
            .post_json(
                &["projects", &self.project, "tasks"],
                &serde_json::json!({ "template": template }),
            )
            .await?;
        tracing::info!(job = job.id, template = %template, "Automation job started");
        Ok(job)
    }

    async fn poll_job(&self, id: u64) -> BackendResult<Job> {
        self.client
            .get_json(&["projects", &self.project, "tasks", &id.to_string()])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::http::Credential;
    use crate::keyring::{BearerToken, SshKeypair};
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn automation(server: &MockServer) -> HttpAutomation {
        let client = RestClient::new(
            "automation",
            Url::parse(&format!("{}/api", server.uri())).unwrap(),
            Credential::Fixed(Arc::new(BearerToken::new("k"))),
            Duration::from_secs(5),
        )
        .unwrap();
        HttpAutomation::new(client, 7)
    }

    #[tokio::test]
    async fn test_run_and_poll_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/projects/7/tasks"))
            .and(body_partial_json(serde_json::json!({"template": "provision"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 42, "status": "waiting", "template": "provision"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/projects/7/tasks/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 42, "status": "success"
            })))
            .mount(&server)
            .await;

        let automation = automation(&server);
        let job = automation.run_job("provision").await.unwrap();
        assert_eq!(job.id, 42);
        assert!(!job.is_finished());
        assert!(automation.poll_job(42).await.unwrap().is_finished());
    }

    #[tokio::test]
    async fn test_ssh_key_and_host_inventory() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/projects/7/keys"))
            .and(body_partial_json(serde_json::json!({"ssh": {"public_key": "ssh-ed25519 AAA"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 3})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/projects/7/inventory"))
            .and(body_partial_json(serde_json::json!({"name": "edge", "ssh_key_id": 3})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 11})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/projects/7/inventory/edge"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let automation = automation(&server);
        let key = SshKeypair::new("ssh-ed25519 AAA", "PRIVATE");
        let key_id = automation.add_ssh_key("deploy", &key).await.unwrap();
        assert_eq!(key_id, 3);

        let host = HostEntry {
            name: "edge".into(),
            address: "203.0.113.9".into(),
            ssh_key_id: Some(key_id),
        };
        automation.add_host(&host).await.unwrap();
        automation.remove_host("edge").await.unwrap();
    }

    #[tokio::test]
    async fn test_setup_project_and_repository() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/projects"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 7, "name": "yosai"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/projects/7/repositories"))
            .and(body_partial_json(serde_json::json!({"git_branch": "main"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 5})))
            .mount(&server)
            .await;

        let automation = automation(&server);
        let project = automation.create_project("yosai").await.unwrap();
        assert_eq!(project.id, 7);

        let repository: Repository = serde_json::from_value(serde_json::json!({
            "name": "playbooks", "git_url": "https://git.example/playbooks.git"
        }))
        .unwrap();
        assert_eq!(automation.add_repository(project.id, &repository).await.unwrap(), 5);
    }
}
