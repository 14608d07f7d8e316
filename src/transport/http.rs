//! Transport for repositories served over plain HTTP(S)
//!
//! HTTP cannot enumerate directories, so files-only exports only create
//! the local directory and recursive exports are refused. The gap loader
//! falls back to per-file exports for directory entries.

use super::{temp_sibling, ExportDepth, Transport};
use crate::error::{StrataError, StrataResult};
use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Blocking ureq agent driven from the tokio blocking pool
#[derive(Clone)]
pub struct HttpTransport {
    agent: Agent,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: Agent::new_with_config(config),
        }
    }

    async fn blocking<T, F>(&self, url: &str, f: F) -> StrataResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Agent) -> StrataResult<T> + Send + 'static,
    {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || f(agent))
            .await
            .map_err(|e| StrataError::transport(url, e))?
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn check_connection(&self, url: &str) -> StrataResult<()> {
        let target = url.to_string();
        self.blocking(url, move |agent| match agent.head(&target).call() {
            Ok(_) => Ok(()),
            // Any status line means the server answered
            Err(ureq::Error::StatusCode(code)) => {
                debug!("Repository probe {} answered {}", target, code);
                Ok(())
            }
            Err(e) => Err(StrataError::Connectivity {
                url: target,
                reason: e.to_string(),
            }),
        })
        .await
    }

    async fn export(&self, url: &str, dest: &Path, depth: ExportDepth) -> StrataResult<()> {
        match depth {
            ExportDepth::File => {
                let target = url.to_string();
                let dest = dest.to_path_buf();
                self.blocking(url, move |agent| download(&agent, &target, &dest))
                    .await
            }
            ExportDepth::FilesOnly => tokio::fs::create_dir_all(dest)
                .await
                .map_err(|e| StrataError::io(format!("creating {}", dest.display()), e)),
            ExportDepth::Recursive => Err(StrataError::ExportUnsupported {
                url: url.to_string(),
                reason: "HTTP repositories cannot list directories".to_string(),
            }),
        }
    }

    async fn read_to_string(&self, url: &str) -> StrataResult<String> {
        let target = url.to_string();
        self.blocking(url, move |agent| {
            let mut response = agent
                .get(&target)
                .call()
                .map_err(|e| StrataError::transport(&target, e))?;
            response
                .body_mut()
                .read_to_string()
                .map_err(|e| StrataError::transport(&target, e))
        })
        .await
    }

    fn lists_directories(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Stream a GET response into `dest` via a temp sibling
fn download(agent: &Agent, url: &str, dest: &Path) -> StrataResult<()> {
    debug!("GET {} -> {}", url, dest.display());
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| StrataError::io(format!("creating {}", parent.display()), e))?;
    }

    let mut response = agent
        .get(url)
        .call()
        .map_err(|e| StrataError::transport(url, e))?;

    let tmp = temp_sibling(dest);
    let result = File::create(&tmp)
        .and_then(|mut file| std::io::copy(&mut response.body_mut().as_reader(), &mut file));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(StrataError::transport(url, e));
    }

    std::fs::rename(&tmp, dest)
        .map_err(|e| StrataError::io(format!("moving {} into place", dest.display()), e))
}
