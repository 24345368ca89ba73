//! Remote command dispatch.
//!
//! There is no persistent process on the server; every submission is one
//! independent request/response exchange that carries the working directory
//! as explicit state. The [`Executor`] trait is the seam to the execution
//! endpoint; [`HttpExecutor`] is the production implementation.

use crate::error::DispatchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for one exchange, so a hung request cannot permanently
/// block a session's submission queue.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One command plus the directory it should run in.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ExecRequest {
    pub command: String,
    pub cwd: String,
}

/// Endpoint response. All fields are optional-tolerant: a malformed or
/// partial body must degrade to empty output rather than a hard failure.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecResponse {
    pub output: Option<String>,
    pub success: bool,
    pub new_directory: Option<String>,
}

/// Lifecycle of one submission.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DispatchState {
    #[default]
    Idle,
    Sent,
    Succeeded,
    Failed,
}

/// The remote execution endpoint.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: &ExecRequest) -> Result<ExecResponse, DispatchError>;

    /// One-shot connectivity check, performed when a session comes up. The
    /// result is informational only and never blocks use of the session.
    async fn probe(&self) -> Result<(), DispatchError>;
}

/// Talks JSON over HTTP to the execution endpoint.
pub struct HttpExecutor {
    client: reqwest::Client,
    exec_url: String,
    probe_url: String,
}

impl HttpExecutor {
    pub fn new(base_url: &str) -> Result<Self, DispatchError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, DispatchError> {
        let base = base_url.trim_end_matches('/');
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            exec_url: format!("{base}/execute"),
            probe_url: format!("{base}/health"),
        })
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, request: &ExecRequest) -> Result<ExecResponse, DispatchError> {
        let response = self
            .client
            .post(&self.exec_url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Timeout
                } else {
                    DispatchError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Endpoint {
                status: status.as_u16(),
            });
        }

        match response.json::<ExecResponse>().await {
            Ok(body) => Ok(body),
            Err(e) => {
                // Malformed body on a 2xx: treat as empty output.
                log::warn!("execution endpoint returned unparseable body: {e}");
                Ok(ExecResponse {
                    output: None,
                    success: true,
                    new_directory: None,
                })
            }
        }
    }

    async fn probe(&self) -> Result<(), DispatchError> {
        let response = self.client.get(&self.probe_url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DispatchError::Endpoint {
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a scripted sequence of responses, recording each request.
    /// An optional per-call delay keeps ordering tests honest.
    pub struct ScriptedExecutor {
        script: Mutex<VecDeque<Result<ExecResponse, DispatchError>>>,
        pub requests: Mutex<Vec<ExecRequest>>,
        pub delay: Option<Duration>,
        pub probe_ok: bool,
    }

    impl ScriptedExecutor {
        pub fn new(script: Vec<Result<ExecResponse, DispatchError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
                delay: None,
                probe_ok: true,
            }
        }

        pub fn ok(output: &str, new_directory: Option<&str>) -> Result<ExecResponse, DispatchError> {
            Ok(ExecResponse {
                output: Some(output.to_string()),
                success: true,
                new_directory: new_directory.map(str::to_string),
            })
        }
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        async fn execute(&self, request: &ExecRequest) -> Result<ExecResponse, DispatchError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(DispatchError::Endpoint { status: 500 }))
        }

        async fn probe(&self) -> Result<(), DispatchError> {
            if self.probe_ok {
                Ok(())
            } else {
                Err(DispatchError::Endpoint { status: 503 })
            }
        }
    }
}
