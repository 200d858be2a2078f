//! Blocking HTTP client for a Visdom server.

use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use super::{Dashboard, TraceAppend, WindowEvent, WindowHandle};
use crate::config::DashboardConfig;
use crate::error::{PlotError, Result};

/// Talks to a Visdom server over its JSON HTTP API.
///
/// # Example
///
/// ```rust,ignore
/// use latent_plot::{DashboardConfig, VisdomClient};
///
/// let client = VisdomClient::new(&DashboardConfig::default().with_env("vae"));
/// ```
#[derive(Debug, Clone)]
pub struct VisdomClient {
    agent: ureq::Agent,
    config: DashboardConfig,
}

impl VisdomClient {
    /// Build a client. No request is made until the first call.
    pub fn new(config: &DashboardConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();

        Self {
            agent,
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    fn post<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<String> {
        let url = self.config.endpoint_url(endpoint);
        let response = self
            .agent
            .post(&url)
            .send_json(body)
            .map_err(|e| request_error(endpoint, &url, e))?;
        Ok(response.into_string()?)
    }
}

impl Dashboard for VisdomClient {
    fn check_connection(&mut self) -> Result<()> {
        let url = self.config.root_url();
        self.agent
            .get(&url)
            .call()
            .map_err(|e| request_error("", &url, e))?;
        Ok(())
    }

    fn create_window(&mut self, event: &WindowEvent) -> Result<WindowHandle> {
        let body = self.post("events", event)?;
        let id = body.trim().trim_matches('"');
        if id.is_empty() {
            return Err(PlotError::Rejected {
                endpoint: "events".into(),
                status: 200,
                body: "empty window id".into(),
            });
        }
        Ok(WindowHandle::new(id))
    }

    fn append_trace(&mut self, update: &TraceAppend) -> Result<()> {
        self.post("update", update)?;
        Ok(())
    }

    fn save(&mut self, envs: &[String]) -> Result<()> {
        self.post("save", &json!({ "data": envs }))?;
        Ok(())
    }
}

fn request_error(endpoint: &str, url: &str, err: ureq::Error) -> PlotError {
    match err {
        ureq::Error::Status(status, response) => PlotError::Rejected {
            endpoint: endpoint.to_string(),
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => PlotError::Connection {
            url: url.to_string(),
            reason: transport.to_string(),
        },
    }
}
