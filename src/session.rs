//! Connection to one dashboard environment for the length of a training run.

use crate::config::DashboardConfig;
use crate::dashboard::{
    Dashboard, OfflineDashboard, TraceAppend, VisdomClient, WindowEvent, WindowHandle,
};
use crate::error::Result;

/// A dashboard transport bound to one named environment.
///
/// Passed by `&mut` to every plotting call; there is no global state.
#[derive(Debug)]
pub struct Session<D: Dashboard = VisdomClient> {
    env: String,
    dashboard: D,
}

impl Session<VisdomClient> {
    /// Connect to the Visdom server described by `config`.
    ///
    /// Fails with [`PlotError::Connection`](crate::PlotError::Connection)
    /// when the server cannot be reached.
    pub fn open(config: &DashboardConfig) -> Result<Self> {
        let session = Self::with_dashboard(config.env.clone(), VisdomClient::new(config))?;
        tracing::info!(
            "Connected to dashboard at {} (env '{}')",
            config.root_url(),
            session.env
        );
        Ok(session)
    }
}

impl Session<OfflineDashboard> {
    /// A session that records requests in memory instead of sending them.
    pub fn offline(env: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            dashboard: OfflineDashboard::new(),
        }
    }
}

impl<D: Dashboard> Session<D> {
    /// Wrap an existing transport after checking it is reachable.
    pub fn with_dashboard(env: impl Into<String>, mut dashboard: D) -> Result<Self> {
        dashboard.check_connection()?;
        Ok(Self {
            env: env.into(),
            dashboard,
        })
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn dashboard(&self) -> &D {
        &self.dashboard
    }

    pub fn dashboard_mut(&mut self) -> &mut D {
        &mut self.dashboard
    }

    pub fn into_dashboard(self) -> D {
        self.dashboard
    }

    /// Ask the dashboard to persist this environment.
    pub fn save(&mut self) -> Result<()> {
        self.dashboard.save(std::slice::from_ref(&self.env))?;
        tracing::info!("Saved dashboard env '{}'", self.env);
        Ok(())
    }

    pub(crate) fn create(&mut self, event: WindowEvent) -> Result<WindowHandle> {
        let handle = self.dashboard.create_window(&event)?;
        tracing::debug!(
            "Created window {} ({})",
            handle,
            event.title().unwrap_or("untitled")
        );
        Ok(handle)
    }

    pub(crate) fn append(&mut self, update: TraceAppend) -> Result<()> {
        tracing::debug!(
            "Append {} point(s) to trace '{}' of window {}",
            update.x().len(),
            update.name,
            update.win
        );
        self.dashboard.append_trace(&update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::DashboardCall;

    #[test]
    fn test_save_targets_session_env() {
        let mut session = Session::offline("vae_run");
        session.save().unwrap();

        assert_eq!(
            session.dashboard().calls(),
            &[DashboardCall::Save(vec!["vae_run".to_string()])]
        );
    }

    #[test]
    fn test_open_unreachable_fails() {
        let config = DashboardConfig {
            server: "http://127.0.0.1".into(),
            port: 9,
            timeout_secs: 2,
            ..DashboardConfig::default()
        };
        assert!(Session::open(&config).is_err());
    }
}
