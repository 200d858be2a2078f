//! Transport seam between the plotting code and the dashboard process.
//!
//! The [`Dashboard`] trait carries four requests: a connectivity check,
//! window creation, trace append and environment save. [`VisdomClient`]
//! speaks the Visdom HTTP API; [`OfflineDashboard`] records every request in
//! memory so a run can be replayed or inspected without a server.

mod messages;
mod offline;
mod visdom;

pub use messages::{
    Axis, Content, Layout, Marker, Panel, Scale, Scene, TraceAppend, TraceData, WindowEvent,
};
pub use offline::{DashboardCall, OfflineDashboard};
pub use visdom::VisdomClient;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Opaque identifier of a window on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(String);

impl WindowHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A blocking connection to a visualization dashboard.
///
/// Every method is a single round trip; failures are returned, never retried.
pub trait Dashboard {
    /// Fail with a connection error if the dashboard cannot be reached.
    fn check_connection(&mut self) -> Result<()>;

    /// Create (or replace, when `event.win` is set) a window.
    fn create_window(&mut self, event: &WindowEvent) -> Result<WindowHandle>;

    /// Append points to a named trace of an existing window.
    fn append_trace(&mut self, update: &TraceAppend) -> Result<()>;

    /// Persist the given environments on the dashboard side.
    fn save(&mut self, envs: &[String]) -> Result<()>;
}

impl<D: Dashboard + ?Sized> Dashboard for Box<D> {
    fn check_connection(&mut self) -> Result<()> {
        (**self).check_connection()
    }

    fn create_window(&mut self, event: &WindowEvent) -> Result<WindowHandle> {
        (**self).create_window(event)
    }

    fn append_trace(&mut self, update: &TraceAppend) -> Result<()> {
        (**self).append_trace(update)
    }

    fn save(&mut self, envs: &[String]) -> Result<()> {
        (**self).save(envs)
    }
}
