//! In-memory dashboard that records every request.

use super::{Dashboard, TraceAppend, WindowEvent, WindowHandle};
use crate::error::Result;

/// A request received by [`OfflineDashboard`].
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardCall {
    Create {
        handle: WindowHandle,
        event: WindowEvent,
    },
    Append(TraceAppend),
    Save(Vec<String>),
}

/// Dashboard stand-in for dry runs and tests.
///
/// Window ids are assigned sequentially (`window_0`, `window_1`, ...).
#[derive(Debug, Clone, Default)]
pub struct OfflineDashboard {
    calls: Vec<DashboardCall>,
    next_window: usize,
}

impl OfflineDashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// All requests in arrival order.
    pub fn calls(&self) -> &[DashboardCall] {
        &self.calls
    }

    /// Drain the recorded requests.
    pub fn take_calls(&mut self) -> Vec<DashboardCall> {
        std::mem::take(&mut self.calls)
    }

    /// Created windows with their assigned handles.
    pub fn windows(&self) -> impl Iterator<Item = (&WindowHandle, &WindowEvent)> {
        self.calls.iter().filter_map(|call| match call {
            DashboardCall::Create { handle, event } => Some((handle, event)),
            _ => None,
        })
    }

    /// Trace appends in arrival order.
    pub fn appends(&self) -> impl Iterator<Item = &TraceAppend> {
        self.calls.iter().filter_map(|call| match call {
            DashboardCall::Append(update) => Some(update),
            _ => None,
        })
    }

    /// Appends sent to one window.
    pub fn appends_to<'a>(
        &'a self,
        win: &'a WindowHandle,
    ) -> impl Iterator<Item = &'a TraceAppend> {
        self.appends().filter(move |update| &update.win == win)
    }
}

impl Dashboard for OfflineDashboard {
    fn check_connection(&mut self) -> Result<()> {
        Ok(())
    }

    fn create_window(&mut self, event: &WindowEvent) -> Result<WindowHandle> {
        let handle = match &event.win {
            Some(existing) => existing.clone(),
            None => {
                let handle = WindowHandle::new(format!("window_{}", self.next_window));
                self.next_window += 1;
                handle
            }
        };
        tracing::trace!("offline window {} created", handle);
        self.calls.push(DashboardCall::Create {
            handle: handle.clone(),
            event: event.clone(),
        });
        Ok(handle)
    }

    fn append_trace(&mut self, update: &TraceAppend) -> Result<()> {
        self.calls.push(DashboardCall::Append(update.clone()));
        Ok(())
    }

    fn save(&mut self, envs: &[String]) -> Result<()> {
        self.calls.push(DashboardCall::Save(envs.to_vec()));
        Ok(())
    }
}
