//! Live controllers keyed by pane address.

use std::collections::{BTreeMap, BTreeSet};

use super::backend::ProcessBackend;
use super::controller::SessionController;
use super::surface::RenderSurface;
use crate::pane::PaneAddress;
use crate::workspace::WorkspaceState;

/// What [`SessionRegistry::sync`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySync {
    /// Panes whose sessions were closed
    pub closed: Vec<PaneAddress>,
    /// Split panes whose controller moved to a child, as (from, to)
    pub rekeyed: Vec<(PaneAddress, PaneAddress)>,
}

/// Owns the controller of every mounted pane
pub struct SessionRegistry<B: ProcessBackend, S: RenderSurface> {
    controllers: BTreeMap<PaneAddress, SessionController<B, S>>,
}

impl<B: ProcessBackend, S: RenderSurface> Default for SessionRegistry<B, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ProcessBackend, S: RenderSurface> SessionRegistry<B, S> {
    pub fn new() -> Self {
        Self {
            controllers: BTreeMap::new(),
        }
    }

    /// Track `controller`, returning the one it replaces
    pub fn insert(&mut self, controller: SessionController<B, S>) -> Option<SessionController<B, S>> {
        self.controllers.insert(controller.address(), controller)
    }

    pub fn get(&self, address: &PaneAddress) -> Option<&SessionController<B, S>> {
        self.controllers.get(address)
    }

    pub fn remove(&mut self, address: &PaneAddress) -> Option<SessionController<B, S>> {
        self.controllers.remove(address)
    }

    pub fn contains(&self, address: &PaneAddress) -> bool {
        self.controllers.contains_key(address)
    }

    pub fn addresses(&self) -> Vec<PaneAddress> {
        self.controllers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Move the controller at `from` to `to` without touching its session.
    ///
    /// Returns false if `from` is not tracked or `to` already is.
    pub fn rekey(&mut self, from: &PaneAddress, to: PaneAddress) -> bool {
        if self.controllers.contains_key(&to) {
            return false;
        }
        let Some(controller) = self.controllers.remove(from) else {
            return false;
        };
        controller.rebind(to.clone());
        self.controllers.insert(to, controller);
        true
    }

    /// Reconcile controllers with `state`.
    ///
    /// A pane that disappeared because it was split hands its controller to
    /// the untracked child that inherited its live handle. Every other
    /// vanished pane has its session closed.
    pub async fn sync(&mut self, state: &WorkspaceState) -> RegistrySync {
        let live: BTreeSet<PaneAddress> = state.pane_addresses().into_iter().collect();
        let gone: Vec<PaneAddress> = self
            .controllers
            .keys()
            .filter(|address| !live.contains(*address))
            .cloned()
            .collect();

        let mut report = RegistrySync::default();
        for address in gone {
            let handle = self.controllers.get(&address).and_then(|c| c.handle_id());
            if let Some(successor) = self.successor(state, &address, handle.as_deref())
                && self.rekey(&address, successor.clone())
            {
                log::info!("Pane {} split; session continues in {}", address, successor);
                report.rekeyed.push((address, successor));
                continue;
            }

            if let Some(controller) = self.controllers.remove(&address) {
                log::info!("Pane {} removed; closing its session", address);
                if let Err(e) = controller.close().await {
                    log::warn!("Closing session of {} failed: {}", address, e);
                }
                report.closed.push(address);
            }
        }
        report
    }

    /// Untracked pane of the same tab holding `handle` in its runtime state
    fn successor(
        &self,
        state: &WorkspaceState,
        address: &PaneAddress,
        handle: Option<&str>,
    ) -> Option<PaneAddress> {
        let handle = handle?;
        let tab = state.tab(&address.workspace_id, &address.terminal_tab_id)?;
        tab.pane_tree
            .leaf_ids()
            .into_iter()
            .filter(|pane_id| {
                tab.pane_states
                    .get(pane_id)
                    .and_then(|runtime| runtime.embedded_terminal_id.as_deref())
                    == Some(handle)
            })
            .map(|pane_id| {
                PaneAddress::new(
                    address.workspace_id.clone(),
                    address.terminal_tab_id.clone(),
                    pane_id,
                )
            })
            .find(|candidate| !self.controllers.contains_key(candidate))
    }

    /// Unmount every controller without touching the backend
    pub fn unmount_all(&mut self) {
        for (_, controller) in std::mem::take(&mut self.controllers) {
            controller.unmount();
        }
    }
}
