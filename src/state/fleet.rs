//! State of the fleet router process.

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::{assignment::RoomAssignmentStore, pictures::PictureSigner},
    services::fleet_service::LoadProbe,
    state::storage::StorageSlot,
};

/// Shared handle to [`FleetState`].
pub type SharedFleetState = Arc<FleetState>;

/// A game server the router may assign rooms to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetServer {
    /// Name written to the routing table.
    pub name: String,
    /// `host:port` of the server HTTP endpoint.
    pub address: String,
}

impl FleetServer {
    /// Server `name` reachable at `address`.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Collaborators shared by the router handlers.
pub struct FleetState {
    storage: Arc<StorageSlot>,
    assignments: Arc<dyn RoomAssignmentStore>,
    signer: Arc<dyn PictureSigner>,
    probe: Arc<dyn LoadProbe>,
    servers: Vec<FleetServer>,
    config: Arc<AppConfig>,
}

impl FleetState {
    /// Assemble the router state.
    pub fn new(
        config: AppConfig,
        storage: Arc<StorageSlot>,
        assignments: Arc<dyn RoomAssignmentStore>,
        signer: Arc<dyn PictureSigner>,
        probe: Arc<dyn LoadProbe>,
        servers: Vec<FleetServer>,
    ) -> SharedFleetState {
        Arc::new(Self {
            storage,
            assignments,
            signer,
            probe,
            servers,
            config: Arc::new(config),
        })
    }

    /// Slot holding the game store.
    pub fn storage(&self) -> &Arc<StorageSlot> {
        &self.storage
    }

    /// Room routing table.
    pub fn assignments(&self) -> &dyn RoomAssignmentStore {
        self.assignments.as_ref()
    }

    /// Signer for picture URLs.
    pub fn signer(&self) -> &dyn PictureSigner {
        self.signer.as_ref()
    }

    pub fn probe(&self) -> &dyn LoadProbe {
        self.probe.as_ref()
    }

    /// Fleet members in configuration order.
    pub fn servers(&self) -> &[FleetServer] {
        &self.servers
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
