//! Least-loaded server selection and sticky room assignment.

use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    dto::traffic::TrafficResponse,
    error::ServiceError,
    state::fleet::{FleetServer, FleetState},
};

/// A fleet member could not be reached at all.
#[derive(Debug, Error)]
#[error("server `{server}` unreachable: {reason}")]
pub struct ProbeError {
    /// Name of the server.
    pub server: String,
    pub reason: String,
}

/// Reads the live connection count of a fleet member.
pub trait LoadProbe: Send + Sync {
    /// `Ok(None)` when the server answered without a usable count.
    fn connection_count(
        &self,
        server: &FleetServer,
    ) -> BoxFuture<'static, Result<Option<u64>, ProbeError>>;
}

/// Probe polling `GET http://<address>/get-traffic`.
#[derive(Clone)]
pub struct HttpLoadProbe {
    client: Client,
    timeout: Duration,
}

impl HttpLoadProbe {
    /// Probe bounding every request by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

impl LoadProbe for HttpLoadProbe {
    fn connection_count(
        &self,
        server: &FleetServer,
    ) -> BoxFuture<'static, Result<Option<u64>, ProbeError>> {
        let client = self.client.clone();
        let timeout = self.timeout;
        let server = server.clone();
        Box::pin(async move {
            let url = format!("http://{}/get-traffic", server.address);
            let response = client
                .get(&url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|err| ProbeError {
                    server: server.name.clone(),
                    reason: err.to_string(),
                })?;

            if response.status() != StatusCode::OK {
                warn!(server = %server.name, status = %response.status(), "traffic endpoint returned an error status");
                return Ok(None);
            }

            match response.json::<TrafficResponse>().await {
                Ok(body) => Ok(Some(body.data.num_goroutines)),
                Err(err) => {
                    warn!(server = %server.name, error = %err, "undecodable traffic response");
                    Ok(None)
                }
            }
        })
    }
}

/// Pick the server reporting the fewest connections, first one on ties.
///
/// A single unreachable server aborts the selection.
pub async fn select_least_loaded(
    probe: &dyn LoadProbe,
    servers: &[FleetServer],
) -> Result<FleetServer, ServiceError> {
    let counts = join_all(servers.iter().map(|server| probe.connection_count(server))).await;

    let mut best: Option<(&FleetServer, u64)> = None;
    for (server, count) in servers.iter().zip(counts) {
        match count {
            Err(err) => {
                warn!(error = %err, "fleet member unreachable; refusing to assign");
                return Err(ServiceError::NoServerAvailable);
            }
            Ok(None) => continue,
            Ok(Some(count)) => {
                debug!(server = %server.name, connections = count, "fleet member load");
                if best.is_none_or(|(_, lowest)| count < lowest) {
                    best = Some((server, count));
                }
            }
        }
    }

    best.map(|(server, _)| server.clone())
        .ok_or(ServiceError::NoServerAvailable)
}

/// Choose a server for `room_id` and record the assignment.
pub async fn assign_room(state: &FleetState, room_id: &str) -> Result<FleetServer, ServiceError> {
    let server = select_least_loaded(state.probe(), state.servers()).await?;
    state
        .assignments()
        .set_room_server(room_id, &server.name)
        .await?;
    info!(room_id = %room_id, server = %server.name, "room assigned");
    Ok(server)
}
