use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `GET /get-traffic`, polled by the fleet router.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrafficResponse {
    pub status: String,
    pub data: TrafficData,
}

/// Load figures of one game server.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrafficData {
    /// Live sessions on the server.
    #[serde(alias = "num_connections")]
    pub num_goroutines: u64,
}

impl TrafficResponse {
    /// Report `live_sessions` connected players.
    pub fn ok(live_sessions: usize) -> Self {
        Self {
            status: "ok".into(),
            data: TrafficData {
                num_goroutines: live_sessions as u64,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_connection_count_alias() {
        let parsed: TrafficResponse =
            serde_json::from_str(r#"{"status":"ok","data":{"num_connections":7}}"#).unwrap();
        assert_eq!(parsed.data.num_goroutines, 7);

        let encoded = serde_json::to_value(TrafficResponse::ok(3)).unwrap();
        assert_eq!(encoded["data"]["num_goroutines"], 3);
    }
}
