//! REST handlers over the core dispatcher.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::domain::{DeviceId, DeviceState, SensorPacket, StoreSummary};

use super::dto::{
    DeviceListResponse, HealthResponse, IngestAck, RegisterRequest, RegisterResponse,
    ScanResponse,
};
use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// `POST /api/v1/ingest` — hand a sensor packet to the dispatcher.
pub async fn ingest(
    State(state): State<AppState>,
    Json(packet): Json<SensorPacket>,
) -> (StatusCode, Json<IngestAck>) {
    state.dispatcher().ingest(packet);
    (StatusCode::ACCEPTED, Json(IngestAck { accepted: true }))
}

/// `POST /api/v1/devices/:id/register` — upsert a skeleton record.
pub async fn register(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    if id.is_empty() {
        return Err(ApiError::bad_request("device id must not be empty"));
    }

    let device_id = DeviceId::new(id);
    state
        .dispatcher()
        .register(&device_id, request.is_base_station, request.known_position);

    let message = if request.is_base_station {
        format!("Device {device_id} registered as base station")
    } else {
        format!("Device {device_id} registered")
    };
    Ok(Json(RegisterResponse { device_id, message }))
}

/// `DELETE /api/v1/devices/:id` — disconnect a device.
pub async fn disconnect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let device_id = DeviceId::new(id);
    if state.dispatcher().disconnect(&device_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::device_not_found(device_id.as_str()))
    }
}

/// `GET /api/v1/devices` — current device snapshots.
pub async fn list_devices(State(state): State<AppState>) -> Json<DeviceListResponse> {
    let devices = state.dispatcher().list_devices();
    let total = devices.len();
    Json(DeviceListResponse { devices, total })
}

/// `GET /api/v1/devices/:id` — one device snapshot.
pub async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeviceState>> {
    let device_id = DeviceId::new(id);
    state
        .dispatcher()
        .store()
        .get(&device_id)
        .map(Json)
        .ok_or_else(|| ApiError::device_not_found(device_id.as_str()))
}

/// `GET /api/v1/summary` — counts plus per-device projections.
pub async fn summary(State(state): State<AppState>) -> Json<StoreSummary> {
    Json(state.dispatcher().summary())
}

/// `GET /api/v1/alerts/scan` — raw proximity events, no dedup.
pub async fn scan_alerts(State(state): State<AppState>) -> Json<ScanResponse> {
    let events = state.dispatcher().scan_alerts();
    let total = events.len();
    Json(ScanResponse { events, total })
}

/// `GET /health` — liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        devices: state.dispatcher().store().len(),
        subscribers: state.subscriber_count(),
        version: crate::VERSION,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardConfig;
    use crate::domain::{GeoPoint, Vector3};

    fn make_state() -> AppState {
        AppState::new(GuardConfig::default())
    }

    fn make_packet(id: &str) -> SensorPacket {
        SensorPacket {
            device_id: DeviceId::from(id),
            accelerometer: Vector3::new(0.0, 0.0, 9.81),
            gyroscope: Vector3::default(),
            magnetometer: Vector3::new(20.0, 0.0, 40.0),
            gps: None,
            is_base_station: None,
            rssi_beacons: Vec::new(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_ingest_then_list() {
        let state = make_state();
        let (status, Json(ack)) = ingest(State(state.clone()), Json(make_packet("dev-a"))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(ack.accepted);

        let Json(list) = list_devices(State(state)).await;
        assert_eq!(list.total, 1);
        assert_eq!(list.devices[0].device_id, DeviceId::from("dev-a"));
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let state = make_state();
        let Json(response) = register(
            State(state.clone()),
            Path("anchor-1".to_string()),
            Json(RegisterRequest {
                is_base_station: true,
                known_position: Some(GeoPoint::new(1.0, 2.0)),
            }),
        )
        .await
        .unwrap();
        assert!(response.message.contains("base station"));

        let Json(device) = get_device(State(state), Path("anchor-1".to_string()))
            .await
            .unwrap();
        assert!(device.is_base_station);
    }

    #[tokio::test]
    async fn test_get_unknown_device_is_not_found() {
        let state = make_state();
        let err = get_device(State(state), Path("ghost".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_disconnect_flow() {
        let state = make_state();
        ingest(State(state.clone()), Json(make_packet("dev-a"))).await;

        let status = disconnect(State(state.clone()), Path("dev-a".to_string()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = disconnect(State(state), Path("dev-a".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let state = make_state();
        ingest(State(state.clone()), Json(make_packet("dev-a"))).await;

        let Json(health) = health(State(state)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.devices, 1);
    }
}
