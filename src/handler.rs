//! WebSocket connection handler
//!
//! Performs the upgrade, resolves the target room and the user during the
//! handshake, then hands the connection to the session lifecycle.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::AppError;
use crate::hub::HubHandle;
use crate::registry::HubRegistry;
use crate::session;
use crate::types::RoomId;
use crate::user::{Authenticator, User};

/// Handle a new TCP connection
///
/// Rejects the upgrade with 404 for unknown rooms and 401 when no user can be
/// resolved. Returns once the session has fully closed.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Arc<HubRegistry>,
    authenticator: Arc<dyn Authenticator>,
    config: Arc<SessionConfig>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    let mut resolved: Option<(HubHandle, Arc<dyn User>)> = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let (hub, user) = resolve(request, &registry, authenticator.as_ref())?;
        resolved = Some((hub, user));
        Ok(response)
    };

    let ws_stream =
        tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(transport_config(&config)))
            .await?;

    let (hub, user) = resolved.ok_or(AppError::HandshakeRejected)?;

    info!("{} connected to room {} from {}", user.name(), hub.room(), peer_addr);
    session::run(ws_stream, hub, user, &config).await
}

/// Route and authenticate an upgrade request
fn resolve(
    request: &Request,
    registry: &HubRegistry,
    authenticator: &dyn Authenticator,
) -> Result<(HubHandle, Arc<dyn User>), ErrorResponse> {
    let path = request.uri().path();
    let Some(room) = parse_room_path(path) else {
        warn!("Upgrade for unknown path {}", path);
        return Err(reject(StatusCode::NOT_FOUND, "unknown path"));
    };

    let Some(hub) = registry.get(room) else {
        warn!("No hub for room {}", room);
        return Err(reject(StatusCode::NOT_FOUND, format!("no room {}", room)));
    };

    let user = authenticator.resolve(request).map_err(|e| {
        warn!("Upgrade refused: {}", e);
        reject(StatusCode::UNAUTHORIZED, e.to_string())
    })?;

    Ok((hub.clone(), user))
}

/// Parse `/rooms/{id}` or `/rooms/{id}/ws`
pub fn parse_room_path(path: &str) -> Option<RoomId> {
    let rest = path.strip_prefix("/rooms/")?;
    let id = rest.strip_suffix("/ws").unwrap_or(rest);
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

/// Transport limits applied to every upgraded connection
pub fn transport_config(config: &SessionConfig) -> WebSocketConfig {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);
    ws_config.max_frame_size = Some(config.max_message_size);
    ws_config
}

fn reject(status: StatusCode, reason: impl Into<String>) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.into()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::user::UserDirectory;

    #[test]
    fn test_parse_room_path() {
        assert_eq!(parse_room_path("/rooms/5"), Some(RoomId(5)));
        assert_eq!(parse_room_path("/rooms/12/ws"), Some(RoomId(12)));
        assert_eq!(parse_room_path("/rooms/"), None);
        assert_eq!(parse_room_path("/rooms/-1"), None);
        assert_eq!(parse_room_path("/rooms/5/other"), None);
        assert_eq!(parse_room_path("/chat/5"), None);
    }

    #[test]
    fn test_transport_config_limits_frames() {
        let ws_config = transport_config(&SessionConfig::default());
        assert_eq!(ws_config.max_message_size, Some(512));
        assert_eq!(ws_config.max_frame_size, Some(512));
    }

    fn registry() -> HubRegistry {
        let (tx, _rx) = mpsc::channel(1);
        let mut registry = HubRegistry::new();
        registry.insert(HubHandle::new(RoomId(5), tx));
        registry
    }

    fn request(uri: &str) -> Request {
        Request::builder().uri(uri).body(()).unwrap()
    }

    #[test]
    fn test_resolve_known_room_and_user() {
        let (hub, user) = resolve(&request("/rooms/5?user=alice"), &registry(), &UserDirectory::new()).unwrap();
        assert_eq!(hub.room(), RoomId(5));
        assert_eq!(user.name(), "alice");
    }

    #[test]
    fn test_resolve_unknown_room() {
        let err = resolve(&request("/rooms/6?user=alice"), &registry(), &UserDirectory::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_resolve_without_user() {
        let err = resolve(&request("/rooms/5"), &registry(), &UserDirectory::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
