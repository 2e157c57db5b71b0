//! Bridge between the API and door controllers speaking MQTT.
//!
//! Commands are published to `device/{id}/command`; controllers report
//! connectivity on `device/{id}/status` with a `{"online": bool}` body.

use crate::errors::LavError;
use crate::hub::{Hub, ALERT_CREATED};
use crate::settings::Mqtt as MqttCfg;
use crate::storage::{self, Device, NewAlert, ALERT_DEVICE_OFFLINE};
use crate::types::{DeviceCommand, DeviceStatus, Severity};
use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const STATUS_SUBSCRIPTION: &str = "device/+/status";
pub const DEVICE_STATUS: &str = "device_status";

const REQUEST_CHANNEL_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub fn command_topic(device_id: &str) -> String {
    format!("device/{}/command", device_id)
}

/// Extract the device id from a `device/{id}/status` topic.
pub fn parse_status_topic(topic: &str) -> Option<&str> {
    let mut parts = topic.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("device"), Some(id), Some("status"), None) if !id.is_empty() => Some(id),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    online: bool,
}

pub fn parse_status_payload(payload: &[u8]) -> Option<bool> {
    serde_json::from_slice::<StatusPayload>(payload)
        .ok()
        .map(|p| p.online)
}

pub fn command_payload(command: DeviceCommand, payload: &Value) -> Value {
    json!({
        "command": command,
        "payload": payload,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

/// Cloneable handle used by handlers to publish commands. A disabled
/// bridge refuses every command.
#[derive(Clone)]
pub struct MqttBridge {
    client: Option<AsyncClient>,
}

impl MqttBridge {
    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// Connect to the broker configured in `cfg` and spawn the event loop.
    /// Status reports are applied to `db` and broadcast on `hub`.
    pub fn start(cfg: &MqttCfg, db: DatabaseConnection, hub: Hub) -> Self {
        if !cfg.enabled {
            info!("MQTT bridge disabled");
            return Self::disabled();
        }

        let mut options = MqttOptions::new(cfg.client_id.clone(), cfg.host.clone(), cfg.port);
        options.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs.max(5)));
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            options.set_credentials(user.clone(), pass.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        info!(host = %cfg.host, port = cfg.port, "Starting MQTT bridge");
        tokio::spawn(run_event_loop(client.clone(), eventloop, db, hub));

        Self {
            client: Some(client),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Publish `{command, payload, timestamp}` at QoS 1. Returns whether
    /// the message was handed to the client.
    pub async fn send_command(
        &self,
        device_id: &str,
        command: DeviceCommand,
        payload: &Value,
    ) -> bool {
        let Some(client) = &self.client else {
            warn!(device_id, %command, "MQTT bridge disabled, command dropped");
            return false;
        };

        let body = command_payload(command, payload).to_string();
        match client
            .publish(command_topic(device_id), QoS::AtLeastOnce, false, body)
            .await
        {
            Ok(()) => {
                info!(device_id, %command, "Command published");
                true
            }
            Err(e) => {
                error!(device_id, %command, error = %e, "Failed to publish command");
                false
            }
        }
    }
}

async fn run_event_loop(
    client: AsyncClient,
    mut eventloop: EventLoop,
    db: DatabaseConnection,
    hub: Hub,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to MQTT broker");
                // Subscriptions do not survive a clean session reconnect
                if let Err(e) = client
                    .subscribe(STATUS_SUBSCRIPTION, QoS::AtLeastOnce)
                    .await
                {
                    error!(error = %e, "Failed to subscribe to device status");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_publish(&db, &hub, &publish.topic, &publish.payload).await;
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "MQTT connection error");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

async fn handle_publish(db: &DatabaseConnection, hub: &Hub, topic: &str, payload: &[u8]) {
    let Some(device_id) = parse_status_topic(topic) else {
        debug!(topic, "Ignoring message on unexpected topic");
        return;
    };
    let Some(online) = parse_status_payload(payload) else {
        warn!(topic, "Ignoring malformed status payload");
        return;
    };

    if let Err(e) = apply_device_status(db, hub, device_id, online).await {
        error!(device_id, error = %e, "Failed to apply device status");
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusEvent {
    pub device_id: String,
    pub online: bool,
    pub status: DeviceStatus,
    pub store_id: Option<i32>,
    pub last_seen_at: Option<i64>,
}

/// Record a connectivity report. An online to offline transition raises a
/// critical `device_offline` alert. Every report for a known device is
/// broadcast as `device_status`; unknown devices are ignored.
pub async fn apply_device_status(
    db: &DatabaseConnection,
    hub: &Hub,
    device_id: &str,
    online: bool,
) -> Result<Option<Device>, LavError> {
    let status = if online {
        DeviceStatus::Online
    } else {
        DeviceStatus::Offline
    };

    let Some((device, previous)) =
        storage::set_device_status(db, device_id, status, Utc::now().timestamp()).await?
    else {
        warn!(device_id, "Status report from unknown device");
        return Ok(None);
    };

    if previous == DeviceStatus::Online && status == DeviceStatus::Offline {
        let alert = storage::create_alert(
            db,
            NewAlert {
                kind: ALERT_DEVICE_OFFLINE.to_string(),
                severity: Severity::Critical,
                message: format!("Device {} ({}) went offline", device.name, device.id),
                device_id: Some(device.id.clone()),
                store_id: device.store_id,
            },
        )
        .await?;
        warn!(device_id, alert_id = alert.id, "Device went offline");
        hub.broadcast(ALERT_CREATED, &alert);
    }

    hub.broadcast(
        DEVICE_STATUS,
        &DeviceStatusEvent {
            device_id: device.id.clone(),
            online,
            status: device.status,
            store_id: device.store_id,
            last_seen_at: device.last_seen_at,
        },
    );

    Ok(Some(device))
}
