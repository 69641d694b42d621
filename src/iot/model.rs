//! Device manager resources
//!
//! These mirror the service's resources field for field in their JSON wire
//! form. Default-valued fields are omitted when encoding and filled with
//! defaults when decoding, so partial responses (field masks) decode cleanly.

use super::wire::{self, is_zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A container for a group of devices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceRegistry {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event_notification_configs: Vec<EventNotificationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_notification_config: Option<StateNotificationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_config: Option<MqttConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpConfig>,
    #[serde(skip_serializing_if = "is_zero")]
    pub log_level: LogLevel,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<RegistryCredential>,
}

/// The device resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Server-assigned numeric id
    #[serde(with = "wire::int64", skip_serializing_if = "is_zero")]
    pub num_id: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<DeviceCredential>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_state_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_config_ack_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_config_send_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "is_zero")]
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_status: Option<RpcStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<DeviceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<DeviceState>,
    #[serde(skip_serializing_if = "is_zero")]
    pub log_level: LogLevel,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_config: Option<GatewayConfig>,
}

impl Device {
    pub fn is_gateway(&self) -> bool {
        self.gateway_config
            .as_ref()
            .is_some_and(|c| c.gateway_type == GatewayType::Gateway)
    }
}

/// Gateway-related configuration and state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    #[serde(skip_serializing_if = "is_zero")]
    pub gateway_type: GatewayType,
    #[serde(skip_serializing_if = "is_zero")]
    pub gateway_auth_method: GatewayAuthMethod,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_accessed_gateway_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_gateway_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventNotificationConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subfolder_matches: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pubsub_topic_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateNotificationConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pubsub_topic_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MqttConfig {
    #[serde(skip_serializing_if = "is_zero")]
    pub mqtt_enabled_state: MqttState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    #[serde(skip_serializing_if = "is_zero")]
    pub http_enabled_state: HttpState,
}

/// A server-stored registry credential used to verify device credentials
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryCredential {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_certificate: Option<PublicKeyCertificate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicKeyCertificate {
    #[serde(skip_serializing_if = "is_zero")]
    pub format: PublicKeyCertificateFormat,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub certificate: String,
    /// Output only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x509_details: Option<X509CertificateDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct X509CertificateDetails {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub signature_algorithm: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub public_key_type: String,
}

/// A server-stored device credential used for authentication
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceCredential {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKeyCredential>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicKeyCredential {
    #[serde(skip_serializing_if = "is_zero")]
    pub format: PublicKeyFormat,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key: String,
}

impl DeviceCredential {
    pub fn public_key(format: PublicKeyFormat, key: impl Into<String>) -> Self {
        Self {
            public_key: Some(PublicKeyCredential {
                format,
                key: key.into(),
            }),
            expiration_time: None,
        }
    }
}

/// The device configuration, eventually delivered to the device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceConfig {
    #[serde(with = "wire::int64", skip_serializing_if = "is_zero")]
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_update_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_ack_time: Option<DateTime<Utc>>,
    #[serde(with = "wire::bytes", skip_serializing_if = "Vec::is_empty")]
    pub binary_data: Vec<u8>,
}

/// The device state, as reported by the device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(with = "wire::bytes", skip_serializing_if = "Vec::is_empty")]
    pub binary_data: Vec<u8>,
}

/// `google.rpc.Status` as embedded in resources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RpcStatus {
    #[serde(skip_serializing_if = "is_zero")]
    pub code: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MqttState {
    #[default]
    MqttStateUnspecified,
    MqttEnabled,
    MqttDisabled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HttpState {
    #[default]
    HttpStateUnspecified,
    HttpEnabled,
    HttpDisabled,
}

/// Logging verbosity for device activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    #[default]
    LogLevelUnspecified,
    None,
    Error,
    Info,
    Debug,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayType {
    #[default]
    GatewayTypeUnspecified,
    Gateway,
    NonGateway,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayAuthMethod {
    #[default]
    GatewayAuthMethodUnspecified,
    AssociationOnly,
    DeviceAuthTokenOnly,
    AssociationAndDeviceAuthToken,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicKeyCertificateFormat {
    #[default]
    UnspecifiedPublicKeyCertificateFormat,
    #[serde(rename = "X509_CERTIFICATE_PEM")]
    X509CertificatePem,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicKeyFormat {
    #[default]
    UnspecifiedPublicKeyFormat,
    RsaPem,
    #[serde(rename = "RSA_X509_PEM")]
    RsaX509Pem,
    #[serde(rename = "ES256_PEM")]
    Es256Pem,
    #[serde(rename = "ES256_X509_PEM")]
    Es256X509Pem,
}

/// IAM access control policy attached to a registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Policy {
    #[serde(skip_serializing_if = "is_zero")]
    pub version: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
    /// Opaque concurrency token; send back unchanged on update
    #[serde(with = "wire::bytes", skip_serializing_if = "Vec::is_empty")]
    pub etag: Vec<u8>,
}

impl Policy {
    /// Add `member` to `role`, creating the binding if needed.
    ///
    /// Returns false when the member was already bound.
    pub fn add_member(&mut self, role: &str, member: &str) -> bool {
        match self
            .bindings
            .iter_mut()
            .find(|b| b.role == role && b.condition.is_none())
        {
            Some(binding) if binding.members.iter().any(|m| m == member) => false,
            Some(binding) => {
                binding.members.push(member.to_string());
                true
            }
            None => {
                self.bindings.push(Binding {
                    role: role.to_string(),
                    members: vec![member.to_string()],
                    condition: None,
                });
                true
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Binding {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expr>,
}

/// `google.type.Expr`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Expr {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub expression: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_device_decodes_service_json() {
        let device: Device = serde_json::from_value(json!({
            "id": "d0",
            "name": "projects/p0/locations/us-central1/registries/r0/devices/d0",
            "numId": "2820786534893843",
            "credentials": [{
                "publicKey": {"format": "ES256_PEM", "key": "-----BEGIN PUBLIC KEY-----"},
                "expirationTime": "1970-01-01T00:00:00Z"
            }],
            "lastHeartbeatTime": "2020-06-01T12:00:00.123Z",
            "config": {"version": "3", "cloudUpdateTime": "2020-06-01T11:00:00Z", "binaryData": "b24="},
            "gatewayConfig": {"gatewayType": "GATEWAY", "gatewayAuthMethod": "ASSOCIATION_ONLY"},
            "metadata": {"site": "lab"},
            "logLevel": "INFO"
        }))
        .unwrap();

        assert_eq!(device.num_id, 2820786534893843);
        assert_eq!(
            device.credentials[0].public_key.as_ref().unwrap().format,
            PublicKeyFormat::Es256Pem
        );
        assert_eq!(device.config.as_ref().unwrap().version, 3);
        assert_eq!(device.config.as_ref().unwrap().binary_data, b"on".to_vec());
        assert!(device.is_gateway());
        assert_eq!(device.log_level, LogLevel::Info);
        assert_eq!(device.metadata.get("site").map(String::as_str), Some("lab"));
        assert!(!device.blocked);
    }

    #[test]
    fn test_defaults_are_omitted() {
        let device = Device {
            id: "d0".into(),
            credentials: vec![DeviceCredential::public_key(PublicKeyFormat::RsaX509Pem, "pem")],
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&device).unwrap(),
            json!({
                "id": "d0",
                "credentials": [{"publicKey": {"format": "RSA_X509_PEM", "key": "pem"}}]
            })
        );
    }

    #[test]
    fn test_registry_round_trip_fields() {
        let registry = DeviceRegistry {
            id: "r0".into(),
            event_notification_configs: vec![EventNotificationConfig {
                pubsub_topic_name: "projects/p0/topics/telemetry".into(),
                ..Default::default()
            }],
            mqtt_config: Some(MqttConfig {
                mqtt_enabled_state: MqttState::MqttEnabled,
            }),
            http_config: Some(HttpConfig {
                http_enabled_state: HttpState::HttpDisabled,
            }),
            ..Default::default()
        };
        let encoded = serde_json::to_value(&registry).unwrap();
        assert_eq!(encoded["mqttConfig"]["mqttEnabledState"], "MQTT_ENABLED");
        assert_eq!(encoded["httpConfig"]["httpEnabledState"], "HTTP_DISABLED");
        assert_eq!(
            encoded["eventNotificationConfigs"][0]["pubsubTopicName"],
            "projects/p0/topics/telemetry"
        );
    }

    #[test]
    fn test_policy_add_member() {
        let mut policy = Policy::default();
        assert!(policy.add_member("roles/viewer", "user:a@example.com"));
        assert!(policy.add_member("roles/viewer", "user:b@example.com"));
        assert!(!policy.add_member("roles/viewer", "user:a@example.com"));
        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(policy.bindings[0].members.len(), 2);
    }

    #[test]
    fn test_policy_etag_is_base64() {
        let policy: Policy = serde_json::from_value(json!({"version": 1, "etag": "BwWWja0YfJA="})).unwrap();
        assert_eq!(policy.etag, vec![0x07, 0x05, 0x96, 0x8d, 0xad, 0x18, 0x7c, 0x90]);
        assert_eq!(serde_json::to_value(&policy).unwrap()["etag"], "BwWWja0YfJA=");
    }
}
