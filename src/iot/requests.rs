//! Request and response messages for every device manager method

use super::model::{Device, DeviceConfig, DeviceRegistry, DeviceState, GatewayType, Policy};
use super::wire::{self, is_zero, FieldMask};
use serde::{Deserialize, Serialize};

/// Empty response message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateDeviceRegistryRequest {
    /// `projects/{project}/locations/{location}`
    pub parent: String,
    pub device_registry: DeviceRegistry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetDeviceRegistryRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateDeviceRegistryRequest {
    /// `device_registry.name` identifies the registry to update
    pub device_registry: DeviceRegistry,
    #[serde(skip_serializing_if = "FieldMask::is_empty")]
    pub update_mask: FieldMask,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteDeviceRegistryRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDeviceRegistriesRequest {
    pub parent: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDeviceRegistriesResponse {
    pub device_registries: Vec<DeviceRegistry>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateDeviceRequest {
    /// `projects/{project}/locations/{location}/registries/{registry}`
    pub parent: String,
    pub device: Device,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetDeviceRequest {
    pub name: String,
    #[serde(skip_serializing_if = "FieldMask::is_empty")]
    pub field_mask: FieldMask,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateDeviceRequest {
    /// `device.name` identifies the device to update
    pub device: Device,
    #[serde(skip_serializing_if = "FieldMask::is_empty")]
    pub update_mask: FieldMask,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteDeviceRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDevicesRequest {
    pub parent: String,
    #[serde(with = "wire::int64::vec", skip_serializing_if = "Vec::is_empty")]
    pub device_num_ids: Vec<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub device_ids: Vec<String>,
    #[serde(skip_serializing_if = "FieldMask::is_empty")]
    pub field_mask: FieldMask,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_list_options: Option<GatewayListOptions>,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page_token: String,
}

/// Restricts a device listing to gateways or to one gateway's associations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GatewayListOptions {
    /// Only devices of this gateway type
    GatewayType(GatewayType),
    /// Only devices bound to this gateway (id or numeric id)
    AssociationsGatewayId(String),
    /// Only gateways this device is bound to
    AssociationsDeviceId(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDevicesResponse {
    pub devices: Vec<Device>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModifyCloudToDeviceConfigRequest {
    pub name: String,
    /// Expected current version; 0 updates unconditionally
    #[serde(with = "wire::int64", skip_serializing_if = "is_zero")]
    pub version_to_update: i64,
    #[serde(with = "wire::bytes")]
    pub binary_data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDeviceConfigVersionsRequest {
    pub name: String,
    /// 0 returns every retained version
    #[serde(skip_serializing_if = "is_zero")]
    pub num_versions: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDeviceConfigVersionsResponse {
    pub device_configs: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDeviceStatesRequest {
    pub name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub num_states: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDeviceStatesResponse {
    pub device_states: Vec<DeviceState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetIamPolicyRequest {
    pub resource: String,
    pub policy: Policy,
    #[serde(skip_serializing_if = "FieldMask::is_empty")]
    pub update_mask: FieldMask,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetIamPolicyRequest {
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GetPolicyOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetPolicyOptions {
    #[serde(skip_serializing_if = "is_zero")]
    pub requested_policy_version: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestIamPermissionsRequest {
    pub resource: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestIamPermissionsResponse {
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendCommandToDeviceRequest {
    pub name: String,
    #[serde(with = "wire::bytes")]
    pub binary_data: Vec<u8>,
    /// MQTT subfolder, without the leading slash
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subfolder: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendCommandToDeviceResponse {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BindDeviceToGatewayRequest {
    pub parent: String,
    pub gateway_id: String,
    pub device_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BindDeviceToGatewayResponse {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnbindDeviceFromGatewayRequest {
    pub parent: String,
    pub gateway_id: String,
    pub device_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnbindDeviceFromGatewayResponse {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_devices_request_encoding() {
        let request = ListDevicesRequest {
            parent: "projects/p/locations/l/registries/r".into(),
            device_num_ids: vec![42],
            gateway_list_options: Some(GatewayListOptions::AssociationsGatewayId("gw1".into())),
            page_size: 10,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "parent": "projects/p/locations/l/registries/r",
                "deviceNumIds": ["42"],
                "gatewayListOptions": {"associationsGatewayId": "gw1"},
                "pageSize": 10
            })
        );
    }

    #[test]
    fn test_gateway_type_option() {
        let options = GatewayListOptions::GatewayType(GatewayType::Gateway);
        assert_eq!(serde_json::to_value(&options).unwrap(), json!({"gatewayType": "GATEWAY"}));
    }

    #[test]
    fn test_modify_config_encoding() {
        let request = ModifyCloudToDeviceConfigRequest {
            name: "projects/p/locations/l/registries/r/devices/d".into(),
            version_to_update: 4,
            binary_data: b"{\"fan\":1}".to_vec(),
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["versionToUpdate"], "4");
        assert_eq!(encoded["binaryData"], "eyJmYW4iOjF9");
    }

    #[test]
    fn test_empty_responses_decode() {
        let _: Empty = serde_json::from_value(json!({})).unwrap();
        let _: SendCommandToDeviceResponse = serde_json::from_value(json!({})).unwrap();
        let response: ListDevicesResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.devices.is_empty());
        assert!(response.next_page_token.is_empty());
    }
}
