//! Device manager client
//!
//! [`DeviceManagerClient`] exposes one async method per RPC. Every method goes
//! through [`DeviceManagerClient::invoke`], which encodes the request, derives
//! the routing header, resolves call settings and runs the call under its
//! retry policy.
//!
//! ```ignore
//! use cloudiot::{ClientOptions, DeviceManagerClient, DeviceName, GetDeviceRequest};
//!
//! async fn example() -> cloudiot::Result<()> {
//!     let client = DeviceManagerClient::new(ClientOptions::default()).await?;
//!     let name = DeviceName::new("my-project", "us-central1", "my-registry", "my-device");
//!     let device = client
//!         .get_device(GetDeviceRequest { name: name.to_string(), ..Default::default() }, None)
//!         .await?;
//!     println!("{} blocked={}", device.id, device.blocked);
//!     Ok(())
//! }
//! ```

use super::methods::{self, MethodDescriptor};
use super::model::{Device, DeviceConfig, DeviceRegistry, DeviceState, Policy};
use super::path::{DeviceName, LocationName, RegistryName};
use super::requests::*;
use crate::gcp::auth::{CredentialSource, GcpCredentials};
use crate::gcp::error::{Error, Result};
use crate::gcp::http::HttpTransport;
use crate::gcp::pagination::{self, Page, PagedRequest, PagedResponse};
use crate::gcp::routing;
use crate::gcp::settings::{self, CallOptions, CallSettings};
use crate::gcp::transport::{RpcCall, Transport};
use futures::stream::{BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_ENDPOINT: &str = "cloudiot.googleapis.com";
pub const DEFAULT_PORT: u16 = 443;

/// Construction-time configuration
///
/// The transport is picked by the constructor rather than an option:
/// [`DeviceManagerClient::new`] builds the bundled RPC-over-HTTP transport,
/// and [`DeviceManagerClient::with_transport`] accepts any other
/// [`Transport`] (gRPC, a test double) while still applying these options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Host name, or a full base URL such as `http://localhost:8080`
    pub endpoint: String,
    pub port: u16,
    pub credentials: CredentialSource,
    /// Replaces the default scopes when non-empty
    pub scopes: Vec<String>,
    /// Per-method settings, keyed by RPC name (e.g. `GetDevice`)
    pub method_settings: HashMap<String, CallSettings>,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            port: DEFAULT_PORT,
            credentials: CredentialSource::default(),
            scopes: Vec::new(),
            method_settings: HashMap::new(),
            user_agent: format!("cloudiot/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientOptions {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialSource) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Override the default settings of one method
    pub fn with_method_settings(mut self, method: &str, settings: CallSettings) -> Self {
        self.method_settings.insert(method.to_string(), settings);
        self
    }

    /// Base URL for RPC-over-HTTP
    pub fn base_url(&self) -> String {
        if self.endpoint.contains("://") {
            return self.endpoint.trim_end_matches('/').to_string();
        }
        if self.port == DEFAULT_PORT {
            format!("https://{}", self.endpoint)
        } else {
            format!("https://{}:{}", self.endpoint, self.port)
        }
    }
}

/// Settings for every method, resolved once at construction
#[derive(Debug, Clone)]
pub struct SettingsTable {
    settings: HashMap<&'static str, CallSettings>,
}

impl SettingsTable {
    pub fn new(overrides: &HashMap<String, CallSettings>) -> Result<Self> {
        if let Some(unknown) = overrides.keys().find(|name| methods::find(name).is_none()) {
            return Err(Error::Config(format!("unknown method '{}'", unknown)));
        }

        let settings = methods::ALL_METHODS
            .iter()
            .map(|method| {
                let resolved = overrides
                    .get(method.name)
                    .cloned()
                    .unwrap_or_else(|| method.retry.default_settings());
                (method.name, resolved)
            })
            .collect();

        Ok(Self { settings })
    }

    pub fn get(&self, method: &MethodDescriptor) -> CallSettings {
        self.settings
            .get(method.name)
            .cloned()
            .unwrap_or_else(|| method.retry.default_settings())
    }
}

/// Client for the device manager service
#[derive(Clone)]
pub struct DeviceManagerClient {
    transport: Arc<dyn Transport>,
    settings: Arc<SettingsTable>,
    credentials: Option<GcpCredentials>,
}

impl DeviceManagerClient {
    /// Create a client using RPC-over-HTTP
    pub async fn new(options: ClientOptions) -> Result<Self> {
        let credentials = GcpCredentials::new(&options.credentials, &options.scopes).await?;
        let transport = HttpTransport::new(&options.base_url(), credentials.clone(), &options.user_agent)?;
        tracing::debug!("Device manager client using {}", transport.base_url());

        let mut client = Self::with_transport(Arc::new(transport), &options)?;
        client.credentials = Some(credentials);
        Ok(client)
    }

    /// Create a client over a caller-provided transport
    pub fn with_transport(transport: Arc<dyn Transport>, options: &ClientOptions) -> Result<Self> {
        Ok(Self {
            transport,
            settings: Arc::new(SettingsTable::new(&options.method_settings)?),
            credentials: None,
        })
    }

    /// Project the active credentials belong to, if known
    pub async fn get_project_id(&self) -> Option<String> {
        match &self.credentials {
            Some(credentials) => credentials.project_id().await,
            None => None,
        }
    }

    /// Settings `method` runs with when no per-call options are given
    pub fn call_settings(&self, method: &MethodDescriptor) -> CallSettings {
        self.settings.get(method)
    }

    async fn invoke<Req, Resp>(
        &self,
        method: &'static MethodDescriptor,
        request: &Req,
        options: Option<CallOptions>,
    ) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let request = serde_json::to_value(request)?;
        let request_params = routing::request_params(method.routing, &request);
        let settings = options.unwrap_or_default().resolve(&self.settings.get(method));

        let call = RpcCall {
            method,
            request,
            request_params,
            timeout: settings.timeout,
        };

        let response = settings::execute(method.name, &settings, || self.transport.call(&call)).await?;
        Ok(serde_json::from_value(response)?)
    }

    // =========================================================================
    // Registries
    // =========================================================================

    pub async fn create_device_registry(
        &self,
        request: CreateDeviceRegistryRequest,
        options: Option<CallOptions>,
    ) -> Result<DeviceRegistry> {
        self.invoke(&methods::CREATE_DEVICE_REGISTRY, &request, options).await
    }

    pub async fn get_device_registry(
        &self,
        request: GetDeviceRegistryRequest,
        options: Option<CallOptions>,
    ) -> Result<DeviceRegistry> {
        self.invoke(&methods::GET_DEVICE_REGISTRY, &request, options).await
    }

    pub async fn update_device_registry(
        &self,
        request: UpdateDeviceRegistryRequest,
        options: Option<CallOptions>,
    ) -> Result<DeviceRegistry> {
        self.invoke(&methods::UPDATE_DEVICE_REGISTRY, &request, options).await
    }

    pub async fn delete_device_registry(
        &self,
        request: DeleteDeviceRegistryRequest,
        options: Option<CallOptions>,
    ) -> Result<Empty> {
        self.invoke(&methods::DELETE_DEVICE_REGISTRY, &request, options).await
    }

    /// One page of registries
    pub async fn list_device_registries(
        &self,
        request: ListDeviceRegistriesRequest,
        options: Option<CallOptions>,
    ) -> Result<Page<ListDeviceRegistriesRequest, DeviceRegistry>> {
        let response: ListDeviceRegistriesResponse = self
            .invoke(&methods::LIST_DEVICE_REGISTRIES, &request, options)
            .await?;
        Ok(Page::from_response(&request, response))
    }

    /// Every registry, fetching pages lazily
    pub fn list_device_registries_stream(
        &self,
        request: ListDeviceRegistriesRequest,
        options: Option<CallOptions>,
    ) -> BoxStream<'static, Result<DeviceRegistry>> {
        let client = self.clone();
        pagination::items(request, move |request| {
            let client = client.clone();
            let options = options.clone();
            async move { client.list_device_registries(request, options).await }
        })
        .boxed()
    }

    /// Every registry, collected across all pages
    pub async fn list_device_registries_all(
        &self,
        request: ListDeviceRegistriesRequest,
        options: Option<CallOptions>,
    ) -> Result<Vec<DeviceRegistry>> {
        pagination::collect_all(self.list_device_registries_stream(request, options)).await
    }

    // =========================================================================
    // Devices
    // =========================================================================

    pub async fn create_device(
        &self,
        request: CreateDeviceRequest,
        options: Option<CallOptions>,
    ) -> Result<Device> {
        self.invoke(&methods::CREATE_DEVICE, &request, options).await
    }

    pub async fn get_device(&self, request: GetDeviceRequest, options: Option<CallOptions>) -> Result<Device> {
        self.invoke(&methods::GET_DEVICE, &request, options).await
    }

    pub async fn update_device(
        &self,
        request: UpdateDeviceRequest,
        options: Option<CallOptions>,
    ) -> Result<Device> {
        self.invoke(&methods::UPDATE_DEVICE, &request, options).await
    }

    pub async fn delete_device(&self, request: DeleteDeviceRequest, options: Option<CallOptions>) -> Result<Empty> {
        self.invoke(&methods::DELETE_DEVICE, &request, options).await
    }

    /// One page of devices
    pub async fn list_devices(
        &self,
        request: ListDevicesRequest,
        options: Option<CallOptions>,
    ) -> Result<Page<ListDevicesRequest, Device>> {
        let response: ListDevicesResponse = self.invoke(&methods::LIST_DEVICES, &request, options).await?;
        Ok(Page::from_response(&request, response))
    }

    /// Every device, fetching pages lazily
    pub fn list_devices_stream(
        &self,
        request: ListDevicesRequest,
        options: Option<CallOptions>,
    ) -> BoxStream<'static, Result<Device>> {
        let client = self.clone();
        pagination::items(request, move |request| {
            let client = client.clone();
            let options = options.clone();
            async move { client.list_devices(request, options).await }
        })
        .boxed()
    }

    /// Every device, collected across all pages
    pub async fn list_devices_all(
        &self,
        request: ListDevicesRequest,
        options: Option<CallOptions>,
    ) -> Result<Vec<Device>> {
        pagination::collect_all(self.list_devices_stream(request, options)).await
    }

    // =========================================================================
    // Configuration, state and commands
    // =========================================================================

    pub async fn modify_cloud_to_device_config(
        &self,
        request: ModifyCloudToDeviceConfigRequest,
        options: Option<CallOptions>,
    ) -> Result<DeviceConfig> {
        self.invoke(&methods::MODIFY_CLOUD_TO_DEVICE_CONFIG, &request, options).await
    }

    /// Config versions, newest first
    pub async fn list_device_config_versions(
        &self,
        request: ListDeviceConfigVersionsRequest,
        options: Option<CallOptions>,
    ) -> Result<Vec<DeviceConfig>> {
        let response: ListDeviceConfigVersionsResponse = self
            .invoke(&methods::LIST_DEVICE_CONFIG_VERSIONS, &request, options)
            .await?;
        Ok(response.device_configs)
    }

    /// Reported states, newest first
    pub async fn list_device_states(
        &self,
        request: ListDeviceStatesRequest,
        options: Option<CallOptions>,
    ) -> Result<Vec<DeviceState>> {
        let response: ListDeviceStatesResponse = self
            .invoke(&methods::LIST_DEVICE_STATES, &request, options)
            .await?;
        Ok(response.device_states)
    }

    pub async fn send_command_to_device(
        &self,
        request: SendCommandToDeviceRequest,
        options: Option<CallOptions>,
    ) -> Result<SendCommandToDeviceResponse> {
        self.invoke(&methods::SEND_COMMAND_TO_DEVICE, &request, options).await
    }

    // =========================================================================
    // Gateways
    // =========================================================================

    pub async fn bind_device_to_gateway(
        &self,
        request: BindDeviceToGatewayRequest,
        options: Option<CallOptions>,
    ) -> Result<BindDeviceToGatewayResponse> {
        self.invoke(&methods::BIND_DEVICE_TO_GATEWAY, &request, options).await
    }

    pub async fn unbind_device_from_gateway(
        &self,
        request: UnbindDeviceFromGatewayRequest,
        options: Option<CallOptions>,
    ) -> Result<UnbindDeviceFromGatewayResponse> {
        self.invoke(&methods::UNBIND_DEVICE_FROM_GATEWAY, &request, options).await
    }

    // =========================================================================
    // IAM
    // =========================================================================

    pub async fn set_iam_policy(&self, request: SetIamPolicyRequest, options: Option<CallOptions>) -> Result<Policy> {
        self.invoke(&methods::SET_IAM_POLICY, &request, options).await
    }

    pub async fn get_iam_policy(&self, request: GetIamPolicyRequest, options: Option<CallOptions>) -> Result<Policy> {
        self.invoke(&methods::GET_IAM_POLICY, &request, options).await
    }

    pub async fn test_iam_permissions(
        &self,
        request: TestIamPermissionsRequest,
        options: Option<CallOptions>,
    ) -> Result<TestIamPermissionsResponse> {
        self.invoke(&methods::TEST_IAM_PERMISSIONS, &request, options).await
    }

    // =========================================================================
    // Resource names
    // =========================================================================

    pub fn device_path(&self, project: &str, location: &str, registry: &str, device: &str) -> String {
        DeviceName::new(project, location, registry, device).to_string()
    }

    pub fn registry_path(&self, project: &str, location: &str, registry: &str) -> String {
        RegistryName::new(project, location, registry).to_string()
    }

    pub fn location_path(&self, project: &str, location: &str) -> String {
        LocationName::new(project, location).to_string()
    }

    pub fn match_project_from_device_name(&self, name: &str) -> Result<String> {
        Ok(DeviceName::parse(name)?.project)
    }

    pub fn match_location_from_device_name(&self, name: &str) -> Result<String> {
        Ok(DeviceName::parse(name)?.location)
    }

    pub fn match_registry_from_device_name(&self, name: &str) -> Result<String> {
        Ok(DeviceName::parse(name)?.registry)
    }

    pub fn match_device_from_device_name(&self, name: &str) -> Result<String> {
        Ok(DeviceName::parse(name)?.device)
    }

    pub fn match_project_from_registry_name(&self, name: &str) -> Result<String> {
        Ok(RegistryName::parse(name)?.project)
    }

    pub fn match_location_from_registry_name(&self, name: &str) -> Result<String> {
        Ok(RegistryName::parse(name)?.location)
    }

    pub fn match_registry_from_registry_name(&self, name: &str) -> Result<String> {
        Ok(RegistryName::parse(name)?.registry)
    }

    pub fn match_project_from_location_name(&self, name: &str) -> Result<String> {
        Ok(LocationName::parse(name)?.project)
    }

    pub fn match_location_from_location_name(&self, name: &str) -> Result<String> {
        Ok(LocationName::parse(name)?.location)
    }
}

macro_rules! paged {
    ($request:ty, $response:ty, $item:ty, $field:ident) => {
        impl PagedRequest for $request {
            fn page_token(&self) -> &str {
                &self.page_token
            }

            fn set_page_token(&mut self, token: String) {
                self.page_token = token;
            }
        }

        impl PagedResponse for $response {
            type Item = $item;

            fn next_page_token(&self) -> &str {
                &self.next_page_token
            }

            fn into_items(self) -> Vec<$item> {
                self.$field
            }
        }
    };
}

paged!(ListDeviceRegistriesRequest, ListDeviceRegistriesResponse, DeviceRegistry, device_registries);
paged!(ListDevicesRequest, ListDevicesResponse, Device, devices);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::status::Code;
    use std::time::Duration;

    #[test]
    fn test_base_url() {
        assert_eq!(ClientOptions::default().base_url(), "https://cloudiot.googleapis.com");
        assert_eq!(
            ClientOptions::default().with_port(8443).base_url(),
            "https://cloudiot.googleapis.com:8443"
        );
        assert_eq!(
            ClientOptions::default().with_endpoint("http://localhost:9000/").base_url(),
            "http://localhost:9000"
        );
    }

    #[test]
    fn test_settings_table_defaults_and_overrides() {
        let table = SettingsTable::new(&HashMap::new()).unwrap();
        let get = table.get(&methods::GET_DEVICE);
        assert_eq!(get.retry.unwrap().retry_codes, vec![Code::Unavailable]);
        assert!(table.get(&methods::CREATE_DEVICE).retry.is_none());
        assert_eq!(
            table.get(&methods::SEND_COMMAND_TO_DEVICE).retry.unwrap().retry_codes,
            vec![Code::Unavailable, Code::ResourceExhausted]
        );

        let options = ClientOptions::default().with_method_settings(
            "GetDevice",
            CallSettings {
                timeout: Duration::from_secs(5),
                retry: None,
            },
        );
        let table = SettingsTable::new(&options.method_settings).unwrap();
        assert_eq!(table.get(&methods::GET_DEVICE).timeout, Duration::from_secs(5));
        assert!(table.get(&methods::GET_DEVICE).retry.is_none());
    }

    #[test]
    fn test_unknown_method_override_is_rejected() {
        let options = ClientOptions::default().with_method_settings("GetGadget", CallSettings::no_retry());
        assert!(matches!(SettingsTable::new(&options.method_settings), Err(Error::Config(_))));
    }
}
