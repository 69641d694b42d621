//! CLI subcommands
//!
//! Each subcommand maps onto one or two client calls. Results are printed to
//! stdout as JSON or YAML; progress and page tokens go to stderr.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use cloudiot::{
    spawn_items, BindDeviceToGatewayRequest, CallOptions, CreateDeviceRegistryRequest, CreateDeviceRequest,
    DeleteDeviceRegistryRequest, DeleteDeviceRequest, Device, DeviceCredential, DeviceManagerClient, DeviceName,
    DeviceRegistry, EventNotificationConfig, FieldMask, GatewayConfig, GatewayListOptions, GatewayType,
    GetDeviceRegistryRequest, GetDeviceRequest, GetIamPolicyRequest, HttpConfig, HttpState,
    ListDeviceConfigVersionsRequest, ListDeviceRegistriesRequest, ListDeviceStatesRequest, ListDevicesRequest,
    LocationName, ModifyCloudToDeviceConfigRequest, MqttConfig, MqttState, PublicKeyFormat, RegistryName,
    SendCommandToDeviceRequest, SetIamPolicyRequest, StateNotificationConfig, TestIamPermissionsRequest,
    UnbindDeviceFromGatewayRequest, UpdateDeviceRequest,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Buffered items between the listing task and the printer
const LIST_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage device registries
    #[command(subcommand)]
    Registries(RegistryCommand),
    /// Manage devices in a registry
    #[command(subcommand)]
    Devices(DeviceCommand),
    /// Push configuration to devices and read config history
    #[command(subcommand)]
    Configs(DeviceConfigCommand),
    /// Read states reported by devices
    #[command(subcommand)]
    States(StateCommand),
    /// Send commands to connected devices
    #[command(subcommand)]
    Commands(CommandsCommand),
    /// Bind devices to gateways
    #[command(subcommand)]
    Gateways(GatewayCommand),
    /// Manage the IAM policy of a registry
    #[command(subcommand)]
    Iam(IamCommand),
    /// Show or change saved defaults
    #[command(subcommand)]
    Config(SettingsCommand),
}

#[derive(Args, Debug, Clone, Default)]
pub struct PageArgs {
    /// Maximum results per page
    #[arg(long)]
    page_size: Option<i32>,
    /// Resume from this page token and fetch a single page
    #[arg(long)]
    page_token: Option<String>,
    /// Fetch only the first page and print the next page token
    #[arg(long)]
    single_page: bool,
}

impl PageArgs {
    fn single(&self) -> bool {
        self.single_page || self.page_token.is_some()
    }
}

#[derive(Subcommand, Debug)]
pub enum RegistryCommand {
    /// List registries in the location
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one registry
    Get { id: String },
    /// Create a registry
    Create {
        id: String,
        /// Pub/Sub topic for telemetry events (projects/<p>/topics/<t>)
        #[arg(long)]
        event_topic: Option<String>,
        /// Pub/Sub topic for state changes
        #[arg(long)]
        state_topic: Option<String>,
        /// Reject MQTT connections
        #[arg(long)]
        disable_mqtt: bool,
        /// Reject HTTP connections
        #[arg(long)]
        disable_http: bool,
    },
    /// Delete a registry (it must contain no devices)
    Delete { id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KeyFormat {
    RsaPem,
    RsaX509Pem,
    Es256Pem,
    Es256X509Pem,
}

impl From<KeyFormat> for PublicKeyFormat {
    fn from(format: KeyFormat) -> Self {
        match format {
            KeyFormat::RsaPem => PublicKeyFormat::RsaPem,
            KeyFormat::RsaX509Pem => PublicKeyFormat::RsaX509Pem,
            KeyFormat::Es256Pem => PublicKeyFormat::Es256Pem,
            KeyFormat::Es256X509Pem => PublicKeyFormat::Es256X509Pem,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    /// List devices in the registry
    List {
        #[command(flatten)]
        page: PageArgs,
        /// Only list gateways
        #[arg(long)]
        gateways: bool,
    },
    /// Show one device
    Get { device: String },
    /// Create a device
    Create {
        device: String,
        /// Public key file the device authenticates with
        #[arg(long)]
        public_key: Option<PathBuf>,
        /// Format of the public key
        #[arg(long, value_enum, default_value = "rsa-x509-pem")]
        key_format: KeyFormat,
        /// Create the device as a gateway
        #[arg(long)]
        gateway: bool,
        /// Metadata entries as key=value
        #[arg(long = "metadata", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },
    /// Delete a device
    Delete { device: String },
    /// Deny the device's connections
    Block { device: String },
    /// Allow the device to connect again
    Unblock { device: String },
}

#[derive(Subcommand, Debug)]
pub enum DeviceConfigCommand {
    /// Push a new configuration version
    Update {
        device: String,
        /// Configuration payload
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        data: Option<String>,
        /// Read the payload from a file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Only update if the current version matches
        #[arg(long, default_value_t = 0)]
        expected_version: i64,
    },
    /// List recent configuration versions, newest first
    History {
        device: String,
        /// Number of versions to return (0 for all retained)
        #[arg(long, default_value_t = 0)]
        limit: i32,
    },
}

#[derive(Subcommand, Debug)]
pub enum StateCommand {
    /// List recent states, newest first
    List {
        device: String,
        /// Number of states to return (0 for all retained)
        #[arg(long, default_value_t = 0)]
        limit: i32,
    },
}

#[derive(Subcommand, Debug)]
pub enum CommandsCommand {
    /// Send a command to a connected device
    Send {
        device: String,
        /// Command payload
        data: String,
        /// MQTT subfolder for the command
        #[arg(long)]
        subfolder: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum GatewayCommand {
    /// Associate a device with a gateway
    Bind { gateway: String, device: String },
    /// Remove a device's association with a gateway
    Unbind { gateway: String, device: String },
    /// List devices bound to a gateway
    Devices { gateway: String },
}

#[derive(Subcommand, Debug)]
pub enum IamCommand {
    /// Show the registry's IAM policy
    Get,
    /// Grant a role to a member (e.g. user:alice@example.com)
    AddMember { role: String, member: String },
    /// Report which of the given permissions the caller holds
    Test { permissions: Vec<String> },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print saved defaults
    Show,
    /// Save the given --project, --location and --registry as defaults
    Set,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

pub fn print_value<T: Serialize + ?Sized>(format: OutputFormat, value: &T) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

/// Everything a subcommand needs to run
pub struct Session {
    pub client: DeviceManagerClient,
    pub location: LocationName,
    pub registry: Option<String>,
    pub output: OutputFormat,
    pub call: CallOptions,
}

impl Session {
    fn registry(&self) -> Result<RegistryName> {
        let Some(id) = &self.registry else {
            bail!("no registry given; pass --registry or run 'cloudiot config set --registry <id>'");
        };
        Ok(self.location.registry(id.as_str()))
    }

    fn device(&self, id: &str) -> Result<DeviceName> {
        Ok(self.registry()?.device(id))
    }

    fn options(&self) -> Option<CallOptions> {
        Some(self.call.clone())
    }

    fn print<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        print_value(self.output, value)
    }
}

pub fn configure(command: &SettingsCommand, config: &mut Config, flags: Config, output: OutputFormat) -> Result<()> {
    match command {
        SettingsCommand::Show => print_value(output, &*config),
        SettingsCommand::Set => {
            if flags == Config::default() {
                bail!("nothing to set; pass --project, --location or --registry");
            }
            config.merge(flags);
            config.save().context("saving configuration")?;
            print_value(output, &*config)
        }
    }
}

pub async fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Registries(command) => registries(session, command).await,
        Command::Devices(command) => devices(session, command).await,
        Command::Configs(command) => configs(session, command).await,
        Command::States(StateCommand::List { device, limit }) => {
            let request = ListDeviceStatesRequest {
                name: session.device(&device)?.to_string(),
                num_states: limit,
            };
            let states = session.client.list_device_states(request, session.options()).await?;
            session.print(&states)
        }
        Command::Commands(CommandsCommand::Send { device, data, subfolder }) => {
            let request = SendCommandToDeviceRequest {
                name: session.device(&device)?.to_string(),
                binary_data: data.into_bytes(),
                subfolder: subfolder.unwrap_or_default(),
            };
            session.client.send_command_to_device(request, session.options()).await?;
            eprintln!("Sent command to {}", device);
            Ok(())
        }
        Command::Gateways(command) => gateways(session, command).await,
        Command::Iam(command) => iam(session, command).await,
        Command::Config(_) => bail!("config commands do not need a client"),
    }
}

async fn registries(session: &Session, command: RegistryCommand) -> Result<()> {
    let client = &session.client;
    match command {
        RegistryCommand::List { page } => {
            let request = ListDeviceRegistriesRequest {
                parent: session.location.to_string(),
                page_size: page.page_size.unwrap_or_default(),
                page_token: page.page_token.clone().unwrap_or_default(),
            };
            if page.single() {
                let page = client.list_device_registries(request, session.options()).await?;
                if let Some(next) = &page.next_request {
                    eprintln!("next page token: {}", next.page_token);
                }
                return session.print(&page.items);
            }
            let registries = client.list_device_registries_all(request, session.options()).await?;
            session.print(&registries)
        }
        RegistryCommand::Get { id } => {
            let request = GetDeviceRegistryRequest {
                name: session.location.registry(id).to_string(),
            };
            session.print(&client.get_device_registry(request, session.options()).await?)
        }
        RegistryCommand::Create {
            id,
            event_topic,
            state_topic,
            disable_mqtt,
            disable_http,
        } => {
            let registry = DeviceRegistry {
                id,
                event_notification_configs: event_topic
                    .into_iter()
                    .map(|topic| EventNotificationConfig {
                        pubsub_topic_name: topic,
                        ..Default::default()
                    })
                    .collect(),
                state_notification_config: state_topic.map(|topic| StateNotificationConfig {
                    pubsub_topic_name: topic,
                }),
                mqtt_config: Some(MqttConfig {
                    mqtt_enabled_state: if disable_mqtt {
                        MqttState::MqttDisabled
                    } else {
                        MqttState::MqttEnabled
                    },
                }),
                http_config: Some(HttpConfig {
                    http_enabled_state: if disable_http {
                        HttpState::HttpDisabled
                    } else {
                        HttpState::HttpEnabled
                    },
                }),
                ..Default::default()
            };
            let request = CreateDeviceRegistryRequest {
                parent: session.location.to_string(),
                device_registry: registry,
            };
            session.print(&client.create_device_registry(request, session.options()).await?)
        }
        RegistryCommand::Delete { id } => {
            let name = session.location.registry(id).to_string();
            client
                .delete_device_registry(DeleteDeviceRegistryRequest { name: name.clone() }, session.options())
                .await?;
            eprintln!("Deleted {}", name);
            Ok(())
        }
    }
}

async fn devices(session: &Session, command: DeviceCommand) -> Result<()> {
    let client = &session.client;
    match command {
        DeviceCommand::List { page, gateways } => {
            let request = ListDevicesRequest {
                parent: session.registry()?.to_string(),
                gateway_list_options: gateways.then_some(GatewayListOptions::GatewayType(GatewayType::Gateway)),
                page_size: page.page_size.unwrap_or_default(),
                page_token: page.page_token.clone().unwrap_or_default(),
                ..Default::default()
            };
            if page.single() {
                let page = client.list_devices(request, session.options()).await?;
                if let Some(next) = &page.next_request {
                    eprintln!("next page token: {}", next.page_token);
                }
                return session.print(&page.items);
            }
            let devices = drain(client, request, session.options()).await?;
            session.print(&devices)
        }
        DeviceCommand::Get { device } => {
            let request = GetDeviceRequest {
                name: session.device(&device)?.to_string(),
                ..Default::default()
            };
            session.print(&client.get_device(request, session.options()).await?)
        }
        DeviceCommand::Create {
            device,
            public_key,
            key_format,
            gateway,
            metadata,
        } => {
            let mut credentials = Vec::new();
            if let Some(path) = public_key {
                let key = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading public key {:?}", path))?;
                credentials.push(DeviceCredential::public_key(key_format.into(), key));
            }
            let device = Device {
                id: device,
                credentials,
                metadata: metadata.into_iter().collect::<BTreeMap<_, _>>(),
                gateway_config: gateway.then(|| GatewayConfig {
                    gateway_type: GatewayType::Gateway,
                    ..Default::default()
                }),
                ..Default::default()
            };
            let request = CreateDeviceRequest {
                parent: session.registry()?.to_string(),
                device,
            };
            session.print(&client.create_device(request, session.options()).await?)
        }
        DeviceCommand::Delete { device } => {
            let name = session.device(&device)?.to_string();
            client
                .delete_device(DeleteDeviceRequest { name: name.clone() }, session.options())
                .await?;
            eprintln!("Deleted {}", name);
            Ok(())
        }
        DeviceCommand::Block { device } => set_blocked(session, &device, true).await,
        DeviceCommand::Unblock { device } => set_blocked(session, &device, false).await,
    }
}

/// Collect a device listing through the background producer
async fn drain(
    client: &DeviceManagerClient,
    request: ListDevicesRequest,
    options: Option<CallOptions>,
) -> Result<Vec<Device>> {
    let mut rx = spawn_items(client.list_devices_stream(request, options), LIST_BUFFER);
    let mut devices = Vec::new();
    while let Some(device) = rx.recv().await {
        devices.push(device?);
    }
    Ok(devices)
}

async fn set_blocked(session: &Session, device: &str, blocked: bool) -> Result<()> {
    let request = UpdateDeviceRequest {
        device: Device {
            name: session.device(device)?.to_string(),
            blocked,
            ..Default::default()
        },
        update_mask: FieldMask::new(["blocked"]),
    };
    session.print(&session.client.update_device(request, session.options()).await?)
}

async fn configs(session: &Session, command: DeviceConfigCommand) -> Result<()> {
    match command {
        DeviceConfigCommand::Update {
            device,
            data,
            file,
            expected_version,
        } => {
            let binary_data = match (data, file) {
                (Some(data), _) => data.into_bytes(),
                (None, Some(path)) => std::fs::read(&path).with_context(|| format!("reading {:?}", path))?,
                (None, None) => bail!("pass --data or --file"),
            };
            let request = ModifyCloudToDeviceConfigRequest {
                name: session.device(&device)?.to_string(),
                version_to_update: expected_version,
                binary_data,
            };
            let config = session
                .client
                .modify_cloud_to_device_config(request, session.options())
                .await?;
            session.print(&config)
        }
        DeviceConfigCommand::History { device, limit } => {
            let request = ListDeviceConfigVersionsRequest {
                name: session.device(&device)?.to_string(),
                num_versions: limit,
            };
            let configs = session
                .client
                .list_device_config_versions(request, session.options())
                .await?;
            session.print(&configs)
        }
    }
}

async fn gateways(session: &Session, command: GatewayCommand) -> Result<()> {
    let parent = session.registry()?.to_string();
    match command {
        GatewayCommand::Bind { gateway, device } => {
            let request = BindDeviceToGatewayRequest {
                parent,
                gateway_id: gateway.clone(),
                device_id: device.clone(),
            };
            session.client.bind_device_to_gateway(request, session.options()).await?;
            eprintln!("Bound {} to gateway {}", device, gateway);
            Ok(())
        }
        GatewayCommand::Unbind { gateway, device } => {
            let request = UnbindDeviceFromGatewayRequest {
                parent,
                gateway_id: gateway.clone(),
                device_id: device.clone(),
            };
            session
                .client
                .unbind_device_from_gateway(request, session.options())
                .await?;
            eprintln!("Unbound {} from gateway {}", device, gateway);
            Ok(())
        }
        GatewayCommand::Devices { gateway } => {
            let request = ListDevicesRequest {
                parent,
                gateway_list_options: Some(GatewayListOptions::AssociationsGatewayId(gateway)),
                ..Default::default()
            };
            let devices = drain(&session.client, request, session.options()).await?;
            session.print(&devices)
        }
    }
}

async fn iam(session: &Session, command: IamCommand) -> Result<()> {
    let resource = session.registry()?.to_string();
    let client = &session.client;
    match command {
        IamCommand::Get => {
            let request = GetIamPolicyRequest {
                resource,
                ..Default::default()
            };
            session.print(&client.get_iam_policy(request, session.options()).await?)
        }
        IamCommand::AddMember { role, member } => {
            let request = GetIamPolicyRequest {
                resource: resource.clone(),
                ..Default::default()
            };
            let mut policy = client.get_iam_policy(request, session.options()).await?;
            if !policy.add_member(&role, &member) {
                eprintln!("{} already has {}", member, role);
                return session.print(&policy);
            }
            let request = SetIamPolicyRequest {
                resource,
                policy,
                ..Default::default()
            };
            session.print(&client.set_iam_policy(request, session.options()).await?)
        }
        IamCommand::Test { permissions } => {
            let request = TestIamPermissionsRequest { resource, permissions };
            let response = client.test_iam_permissions(request, session.options()).await?;
            session.print(&response.permissions)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(parse_key_value("site=lab").unwrap(), ("site".into(), "lab".into()));
        assert_eq!(parse_key_value("empty=").unwrap(), ("empty".into(), String::new()));
        assert!(parse_key_value("=x").is_err());
        assert!(parse_key_value("novalue").is_err());
    }

    #[test]
    fn test_page_args_single_page() {
        assert!(!PageArgs::default().single());
        let resume = PageArgs {
            page_token: Some("abc".into()),
            ..Default::default()
        };
        assert!(resume.single());
    }
}
