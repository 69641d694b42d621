//! Client library for the Cloud IoT device manager API
//!
//! Manages device registries, devices, configuration versions, reported
//! states, commands, gateway bindings and IAM policies. Calls carry a routing
//! header, run under per-method retry policies and can be sent over any
//! [`Transport`]; RPC-over-HTTP is bundled.

pub mod gcp;
pub mod iot;

pub use gcp::auth::CredentialSource;
pub use gcp::error::{Error, Result};
pub use gcp::pagination::{spawn_items, Page};
pub use gcp::settings::{CallOptions, CallSettings, RetrySettings};
pub use gcp::status::{Code, Status};
pub use gcp::transport::{RpcCall, Transport};
pub use iot::client::{ClientOptions, DeviceManagerClient};
pub use iot::model::*;
pub use iot::path::{DeviceName, LocationName, PathError, PathTemplate, RegistryName};
pub use iot::requests::*;
pub use iot::FieldMask;
