//! Cloud IoT device manager
//!
//! - [`client`] - [`DeviceManagerClient`](client::DeviceManagerClient) and its options
//! - [`methods`] - Per-method descriptors: routing, REST binding, retry class
//! - [`model`] - Registry, device, config, state and IAM resources
//! - [`path`] - Resource name templates
//! - [`requests`] - Request and response messages

pub mod client;
pub mod methods;
pub mod model;
pub mod path;
pub mod requests;
pub(crate) mod wire;

pub use wire::FieldMask;
