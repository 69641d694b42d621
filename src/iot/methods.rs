//! Method table
//!
//! One static [`MethodDescriptor`] per device manager method: its RPC name,
//! the request fields used for routing, its RPC-over-HTTP binding, and the
//! settings group that decides its default timeout and retry policy.

use crate::gcp::routing::RoutingField;
use crate::gcp::settings::CallSettings;
use crate::gcp::status::Code;

pub const SERVICE_NAME: &str = "google.cloud.iot.v1.DeviceManager";

/// HTTP verb of a REST binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
    Patch,
    Delete,
}

/// Which part of the request becomes the HTTP body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpBody {
    /// No body; non-path fields go to the query string
    None,
    /// The named top-level field; other non-path fields go to the query string
    Field(&'static str),
    /// The whole request minus path fields
    All,
}

/// `google.api.http` binding.
///
/// Path variables are JSON field paths, e.g. `{device.name}`; their values
/// are substituted verbatim, slashes included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRule {
    pub verb: HttpVerb,
    pub path: &'static str,
    pub body: HttpBody,
}

/// Default retry behavior of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Safe to repeat; retried on UNAVAILABLE
    Idempotent,
    /// Retried when the service sheds load before applying the call
    RateLimitAware,
    /// Never retried
    NonIdempotent,
}

impl RetryClass {
    pub fn retry_codes(&self) -> &'static [Code] {
        match self {
            RetryClass::Idempotent => &[Code::Unavailable],
            RetryClass::RateLimitAware => &[Code::Unavailable, Code::ResourceExhausted],
            RetryClass::NonIdempotent => &[],
        }
    }

    pub fn default_settings(&self) -> CallSettings {
        match self {
            RetryClass::NonIdempotent => CallSettings::no_retry(),
            class => CallSettings::retrying(class.retry_codes()),
        }
    }
}

/// Static description of one RPC method
#[derive(Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// RPC method name, e.g. `GetDevice`
    pub name: &'static str,
    pub routing: &'static [RoutingField],
    pub http: HttpRule,
    pub retry: RetryClass,
}

impl MethodDescriptor {
    /// Fully qualified name, e.g. `google.cloud.iot.v1.DeviceManager/GetDevice`
    pub fn full_name(&self) -> String {
        format!("{}/{}", SERVICE_NAME, self.name)
    }
}

const PARENT: &[RoutingField] = &[RoutingField {
    key: "parent",
    path: &["parent"],
}];

const NAME: &[RoutingField] = &[RoutingField {
    key: "name",
    path: &["name"],
}];

const RESOURCE: &[RoutingField] = &[RoutingField {
    key: "resource",
    path: &["resource"],
}];

pub static CREATE_DEVICE_REGISTRY: MethodDescriptor = MethodDescriptor {
    name: "CreateDeviceRegistry",
    routing: PARENT,
    http: HttpRule {
        verb: HttpVerb::Post,
        path: "/v1/{parent}/registries",
        body: HttpBody::Field("deviceRegistry"),
    },
    retry: RetryClass::NonIdempotent,
};

pub static GET_DEVICE_REGISTRY: MethodDescriptor = MethodDescriptor {
    name: "GetDeviceRegistry",
    routing: NAME,
    http: HttpRule {
        verb: HttpVerb::Get,
        path: "/v1/{name}",
        body: HttpBody::None,
    },
    retry: RetryClass::Idempotent,
};

pub static UPDATE_DEVICE_REGISTRY: MethodDescriptor = MethodDescriptor {
    name: "UpdateDeviceRegistry",
    routing: &[RoutingField {
        key: "device_registry.name",
        path: &["deviceRegistry", "name"],
    }],
    http: HttpRule {
        verb: HttpVerb::Patch,
        path: "/v1/{deviceRegistry.name}",
        body: HttpBody::Field("deviceRegistry"),
    },
    retry: RetryClass::NonIdempotent,
};

pub static DELETE_DEVICE_REGISTRY: MethodDescriptor = MethodDescriptor {
    name: "DeleteDeviceRegistry",
    routing: NAME,
    http: HttpRule {
        verb: HttpVerb::Delete,
        path: "/v1/{name}",
        body: HttpBody::None,
    },
    retry: RetryClass::Idempotent,
};

pub static LIST_DEVICE_REGISTRIES: MethodDescriptor = MethodDescriptor {
    name: "ListDeviceRegistries",
    routing: PARENT,
    http: HttpRule {
        verb: HttpVerb::Get,
        path: "/v1/{parent}/registries",
        body: HttpBody::None,
    },
    retry: RetryClass::Idempotent,
};

pub static CREATE_DEVICE: MethodDescriptor = MethodDescriptor {
    name: "CreateDevice",
    routing: PARENT,
    http: HttpRule {
        verb: HttpVerb::Post,
        path: "/v1/{parent}/devices",
        body: HttpBody::Field("device"),
    },
    retry: RetryClass::NonIdempotent,
};

pub static GET_DEVICE: MethodDescriptor = MethodDescriptor {
    name: "GetDevice",
    routing: NAME,
    http: HttpRule {
        verb: HttpVerb::Get,
        path: "/v1/{name}",
        body: HttpBody::None,
    },
    retry: RetryClass::Idempotent,
};

pub static UPDATE_DEVICE: MethodDescriptor = MethodDescriptor {
    name: "UpdateDevice",
    routing: &[RoutingField {
        key: "device.name",
        path: &["device", "name"],
    }],
    http: HttpRule {
        verb: HttpVerb::Patch,
        path: "/v1/{device.name}",
        body: HttpBody::Field("device"),
    },
    retry: RetryClass::NonIdempotent,
};

pub static DELETE_DEVICE: MethodDescriptor = MethodDescriptor {
    name: "DeleteDevice",
    routing: NAME,
    http: HttpRule {
        verb: HttpVerb::Delete,
        path: "/v1/{name}",
        body: HttpBody::None,
    },
    retry: RetryClass::Idempotent,
};

pub static LIST_DEVICES: MethodDescriptor = MethodDescriptor {
    name: "ListDevices",
    routing: PARENT,
    http: HttpRule {
        verb: HttpVerb::Get,
        path: "/v1/{parent}/devices",
        body: HttpBody::None,
    },
    retry: RetryClass::Idempotent,
};

pub static MODIFY_CLOUD_TO_DEVICE_CONFIG: MethodDescriptor = MethodDescriptor {
    name: "ModifyCloudToDeviceConfig",
    routing: NAME,
    http: HttpRule {
        verb: HttpVerb::Post,
        path: "/v1/{name}:modifyCloudToDeviceConfig",
        body: HttpBody::All,
    },
    retry: RetryClass::RateLimitAware,
};

pub static LIST_DEVICE_CONFIG_VERSIONS: MethodDescriptor = MethodDescriptor {
    name: "ListDeviceConfigVersions",
    routing: NAME,
    http: HttpRule {
        verb: HttpVerb::Get,
        path: "/v1/{name}/configVersions",
        body: HttpBody::None,
    },
    retry: RetryClass::Idempotent,
};

pub static LIST_DEVICE_STATES: MethodDescriptor = MethodDescriptor {
    name: "ListDeviceStates",
    routing: NAME,
    http: HttpRule {
        verb: HttpVerb::Get,
        path: "/v1/{name}/states",
        body: HttpBody::None,
    },
    retry: RetryClass::Idempotent,
};

pub static SET_IAM_POLICY: MethodDescriptor = MethodDescriptor {
    name: "SetIamPolicy",
    routing: RESOURCE,
    http: HttpRule {
        verb: HttpVerb::Post,
        path: "/v1/{resource}:setIamPolicy",
        body: HttpBody::All,
    },
    retry: RetryClass::NonIdempotent,
};

pub static GET_IAM_POLICY: MethodDescriptor = MethodDescriptor {
    name: "GetIamPolicy",
    routing: RESOURCE,
    http: HttpRule {
        verb: HttpVerb::Post,
        path: "/v1/{resource}:getIamPolicy",
        body: HttpBody::All,
    },
    retry: RetryClass::NonIdempotent,
};

pub static TEST_IAM_PERMISSIONS: MethodDescriptor = MethodDescriptor {
    name: "TestIamPermissions",
    routing: RESOURCE,
    http: HttpRule {
        verb: HttpVerb::Post,
        path: "/v1/{resource}:testIamPermissions",
        body: HttpBody::All,
    },
    retry: RetryClass::NonIdempotent,
};

pub static SEND_COMMAND_TO_DEVICE: MethodDescriptor = MethodDescriptor {
    name: "SendCommandToDevice",
    routing: NAME,
    http: HttpRule {
        verb: HttpVerb::Post,
        path: "/v1/{name}:sendCommandToDevice",
        body: HttpBody::All,
    },
    retry: RetryClass::RateLimitAware,
};

pub static BIND_DEVICE_TO_GATEWAY: MethodDescriptor = MethodDescriptor {
    name: "BindDeviceToGateway",
    routing: PARENT,
    http: HttpRule {
        verb: HttpVerb::Post,
        path: "/v1/{parent}:bindDeviceToGateway",
        body: HttpBody::All,
    },
    retry: RetryClass::NonIdempotent,
};

pub static UNBIND_DEVICE_FROM_GATEWAY: MethodDescriptor = MethodDescriptor {
    name: "UnbindDeviceFromGateway",
    routing: PARENT,
    http: HttpRule {
        verb: HttpVerb::Post,
        path: "/v1/{parent}:unbindDeviceFromGateway",
        body: HttpBody::All,
    },
    retry: RetryClass::NonIdempotent,
};

/// Every method of the service
pub static ALL_METHODS: [&MethodDescriptor; 19] = [
    &CREATE_DEVICE_REGISTRY,
    &GET_DEVICE_REGISTRY,
    &UPDATE_DEVICE_REGISTRY,
    &DELETE_DEVICE_REGISTRY,
    &LIST_DEVICE_REGISTRIES,
    &CREATE_DEVICE,
    &GET_DEVICE,
    &UPDATE_DEVICE,
    &DELETE_DEVICE,
    &LIST_DEVICES,
    &MODIFY_CLOUD_TO_DEVICE_CONFIG,
    &LIST_DEVICE_CONFIG_VERSIONS,
    &LIST_DEVICE_STATES,
    &SET_IAM_POLICY,
    &GET_IAM_POLICY,
    &TEST_IAM_PERMISSIONS,
    &SEND_COMMAND_TO_DEVICE,
    &BIND_DEVICE_TO_GATEWAY,
    &UNBIND_DEVICE_FROM_GATEWAY,
];

/// Look up a method by RPC name
pub fn find(name: &str) -> Option<&'static MethodDescriptor> {
    ALL_METHODS.iter().copied().find(|m| m.name == name)
}
