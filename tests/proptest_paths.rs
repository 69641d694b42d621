//! Property-based tests using proptest
//!
//! These tests verify the resource-name round-trip laws, routing header
//! shape and wire encodings using randomized inputs.

use cloudiot::gcp::pagination::{self, Page};
use cloudiot::gcp::routing::{request_params, RoutingField};
use cloudiot::{DeviceConfig, ListDevicesRequest, DeviceName, FieldMask, LocationName, PathTemplate, RegistryName};
use proptest::prelude::*;
use serde_json::json;
use std::cell::Cell;

/// Serve `pages`, with the page index as the page token
fn fetch_page(pages: &[Vec<u32>], request: ListDevicesRequest) -> cloudiot::Result<Page<ListDevicesRequest, u32>> {
    let index: usize = request.page_token.parse().unwrap_or(0);
    let next_token = if index + 1 < pages.len() { (index + 1).to_string() } else { String::new() };
    Ok(Page {
        items: pages[index].clone(),
        next_request: pagination::next_request(&request, &next_token),
    })
}

/// Path-safe identifier segment
fn arb_id() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9_.~+%-]{0,30}"
}

proptest! {
    /// Rendering then matching a device name gives back its components
    #[test]
    fn device_name_round_trip(
        project in arb_id(),
        location in arb_id(),
        registry in arb_id(),
        device in arb_id(),
    ) {
        let name = DeviceName::new(&project, &location, &registry, &device);
        let parsed = DeviceName::parse(&name.to_string()).unwrap();
        prop_assert_eq!(parsed, name);
    }

    #[test]
    fn registry_name_round_trip(project in arb_id(), location in arb_id(), registry in arb_id()) {
        let name = RegistryName::new(&project, &location, &registry);
        prop_assert_eq!(name.to_string().parse::<RegistryName>().unwrap(), name);
    }

    #[test]
    fn location_name_round_trip(project in arb_id(), location in arb_id()) {
        let name = LocationName::new(&project, &location);
        prop_assert_eq!(LocationName::parse(&name.to_string()).unwrap(), name);
    }

    /// A path built from one template never matches a different template
    #[test]
    fn templates_do_not_cross_match(project in arb_id(), location in arb_id(), registry in arb_id()) {
        let registry_path = RegistryName::new(&project, &location, &registry).to_string();
        prop_assert!(DeviceName::parse(&registry_path).is_err());
        prop_assert!(LocationName::parse(&registry_path).is_err());
    }

    /// Generic templates obey the same law for any variable layout
    #[test]
    fn generic_template_round_trip(values in prop::collection::vec(arb_id(), 1..6)) {
        let template_source = (0..values.len())
            .map(|i| format!("lit{}/{{v{}}}", i, i))
            .collect::<Vec<_>>()
            .join("/");
        let template = PathTemplate::new(&template_source).unwrap();

        let keys: Vec<String> = (0..values.len()).map(|i| format!("v{}", i)).collect();
        let bindings: Vec<(&str, &str)> = keys
            .iter()
            .zip(&values)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let matched = template.matches(&template.render(&bindings)).unwrap();
        for (key, value) in keys.iter().zip(&values) {
            prop_assert_eq!(&matched[key], value);
        }
    }

    /// Routing header keeps resource-name slashes and escapes separators
    #[test]
    fn routing_header_shape(registry in arb_id(), extra in "[a-z&= ]{0,10}") {
        const PARENT: RoutingField = RoutingField { key: "parent", path: &["parent"] };
        let parent = format!("projects/p/locations/l/registries/{}{}", registry, extra);
        let header = request_params(&[PARENT], &json!({ "parent": parent }));

        prop_assert!(header.starts_with("parent=projects/p/locations/l/registries/"));
        prop_assert_eq!(header.matches('&').count(), 0);
        prop_assert_eq!(header.matches('=').count(), 1);
    }

    /// Config versions survive the int64-as-string encoding
    #[test]
    fn config_version_and_payload_encoding(version in any::<i64>(), data in prop::collection::vec(any::<u8>(), 0..64)) {
        let config = DeviceConfig { version, binary_data: data, ..Default::default() };
        let encoded = serde_json::to_value(&config).unwrap();
        if version != 0 {
            prop_assert_eq!(&encoded["version"], &json!(version.to_string()));
        }
        let decoded: DeviceConfig = serde_json::from_value(encoded).unwrap();
        prop_assert_eq!(decoded, config);
    }

    /// Field masks encode as one comma-separated string
    #[test]
    fn field_mask_encoding(paths in prop::collection::vec("[a-z][a-zA-Z]{0,10}", 1..5)) {
        let mask = FieldMask::new(paths.clone());
        prop_assert_eq!(serde_json::to_value(&mask).unwrap(), json!(paths.join(",")));
    }

    /// Draining visits every page once and keeps item order
    #[test]
    fn auto_drain_concatenates_pages(pages in prop::collection::vec(prop::collection::vec(any::<u32>(), 0..5), 1..8)) {
        let calls = Cell::new(0usize);
        let request = ListDevicesRequest { parent: "projects/p/locations/l/registries/r".into(), ..Default::default() };
        let stream = pagination::items(request, |request| {
            calls.set(calls.get() + 1);
            futures::future::ready(fetch_page(&pages, request))
        });

        let all = tokio_test::block_on(pagination::collect_all(stream)).unwrap();
        let expected: Vec<u32> = pages.iter().flatten().copied().collect();
        prop_assert_eq!(all, expected);
        prop_assert_eq!(calls.get(), pages.len());
    }
}
