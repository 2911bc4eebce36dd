//! Simulation-ready egress structures.
//!
//! The core hands renderers a containerlab-shaped document: a topology
//! name, a `nodes` mapping from device name to image/kind/type, and a
//! `links` sequence of endpoint pairs in `device:interface` form. YAML
//! emission itself belongs to the caller; the structures here guarantee
//! field-level correctness.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::topology::Topology;

/// Default container image for exported nodes.
pub const DEFAULT_NODE_IMAGE: &str = "frrouting/frr:latest";

/// One containerlab node entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClabNode {
    pub kind: String,
    pub image: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

/// One containerlab link entry: `[dev:iface, dev:iface]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClabLink {
    pub endpoints: [String; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClabTopologySection {
    /// BTreeMap keeps node emission order stable across runs.
    pub nodes: BTreeMap<String, ClabNode>,
    pub links: Vec<ClabLink>,
}

/// Root containerlab document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClabTopology {
    pub name: String,
    pub topology: ClabTopologySection,
}

/// Convert a topology into its containerlab shape.
pub fn to_containerlab(topology: &Topology, image: &str) -> ClabTopology {
    let nodes: BTreeMap<String, ClabNode> = topology
        .devices
        .iter()
        .map(|device| {
            (
                device.name.clone(),
                ClabNode {
                    kind: "linux".to_string(),
                    image: image.to_string(),
                    node_type: if device.is_router() { "router" } else { "switch" }.to_string(),
                },
            )
        })
        .collect();

    let links = topology
        .links
        .iter()
        .map(|link| ClabLink {
            endpoints: [
                format!("{}:{}", link.source_device, link.source_interface),
                format!("{}:{}", link.destination_device, link.destination_interface),
            ],
        })
        .collect();

    ClabTopology {
        name: topology.name.clone(),
        topology: ClabTopologySection { nodes, links },
    }
}

/// Inspection document: the full topology plus derived metadata, for
/// plain YAML export.
#[derive(Debug, Clone, Serialize)]
pub struct TopologyDocument<'a> {
    pub name: &'a str,
    pub routing_protocol: &'a str,
    pub router_count: usize,
    pub switch_count: usize,
    pub link_count: usize,
    pub devices: &'a [crate::topology::Device],
    pub links: &'a [crate::topology::Link],
}

pub fn topology_document(topology: &Topology) -> TopologyDocument<'_> {
    let router_count = topology.devices.iter().filter(|d| d.is_router()).count();
    TopologyDocument {
        name: &topology.name,
        routing_protocol: &topology.routing_protocol,
        router_count,
        switch_count: topology.devices.len() - router_count,
        link_count: topology.links.len(),
        devices: &topology.devices,
        links: &topology.links,
    }
}
