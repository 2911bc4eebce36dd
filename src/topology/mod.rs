//! Topology data model.
//!
//! A topology is a named set of devices and the undirected links between
//! them, tagged with its routing protocol. Devices are routers (with an
//! OSPF router ID and an AS number) or layer-2 switches. The invariants in
//! `Topology::validate` gate every topology entering the engine, whether
//! synthesized here or supplied by a caller.

pub mod synthesizer;

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::graph::Graph;

/// Device kind. Routers carry OSPF identity; switches are plain layer-2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceKind {
    Router { router_id: Ipv4Addr, asn: u32 },
    Switch,
}

/// A device in the topology, unique by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(flatten)]
    pub kind: DeviceKind,
}

impl Device {
    pub fn router(name: &str, router_id: Ipv4Addr, asn: u32) -> Device {
        Device {
            name: name.to_string(),
            kind: DeviceKind::Router { router_id, asn },
        }
    }

    pub fn switch(name: &str) -> Device {
        Device {
            name: name.to_string(),
            kind: DeviceKind::Switch,
        }
    }

    pub fn is_router(&self) -> bool {
        matches!(self.kind, DeviceKind::Router { .. })
    }

    pub fn router_id(&self) -> Option<Ipv4Addr> {
        match self.kind {
            DeviceKind::Router { router_id, .. } => Some(router_id),
            DeviceKind::Switch => None,
        }
    }
}

/// An undirected point-to-point association between two distinct devices.
/// Both endpoint addresses come from the same /30.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source_device: String,
    pub source_interface: String,
    pub source_ip: Ipv4Addr,
    pub destination_device: String,
    pub destination_interface: String,
    pub destination_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    /// OSPF metric.
    pub cost: u32,
}

impl Link {
    /// Canonical (sorted) endpoint pair, for set membership tests.
    pub fn endpoints(&self) -> (String, String) {
        if self.source_device <= self.destination_device {
            (self.source_device.clone(), self.destination_device.clone())
        } else {
            (self.destination_device.clone(), self.source_device.clone())
        }
    }

    /// /30 network address of the link subnet.
    pub fn subnet(&self) -> u32 {
        u32::from(self.source_ip) & u32::from(self.subnet_mask)
    }
}

/// A named device-and-link graph with a routing protocol tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub name: String,
    pub devices: Vec<Device>,
    pub links: Vec<Link>,
    pub routing_protocol: String,
}

impl Topology {
    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Mean device degree: 2|E| / |V|.
    pub fn avg_degree(&self) -> f64 {
        if self.devices.is_empty() {
            return 0.0;
        }
        2.0 * self.links.len() as f64 / self.devices.len() as f64
    }

    /// Derive the analysis graph. Edge order follows link declaration
    /// order, so derived computations are deterministic.
    pub fn to_graph(&self) -> Graph {
        let mut graph = Graph::new();
        for device in &self.devices {
            graph.add_node(&device.name);
        }
        for (idx, link) in self.links.iter().enumerate() {
            graph.add_edge(
                &link.source_device,
                &link.destination_device,
                link.cost,
                Some(idx),
            );
        }
        graph
    }

    /// Enforce the structural invariants every topology must satisfy:
    ///
    /// 1. Link endpoints reference existing, distinct devices.
    /// 2. Single connected component.
    /// 3. Each link's IPs share its /30; no two links share a subnet.
    /// 4. Router IDs are unique across routers.
    /// 5. Interface labels are unique within a device.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut names = HashSet::new();
        for device in &self.devices {
            if !names.insert(device.name.as_str()) {
                return Err(invalid(format!("duplicate device name '{}'", device.name)));
            }
        }

        let mut router_ids = HashSet::new();
        for device in &self.devices {
            if let Some(id) = device.router_id() {
                if !router_ids.insert(id) {
                    return Err(invalid(format!(
                        "router id {} assigned to more than one router",
                        id
                    )));
                }
            }
        }

        let mut subnets = HashSet::new();
        let mut interfaces: HashMap<&str, HashSet<&str>> = HashMap::new();
        for link in &self.links {
            if link.source_device == link.destination_device {
                return Err(invalid(format!(
                    "link connects '{}' to itself",
                    link.source_device
                )));
            }
            for endpoint in [&link.source_device, &link.destination_device] {
                if !names.contains(endpoint.as_str()) {
                    return Err(invalid(format!(
                        "link endpoint '{}' is not a device",
                        endpoint
                    )));
                }
            }

            let mask = u32::from(link.subnet_mask);
            if u32::from(link.source_ip) & mask != u32::from(link.destination_ip) & mask {
                return Err(invalid(format!(
                    "link {}-{} endpoints are in different subnets",
                    link.source_device, link.destination_device
                )));
            }
            if !subnets.insert(link.subnet()) {
                return Err(invalid(format!(
                    "subnet {} reused by link {}-{}",
                    Ipv4Addr::from(link.subnet()),
                    link.source_device,
                    link.destination_device
                )));
            }

            for (device, iface) in [
                (&link.source_device, &link.source_interface),
                (&link.destination_device, &link.destination_interface),
            ] {
                if !interfaces
                    .entry(device.as_str())
                    .or_default()
                    .insert(iface.as_str())
                {
                    return Err(invalid(format!(
                        "interface '{}' reused on device '{}'",
                        iface, device
                    )));
                }
            }
        }

        if self.devices.len() > 1 && !self.to_graph().is_connected() {
            return Err(invalid(format!(
                "topology '{}' is not a single connected component",
                self.name
            )));
        }

        Ok(())
    }
}

fn invalid(reason: String) -> CoreError {
    CoreError::InvalidIntent {
        reason,
        hint: "supply a topology that satisfies the structural invariants".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::{router_id, LINK_MASK};

    fn link(a: &str, ai: &str, b: &str, bi: &str, subnet_index: u32) -> Link {
        let base = u32::from(Ipv4Addr::new(10, 100, 0, 0)) + subnet_index * 4;
        Link {
            source_device: a.to_string(),
            source_interface: ai.to_string(),
            source_ip: Ipv4Addr::from(base + 1),
            destination_device: b.to_string(),
            destination_interface: bi.to_string(),
            destination_ip: Ipv4Addr::from(base + 2),
            subnet_mask: LINK_MASK,
            cost: 100,
        }
    }

    fn triangle() -> Topology {
        Topology {
            name: "triangle".into(),
            devices: vec![
                Device::router("R1", router_id(0), 65000),
                Device::router("R2", router_id(1), 65001),
                Device::router("R3", router_id(2), 65002),
            ],
            links: vec![
                link("R1", "eth0", "R2", "eth0", 0),
                link("R2", "eth1", "R3", "eth0", 1),
                link("R3", "eth1", "R1", "eth1", 2),
            ],
            routing_protocol: "ospf".into(),
        }
    }

    #[test]
    fn valid_topology_passes() {
        triangle().validate().unwrap();
    }

    #[test]
    fn dangling_endpoint_is_rejected() {
        let mut topo = triangle();
        topo.links.push(link("R1", "eth2", "R9", "eth0", 3));
        assert!(topo.validate().is_err());
    }

    #[test]
    fn disconnected_topology_is_rejected() {
        let mut topo = triangle();
        topo.devices.push(Device::switch("SW1"));
        assert!(topo.validate().is_err());
    }

    #[test]
    fn shared_subnet_is_rejected() {
        let mut topo = triangle();
        topo.links[2] = link("R3", "eth1", "R1", "eth1", 0);
        assert!(topo.validate().is_err());
    }

    #[test]
    fn split_subnet_is_rejected() {
        let mut topo = triangle();
        topo.links[0].destination_ip = Ipv4Addr::new(10, 100, 9, 2);
        assert!(topo.validate().is_err());
    }

    #[test]
    fn duplicate_router_id_is_rejected() {
        let mut topo = triangle();
        topo.devices[2] = Device::router("R3", router_id(0), 65002);
        assert!(topo.validate().is_err());
    }

    #[test]
    fn reused_interface_is_rejected() {
        let mut topo = triangle();
        topo.links[2].source_interface = "eth0".into(); // already used on R3
        assert!(topo.validate().is_err());
    }

    #[test]
    fn parallel_links_need_distinct_interfaces() {
        let mut topo = triangle();
        topo.links.push(link("R1", "eth2", "R2", "eth2", 3));
        topo.validate().unwrap();
    }

    #[test]
    fn graph_reflects_devices_and_links() {
        let graph = triangle().to_graph();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.is_connected());
        assert_eq!(graph.degree("R1"), 2);
    }
}
