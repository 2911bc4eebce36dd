//! Topology synthesis from declarative intent.
//!
//! Each pattern builder lays out a base skeleton (devices plus planned
//! edges); a shared augmentation pass then adds redundancy links until
//! every sampled device pair meets the intent's edge-disjoint-path target
//! or the pattern's link budget is spent. Materialization happens last:
//! /30 subnets and interface labels are assigned in planned-edge order, so
//! a run replays bit-for-bit from its seed.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::CoreError;
use crate::graph::{stable_seed, Graph};
use crate::intent::{parse_intent, DesignGoal, Intent, Pattern, RedundancyLevel};
use crate::ip::{router_id, AddressAllocator};
use crate::topology::{Device, Link, Topology};

/// Base OSPF cost for pattern links.
const BASE_COST: u32 = 100;
/// Cost for backbone links under a latency design goal.
const LATENCY_BACKBONE_COST: u32 = 50;
/// Cost for augmented redundancy links under a latency design goal.
const LATENCY_REDUNDANT_COST: u32 = 150;

/// Upper bound on augmentation rounds; each round adds one link.
const MAX_AUGMENT_STEPS: usize = 1024;

/// How the link budget scales with the base pattern size.
fn budget_multiplier(pattern: Pattern) -> f64 {
    match pattern {
        Pattern::FullMesh => 1.0,
        Pattern::HubSpoke => 1.5,
        Pattern::Ring => 1.6,
        Pattern::Tree => 1.3,
        Pattern::LeafSpine => 1.25,
        Pattern::Hybrid => 1.4,
    }
}

/// Structural ceiling on edge-disjoint paths a pattern can provide while
/// still being that pattern. Targets above the ceiling are unsatisfiable;
/// below it, budget exhaustion is best-effort and left to the validator.
fn structural_ceiling(pattern: Pattern, sites: u32, redundancy: RedundancyLevel) -> u32 {
    match pattern {
        Pattern::FullMesh => sites.saturating_sub(1).max(1),
        Pattern::HubSpoke => {
            if redundancy >= RedundancyLevel::Standard {
                2
            } else {
                1
            }
        }
        Pattern::Ring => {
            if redundancy >= RedundancyLevel::High {
                3
            } else {
                2
            }
        }
        Pattern::Tree => 2,
        Pattern::LeafSpine => leaf_spine_split(sites).1,
        Pattern::Hybrid => 2,
    }
}

/// Smallest integer r with r*r >= x.
fn ceil_sqrt(x: u32) -> u32 {
    let mut r = (f64::from(x)).sqrt().floor() as u32;
    while r * r < x {
        r += 1;
    }
    while r > 0 && (r - 1) * (r - 1) >= x {
        r -= 1;
    }
    r
}

/// Leaf/spine split for a site count: the fixed point of
/// spines = ceil(sqrt(2 * leaves)) clamped to [2, leaves].
pub fn leaf_spine_split(sites: u32) -> (u32, u32) {
    if sites < 4 {
        return (sites.saturating_sub(1).max(1), 1.min(sites));
    }
    let mut spines = 2u32;
    for _ in 0..32 {
        let leaves = sites - spines;
        let next = ceil_sqrt(2 * leaves).clamp(2, leaves);
        if next == spines {
            break;
        }
        spines = next;
    }
    (sites - spines, spines)
}

/// Cost class of a planned edge, resolved to an OSPF metric at
/// materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CostClass {
    /// Fabric links: core mesh, leaf-spine crossbars.
    Backbone,
    Standard,
    /// Links added by the redundancy augmentation pass.
    Redundant,
}

#[derive(Debug)]
struct Plan {
    devices: Vec<Device>,
    edges: Vec<(String, String, CostClass)>,
    adjacent: HashSet<(String, String)>,
    router_index: u32,
}

impl Plan {
    fn new() -> Plan {
        Plan {
            devices: Vec::new(),
            edges: Vec::new(),
            adjacent: HashSet::new(),
            router_index: 0,
        }
    }

    fn add_router(&mut self, name: String) -> String {
        let idx = self.router_index;
        self.router_index += 1;
        self.devices
            .push(Device::router(&name, router_id(idx), 65000 + idx));
        name
    }

    fn add_switch(&mut self, name: String) -> String {
        self.devices.push(Device::switch(&name));
        name
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    fn connect(&mut self, a: &str, b: &str, class: CostClass) {
        if a == b {
            return;
        }
        let key = Plan::key(a, b);
        if self.adjacent.contains(&key) {
            return;
        }
        self.adjacent.insert(key);
        self.edges.push((a.to_string(), b.to_string(), class));
    }

    fn is_adjacent(&self, a: &str, b: &str) -> bool {
        self.adjacent.contains(&Plan::key(a, b))
    }

    fn to_graph(&self) -> Graph {
        let mut graph = Graph::new();
        for device in &self.devices {
            graph.add_node(&device.name);
        }
        for (idx, (a, b, _)) in self.edges.iter().enumerate() {
            graph.add_edge(a, b, BASE_COST, Some(idx));
        }
        graph
    }
}

/// Builds topologies that satisfy an intent. One instance per synthesis;
/// all free choices draw from the seeded stream.
pub struct Synthesizer {
    rng: StdRng,
    seed: u64,
}

impl Synthesizer {
    /// Seeded construction replays identically; unseeded draws one random
    /// seed up front so the run is still replayable from its log line.
    pub fn new(seed: Option<u64>) -> Synthesizer {
        let seed = seed.unwrap_or_else(rand::random);
        log::debug!("synthesizer seed {}", seed);
        Synthesizer {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Synthesize a topology for the intent. The intent must carry a
    /// pattern; callers wanting a recommendation consult the learning
    /// subsystem first.
    pub fn synthesize(&mut self, intent: &Intent) -> Result<Topology, CoreError> {
        let constraints = parse_intent(intent)?;
        let pattern = constraints.pattern.ok_or_else(|| CoreError::InvalidIntent {
            reason: "no pattern selected".into(),
            hint: "set a pattern or request a recommendation".into(),
        })?;

        let sites = intent.site_count;
        log::info!(
            "synthesizing '{}': pattern={} sites={} redundancy={}",
            intent.name,
            pattern.as_str(),
            sites,
            intent.redundancy.as_str()
        );

        let mut plan = match pattern {
            Pattern::FullMesh => self.build_full_mesh(sites),
            Pattern::HubSpoke => self.build_hub_spoke(sites, intent)?,
            Pattern::Ring => self.build_ring(sites, intent.redundancy),
            Pattern::Tree => self.build_tree(sites, intent, ""),
            Pattern::LeafSpine => self.build_leaf_spine(sites, ""),
            Pattern::Hybrid => self.build_hybrid(sites, intent),
        };

        let name = format!("{}-{}", intent.name, pattern.as_str().replace('_', "-"));
        self.augment_redundancy(&mut plan, &name, pattern, intent)?;

        let topology = self.materialize(plan, &name, intent)?;
        topology.validate()?;
        log::info!(
            "synthesized '{}': {} devices, {} links",
            topology.name,
            topology.device_count(),
            topology.link_count()
        );
        Ok(topology)
    }

    fn build_full_mesh(&mut self, sites: u32) -> Plan {
        let mut plan = Plan::new();
        let names: Vec<String> = (1..=sites)
            .map(|i| plan.add_router(format!("R{}", i)))
            .collect();
        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                plan.connect(&names[i], &names[j], CostClass::Standard);
            }
        }
        plan
    }

    fn build_hub_spoke(&mut self, sites: u32, intent: &Intent) -> Result<Plan, CoreError> {
        let dual = intent.redundancy >= RedundancyLevel::Standard;
        if intent.minimize_spof && !dual {
            return Err(CoreError::SpofUnavoidable);
        }

        let mut plan = Plan::new();
        let names: Vec<String> = (1..=sites)
            .map(|i| plan.add_router(format!("R{}", i)))
            .collect();

        if dual && sites >= 2 {
            let (hub_a, hub_b) = (&names[0], &names[1]);
            plan.connect(hub_a, hub_b, CostClass::Backbone);
            for spoke in &names[2..] {
                plan.connect(hub_a, spoke, CostClass::Standard);
                plan.connect(hub_b, spoke, CostClass::Standard);
            }
        } else {
            let hub = &names[0];
            for spoke in &names[1..] {
                plan.connect(hub, spoke, CostClass::Standard);
            }
        }
        Ok(plan)
    }

    fn build_ring(&mut self, sites: u32, redundancy: RedundancyLevel) -> Plan {
        let mut plan = Plan::new();
        let names: Vec<String> = (1..=sites)
            .map(|i| plan.add_router(format!("R{}", i)))
            .collect();

        let n = names.len();
        if n == 2 {
            plan.connect(&names[0], &names[1], CostClass::Standard);
            return plan;
        }
        for i in 0..n {
            plan.connect(&names[i], &names[(i + 1) % n], CostClass::Standard);
        }
        if redundancy >= RedundancyLevel::High {
            for i in 0..n / 2 {
                plan.connect(&names[i], &names[i + n / 2], CostClass::Redundant);
            }
        }
        plan
    }

    /// Hierarchical core/aggregation/access layering. Core routers mesh;
    /// aggregation routers dual-home to the core when redundancy is at
    /// least standard; access switches dual-home only when the intent
    /// demands SPOF elimination.
    fn build_tree(&mut self, sites: u32, intent: &Intent, prefix: &str) -> Plan {
        let mut plan = Plan::new();
        self.build_tree_into(&mut plan, sites, intent, prefix);
        plan
    }

    fn build_tree_into(&mut self, plan: &mut Plan, sites: u32, intent: &Intent, prefix: &str) {
        let n = sites as usize;
        let core_n = (n / 10).max(1).min(n);
        let agg_n = if n > core_n {
            ((n / 3).saturating_sub(core_n)).max(1).min(n - core_n)
        } else {
            0
        };
        let access_n = n - core_n - agg_n;

        let core: Vec<String> = (1..=core_n)
            .map(|i| plan.add_router(format!("{}C{}", prefix, i)))
            .collect();
        let agg: Vec<String> = (1..=agg_n)
            .map(|i| plan.add_router(format!("{}A{}", prefix, i)))
            .collect();
        let access: Vec<String> = (1..=access_n)
            .map(|i| plan.add_switch(format!("{}E{}", prefix, i)))
            .collect();

        for i in 0..core.len() {
            for j in (i + 1)..core.len() {
                plan.connect(&core[i], &core[j], CostClass::Backbone);
            }
        }

        let dual_agg = intent.redundancy >= RedundancyLevel::Standard && core.len() >= 2;
        let core_off = if core.is_empty() {
            0
        } else {
            self.rng.gen_range(0..core.len())
        };
        for (i, agg_name) in agg.iter().enumerate() {
            plan.connect(agg_name, &core[(i + core_off) % core.len()], CostClass::Standard);
            if dual_agg {
                plan.connect(
                    agg_name,
                    &core[(i + core_off + 1) % core.len()],
                    CostClass::Standard,
                );
            }
        }

        let parents = if agg.is_empty() { &core } else { &agg };
        let dual_access = intent.minimize_spof && parents.len() >= 2;
        let parent_off = if parents.is_empty() {
            0
        } else {
            self.rng.gen_range(0..parents.len())
        };
        for (i, access_name) in access.iter().enumerate() {
            plan.connect(
                access_name,
                &parents[(i + parent_off) % parents.len()],
                CostClass::Standard,
            );
            if dual_access {
                plan.connect(
                    access_name,
                    &parents[(i + parent_off + 1) % parents.len()],
                    CostClass::Standard,
                );
            }
        }
    }

    /// Every leaf connects to every spine. Spine count follows the
    /// square-root rule in `leaf_spine_split`.
    fn build_leaf_spine(&mut self, sites: u32, prefix: &str) -> Plan {
        let mut plan = Plan::new();
        self.build_leaf_spine_into(&mut plan, sites, prefix);
        plan
    }

    fn build_leaf_spine_into(&mut self, plan: &mut Plan, sites: u32, prefix: &str) -> Vec<String> {
        let (leaf_n, spine_n) = leaf_spine_split(sites);
        let leaves: Vec<String> = (1..=leaf_n)
            .map(|i| plan.add_router(format!("{}L{}", prefix, i)))
            .collect();
        let spines: Vec<String> = (1..=spine_n)
            .map(|i| plan.add_router(format!("{}S{}", prefix, i)))
            .collect();
        for leaf in &leaves {
            for spine in &spines {
                plan.connect(leaf, spine, CostClass::Backbone);
            }
        }
        leaves
    }

    /// Region-partitioned layout: a leaf-spine core region plus tree
    /// branch regions, stitched together with redundancy-budget inter-
    /// region links.
    fn build_hybrid(&mut self, sites: u32, intent: &Intent) -> Plan {
        let mut plan = Plan::new();
        let n = sites;

        if n < 8 {
            // Too small to partition; the core region is the whole fabric.
            self.build_leaf_spine_into(&mut plan, n, "C");
            return plan;
        }

        let core_n = (n / 3).max(4);
        let remaining = n - core_n;
        let branch_count = (remaining / 8).clamp(1, 6);

        let core_leaves = self.build_leaf_spine_into(&mut plan, core_n, "C");

        let target = intent.redundancy.target_paths() as usize;
        let leaf_off = self.rng.gen_range(0..core_leaves.len());
        let mut assigned = 0u32;
        for branch in 0..branch_count {
            let share = remaining / branch_count
                + if branch < remaining % branch_count { 1 } else { 0 };
            if share == 0 {
                continue;
            }
            let prefix = format!("B{}", branch + 1);
            let root = format!("{}C1", prefix);
            self.build_tree_into(&mut plan, share, intent, &prefix);
            assigned += share;

            // Stitch the branch root to `target` distinct core leaves.
            let uplinks = target.min(core_leaves.len());
            for k in 0..uplinks {
                let leaf =
                    &core_leaves[(branch as usize * target + k + leaf_off) % core_leaves.len()];
                plan.connect(&root, leaf, CostClass::Standard);
            }
        }
        debug_assert_eq!(assigned, remaining);
        plan
    }

    /// Add direct links between the currently most deficient pairs (lowest
    /// edge-disjoint count first, lexicographic tie-break) until every
    /// sampled pair meets the target or the pattern's budget is spent.
    fn augment_redundancy(
        &mut self,
        plan: &mut Plan,
        name: &str,
        pattern: Pattern,
        intent: &Intent,
    ) -> Result<(), CoreError> {
        let target = intent.redundancy.target_paths();
        let ceiling = structural_ceiling(pattern, intent.site_count, intent.redundancy);
        if target > ceiling {
            return Err(CoreError::Unsatisfiable {
                pattern: pattern.as_str().into(),
                target,
                hint: format!(
                    "lower redundancy to {} paths or choose another pattern",
                    ceiling
                ),
            });
        }

        let budget = (plan.edges.len() as f64 * budget_multiplier(pattern)).ceil() as usize;
        let sample_seed = stable_seed(name);

        let mut min_count = u32::MAX;
        if target > 1 {
            for _ in 0..MAX_AUGMENT_STEPS {
                let graph = plan.to_graph();
                let mut deficient: Vec<(u32, String, String)> = graph
                    .sample_pairs(sample_seed)
                    .into_iter()
                    .map(|(a, b)| (graph.edge_disjoint_paths(&a, &b), a, b))
                    .filter(|(count, _, _)| *count < target)
                    .collect();
                deficient.sort();

                min_count = deficient.first().map_or(u32::MAX, |(c, _, _)| *c);
                if deficient.is_empty() || plan.edges.len() >= budget {
                    break;
                }

                let addable = deficient
                    .iter()
                    .find(|(_, a, b)| !plan.is_adjacent(a, b));
                match addable {
                    Some((count, a, b)) => {
                        log::debug!(
                            "augmenting {}: {}-{} (edge-disjoint {} < {})",
                            name,
                            a,
                            b,
                            count,
                            target
                        );
                        let (a, b) = (a.clone(), b.clone());
                        plan.connect(&a, &b, CostClass::Redundant);
                    }
                    // Every deficient pair is already adjacent; more direct
                    // links cannot raise the count.
                    None => break,
                }
            }
        }

        if min_count != u32::MAX && min_count < target {
            log::warn!(
                "{}: budget reached at {} links with min edge-disjoint {} < {}; leaving to validation",
                name,
                plan.edges.len(),
                min_count,
                target
            );
        }
        Ok(())
    }

    /// Assign /30 subnets and interface labels in planned-edge order and
    /// produce the final topology.
    fn materialize(
        &mut self,
        plan: Plan,
        name: &str,
        intent: &Intent,
    ) -> Result<Topology, CoreError> {
        let mut allocator = AddressAllocator::new();
        let mut iface_counter: HashMap<String, u32> = HashMap::new();
        let mut next_iface = |device: &str| {
            let counter = iface_counter.entry(device.to_string()).or_insert(0);
            let label = format!("eth{}", counter);
            *counter += 1;
            label
        };

        let latency = intent.design_goal == DesignGoal::Latency;
        let mut links = Vec::with_capacity(plan.edges.len());
        for (a, b, class) in &plan.edges {
            let subnet = allocator.next_link_subnet()?;
            let cost = match (class, latency) {
                (CostClass::Backbone, true) => LATENCY_BACKBONE_COST,
                (CostClass::Redundant, true) => LATENCY_REDUNDANT_COST,
                _ => BASE_COST,
            };
            links.push(Link {
                source_device: a.clone(),
                source_interface: next_iface(a),
                source_ip: subnet.first_host,
                destination_device: b.clone(),
                destination_interface: next_iface(b),
                destination_ip: subnet.second_host,
                subnet_mask: subnet.mask,
                cost,
            });
        }

        Ok(Topology {
            name: name.to_string(),
            devices: plan.devices,
            links,
            routing_protocol: intent.protocol.as_str().to_string(),
        })
    }
}
