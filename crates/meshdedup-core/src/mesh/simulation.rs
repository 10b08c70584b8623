//! Multi-Node Flood Simulation
//!
//! Runs managed flooding over a random mesh where every node owns its own
//! [`PacketHistory`]. It models:
//!
//! - A seeded random topology (always connected)
//! - Hop-limited rebroadcast, one relay per node per packet
//! - Cancellation of pending relays when a duplicate is overheard
//! - Per-message delivery statistics
//!
//! Radio propagation is not modelled: every transmission reaches every
//! neighbor.
//!
//! ## Example
//!
//! ```
//! use meshdedup_core::mesh::simulation::{MeshSimulator, SimConfig};
//!
//! let config = SimConfig::default().with_node_count(12).with_messages(20);
//! let mut sim = MeshSimulator::new(config).unwrap();
//! let stats = sim.run();
//! println!("Delivery rate: {:.1}%", stats.delivery_rate() * 100.0);
//! ```

use super::clock::ManualClock;
use super::dupe::DupeAction;
use super::error::{HistoryError, Result};
use super::history::{HistoryConfig, PacketHistory, DEFAULT_CAPACITY, DEFAULT_FLOOD_EXPIRE_MS};
use super::packet::{MeshPacket, NodeId, MAX_HOP_LIMIT};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::rc::Rc;

/// Largest mesh the simulator builds; relay ids must stay unique.
pub const MAX_SIM_NODES: usize = 254;

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of nodes in the mesh
    pub node_count: usize,
    /// Probability of an extra link between any two nodes
    pub link_probability: f64,
    /// Hop limit messages start with
    pub hop_limit: u8,
    /// Number of messages to flood
    pub messages: usize,
    /// Packet history size per node
    pub history_capacity: usize,
    /// Packet history expiry per node
    pub flood_expire_ms: u32,
    /// Time one transmission occupies the channel
    pub airtime_ms: u32,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            node_count: 10,
            link_probability: 0.2,
            hop_limit: 3,
            messages: 50,
            history_capacity: DEFAULT_CAPACITY,
            flood_expire_ms: DEFAULT_FLOOD_EXPIRE_MS,
            airtime_ms: 250,
            seed: 42,
        }
    }
}

impl SimConfig {
    pub fn with_node_count(mut self, count: usize) -> Self {
        self.node_count = count;
        self
    }

    pub fn with_link_probability(mut self, probability: f64) -> Self {
        self.link_probability = probability;
        self
    }

    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    pub fn with_messages(mut self, messages: usize) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(2..=MAX_SIM_NODES).contains(&self.node_count) {
            return Err(HistoryError::Simulation(format!(
                "node_count must be between 2 and {}, got {}",
                MAX_SIM_NODES, self.node_count
            )));
        }
        if !(0.0..=1.0).contains(&self.link_probability) {
            return Err(HistoryError::Simulation(format!(
                "link_probability must be within 0..=1, got {}",
                self.link_probability
            )));
        }
        if self.hop_limit > MAX_HOP_LIMIT {
            return Err(HistoryError::HopLimitOutOfRange(self.hop_limit));
        }
        Ok(())
    }
}

/// Simulation statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimStats {
    /// Messages originated
    pub messages: u64,
    /// Packets put on the air (originals and relays)
    pub transmissions: u64,
    /// Packets heard by a neighbor
    pub receptions: u64,
    /// Receptions of a packet the node had already seen
    pub duplicates: u64,
    /// Pending relays dropped after overhearing another relay
    pub cancelled: u64,
    /// Extra relays triggered by a hop-limit upgrade or fallback
    pub extra_relays: u64,
    /// Transmissions by a node that had already sent the same message
    pub repeat_transmissions: u64,
    /// First receptions by a node other than the originator
    pub delivered: u64,
    /// History records overwritten across all nodes
    pub evictions: u64,
    /// Number of nodes in the mesh
    pub node_count: usize,
}

impl SimStats {
    /// Fraction of (message, non-originating node) pairs delivered (0.0 - 1.0)
    pub fn delivery_rate(&self) -> f64 {
        let possible = self.messages * self.node_count.saturating_sub(1) as u64;
        if possible == 0 {
            0.0
        } else {
            self.delivered as f64 / possible as f64
        }
    }

    /// Average transmissions per message
    pub fn transmissions_per_message(&self) -> f64 {
        if self.messages == 0 {
            0.0
        } else {
            self.transmissions as f64 / self.messages as f64
        }
    }
}

/// Simulated node
#[derive(Debug)]
struct SimNode {
    id: NodeId,
    history: PacketHistory<Rc<ManualClock>>,
    neighbors: Vec<usize>,
}

/// A relay waiting for the channel
#[derive(Debug)]
struct Transmission {
    node: usize,
    packet: MeshPacket,
}

/// Multi-node flood simulator
#[derive(Debug)]
pub struct MeshSimulator {
    config: SimConfig,
    nodes: Vec<SimNode>,
    clock: Rc<ManualClock>,
    rng: StdRng,
    stats: SimStats,
}

impl MeshSimulator {
    /// Create a simulator over a random connected topology
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let n = config.node_count;

        let mut edges = Vec::new();
        // Spanning tree first so every node is reachable.
        for i in 1..n {
            edges.push((rng.gen_range(0..i), i));
        }
        for a in 0..n {
            for b in (a + 1)..n {
                if rng.gen_bool(config.link_probability) {
                    edges.push((a, b));
                }
            }
        }

        Self::build(config, &edges, rng)
    }

    /// Create a simulator over an explicit list of undirected links
    pub fn with_edges(config: SimConfig, edges: &[(usize, usize)]) -> Result<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Self::build(config, edges, rng)
    }

    fn build(config: SimConfig, edges: &[(usize, usize)], rng: StdRng) -> Result<Self> {
        let clock = Rc::new(ManualClock::new(1));
        let mut nodes: Vec<SimNode> = (0..config.node_count)
            .map(|i| {
                let id = sim_node_id(i);
                let history_config = HistoryConfig::for_node(id)
                    .with_capacity(config.history_capacity)
                    .with_flood_expire_ms(config.flood_expire_ms);
                SimNode {
                    id,
                    history: PacketHistory::with_clock(history_config, Rc::clone(&clock)),
                    neighbors: Vec::new(),
                }
            })
            .collect();

        for &(a, b) in edges {
            if a >= nodes.len() || b >= nodes.len() || a == b {
                return Err(HistoryError::Simulation(format!("invalid link {}-{}", a, b)));
            }
            if !nodes[a].neighbors.contains(&b) {
                nodes[a].neighbors.push(b);
                nodes[b].neighbors.push(a);
            }
        }

        tracing::debug!(
            "Built mesh: {} nodes, {} links",
            nodes.len(),
            nodes.iter().map(|n| n.neighbors.len()).sum::<usize>() / 2
        );

        let stats = SimStats {
            node_count: nodes.len(),
            ..Default::default()
        };
        Ok(Self {
            config,
            nodes,
            clock,
            rng,
            stats,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node number of node `idx`
    pub fn node_id(&self, idx: usize) -> Option<NodeId> {
        self.nodes.get(idx).map(|n| n.id)
    }

    /// Neighbor indices of node `idx`
    pub fn neighbors(&self, idx: usize) -> &[usize] {
        self.nodes
            .get(idx)
            .map(|n| n.neighbors.as_slice())
            .unwrap_or_default()
    }

    /// Packet history of node `idx`
    pub fn history(&self, idx: usize) -> Option<&PacketHistory<Rc<ManualClock>>> {
        self.nodes.get(idx).map(|n| &n.history)
    }

    /// Flood the configured number of messages from random origins
    pub fn run(&mut self) -> &SimStats {
        for _ in 0..self.config.messages {
            let origin = self.rng.gen_range(0..self.nodes.len());
            self.send_message(origin);
        }
        self.stats.evictions = self.nodes.iter().map(|n| n.history.stats().evictions).sum();
        &self.stats
    }

    /// Flood one message from node `origin` until the channel is quiet.
    ///
    /// Returns the number of other nodes that received it.
    pub fn send_message(&mut self, origin: usize) -> usize {
        if origin >= self.nodes.len() {
            return 0;
        }
        let id = self.rng.gen_range(1..=u32::MAX);
        let packet = MeshPacket::broadcast(self.nodes[origin].id, id, self.config.hop_limit);
        self.stats.messages += 1;

        let mut pending = vec![false; self.nodes.len()];
        let mut sent = vec![false; self.nodes.len()];
        let mut delivered = 0;
        let mut queue = VecDeque::new();
        pending[origin] = true;
        queue.push_back(Transmission {
            node: origin,
            packet,
        });

        while let Some(tx) = queue.pop_front() {
            if !pending[tx.node] {
                continue;
            }
            pending[tx.node] = false;
            if sent[tx.node] {
                self.stats.repeat_transmissions += 1;
            }
            sent[tx.node] = true;
            self.transmit(&tx);

            let sender = self.nodes[tx.node].id;
            let mut neighbors = self.nodes[tx.node].neighbors.clone();
            neighbors.shuffle(&mut self.rng);

            for rx in neighbors {
                self.stats.receptions += 1;
                let node = &mut self.nodes[rx];
                let observation = node.history.observe(&tx.packet, true);
                let action = DupeAction::classify(&observation, &tx.packet);
                tracing::trace!("{} heard {:#x} from {}: {:?}", node.id, id, sender, action);

                if observation.seen_recently {
                    self.stats.duplicates += 1;
                } else if rx != origin {
                    delivered += 1;
                }

                if action.cancels_pending() && pending[rx] {
                    pending[rx] = false;
                    self.stats.cancelled += 1;
                    continue;
                }

                if action.should_relay() && !pending[rx] && rx != origin {
                    let relayer = self.nodes[rx].id;
                    if let Some(copy) = tx.packet.relayed_by(relayer) {
                        if action != DupeAction::Process {
                            self.stats.extra_relays += 1;
                        }
                        pending[rx] = true;
                        queue.push_back(Transmission {
                            node: rx,
                            packet: copy,
                        });
                    }
                }
            }
        }

        self.stats.delivered += delivered as u64;
        tracing::debug!(
            "Message {:#x} from {} reached {}/{} nodes",
            id,
            self.nodes[origin].id,
            delivered,
            self.nodes.len() - 1
        );
        delivered
    }

    /// Put a packet on the air. The sender records its own copy first.
    fn transmit(&mut self, tx: &Transmission) {
        self.nodes[tx.node].history.observe(&tx.packet, true);
        self.stats.transmissions += 1;
        self.clock.advance(self.config.airtime_ms);
    }
}

/// Node numbers with distinct, nonzero relay ids
fn sim_node_id(idx: usize) -> NodeId {
    NodeId::from_u32(0xA000_0000 | (idx as u32 + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<(usize, usize)> {
        (1..n).map(|i| (i - 1, i)).collect()
    }

    #[test]
    fn test_config_validation() {
        assert!(SimConfig::default().validate().is_ok());
        assert!(SimConfig::default().with_node_count(1).validate().is_err());
        assert!(SimConfig::default().with_node_count(300).validate().is_err());
        assert!(SimConfig::default().with_link_probability(1.5).validate().is_err());
        assert!(matches!(
            SimConfig::default().with_hop_limit(9).validate(),
            Err(HistoryError::HopLimitOutOfRange(9))
        ));
    }

    #[test]
    fn test_node_ids_have_unique_relay_ids() {
        let mut relay_ids: Vec<u8> = (0..MAX_SIM_NODES)
            .map(|i| sim_node_id(i).relay_id().as_u8())
            .collect();
        relay_ids.sort_unstable();
        relay_ids.dedup();
        assert_eq!(relay_ids.len(), MAX_SIM_NODES);
        assert!(!relay_ids.contains(&0));
    }

    #[test]
    fn test_random_topology_is_connected() {
        let sim = MeshSimulator::new(SimConfig::default().with_link_probability(0.0)).unwrap();
        assert!((0..sim.node_count()).all(|i| !sim.neighbors(i).is_empty()));
    }

    #[test]
    fn test_hop_limit_bounds_reach() {
        let config = SimConfig::default().with_node_count(5).with_hop_limit(1);
        let mut sim = MeshSimulator::with_edges(config, &line(5)).unwrap();

        assert_eq!(sim.send_message(0), 2);
        let stats = sim.stats();
        assert_eq!(stats.transmissions, 2);
        // The relay is heard back by the originator.
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_line_delivers_everywhere_with_enough_hops() {
        let config = SimConfig::default().with_node_count(4).with_hop_limit(3);
        let mut sim = MeshSimulator::with_edges(config, &line(4)).unwrap();
        assert_eq!(sim.send_message(0), 3);
        assert!(sim.history(3).unwrap().len() == 1);
    }

    #[test]
    fn test_each_node_transmits_at_most_once() {
        let config = SimConfig::default()
            .with_node_count(20)
            .with_link_probability(0.5)
            .with_hop_limit(7)
            .with_messages(10);
        let mut sim = MeshSimulator::new(config).unwrap();

        for origin in 0..10 {
            let before = sim.stats().transmissions;
            sim.send_message(origin);
            let sent = sim.stats().transmissions - before;
            assert!(sent > 1, "message from {origin} was never relayed");
            assert!(sent <= 20, "message from {origin} sent {sent} times");
        }

        let stats = sim.stats();
        assert_eq!(stats.repeat_transmissions, 0);
        assert!(stats.duplicates > 0);
    }

    #[test]
    fn test_overheard_relay_cancels_pending() {
        // 0 reaches 1 and 2, which also hear each other.
        let config = SimConfig::default().with_node_count(3);
        let mut sim = MeshSimulator::with_edges(config, &[(0, 1), (0, 2), (1, 2)]).unwrap();
        assert_eq!(sim.send_message(0), 2);
        assert_eq!(sim.stats().transmissions, 2);
        assert_eq!(sim.stats().cancelled, 1);
    }

    #[test]
    fn test_same_seed_same_result() {
        let config = SimConfig::default().with_node_count(15).with_messages(30);
        let a = MeshSimulator::new(config.clone()).unwrap().run().clone();
        let b = MeshSimulator::new(config).unwrap().run().clone();
        assert_eq!(a, b);
        assert!(a.delivery_rate() > 0.0);
    }

    #[test]
    fn test_invalid_edge() {
        let config = SimConfig::default().with_node_count(3);
        assert!(MeshSimulator::with_edges(config.clone(), &[(0, 3)]).is_err());
        assert!(MeshSimulator::with_edges(config, &[(1, 1)]).is_err());
    }
}
