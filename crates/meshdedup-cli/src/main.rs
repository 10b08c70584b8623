//! Flood Deduplication Command-Line Interface
//!
//! This CLI provides tools for:
//! - Simulating managed flooding over a random mesh
//! - Replaying recorded packet traces through a packet history
//! - Printing the engine's limits and default configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use meshdedup_core::mesh::history::{DEFAULT_CAPACITY, DEFAULT_FLOOD_EXPIRE_MS};
use meshdedup_core::mesh::simulation::MAX_SIM_NODES;
use meshdedup_core::mesh::{
    DupeAction, HistoryConfig, ManualClock, MeshPacket, MeshSimulator, NodeId, PacketHistory,
    SimConfig, MAX_HOP_LIMIT, NUM_RELAYERS,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "meshdedup")]
#[command(author, version, about = "Mesh flood deduplication engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate managed flooding over a random mesh
    Simulate {
        /// Simulation config file (JSON); flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of nodes
        #[arg(short, long)]
        nodes: Option<usize>,

        /// Number of messages to flood
        #[arg(short, long)]
        messages: Option<usize>,

        /// Starting hop limit (0-7)
        #[arg(long)]
        hop_limit: Option<u8>,

        /// Packet history capacity per node
        #[arg(long)]
        capacity: Option<usize>,

        /// Probability of an extra link between two nodes
        #[arg(long)]
        link_prob: Option<f64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay a JSON packet trace through one packet history
    Replay {
        /// Trace file: a JSON array of packet observations
        trace: PathBuf,

        /// History config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Our node number (e.g. !deadbeef, 0xdeadbeef or decimal)
        #[arg(long)]
        node: Option<String>,

        /// Print history statistics after the trace
        #[arg(long)]
        stats: bool,
    },

    /// Show engine limits and default configuration
    Info,
}

/// One line of a replay trace
#[derive(Debug, Deserialize)]
struct TraceEntry {
    /// Absolute time of the observation; defaults to the previous entry's time
    #[serde(default)]
    at_ms: Option<u32>,
    #[serde(default = "default_with_update")]
    with_update: bool,
    #[serde(flatten)]
    packet: MeshPacket,
}

fn default_with_update() -> bool {
    true
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse_node_id(text: &str) -> Result<NodeId> {
    let text = text.trim();
    let value = if let Some(hex) = text.strip_prefix('!') {
        u32::from_str_radix(hex, 16)
    } else if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    let value = value.with_context(|| format!("Invalid node number '{}'", text))?;
    Ok(NodeId::from_u32(value))
}

#[allow(clippy::too_many_arguments)]
fn cmd_simulate(
    config: Option<PathBuf>,
    nodes: Option<usize>,
    messages: Option<usize>,
    hop_limit: Option<u8>,
    capacity: Option<usize>,
    link_prob: Option<f64>,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut sim_config = match config {
        Some(path) => load_json::<SimConfig>(&path)?,
        None => SimConfig::default(),
    };
    if let Some(n) = nodes {
        sim_config.node_count = n;
    }
    if let Some(m) = messages {
        sim_config.messages = m;
    }
    if let Some(h) = hop_limit {
        sim_config.hop_limit = h;
    }
    if let Some(c) = capacity {
        sim_config.history_capacity = c;
    }
    if let Some(p) = link_prob {
        sim_config.link_probability = p;
    }
    if let Some(s) = seed {
        sim_config.seed = s;
    }

    info!("Simulation config: {:?}", sim_config);
    let mut sim = MeshSimulator::new(sim_config.clone()).context("Invalid simulation config")?;
    let stats = sim.run().clone();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let links: usize = (0..sim.node_count()).map(|i| sim.neighbors(i).len()).sum::<usize>() / 2;

    println!("=== Flood Simulation ===");
    println!();
    println!("Mesh:");
    println!("  Nodes:             {}", sim_config.node_count);
    println!("  Links:             {}", links);
    println!("  Hop limit:         {}", sim_config.hop_limit);
    println!("  History capacity:  {}", sim_config.history_capacity);
    println!("  Seed:              {}", sim_config.seed);
    println!();
    println!("Traffic:");
    println!("  Messages:          {}", stats.messages);
    println!("  Transmissions:     {}", stats.transmissions);
    println!("  Per message:       {:.2}", stats.transmissions_per_message());
    println!("  Receptions:        {}", stats.receptions);
    println!("  Duplicates:        {}", stats.duplicates);
    println!("  Relays cancelled:  {}", stats.cancelled);
    println!("  Extra relays:      {}", stats.extra_relays);
    println!("  Repeat sends:      {}", stats.repeat_transmissions);
    println!("  History evictions: {}", stats.evictions);
    println!();
    println!("Delivery:");
    println!("  Delivered:         {}", stats.delivered);
    println!("  Delivery rate:     {:.1}%", stats.delivery_rate() * 100.0);

    if stats.delivery_rate() < 1.0 {
        warn!(
            "Not every node received every message ({:.1}%)",
            stats.delivery_rate() * 100.0
        );
    }
    Ok(())
}

fn cmd_replay(
    trace: PathBuf,
    config: Option<PathBuf>,
    node: Option<String>,
    stats: bool,
) -> Result<()> {
    let mut history_config = match config {
        Some(path) => load_json::<HistoryConfig>(&path)?,
        None => HistoryConfig::default(),
    };
    if let Some(text) = node {
        history_config.node_num = parse_node_id(&text)?;
    }
    if let Err(e) = history_config.validate() {
        warn!("{}", e);
    }

    let entries: Vec<TraceEntry> = load_json(&trace)?;
    info!("Replaying {} observations from {}", entries.len(), trace.display());

    let clock = Rc::new(ManualClock::new(1));
    let mut history = PacketHistory::with_clock(history_config, Rc::clone(&clock));
    if !history.init_ok() {
        bail!("Packet history could not be created, check the capacity");
    }

    for (index, entry) in entries.iter().enumerate() {
        if let Some(at) = entry.at_ms {
            clock.set(at);
        }
        let observation = history.observe(&entry.packet, entry.with_update);
        let action = DupeAction::classify(&observation, &entry.packet);
        let line = serde_json::json!({
            "index": index,
            "from": entry.packet.from,
            "id": entry.packet.id,
            "hop_limit": entry.packet.hop_limit,
            "relay_node": entry.packet.relay_node,
            "seen_recently": observation.seen_recently,
            "was_fallback": observation.was_fallback,
            "we_were_next_hop": observation.we_were_next_hop,
            "was_upgraded": observation.was_upgraded,
            "action": format!("{:?}", action),
        });
        println!("{}", line);
    }

    if stats {
        println!("{}", serde_json::to_string_pretty(history.stats())?);
    }
    Ok(())
}

fn cmd_info() -> Result<()> {
    let defaults = HistoryConfig::default();
    let sim = SimConfig::default();

    println!("=== Flood Deduplication Engine ===");
    println!();
    println!("Limits:");
    println!("  Max hop limit:        {}", MAX_HOP_LIMIT);
    println!("  Relayers per packet:  {}", NUM_RELAYERS);
    println!("  Max simulated nodes:  {}", MAX_SIM_NODES);
    println!();
    println!("History defaults:");
    println!("  Capacity:             {} records", DEFAULT_CAPACITY);
    println!(
        "  Flood expiry:         {} ms ({} min)",
        DEFAULT_FLOOD_EXPIRE_MS,
        DEFAULT_FLOOD_EXPIRE_MS / 60_000
    );
    println!();
    println!("Default history config:");
    println!("{}", serde_json::to_string_pretty(&defaults)?);
    println!();
    println!("Default simulation config:");
    println!("{}", serde_json::to_string_pretty(&sim)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Simulate {
            config,
            nodes,
            messages,
            hop_limit,
            capacity,
            link_prob,
            seed,
            json,
        } => cmd_simulate(config, nodes, messages, hop_limit, capacity, link_prob, seed, json),

        Commands::Replay {
            trace,
            config,
            node,
            stats,
        } => cmd_replay(trace, config, node, stats),

        Commands::Info => cmd_info(),
    }
}
