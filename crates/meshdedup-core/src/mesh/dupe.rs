//! Router-side handling of duplicate packets
//!
//! The history only reports facts about a packet. This module turns an
//! [`Observation`] into what a managed-flooding router does with the copy it
//! just heard, and learns next hops from acknowledgments.
//!
//! ```text
//!              observe()
//! packet ──► PacketHistory ──► Observation ──► DupeAction::classify ──► router
//! ```

use super::clock::Clock;
use super::history::{Observation, PacketHistory};
use super::packet::{MeshPacket, PacketId, RelayId};

/// What to do with a received copy of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupeAction {
    /// First copy: deliver and schedule a rebroadcast
    Process,
    /// A directed packet fell back to flooding: relay it ourselves
    RelayAgain,
    /// A copy with more hops left arrived: relay it again
    RelayUpgraded,
    /// The originator is retransmitting: handle it again
    Reprocess,
    /// We were the nominated next hop: keep our pending relay
    KeepPending,
    /// Someone else already relayed: drop our pending relay
    CancelPending,
}

impl DupeAction {
    /// Classify an observation of `packet`
    pub fn classify(observation: &Observation, packet: &MeshPacket) -> Self {
        if !observation.seen_recently {
            return DupeAction::Process;
        }
        if observation.was_fallback {
            return DupeAction::RelayAgain;
        }
        if observation.was_upgraded && packet.hop_limit > 0 {
            return DupeAction::RelayUpgraded;
        }
        if packet.is_repeated() {
            return DupeAction::Reprocess;
        }
        if observation.we_were_next_hop {
            return DupeAction::KeepPending;
        }
        DupeAction::CancelPending
    }

    /// The copy should be (re)transmitted by us
    pub fn should_relay(self) -> bool {
        matches!(
            self,
            DupeAction::Process | DupeAction::RelayAgain | DupeAction::RelayUpgraded
        )
    }

    /// A pending relay of ours should be dropped
    pub fn cancels_pending(self) -> bool {
        self == DupeAction::CancelPending
    }
}

/// Learn a next hop from a reply to `request_id`.
///
/// `reply` travels back to the original sender (`reply.to`). Its relayer is
/// a good next hop toward `reply.from` when both it and we relayed the
/// original packet, or when we were the only relayer and the reply came
/// straight from its origin.
pub fn learn_next_hop<C: Clock>(
    history: &PacketHistory<C>,
    reply: &MeshPacket,
    request_id: PacketId,
) -> Option<RelayId> {
    if request_id == 0 || reply.relay_node.is_none() {
        return None;
    }

    let check = history.check_relayers(
        reply.relay_node,
        history.our_relay_id(),
        request_id,
        reply.to,
    );
    let both_relayed = check.first && check.second;
    let direct_reply = reply.is_repeated() && check.second_sole;

    if both_relayed || direct_reply {
        tracing::debug!(
            "Learned next hop {} toward {} from reply to {:#x}",
            reply.relay_node,
            reply.from,
            request_id
        );
        Some(reply.relay_node)
    } else {
        None
    }
}
