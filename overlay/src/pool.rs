// Copyright 2024, The Murmur Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! The registry of live authenticated peers, keyed by node identity.

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::RwLock,
};

use log::*;

use crate::{
    connection::{ConnectionId, PeerConnection},
    connection_manager::ConnectionDirection,
    identity::NodeId,
};

const LOG_TARGET: &str = "overlay::pool";

/// A pool entry: the peer's identity bound to its live authenticated connection.
pub type PoolEntry = PeerConnection;

/// Thread-safe pool of authenticated peer connections, at most one entry per remote
/// identity.
///
/// When both ends of a pair dial each other simultaneously, two authenticated
/// connections to the same identity race into the pool. The duplicate is resolved
/// deterministically and symmetrically: the connection dialed by the numerically
/// smaller node id wins, so both ends settle on the same underlying stream.
pub struct PeerPool {
    local_node_id: NodeId,
    entries: RwLock<HashMap<String, PoolEntry>>,
}

impl PeerPool {
    pub fn new(local_node_id: NodeId) -> Self {
        Self {
            local_node_id,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn local_node_id(&self) -> &NodeId {
        &self.local_node_id
    }

    /// Offers an authenticated connection to the pool. Returns whether the entry was
    /// admitted; refused entries (self peering, lost duplicate races) are
    /// disconnected before returning.
    pub fn commit(&self, entry: PoolEntry) -> bool {
        if *entry.peer_node_id() == self.local_node_id {
            debug!(
                target: LOG_TARGET,
                "Refusing to admit own identity into the peer pool"
            );
            entry.disconnect();
            return false;
        }

        let key = entry.peer_node_id().to_string();
        let mut displaced = None;
        let admitted = {
            let mut lock = self.entries.write().expect("peer pool lock poisoned");
            match lock.entry(key) {
                Entry::Vacant(vacant) => {
                    vacant.insert(entry);
                    true
                },
                Entry::Occupied(mut occupied) => {
                    if self.replaces(occupied.get(), &entry) {
                        displaced = Some(occupied.insert(entry));
                        true
                    } else {
                        displaced = Some(entry);
                        false
                    }
                },
            }
        };
        if let Some(loser) = displaced {
            debug!(
                target: LOG_TARGET,
                "Duplicate connection to peer '{}' resolved, dropping the {} connection {}",
                loser.peer_node_id().short_str(),
                loser.direction(),
                loser.id()
            );
            loser.disconnect();
        }
        admitted
    }

    // The winning direction between a pair is fixed by identity order: the smaller
    // node id's outbound connection is kept on both ends.
    fn replaces(&self, existing: &PoolEntry, candidate: &PoolEntry) -> bool {
        let preferred = if self.local_node_id < *candidate.peer_node_id() {
            ConnectionDirection::Outbound
        } else {
            ConnectionDirection::Inbound
        };
        candidate.direction() == preferred && existing.direction() != preferred
    }

    pub fn lookup(&self, node_id: &NodeId) -> Option<PoolEntry> {
        self.entries
            .read()
            .expect("peer pool lock poisoned")
            .get(&node_id.to_string())
            .cloned()
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.entries
            .read()
            .expect("peer pool lock poisoned")
            .contains_key(&node_id.to_string())
    }

    /// Removes and disconnects the entry for the given identity, if any. Absent
    /// identities are a no-op, so removal is idempotent.
    pub fn remove(&self, node_id: &NodeId) -> Option<PoolEntry> {
        let removed = self
            .entries
            .write()
            .expect("peer pool lock poisoned")
            .remove(&node_id.to_string());
        if let Some(entry) = &removed {
            entry.disconnect();
        }
        removed
    }

    /// Removes the entry for the given identity only if it still refers to the given
    /// connection instance. Keeps a closing loser of a duplicate race from evicting
    /// the winner that replaced it.
    pub(crate) fn remove_if_current(&self, node_id: &NodeId, connection_id: ConnectionId) -> bool {
        let key = node_id.to_string();
        let mut lock = self.entries.write().expect("peer pool lock poisoned");
        match lock.get(&key) {
            Some(entry) if entry.id() == connection_id => {
                lock.remove(&key);
                true
            },
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("peer pool lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A point-in-time copy of all entries. Later pool mutations do not affect the
    /// returned snapshot.
    pub fn snapshot(&self) -> Vec<PoolEntry> {
        self.entries
            .read()
            .expect("peer pool lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Identities of all pooled peers in ascending ring position.
    pub fn peer_ids(&self) -> Vec<NodeId> {
        let mut ids = self
            .entries
            .read()
            .expect("peer pool lock poisoned")
            .values()
            .map(|entry| entry.peer_node_id().clone())
            .collect::<Vec<_>>();
        ids.sort_by(murmur_sortext::ascending);
        ids
    }

    /// Disconnects and removes every entry.
    pub fn clear(&self) {
        let drained = {
            let mut lock = self.entries.write().expect("peer pool lock poisoned");
            lock.drain().map(|(_, entry)| entry).collect::<Vec<_>>()
        };
        for entry in drained {
            entry.disconnect();
        }
    }
}

#[cfg(test)]
mod test {
    use num_bigint::BigUint;

    use super::*;

    fn id(n: u32) -> NodeId {
        NodeId::from_biguint(BigUint::from(n))
    }

    fn entry(peer: u32, direction: ConnectionDirection) -> PoolEntry {
        PeerConnection::new_for_test(id(peer), direction)
    }

    #[test]
    fn admits_new_peers() {
        let pool = PeerPool::new(id(1));
        assert!(pool.commit(entry(2, ConnectionDirection::Outbound)));
        assert!(pool.commit(entry(3, ConnectionDirection::Inbound)));
        assert_eq!(pool.len(), 2);
        assert!(pool.contains(&id(2)));
        assert!(pool.lookup(&id(3)).is_some());
    }

    #[test]
    fn refuses_self_peering() {
        let pool = PeerPool::new(id(1));
        let own = entry(1, ConnectionDirection::Inbound);
        let handle = own.clone();
        assert!(!pool.commit(own));
        assert!(pool.is_empty());
        assert!(handle.is_disconnected());
    }

    #[test]
    fn smaller_id_outbound_wins_duplicate_race() {
        // Local id 1 < peer id 2, so the outbound connection is preferred.
        let pool = PeerPool::new(id(1));
        let inbound = entry(2, ConnectionDirection::Inbound);
        let inbound_handle = inbound.clone();
        assert!(pool.commit(inbound));

        let outbound = entry(2, ConnectionDirection::Outbound);
        let outbound_id = outbound.id();
        assert!(pool.commit(outbound));

        assert_eq!(pool.len(), 1);
        assert!(inbound_handle.is_disconnected());
        assert_eq!(pool.lookup(&id(2)).unwrap().id(), outbound_id);
    }

    #[test]
    fn larger_id_keeps_inbound_in_duplicate_race() {
        // Local id 5 > peer id 2, so the inbound connection is preferred and the
        // outbound candidate loses.
        let pool = PeerPool::new(id(5));
        let inbound = entry(2, ConnectionDirection::Inbound);
        let inbound_id = inbound.id();
        assert!(pool.commit(inbound));

        let outbound = entry(2, ConnectionDirection::Outbound);
        let outbound_handle = outbound.clone();
        assert!(!pool.commit(outbound));

        assert_eq!(pool.len(), 1);
        assert!(outbound_handle.is_disconnected());
        assert_eq!(pool.lookup(&id(2)).unwrap().id(), inbound_id);
    }

    #[test]
    fn same_direction_duplicate_keeps_the_incumbent() {
        let pool = PeerPool::new(id(5));
        let first = entry(2, ConnectionDirection::Inbound);
        let first_id = first.id();
        assert!(pool.commit(first));
        assert!(!pool.commit(entry(2, ConnectionDirection::Inbound)));
        assert_eq!(pool.lookup(&id(2)).unwrap().id(), first_id);
    }

    #[test]
    fn removal_is_idempotent() {
        let pool = PeerPool::new(id(1));
        pool.commit(entry(2, ConnectionDirection::Outbound));
        let removed = pool.remove(&id(2)).unwrap();
        assert!(removed.is_disconnected());
        assert!(pool.remove(&id(2)).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn remove_if_current_ignores_stale_connection_ids() {
        let pool = PeerPool::new(id(1));
        let stale = entry(2, ConnectionDirection::Outbound);
        let stale_id = stale.id();
        let current = entry(2, ConnectionDirection::Outbound);
        let current_id = current.id();
        pool.commit(current);

        drop(stale);
        assert!(!pool.remove_if_current(&id(2), stale_id));
        assert_eq!(pool.len(), 1);
        assert!(pool.remove_if_current(&id(2), current_id));
        assert!(pool.is_empty());
    }

    #[test]
    fn snapshot_is_point_in_time() {
        let pool = PeerPool::new(id(1));
        pool.commit(entry(2, ConnectionDirection::Outbound));
        let snapshot = pool.snapshot();
        pool.commit(entry(3, ConnectionDirection::Outbound));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn peer_ids_are_in_ring_order() {
        let pool = PeerPool::new(id(1));
        for peer in [9, 3, 7, 5] {
            pool.commit(entry(peer, ConnectionDirection::Outbound));
        }
        assert_eq!(pool.peer_ids(), vec![id(3), id(5), id(7), id(9)]);
    }

    #[test]
    fn clear_disconnects_everything() {
        let pool = PeerPool::new(id(1));
        let a = entry(2, ConnectionDirection::Outbound);
        let b = entry(3, ConnectionDirection::Inbound);
        let (a_handle, b_handle) = (a.clone(), b.clone());
        pool.commit(a);
        pool.commit(b);

        pool.clear();
        assert!(pool.is_empty());
        assert!(a_handle.is_disconnected());
        assert!(b_handle.is_disconnected());
    }
}
