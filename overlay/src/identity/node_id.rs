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

use std::fmt;

use blake2::{
    digest::{Update, VariableOutput},
    Blake2bVar,
};
use num_bigint::BigUint;

use crate::{identity::NodeDistance, types::OverlayPublicKey};

/// Size in bytes of a node id on the ring.
pub const NODE_ID_BYTES: usize = 32;

/// A node's pseudonymous position on the overlay ring, derived by hashing its session
/// public key. Ids are interpreted as unsigned integers modulo 2^256.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    inner: BigUint,
}

impl NodeId {
    /// Derives a node id from a session public key.
    pub fn from_public_key(public_key: &OverlayPublicKey) -> Self {
        // `Blake2bVar::new` only fails on unsupported output sizes and 32 bytes is
        // supported.
        let mut hasher = Blake2bVar::new(NODE_ID_BYTES).expect("unsupported hash output size");
        hasher.update(public_key.as_bytes());
        let mut digest = [0u8; NODE_ID_BYTES];
        hasher
            .finalize_variable(&mut digest)
            .expect("hash output size mismatch");
        Self {
            inner: BigUint::from_bytes_be(&digest),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_biguint(inner: BigUint) -> Self {
        Self { inner }
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.inner
    }

    pub const fn byte_size() -> usize {
        NODE_ID_BYTES
    }

    /// Distance to another node, measured along the shorter arc of the ring.
    pub fn distance(&self, other: &NodeId) -> NodeDistance {
        NodeDistance::between(self, other)
    }

    /// Returns up to `n` node ids from `candidates`, ranked by ring distance from
    /// this node.
    pub fn closest(&self, candidates: &[NodeId], n: usize) -> Vec<NodeId> {
        let mut ranked = candidates
            .iter()
            .map(|id| (self.distance(id), id.clone()))
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| murmur_sortext::ascending(&a.0, &b.0));
        ranked.into_iter().take(n).map(|(_, id)| id).collect()
    }

    /// A short hexadecimal prefix of the id, for log readability.
    pub fn short_str(&self) -> String {
        let mut hex = self.to_string();
        hex.truncate(12);
        hex
    }
}

/// Full zero-padded hexadecimal rendering. This is the canonical string form used to
/// key pool entries.
impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0>width$x}", self.inner, width = NODE_ID_BYTES * 2)
    }
}

#[cfg(test)]
mod test {
    use rand::rngs::OsRng;

    use super::*;
    use crate::types::OverlaySecretKey;

    fn random_public_key() -> OverlayPublicKey {
        OverlaySecretKey::generate(&mut OsRng).verifying_key()
    }

    #[test]
    fn derivation_is_deterministic() {
        let public_key = random_public_key();
        assert_eq!(
            NodeId::from_public_key(&public_key),
            NodeId::from_public_key(&public_key)
        );
    }

    #[test]
    fn distinct_keys_produce_distinct_ids() {
        assert_ne!(
            NodeId::from_public_key(&random_public_key()),
            NodeId::from_public_key(&random_public_key())
        );
    }

    #[test]
    fn id_is_not_the_key_bytes() {
        let public_key = random_public_key();
        let node_id = NodeId::from_public_key(&public_key);
        assert_ne!(
            node_id.as_biguint(),
            &BigUint::from_bytes_be(public_key.as_bytes())
        );
    }

    #[test]
    fn display_is_fixed_width_hex() {
        let small = NodeId::from_biguint(BigUint::from(0xabcu32));
        let rendered = small.to_string();
        assert_eq!(rendered.len(), NODE_ID_BYTES * 2);
        assert!(rendered.starts_with("0000"));
        assert!(rendered.ends_with("abc"));
    }

    #[test]
    fn short_str_is_a_display_prefix() {
        let node_id = NodeId::from_public_key(&random_public_key());
        assert_eq!(node_id.short_str(), node_id.to_string()[..12]);
    }

    #[test]
    fn closest_ranks_by_ring_distance() {
        let origin = NodeId::from_biguint(BigUint::from(100u32));
        let candidates = vec![
            NodeId::from_biguint(BigUint::from(200u32)),
            NodeId::from_biguint(BigUint::from(105u32)),
            NodeId::from_biguint(BigUint::from(90u32)),
        ];
        let ranked = origin.closest(&candidates, 2);
        assert_eq!(ranked, vec![
            NodeId::from_biguint(BigUint::from(105u32)),
            NodeId::from_biguint(BigUint::from(90u32)),
        ]);
        // Asking for more than available returns everything
        assert_eq!(origin.closest(&candidates, 10).len(), 3);
    }
}
