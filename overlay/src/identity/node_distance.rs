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

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::identity::{NodeId, NODE_ID_BYTES};

/// Size of the id ring. Node ids are unsigned integers modulo this value.
pub(crate) fn ring_modulus() -> BigUint {
    BigUint::one() << (NODE_ID_BYTES * 8)
}

/// Separation of two ids along the shorter arc of the overlay ring. Symmetric by
/// construction.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeDistance(BigUint);

impl NodeDistance {
    /// Computes the ring distance between two node ids.
    pub fn between(a: &NodeId, b: &NodeId) -> NodeDistance {
        let modulus = ring_modulus();
        let (a, b) = (a.as_biguint(), b.as_biguint());
        let forward = if b >= a { b - a } else { &modulus - a + b };
        let backward = (&modulus - &forward) % &modulus;
        NodeDistance(forward.min(backward))
    }

    pub fn zero() -> NodeDistance {
        NodeDistance(BigUint::zero())
    }

    /// The largest possible separation: half way around the ring.
    pub fn max_distance() -> NodeDistance {
        NodeDistance(ring_modulus() >> 1)
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl fmt::Display for NodeDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(n: BigUint) -> NodeId {
        NodeId::from_biguint(n)
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = id(BigUint::from(12345u32));
        assert_eq!(a.distance(&a), NodeDistance::zero());
    }

    #[test]
    fn distance_is_commutative() {
        let a = id(BigUint::from(17u32));
        let b = id(BigUint::from(90000u32));
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn short_arc_wins_across_the_origin() {
        // Ids sitting just either side of the ring origin are close, not almost a
        // whole ring apart.
        let a = id(BigUint::from(1u8));
        let b = id(ring_modulus() - BigUint::from(1u8));
        assert_eq!(a.distance(&b), NodeDistance(BigUint::from(2u8)));
    }

    #[test]
    fn antipodes_are_at_max_distance() {
        let a = id(BigUint::zero());
        let b = id(ring_modulus() >> 1);
        assert_eq!(a.distance(&b), NodeDistance::max_distance());
    }

    #[test]
    fn distances_order_numerically() {
        let origin = id(BigUint::from(1000u32));
        let near = origin.distance(&id(BigUint::from(1010u32)));
        let far = origin.distance(&id(BigUint::from(5000u32)));
        assert!(near < far);
        assert!(NodeDistance::zero() < near);
        assert!(far < NodeDistance::max_distance());
    }
}
