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

//! # murmur_sortext
//!
//! Sorting extensions for arbitrary precision numeric types, used by the overlay to
//! place node identities on the numeric ring and to rank distances between them.
//!
//! The total order is the exact numeric order: negative < zero < positive, rationals
//! compared exactly (never through a floating point approximation). Equal values may
//! appear in any relative order after sorting; numeric equality is the only contract.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_rational::BigRational;

/// Sorts a slice of arbitrary precision integers in ascending numeric order, in place.
pub fn big_ints(values: &mut [BigInt]) {
    values.sort_unstable();
}

/// Returns whether the slice of arbitrary precision integers is in ascending order.
///
/// Empty and single element slices are trivially sorted.
pub fn big_ints_are_sorted(values: &[BigInt]) -> bool {
    values.windows(2).all(|pair| pair[0] <= pair[1])
}

/// Sorts a slice of arbitrary precision rationals in ascending numeric order, in place.
pub fn big_rats(values: &mut [BigRational]) {
    values.sort_unstable();
}

/// Returns whether the slice of arbitrary precision rationals is in ascending order.
pub fn big_rats_are_sorted(values: &[BigRational]) -> bool {
    values.windows(2).all(|pair| pair[0] <= pair[1])
}

/// Ascending comparator, pluggable into generic sorts (e.g. `slice.sort_by(ascending)`).
pub fn ascending<T: Ord>(a: &T, b: &T) -> Ordering {
    a.cmp(b)
}

/// Descending comparator, the wrapping adapter of [`ascending`].
pub fn descending<T: Ord>(a: &T, b: &T) -> Ordering {
    b.cmp(a)
}
