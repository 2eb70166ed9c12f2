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

//! # murmur_overlay
//!
//! The secure overlay layer of the murmur decentralized messaging framework.
//!
//! Nodes carrying the same application namespace and pre-shared credential find each
//! other through an external discovery collaborator, authenticate mutually via
//! challenge-response, and maintain a pool of live peer connections keyed by
//! pseudonymous node identity on a closed numeric ring.
//!
//! ```no_run
//! use murmur_overlay::{Overlay, OverlayConfig, types::OverlaySecretKey};
//!
//! # async fn example() -> Result<(), murmur_overlay::OverlayError> {
//! let credential = OverlaySecretKey::generate(&mut rand::rngs::OsRng);
//! let mut node = Overlay::new("echo.chat", credential, OverlayConfig::default());
//! node.boot().await?;
//! // Addresses from discovery:
//! node.dial("127.0.0.1:40000".parse().unwrap()).await?;
//! node.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod connection;
mod connection_manager;
mod error;
pub mod identity;
mod node;
pub mod pool;
pub mod proto;
pub mod types;

pub use config::OverlayConfig;
pub use connection::{ConnectionId, PeerConnection};
pub use connection_manager::ConnectionDirection;
pub use error::OverlayError;
pub use identity::{NodeDistance, NodeId, NodeIdentity};
pub use node::Overlay;
pub use pool::{PeerPool, PoolEntry};
pub use proto::{HandshakeError, HandshakeEvent, HandshakeState};
