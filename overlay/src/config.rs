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

use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

/// Tuning knobs for an overlay node.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// The socket address the node listens on for inbound peers. Port 0 lets the
    /// operating system assign an ephemeral port.
    /// Default: 127.0.0.1:0
    pub listen_addr: SocketAddr,
    /// Maximum time allowed for an outbound connection attempt to establish a
    /// transport stream.
    /// Default: 5s
    pub dial_timeout: Duration,
    /// Maximum time allowed for each blocking step (send or receive of a single
    /// message) of the authentication handshake.
    /// Default: 10s
    pub handshake_timeout: Duration,
    /// Maximum size in bytes of a single length-delimited frame on the wire.
    /// Default: 1024
    pub max_frame_size: usize,
    /// Buffer size of the channel carrying accepted sockets from the listener to the
    /// connection manager.
    /// Default: 32
    pub inbound_buffer_size: usize,
    /// Buffer size of the channel carrying requests (dials) into the connection
    /// manager.
    /// Default: 32
    pub request_buffer_size: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            dial_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(10),
            max_frame_size: 1024,
            inbound_buffer_size: 32,
            request_buffer_size: 32,
        }
    }
}
