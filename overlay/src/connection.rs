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
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use futures::{future::BoxFuture, FutureExt, SinkExt, StreamExt};
use log::*;
use murmur_shutdown::{Shutdown, ShutdownSignal};
use tokio::net::TcpStream;

use crate::{connection_manager::ConnectionDirection, identity::NodeId, proto::handshake::FramedSocket};

const LOG_TARGET: &str = "overlay::connection";

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier of a single connection instance. Distinguishes the
/// connections a node may hold to the same peer identity over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a live authenticated connection. Clones share the underlying channel,
/// so disconnecting through any clone tears the connection down for all of them.
#[derive(Debug, Clone)]
pub struct PeerConnection {
    id: ConnectionId,
    peer_node_id: NodeId,
    direction: ConnectionDirection,
    connected_at: Instant,
    disconnect: Shutdown,
}

impl PeerConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_node_id(&self) -> &NodeId {
        &self.peer_node_id
    }

    pub fn direction(&self) -> ConnectionDirection {
        self.direction
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Requests teardown of the underlying channel. Idempotent; the monitor closes
    /// the stream and reports the closure.
    pub fn disconnect(&self) {
        self.disconnect.clone().trigger();
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnect.is_triggered()
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(peer_node_id: NodeId, direction: ConnectionDirection) -> Self {
        Self {
            id: ConnectionId::next(),
            peer_node_id,
            direction,
            connected_at: Instant::now(),
            disconnect: Shutdown::new(),
        }
    }
}

/// Wraps an authenticated stream into a [`PeerConnection`] handle and the monitor
/// future that owns the stream. The monitor resolves with the peer and connection
/// ids once the channel has closed, however that came about.
pub(crate) fn create(
    framed: FramedSocket<TcpStream>,
    peer_node_id: NodeId,
    direction: ConnectionDirection,
    node_shutdown: ShutdownSignal,
) -> (PeerConnection, BoxFuture<'static, (NodeId, ConnectionId)>) {
    let disconnect = Shutdown::new();
    let connection = PeerConnection {
        id: ConnectionId::next(),
        peer_node_id: peer_node_id.clone(),
        direction,
        connected_at: Instant::now(),
        disconnect: disconnect.clone(),
    };
    let monitor = monitor_connection(
        framed,
        peer_node_id,
        connection.id,
        disconnect.to_signal(),
        node_shutdown,
    )
    .boxed();
    (connection, monitor)
}

async fn monitor_connection(
    mut framed: FramedSocket<TcpStream>,
    peer_node_id: NodeId,
    id: ConnectionId,
    mut disconnect_signal: ShutdownSignal,
    mut node_shutdown: ShutdownSignal,
) -> (NodeId, ConnectionId) {
    loop {
        tokio::select! {
            biased;
            _ = &mut disconnect_signal => {
                debug!(
                    target: LOG_TARGET,
                    "Connection {} to peer '{}' disconnecting on request",
                    id,
                    peer_node_id.short_str()
                );
                let _ignore = framed.close().await;
                break;
            },
            _ = &mut node_shutdown => {
                let _ignore = framed.close().await;
                break;
            },
            frame = framed.next() => match frame {
                // Payload routing over established channels belongs to higher
                // layers; the monitor only tracks liveness.
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    debug!(
                        target: LOG_TARGET,
                        "Connection {} to peer '{}' errored: {}",
                        id,
                        peer_node_id.short_str(),
                        err
                    );
                    break;
                },
                None => {
                    debug!(
                        target: LOG_TARGET,
                        "Connection {} to peer '{}' closed by the remote",
                        id,
                        peer_node_id.short_str()
                    );
                    break;
                },
            },
        }
    }
    (peer_node_id, id)
}
