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

use std::{net::SocketAddr, sync::Arc};

use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use log::*;
use murmur_shutdown::ShutdownSignal;
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle, time};

use crate::{
    config::OverlayConfig,
    connection::{self, ConnectionId},
    connection_manager::ConnectionDirection,
    identity::{NodeId, NodeIdentity},
    pool::PeerPool,
    proto::{
        handshake::{perform_handshake, HandshakeOutcome},
        HandshakeError,
    },
};

const LOG_TARGET: &str = "overlay::connection_manager::manager";

/// Requests accepted by the connection manager.
#[derive(Debug)]
pub(crate) enum ManagerRequest {
    /// Attempt an outbound connection to the given address.
    Dial(SocketAddr),
}

struct HandshakeTaskResult {
    direction: ConnectionDirection,
    peer_addr: SocketAddr,
    result: Result<HandshakeOutcome<TcpStream>, HandshakeError>,
}

type PendingHandshakes = FuturesUnordered<BoxFuture<'static, HandshakeTaskResult>>;
type ActiveConnections = FuturesUnordered<BoxFuture<'static, (NodeId, ConnectionId)>>;

/// Drives all connection activity of a booted node: it runs handshakes for accepted
/// and dialed sockets concurrently, offers authenticated survivors to the peer pool
/// and evicts pool entries when their channels close.
pub(crate) struct ConnectionManager {
    config: OverlayConfig,
    node_identity: Arc<NodeIdentity>,
    pool: Arc<PeerPool>,
    request_rx: mpsc::Receiver<ManagerRequest>,
    conn_rx: mpsc::Receiver<(TcpStream, SocketAddr)>,
    shutdown_signal: ShutdownSignal,
}

impl ConnectionManager {
    pub fn new(
        config: OverlayConfig,
        node_identity: Arc<NodeIdentity>,
        pool: Arc<PeerPool>,
        request_rx: mpsc::Receiver<ManagerRequest>,
        conn_rx: mpsc::Receiver<(TcpStream, SocketAddr)>,
        shutdown_signal: ShutdownSignal,
    ) -> Self {
        Self {
            config,
            node_identity,
            pool,
            request_rx,
            conn_rx,
            shutdown_signal,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut pending_handshakes: PendingHandshakes = FuturesUnordered::new();
        let mut active_connections: ActiveConnections = FuturesUnordered::new();
        debug!(target: LOG_TARGET, "Connection manager started");

        loop {
            tokio::select! {
                biased;
                _ = &mut self.shutdown_signal => {
                    info!(
                        target: LOG_TARGET,
                        "Connection manager shutting down because the shutdown signal was received"
                    );
                    break;
                },
                Some(completed) = pending_handshakes.next() => {
                    self.handle_handshake_result(&mut active_connections, completed);
                },
                Some((node_id, connection_id)) = active_connections.next() => {
                    self.handle_connection_closed(node_id, connection_id);
                },
                Some((socket, peer_addr)) = self.conn_rx.recv() => {
                    self.spawn_inbound_handshake(&pending_handshakes, socket, peer_addr);
                },
                Some(request) = self.request_rx.recv() => {
                    self.handle_request(&pending_handshakes, request);
                },
            }
        }

        self.shutdown(pending_handshakes, active_connections).await;
    }

    fn handle_request(&self, pending_handshakes: &PendingHandshakes, request: ManagerRequest) {
        match request {
            ManagerRequest::Dial(peer_addr) => self.spawn_outbound_handshake(pending_handshakes, peer_addr),
        }
    }

    fn spawn_inbound_handshake(
        &self,
        pending_handshakes: &PendingHandshakes,
        socket: TcpStream,
        peer_addr: SocketAddr,
    ) {
        let node_identity = Arc::clone(&self.node_identity);
        let config = self.config.clone();
        let cancel_signal = self.shutdown_signal.clone();
        pending_handshakes.push(
            async move {
                let result = perform_handshake(
                    &node_identity,
                    ConnectionDirection::Inbound,
                    socket,
                    &config,
                    cancel_signal,
                )
                .await;
                HandshakeTaskResult {
                    direction: ConnectionDirection::Inbound,
                    peer_addr,
                    result,
                }
            }
            .boxed(),
        );
    }

    fn spawn_outbound_handshake(&self, pending_handshakes: &PendingHandshakes, peer_addr: SocketAddr) {
        debug!(target: LOG_TARGET, "Dialing peer at {}", peer_addr);
        let node_identity = Arc::clone(&self.node_identity);
        let config = self.config.clone();
        let cancel_signal = self.shutdown_signal.clone();
        pending_handshakes.push(
            async move {
                let result = async {
                    let socket = time::timeout(config.dial_timeout, TcpStream::connect(peer_addr))
                        .await
                        .map_err(|_| HandshakeError::TimedOut)?
                        .map_err(HandshakeError::Io)?;
                    perform_handshake(
                        &node_identity,
                        ConnectionDirection::Outbound,
                        socket,
                        &config,
                        cancel_signal,
                    )
                    .await
                }
                .await;
                HandshakeTaskResult {
                    direction: ConnectionDirection::Outbound,
                    peer_addr,
                    result,
                }
            }
            .boxed(),
        );
    }

    fn handle_handshake_result(
        &self,
        active_connections: &mut ActiveConnections,
        completed: HandshakeTaskResult,
    ) {
        let HandshakeTaskResult {
            direction,
            peer_addr,
            result,
        } = completed;
        match result {
            Ok(outcome) => {
                let (connection, monitor) = connection::create(
                    outcome.framed,
                    outcome.peer_node_id,
                    direction,
                    self.shutdown_signal.clone(),
                );
                let peer_node_id = connection.peer_node_id().clone();
                if self.pool.commit(connection) {
                    debug!(
                        target: LOG_TARGET,
                        "Peer '{}' admitted to the pool over the {} connection to {}",
                        peer_node_id.short_str(),
                        direction,
                        peer_addr
                    );
                    active_connections.push(monitor);
                } else {
                    // The pool kept another connection for this identity, or refused
                    // self peering. Dropping the monitor closes this stream.
                    debug!(
                        target: LOG_TARGET,
                        "Authenticated {} connection to peer '{}' discarded by the pool",
                        direction,
                        peer_node_id.short_str()
                    );
                }
            },
            Err(err) => {
                debug!(
                    target: LOG_TARGET,
                    "{} handshake with {} failed: {}", direction, peer_addr, err
                );
            },
        }
    }

    fn handle_connection_closed(&self, node_id: NodeId, connection_id: ConnectionId) {
        if self.pool.remove_if_current(&node_id, connection_id) {
            debug!(
                target: LOG_TARGET,
                "Connection {} to peer '{}' closed, entry removed from the pool",
                connection_id,
                node_id.short_str()
            );
        }
    }

    async fn shutdown(
        &mut self,
        mut pending_handshakes: PendingHandshakes,
        mut active_connections: ActiveConnections,
    ) {
        self.pool.clear();
        // In-flight handshakes observe the shutdown signal and resolve without any
        // chance of committing to the pool; their streams are dropped here. Monitors
        // close their streams on the same signal.
        while pending_handshakes.next().await.is_some() {}
        while active_connections.next().await.is_some() {}
        debug!(target: LOG_TARGET, "Connection manager shut down");
    }
}
