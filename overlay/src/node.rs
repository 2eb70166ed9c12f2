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

use log::*;
use murmur_shutdown::Shutdown;
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};

use crate::{
    config::OverlayConfig,
    connection_manager::{ConnectionManager, ManagerRequest, PeerListener},
    error::OverlayError,
    identity::{NodeId, NodeIdentity},
    pool::PeerPool,
    types::OverlaySecretKey,
};

const LOG_TARGET: &str = "overlay::node";

/// A node on the secure overlay.
///
/// Construction is cheap and performs no I/O: the node holds its identity and an
/// empty peer pool until [`boot`](Overlay::boot) brings the network side up. Peer
/// addresses come from an external discovery collaborator via
/// [`dial`](Overlay::dial); inbound peers arrive on the listening socket. Either
/// way, a peer enters the pool only after mutual authentication succeeds.
pub struct Overlay {
    config: OverlayConfig,
    node_identity: Arc<NodeIdentity>,
    pool: Arc<PeerPool>,
    booted: Option<BootedState>,
}

struct BootedState {
    shutdown: Shutdown,
    listen_addr: SocketAddr,
    request_tx: mpsc::Sender<ManagerRequest>,
    listener_handle: JoinHandle<()>,
    manager_handle: JoinHandle<()>,
}

impl Overlay {
    /// Creates an un-booted node within the given application namespace, holding the
    /// pre-shared namespace credential.
    pub fn new(app_id: impl Into<String>, key_material: OverlaySecretKey, config: OverlayConfig) -> Self {
        let node_identity = Arc::new(NodeIdentity::new(app_id, key_material));
        let pool = Arc::new(PeerPool::new(node_identity.node_id().clone()));
        Self {
            config,
            node_identity,
            pool,
            booted: None,
        }
    }

    /// Binds the listening socket and starts the background tasks. On a bind failure
    /// nothing is started and the node remains fully un-booted.
    pub async fn boot(&mut self) -> Result<(), OverlayError> {
        if self.booted.is_some() {
            return Err(OverlayError::AlreadyBooted);
        }
        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(OverlayError::Bind)?;
        let listen_addr = listener.local_addr().map_err(OverlayError::Bind)?;

        let shutdown = Shutdown::new();
        let (conn_tx, conn_rx) = mpsc::channel(self.config.inbound_buffer_size);
        let (request_tx, request_rx) = mpsc::channel(self.config.request_buffer_size);

        let listener_handle = PeerListener::new(listener, conn_tx, shutdown.to_signal()).spawn();
        let manager_handle = ConnectionManager::new(
            self.config.clone(),
            Arc::clone(&self.node_identity),
            Arc::clone(&self.pool),
            request_rx,
            conn_rx,
            shutdown.to_signal(),
        )
        .spawn();

        self.booted = Some(BootedState {
            shutdown,
            listen_addr,
            request_tx,
            listener_handle,
            manager_handle,
        });
        info!(
            target: LOG_TARGET,
            "Overlay node '{}' booted on {}",
            self.node_identity.node_id().short_str(),
            listen_addr
        );
        Ok(())
    }

    /// Requests an outbound connection to a discovered peer address. The attempt
    /// runs in the background; success or failure is observable through the pool.
    pub async fn dial(&self, peer_addr: SocketAddr) -> Result<(), OverlayError> {
        let booted = self.booted.as_ref().ok_or(OverlayError::NotBooted)?;
        booted
            .request_tx
            .send(ManagerRequest::Dial(peer_addr))
            .await
            .map_err(|_| OverlayError::NotBooted)
    }

    /// Tears the node down: triggers the shutdown signal, then waits for the
    /// listener and manager tasks to confirm termination. When this returns, the
    /// listen address is released, the pool is empty and no background task of this
    /// node is running. Idempotent, and a no-op on an un-booted node.
    pub async fn shutdown(&mut self) {
        let Some(mut booted) = self.booted.take() else {
            return;
        };
        booted.shutdown.trigger();
        if let Err(err) = booted.listener_handle.await {
            error!(target: LOG_TARGET, "Listener task failed during shutdown: {}", err);
        }
        if let Err(err) = booted.manager_handle.await {
            error!(target: LOG_TARGET, "Manager task failed during shutdown: {}", err);
        }
        // The manager clears the pool on its way out; this only matters if the
        // manager task panicked.
        self.pool.clear();
        info!(
            target: LOG_TARGET,
            "Overlay node '{}' shut down",
            self.node_identity.node_id().short_str()
        );
    }

    pub fn is_booted(&self) -> bool {
        self.booted.is_some()
    }

    pub fn node_id(&self) -> &NodeId {
        self.node_identity.node_id()
    }

    pub fn node_identity(&self) -> &NodeIdentity {
        &self.node_identity
    }

    /// The bound listen address, once booted. With an ephemeral port configured this
    /// is where the OS actually placed the listener.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.booted.as_ref().map(|booted| booted.listen_addr)
    }

    pub fn pool(&self) -> &PeerPool {
        &self.pool
    }

    pub fn peer_count(&self) -> usize {
        self.pool.len()
    }

    /// Identities of the currently pooled peers, in ring order.
    pub fn peers(&self) -> Vec<NodeId> {
        self.pool.peer_ids()
    }
}
