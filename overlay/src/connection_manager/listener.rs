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

use std::net::SocketAddr;

use log::*;
use murmur_shutdown::ShutdownSignal;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinHandle,
};

const LOG_TARGET: &str = "overlay::connection_manager::listener";

/// Accepts inbound transport connections and forwards them to the connection
/// manager. The socket is bound before this task starts, so a node never reports a
/// successful boot with a dead listener.
pub(crate) struct PeerListener {
    listener: TcpListener,
    conn_tx: mpsc::Sender<(TcpStream, SocketAddr)>,
    shutdown_signal: ShutdownSignal,
}

impl PeerListener {
    pub fn new(
        listener: TcpListener,
        conn_tx: mpsc::Sender<(TcpStream, SocketAddr)>,
        shutdown_signal: ShutdownSignal,
    ) -> Self {
        Self {
            listener,
            conn_tx,
            shutdown_signal,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        debug!(target: LOG_TARGET, "Peer listener started");
        loop {
            tokio::select! {
                biased;
                _ = &mut self.shutdown_signal => {
                    info!(
                        target: LOG_TARGET,
                        "Peer listener shutting down because the shutdown signal was received"
                    );
                    break;
                },
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        debug!(target: LOG_TARGET, "Accepted inbound connection from {}", peer_addr);
                        if self.conn_tx.send((socket, peer_addr)).await.is_err() {
                            // Manager gone, nothing left to hand connections to
                            break;
                        }
                    },
                    // Transient accept failures (fd exhaustion, aborted connections)
                    // must not kill the listener
                    Err(err) => {
                        warn!(target: LOG_TARGET, "Failed to accept inbound connection: {}", err);
                    },
                },
            }
        }
        // Dropping the bound socket here releases the listen address.
    }
}
