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

//! End to end tests of node boot, authentication and pool convergence over real
//! sockets.

use std::time::Duration;

use murmur_overlay::{types::OverlaySecretKey, Overlay, OverlayConfig, OverlayError};
use rand::rngs::OsRng;

const APP_ID: &str = "overlay.test";

// Time allowed for dials and handshakes to settle before asserting pool contents.
const SETTLE: Duration = Duration::from_secs(1);

fn namespace_credential() -> OverlaySecretKey {
    OverlaySecretKey::generate(&mut OsRng)
}

async fn booted_node(app_id: &str, credential: OverlaySecretKey) -> Overlay {
    let mut node = Overlay::new(app_id, credential, OverlayConfig::default());
    node.boot().await.expect("failed to boot node");
    node
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_credential_peers_converge() {
    let credential = namespace_credential();
    let mut alice = booted_node(APP_ID, credential.clone()).await;
    let mut bob = booted_node(APP_ID, credential).await;

    alice.dial(bob.listen_addr().unwrap()).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    assert_eq!(alice.peer_count(), 1);
    assert!(alice.pool().contains(bob.node_id()));
    assert_eq!(bob.peer_count(), 1);
    assert!(bob.pool().contains(alice.node_id()));

    alice.shutdown().await;
    bob.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn foreign_namespace_is_isolated() {
    let credential = namespace_credential();
    let mut alice = booted_node(APP_ID, credential.clone()).await;
    let mut bob = booted_node(APP_ID, credential.clone()).await;
    alice.dial(bob.listen_addr().unwrap()).await.unwrap();

    // Same credential, different application namespace.
    let mut eve = booted_node("overlay.test.bad", credential).await;
    eve.dial(alice.listen_addr().unwrap()).await.unwrap();
    eve.dial(bob.listen_addr().unwrap()).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    assert_eq!(eve.peer_count(), 0);
    assert!(!alice.pool().contains(eve.node_id()));
    assert!(!bob.pool().contains(eve.node_id()));
    assert_eq!(alice.peers(), vec![bob.node_id().clone()]);
    assert_eq!(bob.peers(), vec![alice.node_id().clone()]);

    alice.shutdown().await;
    bob.shutdown().await;
    eve.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn foreign_credential_is_rejected() {
    let credential = namespace_credential();
    let mut alice = booted_node(APP_ID, credential.clone()).await;
    let mut bob = booted_node(APP_ID, credential).await;
    alice.dial(bob.listen_addr().unwrap()).await.unwrap();

    // Same application namespace, different credential.
    let mut mallory = booted_node(APP_ID, namespace_credential()).await;
    mallory.dial(alice.listen_addr().unwrap()).await.unwrap();
    mallory.dial(bob.listen_addr().unwrap()).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    assert_eq!(mallory.peer_count(), 0);
    assert!(!alice.pool().contains(mallory.node_id()));
    assert!(!bob.pool().contains(mallory.node_id()));
    assert_eq!(alice.peer_count(), 1);
    assert_eq!(bob.peer_count(), 1);

    alice.shutdown().await;
    bob.shutdown().await;
    mallory.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn simultaneous_dials_converge_to_one_connection() {
    let credential = namespace_credential();
    let mut alice = booted_node(APP_ID, credential.clone()).await;
    let mut bob = booted_node(APP_ID, credential).await;

    let (alice_dial, bob_dial) = tokio::join!(
        alice.dial(bob.listen_addr().unwrap()),
        bob.dial(alice.listen_addr().unwrap()),
    );
    alice_dial.unwrap();
    bob_dial.unwrap();
    tokio::time::sleep(SETTLE).await;

    // The duplicate race resolves to exactly one pooled connection on each end.
    assert_eq!(alice.peer_count(), 1);
    assert!(alice.pool().contains(bob.node_id()));
    assert_eq!(bob.peer_count(), 1);
    assert!(bob.pool().contains(alice.node_id()));

    alice.shutdown().await;
    bob.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn self_dial_never_pools() {
    let mut alice = booted_node(APP_ID, namespace_credential()).await;

    alice.dial(alice.listen_addr().unwrap()).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    assert_eq!(alice.peer_count(), 0);
    alice.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_releases_the_listen_address() {
    let credential = namespace_credential();
    let mut first = booted_node(APP_ID, credential.clone()).await;
    let addr = first.listen_addr().unwrap();
    first.shutdown().await;
    assert!(!first.is_booted());
    assert!(first.listen_addr().is_none());

    // Shutdown waits for teardown, so the exact address is immediately reusable.
    let config = OverlayConfig {
        listen_addr: addr,
        ..Default::default()
    };
    let mut second = Overlay::new(APP_ID, credential, config);
    second.boot().await.expect("listen address was not released");
    second.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_is_idempotent() {
    let mut node = booted_node(APP_ID, namespace_credential()).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        node.shutdown().await;
        node.shutdown().await;
    })
    .await
    .expect("repeated shutdown must not hang");

    // Shutting down an un-booted node is a no-op.
    let mut never_booted = Overlay::new(APP_ID, namespace_credential(), OverlayConfig::default());
    never_booted.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_guards() {
    let mut node = Overlay::new(APP_ID, namespace_credential(), OverlayConfig::default());
    assert!(matches!(
        node.dial("127.0.0.1:1".parse().unwrap()).await.unwrap_err(),
        OverlayError::NotBooted
    ));

    node.boot().await.unwrap();
    assert!(matches!(node.boot().await.unwrap_err(), OverlayError::AlreadyBooted));
    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn peer_disconnect_evicts_the_pool_entry() {
    let credential = namespace_credential();
    let mut alice = booted_node(APP_ID, credential.clone()).await;
    let mut bob = booted_node(APP_ID, credential).await;

    alice.dial(bob.listen_addr().unwrap()).await.unwrap();
    tokio::time::sleep(SETTLE).await;
    assert_eq!(alice.peer_count(), 1);

    // Bob going away closes the channel; Alice notices and evicts the entry.
    bob.shutdown().await;
    tokio::time::sleep(SETTLE).await;
    assert_eq!(alice.peer_count(), 0);

    alice.shutdown().await;
}
