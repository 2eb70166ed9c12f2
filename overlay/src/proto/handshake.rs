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

use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use log::*;
use murmur_shutdown::ShutdownSignal;
use rand::{rngs::OsRng, RngCore};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    time,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{
    config::OverlayConfig,
    connection_manager::ConnectionDirection,
    identity::{NodeId, NodeIdentity},
    proto::{
        messages::{proof_message, HandshakeMessage, NONCE_SIZE},
        state::{HandshakeEvent, HandshakeState},
        HandshakeError,
    },
    types::{OverlayPublicKey, OverlaySignature},
};

const LOG_TARGET: &str = "overlay::proto::handshake";

pub(crate) type FramedSocket<TSocket> = Framed<TSocket, LengthDelimitedCodec>;

/// An authenticated stream together with the peer identity proven over it.
#[derive(Debug)]
pub(crate) struct HandshakeOutcome<TSocket> {
    pub peer_node_id: NodeId,
    pub framed: FramedSocket<TSocket>,
}

/// Runs the mutual authentication handshake over a fresh stream.
///
/// Both directions execute the same symmetric exchange: namespaces are compared
/// before any key material is revealed, then session keys are swapped and each side
/// proves possession of the pre-shared namespace credential by signing the other's
/// challenge. Every blocking step is bounded by the configured handshake timeout and
/// the whole exchange aborts promptly when `cancel_signal` resolves.
///
/// On any failure the stream is closed without telling the remote why.
pub(crate) async fn perform_handshake<TSocket>(
    node_identity: &NodeIdentity,
    direction: ConnectionDirection,
    socket: TSocket,
    config: &OverlayConfig,
    mut cancel_signal: ShutdownSignal,
) -> Result<HandshakeOutcome<TSocket>, HandshakeError>
where
    TSocket: AsyncRead + AsyncWrite + Unpin,
{
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(config.max_frame_size)
        .new_codec();
    let mut framed = Framed::new(socket, codec);
    let mut state = HandshakeState::Start.advance(HandshakeEvent::Initiated);

    let result = tokio::select! {
        biased;
        _ = &mut cancel_signal => Err(HandshakeError::Cancelled),
        result = drive(node_identity, direction, config, &mut framed, &mut state) => result,
    };

    match result {
        Ok(peer_node_id) => {
            debug_assert_eq!(state, HandshakeState::Authenticated);
            debug!(
                target: LOG_TARGET,
                "{} handshake authenticated peer '{}'",
                direction,
                peer_node_id.short_str()
            );
            Ok(HandshakeOutcome { peer_node_id, framed })
        },
        Err(err) => {
            state = state.advance(HandshakeEvent::Failed);
            debug_assert!(state.is_terminal());
            // The remote learns nothing about the failure beyond the stream closing.
            let _ignore = framed.close().await;
            Err(err)
        },
    }
}

async fn drive<TSocket>(
    node_identity: &NodeIdentity,
    direction: ConnectionDirection,
    config: &OverlayConfig,
    framed: &mut FramedSocket<TSocket>,
    state: &mut HandshakeState,
) -> Result<NodeId, HandshakeError>
where
    TSocket: AsyncRead + AsyncWrite + Unpin,
{
    let step_timeout = config.handshake_timeout;

    // Namespace comparison first: nothing but the application id is revealed until
    // the peer is known to be of the same application.
    let local_app_id = Bytes::copy_from_slice(node_identity.app_id().as_bytes());
    send_message(
        framed,
        HandshakeMessage::Namespace {
            app_id: local_app_id.clone(),
        },
        step_timeout,
    )
    .await?;
    let peer_app_id = match recv_message(framed, step_timeout).await? {
        HandshakeMessage::Namespace { app_id } => app_id,
        _ => return Err(HandshakeError::MalformedMessage),
    };
    if peer_app_id != local_app_id {
        *state = state.advance(HandshakeEvent::NamespaceMismatched);
        debug!(
            target: LOG_TARGET,
            "{} handshake rejected: application namespace mismatch", direction
        );
        return Err(HandshakeError::NamespaceMismatch);
    }
    *state = state.advance(HandshakeEvent::NamespaceMatched);

    // Session key exchange. The received key determines the peer's node id, once
    // the challenge proof has bound the peer to it.
    let local_session_key = node_identity.session_public_key().to_bytes();
    send_message(
        framed,
        HandshakeMessage::SessionKey {
            public_key: local_session_key,
        },
        step_timeout,
    )
    .await?;
    let peer_session_bytes = match recv_message(framed, step_timeout).await? {
        HandshakeMessage::SessionKey { public_key } => public_key,
        _ => return Err(HandshakeError::MalformedMessage),
    };
    let peer_session_key = OverlayPublicKey::from_bytes(&peer_session_bytes)
        .map_err(|_| HandshakeError::AuthenticationFailed)?;
    *state = state.advance(HandshakeEvent::SessionKeyReceived);

    // Challenge-response. Each side proves possession of the namespace credential by
    // signing the other's fresh nonce, with its own session key bound in.
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    send_message(framed, HandshakeMessage::Challenge { nonce }, step_timeout).await?;
    let peer_nonce = match recv_message(framed, step_timeout).await? {
        HandshakeMessage::Challenge { nonce } => nonce,
        _ => return Err(HandshakeError::MalformedMessage),
    };

    let signature =
        node_identity.sign_proof(&proof_message(node_identity.app_id(), &local_session_key, &peer_nonce));
    send_message(
        framed,
        HandshakeMessage::Proof {
            signature: signature.to_bytes(),
        },
        step_timeout,
    )
    .await?;
    let peer_signature = match recv_message(framed, step_timeout).await? {
        HandshakeMessage::Proof { signature } => OverlaySignature::from_bytes(&signature),
        _ => return Err(HandshakeError::MalformedMessage),
    };

    let expected = proof_message(node_identity.app_id(), &peer_session_bytes, &nonce);
    if !node_identity.verify_proof(&expected, &peer_signature) {
        *state = state.advance(HandshakeEvent::ProofRejected);
        debug!(
            target: LOG_TARGET,
            "{} handshake rejected: challenge-response authentication failed", direction
        );
        return Err(HandshakeError::AuthenticationFailed);
    }
    *state = state.advance(HandshakeEvent::ProofVerified);

    Ok(NodeId::from_public_key(&peer_session_key))
}

async fn send_message<TSocket>(
    framed: &mut FramedSocket<TSocket>,
    message: HandshakeMessage,
    step_timeout: Duration,
) -> Result<(), HandshakeError>
where
    TSocket: AsyncRead + AsyncWrite + Unpin,
{
    time::timeout(step_timeout, framed.send(message.encode()))
        .await
        .map_err(|_| HandshakeError::TimedOut)?
        .map_err(HandshakeError::Io)
}

async fn recv_message<TSocket>(
    framed: &mut FramedSocket<TSocket>,
    step_timeout: Duration,
) -> Result<HandshakeMessage, HandshakeError>
where
    TSocket: AsyncRead + AsyncWrite + Unpin,
{
    let frame = time::timeout(step_timeout, framed.next())
        .await
        .map_err(|_| HandshakeError::TimedOut)?
        .ok_or(HandshakeError::PeerClosed)?
        .map_err(HandshakeError::Io)?;
    HandshakeMessage::decode(frame.freeze())
}
