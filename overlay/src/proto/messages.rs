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

//! Wire format of handshake messages.
//!
//! Each message travels as one length-delimited frame: a single tag byte followed by
//! the payload. Payload sizes are fixed per tag except for the namespace, which
//! carries the application id verbatim.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    proto::HandshakeError,
    types::{OVERLAY_PUBLIC_KEY_SIZE, OVERLAY_SIGNATURE_SIZE},
};

/// Byte size of a challenge nonce.
pub const NONCE_SIZE: usize = 32;

const TAG_NAMESPACE: u8 = 0x01;
const TAG_SESSION_KEY: u8 = 0x02;
const TAG_CHALLENGE: u8 = 0x03;
const TAG_PROOF: u8 = 0x04;

/// Domain separation prefix for challenge proofs.
const PROOF_CONTEXT: &[u8] = b"murmur.overlay.proof.v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessage {
    /// The sender's application namespace, exchanged before any key material.
    Namespace { app_id: Bytes },
    /// The sender's ephemeral session public key.
    SessionKey {
        public_key: [u8; OVERLAY_PUBLIC_KEY_SIZE],
    },
    /// A fresh random nonce the peer must incorporate into its proof.
    Challenge { nonce: [u8; NONCE_SIZE] },
    /// Namespace-key signature over the proof message for the received challenge.
    Proof {
        signature: [u8; OVERLAY_SIGNATURE_SIZE],
    },
}

impl HandshakeMessage {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + OVERLAY_SIGNATURE_SIZE);
        match self {
            HandshakeMessage::Namespace { app_id } => {
                buf.put_u8(TAG_NAMESPACE);
                buf.put_slice(app_id);
            },
            HandshakeMessage::SessionKey { public_key } => {
                buf.put_u8(TAG_SESSION_KEY);
                buf.put_slice(public_key);
            },
            HandshakeMessage::Challenge { nonce } => {
                buf.put_u8(TAG_CHALLENGE);
                buf.put_slice(nonce);
            },
            HandshakeMessage::Proof { signature } => {
                buf.put_u8(TAG_PROOF);
                buf.put_slice(signature);
            },
        }
        buf.freeze()
    }

    pub fn decode(mut frame: Bytes) -> Result<Self, HandshakeError> {
        if frame.is_empty() {
            return Err(HandshakeError::MalformedMessage);
        }
        match frame.get_u8() {
            TAG_NAMESPACE => Ok(HandshakeMessage::Namespace { app_id: frame }),
            TAG_SESSION_KEY => Ok(HandshakeMessage::SessionKey {
                public_key: take_exact(frame)?,
            }),
            TAG_CHALLENGE => Ok(HandshakeMessage::Challenge {
                nonce: take_exact(frame)?,
            }),
            TAG_PROOF => Ok(HandshakeMessage::Proof {
                signature: take_exact(frame)?,
            }),
            _ => Err(HandshakeError::MalformedMessage),
        }
    }
}

fn take_exact<const N: usize>(mut frame: Bytes) -> Result<[u8; N], HandshakeError> {
    if frame.remaining() != N {
        return Err(HandshakeError::MalformedMessage);
    }
    let mut out = [0u8; N];
    frame.copy_to_slice(&mut out);
    Ok(out)
}

/// Builds the byte string a proof signature covers. Binding in the responder's
/// session key prevents a valid proof from being replayed behind another identity;
/// the length prefix keeps namespace and key bytes from ambiguous concatenation.
pub fn proof_message(
    app_id: &str,
    session_key: &[u8; OVERLAY_PUBLIC_KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
) -> Vec<u8> {
    let mut message =
        Vec::with_capacity(PROOF_CONTEXT.len() + 4 + app_id.len() + session_key.len() + nonce.len());
    message.extend_from_slice(PROOF_CONTEXT);
    message.extend_from_slice(&(app_id.len() as u32).to_be_bytes());
    message.extend_from_slice(app_id.as_bytes());
    message.extend_from_slice(session_key);
    message.extend_from_slice(nonce);
    message
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip_all_messages() {
        let messages = [
            HandshakeMessage::Namespace {
                app_id: Bytes::from_static(b"overlay.test"),
            },
            HandshakeMessage::SessionKey {
                public_key: [7u8; OVERLAY_PUBLIC_KEY_SIZE],
            },
            HandshakeMessage::Challenge {
                nonce: [9u8; NONCE_SIZE],
            },
            HandshakeMessage::Proof {
                signature: [3u8; OVERLAY_SIGNATURE_SIZE],
            },
        ];
        for message in messages {
            let decoded = HandshakeMessage::decode(message.encode()).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn empty_frame_is_malformed() {
        let err = HandshakeMessage::decode(Bytes::new()).unwrap_err();
        assert!(matches!(err, HandshakeError::MalformedMessage));
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let err = HandshakeMessage::decode(Bytes::from_static(&[0x7f, 1, 2, 3])).unwrap_err();
        assert!(matches!(err, HandshakeError::MalformedMessage));
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let mut frame = HandshakeMessage::SessionKey {
            public_key: [7u8; OVERLAY_PUBLIC_KEY_SIZE],
        }
        .encode()
        .to_vec();
        frame.pop();
        let err = HandshakeMessage::decode(Bytes::from(frame)).unwrap_err();
        assert!(matches!(err, HandshakeError::MalformedMessage));
    }

    #[test]
    fn oversized_payload_is_malformed() {
        let mut frame = HandshakeMessage::Challenge {
            nonce: [9u8; NONCE_SIZE],
        }
        .encode()
        .to_vec();
        frame.push(0);
        let err = HandshakeMessage::decode(Bytes::from(frame)).unwrap_err();
        assert!(matches!(err, HandshakeError::MalformedMessage));
    }

    #[test]
    fn empty_namespace_is_allowed() {
        let decoded = HandshakeMessage::decode(Bytes::from_static(&[0x01])).unwrap();
        assert_eq!(decoded, HandshakeMessage::Namespace {
            app_id: Bytes::new()
        });
    }

    #[test]
    fn proof_message_is_unambiguous() {
        let key = [1u8; OVERLAY_PUBLIC_KEY_SIZE];
        let nonce = [2u8; NONCE_SIZE];
        // Shifting a byte between the namespace and the key must change the message.
        assert_ne!(proof_message("ab", &key, &nonce), proof_message("a", &key, &nonce));
        assert_ne!(proof_message("ab", &key, &nonce), proof_message("ab", &[3u8; OVERLAY_PUBLIC_KEY_SIZE], &nonce));
    }
}
