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

use std::fmt;

use ed25519_dalek::Signer;
use rand::rngs::OsRng;

use crate::{
    identity::NodeId,
    types::{OverlayPublicKey, OverlaySecretKey, OverlaySignature},
};

/// The key material and derived identity of a local node.
///
/// Two kinds of keys live here. The namespace key is the pre-shared credential every
/// member of an application namespace holds; proving possession of it is what admits
/// a peer. The session key is generated fresh per node instance and is what makes
/// each node individually addressable: the [`NodeId`] is derived from its public
/// half, so members sharing one namespace credential still occupy distinct ring
/// positions.
pub struct NodeIdentity {
    app_id: String,
    namespace_secret: OverlaySecretKey,
    namespace_public: OverlayPublicKey,
    session_secret: OverlaySecretKey,
    session_public: OverlayPublicKey,
    node_id: NodeId,
}

impl NodeIdentity {
    /// Creates a new identity within the given application namespace, generating a
    /// fresh session keypair.
    pub fn new(app_id: impl Into<String>, namespace_secret: OverlaySecretKey) -> Self {
        let namespace_public = namespace_secret.verifying_key();
        let session_secret = OverlaySecretKey::generate(&mut OsRng);
        let session_public = session_secret.verifying_key();
        let node_id = NodeId::from_public_key(&session_public);
        Self {
            app_id: app_id.into(),
            namespace_secret,
            namespace_public,
            session_secret,
            session_public,
            node_id,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn namespace_public_key(&self) -> &OverlayPublicKey {
        &self.namespace_public
    }

    pub fn session_public_key(&self) -> &OverlayPublicKey {
        &self.session_public
    }

    /// The private half of the session keypair, for layers that secure per-peer
    /// channels on top of the authenticated stream.
    pub fn session_secret_key(&self) -> &OverlaySecretKey {
        &self.session_secret
    }

    /// Signs a challenge proof with the pre-shared namespace key.
    pub(crate) fn sign_proof(&self, message: &[u8]) -> OverlaySignature {
        self.namespace_secret.sign(message)
    }

    /// Verifies a peer's challenge proof against the local namespace credential.
    /// Peers holding a different credential fail this check.
    pub(crate) fn verify_proof(&self, message: &[u8], signature: &OverlaySignature) -> bool {
        self.namespace_public.verify_strict(message, signature).is_ok()
    }
}

impl fmt::Debug for NodeIdentity {
    // Secret key material is deliberately not rendered.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("app_id", &self.app_id)
            .field("node_id", &self.node_id.to_string())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn namespace_key() -> OverlaySecretKey {
        OverlaySecretKey::generate(&mut OsRng)
    }

    #[test]
    fn shared_credential_distinct_identities() {
        let key = namespace_key();
        let a = NodeIdentity::new("overlay.test", key.clone());
        let b = NodeIdentity::new("overlay.test", key);
        assert_ne!(a.node_id(), b.node_id());
        assert_eq!(a.namespace_public_key(), b.namespace_public_key());
    }

    #[test]
    fn node_id_derives_from_session_key() {
        let identity = NodeIdentity::new("overlay.test", namespace_key());
        assert_eq!(
            identity.node_id(),
            &NodeId::from_public_key(identity.session_public_key())
        );
    }

    #[test]
    fn proofs_verify_across_the_namespace() {
        let key = namespace_key();
        let a = NodeIdentity::new("overlay.test", key.clone());
        let b = NodeIdentity::new("overlay.test", key);
        let signature = a.sign_proof(b"challenge");
        assert!(b.verify_proof(b"challenge", &signature));
        assert!(!b.verify_proof(b"tampered", &signature));
    }

    #[test]
    fn foreign_credential_proofs_fail() {
        let member = NodeIdentity::new("overlay.test", namespace_key());
        let outsider = NodeIdentity::new("overlay.test", namespace_key());
        let signature = outsider.sign_proof(b"challenge");
        assert!(!member.verify_proof(b"challenge", &signature));
    }

    #[test]
    fn debug_hides_key_material() {
        let identity = NodeIdentity::new("overlay.test", namespace_key());
        let rendered = format!("{:?}", identity);
        assert!(rendered.contains("overlay.test"));
        assert!(!rendered.contains("secret"));
    }
}
