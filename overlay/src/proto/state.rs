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

/// Phases of the authentication handshake, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    NamespaceExchange,
    KeyExchange,
    ChallengeResponse,
    Authenticated,
    Rejected,
}

/// Observations that move the handshake between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent {
    Initiated,
    NamespaceMatched,
    NamespaceMismatched,
    SessionKeyReceived,
    ProofVerified,
    ProofRejected,
    /// Transport failure, timeout or cancellation at any phase.
    Failed,
}

impl HandshakeState {
    /// Applies an event, yielding the next phase. Terminal phases absorb all further
    /// events, and any out-of-order event is treated as a protocol violation.
    pub fn advance(self, event: HandshakeEvent) -> HandshakeState {
        use HandshakeEvent::*;
        use HandshakeState::*;
        match (self, event) {
            (Start, Initiated) => NamespaceExchange,
            (NamespaceExchange, NamespaceMatched) => KeyExchange,
            (NamespaceExchange, NamespaceMismatched) => Rejected,
            (KeyExchange, SessionKeyReceived) => ChallengeResponse,
            (ChallengeResponse, ProofVerified) => Authenticated,
            (ChallengeResponse, ProofRejected) => Rejected,
            (Authenticated, _) => Authenticated,
            (Rejected, _) => Rejected,
            _ => Rejected,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, HandshakeState::Authenticated | HandshakeState::Rejected)
    }
}
