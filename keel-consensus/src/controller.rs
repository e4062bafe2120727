use keel_signature::KeyPair;

/// The slice of a consensus engine the ledger needs: which epoch the node is
/// in, and the key it signs protocol transactions with.
pub trait ConsensusEngine: Send + Sync {
    /// Current consensus epoch
    fn epoch(&self) -> u64;

    /// Keypair used to sign proposer-injected transactions
    fn keypair(&self) -> KeyPair;
}
