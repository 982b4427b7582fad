/// Errors a [`crate::Transport`] implementation can report.
///
/// Invariant: any transport error is fatal from the core's point of view.
/// There is no recovery discipline for a failed fetch or CAS, since there
/// is no way to know which buckets were modified. A
/// production transport over real remote-memory hardware is expected to
/// surface link flaps or remote-node faults through these variants rather
/// than panicking, so the failure can reach a process supervisor instead of
/// being decided locally.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("fetch of {n_buckets} buckets from remote address {src_addr} failed: {reason}")]
    Fetch { src_addr: u64, n_buckets: usize, reason: String },

    #[error("cas on remote address {addr} failed: {reason}")]
    Cas { addr: u64, reason: String },

    #[error("wait on fetch handle failed: {reason}")]
    Wait { reason: String },
}
