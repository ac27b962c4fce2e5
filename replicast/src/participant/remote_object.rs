use crate::time::WireInstant;

/// What the engine believes about a replica on a remote peer: the peer has
/// constructed it, whether it is currently in scope there, and when state was
/// last serialized to it.
///
/// An entry exists only between the emission (or receipt) of a construction
/// and the emission (or receipt) of a destruction.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RemoteObject {
    pub in_scope: bool,
    pub last_send: WireInstant,
}
