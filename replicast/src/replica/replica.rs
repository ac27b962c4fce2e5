use std::{cell::RefCell, net::SocketAddr, rc::Rc};

use replicast_serde::{BitReader, BitWriter};

use crate::{time::WireInstant, types::NetworkId};

/// Shared handle to an application object registered for replication.
///
/// The engine holds one of these per registered replica and drops it on
/// dereference; the application keeps its own and remains the owner.
pub type ReplicaRef = Rc<RefCell<dyn Replica>>;

/// Result returned by replica hooks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookResult {
    /// Proceed normally
    Continue,
    /// Drop this command, along with anything that depended on it. No wire
    /// traffic results.
    Cancel,
    /// Proceed, and the written payload is identical for every participant,
    /// so the engine may reuse it for the rest of this tick without calling
    /// the hook again
    BroadcastIdentically,
    /// Abort processing for this participant until the next tick
    StopProcessing,
}

/// Result returned by [`Replica::receive_serialize`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeserializeResult {
    /// The payload was accepted and applied to the object
    Applied,
    /// The payload was ignored
    Skipped,
}

/// The per-object capability the application supplies for each replica.
///
/// Hooks are invoked synchronously from within the engine's tick (sends) or
/// when a matching wire message is dispatched (receives). A send hook that
/// writes nothing to `out` cancels its command; see the individual methods.
/// Hooks must not re-enter the engine.
///
/// There is no `receive_construction` here: constructions arrive for objects
/// that may not exist yet, so they are routed through
/// [`ReplicationEvents::resolve_construction`](crate::ReplicationEvents::resolve_construction).
pub trait Replica {
    /// The object's current network identifier, or `None` while unassigned.
    /// Commands requiring an identifier are deferred until this returns
    /// `Some`.
    fn network_id(&self) -> Option<NetworkId>;

    /// Write the payload announcing this object to `dest`. Writing nothing
    /// cancels the construction and every queued command that depended on it.
    /// Set `include_timestamp` to stamp the message with `now`.
    fn send_construction(
        &mut self,
        now: WireInstant,
        dest: &SocketAddr,
        out: &mut BitWriter,
        include_timestamp: &mut bool,
    ) -> HookResult;

    /// Write the payload accompanying this object's destruction on `dest`.
    /// Writing nothing suppresses the wire message; the engine still forgets
    /// that `dest` has the object.
    fn send_destruction(&mut self, dest: &SocketAddr, out: &mut BitWriter) -> HookResult;

    /// A destruction for this object arrived from `sender`. The application
    /// decides whether to actually delete anything.
    fn receive_destruction(&mut self, sender: &SocketAddr, payload: &mut BitReader) -> HookResult;

    /// Write the payload accompanying a scope change toward `dest`. Writing
    /// nothing cancels the scope change.
    fn send_scope_change(
        &mut self,
        in_scope: bool,
        now: WireInstant,
        dest: &SocketAddr,
        out: &mut BitWriter,
    ) -> HookResult;

    /// A scope change for this object arrived from `sender`.
    fn receive_scope_change(
        &mut self,
        in_scope: bool,
        sender: &SocketAddr,
        payload: &mut BitReader,
    ) -> HookResult;

    /// Write this object's state toward `dest`. `last_send` is when a
    /// serialize was last emitted to `dest` (zero if never). Writing nothing
    /// skips this tick without consuming the command; it is retried next
    /// tick. Return [`HookResult::Cancel`] to drop it instead.
    fn send_serialize(
        &mut self,
        now: WireInstant,
        last_send: WireInstant,
        dest: &SocketAddr,
        out: &mut BitWriter,
        include_timestamp: &mut bool,
    ) -> HookResult;

    /// A serialize for this object arrived from `sender`. `timestamp` is the
    /// send time if the sender stamped one, `last_applied` the last time this
    /// hook returned [`DeserializeResult::Applied`].
    fn receive_serialize(
        &mut self,
        sender: &SocketAddr,
        timestamp: Option<WireInstant>,
        last_applied: WireInstant,
        payload: &mut BitReader,
    ) -> DeserializeResult;
}
