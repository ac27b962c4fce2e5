//! Test-only helpers shared by unit tests across modules

use std::{cell::RefCell, net::SocketAddr, rc::Rc};

use replicast_serde::{BitReader, BitWriter};

use crate::{
    replica::replica::{DeserializeResult, HookResult, Replica, ReplicaRef},
    time::WireInstant,
    types::NetworkId,
};

/// A replica whose hooks all do nothing
pub struct InertReplica {
    pub network_id: Option<NetworkId>,
}

impl Replica for InertReplica {
    fn network_id(&self) -> Option<NetworkId> {
        self.network_id
    }

    fn send_construction(
        &mut self,
        _now: WireInstant,
        _dest: &SocketAddr,
        _out: &mut BitWriter,
        _include_timestamp: &mut bool,
    ) -> HookResult {
        HookResult::Continue
    }

    fn send_destruction(&mut self, _dest: &SocketAddr, _out: &mut BitWriter) -> HookResult {
        HookResult::Continue
    }

    fn receive_destruction(&mut self, _sender: &SocketAddr, _payload: &mut BitReader) -> HookResult {
        HookResult::Continue
    }

    fn send_scope_change(
        &mut self,
        _in_scope: bool,
        _now: WireInstant,
        _dest: &SocketAddr,
        _out: &mut BitWriter,
    ) -> HookResult {
        HookResult::Continue
    }

    fn receive_scope_change(
        &mut self,
        _in_scope: bool,
        _sender: &SocketAddr,
        _payload: &mut BitReader,
    ) -> HookResult {
        HookResult::Continue
    }

    fn send_serialize(
        &mut self,
        _now: WireInstant,
        _last_send: WireInstant,
        _dest: &SocketAddr,
        _out: &mut BitWriter,
        _include_timestamp: &mut bool,
    ) -> HookResult {
        HookResult::Continue
    }

    fn receive_serialize(
        &mut self,
        _sender: &SocketAddr,
        _timestamp: Option<WireInstant>,
        _last_applied: WireInstant,
        _payload: &mut BitReader,
    ) -> DeserializeResult {
        DeserializeResult::Skipped
    }
}

pub fn inert_replica() -> ReplicaRef {
    Rc::new(RefCell::new(InertReplica { network_id: None }))
}
