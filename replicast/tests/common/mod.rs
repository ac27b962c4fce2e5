#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, net::SocketAddr, rc::Rc};

use replicast::{
    BitReader, BitWrite, BitWriter, ConstructionOutcome, DeserializeResult, HookResult, NetworkId,
    PacketSender, Replica, ReplicaRef, ReplicationEvents, Serde, SendMode, WireInstant,
};

pub fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{}", port).parse().unwrap()
}

pub fn at(millis: u32) -> WireInstant {
    WireInstant::from_millis(millis)
}

// TestReplica

/// How a send hook should behave when the engine calls it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendBehavior {
    /// Write a payload and continue
    Write,
    /// Write nothing and continue
    WriteNothing,
    /// Return `HookResult::Cancel`
    Cancel,
    /// Return `HookResult::StopProcessing`
    Stop,
}

/// A scriptable replica that journals every receive hook invocation
pub struct TestReplica {
    pub network_id: Option<NetworkId>,
    pub state: u32,
    pub on_construction: SendBehavior,
    pub on_scope_change: SendBehavior,
    pub on_serialize: SendBehavior,
    pub on_destruction: SendBehavior,
    pub journal: Vec<String>,
}

impl TestReplica {
    pub fn new(network_id: Option<u32>) -> Self {
        Self {
            network_id: network_id.map(NetworkId::new),
            state: 0,
            on_construction: SendBehavior::Write,
            on_scope_change: SendBehavior::Write,
            on_serialize: SendBehavior::Write,
            on_destruction: SendBehavior::Write,
            journal: Vec::new(),
        }
    }
}

impl Replica for TestReplica {
    fn network_id(&self) -> Option<NetworkId> {
        self.network_id
    }

    fn send_construction(
        &mut self,
        _now: WireInstant,
        _dest: &SocketAddr,
        out: &mut BitWriter,
        _include_timestamp: &mut bool,
    ) -> HookResult {
        match self.on_construction {
            SendBehavior::Write => {
                self.state.ser(out);
                HookResult::Continue
            }
            SendBehavior::WriteNothing => HookResult::Continue,
            SendBehavior::Cancel => HookResult::Cancel,
            SendBehavior::Stop => HookResult::StopProcessing,
        }
    }

    fn send_destruction(&mut self, _dest: &SocketAddr, out: &mut BitWriter) -> HookResult {
        match self.on_destruction {
            SendBehavior::Write => {
                out.write_byte(0xDD);
                HookResult::Continue
            }
            SendBehavior::WriteNothing => HookResult::Continue,
            SendBehavior::Cancel => HookResult::Cancel,
            SendBehavior::Stop => HookResult::StopProcessing,
        }
    }

    fn receive_destruction(&mut self, sender: &SocketAddr, _payload: &mut BitReader) -> HookResult {
        self.journal.push(format!("destruction from {}", sender));
        HookResult::Continue
    }

    fn send_scope_change(
        &mut self,
        _in_scope: bool,
        _now: WireInstant,
        _dest: &SocketAddr,
        out: &mut BitWriter,
    ) -> HookResult {
        match self.on_scope_change {
            SendBehavior::Write => {
                out.write_byte(0x5C);
                HookResult::Continue
            }
            SendBehavior::WriteNothing => HookResult::Continue,
            SendBehavior::Cancel => HookResult::Cancel,
            SendBehavior::Stop => HookResult::StopProcessing,
        }
    }

    fn receive_scope_change(
        &mut self,
        in_scope: bool,
        _sender: &SocketAddr,
        _payload: &mut BitReader,
    ) -> HookResult {
        self.journal.push(format!("scope {}", in_scope));
        HookResult::Continue
    }

    fn send_serialize(
        &mut self,
        _now: WireInstant,
        _last_send: WireInstant,
        _dest: &SocketAddr,
        out: &mut BitWriter,
        _include_timestamp: &mut bool,
    ) -> HookResult {
        match self.on_serialize {
            SendBehavior::Write => {
                self.state.ser(out);
                HookResult::Continue
            }
            SendBehavior::WriteNothing => HookResult::Continue,
            SendBehavior::Cancel => HookResult::Cancel,
            SendBehavior::Stop => HookResult::StopProcessing,
        }
    }

    fn receive_serialize(
        &mut self,
        _sender: &SocketAddr,
        _timestamp: Option<WireInstant>,
        _last_applied: WireInstant,
        payload: &mut BitReader,
    ) -> DeserializeResult {
        match u32::de(payload) {
            Ok(state) => {
                self.state = state;
                self.journal.push(format!("serialize {}", state));
                DeserializeResult::Applied
            }
            Err(_) => DeserializeResult::Skipped,
        }
    }
}

/// A test replica plus the type-erased handle the engine works with
pub struct TestObject {
    pub concrete: Rc<RefCell<TestReplica>>,
    pub handle: ReplicaRef,
}

pub fn test_replica(network_id: Option<u32>) -> TestObject {
    let concrete = Rc::new(RefCell::new(TestReplica::new(network_id)));
    let handle: ReplicaRef = concrete.clone();
    TestObject { concrete, handle }
}

// TestEvents

/// How the construction-resolution callback should behave
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveBehavior {
    Create,
    Defer,
    Cancel,
    Fatal,
}

/// Application-side callbacks: a network-identifier registry plus a journal
/// of what the engine asked for
pub struct TestEvents {
    pub objects: HashMap<u32, ReplicaRef>,
    pub behavior: ResolveBehavior,
    pub created: Vec<Rc<RefCell<TestReplica>>>,
    pub resolutions: Vec<u32>,
    pub download_completes: Vec<SocketAddr>,
}

impl TestEvents {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            behavior: ResolveBehavior::Create,
            created: Vec::new(),
            resolutions: Vec::new(),
            download_completes: Vec::new(),
        }
    }

    pub fn insert(&mut self, network_id: u32, object: &TestObject) {
        self.objects.insert(network_id, object.handle.clone());
    }
}

impl ReplicationEvents for TestEvents {
    fn resolve_network_id(&self, network_id: &NetworkId) -> Option<ReplicaRef> {
        self.objects.get(&network_id.value()).cloned()
    }

    fn resolve_construction(
        &mut self,
        sender: &SocketAddr,
        network_id: NetworkId,
        _timestamp: Option<WireInstant>,
        payload: &mut BitReader,
    ) -> ConstructionOutcome {
        self.resolutions.push(network_id.value());
        match self.behavior {
            ResolveBehavior::Defer => ConstructionOutcome::Defer,
            ResolveBehavior::Cancel => ConstructionOutcome::Cancel,
            ResolveBehavior::Fatal => ConstructionOutcome::Fatal,
            ResolveBehavior::Create => {
                let state = u32::de(payload).unwrap_or(0);
                let concrete = Rc::new(RefCell::new(TestReplica::new(Some(network_id.value()))));
                concrete.borrow_mut().state = state;
                concrete
                    .borrow_mut()
                    .journal
                    .push(format!("construction from {}", sender));
                let handle: ReplicaRef = concrete.clone();
                self.objects.insert(network_id.value(), handle.clone());
                self.created.push(concrete);
                ConstructionOutcome::Created(handle)
            }
        }
    }

    fn receive_download_complete(&mut self, sender: &SocketAddr, _payload: &mut BitReader) {
        self.download_completes.push(*sender);
    }
}

// MemorySender

#[derive(Clone, Debug)]
pub struct SentPacket {
    pub address: SocketAddr,
    pub channel: u8,
    pub mode: SendMode,
    pub bytes: Vec<u8>,
}

/// Collects outgoing packets for inspection or forwarding
pub struct MemorySender {
    pub sent: Vec<SentPacket>,
}

impl MemorySender {
    pub fn new() -> Self {
        Self { sent: Vec::new() }
    }

    pub fn take(&mut self) -> Vec<SentPacket> {
        std::mem::take(&mut self.sent)
    }

    pub fn messages(&self) -> Vec<WireMessage> {
        self.sent
            .iter()
            .map(|packet| decode_message(&packet.bytes))
            .collect()
    }
}

impl PacketSender for MemorySender {
    fn send(&mut self, address: &SocketAddr, channel: u8, mode: SendMode, payload: &[u8]) {
        self.sent.push(SentPacket {
            address: *address,
            channel,
            mode,
            bytes: payload.to_vec(),
        });
    }
}

// Wire inspection

/// Decoded header of a captured packet, payload dropped
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireMessage {
    Construction {
        network_id: u32,
        timestamp: Option<u32>,
    },
    Destruction {
        network_id: u32,
    },
    ScopeChange {
        network_id: u32,
        in_scope: bool,
    },
    Serialize {
        network_id: u32,
        timestamp: Option<u32>,
    },
    DownloadComplete,
}

pub fn decode_message(bytes: &[u8]) -> WireMessage {
    let mut reader = BitReader::new(bytes);
    let kind = u8::de(&mut reader).unwrap();
    match kind {
        0 => {
            let timestamp = Option::<WireInstant>::de(&mut reader).unwrap();
            let network_id = NetworkId::de(&mut reader).unwrap();
            WireMessage::Construction {
                network_id: network_id.value(),
                timestamp: timestamp.map(|instant| instant.as_millis()),
            }
        }
        1 => WireMessage::Destruction {
            network_id: NetworkId::de(&mut reader).unwrap().value(),
        },
        2 => {
            let network_id = NetworkId::de(&mut reader).unwrap();
            let in_scope = bool::de(&mut reader).unwrap();
            WireMessage::ScopeChange {
                network_id: network_id.value(),
                in_scope,
            }
        }
        3 => {
            let timestamp = Option::<WireInstant>::de(&mut reader).unwrap();
            let network_id = NetworkId::de(&mut reader).unwrap();
            WireMessage::Serialize {
                network_id: network_id.value(),
                timestamp: timestamp.map(|instant| instant.as_millis()),
            }
        }
        4 => WireMessage::DownloadComplete,
        other => panic!("unknown message kind byte {}", other),
    }
}
