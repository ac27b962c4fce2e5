//! Two replication engines wired back to back through an in-memory loopback.
//!
//! The "host" side owns a Monster object and drives construct → scope →
//! serialize → destruct across five ticks; the "guest" side builds its copy
//! from the construction payload and applies each snapshot.

use std::{cell::RefCell, collections::HashMap, net::SocketAddr, rc::Rc};

use replicast::{
    BitReader, BitWrite, BitWriter, ConstructionOutcome, DeserializeResult, HookResult, NetworkId,
    PacketSender, Recipients, Replica, ReplicaManager, ReplicaRef, ReplicationConfig,
    ReplicationEvents, Serde, SendMode, WireInstant,
};

const MONSTER_ID: u32 = 1;

// Monster

struct Monster {
    network_id: Option<NetworkId>,
    name: String,
    x: f32,
    y: f32,
}

impl Monster {
    fn new(name: &str) -> Self {
        Self {
            network_id: Some(NetworkId::new(MONSTER_ID)),
            name: name.to_string(),
            x: 0.0,
            y: 0.0,
        }
    }

    fn write_position(&self, out: &mut BitWriter) {
        self.x.to_bits().ser(out);
        self.y.to_bits().ser(out);
    }

    fn read_position(payload: &mut BitReader) -> Option<(f32, f32)> {
        let x = u32::de(payload).ok()?;
        let y = u32::de(payload).ok()?;
        Some((f32::from_bits(x), f32::from_bits(y)))
    }
}

impl Replica for Monster {
    fn network_id(&self) -> Option<NetworkId> {
        self.network_id
    }

    fn send_construction(
        &mut self,
        _now: WireInstant,
        dest: &SocketAddr,
        out: &mut BitWriter,
        include_timestamp: &mut bool,
    ) -> HookResult {
        println!("host: constructing `{}` on {}", self.name, dest);
        *include_timestamp = true;
        self.name.ser(out);
        self.write_position(out);
        HookResult::BroadcastIdentically
    }

    fn send_destruction(&mut self, dest: &SocketAddr, out: &mut BitWriter) -> HookResult {
        println!("host: destructing `{}` on {}", self.name, dest);
        out.write_byte(0);
        HookResult::Continue
    }

    fn receive_destruction(&mut self, sender: &SocketAddr, _payload: &mut BitReader) -> HookResult {
        println!("guest: `{}` destroyed by {}", self.name, sender);
        HookResult::Continue
    }

    fn send_scope_change(
        &mut self,
        in_scope: bool,
        _now: WireInstant,
        _dest: &SocketAddr,
        out: &mut BitWriter,
    ) -> HookResult {
        in_scope.ser(out);
        HookResult::Continue
    }

    fn receive_scope_change(
        &mut self,
        in_scope: bool,
        _sender: &SocketAddr,
        _payload: &mut BitReader,
    ) -> HookResult {
        println!("guest: `{}` scope -> {}", self.name, in_scope);
        HookResult::Continue
    }

    fn send_serialize(
        &mut self,
        now: WireInstant,
        last_send: WireInstant,
        _dest: &SocketAddr,
        out: &mut BitWriter,
        _include_timestamp: &mut bool,
    ) -> HookResult {
        // hold snapshots to at most one every 50ms per participant
        if last_send != WireInstant::ZERO && now.offset_from(&last_send) < 50 {
            return HookResult::Continue;
        }
        self.write_position(out);
        HookResult::Continue
    }

    fn receive_serialize(
        &mut self,
        _sender: &SocketAddr,
        _timestamp: Option<WireInstant>,
        _last_applied: WireInstant,
        payload: &mut BitReader,
    ) -> DeserializeResult {
        match Monster::read_position(payload) {
            Some((x, y)) => {
                self.x = x;
                self.y = y;
                println!("guest: `{}` moved to ({:.1}, {:.1})", self.name, self.x, self.y);
                DeserializeResult::Applied
            }
            None => DeserializeResult::Skipped,
        }
    }
}

// Application-side callbacks

struct DemoEvents {
    side: &'static str,
    objects: HashMap<u32, ReplicaRef>,
}

impl DemoEvents {
    fn new(side: &'static str) -> Self {
        Self {
            side,
            objects: HashMap::new(),
        }
    }
}

impl ReplicationEvents for DemoEvents {
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
        let Ok(name) = String::de(payload) else {
            return ConstructionOutcome::Cancel;
        };
        println!(
            "{}: building `{}` (id {}) announced by {}",
            self.side,
            name,
            network_id.value(),
            sender
        );
        let mut monster = Monster::new(&name);
        monster.network_id = Some(network_id);
        if let Some((x, y)) = Monster::read_position(payload) {
            monster.x = x;
            monster.y = y;
        }
        let handle: ReplicaRef = Rc::new(RefCell::new(monster));
        self.objects.insert(network_id.value(), handle.clone());
        ConstructionOutcome::Created(handle)
    }

    fn receive_download_complete(&mut self, sender: &SocketAddr, _payload: &mut BitReader) {
        println!("{}: initial download from {} complete", self.side, sender);
    }
}

// Loopback transport

#[derive(Default)]
struct Loopback {
    queued: Vec<(SocketAddr, Vec<u8>)>,
}

impl PacketSender for Loopback {
    fn send(&mut self, address: &SocketAddr, _channel: u8, _mode: SendMode, payload: &[u8]) {
        self.queued.push((*address, payload.to_vec()));
    }
}

impl Loopback {
    fn deliver(&mut self, from: &SocketAddr, to: &mut ReplicaManager) {
        for (_, payload) in self.queued.drain(..) {
            to.receive_packet(from, &payload);
        }
    }
}

fn main() {
    let host_address: SocketAddr = "127.0.0.1:4000".parse().unwrap();
    let guest_address: SocketAddr = "127.0.0.1:4001".parse().unwrap();

    let mut host = ReplicaManager::new(ReplicationConfig {
        auto_participate_new_connections: true,
        ..ReplicationConfig::default()
    });
    let mut guest = ReplicaManager::new(ReplicationConfig {
        auto_participate_new_connections: true,
        ..ReplicationConfig::default()
    });

    let mut host_events = DemoEvents::new("host");
    let mut guest_events = DemoEvents::new("guest");

    let mut host_out = Loopback::default();
    let mut guest_out = Loopback::default();

    host.handle_connection(&guest_address);
    guest.handle_connection(&host_address);

    let monster = Rc::new(RefCell::new(Monster::new("gnoll")));
    let monster_handle: ReplicaRef = monster.clone();
    host_events
        .objects
        .insert(MONSTER_ID, monster_handle.clone());
    host.construct(&monster_handle, Recipients::Broadcast);
    host.set_scope(&monster_handle, true, Recipients::Broadcast);

    let mut now = WireInstant::from_millis(1_000);
    for step in 0..5u32 {
        {
            let mut monster = monster.borrow_mut();
            monster.x = step as f32 * 1.5;
            monster.y = step as f32 * 0.5;
        }
        host.signal_serialize(&monster_handle, Recipients::Broadcast);

        host.tick(now, &mut host_events, &mut host_out);
        host_out.deliver(&host_address, &mut guest);
        guest.tick(now, &mut guest_events, &mut guest_out);
        guest_out.deliver(&guest_address, &mut host);

        now = now.add_millis(100);
    }

    host.destruct(&monster_handle, Recipients::Broadcast, &mut host_out);
    host.dereference(&monster_handle);
    host_out.deliver(&host_address, &mut guest);
    guest.tick(now, &mut guest_events, &mut guest_out);

    println!("host: done");
}
