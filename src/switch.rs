use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;

use crate::connection::ConnectionId;
use crate::message::{
    Action, FlowMatch, FlowMod, FlowModCommand, FlowStats, Instruction, Message, PortDesc,
    PortReason, SwitchDescription, SwitchFeatures,
};
use crate::ofp_header::{OfpVersion, Xid};
use crate::ofp_message::OfpSerializationError;
use crate::ofp_serialization;

/// Datapath identifier reported by the switch in its features reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DatapathId(pub u64);

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

/// Stable flow identity: hex MD5 of the canonical JSON of the switch id, match,
/// priority and cookie.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(String);

impl FlowId {
    pub fn compute(
        switch: DatapathId,
        pattern: &FlowMatch,
        priority: u16,
        cookie: u64,
    ) -> Result<FlowId, serde_json::Error> {
        let canonical = serde_json::to_vec(&(switch.0, pattern, priority, cookie))?;
        Ok(FlowId(format!("{:x}", md5::compute(canonical))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowCounters {
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub packet_count: u64,
    pub byte_count: u64,
}

/// A flow entry reported by the switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flow {
    pub id: FlowId,
    pub switch: DatapathId,
    pub version: OfpVersion,
    pub table_id: u8,
    pub pattern: FlowMatch,
    /// Actions applied on match. For 1.3 these are the apply-actions instructions.
    pub actions: Vec<Action>,
    pub instructions: Vec<Instruction>,
    pub priority: u16,
    pub cookie: u64,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub counters: FlowCounters,
}

impl Flow {
    pub fn from_stats(
        switch: DatapathId,
        version: OfpVersion,
        stats: FlowStats,
    ) -> Result<Flow, serde_json::Error> {
        let id = FlowId::compute(switch, &stats.pattern, stats.priority, stats.cookie)?;
        let actions = stats.apply_actions();
        Ok(Flow {
            id,
            switch,
            version,
            table_id: stats.table_id,
            pattern: stats.pattern,
            actions,
            instructions: stats.instructions,
            priority: stats.priority,
            cookie: stats.cookie,
            idle_timeout: stats.idle_timeout,
            hard_timeout: stats.hard_timeout,
            counters: FlowCounters {
                duration_sec: stats.duration_sec,
                duration_nsec: stats.duration_nsec,
                packet_count: stats.packet_count,
                byte_count: stats.byte_count,
            },
        })
    }

    /// A flow mod that installs (`Add`) or removes (`Delete`) this entry. The actions travel
    /// as one apply-actions instruction, which 1.0 encodes as its plain action list.
    pub fn as_flow_mod(&self, command: FlowModCommand) -> FlowMod {
        FlowMod {
            command,
            table_id: self.table_id,
            pattern: self.pattern.clone(),
            cookie: self.cookie,
            cookie_mask: 0,
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            priority: self.priority,
            buffer_id: None,
            out_port: None,
            flags: 0,
            instructions: vec![Instruction::ApplyActions(self.actions.clone())],
        }
    }

    /// `as_flow_mod` encoded in the version the flow was reported in.
    pub fn encode_flow_mod(
        &self,
        xid: Xid,
        command: FlowModCommand,
    ) -> Result<Vec<u8>, OfpSerializationError> {
        let flow_mod = self.as_flow_mod(command);
        ofp_serialization::marshal(self.version, xid, Message::FlowMod(flow_mod))
    }
}

/// Structural change to a switch's port map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortChange {
    Created(PortDesc),
    Modified(PortDesc),
    Deleted(PortDesc),
    LinkUp(u32),
    LinkDown(u32),
}

/// The logical datapath behind a connection.
#[derive(Clone, Debug)]
pub struct Switch {
    pub datapath_id: DatapathId,
    pub version: OfpVersion,
    pub capabilities: u32,
    pub num_buffers: u32,
    pub num_tables: u8,
    pub auxiliary_id: u8,
    /// 1.0 only.
    pub actions: Option<u32>,
    pub description: Option<SwitchDescription>,
    pub ports: BTreeMap<u32, PortDesc>,
    pub flows: HashMap<FlowId, Flow>,
    pub connection: ConnectionId,
    pub connected: bool,
    pub last_seen: Instant,
}

impl Switch {
    fn new(
        features: &SwitchFeatures,
        version: OfpVersion,
        connection: ConnectionId,
        now: Instant,
    ) -> Switch {
        let mut switch = Switch {
            datapath_id: DatapathId(features.datapath_id),
            version,
            capabilities: 0,
            num_buffers: 0,
            num_tables: 0,
            auxiliary_id: 0,
            actions: None,
            description: None,
            ports: BTreeMap::new(),
            flows: HashMap::new(),
            connection,
            connected: true,
            last_seen: now,
        };
        switch.update_features(features);
        switch
    }

    /// Refresh the capability fields of a features reply. Ports are diffed separately.
    pub fn update_features(&mut self, features: &SwitchFeatures) {
        self.capabilities = features.capabilities;
        self.num_buffers = features.num_buffers;
        self.num_tables = features.num_tables;
        self.auxiliary_id = features.auxiliary_id;
        self.actions = features.actions;
    }

    fn link_change(prior: Option<&PortDesc>, current: &PortDesc, changes: &mut Vec<PortChange>) {
        let link_down = current.is_link_down();
        if prior.map_or(true, |p| p.is_link_down() != link_down) {
            changes.push(if link_down {
                PortChange::LinkDown(current.port_no)
            } else {
                PortChange::LinkUp(current.port_no)
            });
        }
    }

    fn upsert_port(&mut self, port: PortDesc, changes: &mut Vec<PortChange>) {
        let prior = self.ports.get(&port.port_no);
        if prior == Some(&port) {
            return;
        }
        Switch::link_change(prior, &port, changes);
        changes.push(if prior.is_none() {
            PortChange::Created(port.clone())
        } else {
            PortChange::Modified(port.clone())
        });
        self.ports.insert(port.port_no, port);
    }

    /// Apply an asynchronous port-status notification.
    pub fn apply_port_status(&mut self, reason: PortReason, port: PortDesc) -> Vec<PortChange> {
        let mut changes = vec![];
        match reason {
            PortReason::PortDelete => {
                if let Some(removed) = self.ports.remove(&port.port_no) {
                    changes.push(PortChange::Deleted(removed));
                }
            }
            PortReason::PortAdd | PortReason::PortModify => self.upsert_port(port, &mut changes),
        }
        changes
    }

    /// Replace the port map with `ports`, reporting what differs from the prior map.
    pub fn replace_ports(&mut self, ports: Vec<PortDesc>) -> Vec<PortChange> {
        let mut changes = vec![];
        let mut vanished: Vec<u32> = self.ports.keys().copied().collect();
        vanished.retain(|no| !ports.iter().any(|p| p.port_no == *no));
        for no in vanished {
            if let Some(removed) = self.ports.remove(&no) {
                changes.push(PortChange::Deleted(removed));
            }
        }
        for port in ports {
            self.upsert_port(port, &mut changes);
        }
        changes
    }

    /// Replace the flow map wholesale with a completed statistics reply.
    pub fn replace_flows(&mut self, entries: Vec<FlowStats>) -> usize {
        let mut flows = HashMap::with_capacity(entries.len());
        for stats in entries {
            match Flow::from_stats(self.datapath_id, self.version, stats) {
                Ok(flow) => {
                    let table_id = flow.table_id;
                    if let Some(previous) = flows.insert(flow.id.clone(), flow) {
                        warn!(
                            "{}: flow {} in table {} replaces the one in table {}",
                            self.datapath_id, previous.id, table_id, previous.table_id
                        );
                    }
                }
                Err(e) => warn!("{}: could not derive flow id: {}", self.datapath_id, e),
            }
        }
        self.flows = flows;
        self.flows.len()
    }
}

/// How `SwitchRegistry::attach` bound a connection to a switch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Attachment {
    Created,
    Reconnected,
    TakenOver { previous: ConnectionId },
}

/// Datapath id → Switch map shared by all connections.
#[derive(Clone, Default)]
pub struct SwitchRegistry {
    switches: Arc<Mutex<HashMap<DatapathId, Switch>>>,
}

impl SwitchRegistry {
    pub fn new() -> SwitchRegistry {
        SwitchRegistry::default()
    }

    fn lock(&self) -> MutexGuard<HashMap<DatapathId, Switch>> {
        self.switches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `connection` to the switch with the datapath id of `features`, creating it or
    /// reusing the existing record.
    pub fn attach(
        &self,
        features: &SwitchFeatures,
        version: OfpVersion,
        connection: ConnectionId,
        now: Instant,
    ) -> Attachment {
        let dpid = DatapathId(features.datapath_id);
        let mut switches = self.lock();
        match switches.get_mut(&dpid) {
            None => {
                switches.insert(dpid, Switch::new(features, version, connection, now));
                info!("{}: switch {} created", connection, dpid);
                Attachment::Created
            }
            Some(switch) => {
                let attachment = if switch.connected && switch.connection != connection {
                    warn!(
                        "{}: switch {} still owned by {}, taking it over",
                        connection, dpid, switch.connection
                    );
                    Attachment::TakenOver {
                        previous: switch.connection,
                    }
                } else {
                    info!("{}: switch {} reconnected", connection, dpid);
                    Attachment::Reconnected
                };
                switch.update_features(features);
                switch.version = version;
                switch.connection = connection;
                switch.connected = true;
                switch.last_seen = now;
                attachment
            }
        }
    }

    pub fn get(&self, dpid: DatapathId) -> Option<Switch> {
        self.lock().get(&dpid).cloned()
    }

    /// Run `f` on the switch under the registry lock, provided `connection` still owns it.
    pub fn update_owned<F, R>(&self, dpid: DatapathId, connection: ConnectionId, f: F) -> Option<R>
    where
        F: FnOnce(&mut Switch) -> R,
    {
        match self.lock().get_mut(&dpid) {
            Some(switch) if switch.connection == connection && switch.connected => Some(f(switch)),
            _ => None,
        }
    }

    pub fn is_owner(&self, dpid: DatapathId, connection: ConnectionId) -> bool {
        self.lock()
            .get(&dpid)
            .map_or(false, |sw| sw.connection == connection && sw.connected)
    }

    /// Flag the switch disconnected if `connection` still owns it.
    pub fn detach(&self, dpid: DatapathId, connection: ConnectionId) -> bool {
        match self.lock().get_mut(&dpid) {
            Some(switch) if switch.connection == connection && switch.connected => {
                switch.connected = false;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
