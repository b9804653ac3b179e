//! Monitoring table kept by the sink.
//!
//! One row per node heard on the network. Writes from the external client do
//! not touch the row directly: they register an outstanding command keyed by
//! track number, queue a management PDU for the MAC to carry downstream, and
//! the row is only updated once the in-band response comes back up.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::{OPT_GET, OPT_SET};

/// Row status, as exposed through the `mgmtInfo` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MgmtInfo {
    /// Node heard, no command in flight.
    Alive = 0,
    /// A command was sent and its response is pending.
    RequestSent = 1,
    /// The last command completed and the row was updated.
    ItemUpdated = 2,
    /// The last command failed; the error code is stored in the row.
    Error = 3,
    /// The neighbor entry expired; the row is kept but reads return `None`.
    Deactivated = 4,
}

/// Table columns addressable by the external client.
///
/// The first four are backed by the per-node MIB and carry an object id on
/// the wire; the rest are bookkeeping maintained by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    NodeAddr,
    MaxAttempts,
    BroadcastInterval,
    MgmtMode,
    LastUpdated,
    LastUpdatedTime,
    MgmtInfo,
}

impl Column {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nodeAddr" => Some(Self::NodeAddr),
            "maxAttempts" => Some(Self::MaxAttempts),
            "broadcastInterval" => Some(Self::BroadcastInterval),
            "mgmtMode" => Some(Self::MgmtMode),
            "lastUpdated" => Some(Self::LastUpdated),
            "lastUpdatedTime" => Some(Self::LastUpdatedTime),
            "mgmtInfo" => Some(Self::MgmtInfo),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NodeAddr => "nodeAddr",
            Self::MaxAttempts => "maxAttempts",
            Self::BroadcastInterval => "broadcastInterval",
            Self::MgmtMode => "mgmtMode",
            Self::LastUpdated => "lastUpdated",
            Self::LastUpdatedTime => "lastUpdatedTime",
            Self::MgmtInfo => "mgmtInfo",
        }
    }

    /// Object id carried on the wire, for the MIB-backed columns.
    pub fn oid(self) -> Option<u8> {
        match self {
            Self::NodeAddr => Some(1),
            Self::MaxAttempts => Some(2),
            Self::BroadcastInterval => Some(3),
            Self::MgmtMode => Some(4),
            _ => None,
        }
    }
}

/// 7-byte UTC stamp: year (big-endian u16), month, day, hour, minute, second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcStamp(pub [u8; 7]);

impl UtcStamp {
    pub fn now() -> Self {
        let t = time::OffsetDateTime::now_utc();
        Self::from_parts(
            t.year().clamp(0, u16::MAX as i32) as u16,
            u8::from(t.month()),
            t.day(),
            t.hour(),
            t.minute(),
            t.second(),
        )
    }

    pub fn from_parts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let y = year.to_be_bytes();
        Self([y[0], y[1], month, day, hour, minute, second])
    }
}

impl fmt::Display for UtcStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        let year = u16::from_be_bytes([b[0], b[1]]);
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            year, b[2], b[3], b[4], b[5], b[6]
        )
    }
}

/// One monitoring row.
#[derive(Debug, Clone)]
pub struct Row {
    pub node_addr: u8,
    pub max_attempts: u8,
    pub broadcast_interval: u8,
    pub mgmt_mode: u8,
    pub last_updated: Column,
    pub last_updated_time: UtcStamp,
    pub mgmt_info: MgmtInfo,
}

impl Row {
    /// Fresh row for a newly heard node, defaulted from the sink's MIB values.
    pub fn with_defaults(node_addr: u8, max_attempts: u8, broadcast_interval: u8, mgmt_mode: u8) -> Self {
        Self {
            node_addr,
            max_attempts,
            broadcast_interval,
            mgmt_mode,
            last_updated: Column::NodeAddr,
            last_updated_time: UtcStamp::now(),
            mgmt_info: MgmtInfo::Alive,
        }
    }

    fn render(&self, column: Column) -> String {
        match column {
            Column::NodeAddr => self.node_addr.to_string(),
            Column::MaxAttempts => self.max_attempts.to_string(),
            Column::BroadcastInterval => self.broadcast_interval.to_string(),
            Column::MgmtMode => self.mgmt_mode.to_string(),
            Column::LastUpdated => self.last_updated.name().to_string(),
            Column::LastUpdatedTime => self.last_updated_time.to_string(),
            Column::MgmtInfo => (self.mgmt_info as u8).to_string(),
        }
    }

    fn store(&mut self, column: Column, value: u8) {
        match column {
            Column::NodeAddr => self.node_addr = value,
            Column::MaxAttempts => self.max_attempts = value,
            Column::BroadcastInterval => self.broadcast_interval = value,
            Column::MgmtMode => self.mgmt_mode = value,
            // bookkeeping columns are not writable through the MIB
            Column::LastUpdated | Column::LastUpdatedTime | Column::MgmtInfo => {}
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TableError {
    #[error("row index {0} out of range")]
    RowIndex(usize),

    #[error("column {0:?} is not managed in-band")]
    NotManageable(Column),

    #[error("node {0} is deactivated")]
    Deactivated(u8),
}

/// Management PDU queued for the MAC: `[value, dest, opt, oid]`, plus the
/// track number the registry entry was filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPdu {
    pub track: u8,
    pub value: u8,
    pub dest: u8,
    pub opt: u8,
    pub oid: u8,
}

/// Outstanding command awaiting its in-band response.
#[derive(Debug, Clone, Copy)]
struct Pending {
    dest: u8,
    row: usize,
    column: Column,
    value: u8,
}

/// The sink's per-node row store and outstanding-command registry.
pub struct MonitorTable {
    rows: Vec<Row>,
    registry: BTreeMap<u8, Pending>,
    commands: VecDeque<CommandPdu>,
    track_index: u8,
}

impl MonitorTable {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            registry: BTreeMap::new(),
            commands: VecDeque::new(),
            track_index: 0,
        }
    }

    pub fn size(&self) -> u32 {
        self.rows.len() as u32
    }

    fn index_of(&self, addr: u8) -> Option<usize> {
        self.rows.iter().position(|r| r.node_addr == addr)
    }

    /// Register a node. Reactivates the row if the node was heard again after
    /// its neighbor entry expired; at most one row per address either way.
    pub fn add_row(&mut self, row: Row) {
        match self.index_of(row.node_addr) {
            None => {
                log::info!("mgmt: node {} added to monitoring table", row.node_addr);
                self.rows.push(row);
            }
            Some(idx) if self.rows[idx].mgmt_info == MgmtInfo::Deactivated => {
                log::info!("mgmt: node {} reactivated", row.node_addr);
                self.rows[idx].mgmt_info = MgmtInfo::Alive;
            }
            Some(_) => {
                log::debug!("mgmt: node {} already active", row.node_addr);
            }
        }
    }

    /// Mark a node's row deactivated after its neighbor entry expired.
    /// Commands still in flight toward it can no longer be answered, so their
    /// registry entries are discarded as well.
    pub fn deactivate(&mut self, addr: u8) {
        let Some(idx) = self.index_of(addr) else {
            log::warn!("mgmt: cannot deactivate unknown node {addr}");
            return;
        };
        if self.rows[idx].mgmt_info == MgmtInfo::Deactivated {
            log::debug!("mgmt: node {addr} already deactivated");
            return;
        }
        self.rows[idx].mgmt_info = MgmtInfo::Deactivated;
        log::info!("mgmt: node {addr} deactivated");
        self.registry.retain(|track, pending| {
            if pending.dest == addr {
                log::warn!("mgmt: dropping outstanding command track {track} for deactivated node {addr}");
                false
            } else {
                true
            }
        });
    }

    /// String rendering of one cell, or the literal `"None"` when the row is
    /// deactivated.
    pub fn get(&self, idx: usize, column: Column) -> Result<String, TableError> {
        let row = self.rows.get(idx).ok_or(TableError::RowIndex(idx))?;
        if row.mgmt_info == MgmtInfo::Deactivated {
            return Ok("None".to_string());
        }
        Ok(row.render(column))
    }

    /// Queue an in-band SET toward the row's node and file the outstanding
    /// command under a fresh track number.
    pub fn set(&mut self, idx: usize, column: Column, value: u32) -> Result<(), TableError> {
        self.issue(idx, column, OPT_SET, value as u8)
    }

    /// Queue an in-band GET; the response value lands in the row through the
    /// `flag = 0` reconciliation arm.
    pub fn issue_get(&mut self, idx: usize, column: Column) -> Result<(), TableError> {
        self.issue(idx, column, OPT_GET, 0)
    }

    fn issue(&mut self, idx: usize, column: Column, opt: u8, value: u8) -> Result<(), TableError> {
        let row = self.rows.get_mut(idx).ok_or(TableError::RowIndex(idx))?;
        let oid = column.oid().ok_or(TableError::NotManageable(column))?;
        if row.mgmt_info == MgmtInfo::Deactivated {
            return Err(TableError::Deactivated(row.node_addr));
        }
        row.mgmt_info = MgmtInfo::RequestSent;
        let dest = row.node_addr;
        let track = self.track_index;
        self.registry.insert(track, Pending { dest, row: idx, column, value });
        self.commands.push_back(CommandPdu { track, value, dest, opt, oid });
        self.track_index = self.track_index.wrapping_add(1);
        Ok(())
    }

    /// Next queued management PDU, if any. Drained by the control tick.
    pub fn next_command(&mut self) -> Option<CommandPdu> {
        self.commands.pop_front()
    }

    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }

    /// Reconcile an in-band response `(flag, src, track, value)` against the
    /// outstanding-command registry.
    pub fn process(&mut self, flag: u8, src: u8, track: u8, value: u8) {
        let Some(pending) = self.registry.get(&track).copied() else {
            log::warn!("mgmt: response track {track} not in registry, discarding");
            return;
        };
        if pending.dest != src {
            log::warn!(
                "mgmt: response track {track} came from {src} but was sent to {}, discarding",
                pending.dest
            );
            return;
        }
        let row = &mut self.rows[pending.row];
        match (flag, value) {
            (1, 0) => {
                row.store(pending.column, pending.value);
                row.mgmt_info = MgmtInfo::ItemUpdated;
            }
            (1, code) => {
                row.store(pending.column, code);
                row.mgmt_info = MgmtInfo::Error;
            }
            (0, value) => {
                row.store(pending.column, value);
                row.mgmt_info = MgmtInfo::ItemUpdated;
            }
            (other, _) => {
                // flag comes straight off the wire
                log::warn!("mgmt: unexpected response flag {other}, discarding");
                return;
            }
        }
        row.last_updated = pending.column;
        row.last_updated_time = UtcStamp::now();
        self.registry.remove(&track);
    }

    pub fn outstanding(&self) -> usize {
        self.registry.len()
    }

    #[cfg(test)]
    fn row(&self, idx: usize) -> &Row {
        &self.rows[idx]
    }
}

impl Default for MonitorTable {
    fn default() -> Self {
        Self::new()
    }
}
