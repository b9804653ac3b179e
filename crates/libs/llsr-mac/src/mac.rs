//! The per-node MAC state machine.
//!
//! Every node runs the same machine; the sink (address 0) additionally
//! embeds the monitoring table and answers the external management client.
//! Three event sources drive it — the radio inbound handler, the
//! application inbound handler, and the periodic control tick — and the host
//! must serialize them (one lock around the whole `Mac`). Handlers take the
//! current instant from the host and never block.
//!
//! Outbound frames and sink-side deliveries are staged in queues the host
//! drains after each call; nothing is written to the radio from in here.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use llsr_mgmt::{ManagerServer, MonitorTable, Row, CODE_AUTH_FAIL, CODE_UNREACHABLE};

use crate::arq::{prev_seq, ArqState, ArqStats, ChannelState, InFlight, MgmtEntry, RespEntry};
use crate::auth;
use crate::diag::DiagSinks;
use crate::mib::{Mib, OID_BROADCAST_INTERVAL, OID_MAX_ATTEMPTS, OID_MGMT_MODE};
use crate::neighbor::{NeighborTable, RouteState};
use crate::suppress::SuppressTable;
use crate::wire::{Packet, WireError, ARQ, DATA_PROTO, MGMT_PROTO, MGMT_RESP_PROTO, NO_ARQ};
use crate::SINK_ADDR;

/// Constructor parameters. Timings are in seconds.
#[derive(Debug, Clone)]
pub struct MacConfig {
    pub addr: u8,
    /// Base retransmission timeout.
    pub base_timeout: f64,
    /// Retry budget before a packet is dropped.
    pub max_attempts: u8,
    /// Beacon period; 0 disables beacons.
    pub broadcast_interval: f64,
    /// Exponential (true) or linear backoff.
    pub exp_backoff: bool,
    /// Upper bound of the random backoff share, in [0, 1].
    pub backoff_randomness: f64,
    /// Neighbor expiry delay.
    pub node_expiry_delay: f64,
    /// Capacity of each ARQ queue.
    pub max_queue_size: usize,
    /// Write protocol anomalies to `errors_<addr>.txt`.
    pub errors_to_file: bool,
    /// Write delivered payloads to `data_<addr>.txt`.
    pub data_to_file: bool,
    /// Extra per-frame tracing when > 0.
    pub debug_level: u8,
    /// Shared secret for the management integrity tag.
    pub secret_key: String,
}

impl MacConfig {
    pub fn new(addr: u8) -> Self {
        Self {
            addr,
            base_timeout: 1.0,
            max_attempts: 5,
            broadcast_interval: 2.0,
            exp_backoff: true,
            backoff_randomness: 0.05,
            node_expiry_delay: 60.0,
            max_queue_size: 10,
            errors_to_file: false,
            data_to_file: false,
            debug_level: 0,
            secret_key: "12345".to_string(),
        }
    }
}

pub struct Mac {
    config: MacConfig,
    route: RouteState,
    neighbors: NeighborTable,
    suppress: SuppressTable,
    arq: ArqState,
    mib: Mib,
    monitor: Option<MonitorTable>,
    manager: Option<ManagerServer>,
    diag: DiagSinks,
    last_tx_time: Option<Instant>,
    rx_byte_count: u64,
    to_radio: VecDeque<Vec<u8>>,
    to_app: VecDeque<Vec<u8>>,
}

impl Mac {
    pub fn new(config: MacConfig) -> Self {
        let route = if config.addr == SINK_ADDR {
            RouteState::sink()
        } else {
            RouteState::disconnected()
        };
        let mib = Mib::new(
            config.addr,
            config.max_attempts,
            config.broadcast_interval as u8,
            0,
        );
        let diag = DiagSinks::open(config.addr, config.data_to_file, config.errors_to_file);
        let monitor = if config.addr == SINK_ADDR {
            // the sink manages itself through the same table
            let mut table = MonitorTable::new();
            table.add_row(Row::with_defaults(
                config.addr,
                config.max_attempts,
                config.broadcast_interval as u8,
                0,
            ));
            Some(table)
        } else {
            None
        };
        let arq = ArqState::new(config.max_queue_size);
        Self {
            route,
            neighbors: NeighborTable::new(),
            suppress: SuppressTable::new(),
            arq,
            mib,
            monitor,
            manager: None,
            diag,
            last_tx_time: None,
            rx_byte_count: 0,
            to_radio: VecDeque::new(),
            to_app: VecDeque::new(),
            config,
        }
    }

    /// Host the external-client server (sink deployments).
    pub fn attach_manager(&mut self, server: ManagerServer) {
        self.manager = Some(server);
    }

    pub fn is_sink(&self) -> bool {
        self.config.addr == SINK_ADDR
    }

    pub fn addr(&self) -> u8 {
        self.config.addr
    }

    pub fn route(&self) -> RouteState {
        self.route
    }

    pub fn stats(&self) -> ArqStats {
        self.arq.stats
    }

    pub fn rx_byte_count(&self) -> u64 {
        self.rx_byte_count
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn monitor(&self) -> Option<&MonitorTable> {
        self.monitor.as_ref()
    }

    pub fn monitor_mut(&mut self) -> Option<&mut MonitorTable> {
        self.monitor.as_mut()
    }

    /// Next frame staged for the radio, if any.
    pub fn pop_radio(&mut self) -> Option<Vec<u8>> {
        self.to_radio.pop_front()
    }

    /// Next payload delivered to the application port (sink only).
    pub fn pop_app(&mut self) -> Option<Vec<u8>> {
        self.to_app.pop_front()
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Handle one frame from the radio.
    pub fn handle_radio(&mut self, now: Instant, frame: &[u8]) {
        let packet = match Packet::decode(frame) {
            Ok(packet) => packet,
            Err(err) => {
                self.drop_frame(frame, &err);
                return;
            }
        };
        if packet.src() == self.config.addr {
            log::debug!("mac({}): heard myself, ignoring", self.config.addr);
            return;
        }
        self.rx_byte_count += frame.len() as u64;
        if self.config.debug_level > 0 {
            log::debug!("mac({}): rx {:?}", self.config.addr, packet);
        }
        match packet {
            Packet::Beacon { src, hop_count, path_quality } => {
                self.on_beacon(now, src, hop_count, path_quality)
            }
            Packet::Data { src, dest: _, cnt, ctrl, payload } => {
                self.on_data(now, src, cnt, ctrl, payload)
            }
            Packet::Mgmt { src, track, origin, value, dest, opt, oid, hash } => {
                self.on_mgmt(now, src, track, origin, value, dest, opt, oid, hash)
            }
            Packet::MgmtResp { src, dest: _, cnt, flag, origin, track, value, hash } => {
                self.on_mgmt_resp(now, src, cnt, flag, origin, track, value, hash)
            }
            Packet::Ack { src: _, dest, cnt, acked_proto } => {
                self.on_ack(now, dest, cnt, acked_proto)
            }
        }
    }

    /// Accept an application payload, no ARQ. Requires at least one
    /// neighbor, like any transmission toward the sink.
    pub fn handle_app(&mut self, now: Instant, payload: &[u8]) {
        if self.neighbors.is_empty() {
            log::debug!("mac({}): no neighbors, dropping app payload", self.config.addr);
            return;
        }
        self.tx_no_arq(now, payload);
    }

    /// Accept an application payload for acknowledged delivery.
    pub fn handle_app_arq(&mut self, now: Instant, payload: &[u8]) {
        self.arq.enqueue_data(payload.to_vec());
        self.pump_fsm(now);
    }

    /// Periodic control tick: beacon, age neighbors, prune the duplicate
    /// window, serve the external client, drain table commands, pump the
    /// FSM. The host calls this under the same lock as the other handlers.
    pub fn handle_tick(&mut self, now: Instant) {
        if (self.is_sink() || self.route.connected()) && self.config.broadcast_interval > 0.0 {
            let due = match self.last_tx_time {
                None => true,
                Some(last) => {
                    now.saturating_duration_since(last).as_secs_f64()
                        >= self.config.broadcast_interval * 2.0 * rand::random::<f64>()
                }
            };
            if due {
                self.send_beacon(now);
            }
        }

        let expiry = Duration::from_secs_f64(self.config.node_expiry_delay);
        let evicted = self.neighbors.age(now, expiry);
        for addr in &evicted {
            log::info!("mac({}): link lost with node {addr}", self.config.addr);
            if let Some(table) = self.monitor.as_mut() {
                table.deactivate(*addr);
            }
        }
        if !evicted.is_empty() {
            self.reselect_route();
        }
        self.suppress.prune(now);

        if let (Some(server), Some(table)) = (self.manager.as_ref(), self.monitor.as_mut()) {
            server.poll(table);
        }

        // commands wait in the table until the network is reachable
        if self.is_sink() && !self.neighbors.is_empty() {
            loop {
                let Some(cmd) = self.monitor.as_mut().and_then(|t| t.next_command()) else {
                    break;
                };
                log::debug!(
                    "mac({}): queueing command track {} for node {}",
                    self.config.addr,
                    cmd.track,
                    cmd.dest
                );
                self.suppress.record(self.config.addr, self.arq.mgmt_track, now);
                self.arq.enqueue_mgmt(MgmtEntry::Originate {
                    value: cmd.value,
                    dest: cmd.dest,
                    opt: cmd.opt,
                    oid: cmd.oid,
                });
            }
        }

        self.pump_fsm(now);
    }

    // ------------------------------------------------------------------
    // Inbound handlers
    // ------------------------------------------------------------------

    fn on_beacon(&mut self, now: Instant, src: u8, hop_count: u8, path_quality: u8) {
        let is_new = self.neighbors.upsert(src, now, hop_count, path_quality);
        if is_new {
            log::debug!("mac({}): node {src} is alive", self.config.addr);
            let row = self.default_row(src);
            if let Some(table) = self.monitor.as_mut() {
                table.add_row(row);
            }
        }
        self.reselect_route();
    }

    fn on_data(&mut self, now: Instant, src: u8, cnt: u8, ctrl: u8, payload: Vec<u8>) {
        if ctrl != ARQ && ctrl != NO_ARQ {
            log::warn!("mac({}): bad control field {ctrl}", self.config.addr);
            return;
        }
        let mut new_packet = false;
        if ctrl == ARQ {
            if self.neighbors.contains(src) {
                if let Some(neighbor) = self.neighbors.get_mut(src) {
                    new_packet = neighbor.last_packet_number != Some(cnt);
                    neighbor.last_packet_number = Some(cnt);
                }
                self.send_ack(now, src, cnt, DATA_PROTO);
            } else {
                // no entry to track duplicates against, so no ack either
                log::debug!("mac({}): data from unknown neighbor {src}", self.config.addr);
            }
        }
        if ctrl == NO_ARQ || new_packet {
            if self.is_sink() {
                self.diag.data(&render_bytes(&payload));
                self.to_app.push_back(payload);
            } else if ctrl == ARQ {
                self.arq.enqueue_data(payload);
                self.pump_fsm(now);
            } else {
                self.tx_no_arq(now, &payload);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_mgmt(
        &mut self,
        now: Instant,
        src: u8,
        track: u8,
        origin: u8,
        value: u8,
        dest: u8,
        opt: u8,
        oid: u8,
        hash: u8,
    ) {
        // duplicates are acked too; only processing is suppressed
        self.send_ack(now, src, track, MGMT_PROTO);
        if !self.suppress.observe(origin, track, now) {
            log::debug!(
                "mac({}): duplicate mgmt packet origin {origin} track {track}",
                self.config.addr
            );
            return;
        }
        if dest == self.config.addr {
            let covered = [MGMT_PROTO, track, origin, value, dest, opt, oid];
            if !auth::verify(&covered, &self.config.secret_key, hash) {
                log::warn!("mac({}): mgmt hash mismatch from origin {origin}", self.config.addr);
                self.diag.error(&format!("mgmt auth failure, origin {origin} track {track}"));
                self.enqueue_resp(now, RespEntry::Originate {
                    flag: 1,
                    track,
                    value: CODE_AUTH_FAIL,
                });
                return;
            }
            let (flag, code) = self.mib.agent(opt, oid, value);
            self.enqueue_resp(now, RespEntry::Originate { flag, track, value: code });
        } else {
            self.arq.enqueue_mgmt(MgmtEntry::Forward { origin, value, dest, opt, oid, hash });
            self.pump_fsm(now);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_mgmt_resp(
        &mut self,
        now: Instant,
        src: u8,
        cnt: u8,
        flag: u8,
        origin: u8,
        track: u8,
        value: u8,
        hash: u8,
    ) {
        let Some(neighbor) = self.neighbors.get_mut(src) else {
            log::warn!("mac({}): mgmt resp from unknown source {src}", self.config.addr);
            return;
        };
        let new_packet = neighbor.last_packet_number != Some(cnt);
        neighbor.last_packet_number = Some(cnt);
        self.send_ack(now, src, cnt, MGMT_RESP_PROTO);
        if !new_packet {
            return;
        }
        if self.is_sink() {
            // verified at the ultimate consumer, same construction as the
            // request tag over the hop-invariant fields
            let covered = [MGMT_RESP_PROTO, flag, origin, track, value];
            if !auth::verify(&covered, &self.config.secret_key, hash) {
                log::warn!(
                    "mac({}): mgmt resp hash mismatch, origin {origin} track {track}",
                    self.config.addr
                );
                self.diag.error(&format!("mgmt resp auth failure, origin {origin} track {track}"));
                return;
            }
            self.diag.data(&render_bytes(&[flag, origin, track, value]));
            if let Some(table) = self.monitor.as_mut() {
                table.process(flag, origin, track, value);
            }
        } else {
            self.enqueue_resp(now, RespEntry::Forward { flag, origin, track, value, hash });
        }
    }

    fn on_ack(&mut self, now: Instant, dest: u8, cnt: u8, acked_proto: u8) {
        if dest != self.config.addr {
            // overheard ack; still drives the retransmit timer
            self.pump_fsm(now);
            return;
        }
        if self.arq.channel == ChannelState::Idle {
            log::debug!("mac({}): got ack {cnt} while idle", self.config.addr);
            return;
        }
        let matches = match (&self.arq.in_flight, acked_proto) {
            (Some(InFlight::Data(_)), DATA_PROTO) => self.arq.expected_ack == Some(cnt),
            (Some(InFlight::Resp(_)), MGMT_RESP_PROTO) => self.arq.expected_ack == Some(cnt),
            (Some(InFlight::Mgmt(_)), MGMT_PROTO) => self.arq.mgmt_expected_ack == Some(cnt),
            _ => false,
        };
        if !matches {
            log::debug!(
                "mac({}): bad ack {cnt} for protocol {acked_proto} (exp. data {:?}, mgmt {:?})",
                self.config.addr,
                self.arq.expected_ack,
                self.arq.mgmt_expected_ack
            );
            return;
        }
        log::debug!("mac({}): got ack {cnt}, back to idle", self.config.addr);
        self.arq.channel = ChannelState::Idle;
        self.arq.in_flight = None;
        self.pump_fsm(now);
    }

    // ------------------------------------------------------------------
    // ARQ finite state machine
    // ------------------------------------------------------------------

    /// Advance the stop-and-wait FSM: transmit the next queued packet when
    /// idle, retransmit or give up on timeout when busy.
    fn pump_fsm(&mut self, now: Instant) {
        if !self.route.connected() {
            log::debug!("mac({}): not connected, fsm idle", self.config.addr);
            return;
        }
        loop {
            match self.arq.channel {
                ChannelState::Idle => {
                    let Some(next) = self.arq.dequeue_highest() else { break };
                    match next {
                        InFlight::Mgmt(MgmtEntry::Originate { value, dest, opt, oid })
                            if dest == self.config.addr =>
                        {
                            // self-managed command: run the agent locally and
                            // consume one track number so the registry stays
                            // in lockstep with the radio counter
                            let (flag, code) = self.mib.agent(opt, oid, value);
                            let track = self.arq.mgmt_track;
                            self.arq.mgmt_track = self.arq.mgmt_track.wrapping_add(1);
                            if let Some(table) = self.monitor.as_mut() {
                                table.process(flag, dest, track, code);
                            }
                            continue;
                        }
                        InFlight::Resp(entry) => {
                            self.arq.expected_ack = Some(self.arq.pkt_cnt);
                            log::debug!(
                                "mac({}): sending mgmt resp packet {}",
                                self.config.addr,
                                self.arq.pkt_cnt
                            );
                            self.resp_tx(now, &entry);
                            self.arq.in_flight = Some(InFlight::Resp(entry));
                        }
                        InFlight::Mgmt(entry) => {
                            self.arq.mgmt_expected_ack = Some(self.arq.mgmt_track);
                            log::debug!(
                                "mac({}): sending mgmt packet, track {}",
                                self.config.addr,
                                self.arq.mgmt_track
                            );
                            self.mgmt_tx(now, &entry);
                            self.arq.in_flight = Some(InFlight::Mgmt(entry));
                        }
                        InFlight::Data(payload) => {
                            self.arq.expected_ack = Some(self.arq.pkt_cnt);
                            log::debug!(
                                "mac({}): sending data packet {}",
                                self.config.addr,
                                self.arq.pkt_cnt
                            );
                            self.data_tx(now, &payload);
                            self.arq.in_flight = Some(InFlight::Data(payload));
                        }
                    }
                    self.arq.channel = ChannelState::Busy;
                    self.arq.tx_time = Some(now);
                    self.arq.stats.pkts_txed += 1;
                    self.arq.retries = 0;
                    self.arq.jitter = self.config.backoff_randomness * rand::random::<f64>();
                    break;
                }
                ChannelState::Busy => {
                    let Some(tx_time) = self.arq.tx_time else { break };
                    let elapsed = now.saturating_duration_since(tx_time).as_secs_f64();
                    let timeout = self
                        .arq
                        .backoff_timeout(self.config.base_timeout, self.config.exp_backoff);
                    if elapsed <= timeout {
                        break;
                    }
                    if self.arq.retries == self.config.max_attempts {
                        log::warn!(
                            "mac({}): arq failed after {} attempts",
                            self.config.addr,
                            self.arq.retries
                        );
                        self.diag.error("arq retry budget exhausted, packet dropped");
                        self.arq.retries = 0;
                        self.arq.channel = ChannelState::Idle;
                        self.arq.stats.failed += 1;
                        let failed = self.arq.in_flight.take();
                        if !self.is_sink() && matches!(failed, Some(InFlight::Mgmt(_))) {
                            // tell the sink its command cannot reach the
                            // destination from here
                            let track = prev_seq(self.arq.mgmt_track);
                            log::warn!(
                                "mac({}): mgmt packet undeliverable, reporting track {track}",
                                self.config.addr
                            );
                            self.arq.enqueue_resp(RespEntry::Originate {
                                flag: 1,
                                track,
                                value: CODE_UNREACHABLE,
                            });
                        }
                        continue;
                    }
                    self.arq.retries += 1;
                    log::debug!(
                        "mac({}): retransmission {}",
                        self.config.addr,
                        self.arq.retries
                    );
                    if let Some(entry) = self.arq.in_flight.take() {
                        match &entry {
                            InFlight::Data(payload) => {
                                let cnt = prev_seq(self.arq.pkt_cnt);
                                self.send_data_frame(now, cnt, ARQ, payload);
                            }
                            InFlight::Mgmt(mgmt) => {
                                let track = prev_seq(self.arq.mgmt_track);
                                if !self.neighbors.is_empty() {
                                    self.send_mgmt_frame(now, track, mgmt);
                                }
                            }
                            InFlight::Resp(resp) => {
                                let cnt = prev_seq(self.arq.pkt_cnt);
                                if !self.neighbors.is_empty() {
                                    self.send_resp_frame(now, cnt, resp);
                                }
                            }
                        }
                        self.arq.in_flight = Some(entry);
                    }
                    self.arq.tx_time = Some(now);
                    self.arq.jitter = self.config.backoff_randomness * rand::random::<f64>();
                    self.arq.stats.retxed += 1;
                    break;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Transmit paths
    // ------------------------------------------------------------------

    /// First transmission of a queued data packet; advances `pkt_cnt`.
    fn data_tx(&mut self, now: Instant, payload: &[u8]) {
        self.send_data_frame(now, self.arq.pkt_cnt, ARQ, payload);
        self.arq.pkt_cnt = self.arq.pkt_cnt.wrapping_add(1);
    }

    fn tx_no_arq(&mut self, now: Instant, payload: &[u8]) {
        self.send_data_frame(now, self.arq.pkt_cnt, NO_ARQ, payload);
        self.arq.pkt_cnt = self.arq.pkt_cnt.wrapping_add(1);
    }

    /// First transmission of a queued management packet; advances
    /// `mgmt_track` only when a neighbor can hear it.
    fn mgmt_tx(&mut self, now: Instant, entry: &MgmtEntry) {
        if self.neighbors.is_empty() {
            return;
        }
        self.send_mgmt_frame(now, self.arq.mgmt_track, entry);
        self.arq.mgmt_track = self.arq.mgmt_track.wrapping_add(1);
    }

    /// First transmission of a queued management response; shares `pkt_cnt`
    /// with data.
    fn resp_tx(&mut self, now: Instant, entry: &RespEntry) {
        if self.neighbors.is_empty() {
            return;
        }
        self.send_resp_frame(now, self.arq.pkt_cnt, entry);
        self.arq.pkt_cnt = self.arq.pkt_cnt.wrapping_add(1);
    }

    fn send_beacon(&mut self, now: Instant) {
        let packet = Packet::Beacon {
            src: self.config.addr,
            hop_count: self.route.hop_count,
            path_quality: self.route.path_quality,
        };
        self.transmit(now, &packet);
    }

    fn send_ack(&mut self, now: Instant, dest: u8, cnt: u8, acked_proto: u8) {
        let packet = Packet::Ack { src: self.config.addr, dest, cnt, acked_proto };
        self.transmit(now, &packet);
    }

    fn send_data_frame(&mut self, now: Instant, cnt: u8, ctrl: u8, payload: &[u8]) {
        if !self.route.connected() {
            log::debug!("mac({}): not connected, data dropped", self.config.addr);
            return;
        }
        if self.route.next_hop == self.config.addr {
            log::debug!("mac({}): next hop is self, data dropped", self.config.addr);
            return;
        }
        let packet = Packet::Data {
            src: self.config.addr,
            dest: self.route.next_hop,
            cnt,
            ctrl,
            payload: payload.to_vec(),
        };
        self.transmit(now, &packet);
    }

    /// Management requests flood hop by hop: there is no next-hop field,
    /// every neighbor hears the frame and the duplicate table stops loops.
    fn send_mgmt_frame(&mut self, now: Instant, track: u8, entry: &MgmtEntry) {
        if !self.route.connected() {
            log::debug!("mac({}): not connected, mgmt dropped", self.config.addr);
            return;
        }
        let packet = match *entry {
            MgmtEntry::Originate { value, dest, opt, oid } => {
                let origin = self.config.addr;
                let covered = [MGMT_PROTO, track, origin, value, dest, opt, oid];
                let hash = auth::tag(&covered, &self.config.secret_key);
                Packet::Mgmt { src: origin, track, origin, value, dest, opt, oid, hash }
            }
            MgmtEntry::Forward { origin, value, dest, opt, oid, hash } => Packet::Mgmt {
                src: self.config.addr,
                track,
                origin,
                value,
                dest,
                opt,
                oid,
                hash,
            },
        };
        self.transmit(now, &packet);
    }

    fn send_resp_frame(&mut self, now: Instant, cnt: u8, entry: &RespEntry) {
        if !self.route.connected() {
            log::debug!("mac({}): not connected, mgmt resp dropped", self.config.addr);
            return;
        }
        if self.route.next_hop == self.config.addr {
            log::debug!("mac({}): next hop is self, mgmt resp dropped", self.config.addr);
            return;
        }
        let packet = match *entry {
            RespEntry::Originate { flag, track, value } => {
                let origin = self.config.addr;
                let covered = [MGMT_RESP_PROTO, flag, origin, track, value];
                let hash = auth::tag(&covered, &self.config.secret_key);
                Packet::MgmtResp {
                    src: origin,
                    dest: self.route.next_hop,
                    cnt,
                    flag,
                    origin,
                    track,
                    value,
                    hash,
                }
            }
            RespEntry::Forward { flag, origin, track, value, hash } => Packet::MgmtResp {
                src: self.config.addr,
                dest: self.route.next_hop,
                cnt,
                flag,
                origin,
                track,
                value,
                hash,
            },
        };
        self.transmit(now, &packet);
    }

    fn transmit(&mut self, now: Instant, packet: &Packet) {
        if self.config.debug_level > 0 {
            log::debug!("mac({}): tx {:?}", self.config.addr, packet);
        }
        self.to_radio.push_back(packet.encode());
        self.last_tx_time = Some(now);
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn enqueue_resp(&mut self, now: Instant, entry: RespEntry) {
        self.arq.enqueue_resp(entry);
        self.pump_fsm(now);
    }

    fn reselect_route(&mut self) {
        let route = self.neighbors.select(self.config.addr);
        if route != self.route {
            log::info!(
                "mac({}): route hc {} pq {} next hop {}",
                self.config.addr,
                route.hop_count,
                route.path_quality,
                route.next_hop
            );
        }
        self.route = route;
    }

    fn default_row(&self, addr: u8) -> Row {
        Row::with_defaults(
            addr,
            self.mib.get(OID_MAX_ATTEMPTS).unwrap_or(self.config.max_attempts),
            self.mib
                .get(OID_BROADCAST_INTERVAL)
                .unwrap_or(self.config.broadcast_interval as u8),
            self.mib.get(OID_MGMT_MODE).unwrap_or(0),
        )
    }

    fn drop_frame(&mut self, frame: &[u8], err: &WireError) {
        log::debug!("mac({}): dropping frame: {err}", self.config.addr);
        self.diag.error(&format!("bad frame ({err}): {}", render_bytes(frame)));
    }
}

fn render_bytes(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&byte.to_string());
    }
    out
}
