//! Stop-and-wait ARQ state shared by the three acknowledged packet classes.
//!
//! One channel, three bounded FIFO queues with strict priority
//! (management responses > management requests > data), two sequence-number
//! spaces: `pkt_cnt` is shared by data and management responses,
//! `mgmt_track` belongs to management requests. Counters advance on first
//! transmission only; a retransmission reuses `cnt - 1 mod 256`.

use std::collections::VecDeque;
use std::time::Instant;

/// Shared channel state of the stop-and-wait FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Busy,
}

/// A queued management request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MgmtEntry {
    /// Originated by the sink's monitoring table; origin and hash are filled
    /// in at transmission time.
    Originate { value: u8, dest: u8, opt: u8, oid: u8 },
    /// Received from upstream and re-queued toward the next hop; the hash
    /// travels unchanged.
    Forward { origin: u8, value: u8, dest: u8, opt: u8, oid: u8, hash: u8 },
}

/// A queued management response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespEntry {
    /// Produced by this node's agent (or synthesized on delivery failure);
    /// the tag is computed when the frame is built.
    Originate { flag: u8, track: u8, value: u8 },
    /// Received from downstream and re-queued toward the sink.
    Forward { flag: u8, origin: u8, track: u8, value: u8, hash: u8 },
}

/// The packet occupying the channel while BUSY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InFlight {
    Data(Vec<u8>),
    Mgmt(MgmtEntry),
    Resp(RespEntry),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ArqStats {
    /// ARQ packets handed to the radio for the first time.
    pub pkts_txed: u64,
    /// Retransmissions.
    pub retxed: u64,
    /// Packets dropped after the retry budget ran out.
    pub failed: u64,
}

pub struct ArqState {
    pub channel: ChannelState,
    pub pkt_cnt: u8,
    pub mgmt_track: u8,
    pub expected_ack: Option<u8>,
    pub mgmt_expected_ack: Option<u8>,
    pub in_flight: Option<InFlight>,
    pub retries: u8,
    pub tx_time: Option<Instant>,
    /// Current random backoff share in `[0, backoff_randomness)`.
    pub jitter: f64,
    pub stats: ArqStats,
    data_queue: VecDeque<Vec<u8>>,
    mgmt_queue: VecDeque<MgmtEntry>,
    resp_queue: VecDeque<RespEntry>,
    max_queue_size: usize,
}

impl ArqState {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            channel: ChannelState::Idle,
            pkt_cnt: 0,
            mgmt_track: 0,
            expected_ack: None,
            mgmt_expected_ack: None,
            in_flight: None,
            retries: 0,
            tx_time: None,
            jitter: 0.0,
            stats: ArqStats::default(),
            data_queue: VecDeque::new(),
            mgmt_queue: VecDeque::new(),
            resp_queue: VecDeque::new(),
            max_queue_size,
        }
    }

    pub fn enqueue_data(&mut self, payload: Vec<u8>) {
        if self.data_queue.len() >= self.max_queue_size {
            log::warn!("arq: data queue full, dropping oldest");
            self.data_queue.pop_front();
        }
        self.data_queue.push_back(payload);
    }

    pub fn enqueue_mgmt(&mut self, entry: MgmtEntry) {
        if self.mgmt_queue.len() >= self.max_queue_size {
            log::warn!("arq: mgmt queue full, dropping oldest");
            self.mgmt_queue.pop_front();
        }
        self.mgmt_queue.push_back(entry);
    }

    pub fn enqueue_resp(&mut self, entry: RespEntry) {
        if self.resp_queue.len() >= self.max_queue_size {
            log::warn!("arq: mgmt resp queue full, dropping oldest");
            self.resp_queue.pop_front();
        }
        self.resp_queue.push_back(entry);
    }

    /// Pop the next packet in strict priority order.
    pub fn dequeue_highest(&mut self) -> Option<InFlight> {
        if let Some(entry) = self.resp_queue.pop_front() {
            return Some(InFlight::Resp(entry));
        }
        if let Some(entry) = self.mgmt_queue.pop_front() {
            return Some(InFlight::Mgmt(entry));
        }
        self.data_queue.pop_front().map(InFlight::Data)
    }

    pub fn queued(&self) -> usize {
        self.data_queue.len() + self.mgmt_queue.len() + self.resp_queue.len()
    }

    /// Effective retransmission timeout in seconds for the current retry
    /// count: base × (2^retries | retries + 1) × (1 + jitter).
    pub fn backoff_timeout(&self, base: f64, exp_backoff: bool) -> f64 {
        let scaled = if exp_backoff {
            base * f64::from(1u32 << u32::from(self.retries.min(31)))
        } else {
            base * f64::from(u16::from(self.retries) + 1)
        };
        scaled * (1.0 + self.jitter)
    }
}

/// Sequence number used by a retransmission: the counter was already
/// advanced at first transmission.
pub fn prev_seq(cnt: u8) -> u8 {
    cnt.wrapping_sub(1)
}
