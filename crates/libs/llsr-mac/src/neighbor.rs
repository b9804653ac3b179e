//! Neighbor table and next-hop selection.
//!
//! Entries live only while the neighbor keeps beaconing; `age` evicts
//! anything silent for longer than the expiry delay. The table keeps
//! insertion order so that the route tie-break is reproducible across runs
//! given the same arrival order.

use std::time::{Duration, Instant};

use crate::{SINK_ADDR, UNDEF_ADDR};

#[derive(Debug, Clone)]
pub struct Neighbor {
    pub addr: u8,
    pub last_heard: Instant,
    pub hop_count: u8,
    pub path_quality: u8,
    /// Sequence number of the last ARQ packet accepted from this neighbor,
    /// `None` until one arrives. Drives per-neighbor duplicate detection.
    pub last_packet_number: Option<u8>,
}

/// Routing state derived from the neighbor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteState {
    pub hop_count: u8,
    pub path_quality: u8,
    pub next_hop: u8,
}

impl RouteState {
    pub fn sink() -> Self {
        Self { hop_count: 0, path_quality: 255, next_hop: SINK_ADDR }
    }

    pub fn disconnected() -> Self {
        Self { hop_count: 255, path_quality: 0, next_hop: UNDEF_ADDR }
    }

    pub fn connected(&self) -> bool {
        self.path_quality > 0
    }
}

#[derive(Default)]
pub struct NeighborTable {
    entries: Vec<Neighbor>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, addr: u8) -> bool {
        self.entries.iter().any(|n| n.addr == addr)
    }

    pub fn get_mut(&mut self, addr: u8) -> Option<&mut Neighbor> {
        self.entries.iter_mut().find(|n| n.addr == addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.entries.iter()
    }

    /// Create or refresh an entry from a beacon. A refresh preserves the
    /// last-accepted packet number. Returns true when the neighbor is new.
    pub fn upsert(&mut self, addr: u8, now: Instant, hop_count: u8, path_quality: u8) -> bool {
        if let Some(entry) = self.get_mut(addr) {
            entry.last_heard = now;
            entry.hop_count = hop_count;
            entry.path_quality = path_quality;
            false
        } else {
            self.entries.push(Neighbor {
                addr,
                last_heard: now,
                hop_count,
                path_quality,
                last_packet_number: None,
            });
            true
        }
    }

    /// Evict entries not heard within `expiry`, returning their addresses.
    pub fn age(&mut self, now: Instant, expiry: Duration) -> Vec<u8> {
        let mut evicted = Vec::new();
        self.entries.retain(|entry| {
            if now.saturating_duration_since(entry.last_heard) > expiry {
                evicted.push(entry.addr);
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Recompute hop count, path quality and next hop.
    ///
    /// Path quality is not a link metric: it counts the neighbors that
    /// jointly attain the minimum hop count and, among those, the maximum
    /// path quality — a measure of upstream redundancy. The next hop is the
    /// first such neighbor in insertion order.
    pub fn select(&self, own_addr: u8) -> RouteState {
        if own_addr == SINK_ADDR {
            return RouteState::sink();
        }
        if self.entries.is_empty() {
            return RouteState::disconnected();
        }
        let min_hop = self.entries.iter().map(|n| n.hop_count).min().unwrap_or(255);
        let best_pq = self
            .entries
            .iter()
            .filter(|n| n.hop_count == min_hop)
            .map(|n| n.path_quality)
            .max()
            .unwrap_or(0);
        let mut count: u16 = 0;
        let mut next_hop = UNDEF_ADDR;
        for entry in &self.entries {
            if entry.hop_count == min_hop && entry.path_quality == best_pq {
                if count == 0 {
                    next_hop = entry.addr;
                }
                count += 1;
            }
        }
        RouteState {
            hop_count: min_hop.saturating_add(1),
            path_quality: count.min(255) as u8,
            next_hop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_route_is_fixed() {
        let table = NeighborTable::new();
        assert_eq!(table.select(SINK_ADDR), RouteState::sink());
    }

    #[test]
    fn no_neighbors_means_disconnected() {
        let table = NeighborTable::new();
        let route = table.select(1);
        assert_eq!(route, RouteState::disconnected());
        assert!(!route.connected());
    }

    #[test]
    fn single_neighbor_route() {
        let now = Instant::now();
        let mut table = NeighborTable::new();
        table.upsert(0, now, 0, 255);
        let route = table.select(1);
        assert_eq!(route, RouteState { hop_count: 1, path_quality: 1, next_hop: 0 });
    }

    #[test]
    fn prefers_minimum_hop_count() {
        let now = Instant::now();
        let mut table = NeighborTable::new();
        table.upsert(5, now, 3, 200);
        table.upsert(6, now, 1, 1);
        let route = table.select(9);
        assert_eq!(route, RouteState { hop_count: 2, path_quality: 1, next_hop: 6 });
    }

    #[test]
    fn path_quality_counts_equally_good_neighbors() {
        let now = Instant::now();
        let mut table = NeighborTable::new();
        table.upsert(4, now, 1, 2);
        table.upsert(5, now, 1, 2);
        table.upsert(6, now, 1, 1);
        table.upsert(7, now, 2, 9);
        let route = table.select(9);
        assert_eq!(route, RouteState { hop_count: 2, path_quality: 2, next_hop: 4 });
    }

    #[test]
    fn tie_break_follows_insertion_order() {
        let now = Instant::now();
        let mut table = NeighborTable::new();
        table.upsert(6, now, 1, 2);
        table.upsert(4, now, 1, 2);
        assert_eq!(table.select(9).next_hop, 6);
    }

    #[test]
    fn refresh_preserves_last_packet_number() {
        let now = Instant::now();
        let mut table = NeighborTable::new();
        assert!(table.upsert(3, now, 1, 1));
        table.get_mut(3).expect("entry").last_packet_number = Some(17);
        assert!(!table.upsert(3, now, 2, 1));
        assert_eq!(table.get_mut(3).expect("entry").last_packet_number, Some(17));
    }

    #[test]
    fn age_evicts_silent_neighbors() {
        let start = Instant::now();
        let mut table = NeighborTable::new();
        table.upsert(3, start, 1, 1);
        table.upsert(4, start + Duration::from_secs(50), 1, 1);
        let evicted = table.age(start + Duration::from_secs(61), Duration::from_secs(60));
        assert_eq!(evicted, [3]);
        assert!(table.contains(4));
        assert!(!table.contains(3));
    }
}
