//! End-to-end protocol scenarios over in-memory nodes.
//!
//! Nodes are wired by piping one node's staged radio frames into another's
//! inbound handler; time is driven explicitly through the `now` parameters.

use std::time::{Duration, Instant};

use llsr_mac::auth;
use llsr_mac::mac::{Mac, MacConfig};
use llsr_mac::neighbor::RouteState;
use llsr_mac::wire::{Packet, ARQ, ARQ_PROTO, DATA_PROTO, MGMT_PROTO, MGMT_RESP_PROTO};
use llsr_mgmt::Column;

const KEY: &str = "12345";

fn config(addr: u8) -> MacConfig {
    let mut config = MacConfig::new(addr);
    config.broadcast_interval = 0.0; // beacons injected by hand
    config.backoff_randomness = 0.0;
    config.base_timeout = 0.01;
    config.max_attempts = 3;
    config
}

/// Deliver every frame staged on `from` to `to` (a perfect shared medium).
fn pipe(now: Instant, from: &mut Mac, to: &mut Mac) {
    while let Some(frame) = from.pop_radio() {
        to.handle_radio(now, &frame);
    }
}

fn drain(mac: &mut Mac) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while let Some(frame) = mac.pop_radio() {
        frames.push(frame);
    }
    frames
}

#[test]
fn two_hop_beacon_convergence() {
    let t0 = Instant::now();
    let mut sink = Mac::new(config(0));
    let mut a = Mac::new(config(1));
    let mut b = Mac::new(config(2));

    a.handle_radio(t0, &[2, 0, 0, 255]);
    assert_eq!(a.route(), RouteState { hop_count: 1, path_quality: 1, next_hop: 0 });

    // A's beacon carries its own metrics onward
    let beacon = Packet::Beacon { src: 1, hop_count: 1, path_quality: 1 }.encode();
    assert_eq!(beacon, [2, 1, 1, 1]);
    b.handle_radio(t0, &beacon);
    assert_eq!(b.route(), RouteState { hop_count: 2, path_quality: 1, next_hop: 1 });

    // the sink's own state never moves
    sink.handle_radio(t0, &beacon);
    assert_eq!(sink.route(), RouteState { hop_count: 0, path_quality: 255, next_hop: 0 });
}

#[test]
fn arq_happy_path() {
    let t0 = Instant::now();
    let mut node = Mac::new(config(1));
    node.handle_radio(t0, &[2, 0, 0, 255]);

    node.handle_app_arq(t0, &[0xAA]);
    assert_eq!(node.pop_radio(), Some(vec![DATA_PROTO, 1, 0, 0, ARQ, 0xAA]));
    assert!(node.pop_radio().is_none());

    node.handle_radio(t0, &[ARQ_PROTO, 0, 1, 0, DATA_PROTO]);
    assert_eq!(node.stats().failed, 0);

    // channel is idle again: the next packet goes straight out with cnt 1
    node.handle_app_arq(t0, &[0xBB]);
    assert_eq!(node.pop_radio(), Some(vec![DATA_PROTO, 1, 0, 1, ARQ, 0xBB]));
}

#[test]
fn arq_exhaustion_drops_the_packet() {
    let t0 = Instant::now();
    let mut node = Mac::new(config(1));
    node.handle_radio(t0, &[2, 0, 0, 255]);

    node.handle_app_arq(t0, &[0xAA]);
    assert_eq!(node.pop_radio(), Some(vec![DATA_PROTO, 1, 0, 0, ARQ, 0xAA]));

    // expiries at 10ms, then 20ms, 40ms, 80ms after each retransmission
    let t1 = t0 + Duration::from_millis(11);
    node.handle_tick(t1);
    assert_eq!(node.pop_radio(), Some(vec![DATA_PROTO, 1, 0, 0, ARQ, 0xAA]));
    let t2 = t1 + Duration::from_millis(21);
    node.handle_tick(t2);
    assert_eq!(node.pop_radio(), Some(vec![DATA_PROTO, 1, 0, 0, ARQ, 0xAA]));
    let t3 = t2 + Duration::from_millis(41);
    node.handle_tick(t3);
    assert_eq!(node.pop_radio(), Some(vec![DATA_PROTO, 1, 0, 0, ARQ, 0xAA]));
    assert_eq!(node.stats().retxed, 3);
    assert_eq!(node.stats().failed, 0);

    let t4 = t3 + Duration::from_millis(81);
    node.handle_tick(t4);
    assert!(node.pop_radio().is_none());
    assert_eq!(node.stats().failed, 1);

    // the channel is idle again and usable
    node.handle_app_arq(t4, &[0xBB]);
    assert_eq!(node.pop_radio(), Some(vec![DATA_PROTO, 1, 0, 1, ARQ, 0xBB]));
}

#[test]
fn duplicate_mgmt_is_acked_but_not_reforwarded() {
    let t0 = Instant::now();
    let mut node = Mac::new(config(1));
    node.handle_radio(t0, &[2, 0, 0, 255]);

    let hash = auth::tag(&[MGMT_PROTO, 5, 0, 7, 2, 1, 4], KEY);
    let mgmt =
        Packet::Mgmt { src: 0, track: 5, origin: 0, value: 7, dest: 2, opt: 1, oid: 4, hash }
            .encode();

    node.handle_radio(t0, &mgmt);
    let frames = drain(&mut node);
    // ack for track 5, then the forwarded request under this node's track 0
    assert_eq!(frames[0], vec![ARQ_PROTO, 1, 0, 5, MGMT_PROTO]);
    assert_eq!(frames[1][0], MGMT_PROTO);
    assert_eq!(frames[1], vec![MGMT_PROTO, 1, 0, 0, 7, 2, 1, 4, hash]);
    assert_eq!(frames.len(), 2);

    // second receipt: acked, suppressed, nothing forwarded
    node.handle_radio(t0, &mgmt);
    let frames = drain(&mut node);
    assert_eq!(frames, vec![vec![ARQ_PROTO, 1, 0, 5, MGMT_PROTO]]);
}

#[test]
fn forwarding_exhaustion_reports_destination_unreachable() {
    let t0 = Instant::now();
    let mut node = Mac::new(config(1));
    node.handle_radio(t0, &[2, 9, 1, 1]); // only neighbor is node 9

    let hash = auth::tag(&[MGMT_PROTO, 5, 0, 7, 2, 1, 4], KEY);
    let mgmt =
        Packet::Mgmt { src: 9, track: 5, origin: 0, value: 7, dest: 2, opt: 1, oid: 4, hash }
            .encode();
    node.handle_radio(t0, &mgmt);
    let frames = drain(&mut node);
    assert_eq!(frames.len(), 2); // ack + forwarded request, track 0

    // no ack ever arrives; drive the FSM through its whole retry budget
    let mut now = t0;
    for millis in [11, 21, 41, 81] {
        now += Duration::from_millis(millis);
        node.handle_tick(now);
    }
    let frames = drain(&mut node);
    assert_eq!(frames.len(), 4); // 3 retransmissions, then the error report
    let resp_hash = auth::tag(&[MGMT_RESP_PROTO, 1, 1, 0, 2], KEY);
    assert_eq!(frames[3], vec![MGMT_RESP_PROTO, 1, 9, 0, 1, 1, 0, 2, resp_hash]);
    assert_eq!(node.stats().failed, 1);
}

#[test]
fn authentication_failure_is_reported_to_the_sink() {
    let t0 = Instant::now();
    let mut sink = Mac::new(config(0));
    let mut node = Mac::new(config(2));

    // one-hop topology, both directions
    node.handle_radio(t0, &[2, 0, 0, 255]);
    sink.handle_radio(t0, &[2, 2, 1, 1]);
    assert_eq!(sink.monitor().map(|t| t.size()), Some(2));

    // external client sets mgmtMode = 7 on node 2 (row 1)
    sink.monitor_mut().expect("sink table").set(1, Column::MgmtMode, 7).expect("set");
    sink.handle_tick(t0);
    let mut frames = drain(&mut sink);
    assert_eq!(frames.len(), 1);
    let mut mgmt = frames.remove(0);
    assert_eq!(mgmt[0], MGMT_PROTO);

    // corrupt the integrity tag in transit
    let tampered_len = mgmt.len();
    mgmt[tampered_len - 1] ^= 0xFF;
    node.handle_radio(t0, &mgmt);

    let frames = drain(&mut node);
    // ack for the request, then the authentication-failure response
    assert_eq!(frames[0][0], ARQ_PROTO);
    let resp = frames[1].clone();
    assert_eq!(resp[0], MGMT_RESP_PROTO);
    assert_eq!(resp[4], 1); // flag
    assert_eq!(resp[7], 3); // error code: authentication fail

    sink.handle_radio(t0, &resp);
    let table = sink.monitor().expect("sink table");
    assert_eq!(table.get(1, Column::MgmtInfo).as_deref(), Ok("3"));
    assert_eq!(table.get(1, Column::MgmtMode).as_deref(), Ok("3"));
    assert_eq!(table.outstanding(), 0);
}

#[test]
fn set_and_get_roundtrip_updates_the_row() {
    let t0 = Instant::now();
    let mut sink = Mac::new(config(0));
    let mut node_config = config(2);
    node_config.max_attempts = 4; // differs from the sink's row default
    let mut node = Mac::new(node_config);
    node.handle_radio(t0, &[2, 0, 0, 255]);
    sink.handle_radio(t0, &[2, 2, 1, 1]);

    // SET mgmtMode = 7
    sink.monitor_mut().expect("table").set(1, Column::MgmtMode, 7).expect("set");
    sink.handle_tick(t0);
    pipe(t0, &mut sink, &mut node); // request reaches the node
    pipe(t0, &mut node, &mut sink); // ack + response reach the sink
    pipe(t0, &mut sink, &mut node); // response ack frees the node's channel
    let table = sink.monitor().expect("table");
    assert_eq!(table.get(1, Column::MgmtMode).as_deref(), Ok("7"));
    assert_eq!(table.get(1, Column::MgmtInfo).as_deref(), Ok("2"));
    assert_eq!(table.outstanding(), 0);

    // GET maxAttempts reads the node's MIB value back into the row
    sink.monitor_mut().expect("table").issue_get(1, Column::MaxAttempts).expect("get");
    sink.handle_tick(t0);
    pipe(t0, &mut sink, &mut node);
    pipe(t0, &mut node, &mut sink);
    let table = sink.monitor().expect("table");
    assert_eq!(table.get(1, Column::MaxAttempts).as_deref(), Ok("4"));
    assert_eq!(table.get(1, Column::MgmtInfo).as_deref(), Ok("2"));
    assert_eq!(table.outstanding(), 0);
}

#[test]
fn sink_manages_itself_without_radio_traffic() {
    let t0 = Instant::now();
    let mut sink = Mac::new(config(0));
    sink.handle_radio(t0, &[2, 2, 1, 1]); // a neighbor so commands drain

    sink.monitor_mut().expect("table").set(0, Column::MgmtMode, 9).expect("set");
    sink.handle_tick(t0);
    assert!(sink.pop_radio().is_none());
    let table = sink.monitor().expect("table");
    assert_eq!(table.get(0, Column::MgmtMode).as_deref(), Ok("9"));
    assert_eq!(table.get(0, Column::MgmtInfo).as_deref(), Ok("2"));
    assert_eq!(table.outstanding(), 0);
}

#[test]
fn data_forwarding_reaches_the_sink_over_two_hops() {
    let t0 = Instant::now();
    let mut sink = Mac::new(config(0));
    let mut a = Mac::new(config(1));
    let mut b = Mac::new(config(2));

    // build routes: sink -> a -> b, and make sources known neighbors
    a.handle_radio(t0, &[2, 0, 0, 255]);
    b.handle_radio(t0, &[2, 1, 1, 1]);
    sink.handle_radio(t0, &[2, 1, 1, 1]);
    a.handle_radio(t0, &[2, 2, 2, 1]);

    b.handle_app_arq(t0, &[0xAA]);
    let frame = b.pop_radio().expect("b transmits");
    assert_eq!(frame, vec![DATA_PROTO, 2, 1, 0, ARQ, 0xAA]);

    a.handle_radio(t0, &frame);
    let frames = drain(&mut a);
    // ack back to b, then the forwarded copy toward the sink
    assert_eq!(frames[0], vec![ARQ_PROTO, 1, 2, 0, DATA_PROTO]);
    assert_eq!(frames[1], vec![DATA_PROTO, 1, 0, 0, ARQ, 0xAA]);

    sink.handle_radio(t0, &frames[1]);
    assert_eq!(sink.pop_app(), Some(vec![0xAA]));

    // replaying the same frame at A forwards nothing new
    a.handle_radio(t0, &[DATA_PROTO, 2, 1, 0, ARQ, 0xAA]);
    let frames = drain(&mut a);
    assert_eq!(frames, vec![vec![ARQ_PROTO, 1, 2, 0, DATA_PROTO]]);
}

#[test]
fn route_invariants_hold_after_ticks() {
    let t0 = Instant::now();
    let mut node = Mac::new(config(7));
    node.handle_radio(t0, &[2, 3, 1, 2]);
    node.handle_radio(t0, &[2, 4, 1, 2]);
    node.handle_tick(t0);
    let route = node.route();
    assert_eq!(route.hop_count, 2);
    assert_eq!(route.path_quality, 2);
    assert_ne!(route.next_hop, 7);

    // all neighbors expire: back to disconnected
    node.handle_tick(t0 + Duration::from_secs(61));
    assert_eq!(node.route(), RouteState::disconnected());
}
