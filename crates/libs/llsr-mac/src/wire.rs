//! LLSR wire format encode/decode.
//!
//! Every frame is a flat byte vector whose first byte is the protocol id.
//! All header fields are single bytes; only DATA carries a variable payload.
//!
//! | proto     | id | length | layout after the id                          |
//! |-----------|----|--------|----------------------------------------------|
//! | ARQ (ack) | 0  | 5      | src, dest, cnt, acked-proto                  |
//! | DATA      | 1  | ≥5     | src, dest, cnt, ctrl, payload…               |
//! | BEACON    | 2  | 4      | src, hop-count, path-quality                 |
//! | MGMT      | 3  | 9      | src, track, origin, value, dest, opt, oid, hash |
//! | MGMT_RESP | 4  | 9      | src, dest, cnt, flag, origin, track, value, hash |

/// Protocol id: unicast acknowledgement.
pub const ARQ_PROTO: u8 = 0;
/// Protocol id: unicast user data.
pub const DATA_PROTO: u8 = 1;
/// Protocol id: routing beacon.
pub const BEACON_PROTO: u8 = 2;
/// Protocol id: management request.
pub const MGMT_PROTO: u8 = 3;
/// Protocol id: management response.
pub const MGMT_RESP_PROTO: u8 = 4;

/// Control field: no acknowledgement requested.
pub const NO_ARQ: u8 = 0;
/// Control field: stop-and-wait ARQ requested.
pub const ARQ: u8 = 1;

/// Data packet header length; payload bytes follow.
pub const PKT_MIN: usize = 5;
pub const ACK_PKT_LENGTH: usize = 5;
pub const BEACON_PKT_LENGTH: usize = 4;
pub const MGMT_PKT_LENGTH: usize = 9;
pub const MGMT_RESP_LENGTH: usize = 9;

/// Errors from frame decoding.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("empty frame")]
    Empty,

    #[error("unknown protocol id: {0}")]
    UnknownProtocol(u8),

    #[error("invalid length {len} for protocol {proto}")]
    BadLength { proto: u8, len: usize },
}

/// A decoded frame.
///
/// Queues and handlers work on this tagged representation; raw byte vectors
/// exist only at the radio boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Ack {
        src: u8,
        dest: u8,
        cnt: u8,
        acked_proto: u8,
    },
    Data {
        src: u8,
        dest: u8,
        cnt: u8,
        ctrl: u8,
        payload: Vec<u8>,
    },
    Beacon {
        src: u8,
        hop_count: u8,
        path_quality: u8,
    },
    Mgmt {
        src: u8,
        track: u8,
        origin: u8,
        value: u8,
        dest: u8,
        opt: u8,
        oid: u8,
        hash: u8,
    },
    MgmtResp {
        src: u8,
        dest: u8,
        cnt: u8,
        flag: u8,
        origin: u8,
        track: u8,
        value: u8,
        hash: u8,
    },
}

impl Packet {
    pub fn proto_id(&self) -> u8 {
        match self {
            Self::Ack { .. } => ARQ_PROTO,
            Self::Data { .. } => DATA_PROTO,
            Self::Beacon { .. } => BEACON_PROTO,
            Self::Mgmt { .. } => MGMT_PROTO,
            Self::MgmtResp { .. } => MGMT_RESP_PROTO,
        }
    }

    /// Address of the transmitting node (previous hop).
    pub fn src(&self) -> u8 {
        match self {
            Self::Ack { src, .. }
            | Self::Data { src, .. }
            | Self::Beacon { src, .. }
            | Self::Mgmt { src, .. }
            | Self::MgmtResp { src, .. } => *src,
        }
    }

    /// Encode to a radio frame.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Ack { src, dest, cnt, acked_proto } => {
                vec![ARQ_PROTO, *src, *dest, *cnt, *acked_proto]
            }
            Self::Data { src, dest, cnt, ctrl, payload } => {
                let mut buf = Vec::with_capacity(PKT_MIN + payload.len());
                buf.extend_from_slice(&[DATA_PROTO, *src, *dest, *cnt, *ctrl]);
                buf.extend_from_slice(payload);
                buf
            }
            Self::Beacon { src, hop_count, path_quality } => {
                vec![BEACON_PROTO, *src, *hop_count, *path_quality]
            }
            Self::Mgmt { src, track, origin, value, dest, opt, oid, hash } => {
                vec![MGMT_PROTO, *src, *track, *origin, *value, *dest, *opt, *oid, *hash]
            }
            Self::MgmtResp { src, dest, cnt, flag, origin, track, value, hash } => {
                vec![MGMT_RESP_PROTO, *src, *dest, *cnt, *flag, *origin, *track, *value, *hash]
            }
        }
    }

    /// Decode a radio frame, validating length for the declared protocol id.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let proto = *data.first().ok_or(WireError::Empty)?;
        match proto {
            ARQ_PROTO => {
                if data.len() != ACK_PKT_LENGTH {
                    return Err(WireError::BadLength { proto, len: data.len() });
                }
                Ok(Self::Ack { src: data[1], dest: data[2], cnt: data[3], acked_proto: data[4] })
            }
            DATA_PROTO => {
                if data.len() < PKT_MIN {
                    return Err(WireError::BadLength { proto, len: data.len() });
                }
                Ok(Self::Data {
                    src: data[1],
                    dest: data[2],
                    cnt: data[3],
                    ctrl: data[4],
                    payload: data[PKT_MIN..].to_vec(),
                })
            }
            BEACON_PROTO => {
                if data.len() != BEACON_PKT_LENGTH {
                    return Err(WireError::BadLength { proto, len: data.len() });
                }
                Ok(Self::Beacon { src: data[1], hop_count: data[2], path_quality: data[3] })
            }
            MGMT_PROTO => {
                if data.len() != MGMT_PKT_LENGTH {
                    return Err(WireError::BadLength { proto, len: data.len() });
                }
                Ok(Self::Mgmt {
                    src: data[1],
                    track: data[2],
                    origin: data[3],
                    value: data[4],
                    dest: data[5],
                    opt: data[6],
                    oid: data[7],
                    hash: data[8],
                })
            }
            MGMT_RESP_PROTO => {
                if data.len() != MGMT_RESP_LENGTH {
                    return Err(WireError::BadLength { proto, len: data.len() });
                }
                Ok(Self::MgmtResp {
                    src: data[1],
                    dest: data[2],
                    cnt: data[3],
                    flag: data[4],
                    origin: data[5],
                    track: data[6],
                    value: data[7],
                    hash: data[8],
                })
            }
            _ => Err(WireError::UnknownProtocol(proto)),
        }
    }
}
