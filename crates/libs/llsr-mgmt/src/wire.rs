//! External-client request/response framing.
//!
//! Every message is a sequence of little-endian `u32` values and
//! length-prefixed byte strings (`u32` length, then the raw bytes, no
//! terminator). Three request opcodes exist:
//!
//! | opcode | request                          | response    |
//! |--------|----------------------------------|-------------|
//! | 0      | `idx: u32`, `name: str`          | `str` value |
//! | 1      | —                                | `u32` size  |
//! | 2      | `idx: u32`, `name: str`, `value: u32` | none   |

use std::io::{self, Read, Write};

/// Column names are short identifiers; anything longer is a framing error,
/// not a real request.
const MAX_NAME_LEN: u32 = 256;

#[derive(Debug, thiserror::Error)]
pub enum ClientWireError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown request opcode: {0}")]
    UnknownOpcode(u32),

    #[error("string length {0} exceeds limit")]
    StringTooLong(u32),

    #[error("string is not valid utf-8")]
    BadString,
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetColumn { idx: u32, name: String },
    TableSize,
    SetColumn { idx: u32, name: String, value: u32 },
}

pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32, ClientWireError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_string<R: Read>(reader: &mut R) -> Result<String, ClientWireError> {
    let len = read_u32(reader)?;
    if len > MAX_NAME_LEN {
        return Err(ClientWireError::StringTooLong(len));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| ClientWireError::BadString)
}

pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<(), ClientWireError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<(), ClientWireError> {
    write_u32(writer, value.len() as u32)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

/// Read one request off the stream.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request, ClientWireError> {
    match read_u32(reader)? {
        0 => {
            let idx = read_u32(reader)?;
            let name = read_string(reader)?;
            Ok(Request::GetColumn { idx, name })
        }
        1 => Ok(Request::TableSize),
        2 => {
            let idx = read_u32(reader)?;
            let name = read_string(reader)?;
            let value = read_u32(reader)?;
            Ok(Request::SetColumn { idx, name, value })
        }
        opcode => Err(ClientWireError::UnknownOpcode(opcode)),
    }
}

/// Encode a request. Used by clients and by the tests; the server only reads.
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<(), ClientWireError> {
    match request {
        Request::GetColumn { idx, name } => {
            write_u32(writer, 0)?;
            write_u32(writer, *idx)?;
            write_string(writer, name)?;
        }
        Request::TableSize => write_u32(writer, 1)?,
        Request::SetColumn { idx, name, value } => {
            write_u32(writer, 2)?;
            write_u32(writer, *idx)?;
            write_string(writer, name)?;
            write_u32(writer, *value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(request: Request) -> Request {
        let mut buf = Vec::new();
        write_request(&mut buf, &request).expect("encode");
        read_request(&mut Cursor::new(buf)).expect("decode")
    }

    #[test]
    fn get_column_roundtrip() {
        let request = Request::GetColumn { idx: 3, name: "nodeAddr".into() };
        assert_eq!(roundtrip(request.clone()), request);
    }

    #[test]
    fn table_size_roundtrip() {
        assert_eq!(roundtrip(Request::TableSize), Request::TableSize);
    }

    #[test]
    fn set_column_roundtrip() {
        let request = Request::SetColumn { idx: 0, name: "mgmtMode".into(), value: 7 };
        assert_eq!(roundtrip(request.clone()), request);
    }

    #[test]
    fn wire_layout_is_little_endian() {
        let mut buf = Vec::new();
        write_request(&mut buf, &Request::GetColumn { idx: 1, name: "ab".into() })
            .expect("encode");
        assert_eq!(buf, [0, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn rejects_unknown_opcode() {
        let buf = 9u32.to_le_bytes();
        assert!(matches!(
            read_request(&mut Cursor::new(buf.to_vec())),
            Err(ClientWireError::UnknownOpcode(9))
        ));
    }

    #[test]
    fn rejects_oversized_name() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0).expect("opcode");
        write_u32(&mut buf, 0).expect("idx");
        write_u32(&mut buf, 40_000).expect("len");
        assert!(matches!(
            read_request(&mut Cursor::new(buf)),
            Err(ClientWireError::StringTooLong(40_000))
        ));
    }

    #[test]
    fn truncated_request_is_io_error() {
        let buf = vec![0, 0];
        assert!(matches!(
            read_request(&mut Cursor::new(buf)),
            Err(ClientWireError::Io(_))
        ));
    }
}
