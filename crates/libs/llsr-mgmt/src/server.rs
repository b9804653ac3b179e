//! Stream-socket server for the external management client.
//!
//! The sink polls this once per control tick. `poll()` never blocks waiting
//! for a client: the listener is non-blocking, and an accepted connection is
//! served one request and closed, with a short read timeout so a stalled
//! client cannot hold the MAC lock open-endedly.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::time::Duration;

use crate::table::{Column, MonitorTable};
use crate::wire::{read_request, write_string, write_u32, ClientWireError, Request};

const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Where the server listens, per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Local stream socket, the default deployment.
    Unix(PathBuf),
    /// TCP, for deployments where the client runs off-host.
    Tcp(SocketAddr),
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::Unix(PathBuf::from("/tmp/udscommunicate"))
    }
}

enum Listener {
    Unix(UnixListener),
    Tcp(TcpListener),
}

pub struct ManagerServer {
    listener: Listener,
}

impl ManagerServer {
    pub fn bind(endpoint: &Endpoint) -> io::Result<Self> {
        let listener = match endpoint {
            Endpoint::Unix(path) => {
                // a stale socket file from a previous run blocks the bind
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
                let listener = UnixListener::bind(path)?;
                listener.set_nonblocking(true)?;
                Listener::Unix(listener)
            }
            Endpoint::Tcp(addr) => {
                let listener = TcpListener::bind(addr)?;
                listener.set_nonblocking(true)?;
                Listener::Tcp(listener)
            }
        };
        Ok(Self { listener })
    }

    /// Accept and serve at most one pending request.
    pub fn poll(&self, table: &mut MonitorTable) {
        match &self.listener {
            Listener::Unix(listener) => match listener.accept() {
                Ok((stream, _)) => {
                    if let Err(err) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
                        log::warn!("mgmt: cannot set client read timeout: {err}");
                        return;
                    }
                    Self::serve(stream, table);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => log::warn!("mgmt: accept failed: {err}"),
            },
            Listener::Tcp(listener) => match listener.accept() {
                Ok((stream, _)) => {
                    if let Err(err) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
                        log::warn!("mgmt: cannot set client read timeout: {err}");
                        return;
                    }
                    Self::serve(stream, table);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => log::warn!("mgmt: accept failed: {err}"),
            },
        }
    }

    fn serve<S: Read + Write>(mut stream: S, table: &mut MonitorTable) {
        if let Err(err) = Self::handle(&mut stream, table) {
            // unknown opcodes and framing errors close the connection
            // without a reply
            log::warn!("mgmt: client request failed: {err}");
        }
    }

    fn handle<S: Read + Write>(
        stream: &mut S,
        table: &mut MonitorTable,
    ) -> Result<(), ClientWireError> {
        match read_request(stream)? {
            Request::GetColumn { idx, name } => {
                let value = match Column::from_name(&name) {
                    Some(column) => match table.get(idx as usize, column) {
                        Ok(value) => value,
                        Err(err) => {
                            log::warn!("mgmt: get({idx}, {name}) failed: {err}");
                            "error".to_string()
                        }
                    },
                    None => {
                        log::warn!("mgmt: get({idx}, {name}): unknown column");
                        "error".to_string()
                    }
                };
                write_string(stream, &value)
            }
            Request::TableSize => write_u32(stream, table.size()),
            Request::SetColumn { idx, name, value } => {
                match Column::from_name(&name) {
                    Some(column) => {
                        if let Err(err) = table.set(idx as usize, column, value) {
                            log::warn!("mgmt: set({idx}, {name}, {value}) failed: {err}");
                        }
                    }
                    None => log::warn!("mgmt: set({idx}, {name}): unknown column"),
                }
                Ok(())
            }
        }
    }
}
