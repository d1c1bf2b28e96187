//! BLE UART link simulated over a local TCP socket.
//!
//! One client at a time plays the phone. Connecting is the equivalent of a
//! central subscribing to notifications; writes with no client attached are
//! dropped like notifications nobody listens to.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info};

use crate::error::TransportError;
use crate::{ByteChannel, TransportKind};

pub struct TcpChannel {
    listener: TcpListener,
    client: Option<(TcpStream, SocketAddr)>,
}

impl TcpChannel {
    pub fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        info!("BLE link listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            client: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    fn accept(&mut self) -> Result<(), TransportError> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(true)?;
                stream.set_nodelay(true)?;
                info!("BLE client connected: {peer}");
                self.client = Some((stream, peer));
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn drop_client(&mut self) {
        if let Some((_, peer)) = self.client.take() {
            info!("BLE client disconnected: {peer}");
        }
    }
}

impl ByteChannel for TcpChannel {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.client.is_none() {
            self.accept()?;
        }
        let Some((stream, _)) = self.client.as_mut() else {
            return Ok(0);
        };
        match stream.read(buf) {
            Ok(0) => {
                self.drop_client();
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => {
                debug!("BLE client read failed: {e}");
                self.drop_client();
                Ok(0)
            }
        }
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let Some((stream, _)) = self.client.as_mut() else {
            debug!("No BLE client, dropping {} byte notification", data.len());
            return Ok(());
        };
        if let Err(e) = stream.write_all(data) {
            debug!("BLE client write failed: {e}");
            self.drop_client();
        }
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Ble
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}
