//! Explicit endpoint shutdown and multi-close aggregation.

use std::fs::File;
use std::io;
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::buffer::Buffer;
use crate::error::TransferError;
use crate::stream::Plain;

/// An endpoint that can be shut down before it is dropped.
pub trait Close {
    /// Shuts the endpoint down. Closing twice is not an error.
    fn close(&mut self) -> io::Result<()>;
}

fn shutdown_result(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}

impl Close for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        shutdown_result(self.shutdown(Shutdown::Both))
    }
}

#[cfg(unix)]
impl Close for UnixStream {
    fn close(&mut self) -> io::Result<()> {
        shutdown_result(self.shutdown(Shutdown::Both))
    }
}

impl Close for File {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for Buffer {
    fn close(&mut self) -> io::Result<()> {
        self.free();
        Ok(())
    }
}

impl<T: Close> Close for Plain<T> {
    fn close(&mut self) -> io::Result<()> {
        self.get_mut().close()
    }
}

impl<T: Close + ?Sized> Close for Box<T> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Closes every endpoint, continuing past failures.
///
/// Failures are deduplicated by message; a single distinct failure comes back
/// as itself, several as [`TransferError::Multi`].
pub fn close_all(endpoints: &mut [&mut dyn Close]) -> Result<(), TransferError> {
    let failures = endpoints
        .iter_mut()
        .filter_map(|endpoint| endpoint.close().err())
        .map(TransferError::from)
        .collect::<Vec<_>>();
    TransferError::join(failures).map_or(Ok(()), Err)
}
