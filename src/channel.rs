//! channel.rs
//!
//! Byte-level request/response channels to a meter, and the resource
//! finders used to enumerate them.
//!
//! A channel only moves text. Line terminators, SCPI timing and error
//! containment are the session's business (see [`crate::meter`]).

pub mod debug;
mod serial;
#[cfg(feature = "visa")]
pub mod visa;

pub use serial::{SerialChannel, SerialFinder, is_thorlabs_port};

use crate::{PmResult, SessionConfig};

/// A half-duplex text channel to one instrument.
///
/// Implementors own their transport handle and release it in `Drop`.
pub trait ScpiChannel {
    /// Send one command. The implementation appends the line terminator.
    fn write_raw(&mut self, command : &str) -> PmResult<()>;

    /// Read at most `max_size` bytes of the next response, untrimmed.
    fn read_raw(&mut self, max_size : usize) -> PmResult<String>;

    /// Revision of the software stack behind this channel.
    fn driver_revision(&mut self) -> PmResult<String> {
        Ok(format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")))
    }
}

impl<C : ScpiChannel + ?Sized> ScpiChannel for Box<C> {
    fn write_raw(&mut self, command : &str) -> PmResult<()> {
        (**self).write_raw(command)
    }

    fn read_raw(&mut self, max_size : usize) -> PmResult<String> {
        (**self).read_raw(max_size)
    }

    fn driver_revision(&mut self) -> PmResult<String> {
        (**self).driver_revision()
    }
}

/// Channels that can be opened from a resource identifier alone.
pub trait OpenChannel : ScpiChannel + Sized {
    /// Open the channel. This is the one failure a session cannot absorb.
    fn open(resource_id : &str, config : &SessionConfig) -> PmResult<Self>;
}

/// Enumerates connectable instruments: `find` once, then ask for each
/// name by index.
pub trait ResourceFinder {
    fn find(&mut self) -> PmResult<u32>;

    fn resource_name(&mut self, index : u32) -> PmResult<String>;
}
