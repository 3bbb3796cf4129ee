//! Bluetooth serial connections and motor control for LEGO NXT bricks.
//!
//! nxtspp opens an RFCOMM serial-port link to a brick, keeps it served by
//! background reader and writer tasks, and encodes motor updates as NXT
//! SETOUTPUTSTATE direct commands.
//!
//! # Crate Structure
//!
//! - [`transport`]: Device addresses, byte streams and connectors (RFCOMM on Linux)
//! - [`command`]: Pure motor-command encoding
//! - [`client`]: Connection manager and motor controller (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use nxtspp_transport::*;
}

/// Re-export command types.
pub mod command {
    pub use nxtspp_command::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use nxtspp_client::*;
}
