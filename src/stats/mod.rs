//! Monitor statistics transformer.
//!
//! Turns raw Uptime Kuma payloads into flat, fully-populated statistics.
//! Pure and synchronous: everything here works on values handed in by the
//! caller and never touches the network, the clock or a cache.

mod certificate;
mod fleet;
mod heartbeat;
mod instance;
mod monitor;
mod normalize;
mod raw;
mod sentinel;
mod uptime;

pub use certificate::*;
pub use fleet::*;
pub use heartbeat::*;
pub use instance::*;
pub use monitor::*;
pub use normalize::*;
pub use raw::{MonitorBundle, RawCertDetails, RawCertInfo, RawHeartbeat, RawMonitor, RawNames};
pub use sentinel::{round_to, Dashed, MISSING};
pub use uptime::*;
