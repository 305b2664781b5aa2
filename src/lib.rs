pub mod bus;
pub mod capture;
pub mod chargepoint;
pub mod clock;
pub mod error;
pub mod frame;
pub mod message;
pub mod packet;

pub use chargepoint::{ChargePoint, CpConfig, InitPhase};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{HomelineError, Result};
pub use packet::Packet;
