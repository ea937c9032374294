//! # regmap-core – Register/field abstraction for bus-attached devices
//!
//! This crate provides:
//! - **Field maps**: flexible tables describing named bitfields in device registers
//! - **Device context**: a software register image plus a pluggable bus [`Transport`]
//! - **Field codec**: packing and unpacking of values that span several registers
//! - **Consistency checker**: proves a map has no overlaps or half-covered registers
//! - **Virtual devices**: a larger name space multiplexed over reloadable maps
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Application                         │
//! │            set("MODE", 0x3)   get("MODE")                │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │         VirtualDevice (optional map multiplexer)         │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │        Device: field lookup → codec → buffer             │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┬─────────────┐
//!         ▼             ▼             ▼             ▼
//!   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐
//!   │   SPI   │  │   I2C   │  │  MMIO   │  │ MemTran │
//!   │  glue   │  │  glue   │  │ window  │  │  sport  │
//!   └─────────┘  └─────────┘  └─────────┘  └─────────┘
//! ```
//!
//! # Usage
//!
//! Define the register map with only the fields the application needs (even
//! if the underlying device has more), build a device over a transport, and
//! certify the map once with [`Device::check`]:
//!
//! ```rust
//! use regmap_core::{Device, Field, FieldMap, Flags, MemTransport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! static DEV_MAP: &[Field] = &[
//!     //         name    reg offs width flags
//!     Field::new("EN_X",  0,  0,   1,   Flags::empty()),
//!     Field::new("FTW",   0,  1,   36,  Flags::empty()),
//!     Field::new("MODE",  1,  5,   27,  Flags::empty()),
//!     // registers 2..=4 unused
//!     Field::new("SETP",  5,  0,   32,  Flags::empty()),
//! ];
//!
//! let mut dev = Device::new(32, 6, FieldMap::new(DEV_MAP), MemTransport::new(6))?;
//! dev.check()?;
//!
//! // update the buffer and write the touched registers to the device
//! dev.set("MODE", 0x03)?;
//!
//! // served from the buffer (set the VOLATILE flag to force re-reads)
//! assert_eq!(dev.get("MODE")?, 0x03);
//! # Ok(())
//! # }
//! ```

pub mod bits;
pub mod device;
pub mod error;
pub mod field;
pub mod map;
pub mod transport;
pub mod virt;

mod check;
mod codec;


// Re-export public API
pub use bits::{cdiv, fits, mask32, mask64};
pub use device::Device;
pub use error::{RegmapError, Result};
pub use field::{Field, Flags};
pub use map::FieldMap;
pub use transport::{BusOp, DeviceLock, MemTransport, MutexLock, Transport};
pub use virt::{MapLoader, VirtualDevice};
