//! Wire protocol subsystem.
//!
//! # Frame Layout
//! ```text
//! +---------+--------+---------+-----------+-------------+-------------+
//! | version | status | typeLen | bodyLen   | targetLen   | methodLen   |
//! | u8      | u8     | u8      | u64 LE    | u64 LE      | u64 LE      |
//! +---------+--------+---------+-----------+-------------+-------------+
//! | type bytes | body bytes | target bytes | method bytes              |
//! +------------+------------+--------------+---------------------------+
//! ```
//!
//! # Design Decisions
//! - Header is fixed-width (27 bytes); every payload field is sliced by its
//!   own declared length, never by "whatever is left"
//! - Frame size validated BEFORE payload allocation
//! - One frame in, one frame out per connection

pub mod codec;
pub mod message;

pub use codec::{read_frame, write_frame, FrameError, HEADER_LEN};
pub use message::{Message, StatusCode, PROTOCOL_VERSION};
