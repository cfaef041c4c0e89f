//! Request framing over client connections.
//!
//! ```text
//!   Connection ──▶ InputBuffer ──lines──▶ Store/Query
//!                                             │ rendered bytes
//!   Connection ◀── OutputBuffer ◀─────────────┘
//! ```

pub mod channel;
pub mod input_buffer;
pub mod memory;
pub mod output_buffer;

pub use channel::{Channel, Connection};
pub use input_buffer::{InputBuffer, RequestResult};
pub use memory::MemoryChannel;
pub use output_buffer::{OutputBuffer, ResponseHeader};
