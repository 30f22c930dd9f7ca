//! Shared frame buffer: a named segment the HUB writes and this side reads.

pub mod reader;
#[cfg(unix)]
pub mod writer;

pub use reader::{payload_of, FrameSource, SharedFrameBuffer};
#[cfg(unix)]
pub use writer::FrameBufferWriter;
