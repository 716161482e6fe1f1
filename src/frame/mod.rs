//! Channel capture access
//!
//! [`format`] holds the frame and M-PDU layout, [`reader`] walks a capture
//! frame by frame and tracks the frame counter.

pub mod format;
pub mod reader;

pub use format::{
    FRAME_HEADER_SIZE, FRAME_SIZE, FrameHeader, MPDU_HEADER_SIZE, MpduHeader, NO_HEADER_POINTER,
    min_frame_size,
};
pub use reader::FrameReader;
