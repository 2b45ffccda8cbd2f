//! Shared data models for the tubelens acquisition layer.
//!
//! This crate provides Serde-serializable types for:
//! - Content identifiers (YouTube video ids)
//! - Chat conversations sent to completion providers
//! - Completion provider descriptors
//! - Caption tracks and normalized transcript segments
//! - An injectable clock for TTL and cooldown arithmetic

pub mod caption;
pub mod chat;
pub mod clock;
pub mod provider;
pub mod video_id;

// Re-export common types
pub use caption::{CaptionTrack, TrackKind, Transcript, TranscriptProvider, TranscriptSegment};
pub use chat::{ChatMessage, ChatRole};
pub use clock::{Clock, ManualClock, SystemClock};
pub use provider::ProviderDescriptor;
pub use video_id::{VideoId, VideoIdError};
