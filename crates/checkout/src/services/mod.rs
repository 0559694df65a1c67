//! External collaborators used by the fan-out, each with an in-memory
//! implementation for tests.

pub mod conversion;
pub mod fraud;
pub mod realtime;

pub use conversion::{
    ConversionEvent, ConversionTracker, HttpConversionTracker, InMemoryConversionTracker,
};
pub use fraud::{FraudScoreService, HttpFraudScoreService, InMemoryFraudScoreService};
pub use realtime::{
    BroadcastRealtimeChannel, InMemoryRealtimeChannel, RealtimeChannel, RealtimeMessage,
};

/// Shortens a response body for error messages.
pub(crate) fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}
