pub mod client_audio;
pub mod db;
pub mod notices;
pub mod resilient;

pub use client_audio::ClientAudio;
pub use db::DbAdapter;
pub use notices::BroadcastNotices;
pub use resilient::{ResilientStore, RetryConfig};
