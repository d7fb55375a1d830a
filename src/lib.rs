//! ttrelay Core Library
//!
//! This library relays short-form videos into a chat: it finds video
//! references in text, fetches each video through an ordered chain of
//! providers, re-encodes small files for compatibility, uploads the result
//! with a thumbnail and deletes the scratch files afterwards.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`parser`] - Reference resolution from free text
//! - [`fetch`] - Provider chain (tikwm, then yt-dlp)
//! - [`media`] - Probe, transcode policy and thumbnails via external tools
//! - [`delivery`] - Upload with bounded retry and progress updates
//! - [`cleanup`] - Deferred deletion of scratch files
//! - [`pipeline`] - Per-message orchestration
//! - [`config`] - Configuration file loading

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cleanup;
pub mod config;
pub mod delivery;
pub mod fetch;
pub mod http_client;
pub mod media;
pub mod parser;
pub mod pipeline;
pub mod process;
mod user_agent;

// Re-export commonly used types
pub use cleanup::{CleanupScheduler, CleanupTaskId};
pub use config::{ConfigError, RelayConfig};
pub use delivery::{
    DeliveryError, DeliveryRetryPolicy, DeliveryTransport, DeliveryUploader, Destination,
    ProgressHandle, TelegramTransport, TransportError, VideoAttachment,
};
pub use fetch::{
    FetchError, Fetched, FetchedMedia, MediaFetcher, MediaProvider, ProviderError, ProviderTag,
};
pub use media::{FfmpegTools, MediaError, MediaMetadata, MediaTools, TranscodePolicy};
pub use parser::{MediaReference, ResolutionError, resolve_references, resolve_required};
pub use pipeline::{LinkReport, Notice, PipelineError, RelayPipeline, RelaySummary};
pub use process::{ProcessError, ProcessRunner};
