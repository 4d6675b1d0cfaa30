//! # lovefinder-core
//!
//! Client protocol of Lovefinder: likes and skips, mutual-like matching
//! with chat-session bootstrap, chat, account eradication, and the
//! discovery, profile and navigation features around them.
//!
//! [`Lovefinder`] is the entry point for a UI layer. The modules below it
//! are usable directly against any [`lovefinder_store::DocumentStore`].

pub mod auth;
pub mod chat;
pub mod client;
pub mod config;
pub mod discovery;
pub mod eradication;
pub mod error;
pub mod events;
pub mod likes;
pub mod matching;
pub mod models;
pub mod nav;
pub mod overview;
pub mod paths;
pub mod profile;
pub mod subscription;
pub mod telemetry;

pub use chat::{ChatSubscription, ChatView};
pub use client::Lovefinder;
pub use config::ClientConfig;
pub use eradication::{EradicationReport, EradicationStep};
pub use error::{ClientError, Result};
pub use events::ClientEvent;
pub use matching::MatchOutcome;
pub use models::{
    Candidate, ChatMessage, GenderFilter, MatchSummary, MessagePayload, NavCounters, Profile,
    UserDocument,
};
pub use nav::NavWatcher;
pub use overview::MatchesWatcher;
pub use telemetry::init_tracing;
