//! # mjstream — MJPEG streaming over an RTSP/RTP control-and-data split
//!
//! A Rust library for delivering Motion-JPEG frames from a server to a
//! client in real time: text control commands on TCP, RTP media
//! datagrams on UDP, and an application-level fragmentation layer for HD
//! frames that exceed the network MTU.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  Adapters (CLI binaries, embedding UIs)       │
//! ├───────────────────────────────────────────────┤
//! │  Server  — accept loop, per-client sessions   │
//! │  Client  — control mirror, display pipeline   │
//! ├───────────────────────────────────────────────┤
//! │  Protocol  — RTSP requests/replies, handler   │
//! │  Session   — state machine, stop signaling    │
//! │  Analytics — loss/latency/bitrate window      │
//! ├───────────────────────────────────────────────┤
//! │  Transport — TCP signaling, UDP media         │
//! │  Media     — RTP codec, fragmentation, MJPEG  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mjstream::{Client, Server, VideoSink};
//!
//! // Server side: listen for control connections.
//! let mut server = Server::new("0.0.0.0:8554");
//! server.start().unwrap();
//!
//! // Client side: hand completed frames to a renderer.
//! struct Printer;
//! impl VideoSink for Printer {
//!     fn on_frame(&self, frame: &[u8]) {
//!         println!("frame: {} bytes", frame.len());
//!     }
//! }
//!
//! let mut client =
//!     Client::connect("127.0.0.1", 8554, 25000, "movie.mjpeg", false, Arc::new(Printer))
//!         .unwrap();
//! client.setup().unwrap();
//! client.play().unwrap();
//! ```
//!
//! ## Crate layout
//!
//! - [`server`] — High-level [`Server`] orchestrator.
//! - [`client`] — [`Client`] control mirror and the [`VideoSink`] seam.
//! - [`protocol`] — RTSP request/reply parsing and the method handler.
//! - [`session`] — Session state machine and stop signaling.
//! - [`analytics`] — Rolling loss/latency/bitrate window and the
//!   adaptive-bitrate signal.
//! - [`media`] — RTP packet codec, frame fragmentation/reassembly, MJPEG
//!   frame extraction.
//! - [`transport`] — TCP control loop, UDP media sockets.
//! - [`config`] — [`StreamConfig`] tuning record.
//! - [`error`] — [`StreamError`] enum and [`Result`] alias.

pub mod analytics;
pub mod client;
pub mod config;
pub mod error;
pub mod media;
pub mod protocol;
mod pump;
pub mod server;
pub mod session;
pub mod transport;

pub use analytics::{AnalyticsSummary, AnalyticsWindow};
pub use client::{Client, VideoSink};
pub use config::StreamConfig;
pub use error::{Result, StreamError};
pub use server::Server;
pub use session::SessionState;
