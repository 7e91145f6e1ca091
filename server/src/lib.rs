//! # Whack-a-Mole Server Library
//!
//! This library provides the authoritative server for the multiplayer
//! whack-a-mole arena. Players connect over TCP, the server runs timed rounds,
//! pops moles on a 3×3 board, judges every hit and broadcasts the results.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Scoring
//! Clients only claim hits. The server checks each claim against the live
//! mole and the time it appeared, awards or deducts points, and broadcasts
//! the full score table after every judged hit.
//!
//! ### Round Lifecycle
//! A round goes `Idle → Running → Idle`. When the round timer runs out with
//! two or more players tied on a positive score, an overtime sub-round
//! between the tied players decides the winner.
//!
//! ### Player Management
//! Names are unique among connected players. Disconnects, whether graceful
//! or caused by a dead socket, remove the player everywhere and may end the
//! round early.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! Connection readers and writers, the spawn chain, the round timer and the
//! operator console never touch game state themselves. They send
//! [`network::ServerMessage`]s to one event loop that owns the registry and
//! the round, so every transition is applied in order.
//!
//! ### Generation-Tagged Timers
//! Each spawn tick and expiry carries the generation of the phase that
//! scheduled it. Starting, stopping and entering overtime bump the
//! generation, so late timers from an earlier phase are ignored.
//!
//! ## Module Organization
//!
//! - `config`: round lengths, cadences and the hit window
//! - `registry`: connected players and broadcast fan-out
//! - `scheduler`: jittered spawn chain and the round timer
//! - `game`: the round state machine and scoring rules
//! - `network`: TCP handling, the event loop and [`network::ServerHandle`]
//! - `console`: stdin operator commands
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!     let handle = server.handle();
//!
//!     tokio::spawn(async move {
//!         // Starts once at least one player is connected
//!         let _ = handle.start_round().await;
//!     });
//!
//!     server.run().await
//! }
//! ```

pub mod config;
pub mod console;
pub mod game;
pub mod network;
pub mod registry;
pub mod scheduler;
pub mod utils;
