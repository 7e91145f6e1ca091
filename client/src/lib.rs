//! # Whack-a-Mole Client Library
//!
//! A line-oriented terminal client for the whack-a-mole arena. It registers a
//! player name over TCP, prints every server event as a status line and turns
//! typed coordinates into timestamped hit claims.
//!
//! ## Architecture Overview
//!
//! The server is authoritative for everything: mole positions, scores and the
//! round lifecycle. The client keeps a read-only mirror of that state so it
//! can tell the player what is happening and refuse obviously pointless input
//! (hits between rounds, or in an overtime the player is not part of).
//!
//! ### Hit Timestamps
//! Each hit carries the wall-clock time in milliseconds at which it was typed.
//! The server compares that time against the mole's spawn time, so a slow
//! link does not cost the player points.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! [`game::ClientGameState`] applies server events and renders them as text.
//!
//! ### Input Module (`input`)
//! Parses `hit <x> <y>`, bare `<x> <y>`, `help` and `quit` from stdin.
//!
//! ### Network Module (`network`)
//! [`network::Client`] owns the TCP connection, performs the name handshake
//! and runs the interactive loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), client::network::ClientError> {
//!     let mut client = Client::connect("127.0.0.1:12345", "alice").await?;
//!
//!     while let Some(event) = client.next_event().await? {
//!         println!("{}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
