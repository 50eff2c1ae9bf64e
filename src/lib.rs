//! # racenet
//!
//! Cancellable, race-based connection establishment for Rust.
//!
//! `racenet` connects to a named host by resolving it into candidate
//! addresses, connecting to all of them at once and keeping whichever
//! connects first. The losers are aborted, and a single cancel signal can stop
//! the whole operation at any point.
//!
//! ## Features
//!
//! - **Connect racing**: first candidate to connect wins, the rest are closed
//! - **Cooperative cancellation**: one [`CancelSignal`] reaches every attempt
//! - **Pluggable DNS**: system resolver, hickory-dns, or per-host overrides
//! - **TLS**: optional BoringSSL handshake over the winning connection
//! - **Reusable primitives**: [`RaceCoordinator`] and [`WaitSlot`] work on
//!   their own
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use racenet::socket::connect_to_host;
//! use racenet::sync::CancelSignal;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cancel = CancelSignal::new();
//!     let _timer = cancel.fire_after(Duration::from_secs(10));
//!     let conn = connect_to_host("example.com", "80", &cancel).await.unwrap();
//!     println!("Connected to {:?}", conn.peer_addr());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Core types and error definitions
//! - [`dns`] - Host resolution into candidate addresses
//! - [`socket`] - Connect jobs, attempts, transports and TLS
//! - [`sync`] - Wait slot, cancel signal and race coordinator
//!
//! [`CancelSignal`]: sync::CancelSignal
//! [`RaceCoordinator`]: sync::RaceCoordinator
//! [`WaitSlot`]: sync::WaitSlot

pub mod base;
pub mod dns;
pub mod socket;
pub mod sync;
