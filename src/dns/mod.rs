//! DNS Resolution Module
//!
//! Turns host names into the candidate addresses a connect race runs over:
//! - System resolver (getaddrinfo via thread pool)
//! - Async hickory-dns resolver
//! - Hostname-to-IP override mechanism
//!
//! The [`Resolve`] trait is the seam: the host connector only depends on it,
//! so resolvers can be swapped or mocked freely.
//!
//! # Example
//!
//! ```rust,ignore
//! use racenet::dns::{candidates, GaiResolver};
//!
//! let addrs = candidates(&GaiResolver::new(), "example.com", 443, None).await?;
//! for addr in addrs {
//!     println!("Candidate: {}", addr);
//! }
//! ```

mod gai;
mod hickory;
mod resolve;

pub use gai::{GaiResolver, SocketAddrs};
pub use hickory::HickoryResolver;
pub use resolve::{candidates, Addrs, DnsResolverWithOverrides, Name, Resolve, Resolving};
