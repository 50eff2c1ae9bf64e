//! Base types and error handling.
//!
//! Provides foundational types mirroring Chromium's `net/base/`:
//! - [`NetError`]: Network error codes matching `net_error_list.h`
//! - [`ConnectState`]: Connect job states, after `load_states_list.h`
//!
//! [`NetError`]: neterror::NetError
//! [`ConnectState`]: loadstate::ConnectState

pub mod context;
pub mod loadstate;
pub mod neterror;

#[cfg(test)]
mod tests;
