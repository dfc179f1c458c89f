//! Driver layer for remote browser sessions.
//!
//! - [`remote::driver::RemoteDriver`]: WebDriver client wrapper bound to one session
//! - [`remote::cdp::CdpCommand`]: Chromium DevTools commands tunnelled over WebDriver
//! - [`remote::cdp::ChallengeStatus`]: outcome of an anti-automation challenge wait
pub mod remote;
