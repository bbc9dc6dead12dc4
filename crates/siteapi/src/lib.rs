//! # siteapi
//!
//! HTTP transport for the [`reconcile`] engine.
//!
//! This crate provides:
//! - [`HttpRequester`], a [`reconcile::Requester`] over a blocking `ureq`
//!   agent, run on tokio's blocking pool
//! - Bearer-token authentication and a global request timeout
//! - Categorized errors ([`ErrorCategory`]) with user-facing advice
//!
//! ## Example
//!
//! ```no_run
//! use siteapi::{HttpRequester, SiteConfig};
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let requester = HttpRequester::new(
//!     SiteConfig::new("https://example.com/api")
//!         .token("secret")
//!         .timeout(Duration::from_secs(10)),
//! )?;
//! let pages = reconcile::fetch_live_pages(&requester).await?;
//! println!("{} pages on the site", pages.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;

pub use client::{DEFAULT_TIMEOUT, HttpRequester, SiteConfig};
pub use error::{Error, ErrorCategory, Result};
