//! Remote guest directory access for rollcall
//!
//! The guest directory is the spreadsheet shared by every station. This
//! crate defines the narrow interface the sync coordinator needs
//! ([`GuestDirectory`]) and its implementations:
//!
//! - **SheetClient**: JSON-over-HTTP client with request pacing
//! - **MemoryDirectory**: in-process table with fault injection
//! - **AnyDirectory**: runtime choice between the two
//!
//! # Example
//!
//! ```no_run
//! use rollcall_network::{DirectoryConfig, GuestDirectory, SheetClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SheetClient::new(DirectoryConfig::new("https://sheets.example.org/event"))?;
//! client.ping().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod directory;
mod error;
mod memory;
mod rate_limit;

pub use client::SheetClient;
pub use config::DirectoryConfig;
pub use directory::{AnyDirectory, CellStatus, GuestDirectory};
pub use error::{DirectoryError, DirectoryResult};
pub use memory::MemoryDirectory;
pub use rate_limit::RateLimiter;
