//! Concrete reader backends.
//!
//! Each hardware backend is behind its cargo feature so a build only links
//! the driver stacks available on the target OS.

#[cfg(feature = "hardware-pcsc")]
pub mod pcsc_reader;
#[cfg(feature = "hardware-serial")]
pub mod pn532;
pub mod pn532_frame;

#[cfg(feature = "hardware-pcsc")]
pub use self::pcsc_reader::{PcscConfig, PcscReader};
#[cfg(feature = "hardware-serial")]
pub use self::pn532::{Pn532Config, Pn532Reader};
