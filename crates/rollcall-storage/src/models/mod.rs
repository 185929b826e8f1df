pub mod binding;
pub mod check_in;

pub use binding::TagBinding;
pub use check_in::{CheckInEntry, SyncState};
