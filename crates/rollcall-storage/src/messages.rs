//! Status messages shown to the station operator
//!
//! Fixed texts are constants; messages that name a guest or a count are
//! built by the helper functions so the wording stays in one place.
//!
//! # Usage
//!
//! ```
//! use rollcall_storage::messages::StatusMessages;
//!
//! assert_eq!(StatusMessages::welcome("Ada"), "Welcome, Ada");
//! assert_eq!(StatusMessages::UNKNOWN_TAG, "Tag not registered");
//! ```

/// Operator-facing status texts
///
/// Messages are short enough for a single status bar line.
pub struct StatusMessages;

impl StatusMessages {
    /// Scanned tag has no registry binding
    pub const UNKNOWN_TAG: &'static str = "Tag not registered";

    /// Same guest scanned again within the debounce window
    pub const ALREADY_CHECKED_IN: &'static str = "Already checked in";

    /// Registry loaded from its backup copy
    pub const REGISTRY_RECOVERED: &'static str = "Tag registry recovered from backup";

    /// Registry and backup unreadable, started empty
    pub const REGISTRY_RESET: &'static str = "Tag registry unreadable, started empty";

    /// Tag write attempted while the reader is disconnected
    pub const READER_NOT_READY: &'static str = "Reader not connected";

    /// Remote directory unreachable, entries stay queued
    pub const OFFLINE: &'static str = "Offline, check-ins queued";

    /// Directory reachable again after being offline
    pub const BACK_ONLINE: &'static str = "Back online, syncing";

    /// Tag binding removed
    pub const TAG_ERASED: &'static str = "Tag erased";

    pub fn welcome(name: &str) -> String {
        format!("Welcome, {name}")
    }

    pub fn marked_absent(name: &str, station: &str) -> String {
        format!("{name} marked absent at {station}")
    }

    pub fn tag_registered(name: &str) -> String {
        format!("Tag registered to {name}")
    }

    pub fn tag_taken(guest: &str) -> String {
        format!("Tag already belongs to {guest}")
    }

    pub fn guest_has_tag(guest: &str) -> String {
        format!("{guest} already has a tag")
    }

    pub fn synced(count: usize) -> String {
        format!("Synced {count} check-in(s)")
    }

    pub fn pending(count: usize) -> String {
        format!("{count} check-in(s) waiting to sync")
    }

    pub fn queue_cleared(count: usize) -> String {
        format!("Cleared {count} queued check-in(s)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_messages_are_non_empty() {
        assert!(!StatusMessages::UNKNOWN_TAG.is_empty());
        assert!(!StatusMessages::ALREADY_CHECKED_IN.is_empty());
        assert!(!StatusMessages::REGISTRY_RECOVERED.is_empty());
        assert!(!StatusMessages::REGISTRY_RESET.is_empty());
        assert!(!StatusMessages::READER_NOT_READY.is_empty());
        assert!(!StatusMessages::OFFLINE.is_empty());
        assert!(!StatusMessages::BACK_ONLINE.is_empty());
        assert!(!StatusMessages::TAG_ERASED.is_empty());
    }

    #[test]
    fn test_formatted_messages() {
        assert_eq!(StatusMessages::synced(3), "Synced 3 check-in(s)");
        assert_eq!(
            StatusMessages::marked_absent("Ada", "Dinner"),
            "Ada marked absent at Dinner"
        );
        assert_eq!(StatusMessages::guest_has_tag("Ada"), "Ada already has a tag");
    }
}
