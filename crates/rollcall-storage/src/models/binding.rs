use chrono::{DateTime, Utc};
use rollcall_core::{GuestId, TagUid};
use serde::{Deserialize, Serialize};

/// Binding of a physical tag to a guest
///
/// A tag has at most one binding. Changing the guest of a bound tag goes
/// through an explicit rewrite; registration alone never reassigns it.
///
/// # Examples
///
/// ```
/// use rollcall_storage::models::TagBinding;
/// use rollcall_core::{GuestId, TagUid};
/// use chrono::Utc;
///
/// let binding = TagBinding::new(TagUid::new("04A1").unwrap(), GuestId::from(1001), Utc::now());
/// assert!(binding.is_bound_to(&GuestId::from(1001)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagBinding {
    /// Hardware UID of the tag
    pub tag_uid: TagUid,

    /// Guest the tag identifies
    pub guest_id: GuestId,

    /// When the binding was created or last rewritten
    pub registered_at: DateTime<Utc>,
}

impl TagBinding {
    pub fn new(tag_uid: TagUid, guest_id: GuestId, registered_at: DateTime<Utc>) -> Self {
        Self {
            tag_uid,
            guest_id,
            registered_at,
        }
    }

    pub fn is_bound_to(&self, guest_id: &GuestId) -> bool {
        &self.guest_id == guest_id
    }
}
