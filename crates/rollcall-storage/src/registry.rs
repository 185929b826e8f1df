//! Tag registry: the durable tag → guest mapping.
//!
//! The registry is a single JSON document rewritten atomically on every
//! mutation, with a `.backup` copy kept next to it. A corrupt primary file
//! is recovered from the backup; the station keeps running in a degraded
//! state instead of refusing to start.
//!
//! ```text
//! {
//!   "version": 1,
//!   "tags": {
//!     "04A1B2C3": { "tag_uid": "04A1B2C3", "guest_id": "1001", "registered_at": "..." }
//!   }
//! }
//! ```

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::fs::{atomic_write, read_optional, sibling};
use crate::models::TagBinding;
use chrono::Utc;
use rollcall_core::constants::SCHEMA_VERSION;
use rollcall_core::{GuestId, TagUid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// On-disk registry document.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    version: u32,
    tags: BTreeMap<TagUid, TagBinding>,
}

/// Where the registry contents came from when it was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrySource {
    /// Primary file loaded normally.
    Primary,

    /// No registry on disk yet.
    Fresh,

    /// Primary missing or corrupt, restored from the backup copy.
    Backup,

    /// Primary and backup both unreadable; started empty with the damaged
    /// files set aside.
    Reset,
}

impl RegistrySource {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Backup | Self::Reset)
    }
}

/// Durable tag → guest mapping.
#[derive(Debug)]
pub struct TagRegistry {
    path: PathBuf,
    backup_path: PathBuf,
    tags: RwLock<BTreeMap<TagUid, TagBinding>>,
    source: RegistrySource,
}

impl TagRegistry {
    /// Open the registry of the configured data directory.
    pub async fn open(config: &StorageConfig) -> StorageResult<Self> {
        crate::fs::ensure_dir(config.data_dir()).await?;
        Self::open_path(config.registry_path()).await
    }

    /// Open the registry stored at `path`.
    ///
    /// # Errors
    ///
    /// Only I/O failures are errors; corrupt files are recovered.
    pub async fn open_path(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let backup_path = sibling(&path, ".backup");

        let (tags, source) = match load_file(&path).await {
            Ok(Some(tags)) => (tags, RegistrySource::Primary),
            Ok(None) => match load_file(&backup_path).await {
                Ok(Some(tags)) => {
                    warn!(path = %path.display(), "registry missing, restored from backup");
                    (tags, RegistrySource::Backup)
                }
                Ok(None) => (BTreeMap::new(), RegistrySource::Fresh),
                Err(backup_err) => {
                    error!(error = %backup_err, "registry missing and backup corrupt, starting empty");
                    set_aside(&backup_path).await?;
                    (BTreeMap::new(), RegistrySource::Reset)
                }
            },
            Err(primary_err) => {
                warn!(path = %path.display(), error = %primary_err, "registry corrupt");
                set_aside(&path).await?;

                match load_file(&backup_path).await {
                    Ok(Some(tags)) => {
                        warn!(tags = tags.len(), "registry restored from backup");
                        (tags, RegistrySource::Backup)
                    }
                    Ok(None) => {
                        error!("registry corrupt and no backup, starting empty");
                        (BTreeMap::new(), RegistrySource::Reset)
                    }
                    Err(backup_err) => {
                        error!(error = %backup_err, "registry backup corrupt too, starting empty");
                        set_aside(&backup_path).await?;
                        (BTreeMap::new(), RegistrySource::Reset)
                    }
                }
            }
        };

        let registry = Self {
            path,
            backup_path,
            tags: RwLock::new(tags),
            source,
        };

        if source.is_degraded() {
            let tags = registry.tags.read().await;
            registry.persist(&tags).await?;
        }

        debug!(path = %registry.path.display(), ?source, "registry opened");
        Ok(registry)
    }

    /// How the registry was loaded.
    pub fn source(&self) -> RegistrySource {
        self.source
    }

    /// Whether the registry had to be recovered at startup.
    pub fn is_degraded(&self) -> bool {
        self.source.is_degraded()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Guest bound to `tag_uid`.
    pub async fn lookup(&self, tag_uid: &TagUid) -> Option<GuestId> {
        self.tags
            .read()
            .await
            .get(tag_uid)
            .map(|b| b.guest_id.clone())
    }

    /// Full binding for `tag_uid`.
    pub async fn binding(&self, tag_uid: &TagUid) -> Option<TagBinding> {
        self.tags.read().await.get(tag_uid).cloned()
    }

    /// The live tag held by `guest_id`, if any. A guest holds at most one.
    pub async fn tag_for(&self, guest_id: &GuestId) -> Option<TagUid> {
        bound_tag(&*self.tags.read().await, guest_id)
    }

    /// All bindings ordered by tag UID.
    pub async fn all(&self) -> Vec<TagBinding> {
        self.tags.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.tags.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tags.read().await.is_empty()
    }

    /// Bind `tag_uid` to `guest_id`.
    ///
    /// Registering a tag again for the same guest is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRegistered` with the current guest if the tag is
    /// bound to someone else, and `GuestAlreadyBound` if the guest already
    /// holds another tag. Either way the registry is left untouched.
    pub async fn register(&self, tag_uid: TagUid, guest_id: GuestId) -> StorageResult<TagBinding> {
        let mut tags = self.tags.write().await;

        if let Some(existing) = tags.get(&tag_uid) {
            if existing.is_bound_to(&guest_id) {
                return Ok(existing.clone());
            }
            warn!(tag_uid = %tag_uid, existing = %existing.guest_id, requested = %guest_id,
                "refusing to reassign registered tag");
            return Err(StorageError::AlreadyRegistered {
                tag_uid,
                existing: existing.guest_id.clone(),
            });
        }

        if let Some(existing_tag) = bound_tag(&tags, &guest_id) {
            warn!(guest_id = %guest_id, existing_tag = %existing_tag, requested = %tag_uid,
                "refusing second tag for guest");
            return Err(StorageError::GuestAlreadyBound {
                guest_id,
                existing_tag,
            });
        }

        let binding = TagBinding::new(tag_uid.clone(), guest_id, Utc::now());
        let mut next = tags.clone();
        next.insert(tag_uid, binding.clone());
        self.persist(&next).await?;
        *tags = next;

        info!(tag_uid = %binding.tag_uid, guest_id = %binding.guest_id, "tag registered");
        Ok(binding)
    }

    /// Bind `tag_uid` to `guest_id`, replacing any existing binding.
    ///
    /// Any other tag the guest held is unbound in the same snapshot, so the
    /// guest never holds two live tags. Returns the previously bound guest.
    pub async fn rewrite(&self, tag_uid: TagUid, guest_id: GuestId) -> StorageResult<Option<GuestId>> {
        let mut tags = self.tags.write().await;

        let binding = TagBinding::new(tag_uid.clone(), guest_id, Utc::now());
        let mut next = tags.clone();
        let released = bound_tag(&next, &binding.guest_id).filter(|uid| uid != &tag_uid);
        if let Some(old) = &released {
            next.remove(old);
        }
        let previous = next.insert(tag_uid, binding.clone()).map(|b| b.guest_id);
        self.persist(&next).await?;
        *tags = next;

        info!(tag_uid = %binding.tag_uid, guest_id = %binding.guest_id,
            previous = ?previous.as_ref().map(GuestId::as_str),
            released = ?released.as_ref().map(TagUid::as_str), "tag rewritten");
        Ok(previous)
    }

    /// Remove the binding of `tag_uid`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tag is not registered.
    pub async fn erase(&self, tag_uid: &TagUid) -> StorageResult<TagBinding> {
        let mut tags = self.tags.write().await;

        let mut next = tags.clone();
        let removed = next
            .remove(tag_uid)
            .ok_or_else(|| StorageError::not_found("tag", "uid", tag_uid))?;
        self.persist(&next).await?;
        *tags = next;

        info!(tag_uid = %tag_uid, guest_id = %removed.guest_id, "tag erased");
        Ok(removed)
    }

    async fn persist(&self, tags: &BTreeMap<TagUid, TagBinding>) -> StorageResult<()> {
        let file = RegistryFile {
            version: SCHEMA_VERSION,
            tags: tags.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        atomic_write(&self.path, &bytes).await?;
        atomic_write(&self.backup_path, &bytes).await
    }
}

fn bound_tag(tags: &BTreeMap<TagUid, TagBinding>, guest_id: &GuestId) -> Option<TagUid> {
    tags.values()
        .find(|b| b.is_bound_to(guest_id))
        .map(|b| b.tag_uid.clone())
}

async fn load_file(path: &Path) -> StorageResult<Option<BTreeMap<TagUid, TagBinding>>> {
    let Some(bytes) = read_optional(path).await? else {
        return Ok(None);
    };

    let file: RegistryFile = serde_json::from_slice(&bytes)
        .map_err(|e| StorageError::corrupt(path, e.to_string()))?;

    if file.version > SCHEMA_VERSION {
        return Err(StorageError::corrupt(
            path,
            format!("unsupported registry version {}", file.version),
        ));
    }

    for (key, binding) in &file.tags {
        if key != &binding.tag_uid {
            return Err(StorageError::corrupt(
                path,
                format!("entry {key} holds binding for {}", binding.tag_uid),
            ));
        }
    }

    Ok(Some(file.tags))
}

/// Move a damaged file out of the way so the next write cannot clobber it.
async fn set_aside(path: &Path) -> StorageResult<()> {
    let target = sibling(path, &format!(".corrupt-{}", Utc::now().format("%Y%m%d%H%M%S")));
    match tokio::fs::rename(path, &target).await {
        Ok(()) => {
            warn!(from = %path.display(), to = %target.display(), "damaged registry file set aside");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
