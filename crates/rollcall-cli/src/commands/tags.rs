use anyhow::{Context, Result, bail};
use rollcall_core::{GuestId, StatusBus, TagUid};
use rollcall_station::StationError;
use rollcall_storage::{AppendOutcome, StorageError};

use super::{ReaderMode, Station, format_event, open_station};
use crate::config::AppConfig;

fn parse_guest(raw: &str) -> Result<GuestId> {
    GuestId::new(raw).with_context(|| format!("invalid guest id '{raw}'"))
}

fn parse_tag(raw: &str) -> Result<TagUid> {
    TagUid::new(raw).with_context(|| format!("invalid tag UID '{raw}'"))
}

/// Opens a station whose status events are echoed to the terminal.
async fn open_with_echo(config: &AppConfig, offline: bool, reader: ReaderMode) -> Result<Station> {
    let bus = StatusBus::new();
    bus.spawn_listener(|event| println!("{}", format_event(&event)));
    open_station(config, offline, reader, bus).await
}

async fn describe(station: &Station, guest_id: &GuestId) -> String {
    match station.guest_name(guest_id).await {
        Some(name) => format!("{name} ({guest_id})"),
        None => guest_id.to_string(),
    }
}

/// Bind a tag to a guest, writing the presented tag unless `tag` is given.
pub async fn register(
    config: &AppConfig,
    offline: bool,
    guest_id: &str,
    tag: Option<&str>,
    rewrite: bool,
) -> Result<()> {
    let guest_id = parse_guest(guest_id)?;

    let Some(tag) = tag else {
        let station = open_with_echo(config, offline, ReaderMode::Probe).await?;
        println!("Present a tag for {} ...", describe(&station, &guest_id).await);

        if rewrite {
            let previous = station.rewrite_tag(guest_id.clone()).await?;
            if let Some(previous) = previous.filter(|p| p != &guest_id) {
                println!("Tag moved from {}", describe(&station, &previous).await);
            }
            return Ok(());
        }

        return match station.write_tag(guest_id).await {
            Ok(binding) => {
                println!("Tag {} registered", binding.tag_uid);
                Ok(())
            }
            Err(e) if e.is_binding_conflict() => {
                bail!("{e}; pass --rewrite to reassign it")
            }
            Err(e) => Err(e.into()),
        };
    };

    let tag_uid = parse_tag(tag)?;
    let station = open_with_echo(config, offline, ReaderMode::Detached).await?;
    let registry = station.registry();

    if rewrite {
        let previous = registry.rewrite(tag_uid.clone(), guest_id.clone()).await?;
        println!("Tag {tag_uid} bound to {}", describe(&station, &guest_id).await);
        if let Some(previous) = previous.filter(|p| p != &guest_id) {
            println!("Previously bound to {}", describe(&station, &previous).await);
        }
        return Ok(());
    }

    match registry.register(tag_uid.clone(), guest_id.clone()).await {
        Ok(_) => {
            println!("Tag {tag_uid} bound to {}", describe(&station, &guest_id).await);
            Ok(())
        }
        Err(
            e @ (StorageError::AlreadyRegistered { .. } | StorageError::GuestAlreadyBound { .. }),
        ) => {
            bail!("{e}; pass --rewrite to reassign it")
        }
        Err(e) => Err(e.into()),
    }
}

/// Remove a binding, blanking the presented tag unless `tag` is given.
pub async fn erase(config: &AppConfig, offline: bool, tag: Option<&str>) -> Result<()> {
    let binding = match tag {
        Some(tag) => {
            let tag_uid = parse_tag(tag)?;
            let station = open_with_echo(config, offline, ReaderMode::Detached).await?;
            station.registry().erase(&tag_uid).await?
        }
        None => {
            let station = open_with_echo(config, offline, ReaderMode::Probe).await?;
            println!("Present the tag to erase ...");
            match station.erase_tag().await {
                Ok(binding) => binding,
                Err(StationError::Storage(StorageError::NotFound { .. })) => {
                    println!("Tag blanked; it was not registered");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    println!("Tag {} unbound from {}", binding.tag_uid, binding.guest_id);
    Ok(())
}

/// Print the guest bound to a tag.
pub async fn lookup(config: &AppConfig, offline: bool, tag: &str) -> Result<()> {
    let tag_uid = parse_tag(tag)?;
    let station = open_station(config, offline, ReaderMode::Detached, StatusBus::new()).await?;

    match station.lookup(&tag_uid).await {
        Some(guest_id) => println!("{tag_uid}: {}", describe(&station, &guest_id).await),
        None => println!("{tag_uid}: not registered"),
    }
    Ok(())
}

/// Record an explicit absence at the configured station.
pub async fn absent(config: &AppConfig, offline: bool, guest_id: &str) -> Result<()> {
    let guest_id = parse_guest(guest_id)?;
    let station = open_with_echo(config, offline, ReaderMode::Detached).await?;

    match station.mark_absent(guest_id).await? {
        AppendOutcome::Recorded(entry) => {
            println!("Absence queued as {}; it is sent on the next sync", entry.entry_id);
        }
        AppendOutcome::Debounced(entry) => {
            println!("Already marked at {}", entry.detected_at.format("%H:%M:%S"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag_rejects_garbage() {
        let err = parse_tag("zz").unwrap_err();
        assert!(err.to_string().contains("invalid tag UID"));
        assert!(parse_tag("04:A1:B2:C3").is_ok());
    }

    #[test]
    fn test_parse_guest_rejects_blank() {
        assert!(parse_guest("   ").is_err());
        assert_eq!(parse_guest("1001").unwrap(), GuestId::from(1001));
    }

    #[tokio::test]
    async fn test_register_by_uid_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();

        register(&config, true, "1001", Some("04A1"), false).await.unwrap();
        let err = register(&config, true, "1002", Some("04A1"), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--rewrite"));

        register(&config, true, "1002", Some("04A1"), true).await.unwrap();
        let station = open_station(&config, true, ReaderMode::Detached, StatusBus::new())
            .await
            .unwrap();
        assert_eq!(
            station.lookup(&TagUid::new("04A1").unwrap()).await,
            Some(GuestId::from(1002))
        );
    }

    #[tokio::test]
    async fn test_register_second_tag_for_guest_needs_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();

        register(&config, true, "1001", Some("04A1"), false).await.unwrap();
        let err = register(&config, true, "1001", Some("04B2"), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already holds tag 04A1"), "{err}");

        register(&config, true, "1001", Some("04B2"), true).await.unwrap();
        let station = open_station(&config, true, ReaderMode::Detached, StatusBus::new())
            .await
            .unwrap();
        assert_eq!(station.lookup(&TagUid::new("04A1").unwrap()).await, None);
        assert_eq!(
            station.lookup(&TagUid::new("04B2").unwrap()).await,
            Some(GuestId::from(1001))
        );
    }

    #[tokio::test]
    async fn test_erase_by_uid() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();

        register(&config, true, "1001", Some("04A1"), false).await.unwrap();
        erase(&config, true, Some("04A1")).await.unwrap();
        assert!(erase(&config, true, Some("04A1")).await.is_err());
    }
}
