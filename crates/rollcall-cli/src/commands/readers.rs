use anyhow::Result;
use rollcall_hardware::{BackendKind, ReaderSelector};

use crate::config::AppConfig;

/// Probe every compiled-in backend and print what answered.
pub async fn execute(config: &AppConfig) -> Result<()> {
    let report = ReaderSelector::available(&config.reader).await;

    for (kind, outcome) in &report {
        let kind = kind.to_string();
        match outcome {
            Ok(info) => {
                let firmware = info.firmware_version.as_deref().unwrap_or("unknown firmware");
                println!("{kind:<14} {} ({firmware})", info.name);
            }
            Err(e) => println!("{kind:<14} unavailable: {e}"),
        }
    }

    let preferred = config
        .reader
        .preference
        .iter()
        .find(|kind| report.iter().any(|(k, o)| k == *kind && o.is_ok()));
    match preferred {
        Some(kind) => println!("\n`rollcall run` would bind {kind}"),
        None if config.reader.default_backend == BackendKind::Mock => {
            println!("\nNo reader found; `rollcall run` would use the simulated reader")
        }
        None => println!(
            "\nNo reader found; `rollcall run` starts disconnected and keeps probing {}",
            config.reader.default_backend
        ),
    }
    Ok(())
}
