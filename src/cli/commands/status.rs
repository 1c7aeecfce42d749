//! `docvault status` — describe the vault document without unlocking it.

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::Result;
use crate::vault::{FieldStore, VaultHeader, VaultStatus};

/// Execute the `status` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (mut vault, settings) = open_vault(cli)?;
    let path = vault.store().path().display().to_string();

    if vault.status()? == VaultStatus::Uninitialized {
        output::info(&format!("No vault at {path}"));
        output::tip("Run `docvault init` to create one.");
        return Ok(());
    }

    let fields = vault.store().load()?;
    let count = vault.list_secrets()?.len();

    output::info(&format!("Vault at {path}"));
    if let Some(header) = VaultHeader::read(&fields)? {
        println!("  format:          {}", header.version.as_str());
        println!("  kdf iterations:  {}", header.kdf.iterations);
        if header.version.is_legacy() {
            output::tip("Legacy format. `docvault change-password` upgrades it.");
        }
    }
    println!("  secrets:         {count}");
    match settings.auto_lock() {
        Some(d) => println!("  auto-lock:       {} min", d.as_secs() / 60),
        None => println!("  auto-lock:       off"),
    }

    Ok(())
}
