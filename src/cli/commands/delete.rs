//! `docvault delete` — remove a secret from the vault.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{unlock_vault, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `delete` command.
pub fn execute(cli: &Cli, name: &str, force: bool) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete secret '{name}'?"))
            .default(false)
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let (mut vault, _settings) = unlock_vault(cli)?;
    vault.delete_secret(name)?;

    output::success(&format!("Deleted secret '{name}'"));

    Ok(())
}
