//! `docvault init` — set the vault password, creating the vault.

use crate::cli::output;
use crate::cli::{open_vault, prompt_new_password, Cli, PASSWORD_ENV};
use crate::errors::{Result, VaultError};

/// Execute the `init` command.
pub fn execute(cli: &Cli, force: bool) -> Result<()> {
    let (mut vault, _settings) = open_vault(cli)?;

    // 1. Refuse to clobber an existing vault unless asked to.
    if vault.is_initialized()? {
        if !force {
            output::tip("Use `docvault change-password` to change the password instead.");
            return Err(VaultError::CommandFailed(format!(
                "a vault already exists at {} (pass --force to reset it and lose every secret)",
                vault.store().path().display()
            )));
        }
        output::warning("Resetting the vault. Every stored secret will be lost.");
    }

    // 2. Prompt for a new password (with confirmation) and write the header.
    let password = prompt_new_password(PASSWORD_ENV)?;
    vault.set_password(&password)?;

    output::success(&format!(
        "Vault created at {}",
        vault.store().path().display()
    ));

    // 3. Show helpful tips.
    output::tip("Run `docvault add <NAME>` to add a secret.");
    output::tip("Run `docvault list` to see all secrets.");

    Ok(())
}
