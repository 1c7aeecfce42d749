//! `docvault change-password` — re-key the vault under a new password.
//!
//! Every secret is decrypted with the old keys and re-encrypted with keys
//! derived from a fresh salt.  The document is written once, at the end,
//! so an interrupted change leaves the old vault intact.

use crate::cli::output;
use crate::cli::{open_vault, prompt_new_password, prompt_password, Cli, NEW_PASSWORD_ENV};
use crate::errors::{Result, VaultError};

/// Execute the `change-password` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (mut vault, _settings) = open_vault(cli)?;
    if !vault.is_initialized()? {
        return Err(VaultError::VaultNotInitialized);
    }

    output::info("Enter your current vault password.");
    let old_password = prompt_password()?;

    output::info("Choose your new vault password.");
    let new_password = prompt_new_password(NEW_PASSWORD_ENV)?;

    vault.change_password(&old_password, &new_password)?;

    let count = vault.list_secrets()?.len();
    output::success(&format!(
        "Password changed ({count} secret(s) re-encrypted)"
    ));

    Ok(())
}
