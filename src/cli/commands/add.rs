//! `docvault add` — store a new secret.

use crate::cli::output;
use crate::cli::{unlock_vault, value_or_prompt, Cli};
use crate::errors::Result;

/// Execute the `add` command.
pub fn execute(
    cli: &Cli,
    name: &str,
    value: Option<&str>,
    username: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let value = value_or_prompt(value)?;
    let (mut vault, _settings) = unlock_vault(cli)?;

    vault.add_secret(name, &value, username, description)?;

    let total = vault.list_secrets()?.len();
    output::success(&format!("Added secret '{name}' ({total} total)"));

    Ok(())
}
