//! `docvault update` — replace the value of an existing secret.

use crate::cli::output;
use crate::cli::{unlock_vault, value_or_prompt, Cli};
use crate::errors::Result;

/// Execute the `update` command.
///
/// Username and description are left alone unless given; an empty string
/// clears them.
pub fn execute(
    cli: &Cli,
    name: &str,
    value: Option<&str>,
    username: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let value = value_or_prompt(value)?;
    let (mut vault, _settings) = unlock_vault(cli)?;

    vault.update_secret(name, &value, username, description)?;

    output::success(&format!("Updated secret '{name}'"));

    Ok(())
}
