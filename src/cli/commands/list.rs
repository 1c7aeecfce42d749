//! `docvault list` — display all secret names in a table.
//!
//! Names are not encrypted, so no password is asked for.

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (mut vault, _settings) = open_vault(cli)?;

    let entries = vault.list_entries()?;

    output::info(&format!("{} secret(s)", entries.len()));
    output::print_entries_table(&entries);

    Ok(())
}
