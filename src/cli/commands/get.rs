//! `docvault get` — decrypt and print one field of a secret.

use console::Term;

use crate::cli::output;
use crate::cli::{unlock_vault, Cli, Field};
use crate::errors::Result;

/// Execute the `get` command.
pub fn execute(cli: &Cli, name: &str, field: Field, timed: bool) -> Result<()> {
    let (mut vault, settings) = unlock_vault(cli)?;

    let text = match field {
        Field::Value => Some(vault.get_secret(name)?),
        Field::Username => vault.get_username(name)?,
        Field::Description => vault.get_description(name)?,
    };
    vault.lock();

    let Some(text) = text else {
        let label = match field {
            Field::Value => "value",
            Field::Username => "username",
            Field::Description => "description",
        };
        output::info(&format!("Secret '{name}' has no {label}"));
        return Ok(());
    };
    let text = zeroize::Zeroizing::new(text);

    match settings.auto_hide().filter(|_| timed) {
        Some(delay) => {
            let term = Term::stdout();
            term.write_line(text.as_str())?;
            term.flush()?;
            std::thread::sleep(delay);
            // Only a terminal can take the value back.
            if term.is_term() {
                term.clear_last_lines(1)?;
            }
            output::tip(&format!("Value hidden after {}s", delay.as_secs()));
        }
        None => println!("{}", text.as_str()),
    }

    Ok(())
}
