//! `docvault shell` — an interactive session over one vault.
//!
//! Unlike the one-shot commands, the shell keeps a single [`Vault`] alive,
//! so the auto-lock deadline and the failed-attempt lockout apply across
//! commands.  Each line is `<command> [name] [value...]`.

use std::io::{self, BufRead, IsTerminal, Write};

use crate::cli::output;
use crate::cli::{open_vault, prompt_password, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::{FieldStore, Vault, VaultStatus};

const HELP: &str = "\
commands:
  unlock [password]        unlock (prompts when no password is given)
  lock                     drop the keys
  status                   show lock state and attempts left
  list                     list secret names
  get <name>               print a secret's value
  username <name>          print a secret's username
  description <name>       print a secret's description
  add <name> <value...>    add a secret
  update <name> <value...> replace a secret's value
  delete <name>            delete a secret
  help                     this text
  exit                     leave the shell";

/// What the loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Execute the `shell` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (mut vault, _settings) = open_vault(cli)?;
    if !vault.is_initialized()? {
        output::tip("Run `docvault init` to create a vault.");
        return Err(VaultError::VaultNotInitialized);
    }

    let interactive = io::stdin().is_terminal();
    if interactive {
        output::info("Vault is locked. Type `unlock` to begin, `help` for commands.");
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("docvault> ");
            io::stdout().flush()?;
        }
        let Some(line) = lines.next() else { break };
        let line = zeroize::Zeroizing::new(line?);

        match handle_line(&mut vault, &line) {
            Ok(Flow::Exit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => output::error(&e.to_string()),
        }
    }

    vault.lock();
    Ok(())
}

/// Run one shell line against `vault`.
pub fn handle_line<S: FieldStore>(vault: &mut Vault<S>, line: &str) -> Result<Flow> {
    if vault.poll_auto_lock() {
        output::warning("Vault locked after inactivity.");
    }

    let line = line.trim();
    let (command, rest) = split_word(line);
    let (name, value) = split_word(rest);

    match command {
        "" => {}
        "exit" | "quit" => return Ok(Flow::Exit),
        "help" => println!("{HELP}"),
        "unlock" => {
            let password = if name.is_empty() {
                prompt_password()?
            } else {
                zeroize::Zeroizing::new(rest.to_string())
            };
            vault.unlock(&password)?;
            output::success("Unlocked.");
        }
        "lock" => {
            vault.lock();
            output::success("Locked.");
        }
        "status" => match vault.status()? {
            VaultStatus::Uninitialized => output::info("No vault."),
            VaultStatus::Unlocked => output::info("Unlocked."),
            VaultStatus::Locked => output::info(&format!(
                "Locked ({} attempt(s) left).",
                vault.remaining_attempts()
            )),
            VaultStatus::LockedOut { remaining_secs } => output::warning(&format!(
                "Locked out for another {remaining_secs} seconds."
            )),
        },
        "list" => output::print_entries_table(&vault.list_entries()?),
        "get" => println!("{}", zeroize::Zeroizing::new(vault.get_secret(require(name)?)?).as_str()),
        "username" => print_optional(vault.get_username(require(name)?)?),
        "description" => print_optional(vault.get_description(require(name)?)?),
        "add" => {
            vault.add_secret(require(name)?, value, None, None)?;
            output::success(&format!("Added secret '{name}'"));
        }
        "update" => {
            vault.update_secret(require(name)?, value, None, None)?;
            output::success(&format!("Updated secret '{name}'"));
        }
        "delete" => {
            vault.delete_secret(require(name)?)?;
            output::success(&format!("Deleted secret '{name}'"));
        }
        other => {
            return Err(VaultError::CommandFailed(format!(
                "unknown command '{other}' (try `help`)"
            )))
        }
    }

    Ok(Flow::Continue)
}

fn print_optional(text: Option<String>) {
    match text {
        Some(text) => println!("{}", zeroize::Zeroizing::new(text).as_str()),
        None => output::info("(not set)"),
    }
}

fn require(name: &str) -> Result<&str> {
    if name.is_empty() {
        Err(VaultError::CommandFailed("missing secret name".into()))
    } else {
        Ok(name)
    }
}

/// Split off the first whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::vault::MemoryStore;

    fn vault() -> Vault<MemoryStore> {
        let mut vault = Vault::new(MemoryStore::new(), &Settings::default());
        vault.set_password("correct-horse").unwrap();
        vault.lock();
        vault
    }

    #[test]
    fn split_word_keeps_value_spaces() {
        assert_eq!(split_word("add github tok with spaces"), ("add", "github tok with spaces"));
        assert_eq!(split_word("list"), ("list", ""));
        assert_eq!(split_word(""), ("", ""));
    }

    #[test]
    fn session_flow() {
        let mut vault = vault();

        assert!(matches!(
            handle_line(&mut vault, "get github"),
            Err(VaultError::VaultLocked)
        ));
        assert_eq!(handle_line(&mut vault, "unlock correct-horse").unwrap(), Flow::Continue);
        handle_line(&mut vault, "add github tok abc 123").unwrap();
        assert_eq!(vault.get_secret("github").unwrap(), "tok abc 123");

        handle_line(&mut vault, "delete github").unwrap();
        assert!(vault.list_secrets().unwrap().is_empty());
        assert_eq!(handle_line(&mut vault, "exit").unwrap(), Flow::Exit);
    }

    #[test]
    fn wrong_password_consumes_attempt() {
        let mut vault = vault();
        assert!(matches!(
            handle_line(&mut vault, "unlock not-the-password"),
            Err(VaultError::InvalidPassphrase { remaining_attempts: 4 })
        ));
        assert_eq!(vault.failed_attempts(), 1);
    }

    #[test]
    fn missing_name_and_unknown_command_are_errors() {
        let mut vault = vault();
        assert!(matches!(
            handle_line(&mut vault, "delete"),
            Err(VaultError::CommandFailed(_))
        ));
        assert!(matches!(
            handle_line(&mut vault, "frobnicate"),
            Err(VaultError::CommandFailed(_))
        ));
    }
}
