//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::Parser;

use zeroize::Zeroizing;

use crate::config::Settings;
use crate::crypto::MIN_PASSPHRASE_LEN;
use crate::errors::{Result, VaultError};
use crate::vault::{JsonFileStore, Vault};

/// Environment variable holding the vault password (CI/scripts).
pub const PASSWORD_ENV: &str = "DOCVAULT_PASSWORD";

/// Environment variable holding the replacement password for
/// `change-password`.
pub const NEW_PASSWORD_ENV: &str = "DOCVAULT_NEW_PASSWORD";

/// DocVault CLI: a passphrase-protected secret vault stored in a JSON document.
#[derive(Parser)]
#[command(
    name = "docvault",
    about = "Passphrase-protected secret vault",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault document (default: `document` from .docvault.toml)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,
}

/// Which part of a secret `get` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Field {
    Value,
    Username,
    Description,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Set the vault password (creates the vault)
    Init {
        /// Reset an existing vault. Every stored secret is lost.
        #[arg(long)]
        force: bool,
    },

    /// Add a new secret
    Add {
        /// Secret name
        name: String,
        /// Secret value (omit for interactive prompt)
        value: Option<String>,
        /// Username stored with the secret
        #[arg(short, long)]
        username: Option<String>,
        /// Free-text description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Print a secret
    Get {
        /// Secret name
        name: String,
        /// Which field to print
        #[arg(long, value_enum, default_value = "value")]
        field: Field,
        /// Clear the value from the terminal after the auto-hide delay
        #[arg(long)]
        timed: bool,
    },

    /// Replace a secret's value
    Update {
        /// Secret name
        name: String,
        /// New value (omit for interactive prompt)
        value: Option<String>,
        /// New username (empty string clears it)
        #[arg(short, long)]
        username: Option<String>,
        /// New description (empty string clears it)
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a secret
    Delete {
        /// Secret name
        name: String,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// List secret names (no password needed)
    List,

    /// Change the vault password and re-encrypt every secret
    ChangePassword,

    /// Show whether the vault is initialized and its format
    Status,

    /// Interactive session that keeps the vault unlocked until idle
    Shell,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Get the vault password, trying in order:
/// 1. `DOCVAULT_PASSWORD` env var (CI/scripts)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env(PASSWORD_ENV) {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter vault password")
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation.
///
/// `env_var` is checked first for scripted use; the vault itself enforces
/// the minimum length for values taken from the environment.
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_new_password(env_var: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env(env_var) {
        return Ok(pw);
    }

    loop {
        let password = Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt("Choose vault password")
                .with_confirmation(
                    "Confirm vault password",
                    "Passwords do not match, try again",
                )
                .interact()
                .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?,
        );

        if password.chars().count() < MIN_PASSPHRASE_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSPHRASE_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(password);
    }
}

/// Determine a secret value from one of three sources: the command line,
/// piped stdin, or a hidden interactive prompt.
pub fn value_or_prompt(value: Option<&str>) -> Result<Zeroizing<String>> {
    if let Some(v) = value {
        output::warning("Value provided on command line — it may appear in shell history.");
        return Ok(Zeroizing::new(v.to_string()));
    }

    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim_end_matches(['\r', '\n']);
        return Ok(Zeroizing::new(trimmed.to_string()));
    }

    let v = dialoguer::Password::new()
        .with_prompt("Secret value")
        .allow_empty_password(true)
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("value prompt: {e}")))?;
    Ok(Zeroizing::new(v))
}

fn password_from_env(var: &str) -> Option<Zeroizing<String>> {
    std::env::var(var)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

/// Load settings from the working directory and resolve the document path.
///
/// `--file` wins over the `document` setting.
pub fn load_settings(cli: &Cli) -> Result<(Settings, PathBuf)> {
    let cwd = std::env::current_dir()?;
    let settings = Settings::load(&cwd)?;
    let path = match &cli.file {
        Some(path) => cwd.join(path),
        None => settings.document_path(&cwd),
    };
    Ok((settings, path))
}

/// Open the vault document without unlocking it.
pub fn open_vault(cli: &Cli) -> Result<(Vault<JsonFileStore>, Settings)> {
    let (settings, path) = load_settings(cli)?;
    tracing::debug!(path = %path.display(), "opening vault document");
    let vault = Vault::new(JsonFileStore::new(path), &settings);
    Ok((vault, settings))
}

/// Open the vault document and unlock it with the user's password.
pub fn unlock_vault(cli: &Cli) -> Result<(Vault<JsonFileStore>, Settings)> {
    let (mut vault, settings) = open_vault(cli)?;
    if !vault.is_initialized()? {
        output::tip("Run `docvault init` to create a vault.");
        return Err(VaultError::VaultNotInitialized);
    }
    let password = prompt_password()?;
    vault.unlock(&password)?;
    Ok((vault, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_get_with_field_and_timer() {
        let cli = Cli::parse_from(["docvault", "get", "github", "--field", "username", "--timed"]);
        match cli.command {
            Commands::Get { name, field, timed } => {
                assert_eq!(name, "github");
                assert_eq!(field, Field::Username);
                assert!(timed);
            }
            _ => panic!("expected get"),
        }
    }

    #[test]
    fn file_flag_is_global() {
        let cli = Cli::parse_from(["docvault", "list", "--file", "team.json"]);
        assert_eq!(cli.file, Some(PathBuf::from("team.json")));
    }

    #[test]
    fn value_given_on_command_line_skips_prompt() {
        let value = value_or_prompt(Some("tok_abc123")).unwrap();
        assert_eq!(value.as_str(), "tok_abc123");
    }
}
