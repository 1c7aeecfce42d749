use clap::Parser;
use docvault::cli::{Cli, Commands};

fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { force } => docvault::cli::commands::init::execute(&cli, force),
        Commands::Add {
            ref name,
            ref value,
            ref username,
            ref description,
        } => docvault::cli::commands::add::execute(
            &cli,
            name,
            value.as_deref(),
            username.as_deref(),
            description.as_deref(),
        ),
        Commands::Get {
            ref name,
            field,
            timed,
        } => docvault::cli::commands::get::execute(&cli, name, field, timed),
        Commands::Update {
            ref name,
            ref value,
            ref username,
            ref description,
        } => docvault::cli::commands::update::execute(
            &cli,
            name,
            value.as_deref(),
            username.as_deref(),
            description.as_deref(),
        ),
        Commands::Delete { ref name, force } => {
            docvault::cli::commands::delete::execute(&cli, name, force)
        }
        Commands::List => docvault::cli::commands::list::execute(&cli),
        Commands::ChangePassword => docvault::cli::commands::change_password::execute(&cli),
        Commands::Status => docvault::cli::commands::status::execute(&cli),
        Commands::Shell => docvault::cli::commands::shell::execute(&cli),
    };

    if let Err(e) = result {
        docvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr, filtered by `DOCVAULT_LOG` (default `warn`).
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("DOCVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
