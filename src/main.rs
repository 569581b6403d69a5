#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::items_after_statements,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::{fmt, EnvFilter};

use docchat::api::{self, HttpBackend};
use docchat::chat::{ChatOrchestrator, SendOutcome};
use docchat::identity::{CredentialStore, Credentials};
use docchat::sessions::{self, ScopeKey, SessionRepository, Turn};
use docchat::store;
use docchat::Config;

/// docchat - chat with your document collections from the terminal.
#[derive(Parser, Debug)]
#[command(name = "docchat")]
#[command(version)]
#[command(about = "Ask questions against indexed documents, with cited answers.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Converse across all readable documents
    #[command(long_about = "\
Start an interactive conversation on the chat surface.

Sessions persist across runs. Inside the prompt, /help lists session
commands (switch, rename, clear, delete).

Examples:
  docchat chat                       # interactive session
  docchat chat -m \"summarize the Q3 report\"   # single question")]
    Chat {
        /// Single message mode (don't enter interactive mode)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Query a single document index
    #[command(long_about = "\
Start an interactive conversation scoped to one index.

The index comes from --index or from default_index in config.toml.
Query sessions are stored separately from chat sessions, per index.

Examples:
  docchat query --index handbook
  docchat query --index handbook -m \"vacation policy?\"")]
    Query {
        /// Index to query (falls back to default_index in config)
        #[arg(short, long)]
        index: Option<String>,

        /// Single message mode (don't enter interactive mode)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Manage conversation sessions (list, new, rename, delete, clear)
    #[command(long_about = "\
Manage persisted conversation sessions.

Without --index these commands act on the chat surface; with --index
they act on that index's query surface.

Examples:
  docchat sessions list
  docchat sessions list --index handbook
  docchat sessions rename <id> \"Contract review\"
  docchat sessions delete <id>
  docchat sessions clear <id>")]
    Sessions {
        #[command(subcommand)]
        session_command: SessionCommands,
    },

    /// Log in and store a credential for subsequent commands
    Login {
        /// Username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Discard the stored credential and clear persisted sessions
    Logout,

    /// Show the currently authenticated user
    Whoami,

    /// Show configuration and identity status
    Status,
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// List sessions, most recently active first
    List {
        #[arg(short, long)]
        index: Option<String>,
    },
    /// Create a new session and make it current
    New {
        #[arg(short, long)]
        index: Option<String>,
    },
    /// Rename a session
    Rename {
        id: String,
        name: String,
        #[arg(short, long)]
        index: Option<String>,
    },
    /// Delete a session
    Delete {
        id: String,
        #[arg(short, long)]
        index: Option<String>,
    },
    /// Clear a session's messages (the session itself survives)
    Clear {
        id: String,
        #[arg(short, long)]
        index: Option<String>,
    },
}

fn scope_for(index: Option<String>) -> ScopeKey {
    match index {
        Some(index) => ScopeKey::query(index),
        None => ScopeKey::chat(),
    }
}

/// Build a repository for `scope`, initialized against the current identity.
fn open_repository(config: &Config, scope: ScopeKey) -> SessionRepository {
    let authenticated = CredentialStore::new(&config.state_dir).is_authenticated();
    let state_store = store::create_state_store(&config.state_dir);
    let mut repo = SessionRepository::new(scope, state_store);
    repo.initialize(authenticated);
    repo
}

fn backend_for(config: &Config, credentials: Option<&Credentials>) -> HttpBackend {
    HttpBackend::new(
        &config.api_url,
        credentials.map(|c| c.token.as_str()),
        config.request_timeout_secs,
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("DOCCHAT_CONFIG_DIR", config_dir);
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Chat { message } => converse(&config, None, message).await,

        Commands::Query { index, message } => {
            let index = match index.or_else(|| config.default_index.clone()) {
                Some(index) => index,
                None => bail!("no index given. Pass --index or set default_index in config.toml."),
            };
            converse(&config, Some(index), message).await
        }

        Commands::Sessions { session_command } => handle_sessions(&config, session_command),

        Commands::Login { username } => login(&config, username).await,

        Commands::Logout => logout(&config),

        Commands::Whoami => {
            let creds = CredentialStore::new(&config.state_dir);
            let Some(credentials) = creds.load() else {
                println!("Not logged in.");
                return Ok(());
            };
            let profile = backend_for(&config, Some(&credentials)).me().await?;
            println!("{} ({})", profile.username, profile.roles.join(", "));
            Ok(())
        }

        Commands::Status => {
            let creds = CredentialStore::new(&config.state_dir);
            println!("docchat status");
            println!();
            println!("Version:   {}", env!("CARGO_PKG_VERSION"));
            println!("Config:    {}", config.config_path.display());
            println!("State:     {}", config.state_dir.display());
            println!("Backend:   {}", config.api_url);
            println!(
                "Index:     {}",
                config.default_index.as_deref().unwrap_or("(none)")
            );
            match creds.load() {
                Some(credentials) => println!("Identity:  {} (logged in)", credentials.username),
                None => println!("Identity:  (logged out)"),
            }
            Ok(())
        }
    }
}

async fn login(config: &Config, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => dialoguer::Input::new()
            .with_prompt("Username")
            .interact_text()?,
    };
    let password = dialoguer::Password::new()
        .with_prompt("Password")
        .interact()?;

    let token = backend_for(config, None)
        .login(&username, &password)
        .await?;

    let creds = CredentialStore::new(&config.state_dir);
    creds.save(&Credentials {
        username: username.clone(),
        token: token.access_token,
    })?;

    println!("Logged in as {username}.");
    Ok(())
}

fn logout(config: &Config) -> Result<()> {
    let creds = CredentialStore::new(&config.state_dir);
    creds.clear()?;

    // Every scope's persisted history goes, including query scopes for
    // indexes this run never touched.
    let state_store = store::create_state_store(&config.state_dir);
    sessions::purge_persisted_scopes(state_store.as_ref())?;

    println!("Logged out.");
    Ok(())
}

fn handle_sessions(config: &Config, command: SessionCommands) -> Result<()> {
    match command {
        SessionCommands::List { index } => {
            let repo = open_repository(config, scope_for(index));
            if repo.is_empty() {
                println!("No sessions. Log in and start one with `docchat chat`.");
                return Ok(());
            }
            let current = repo.current_session_id().map(ToOwned::to_owned);
            println!("Sessions ({}):\n", repo.len());
            for session in repo.sessions_by_recency() {
                let marker = if current.as_deref() == Some(&session.id) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {}  {}  ({} messages, updated {})",
                    session.id,
                    session.name,
                    session.messages.len(),
                    session.updated_at.format("%Y-%m-%d %H:%M"),
                );
            }
            Ok(())
        }
        SessionCommands::New { index } => {
            let mut repo = open_repository(config, scope_for(index));
            if repo.is_empty() {
                bail!("not logged in. Run `docchat login` first.");
            }
            let id = repo.create_session();
            println!("Created session {id}");
            Ok(())
        }
        SessionCommands::Rename { id, name, index } => {
            let mut repo = open_repository(config, scope_for(index));
            repo.rename_session(&id, &name)?;
            println!("Renamed session {id} to \"{}\"", name.trim());
            Ok(())
        }
        SessionCommands::Delete { id, index } => {
            let mut repo = open_repository(config, scope_for(index));
            if repo.get(&id).is_none() {
                bail!("session not found: {id}");
            }
            repo.delete_session(&id);
            println!("Deleted session {id}");
            Ok(())
        }
        SessionCommands::Clear { id, index } => {
            let mut repo = open_repository(config, scope_for(index));
            repo.clear_messages(&id)?;
            println!("Cleared session {id}");
            Ok(())
        }
    }
}

/// Run the conversation surface: single-shot with `-m`, interactive otherwise.
async fn converse(config: &Config, index: Option<String>, message: Option<String>) -> Result<()> {
    let creds = CredentialStore::new(&config.state_dir);
    let credentials = creds.load();
    if credentials.is_none() {
        bail!("not logged in. Run `docchat login` first.");
    }

    let repo = open_repository(config, scope_for(index.clone()));
    let backend = api::create_backend(
        &config.api_url,
        credentials.as_ref().map(|c| c.token.as_str()),
        config.request_timeout_secs,
    );
    let orchestrator = ChatOrchestrator::new(repo, backend);

    match message {
        Some(message) => {
            submit(&orchestrator, &message, index.as_deref()).await;
            if orchestrator.last_error().is_some() {
                std::process::exit(1);
            }
            Ok(())
        }
        None => repl(&orchestrator, index.as_deref()).await,
    }
}

async fn repl(orchestrator: &ChatOrchestrator, index: Option<&str>) -> Result<()> {
    {
        let repo = orchestrator.repository();
        let session = repo.current_session().expect("initialized scope has a current session");
        match index {
            Some(index) => println!(
                "docchat — querying index {} — session \"{}\" ({} messages)",
                style(index).cyan(),
                session.name,
                session.messages.len(),
            ),
            None => println!(
                "docchat — session \"{}\" ({} messages)",
                session.name,
                session.messages.len(),
            ),
        }
    }
    println!("Type a question, or /help for session commands.\n");

    loop {
        let line: String = match dialoguer::Input::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(_) => break, // EOF / closed terminal
        };
        let line = line.trim();

        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            if handle_slash_command(orchestrator, command) {
                break;
            }
            continue;
        }

        submit(orchestrator, line, index).await;
    }

    Ok(())
}

/// Send one message and print the outcome. Advisory errors go to stderr.
async fn submit(orchestrator: &ChatOrchestrator, text: &str, index: Option<&str>) {
    match orchestrator.send_message(text, index).await {
        SendOutcome::Completed => {
            if let Some(error) = orchestrator.last_error() {
                eprintln!("{} {error}", style("error:").red().bold());
                return;
            }
            let repo = orchestrator.repository();
            if let Some(turn) = repo.current_messages().last() {
                print_assistant_turn(turn);
            }
        }
        SendOutcome::EmptyInput => {}
        SendOutcome::Busy => {
            eprintln!("{} a request is already in flight", style("busy:").yellow());
        }
        SendOutcome::NoSession => {
            eprintln!("{} not logged in", style("error:").red().bold());
        }
    }
}

fn print_assistant_turn(turn: &Turn) {
    println!("\n{}", turn.content());

    let mut sources: Vec<_> = turn.sources().iter().collect();
    if sources.is_empty() {
        println!();
        return;
    }
    sources.sort_by(|a, b| {
        b.relevance
            .unwrap_or(0.0)
            .partial_cmp(&a.relevance.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    println!("\n{}", style("Sources:").dim());
    for citation in sources {
        let name = citation.filename().unwrap_or("(unknown document)");
        match citation.relevance {
            Some(relevance) => println!("  {} {name} ({relevance:.2})", style("-").dim()),
            None => println!("  {} {name}", style("-").dim()),
        }
    }
    println!();
}

/// Handle a `/command` line. Returns true when the REPL should exit.
fn handle_slash_command(orchestrator: &ChatOrchestrator, command: &str) -> bool {
    let (name, arg) = match command.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" | "q" => return true,
        "help" => {
            println!("  /new             start a new session");
            println!("  /list            list sessions");
            println!("  /switch <n>      switch to session n from /list");
            println!("  /rename <name>   rename the current session");
            println!("  /clear           clear the current session's messages");
            println!("  /delete          delete the current session");
            println!("  /quit            exit");
        }
        "new" => {
            let id = orchestrator.repository().create_session();
            println!("Started new session {id}");
        }
        "list" => {
            let repo = orchestrator.repository();
            let current = repo.current_session_id().map(ToOwned::to_owned);
            for (n, session) in repo.sessions_by_recency().iter().enumerate() {
                let marker = if current.as_deref() == Some(&session.id) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {}. {} ({} messages)",
                    n + 1,
                    session.name,
                    session.messages.len(),
                );
            }
        }
        "switch" => {
            let mut repo = orchestrator.repository();
            let id = arg
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| repo.sessions_by_recency().get(i).map(|s| s.id.clone()));
            match id {
                Some(id) => {
                    repo.select_session(&id);
                    println!("Switched to \"{}\"", repo.current_session().map_or("", |s| &s.name));
                }
                None => eprintln!("usage: /switch <n>  (see /list)"),
            }
        }
        "rename" => {
            let mut repo = orchestrator.repository();
            let Some(id) = repo.current_session_id().map(ToOwned::to_owned) else {
                return false;
            };
            match repo.rename_session(&id, arg) {
                Ok(()) => println!("Renamed to \"{}\"", arg.trim()),
                Err(e) => eprintln!("{} {e}", style("error:").red().bold()),
            }
        }
        "clear" => {
            orchestrator.clear_current_messages();
            println!("Cleared.");
        }
        "delete" => {
            let mut repo = orchestrator.repository();
            if let Some(id) = repo.current_session_id().map(ToOwned::to_owned) {
                repo.delete_session(&id);
                let name = repo.current_session().map_or(String::new(), |s| s.name.clone());
                println!("Deleted. Now on \"{name}\"");
            }
        }
        other => eprintln!("unknown command /{other} (try /help)"),
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chat_parses_with_single_message() {
        let cli = Cli::try_parse_from(["docchat", "chat", "-m", "hello"]).unwrap();
        match cli.command {
            Commands::Chat { message } => assert_eq!(message.as_deref(), Some("hello")),
            other => panic!("expected chat command, got {other:?}"),
        }
    }

    #[test]
    fn query_parses_index_flag() {
        let cli = Cli::try_parse_from(["docchat", "query", "--index", "handbook"]).unwrap();
        match cli.command {
            Commands::Query { index, message } => {
                assert_eq!(index.as_deref(), Some("handbook"));
                assert!(message.is_none());
            }
            other => panic!("expected query command, got {other:?}"),
        }
    }

    #[test]
    fn sessions_rename_parses_positional_args() {
        let cli =
            Cli::try_parse_from(["docchat", "sessions", "rename", "sid", "New name"]).unwrap();
        match cli.command {
            Commands::Sessions {
                session_command: SessionCommands::Rename { id, name, index },
            } => {
                assert_eq!(id, "sid");
                assert_eq!(name, "New name");
                assert!(index.is_none());
            }
            other => panic!("expected sessions rename, got {other:?}"),
        }
    }

    #[test]
    fn scope_for_maps_index_to_query_surface() {
        assert_eq!(scope_for(None), ScopeKey::chat());
        assert_eq!(
            scope_for(Some("handbook".to_string())),
            ScopeKey::query("handbook")
        );
    }
}
