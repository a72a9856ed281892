use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use memochat_api::MemochatClient;
use memochat_auth::{LoginRedirect, TokenStore};
use memochat_config::{Config, LogConfig, LogFormat};
use memochat_store::FileStorage;
use memochat_transport::{CancellationToken, StreamOutcome};
use memochat_types::{SessionExpiryHook, StreamHandler};
use std::io::{BufRead as _, Write as _};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "memochat", about = "Terminal client for a memory-backed chat service")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Override the server origin (default: http://127.0.0.1:5000).
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,
    /// Key-value storage file (default: ~/.memochat/storage.json).
    #[arg(long, global = true, value_name = "PATH")]
    storage: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session token.
    Login {
        username: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session token.
    Logout,
    /// Show who the stored token belongs to.
    Status,
    /// List conversations, most recent first.
    Conversations {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Send a message and print the streamed reply.
    Chat {
        message: String,
        /// Conversation to continue; a new one is created when omitted.
        #[arg(short = 'C', long)]
        conversation: Option<i64>,
    },
    /// List stored memories.
    Memories {
        /// Only memories from this conversation.
        #[arg(short = 'C', long)]
        conversation: Option<i64>,
        #[arg(long)]
        limit: Option<u32>,
    },
}

/// Tells the terminal user to log in again; wraps the default redirect so
/// it is still logged and counted.
struct ReloginNotice(LoginRedirect);

impl SessionExpiryHook for ReloginNotice {
    fn on_session_expired(&self) {
        self.0.on_session_expired();
        eprintln!("session expired, run `memochat login` to sign in again");
    }
}

/// Prints tokens to stdout as they arrive.
#[derive(Default)]
struct StdoutHandler {
    printed: bool,
}

impl StreamHandler for StdoutHandler {
    fn on_token(&mut self, content: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(content.as_bytes());
        let _ = out.flush();
        self.printed = true;
    }

    fn on_done(&mut self, message_id: Option<i64>) {
        println!();
        tracing::debug!(?message_id, "reply stored");
    }

    // The message itself is reported once, by `cmd_chat`.
    fn on_error(&mut self, _message: &str) {
        if self.printed {
            println!();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("config error: {e}"))?;
    if let Some(server) = cli.server {
        config.base_url = server;
    }
    if let Some(storage) = cli.storage {
        config.storage_path = Some(storage);
    }
    init_tracing(&config.log);

    let client = open_client(&config)?;
    match cli.command {
        Commands::Login { username, password } => cmd_login(&client, &username, password).await,
        Commands::Logout => cmd_logout(&client),
        Commands::Status => cmd_status(&client).await,
        Commands::Conversations { page, limit } => cmd_conversations(&client, page, limit).await,
        Commands::Chat {
            message,
            conversation,
        } => cmd_chat(&client, &message, conversation).await,
        Commands::Memories {
            conversation,
            limit,
        } => cmd_memories(&client, conversation, limit).await,
    }
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_env("MEMOCHAT_LOG")
        .or_else(|_| EnvFilter::try_new(log.level.as_deref().unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn open_client(config: &Config) -> Result<MemochatClient> {
    let path = match &config.storage_path {
        Some(path) => path.clone(),
        None => FileStorage::default_path()?,
    };
    let tokens = Arc::new(TokenStore::load(Arc::new(FileStorage::new(path)))?);
    let hook = Arc::new(ReloginNotice(LoginRedirect::new(config.login_path.clone())));
    Ok(MemochatClient::from_config(config, tokens, hook)?)
}

async fn cmd_login(client: &MemochatClient, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => {
            eprint!("password: ");
            std::io::stderr().flush()?;
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("failed to read password")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    let session = client
        .auth()
        .login(username, &password)
        .await
        .map_err(|e| anyhow::anyhow!("login failed: {e}"))?;
    match session.user {
        Some(user) => eprintln!("logged in as {}", user.username),
        None => eprintln!("logged in"),
    }
    Ok(())
}

fn cmd_logout(client: &MemochatClient) -> Result<()> {
    client
        .auth()
        .logout()
        .map_err(|e| anyhow::anyhow!("logout failed: {e}"))?;
    eprintln!("logged out");
    Ok(())
}

async fn cmd_status(client: &MemochatClient) -> Result<()> {
    if !client.tokens().is_authenticated() {
        println!("not authenticated");
        return Ok(());
    }
    let me = client.auth().me().await?;
    println!("authenticated as {} <{}>", me.username, me.email);
    Ok(())
}

async fn cmd_conversations(
    client: &MemochatClient,
    page: Option<u32>,
    limit: Option<u32>,
) -> Result<()> {
    let listing = client.conversations().list(page, limit).await?;
    for conv in &listing.conversations {
        println!(
            "{:>6}  {:<40}  {} messages",
            conv.id,
            conv.title.as_deref().unwrap_or("(untitled)"),
            conv.message_count
        );
    }
    let p = &listing.pagination;
    if p.total_pages > 1 {
        println!("page {} of {} ({} total)", p.page, p.total_pages, p.total);
    }
    Ok(())
}

async fn cmd_chat(client: &MemochatClient, message: &str, conversation: Option<i64>) -> Result<()> {
    let conversation_id = match conversation {
        Some(id) => id,
        None => {
            let conv = client.conversations().create(None).await?;
            eprintln!("started conversation {}", conv.id);
            conv.id
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut handler = StdoutHandler::default();
    let outcome = client
        .messages()
        .stream(conversation_id, message, &mut handler, &cancel)
        .await?;
    match outcome {
        StreamOutcome::Completed { .. } => Ok(()),
        StreamOutcome::Cancelled => {
            if handler.printed {
                println!();
            }
            eprintln!("cancelled");
            Ok(())
        }
        StreamOutcome::Ended => {
            if handler.printed {
                println!();
            }
            eprintln!("reply ended without confirmation");
            Ok(())
        }
        StreamOutcome::Failed { message } => anyhow::bail!("chat failed: {message}"),
    }
}

async fn cmd_memories(
    client: &MemochatClient,
    conversation: Option<i64>,
    limit: Option<u32>,
) -> Result<()> {
    let list = client.memories().list(limit, conversation).await?;
    if list.memories.is_empty() {
        println!("no memories");
    }
    for memory in &list.memories {
        println!(
            "{}  [{}] {}",
            memory.id,
            memory.category.as_deref().unwrap_or("-"),
            memory.title.as_deref().unwrap_or(&memory.content)
        );
    }
    Ok(())
}
