//! myao - chat persona bot

mod characters;
mod config;
mod console;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use myao_agent::{BotIdentity, DelayPolicy, Orchestrator, Persona, UserDirectory};
use myao_ai::{CompletionClient, providers::openai::OpenAIProvider};
use tracing_subscriber::EnvFilter;

/// User id of the person typing on the console
const CONSOLE_USER_ID: &str = "CONSOLE";

/// myao - a chat persona with debounced replies and summarizing memory
#[derive(Parser, Debug)]
#[command(name = "myao")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: gpt-4o)
    #[arg(short, long)]
    model: Option<String>,

    /// OpenAI-compatible endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Built-in character (default, english-teacher, nyao)
    #[arg(short, long)]
    character: Option<String>,

    /// Persona TOML file, overrides --character
    #[arg(long)]
    persona_file: Option<PathBuf>,

    /// Directory for the summary file (default: ./)
    #[arg(long)]
    persistent_dir: Option<PathBuf>,

    /// Upper bound of the random reply delay, in seconds (default: 600)
    #[arg(long)]
    max_delay_reply_period: Option<u64>,

    /// Reply delay when the bot is mentioned, in milliseconds (default: 0)
    #[arg(long)]
    mention_delay_ms: Option<u64>,

    /// The bot's user id for <@id> mentions (default: MYAO)
    #[arg(long)]
    bot_user_id: Option<String>,

    /// Your display name on the console
    #[arg(short, long)]
    user: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// List built-in characters
    #[arg(long)]
    list_characters: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing; RUST_LOG overrides the default filter
    let default_filter = if args.verbose { "myao=debug" } else { "myao=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    if args.list_characters {
        for name in characters::BUILTIN_NAMES {
            println!("{}", name);
        }
        return Ok(());
    }

    // Load config file
    let cfg = config::Config::load();

    // Merge config with CLI args (CLI takes precedence)
    let model = args
        .model
        .or(cfg.model.clone())
        .unwrap_or_else(|| "gpt-4o".to_string());
    let character_name = args
        .character
        .or(cfg.character.clone())
        .unwrap_or_else(|| "default".to_string());
    let persistent_dir = args
        .persistent_dir
        .or(cfg.persistent_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./"));
    let delays = DelayPolicy {
        max_delay: Duration::from_secs(
            args.max_delay_reply_period
                .or(cfg.max_delay_reply_secs)
                .unwrap_or(600),
        ),
        mention_delay: Duration::from_millis(
            args.mention_delay_ms.or(cfg.mention_delay_ms).unwrap_or(0),
        ),
    };
    let bot = BotIdentity::new(
        args.bot_user_id
            .or(cfg.bot_user_id.clone())
            .unwrap_or_else(|| "MYAO".to_string()),
    );
    let console_user = args
        .user
        .or(cfg.console_user.clone())
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "user".to_string());

    let Some(api_key) = cfg.get_api_key() else {
        eprintln!("Error: No OpenAI API key found");
        eprintln!();
        eprintln!("Set your API key with: export OPENAI_API_KEY=your-key");
        eprintln!("Or add it to config file: myao --init-config");
        std::process::exit(1);
    };

    let mut provider = OpenAIProvider::new(api_key);
    if let Some(org) = cfg.get_organization() {
        provider = provider.with_organization(org);
    }
    if let Some(ref base_url) = args.base_url.or(cfg.base_url.clone()) {
        provider = provider.with_base_url(base_url);
    }
    let client: Arc<dyn CompletionClient> = Arc::new(provider);

    let spec = match args
        .persona_file
        .or(cfg.persona_file.as_ref().map(PathBuf::from))
    {
        Some(path) => characters::CharacterSpec::Single(characters::load_persona_file(&path)?),
        None => characters::builtin(&character_name)?,
    };

    let mut users: HashMap<String, String> = cfg.users.clone().into_iter().collect();
    users.insert(CONSOLE_USER_ID.to_string(), console_user);
    let directory = UserDirectory::new(users);

    let persona: Arc<dyn Persona> = Arc::new(characters::build(
        spec,
        characters::BuildOptions {
            model: &model,
            client,
            persistent_dir: &persistent_dir,
            character: &character_name,
            members: directory.member_names(),
            policy: cfg.memory.clone(),
        },
    ));

    tracing::info!(
        persona = persona.name(),
        character = %character_name,
        model = %model,
        max_delay_secs = delays.max_delay.as_secs(),
        "myao is listening"
    );

    let orchestrator = Orchestrator::new(
        Arc::clone(&persona),
        Arc::new(console::ConsoleSink::new(persona.name())),
        Arc::new(console::HttpFetcher::new()),
        directory,
        bot,
    )
    .with_delay_policy(delays);

    console::run(&orchestrator, CONSOLE_USER_ID).await
}
