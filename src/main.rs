//! Binary entrypoint for the Evolvex CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml` and seed the catalogs
//! - `register <username> <email>` / `login <username>` - account management (password prompted)
//! - `profile`, `quests`, `complete`, `skills`, `dungeon ...`, `shop`, ... - act as `--user <name>`
//!
//! Every command prints its result as JSON on stdout.
//!
//! See the library crate docs for module-level details: `evolvex::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;

use evolvex::config::Config;
use evolvex::progression::{
    Difficulty, DungeonRank, Engine, ProgressStoreBuilder, QuestDraft, QuestEdit,
};

#[derive(Parser)]
#[command(name = "evolvex")]
#[command(about = "A gamified self-improvement tracker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and seed the catalogs
    Init,
    /// Create a new account
    Register { username: String, email: String },
    /// Log in (applies inactivity penalty and login streak)
    Login { username: String },
    /// Show level, stats, titles, skills and insights
    Profile {
        #[arg(short, long)]
        user: String,
    },
    /// List quests offered at the user's current level and stamina
    Quests {
        #[arg(short, long)]
        user: String,
    },
    /// Create a custom quest
    AddQuest {
        #[arg(short, long)]
        user: String,
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// easy, medium, hard or ss
        #[arg(long, default_value = "easy")]
        difficulty: String,
        #[arg(long, default_value_t = 50)]
        exp: u64,
        #[arg(long, default_value_t = 10)]
        stamina_cost: u32,
    },
    /// Edit a quest (global quests are copied into a personal version)
    EditQuest {
        #[arg(short, long)]
        user: String,
        quest_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
        #[arg(long)]
        exp: Option<u64>,
        #[arg(long)]
        stamina_cost: Option<u32>,
    },
    /// Delete a quest
    DeleteQuest {
        #[arg(short, long)]
        user: String,
        quest_id: String,
    },
    /// Complete a quest and settle its rewards
    Complete {
        #[arg(short, long)]
        user: String,
        quest_id: String,
    },
    /// List the skill catalog and unlocked skills
    Skills {
        #[arg(short, long)]
        user: String,
    },
    /// Spend skill points to unlock a skill
    Unlock {
        #[arg(short, long)]
        user: String,
        skill_id: String,
    },
    /// Use an unlocked active skill
    UseSkill {
        #[arg(short, long)]
        user: String,
        skill_id: String,
    },
    /// Dungeon sessions
    Dungeon {
        #[command(subcommand)]
        action: DungeonCommand,
    },
    /// Top users by level and experience
    Leaderboard,
    /// List shop items
    Shop,
    /// Buy an item with gold
    Buy {
        #[arg(short, long)]
        user: String,
        item_id: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Show the user's inventory
    Inventory {
        #[arg(short, long)]
        user: String,
    },
    /// Consume one unit of an inventory item
    UseItem {
        #[arg(short, long)]
        user: String,
        item_id: String,
    },
    /// Restore stamina
    Rest {
        #[arg(short, long)]
        user: String,
        amount: Option<u32>,
    },
    /// Add gold to a user's balance
    GrantGold {
        #[arg(short, long)]
        user: String,
        amount: u64,
    },
    /// Recent progress history, newest first
    History {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum DungeonCommand {
    /// Enter a dungeon of the given rank (E, D, C, B, A, S)
    Start {
        #[arg(short, long)]
        user: String,
        rank: String,
    },
    /// Report damage dealt to the boss
    Damage {
        #[arg(short, long)]
        user: String,
        session_id: String,
        amount: u32,
    },
    /// Claim the reward for a defeated boss
    Complete {
        #[arg(short, long)]
        user: String,
        session_id: String,
    },
    /// Give up on a session
    Fail {
        #[arg(short, long)]
        user: String,
        session_id: String,
    },
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_difficulty(name: &str) -> Result<Difficulty> {
    Difficulty::parse(name).ok_or_else(|| anyhow!("unknown difficulty '{}'", name))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        return init(&cli.config, cli.verbose).await;
    }

    let config = match Config::load(&cli.config).await {
        Ok(config) => config,
        Err(e) => {
            if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                return Err(e);
            }
            Config::default()
        }
    };
    init_logging(&Some(config.clone()), cli.verbose);
    let engine = Engine::from_config(&config)?;

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Register { username, email } => {
            let pass1 = rpassword::prompt_password("Password: ")?;
            let pass2 = rpassword::prompt_password("Confirm password: ")?;
            if pass1 != pass2 {
                return Err(anyhow!("passwords do not match"));
            }
            emit(&engine.register_user(&username, &email, &pass1)?)?;
        }
        Commands::Login { username } => {
            let password = rpassword::prompt_password("Password: ")?;
            emit(&engine.authenticate(&username, &password)?)?;
        }
        Commands::Profile { user } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.profile(&id)?)?;
        }
        Commands::Quests { user } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.list_available_quests(&id)?)?;
        }
        Commands::AddQuest {
            user,
            title,
            description,
            difficulty,
            exp,
            stamina_cost,
        } => {
            let id = engine.user_id_for(&user)?;
            let mut draft = QuestDraft::new(&title, &description);
            draft.difficulty = parse_difficulty(&difficulty)?;
            draft.exp_reward = exp;
            draft.stamina_cost = stamina_cost;
            emit(&engine.add_custom_quest(&id, draft)?)?;
        }
        Commands::EditQuest {
            user,
            quest_id,
            title,
            description,
            difficulty,
            exp,
            stamina_cost,
        } => {
            let id = engine.user_id_for(&user)?;
            let changes = QuestEdit {
                title,
                description,
                difficulty: difficulty.as_deref().map(parse_difficulty).transpose()?,
                exp_reward: exp,
                stamina_cost,
                stat_rewards: None,
            };
            emit(&engine.edit_quest(&id, &quest_id, &changes)?)?;
        }
        Commands::DeleteQuest { user, quest_id } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.delete_quest(&id, &quest_id)?)?;
        }
        Commands::Complete { user, quest_id } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.complete_quest(&id, &quest_id)?)?;
        }
        Commands::Skills { user } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.list_skills(&id)?)?;
        }
        Commands::Unlock { user, skill_id } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.unlock_skill(&id, &skill_id)?)?;
        }
        Commands::UseSkill { user, skill_id } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.use_skill(&id, &skill_id)?)?;
        }
        Commands::Dungeon { action } => dungeon(&engine, action)?,
        Commands::Leaderboard => emit(&engine.leaderboard()?)?,
        Commands::Shop => emit(&engine.shop()?)?,
        Commands::Buy {
            user,
            item_id,
            quantity,
        } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.buy_item(&id, &item_id, quantity)?)?;
        }
        Commands::Inventory { user } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.inventory(&id)?)?;
        }
        Commands::UseItem { user, item_id } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.use_item(&id, &item_id)?)?;
        }
        Commands::Rest { user, amount } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.rest(&id, amount)?)?;
        }
        Commands::GrantGold { user, amount } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.grant_gold(&id, amount)?)?;
        }
        Commands::History { user, limit } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.history(&id, limit)?)?;
        }
    }

    Ok(())
}

fn dungeon(engine: &Engine, action: DungeonCommand) -> Result<()> {
    match action {
        DungeonCommand::Start { user, rank } => {
            let id = engine.user_id_for(&user)?;
            let rank = DungeonRank::parse(&rank).ok_or_else(|| anyhow!("unknown dungeon rank '{}'", rank))?;
            emit(&engine.start_dungeon(&id, rank)?)
        }
        DungeonCommand::Damage {
            user,
            session_id,
            amount,
        } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.damage_dungeon_boss(&id, &session_id, amount)?)
        }
        DungeonCommand::Complete { user, session_id } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.complete_dungeon(&id, &session_id)?)
        }
        DungeonCommand::Fail { user, session_id } => {
            let id = engine.user_id_for(&user)?;
            emit(&engine.fail_dungeon(&id, &session_id)?)
        }
    }
}

async fn init(path: &str, verbosity: u8) -> Result<()> {
    init_logging(&None, verbosity);
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        warn!("Configuration file {} already exists; leaving it untouched", path);
    } else {
        Config::create_default(path).await?;
        info!("Configuration file created at {}", path);
    }

    let config = Config::load(path).await?;
    tokio::fs::create_dir_all(&config.storage.data_dir).await?;
    let store = ProgressStoreBuilder::new(config.storage.db_path())
        .without_seed()
        .open()?;
    let seeded = store.seed_if_needed()?;
    info!("Seeded {} catalog records at {}", seeded, config.storage.db_path().display());
    emit(&serde_json::json!({
        "config": path,
        "database": config.storage.db_path(),
        "seeded": seeded,
    }))
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins over the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|cfg| cfg.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|path| std::fs::OpenOptions::new().create(true).append(true).open(path).ok());
    let security_path = config.as_ref().and_then(|cfg| cfg.logging.security_file.clone());

    if let Some(f) = file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // stdout carries JSON; the console copy goes to stderr only when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stderr);

        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());

            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }

            if record.target() == "security" {
                if let Some(ref sec_path) = security_path {
                    if let Ok(mut sf) = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(sec_path)
                    {
                        let _ = writeln!(sf, "{}", line);
                    }
                }
            }

            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
