use clap::{Parser, Subcommand};
use nw_core::{ArticleStore, Error, NewsProvider, Result, SearchFilters, User, UserStore};
use nw_newsapi::{NewsApiClient, NewsApiConfig};
use nw_services::{spawn_trending_job, AccountService, Invitation, NewsServices};
use nw_storage::sqlite::DEFAULT_DATABASE_URL;
use nw_storage::Storage;
use nw_web::AppState;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod logging;

#[derive(Debug, Clone, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_value = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let unit = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds = num
                    .checked_mul(unit)
                    .and_then(|secs| total_seconds.checked_add(secs))
                    .ok_or_else(|| "Duration is too large".to_string())?;
                current_number.clear();
                has_value = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // A bare trailing number counts as seconds
        if !current_number.is_empty() {
            let secs = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds = total_seconds
                .checked_add(secs)
                .ok_or_else(|| "Duration is too large".to_string())?;
            has_value = true;
        }

        if !has_value {
            return Err("Duration must include a number".to_string());
        }
        if total_seconds == 0 {
            return Err("Duration must be greater than zero".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Keyword news search with a 15 minute cache", long_about = None)]
pub struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, env = "NW_STORAGE", default_value = "sqlite")]
    storage: String,
    #[arg(long, env = "NW_DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,
    #[arg(long, env = "NEWSAPI_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Override the NewsAPI base url
    #[arg(long, env = "NEWSAPI_URL")]
    newsapi_url: Option<String>,
    /// Upper bound for a single provider call (e.g. 5s, 1m)
    #[arg(long, env = "NW_PROVIDER_TIMEOUT", default_value = "5s")]
    provider_timeout: HumanDuration,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long, env = "NW_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
        /// Pick the trending keyword periodically (e.g. 1h, 30m, 1h15m30s)
        #[arg(long)]
        trending_interval: Option<HumanDuration>,
    },
    /// Search a keyword on behalf of a user
    Search {
        #[arg(long)]
        user: String,
        keyword: String,
        /// Only articles published on or after this date
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },
    /// Fetch articles newer than the last search of a keyword
    Refresh {
        #[arg(long)]
        user: String,
        keyword: String,
    },
    /// Show the most searched keyword with its latest articles
    Trending,
    /// List the keywords a user has searched
    Keywords {
        #[arg(long)]
        user: String,
        /// Forget this keyword and its cached articles instead of listing
        #[arg(long)]
        delete: Option<String>,
    },
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
enum UserCommands {
    /// Create an account, or unblock an existing one, and print its token
    Invite { email: String },
    Block { email: String },
    Unblock { email: String },
    List,
}

fn create_provider(cli: &Cli) -> Result<Arc<dyn NewsProvider>> {
    let api_key = cli
        .api_key
        .as_deref()
        .ok_or_else(|| Error::Validation("NEWSAPI_KEY (or --api-key) is required for this command".to_string()))?;
    let mut config = NewsApiConfig::new(api_key).with_timeout(cli.provider_timeout.0);
    if let Some(url) = &cli.newsapi_url {
        config = config.with_base_url(url.as_str());
    }
    let client = NewsApiClient::new(config)?;
    info!("📰 News provider ready ({})", client.name());
    Ok(Arc::new(client))
}

fn create_services(cli: &Cli, storage: &Storage) -> Result<NewsServices> {
    let provider = create_provider(cli)?;
    Ok(NewsServices::new(storage.articles.clone(), storage.users.clone(), provider))
}

async fn resolve_user(storage: &Storage, email: &str) -> Result<User> {
    storage
        .users
        .find_by_email(email.trim())
        .await?
        .ok_or_else(|| Error::NotFound(format!("No account for {}", email)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn handle_user_command(command: UserCommands, accounts: &AccountService) -> Result<()> {
    match command {
        UserCommands::Invite { email } => match accounts.invite(&email).await? {
            Invitation::Created(user) => {
                info!("✉️ Created account for {}", email);
                println!("{}", user.token);
            }
            Invitation::Reactivated(user) => {
                info!("🔓 Account for {} was already present and is now active", email);
                println!("{}", user.token);
            }
        },
        UserCommands::Block { email } => {
            accounts.block(&email).await?;
            info!("🔒 Blocked {}", email);
        }
        UserCommands::Unblock { email } => {
            accounts.unblock(&email).await?;
            info!("🔓 Unblocked {}", email);
        }
        UserCommands::List => {
            for user in accounts.list().await? {
                println!(
                    "{}\t{}\t{}{}",
                    user.id,
                    user.username,
                    user.email.as_deref().unwrap_or("-"),
                    if user.blocked { "\tblocked" } else { "" }
                );
            }
        }
    }
    Ok(())
}

async fn handle_keywords(storage: &Storage, email: &str, delete: Option<&str>) -> Result<()> {
    let user = resolve_user(storage, email).await?;
    match delete {
        Some(keyword) => {
            let record = storage
                .articles
                .get_keyword(user.id, keyword.trim())
                .await?
                .ok_or_else(|| Error::NotFound("Keyword not found.".to_string()))?;
            storage.articles.delete_keyword(&record).await?;
            info!("🗑️ Deleted keyword '{}' for {}", record.keyword, email);
        }
        None => print_json(&storage.articles.list_keywords(user.id).await?)?,
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let database_url = (cli.storage == "sqlite").then_some(cli.database_url.as_str());
    let storage = nw_storage::create_storage(&cli.storage, database_url).await?;
    info!("💾 Storage initialized successfully (using {})", cli.storage);

    match &cli.command {
        Commands::Serve { bind, trending_interval } => {
            let services = create_services(&cli, &storage)?;
            let job = trending_interval.as_ref().map(|interval| {
                info!("📈 Picking the trending keyword every {}s", interval.0.as_secs());
                spawn_trending_job(services.trending.clone(), interval.0)
            });

            let app = nw_web::create_app(AppState::new(services)).await;
            let served = nw_web::serve(app, *bind).await;

            if let Some(job) = job {
                job.stop().await?;
            }
            served?;
        }
        Commands::Search { user, keyword, from, source, category, language } => {
            let services = create_services(&cli, &storage)?;
            let user = resolve_user(&storage, user).await?;
            let filters = SearchFilters {
                published_after: from.clone(),
                source_name: source.clone(),
                source_category: category.clone(),
                language: language.clone(),
            };
            let outcome = services.search.search(user.id, keyword, filters).await?;
            info!(
                "🔎 {} articles for '{}' ({})",
                outcome.articles().len(),
                keyword,
                if outcome.is_cached() { "cached" } else { "fresh" }
            );
            print_json(&outcome.into_articles())?;
        }
        Commands::Refresh { user, keyword } => {
            let services = create_services(&cli, &storage)?;
            let user = resolve_user(&storage, user).await?;
            let articles = services.refresh.refresh(user.id, keyword).await?;
            info!("🔄 {} new articles for '{}'", articles.len(), keyword);
            print_json(&articles)?;
        }
        Commands::Trending => {
            let services = create_services(&cli, &storage)?;
            let trending = services.trending.select_trending().await?;
            print_json(&trending)?;
        }
        Commands::Keywords { user, delete } => {
            handle_keywords(&storage, user, delete.as_deref()).await?;
        }
        Commands::User { command } => {
            let accounts = AccountService::new(storage.users.clone());
            handle_user_command(command.clone(), &accounts).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    run(cli).await
}
