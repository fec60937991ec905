use crate::{
    config::{Config, Secrets},
    conversation::Conversations,
    games::GameSessions,
    jid,
    rate_limit::RateLimiter,
    whatsapp::{BridgeTransport, InboundMessage, Transport},
};
use blacksky_db::{
    BotDb, bans::BanList, groups::GroupDb, settings::SettingsDb, users::UserDb,
};
use color_eyre::eyre::{Result, WrapErr};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

/// The global state of the bot
pub type State = Arc<RawAppState>;

/// Limiter key: who ran which command.
pub type CommandKey = (Arc<str>, &'static str);

pub struct RawAppState {
    pub config: Arc<RwLock<Config>>,
    /// Config file watcher that refreshes the config if it changes
    ///
    /// Attached to the AppState to keep the watcher alive
    _watcher: Option<notify::RecommendedWatcher>,
    /// Where config edits made from chat are written back. `None` keeps them in memory.
    pub config_path: Option<PathBuf>,
    pub secrets: Secrets,
    pub db: BotDb,
    pub users: UserDb,
    pub groups: GroupDb,
    pub banned_users: BanList,
    pub banned_groups: BanList,
    pub settings: SettingsDb,
    pub transport: Arc<dyn Transport>,
    /// Shared client for third-party APIs.
    pub http: reqwest::Client,
    /// Per (user, command) request window.
    pub limiter: RateLimiter<CommandKey>,
    /// Per (user, command) cooldowns declared by commands.
    pub cooldowns: RateLimiter<CommandKey>,
    /// Per chat message flood counter for anti-spam.
    pub flood: RateLimiter<Arc<str>>,
    pub games: GameSessions,
    pub conversations: Conversations,
    pub started_at: Instant,
}

impl RawAppState {
    /// Opens the store, connects the bridge client and watches `config_path` for edits.
    pub fn new(config: Config, config_path: String, secrets: Secrets) -> Result<RawAppState> {
        let db = BotDb::open(&config.database_path).wrap_err("Failed to open store")?;
        let transport = BridgeTransport::new(
            &config.bridge.url,
            config.bridge.timeout,
            secrets.bridge_secret.clone(),
        )?;

        let mut state = RawAppState::with_parts(config, db, Arc::new(transport), secrets)?;

        use notify::{
            Event, EventKind, RecursiveMode, Watcher,
            event::{AccessKind, AccessMode},
        };

        let config_clone = Arc::clone(&state.config);
        let reload_config_path = config_path.clone();
        let config_path: Box<Path> = Path::new(&config_path).into();

        let mut watcher = notify::recommended_watcher(move |res| match res {
            Ok(Event {
                kind: EventKind::Access(AccessKind::Close(AccessMode::Write)),
                ..
            }) => {
                tracing::info!("config changed, reloading...");

                config_clone.blocking_write().reload(&*reload_config_path);
            }
            Err(e) => tracing::error!("watch error: {:?}", e),
            _ => {}
        })
        .wrap_err("Failed to create file watcher")?;

        watcher
            .watch(&config_path, RecursiveMode::NonRecursive)
            .wrap_err("Failed to watch config file")?;

        state._watcher = Some(watcher);
        state.config_path = Some(config_path.to_path_buf());

        Ok(state)
    }

    /// State without a config watcher, over an already opened store.
    pub fn with_parts(
        config: Config,
        db: BotDb,
        transport: Arc<dyn Transport>,
        secrets: Secrets,
    ) -> Result<RawAppState> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(concat!("blacksky/", env!("CARGO_PKG_VERSION")))
            .build()
            .wrap_err("Failed to create HTTP client")?;

        Ok(RawAppState {
            config: Arc::new(RwLock::new(config)),
            _watcher: None,
            config_path: None,
            secrets,
            users: UserDb::new(&db)?,
            groups: GroupDb::new(&db)?,
            banned_users: BanList::users(&db)?,
            banned_groups: BanList::groups(&db)?,
            settings: SettingsDb::new(&db)?,
            db,
            transport,
            http,
            limiter: RateLimiter::new(),
            cooldowns: RateLimiter::new(),
            flood: RateLimiter::new(),
            games: GameSessions::default(),
            conversations: Conversations::default(),
            started_at: Instant::now(),
        })
    }

    pub async fn is_owner(&self, user: &str) -> bool {
        jid::is_owner(user, &self.config.read().await.owner_numbers)
    }

    /// Group admin according to the bridge's metadata. Lookup failures count as "no".
    pub async fn is_group_admin(&self, group: &str, user: &str) -> bool {
        match self.transport.group_metadata(group).await {
            Ok(metadata) => metadata.is_admin(user),
            Err(e) => {
                tracing::warn!("could not fetch metadata for {group}: {e:?}");
                false
            }
        }
    }
}

/// Everything a command handler gets.
#[derive(Clone)]
pub struct Ctx {
    pub state: State,
    pub message: Arc<InboundMessage>,
    /// The registry name of the running command (aliases resolved).
    pub command: &'static str,
    pub args: Vec<String>,
}

impl Ctx {
    pub fn chat(&self) -> &str {
        &self.message.chat
    }

    pub fn author(&self) -> String {
        self.message.author()
    }

    pub fn is_group(&self) -> bool {
        self.message.is_group()
    }

    /// All arguments joined back with single spaces.
    pub fn rest(&self) -> String {
        self.args.join(" ")
    }

    /// The user a command targets: the first mention, else the first argument with digits.
    pub fn target(&self) -> Option<String> {
        self.message
            .mentions
            .first()
            .map(|m| jid::normalize(m))
            .or_else(|| self.args.first().and_then(|arg| jid::user_jid_from_arg(arg)))
    }

    pub async fn prefix(&self) -> String {
        self.state.config.read().await.prefix.clone()
    }

    pub async fn say(&self, text: impl AsRef<str>) -> Result<()> {
        self.state
            .transport
            .send_text(self.chat(), text.as_ref(), &[])
            .await?;
        Ok(())
    }

    pub async fn say_mentioning(&self, text: impl AsRef<str>, mentions: Vec<String>) -> Result<()> {
        self.state
            .transport
            .send_text(self.chat(), text.as_ref(), &mentions)
            .await?;
        Ok(())
    }

    pub async fn send_image(&self, url: &str, caption: impl AsRef<str>, mentions: Vec<String>) -> Result<()> {
        self.state
            .transport
            .send_image(self.chat(), url, Some(caption.as_ref()), &mentions)
            .await?;
        Ok(())
    }

    /// Replies with the usage line for the running command.
    /// Replies with the usage line. A misused command does not count towards its cooldown.
    pub async fn usage(&self, usage: &str) -> Result<()> {
        self.state
            .cooldowns
            .undo(&(Arc::from(self.author().as_str()), self.command));
        let prefix = self.prefix().await;
        self.say(format!("❌ Usage: {prefix}{} {usage}", self.command))
            .await
    }
}
