//! Prefix parsing, the command registry and the dispatcher that runs handlers.

use crate::{
    data::{CommandKey, Ctx, State},
    jid,
    whatsapp::InboundMessage,
};
use ahash::AHashMap;
use blacksky_db::{StoreError, settings::MAINTENANCE};
use color_eyre::eyre::Result;
use futures::future::BoxFuture;
use human_repr::HumanDuration;
use itertools::Itertools;
use std::{fmt, sync::Arc, time::Duration, time::Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lower-cased command name.
    pub name: String,
    pub args: Vec<String>,
}

/// Splits `<prefix><command> <args...>`. `None` if the prefix is missing or nothing follows it.
pub fn parse(text: &str, prefix: &str) -> Option<ParsedCommand> {
    let rest = text.trim_start().strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?.to_lowercase();
    Some(ParsedCommand {
        name,
        args: words.map(str::to_owned).collect(),
    })
}

pub type Handler = fn(Ctx) -> BoxFuture<'static, Result<()>>;

/// Wraps an `async fn(Ctx) -> Result<()>` into a [`Handler`].
#[macro_export]
macro_rules! handler {
    ($f:path) => {{
        fn run(ctx: $crate::data::Ctx) -> $crate::dispatch::HandlerFuture {
            Box::pin($f(ctx))
        }
        run as $crate::dispatch::Handler
    }};
}

pub type HandlerFuture = BoxFuture<'static, Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Basic,
    Economy,
    User,
    Group,
    Owner,
    Fun,
    Games,
    Anime,
    Ai,
    Search,
    Nsfw,
}

impl Category {
    pub fn title(self) -> &'static str {
        match self {
            Category::Basic => "🧭 Basic",
            Category::Economy => "💰 Economy",
            Category::User => "👤 User",
            Category::Group => "👥 Group",
            Category::Owner => "👑 Owner",
            Category::Fun => "🎉 Fun",
            Category::Games => "🎮 Games",
            Category::Anime => "🌸 Anime",
            Category::Ai => "🤖 AI",
            Category::Search => "🔎 Search",
            Category::Nsfw => "🔞 NSFW",
        }
    }
}

#[derive(Clone, Copy)]
pub struct Command {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub category: Category,
    pub description: &'static str,
    pub usage: &'static str,
    pub owner_only: bool,
    pub group_only: bool,
    pub admin_only: bool,
    pub cooldown: Option<Duration>,
    pub handler: Handler,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

impl Command {
    pub fn new(
        name: &'static str,
        category: Category,
        description: &'static str,
        handler: Handler,
    ) -> Self {
        Command {
            name,
            aliases: &[],
            category,
            description,
            usage: "",
            owner_only: false,
            group_only: false,
            admin_only: false,
            cooldown: None,
            handler,
        }
    }

    pub fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn usage(mut self, usage: &'static str) -> Self {
        self.usage = usage;
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.owner_only = true;
        self
    }

    pub fn group_only(mut self) -> Self {
        self.group_only = true;
        self
    }

    /// Group admins only. Implies group only.
    pub fn admin_only(mut self) -> Self {
        self.group_only = true;
        self.admin_only = true;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }
}

/// Name and alias lookup over a fixed command list.
pub struct Registry {
    commands: Vec<Command>,
    index: AHashMap<&'static str, usize>,
}

impl Registry {
    pub fn new(commands: impl IntoIterator<Item = Command>) -> Self {
        let commands = commands.into_iter().collect_vec();
        let mut index = AHashMap::new();

        for (i, command) in commands.iter().enumerate() {
            for name in std::iter::once(&command.name).chain(command.aliases) {
                if let Some(previous) = index.insert(*name, i) {
                    tracing::warn!(
                        "`{name}` registered by both {} and {}",
                        commands[previous].name,
                        command.name
                    );
                }
            }
        }

        Registry { commands, index }
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.index.get(name).map(|&i| &self.commands[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Commands grouped by category, in category order.
    pub fn by_category(&self) -> Vec<(Category, Vec<&Command>)> {
        self.commands
            .iter()
            .into_group_map_by(|command| command.category)
            .into_iter()
            .sorted_by_key(|(category, _)| *category)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Why a command was not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    Unknown(String),
    Maintenance,
    OwnerOnly,
    GroupOnly,
    AdminOnly,
    RateLimited(Duration),
    Cooldown(Duration),
}

impl Refusal {
    pub fn message(&self, prefix: &str, command: &str) -> String {
        match self {
            Refusal::Unknown(name) => format!(
                "❌ Unknown command: {name}\nUse {prefix}menu to see available commands."
            ),
            Refusal::Maintenance => {
                "🛠️ The bot is under maintenance. Please try again later.".to_owned()
            }
            Refusal::OwnerOnly => "❌ This command is only for the bot owner!".to_owned(),
            Refusal::GroupOnly => "⚠️ This command can only be used in groups!".to_owned(),
            Refusal::AdminOnly => "⚠️ Only admins can use this command!".to_owned(),
            Refusal::RateLimited(retry) => format!(
                "⏳ You're using {prefix}{command} too often, try again in {}",
                wait(*retry)
            ),
            Refusal::Cooldown(retry) => format!(
                "⏳ {prefix}{command} is cooling down, try again in {}",
                wait(*retry)
            ),
        }
    }
}

pub(crate) fn wait(duration: Duration) -> String {
    Duration::from_secs(duration.as_secs().max(1))
        .human_duration()
        .to_string()
}

/// Turns a handler failure into the chat reply.
///
/// Store rule violations (no money, cooldown) are shown as they are; anything
/// else is reported as an execution error.
pub fn error_reply(error: &color_eyre::eyre::Report) -> String {
    match error.downcast_ref::<StoreError>() {
        Some(store_error) if store_error.is_user_facing() => format!("❌ {store_error}"),
        _ => format!("❌ Error executing command: {error}"),
    }
}

/// Checks gates and limits, then runs the command. Replies to the chat in every case.
pub async fn dispatch(
    state: &State,
    registry: &Registry,
    message: Arc<InboundMessage>,
    parsed: ParsedCommand,
) -> Result<()> {
    let author = message.author();
    let (prefix, limits, command_xp) = {
        let config = state.config.read().await;
        (config.prefix.clone(), config.rate_limit.clone(), config.xp.command)
    };

    let Some(command) = registry.get(&parsed.name) else {
        tracing::debug!("unknown command `{}` from {author}", parsed.name);
        let reply = Refusal::Unknown(parsed.name.clone()).message(&prefix, &parsed.name);
        state.transport.send_text(&message.chat, &reply, &[]).await?;
        return Ok(());
    };

    if let Err(refusal) = admit(state, command, &message, &author, &limits).await {
        tracing::info!("{author} refused `{}`: {refusal:?}", command.name);
        let reply = refusal.message(&prefix, command.name);
        state.transport.send_text(&message.chat, &reply, &[]).await?;
        return Ok(());
    }

    tracing::info!("{author} runs `{}` in {}", command.name, message.chat);

    let ctx = Ctx {
        state: Arc::clone(state),
        message: Arc::clone(&message),
        command: command.name,
        args: parsed.args,
    };

    if let Err(e) = (command.handler)(ctx).await {
        tracing::error!("`{}` failed for {author}: {e:?}", command.name);
        state.cooldowns.undo(&(Arc::from(author.as_str()), command.name));
        state
            .transport
            .send_text(&message.chat, &error_reply(&e), &[])
            .await?;
        return Ok(());
    }

    let gain = state.users.add_xp(&author, command_xp)?;
    if gain.leveled_up() {
        state
            .transport
            .send_text(
                &message.chat,
                &format!(
                    "🎉 Congratulations {}! You reached level {}!",
                    jid::mention(&author),
                    gain.level
                ),
                &[author.clone()],
            )
            .await?;
    }

    Ok(())
}

async fn admit(
    state: &State,
    command: &Command,
    message: &InboundMessage,
    author: &str,
    limits: &crate::config::RateLimitConfig,
) -> Result<(), Refusal> {
    let owner = state.is_owner(author).await;

    if !owner && state.settings.flag(MAINTENANCE).unwrap_or(false) {
        return Err(Refusal::Maintenance);
    }
    if command.owner_only && !owner {
        return Err(Refusal::OwnerOnly);
    }
    if command.group_only && !message.is_group() {
        return Err(Refusal::GroupOnly);
    }
    if command.admin_only && !owner && !state.is_group_admin(&message.chat, author).await {
        return Err(Refusal::AdminOnly);
    }

    let key: CommandKey = (Arc::from(author), command.name);
    let now = Instant::now();
    state
        .limiter
        .peek(&key, limits.per_command, limits.window, now)
        .map_err(Refusal::RateLimited)?;

    if let Some(cooldown) = command.cooldown {
        state
            .cooldowns
            .check(key.clone(), 1, cooldown, now)
            .map_err(Refusal::Cooldown)?;
    }

    state
        .limiter
        .check(key.clone(), limits.per_command, limits.window, now)
        .map_err(|retry| {
            state.cooldowns.undo(&key);
            Refusal::RateLimited(retry)
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::test_support::*;
    use color_eyre::eyre::bail;

    async fn ok(_ctx: Ctx) -> Result<()> {
        Ok(())
    }

    async fn echo(ctx: Ctx) -> Result<()> {
        ctx.say(format!("echo {}", ctx.rest())).await
    }

    async fn broken(_ctx: Ctx) -> Result<()> {
        bail!("the API is down")
    }

    async fn broke_user(_ctx: Ctx) -> Result<()> {
        Err(StoreError::InvalidAmount.into())
    }

    async fn picky(ctx: Ctx) -> Result<()> {
        if ctx.args.is_empty() {
            return ctx.usage("<thing>").await;
        }
        ctx.say("picked").await
    }

    fn registry() -> Registry {
        Registry::new([
            Command::new("echo", Category::Basic, "repeat", handler!(echo)).aliases(&["say"]),
            Command::new("broken", Category::Basic, "fails", handler!(broken)),
            Command::new("pay", Category::Economy, "fails politely", handler!(broke_user)),
            Command::new("secret", Category::Owner, "owners", handler!(ok)).owner_only(),
            Command::new("kick", Category::Group, "admins", handler!(ok)).admin_only(),
            Command::new("slow", Category::Fun, "cooldown", handler!(ok))
                .cooldown(Duration::from_secs(30)),
            Command::new("picky", Category::Fun, "cooldown, needs an argument", handler!(picky))
                .usage("<thing>")
                .cooldown(Duration::from_secs(30)),
        ])
    }

    async fn run(state: &State, message: InboundMessage) {
        let parsed = parse(&message.text, ".").unwrap();
        dispatch(state, &registry(), Arc::new(message), parsed)
            .await
            .unwrap();
    }

    #[test]
    fn parse_splits_name_and_args() {
        assert_eq!(
            parse("  .BaLance  @123   50 ", "."),
            Some(ParsedCommand {
                name: "balance".to_owned(),
                args: vec!["@123".to_owned(), "50".to_owned()],
            })
        );
        assert_eq!(parse("hello", "."), None);
        assert_eq!(parse(".   ", "."), None);
        assert_eq!(parse("!ping", "!").unwrap().name, "ping");
    }

    #[test]
    fn registry_resolves_aliases_and_groups() {
        let registry = registry();

        assert_eq!(registry.get("say").map(|c| c.name), Some("echo"));
        assert!(registry.get("nope").is_none());

        let categories = registry.by_category();
        assert_eq!(categories[0].0, Category::Basic);
        assert_eq!(categories[0].1.len(), 2);
    }

    #[tokio::test]
    async fn unknown_command_replies_not_found() {
        let (state, transport) = state();

        run(&state, message(ALICE, ALICE, ".frobnicate now")).await;

        assert_eq!(
            transport.texts(),
            vec!["❌ Unknown command: frobnicate\nUse .menu to see available commands."]
        );
    }

    #[tokio::test]
    async fn alias_runs_handler_and_awards_xp() {
        let (state, transport) = state();

        run(&state, message(ALICE, ALICE, ".say hi there")).await;

        assert_eq!(transport.texts(), vec!["echo hi there"]);
        assert_eq!(state.users.get(ALICE).unwrap().xp, 5);
    }

    #[tokio::test]
    async fn handler_errors_are_reported() {
        let (state, transport) = state();

        run(&state, message(ALICE, ALICE, ".broken")).await;
        run(&state, message(ALICE, ALICE, ".pay")).await;

        assert_eq!(
            transport.texts(),
            vec![
                "❌ Error executing command: the API is down",
                "❌ Please enter a valid amount greater than 0!",
            ]
        );
        assert_eq!(state.users.get(ALICE).unwrap().xp, 0);
    }

    #[tokio::test]
    async fn gates_are_enforced() {
        let (state, transport) = state_with(
            crate::whatsapp::fake::FakeTransport::default().with_group(GROUP, &[BOB], &[ALICE]),
        );

        run(&state, message(ALICE, ALICE, ".secret")).await;
        run(&state, message(OWNER, OWNER, ".secret")).await;
        run(&state, message(ALICE, ALICE, ".kick")).await;
        run(&state, message(GROUP, ALICE, ".kick")).await;
        run(&state, message(GROUP, BOB, ".kick")).await;

        assert_eq!(
            transport.texts(),
            vec![
                "❌ This command is only for the bot owner!",
                "⚠️ This command can only be used in groups!",
                "⚠️ Only admins can use this command!",
            ]
        );
    }

    #[tokio::test]
    async fn maintenance_lets_only_owners_through() {
        let (state, transport) = state();
        state.settings.set_flag(MAINTENANCE, true).unwrap();

        run(&state, message(ALICE, ALICE, ".echo a")).await;
        run(&state, message(OWNER, OWNER, ".echo b")).await;

        assert_eq!(
            transport.texts(),
            vec![
                "🛠️ The bot is under maintenance. Please try again later.",
                "echo b"
            ]
        );
    }

    #[tokio::test]
    async fn limits_and_cooldowns_refuse() {
        let (state, transport) = state();

        run(&state, message(ALICE, ALICE, ".slow")).await;
        run(&state, message(ALICE, ALICE, ".slow")).await;
        for _ in 0..6 {
            run(&state, message(BOB, BOB, ".echo x")).await;
        }

        let texts = transport.texts();
        assert!(texts[0].starts_with("⏳ .slow is cooling down, try again in"));
        assert_eq!(texts.iter().filter(|t| *t == "echo x").count(), 5);
        assert!(texts[6].starts_with("⏳ You're using .echo too often"));
    }

    #[tokio::test]
    async fn cooldown_refusals_spare_the_request_budget() {
        let (state, transport) = state();

        run(&state, message(ALICE, ALICE, ".slow")).await;
        for _ in 0..10 {
            run(&state, message(ALICE, ALICE, ".slow")).await;
        }

        let texts = transport.texts();
        assert_eq!(texts.len(), 10);
        assert!(texts.iter().all(|text| text.starts_with("⏳ .slow is cooling down")));
        assert!(state
            .limiter
            .peek(&(Arc::from(ALICE), "slow"), 2, Duration::from_secs(60), Instant::now())
            .is_ok());
    }

    #[tokio::test]
    async fn usage_errors_do_not_start_the_cooldown() {
        let (state, transport) = state();

        run(&state, message(ALICE, ALICE, ".picky")).await;
        run(&state, message(ALICE, ALICE, ".picky apples")).await;
        run(&state, message(ALICE, ALICE, ".picky pears")).await;

        let texts = transport.texts();
        assert_eq!(texts[0], "❌ Usage: .picky <thing>");
        assert_eq!(texts[1], "picked");
        assert!(texts[2].starts_with("⏳ .picky is cooling down"));
    }

    #[tokio::test]
    async fn level_up_is_announced() {
        let (state, transport) = state();
        state.users.add_xp(ALICE, 398).unwrap();

        run(&state, message(ALICE, ALICE, ".echo up")).await;

        let sent = transport.sent.lock().clone();
        assert_eq!(sent[1].text, "🎉 Congratulations @15550001111! You reached level 2!");
        assert_eq!(sent[1].mentions, vec![ALICE.to_owned()]);
    }
}
