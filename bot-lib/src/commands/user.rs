use crate::{
    data::Ctx,
    dispatch::{Category, Command},
    handler, jid,
    utils::{GetRelativeTimestamp, thousands},
};
use color_eyre::eyre::Result;
use itertools::Itertools;

pub fn commands() -> Vec<Command> {
    vec![
        Command::new("register", Category::User, "Register with your name and age", handler!(register))
            .aliases(&["reg"])
            .usage("<name> <age>"),
        Command::new("profile", Category::User, "Show a profile", handler!(profile))
            .aliases(&["me"])
            .usage("[@user]"),
        Command::new("rank", Category::User, "Your level and XP", handler!(rank)).aliases(&["level", "xp"]),
        Command::new("setpref", Category::User, "Save a personal preference", handler!(setpref))
            .usage("<key> <value>"),
        Command::new("prefs", Category::User, "List your preferences", handler!(prefs)).usage("[key]"),
    ]
}

/// XP needed to reach `level`, the inverse of the level formula.
pub fn xp_for_level(level: u32) -> u64 {
    let level = u64::from(level);
    100 * level * level
}

/// Register with your name and age
async fn register(ctx: Ctx) -> Result<()> {
    let prefix = ctx.prefix().await;
    let Some((age, name)) = ctx.args.split_last() else {
        return ctx
            .say(format!(
                "❌ Please provide your name and age!\nUsage: {prefix}register <name> <age>"
            ))
            .await;
    };
    if name.is_empty() {
        return ctx
            .say(format!(
                "❌ Please provide your name and age!\nUsage: {prefix}register <name> <age>"
            ))
            .await;
    }

    let age = match age.parse::<u8>() {
        Ok(age @ 1..=100) => age,
        _ => return ctx.say("❌ Please provide a valid age between 1 and 100!").await,
    };
    if age < 18 {
        return ctx
            .say("🔞 Sorry, you must be 18 or older to register for NSFW content!")
            .await;
    }

    let name = name.join(" ");
    let author = ctx.author();
    ctx.state
        .users
        .register(&author, &name, age, chrono::Utc::now())?;
    tracing::info!("registered {author} as {name}");

    ctx.say(format!(
        "✅ Registration successful!\n\nName: {name}\nAge: {age}\n\nYou can now use NSFW commands.\nUse {prefix}nsfwcheck to verify your status."
    ))
    .await
}

/// Show a profile
async fn profile(ctx: Ctx) -> Result<()> {
    let target = ctx.target().unwrap_or_else(|| ctx.author());
    let user = ctx.state.users.get(&target)?;
    let now = chrono::Utc::now();

    let games = user
        .games
        .iter()
        .map(|(game, stats)| format!("• {game}: {}/{} won", stats.won, stats.played))
        .join("\n");

    let mut text = format!(
        "👤 *Profile of {}*\n\n\
         • Name: {}\n\
         • Age: {}\n\
         • Level: {} ({} XP)\n\
         • Wallet: {} gold\n\
         • Bank: {} gold\n\
         • Registered: {}",
        jid::mention(&target),
        user.name.as_deref().unwrap_or("Not registered"),
        user.age.map_or_else(|| "Not set".to_owned(), |age| age.to_string()),
        user.level,
        thousands(user.xp as i64),
        thousands(user.gold),
        thousands(user.bank),
        user.registered_at
            .map_or_else(|| "No".to_owned(), |at| at.relative_timestamp(now)),
    );
    if !games.is_empty() {
        text.push_str("\n\n🎮 *Games*\n");
        text.push_str(&games);
    }

    ctx.say_mentioning(text, vec![target]).await
}

/// Your level and XP
async fn rank(ctx: Ctx) -> Result<()> {
    let user = ctx.state.users.get(&ctx.author())?;
    let next = xp_for_level(user.level + 1);

    ctx.say(format!(
        "⭐ *Rank*\n\nLevel: {}\nXP: {} / {}\n{} XP to level {}",
        user.level,
        user.xp,
        next,
        next.saturating_sub(user.xp),
        user.level + 1
    ))
    .await
}

/// Save a personal preference
async fn setpref(ctx: Ctx) -> Result<()> {
    let Some((key, value)) = ctx.args.split_first().filter(|(_, value)| !value.is_empty()) else {
        return ctx.usage("<key> <value>").await;
    };

    let value = value.join(" ");
    ctx.state
        .users
        .set_preference(&ctx.author(), key, &value)?;
    ctx.say(format!("✅ Preference *{}* set to: {value}", key.to_lowercase()))
        .await
}

/// List your preferences, or show one
async fn prefs(ctx: Ctx) -> Result<()> {
    if let Some(key) = ctx.args.first() {
        let text = match ctx.state.users.preference(&ctx.author(), key)? {
            Some(value) => format!("⚙️ {}: {value}", key.to_lowercase()),
            None => format!("⚙️ No preference saved for *{}*", key.to_lowercase()),
        };
        return ctx.say(text).await;
    }

    let user = ctx.state.users.get(&ctx.author())?;
    if user.preferences.is_empty() {
        let prefix = ctx.prefix().await;
        return ctx
            .say(format!("⚙️ No preferences saved. Use {prefix}setpref <key> <value>"))
            .await;
    }

    let lines = user
        .preferences
        .iter()
        .map(|(key, value)| format!("• {key}: {value}"))
        .join("\n");
    ctx.say(format!("⚙️ *Your Preferences*\n\n{lines}")).await
}
