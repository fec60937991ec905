use super::parse_switch;
use crate::{
    config::validate_prefix,
    data::Ctx,
    dispatch::{Category, Command},
    handler, jid,
    utils::GetRelativeTimestamp,
};
use blacksky_db::settings::MAINTENANCE;
use blacksky_traits::ForwardRefToTracing;
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use itertools::Itertools;
use std::fmt::Write;

pub fn commands() -> Vec<Command> {
    vec![
        Command::new("ban", Category::Owner, "Ignore a user everywhere", handler!(ban))
            .usage("@user")
            .owner_only(),
        Command::new("unban", Category::Owner, "Lift a user ban", handler!(unban))
            .usage("@user")
            .owner_only(),
        Command::new("banlist", Category::Owner, "List banned users and groups", handler!(banlist))
            .owner_only(),
        Command::new("bangroup", Category::Owner, "Ignore a whole group", handler!(bangroup))
            .usage("[group jid]")
            .owner_only(),
        Command::new("unbangroup", Category::Owner, "Lift a group ban", handler!(unbangroup))
            .usage("[group jid]")
            .owner_only(),
        Command::new("block", Category::Owner, "Block a user on WhatsApp", handler!(block))
            .usage("@user")
            .owner_only(),
        Command::new("unblock", Category::Owner, "Unblock a user on WhatsApp", handler!(unblock))
            .usage("@user")
            .owner_only(),
        Command::new("maintenance", Category::Owner, "Toggle maintenance mode", handler!(maintenance))
            .usage("on|off")
            .owner_only(),
        Command::new("setprefix", Category::Owner, "Change the command prefix", handler!(setprefix))
            .usage("<prefix>")
            .owner_only(),
        Command::new("broadcast", Category::Owner, "Message every group the bot is in", handler!(broadcast))
            .aliases(&["bc"])
            .usage("<message>")
            .owner_only(),
    ]
}

/// Ban a user
async fn ban(ctx: Ctx) -> Result<()> {
    let Some(user) = ctx.target() else {
        return ctx.usage("@user").await;
    };
    if ctx.state.is_owner(&user).await {
        return ctx.say("❌ You can't ban the bot owner!").await;
    }

    let text = if ctx.state.banned_users.ban(&user, Utc::now())? {
        tracing::info!("{} banned {user}", ctx.author());
        format!("✅ Banned {}", jid::mention(&user))
    } else {
        format!("ℹ️ {} is already banned", jid::mention(&user))
    };
    ctx.say_mentioning(text, vec![user]).await
}

/// Lift a user ban
async fn unban(ctx: Ctx) -> Result<()> {
    let Some(user) = ctx.target() else {
        return ctx.usage("@user").await;
    };

    let text = if ctx.state.banned_users.unban(&user)? {
        tracing::info!("{} unbanned {user}", ctx.author());
        format!("✅ Unbanned {}", jid::mention(&user))
    } else {
        format!("ℹ️ {} is not banned", jid::mention(&user))
    };
    ctx.say_mentioning(text, vec![user]).await
}

fn render_bans(title: &str, bans: &[(String, DateTime<Utc>)], now: DateTime<Utc>) -> String {
    let mut text = format!("🚫 *{title}* ({})\n", bans.len());
    for (i, (banned, since)) in bans.iter().enumerate() {
        let _ = writeln!(text, "{}. {banned} ({})", i + 1, since.relative_timestamp(now));
    }
    text
}

/// List banned users and groups
async fn banlist(ctx: Ctx) -> Result<()> {
    let users = ctx.state.banned_users.list();
    let groups = ctx.state.banned_groups.list();
    if users.is_empty() && groups.is_empty() {
        return ctx.say("✅ Nobody is banned.").await;
    }

    let now = Utc::now();
    let text = [("Banned Users", &users), ("Banned Groups", &groups)]
        .into_iter()
        .filter(|(_, bans)| !bans.is_empty())
        .map(|(title, bans)| render_bans(title, bans, now))
        .join("\n");
    ctx.say(text.trim_end()).await
}

/// The group named in the arguments, else the current chat when it is a group.
fn target_group(ctx: &Ctx) -> Option<String> {
    match ctx.args.first() {
        Some(arg) => jid::is_group(arg).then(|| arg.to_owned()),
        None => ctx.is_group().then(|| ctx.chat().to_owned()),
    }
}

async fn set_group_ban(ctx: Ctx, banned: bool) -> Result<()> {
    let Some(group) = target_group(&ctx) else {
        return ctx.usage("[group jid]").await;
    };

    let list = &ctx.state.banned_groups;
    let changed = if banned {
        list.ban(&group, Utc::now())?
    } else {
        list.unban(&group)?
    };
    tracing::info!("{} set ban={banned} on group {group} (changed: {changed})", ctx.author());

    let text = match (banned, changed) {
        (true, true) => format!("✅ Group {group} is now banned"),
        (true, false) => format!("ℹ️ Group {group} is already banned"),
        (false, true) => format!("✅ Group {group} is no longer banned"),
        (false, false) => format!("ℹ️ Group {group} is not banned"),
    };
    ctx.say(text).await
}

/// Ignore a whole group
async fn bangroup(ctx: Ctx) -> Result<()> {
    set_group_ban(ctx, true).await
}

/// Lift a group ban
async fn unbangroup(ctx: Ctx) -> Result<()> {
    set_group_ban(ctx, false).await
}

async fn set_blocked(ctx: Ctx, blocked: bool) -> Result<()> {
    let Some(user) = ctx.target() else {
        return ctx.usage("@user").await;
    };
    if blocked && ctx.state.is_owner(&user).await {
        return ctx.say("❌ You can't block the bot owner!").await;
    }

    ctx.state.transport.set_blocked(&user, blocked).await?;
    tracing::info!("{} set blocked={blocked} on {user}", ctx.author());

    let verb = if blocked { "Blocked" } else { "Unblocked" };
    ctx.say_mentioning(format!("✅ {verb} {}", jid::mention(&user)), vec![user])
        .await
}

/// Block a user on WhatsApp
async fn block(ctx: Ctx) -> Result<()> {
    set_blocked(ctx, true).await
}

/// Unblock a user on WhatsApp
async fn unblock(ctx: Ctx) -> Result<()> {
    set_blocked(ctx, false).await
}

/// Toggle maintenance mode
async fn maintenance(ctx: Ctx) -> Result<()> {
    let Some(enabled) = parse_switch(ctx.args.first()) else {
        let current = ctx.state.settings.flag(MAINTENANCE)?;
        let prefix = ctx.prefix().await;
        return ctx
            .say(format!(
                "ℹ️ Maintenance mode is currently {}\nUsage: {prefix}maintenance on|off",
                if current { "on" } else { "off" }
            ))
            .await;
    };

    ctx.state.settings.set_flag(MAINTENANCE, enabled)?;
    tracing::warn!("maintenance mode set to {enabled} by {}", ctx.author());

    if enabled {
        ctx.say("🛠️ Maintenance mode enabled. Only the owner can use commands now.")
            .await
    } else {
        ctx.say("✅ Maintenance mode disabled. Everyone can use commands again.")
            .await
    }
}

/// Change the command prefix and write it to the config file
async fn setprefix(ctx: Ctx) -> Result<()> {
    let Some(prefix) = ctx.args.first() else {
        return ctx.usage("<prefix>").await;
    };
    if let Err(e) = validate_prefix(prefix) {
        return ctx.say(format!("❌ Invalid prefix: {e}")).await;
    }

    let config = {
        let mut config = ctx.state.config.write().await;
        config.prefix.clone_from(prefix);
        config.clone()
    };
    tracing::info!("prefix set to {prefix} by {}", ctx.author());

    if let Some(path) = &ctx.state.config_path {
        config.save(path)?;
    }

    ctx.say(format!("✅ Prefix set to *{prefix}*\nTry {prefix}menu")).await
}

/// Message every group the bot is in
async fn broadcast(ctx: Ctx) -> Result<()> {
    let text = ctx.rest();
    if text.is_empty() {
        return ctx.usage("<message>").await;
    }

    let bot_name = ctx.state.config.read().await.bot_name.clone();
    let announcement = format!("📢 *Broadcast from {bot_name}*\n\n{text}");

    let mut groups = ctx.state.transport.joined_groups().await?;
    groups.retain(|group| !ctx.state.banned_groups.is_banned(group).unwrap_or(false));

    let mut delivered = 0;
    for group in &groups {
        if ctx
            .state
            .transport
            .send_text(group, &announcement, &[])
            .await
            .trace_warn_ok(&format!("broadcast to {group}"))
            .is_some()
        {
            delivered += 1;
        }
    }
    tracing::info!("broadcast delivered to {delivered}/{} groups", groups.len());

    ctx.say(format!("✅ Broadcast sent to {delivered}/{} groups", groups.len()))
        .await
}
