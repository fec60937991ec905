use super::REGISTRY;
use crate::{
    data::Ctx,
    dispatch::{Category, Command, Registry},
    handler, jid,
    utils::uptime as format_uptime,
};
use color_eyre::eyre::Result;
use human_repr::HumanDuration;
use std::{fmt::Write, time::Instant};

pub fn commands() -> Vec<Command> {
    vec![
        Command::new("menu", Category::Basic, "Show all commands", handler!(menu))
            .aliases(&["commands", "list"]),
        Command::new("help", Category::Basic, "Details about one command", handler!(help))
            .usage("<command>"),
        Command::new("ping", Category::Basic, "Check that the bot responds", handler!(ping)),
        Command::new("info", Category::Basic, "About this bot", handler!(info)).aliases(&["about"]),
        Command::new("uptime", Category::Basic, "How long the bot has been running", handler!(uptime)),
    ]
}

fn render_menu(registry: &Registry, bot_name: &str, prefix: &str, user: &str, uptime: &str) -> String {
    let mut text = format!(
        "╭═══〘 ⚡ {bot_name} ⚡ 〙═══⊷❍\n\
         ┃ 👋 Welcome, {user}!\n\
         ┃ ⚡ Prefix: {prefix}\n\
         ┃ ⌛ Uptime: {uptime}\n\
         ┃\n"
    );

    for (category, commands) in registry.by_category() {
        let _ = writeln!(text, "┃ ╭─❏ {}", category.title());
        for command in commands {
            let _ = writeln!(text, "┃ │ ➪ {prefix}{}", command.name);
        }
        text.push_str("┃ ╰──────────────\n┃\n");
    }

    let _ = write!(
        text,
        "╰═══════════════════⊷❍\nType {prefix}help <command> for details"
    );
    text
}

/// Show all commands, grouped by category
async fn menu(ctx: Ctx) -> Result<()> {
    let (bot_name, prefix) = {
        let config = ctx.state.config.read().await;
        (config.bot_name.clone(), config.prefix.clone())
    };
    let uptime = format_uptime(ctx.state.started_at.elapsed());

    ctx.say(render_menu(
        &REGISTRY,
        &bot_name,
        &prefix,
        &ctx.message.display_name(),
        &uptime,
    ))
    .await
}

/// Details about one command
async fn help(ctx: Ctx) -> Result<()> {
    let Some(name) = ctx.args.first().map(|name| name.to_lowercase()) else {
        return ctx.usage("<command>").await;
    };
    let prefix = ctx.prefix().await;
    let name = name.trim_start_matches(prefix.as_str());

    let Some(command) = REGISTRY.get(name) else {
        return ctx
            .say(format!(
                "❌ Unknown command: {name}\nUse {prefix}menu to see available commands."
            ))
            .await;
    };

    let mut text = format!(
        "📖 *{prefix}{}*\n\n{}\n\nCategory: {}\nUsage: {prefix}{} {}",
        command.name,
        command.description,
        command.category.title(),
        command.name,
        command.usage
    );
    if !command.aliases.is_empty() {
        let _ = write!(text, "\nAliases: {}", command.aliases.join(", "));
    }
    if let Some(cooldown) = command.cooldown {
        let _ = write!(text, "\nCooldown: {}", cooldown.human_duration());
    }
    if command.owner_only {
        text.push_str("\n👑 Owner only");
    } else if command.admin_only {
        text.push_str("\n🛡️ Group admins only");
    } else if command.group_only {
        text.push_str("\n👥 Groups only");
    }

    ctx.say(text.trim_end()).await
}

/// Check that the bot responds
async fn ping(ctx: Ctx) -> Result<()> {
    let start = Instant::now();
    let connected = ctx.state.transport.is_connected().await;
    let round_trip = start.elapsed().as_millis();

    ctx.say(format!(
        "🏓 Pong!\n🚀 Bridge round trip: {round_trip}ms\n📶 WhatsApp: {}",
        if connected { "connected" } else { "disconnected" }
    ))
    .await
}

/// About this bot
async fn info(ctx: Ctx) -> Result<()> {
    let (bot_name, owner_name, prefix, owner) = {
        let config = ctx.state.config.read().await;
        (
            config.bot_name.clone(),
            config.owner_name.clone(),
            config.prefix.clone(),
            config
                .owner_numbers
                .first()
                .and_then(|number| jid::user_jid_from_arg(number)),
        )
    };

    let creator = owner.as_deref().map(jid::mention).unwrap_or(owner_name);
    let text = format!(
        "╭━━━❰ *{bot_name}* ❱━━━⊷❍\n\
         ┃ 👑 Creator: {creator}\n\
         ┃ ⌯ Prefix: {prefix}\n\
         ┃ ⌯ Commands: {}\n\
         ┃ ⌯ Status: Active\n\
         ┃ ⌯ Platform: Multi-Device\n\
         ┃ ⌯ Version: {}\n\
         ╰━━━━━━━━━━━━⊷❍",
        REGISTRY.len(),
        env!("CARGO_PKG_VERSION")
    );

    ctx.say_mentioning(text, owner.into_iter().collect()).await
}

/// How long the bot has been running
async fn uptime(ctx: Ctx) -> Result<()> {
    ctx.say(format!(
        "⏱️ Uptime: {}",
        format_uptime(ctx.state.started_at.elapsed())
    ))
    .await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::test_support::*;

    #[test]
    fn menu_lists_every_category() {
        let text = render_menu(&REGISTRY, "Bot", ".", "Alice", "5s");

        assert!(text.contains("👋 Welcome, Alice!"));
        assert!(text.contains("┃ │ ➪ .menu\n"));
        assert!(text.contains("💰 Economy"));
        assert!(text.contains("🔞 NSFW"));
        assert!(text.ends_with("Type .help <command> for details"));
    }

    #[tokio::test]
    async fn help_describes_commands() {
        let (state, transport) = state();

        help(ctx(&state, message(ALICE, ALICE, ".help .daily"), "help")).await.unwrap();
        help(ctx(&state, message(ALICE, ALICE, ".help nope"), "help")).await.unwrap();

        let texts = transport.texts();
        assert!(texts[0].starts_with("📖 *.daily*"));
        assert!(texts[1].starts_with("❌ Unknown command: nope"));
    }

    #[tokio::test]
    async fn info_mentions_owner() {
        let (state, transport) = state();

        info(ctx(&state, message(ALICE, ALICE, ".info"), "info")).await.unwrap();

        let sent = transport.sent.lock().clone();
        assert!(sent[0].text.contains("👑 Creator: @15550000000"));
        assert_eq!(sent[0].mentions, vec![OWNER.to_owned()]);
    }
}
