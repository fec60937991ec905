use super::parse_switch;
use crate::{
    MentionableExt,
    data::Ctx,
    dispatch::{Category, Command},
    handler, jid, moderation,
    whatsapp::ParticipantAction,
};
use blacksky_db::groups::Toggle;
use color_eyre::eyre::Result;
use itertools::Itertools;

pub fn commands() -> Vec<Command> {
    vec![
        Command::new("kick", Category::Group, "Remove members from the group", handler!(kick))
            .aliases(&["remove"])
            .usage("@user...")
            .admin_only(),
        Command::new("promote", Category::Group, "Make members admins", handler!(promote))
            .usage("@user...")
            .admin_only(),
        Command::new("demote", Category::Group, "Take admin rights away", handler!(demote))
            .usage("@user...")
            .admin_only(),
        Command::new("warn", Category::Group, "Warn a member", handler!(warn))
            .usage("@user [reason]")
            .admin_only(),
        Command::new("warnings", Category::Group, "Show a member's warnings", handler!(warnings))
            .usage("[@user]")
            .group_only(),
        Command::new("resetwarn", Category::Group, "Clear a member's warnings", handler!(resetwarn))
            .aliases(&["delwarn"])
            .usage("@user")
            .admin_only(),
        Command::new("antilink", Category::Group, "Warn members who post invite links", handler!(antilink))
            .usage("on|off")
            .admin_only(),
        Command::new("antispam", Category::Group, "Warn members who spam", handler!(antispam))
            .usage("on|off")
            .admin_only(),
        Command::new("setnsfw", Category::Group, "Allow NSFW commands in this group", handler!(setnsfw))
            .usage("on|off")
            .admin_only(),
        Command::new("setwelcome", Category::Group, "Greeting for new members (@user, @group)", handler!(setwelcome))
            .usage("<text|off>")
            .admin_only(),
        Command::new("setrules", Category::Group, "Set the group rules", handler!(setrules))
            .usage("<text>")
            .admin_only(),
        Command::new("rules", Category::Group, "Show the group rules", handler!(rules)).group_only(),
        Command::new("groupinfo", Category::Group, "About this group", handler!(groupinfo))
            .aliases(&["ginfo"])
            .group_only(),
    ]
}

/// Every mentioned user, or the user named by the first argument.
fn targets(ctx: &Ctx) -> Vec<String> {
    if ctx.message.mentions.is_empty() {
        ctx.target().into_iter().collect()
    } else {
        ctx.message
            .mentions
            .iter()
            .map(|mention| jid::normalize(mention))
            .unique()
            .collect()
    }
}

async fn change_participants(ctx: Ctx, action: ParticipantAction, done: &str) -> Result<()> {
    let targets = targets(&ctx);
    if targets.is_empty() {
        return ctx.usage("@user...").await;
    }

    ctx.state
        .transport
        .update_participants(ctx.chat(), &targets, action)
        .await?;
    tracing::info!("{} {action:?} {targets:?} in {}", ctx.author(), ctx.chat());

    ctx.say_mentioning(format!("✅ {} {done}", targets.mention_all()), targets)
        .await
}

/// Remove members from the group
async fn kick(ctx: Ctx) -> Result<()> {
    change_participants(ctx, ParticipantAction::Remove, "removed from the group").await
}

/// Make members admins
async fn promote(ctx: Ctx) -> Result<()> {
    change_participants(ctx, ParticipantAction::Promote, "promoted to admin").await
}

/// Take admin rights away
async fn demote(ctx: Ctx) -> Result<()> {
    change_participants(ctx, ParticipantAction::Demote, "demoted").await
}

/// Warn a member
async fn warn(ctx: Ctx) -> Result<()> {
    let Some(target) = ctx.target() else {
        return ctx.usage("@user [reason]").await;
    };
    let reason = ctx.args.iter().skip(1).join(" ");
    let reason = if reason.trim().is_empty() {
        "No reason given"
    } else {
        reason.trim()
    };

    moderation::warn_user(&ctx.state, ctx.chat(), &target, reason, &ctx.author()).await?;
    Ok(())
}

/// Show a member's warnings
async fn warnings(ctx: Ctx) -> Result<()> {
    let target = ctx.target().unwrap_or_else(|| ctx.author());
    let warnings = ctx.state.groups.warnings(ctx.chat(), &target)?;
    let max_warnings = ctx.state.config.read().await.moderation.max_warnings;
    let mention = jid::mention(&target);

    if warnings.is_empty() {
        return ctx
            .say_mentioning(format!("✅ {mention} has no warnings."), vec![target])
            .await;
    }

    let lines = warnings
        .iter()
        .enumerate()
        .map(|(i, warning)| {
            format!(
                "{}. {} ({})",
                i + 1,
                warning.reason,
                warning.timestamp.format("%Y-%m-%d %H:%M")
            )
        })
        .join("\n");

    ctx.say_mentioning(
        format!(
            "⚠️ *Warnings for {mention}* ({}/{max_warnings})\n\n{lines}",
            warnings.len()
        ),
        vec![target],
    )
    .await
}

/// Clear a member's warnings
async fn resetwarn(ctx: Ctx) -> Result<()> {
    let Some(target) = ctx.target() else {
        return ctx.usage("@user").await;
    };

    let cleared = ctx.state.groups.reset_warnings(ctx.chat(), &target)?;
    ctx.say_mentioning(
        format!("✅ Cleared {cleared} warning(s) of {}", jid::mention(&target)),
        vec![target],
    )
    .await
}

async fn toggle(ctx: Ctx, toggle: Toggle) -> Result<()> {
    let Some(enabled) = parse_switch(ctx.args.first()) else {
        let current = ctx.state.groups.get(ctx.chat())?;
        let enabled = match toggle {
            Toggle::Antilink => current.antilink,
            Toggle::Antispam => current.antispam,
            Toggle::Nsfw => current.nsfw,
        };
        let prefix = ctx.prefix().await;
        return ctx
            .say(format!(
                "ℹ️ {} is currently {}\nUsage: {prefix}{} on|off",
                toggle.name(),
                if enabled { "on" } else { "off" },
                ctx.command
            ))
            .await;
    };

    ctx.state.groups.set_toggle(ctx.chat(), toggle, enabled)?;
    let text = match toggle {
        Toggle::Nsfw => format!(
            "✅ NSFW commands are now {}",
            if enabled { "enabled" } else { "disabled" }
        ),
        _ => format!(
            "✅ {} is now {}",
            toggle.name(),
            if enabled { "enabled" } else { "disabled" }
        ),
    };
    ctx.say(text).await
}

/// Warn members who post invite links
async fn antilink(ctx: Ctx) -> Result<()> {
    toggle(ctx, Toggle::Antilink).await
}

/// Warn members who spam
async fn antispam(ctx: Ctx) -> Result<()> {
    toggle(ctx, Toggle::Antispam).await
}

/// Allow NSFW commands in this group
async fn setnsfw(ctx: Ctx) -> Result<()> {
    toggle(ctx, Toggle::Nsfw).await
}

/// Greeting for new members
async fn setwelcome(ctx: Ctx) -> Result<()> {
    let text = ctx.rest();
    if text.is_empty() {
        return ctx.usage("<text|off>").await;
    }

    if parse_switch(ctx.args.first()) == Some(false) && ctx.args.len() == 1 {
        ctx.state.groups.set_welcome(ctx.chat(), None)?;
        return ctx.say("✅ Welcome message disabled").await;
    }

    let preview = moderation::render_welcome(&text, &ctx.author(), "this group");
    ctx.state.groups.set_welcome(ctx.chat(), Some(text))?;
    ctx.say(format!("✅ Welcome message set. Preview:\n\n{preview}"))
        .await
}

/// Set the group rules
async fn setrules(ctx: Ctx) -> Result<()> {
    let rules = ctx.rest();
    if rules.is_empty() {
        return ctx.usage("<text>").await;
    }

    ctx.state.groups.set_rules(ctx.chat(), Some(rules))?;
    ctx.say("✅ Group rules updated").await
}

/// Show the group rules
async fn rules(ctx: Ctx) -> Result<()> {
    match ctx.state.groups.get(ctx.chat())?.rules {
        Some(rules) => ctx.say(format!("📜 *Group Rules*\n\n{rules}")).await,
        None => ctx.say("📜 No rules have been set for this group.").await,
    }
}

/// About this group
async fn groupinfo(ctx: Ctx) -> Result<()> {
    let metadata = ctx.state.transport.group_metadata(ctx.chat()).await?;
    let settings = ctx.state.groups.get(ctx.chat())?;
    let admins = metadata.admins().map(|admin| jid::normalize(&admin.id)).collect_vec();
    let flag = |on: bool| if on { "✅" } else { "❌" };

    let text = format!(
        "👥 *{}*\n\n\
         • Members: {}\n\
         • Admins: {}\n\
         • Antilink: {}\n\
         • Antispam: {}\n\
         • NSFW: {}\n\
         • Welcome message: {}\n\
         • Rules: {}",
        metadata.subject,
        metadata.participants.len(),
        admins.mention_all(),
        flag(settings.antilink),
        flag(settings.antispam),
        flag(settings.nsfw),
        flag(settings.welcome_message.is_some()),
        flag(settings.rules.is_some()),
    );
    ctx.say_mentioning(text, admins).await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{data::test_support::*, whatsapp::fake::FakeTransport};

    #[tokio::test]
    async fn kick_removes_mentioned_members() {
        let (state, transport) = state();

        let mut message = message(GROUP, BOB, ".kick @15550001111");
        message.mentions = vec![ALICE.to_owned(), format!("15550001111:3{}", jid::USER_SUFFIX)];
        kick(ctx(&state, message, "kick")).await.unwrap();

        assert_eq!(
            *transport.participant_updates.lock(),
            vec![(GROUP.to_owned(), vec![ALICE.to_owned()], ParticipantAction::Remove)]
        );
        assert_eq!(transport.texts(), vec!["✅ @15550001111 removed from the group"]);
    }

    #[tokio::test]
    async fn toggles_report_and_change() {
        let (state, transport) = state();

        antilink(ctx(&state, message(GROUP, BOB, ".antilink"), "antilink")).await.unwrap();
        antilink(ctx(&state, message(GROUP, BOB, ".antilink on"), "antilink")).await.unwrap();
        setnsfw(ctx(&state, message(GROUP, BOB, ".setnsfw on"), "setnsfw")).await.unwrap();

        let settings = state.groups.get(GROUP).unwrap();
        assert!(settings.antilink && settings.nsfw && !settings.antispam);
        assert_eq!(
            transport.texts(),
            vec![
                "ℹ️ Anti-link is currently off\nUsage: .antilink on|off",
                "✅ Anti-link is now enabled",
                "✅ NSFW commands are now enabled",
            ]
        );
    }

    #[tokio::test]
    async fn warn_then_list() {
        let (state, transport) = state();

        warn(ctx(&state, message(GROUP, BOB, ".warn 15550001111 rude words"), "warn"))
            .await
            .unwrap();
        warnings(ctx(&state, message(GROUP, BOB, ".warnings 15550001111"), "warnings"))
            .await
            .unwrap();
        resetwarn(ctx(&state, message(GROUP, BOB, ".resetwarn 15550001111"), "resetwarn"))
            .await
            .unwrap();

        let texts = transport.texts();
        assert_eq!(texts[0], "⚠️ @15550001111 has been warned!\nReason: rude words\nWarnings: 1/3");
        assert!(texts[1].starts_with("⚠️ *Warnings for @15550001111* (1/3)\n\n1. rude words ("));
        assert_eq!(texts[2], "✅ Cleared 1 warning(s) of @15550001111");
    }

    #[tokio::test]
    async fn welcome_and_rules() {
        let (state, transport) = state();

        setwelcome(ctx(&state, message(GROUP, BOB, ".setwelcome Hi @user!"), "setwelcome"))
            .await
            .unwrap();
        assert_eq!(state.groups.get(GROUP).unwrap().welcome_message.as_deref(), Some("Hi @user!"));
        setwelcome(ctx(&state, message(GROUP, BOB, ".setwelcome off"), "setwelcome"))
            .await
            .unwrap();
        assert_eq!(state.groups.get(GROUP).unwrap().welcome_message, None);

        rules(ctx(&state, message(GROUP, ALICE, ".rules"), "rules")).await.unwrap();
        setrules(ctx(&state, message(GROUP, BOB, ".setrules Be nice"), "setrules"))
            .await
            .unwrap();
        rules(ctx(&state, message(GROUP, ALICE, ".rules"), "rules")).await.unwrap();

        let texts = transport.texts();
        assert_eq!(texts[0], "✅ Welcome message set. Preview:\n\nHi @15550002222!");
        assert_eq!(texts[2], "📜 No rules have been set for this group.");
        assert_eq!(texts[4], "📜 *Group Rules*\n\nBe nice");
    }

    #[tokio::test]
    async fn groupinfo_lists_admins() {
        let (state, transport) =
            state_with(FakeTransport::default().with_group(GROUP, &[BOB], &[ALICE]));

        groupinfo(ctx(&state, message(GROUP, ALICE, ".groupinfo"), "groupinfo"))
            .await
            .unwrap();

        let sent = transport.sent.lock().clone();
        assert!(sent[0].text.starts_with("👥 *Test Group*\n\n• Members: 2\n• Admins: @15550002222"));
        assert_eq!(sent[0].mentions, vec![BOB.to_owned()]);
    }
}
