//! Group moderation: invite links, spam patterns, warnings and welcomes.

use crate::{
    data::State,
    jid,
    whatsapp::{InboundMessage, ParticipantAction},
};
use blacksky_db::groups::{GroupSettings, Warning};
use color_eyre::eyre::Result;
use regex::Regex;
use std::{
    sync::{Arc, LazyLock},
    time::{Duration, Instant},
};

static INVITE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)chat\.whatsapp\.com/[A-Za-z0-9]+").expect("invite link regex is valid")
});

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https?://|www\.)\S+").expect("link regex is valid")
});

const MAX_MENTIONS: usize = 5;
const MAX_LENGTH: usize = 1000;
const MAX_LINKS: usize = 2;
const FLOOD_WINDOW: Duration = Duration::from_secs(60);

/// What a message did wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    InviteLink,
    Flood,
    TooManyMentions,
    TooLong,
    TooManyLinks,
}

impl Violation {
    pub fn reason(self) -> &'static str {
        match self {
            Violation::InviteLink => "Sending group invite links",
            Violation::Flood => "Flooding the chat",
            Violation::TooManyMentions => "Mass mentioning",
            Violation::TooLong => "Sending very long messages",
            Violation::TooManyLinks => "Sending many links",
        }
    }
}

pub fn has_invite_link(text: &str) -> bool {
    INVITE_LINK.is_match(text)
}

/// Content based spam checks. The flood check needs state and lives in [`check_message`].
pub fn suspicious(message: &InboundMessage) -> Option<Violation> {
    if message.mentions.len() > MAX_MENTIONS {
        Some(Violation::TooManyMentions)
    } else if message.text.chars().count() > MAX_LENGTH {
        Some(Violation::TooLong)
    } else if LINK.find_iter(&message.text).count() > MAX_LINKS {
        Some(Violation::TooManyLinks)
    } else {
        None
    }
}

/// The first rule `message` breaks under the group's settings.
fn violation(
    state: &State,
    settings: &GroupSettings,
    message: &InboundMessage,
    flood_limit: usize,
    now: Instant,
) -> Option<Violation> {
    if settings.antilink && has_invite_link(&message.text) {
        return Some(Violation::InviteLink);
    }

    if !settings.antispam {
        return None;
    }

    let chat: Arc<str> = Arc::from(message.chat.as_str());
    if state.flood.check(chat, flood_limit, FLOOD_WINDOW, now).is_err() {
        return Some(Violation::Flood);
    }

    suspicious(message)
}

/// Applies antilink and antispam to a group message.
///
/// Returns `true` when the message broke a rule and should not be processed further.
pub async fn check_message(state: &State, message: &InboundMessage) -> Result<bool> {
    if !message.is_group() {
        return Ok(false);
    }

    let settings = state.groups.get(&message.chat)?;
    if !settings.antilink && !settings.antispam {
        return Ok(false);
    }

    let author = message.author();
    let flood_limit = state.config.read().await.rate_limit.group_messages_per_minute;

    let Some(violation) = violation(state, &settings, message, flood_limit, Instant::now()) else {
        return Ok(false);
    };

    if state.is_owner(&author).await || state.is_group_admin(&message.chat, &author).await {
        return Ok(false);
    }

    tracing::info!("{author} in {}: {violation:?}", message.chat);
    warn_user(state, &message.chat, &author, violation.reason(), "system").await?;

    Ok(true)
}

/// Adds a warning and tells the group. At the limit the user is removed and the count reset.
///
/// Returns the warning count after the call.
pub async fn warn_user(
    state: &State,
    group: &str,
    user: &str,
    reason: &str,
    warned_by: &str,
) -> Result<usize> {
    let max_warnings = state.config.read().await.moderation.max_warnings;
    let count = state.groups.add_warning(
        group,
        user,
        Warning {
            reason: reason.to_owned(),
            warned_by: warned_by.to_owned(),
            timestamp: chrono::Utc::now(),
        },
    )?;

    let mention = jid::mention(user);
    let mentions = vec![user.to_owned()];

    if count < max_warnings {
        state
            .transport
            .send_text(
                group,
                &format!("⚠️ {mention} has been warned!\nReason: {reason}\nWarnings: {count}/{max_warnings}"),
                &mentions,
            )
            .await?;
        return Ok(count);
    }

    state
        .transport
        .send_text(
            group,
            &format!("🚫 {mention} reached {max_warnings} warnings and will be removed.\nLast reason: {reason}"),
            &mentions,
        )
        .await?;
    state
        .transport
        .update_participants(group, &mentions, ParticipantAction::Remove)
        .await?;
    state.groups.reset_warnings(group, user)?;

    Ok(0)
}

/// Fills the `@user` and `@group` placeholders of a welcome text.
pub fn render_welcome(template: &str, user: &str, group_name: &str) -> String {
    template
        .replace("@user", &jid::mention(user))
        .replace("@group", group_name)
}

/// Greets newly added members when the group has a welcome message.
pub async fn welcome(state: &State, group: &str, participants: &[String]) -> Result<()> {
    let Some(template) = state.groups.get(group)?.welcome_message else {
        return Ok(());
    };

    let group_name = match state.transport.group_metadata(group).await {
        Ok(metadata) => metadata.subject,
        Err(e) => {
            tracing::warn!("no metadata for welcome in {group}: {e:?}");
            "the group".to_owned()
        }
    };

    for participant in participants {
        let participant = jid::normalize(participant);
        let text = render_welcome(&template, &participant, &group_name);
        state
            .transport
            .send_text(group, &text, std::slice::from_ref(&participant))
            .await?;
    }

    Ok(())
}
