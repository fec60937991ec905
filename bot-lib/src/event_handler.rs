use std::sync::Arc;

use crate::{
    commands::REGISTRY,
    data::State,
    dispatch::{self, Registry},
    moderation,
    whatsapp::{InboundMessage, ParticipantAction, ParticipantUpdate},
};
use blacksky_traits::ForwardRefToTracing;
use color_eyre::eyre::Result;

/// Everything the bridge posts to us.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Message(InboundMessage),
    Participants(ParticipantUpdate),
}

pub async fn event_handler(state: State, event: BridgeEvent) -> Result<()> {
    handle_event(state, &REGISTRY, event).await
}

async fn handle_event(state: State, registry: &Registry, event: BridgeEvent) -> Result<()> {
    match event {
        BridgeEvent::Message(message) => handle_message(&state, registry, message).await?,
        BridgeEvent::Participants(update) => {
            tracing::debug!(
                "{:?} {} participant(s) in {}",
                update.action,
                update.participants.len(),
                update.group
            );
            if update.action == ParticipantAction::Add {
                moderation::welcome(&state, &update.group, &update.participants)
                    .await
                    .trace_err_ok();
            }
        }
    };

    Ok(())
}

async fn handle_message(state: &State, registry: &Registry, message: InboundMessage) -> Result<()> {
    if message.from_me || message.text.trim().is_empty() {
        return Ok(());
    }

    let author = message.author();

    if !state.is_owner(&author).await
        && (state.banned_users.is_banned(&author)?
            || (message.is_group() && state.banned_groups.is_banned(&message.chat)?))
    {
        tracing::trace!("ignoring banned {author} in {}", message.chat);
        return Ok(());
    }

    let (message_xp, prefix) = {
        let config = state.config.read().await;
        (config.xp.message, config.prefix.clone())
    };

    state
        .users
        .award_message_xp(&author, message_xp)
        .trace_err_ok();

    if message.is_group()
        && moderation::check_message(state, &message)
            .await
            .trace_err_ok()
            .unwrap_or(false)
    {
        return Ok(());
    }

    let Some(parsed) = dispatch::parse(&message.text, &prefix) else {
        return Ok(());
    };

    dispatch::dispatch(state, registry, Arc::new(message), parsed).await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        data::{Ctx, test_support::*},
        dispatch::{Category, Command},
        handler,
        whatsapp::fake::FakeTransport,
    };
    use blacksky_db::groups::Toggle;

    async fn pong(ctx: Ctx) -> Result<()> {
        ctx.say("pong").await
    }

    fn registry() -> Registry {
        Registry::new([Command::new("ping", Category::Basic, "pong", handler!(pong))])
    }

    async fn send(state: &State, message: InboundMessage) {
        handle_event(Arc::clone(state), &registry(), BridgeEvent::Message(message))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn plain_messages_earn_xp_without_reply() {
        let (state, transport) = state();

        send(&state, message(ALICE, ALICE, "hello")).await;
        send(&state, message(ALICE, ALICE, "   ")).await;

        assert!(transport.texts().is_empty());
        assert_eq!(state.users.get(ALICE).unwrap().xp, 1);
    }

    #[tokio::test]
    async fn own_and_banned_messages_are_ignored() {
        let (state, transport) = state();
        let now = chrono::Utc::now();
        state.banned_users.ban(ALICE, now).unwrap();
        state.banned_groups.ban(GROUP, now).unwrap();

        let mut own = message(BOB, BOB, ".ping");
        own.from_me = true;
        send(&state, own).await;
        send(&state, message(ALICE, ALICE, ".ping")).await;
        send(&state, message(GROUP, BOB, ".ping")).await;
        send(&state, message(GROUP, OWNER, ".ping")).await;

        assert_eq!(transport.texts(), vec!["pong"]);
    }

    #[tokio::test]
    async fn moderated_message_is_not_dispatched() {
        let (state, transport) =
            state_with(FakeTransport::default().with_group(GROUP, &[BOB], &[ALICE]));
        state.groups.set_toggle(GROUP, Toggle::Antilink, true).unwrap();

        send(&state, message(GROUP, ALICE, ".ping chat.whatsapp.com/XyZ")).await;

        let texts = transport.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("⚠️ @15550001111 has been warned!"));
    }

    #[tokio::test]
    async fn added_participants_are_welcomed() {
        let (state, transport) =
            state_with(FakeTransport::default().with_group(GROUP, &[BOB], &[ALICE]));
        state
            .groups
            .set_welcome(GROUP, Some("Welcome @user".to_owned()))
            .unwrap();

        for action in [ParticipantAction::Remove, ParticipantAction::Add] {
            handle_event(
                Arc::clone(&state),
                &registry(),
                BridgeEvent::Participants(ParticipantUpdate {
                    group: GROUP.to_owned(),
                    participants: vec![ALICE.to_owned()],
                    action,
                }),
            )
            .await
            .unwrap();
        }

        assert_eq!(transport.texts(), vec!["Welcome @15550001111"]);
    }
}
