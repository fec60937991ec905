use data::State;
use itertools::Itertools;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::time::interval;
use tokio_stream::wrappers::IntervalStream;

pub mod commands;
pub mod config;
pub mod conversation;
pub mod data;
pub mod dispatch;
pub mod event_handler;
pub mod games;
pub mod jid;
pub mod moderation;
pub mod rate_limit;
pub mod server;
mod utils;
pub mod whatsapp;

trait MentionableExt {
    fn mention_all(&self) -> String;
}

impl MentionableExt for [String] {
    fn mention_all(&self) -> String {
        self.iter().map(|user| jid::mention(user)).join(" ")
    }
}

/// Drops stale limiter windows, abandoned games and idle AI conversations.
pub fn sweep(state: &State, now: Instant, game_timeout: Duration, conversation_ttl: Duration) {
    let windows = state.limiter.sweep(now) + state.cooldowns.sweep(now) + state.flood.sweep(now);
    let games = state.games.expire(game_timeout, now);
    let conversations = state.conversations.expire(conversation_ttl, now);

    if windows + games + conversations > 0 {
        tracing::debug!(
            "janitor dropped {windows} limiter windows, {games} games, {conversations} conversations"
        );
    }
}

/// Runs [`sweep`] every `janitor_interval` until the task is dropped.
pub async fn janitor(state: State) {
    use futures::StreamExt;

    let period = state.config.read().await.janitor_interval;

    IntervalStream::new(interval(period))
        .for_each(|_| {
            let state = Arc::clone(&state);
            async move {
                let (game_timeout, conversation_ttl) = {
                    let config = state.config.read().await;
                    (config.game_timeout, config.ai.conversation_ttl)
                };
                sweep(&state, Instant::now(), game_timeout, conversation_ttl);
            }
        })
        .await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        data::test_support::*,
        games::{Game, NumberGuess},
    };

    #[test]
    fn mentions_are_joined() {
        let users = [ALICE.to_owned(), BOB.to_owned()];
        assert_eq!(users.mention_all(), "@15550001111 @15550002222");
    }

    #[tokio::test]
    async fn sweep_clears_everything_stale() {
        let (state, _) = state();
        let start = Instant::now();
        let minute = Duration::from_secs(60);

        state.limiter.check((ALICE.into(), "ping"), 5, minute, start).unwrap();
        state.games.start(ALICE, ALICE, Game::NumberGuess(NumberGuess::new(3)), start);
        state.conversations.record(ALICE, "q", "a", 10, start);

        sweep(&state, start + Duration::from_secs(30), minute, minute);
        assert_eq!(state.limiter.len(), 1);
        assert!(state.games.is_playing(ALICE, ALICE));

        sweep(&state, start + Duration::from_secs(120), minute, minute);
        assert!(state.limiter.is_empty());
        assert!(!state.games.is_playing(ALICE, ALICE));
        assert_eq!(state.conversations.prompt_with_history(ALICE, "x").len(), 1);
    }
}
