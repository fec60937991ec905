use super::economy::medal;
use crate::{
    data::Ctx,
    dispatch::{Category, Command, wait},
    games::{
        Game, GuessOutcome, Hangman, HangmanOutcome, NUMBER_GUESS_ATTEMPTS, NUMBER_GUESS_RANGE,
        NumberGuess,
    },
    handler, jid,
};
use color_eyre::eyre::Result;
use itertools::Itertools;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Minimum time between two new games from the same player.
pub const NEW_GAME_COOLDOWN: Duration = Duration::from_secs(30);

pub fn commands() -> Vec<Command> {
    vec![
        Command::new("numguess", Category::Games, "Guess the number from 1 to 100", handler!(numguess))
            .aliases(&["guess"])
            .usage("[number]"),
        Command::new("hangman", Category::Games, "Guess the word letter by letter", handler!(hangman))
            .usage("[letter]"),
        Command::new("gamestats", Category::Games, "Game leaderboard", handler!(gamestats))
            .aliases(&["gameboard"]),
    ]
}

/// Starts `game` unless the author started one too recently.
///
/// An unfinished game the author had in this chat is dropped with a notice.
async fn start_game(ctx: &Ctx, game: Game) -> Result<bool> {
    let author = ctx.author();
    let allowed = ctx.state.cooldowns.check(
        (Arc::from(author.as_str()), "new-game"),
        1,
        NEW_GAME_COOLDOWN,
        Instant::now(),
    );
    if let Err(retry) = allowed {
        ctx.say(format!("⏳ Please wait {} before starting a new game!", wait(retry)))
            .await?;
        return Ok(false);
    }

    tracing::debug!("{author} started {} in {}", game.name(), ctx.chat());
    let replaced = ctx
        .state
        .games
        .start(ctx.chat(), &author, game, Instant::now());
    if let Some(replaced) = replaced {
        ctx.say(format!("⚠️ Your unfinished {} game was abandoned.", replaced.name()))
            .await?;
    }
    Ok(true)
}

fn record(ctx: &Ctx, game: &str, won: bool) -> Result<()> {
    ctx.state.users.record_game(&ctx.author(), game, won)?;
    Ok(())
}

/// Guess the number from 1 to 100
async fn numguess(ctx: Ctx) -> Result<()> {
    let prefix = ctx.prefix().await;

    let Some(arg) = ctx.args.first() else {
        if start_game(&ctx, Game::NumberGuess(NumberGuess::random())).await? {
            ctx.say(format!(
                "🎮 *Number Guessing Game*\n\n\
                 I'm thinking of a number between {} and {}.\n\
                 You have {NUMBER_GUESS_ATTEMPTS} attempts to guess it!\n\n\
                 Use {prefix}numguess <number> to make a guess.",
                NUMBER_GUESS_RANGE.start(),
                NUMBER_GUESS_RANGE.end()
            ))
            .await?;
        }
        return Ok(());
    };

    let guess = match arg.parse::<u32>() {
        Ok(guess) if NUMBER_GUESS_RANGE.contains(&guess) => guess,
        _ => return ctx.say("❌ Please guess a number between 1 and 100!").await,
    };

    let outcome = ctx
        .state
        .games
        .play(ctx.chat(), &ctx.author(), Instant::now(), |game| match game {
            Game::NumberGuess(game) => {
                let outcome = game.guess(guess);
                (Some(outcome), outcome.is_finished())
            }
            Game::Hangman(_) => (None, false),
        })
        .flatten();

    let text = match outcome {
        None => format!("Start a new game with {prefix}numguess"),
        Some(GuessOutcome::Higher { attempts_left }) => {
            format!("Try higher! {attempts_left} attempts remaining.")
        }
        Some(GuessOutcome::Lower { attempts_left }) => {
            format!("Try lower! {attempts_left} attempts remaining.")
        }
        Some(GuessOutcome::Correct { attempts }) => {
            record(&ctx, "numguess", true)?;
            format!("🎉 Congratulations! You guessed it in {attempts} attempts!\nThe number was {guess}")
        }
        Some(GuessOutcome::OutOfAttempts { secret }) => {
            record(&ctx, "numguess", false)?;
            format!("❌ Game Over! The number was {secret}\nTry again with {prefix}numguess")
        }
    };
    ctx.say(text).await
}

fn hangman_board(game: &Hangman) -> String {
    format!(
        "Word: {}\nLives: {}\nGuessed: {}",
        game.masked(),
        "❤️".repeat(game.lives() as usize),
        game.guessed()
    )
}

/// Guess the word letter by letter
async fn hangman(ctx: Ctx) -> Result<()> {
    let prefix = ctx.prefix().await;

    let Some(arg) = ctx.args.first() else {
        let game = Hangman::random();
        let board = format!(
            "🎮 *Hangman Game*\n\nWord: {}\nLives: {}\n\nUse {prefix}hangman <letter> to guess a letter!",
            game.masked(),
            "❤️".repeat(game.lives() as usize)
        );
        if start_game(&ctx, Game::Hangman(game)).await? {
            ctx.say(board).await?;
        }
        return Ok(());
    };

    let letter = match arg.chars().exactly_one() {
        Ok(letter) if letter.is_ascii_alphabetic() => letter,
        _ => return ctx.say("❌ Please guess a single letter!").await,
    };

    let played = ctx
        .state
        .games
        .play(ctx.chat(), &ctx.author(), Instant::now(), |game| match game {
            Game::Hangman(game) => {
                let outcome = game.guess(letter);
                (
                    Some((outcome, game.word(), hangman_board(game))),
                    outcome.is_finished(),
                )
            }
            Game::NumberGuess(_) => (None, false),
        })
        .flatten();

    let text = match played {
        None => format!("Start a new game with {prefix}hangman"),
        Some((HangmanOutcome::AlreadyGuessed, _, _)) => {
            "❌ You already guessed that letter!".to_owned()
        }
        Some((HangmanOutcome::Hit | HangmanOutcome::Miss { .. }, _, board)) => board,
        Some((HangmanOutcome::Won, word, _)) => {
            record(&ctx, "hangman", true)?;
            format!("🎉 Congratulations! You won!\nThe word was: {word}")
        }
        Some((HangmanOutcome::Lost, word, _)) => {
            record(&ctx, "hangman", false)?;
            format!("❌ Game Over! The word was {word}\nTry again with {prefix}hangman")
        }
    };
    ctx.say(text).await
}

/// Game leaderboard
async fn gamestats(ctx: Ctx) -> Result<()> {
    let leaders = ctx.state.users.game_leaderboard(10);
    if leaders.is_empty() {
        return ctx.say("📊 No game stats recorded yet!").await;
    }

    let lines = leaders
        .iter()
        .enumerate()
        .map(|(rank, (user, stats))| {
            format!(
                "{} {} - {} wins / {} games",
                medal(rank),
                jid::mention(user),
                stats.won,
                stats.played
            )
        })
        .join("\n");
    let mentions = leaders.into_iter().map(|(user, _)| user).collect();

    ctx.say_mentioning(format!("🎮 *Game Leaderboard*\n\n{lines}"), mentions)
        .await
}
