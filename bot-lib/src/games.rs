use ahash::AHashMap;
use itertools::Itertools;
use parking_lot::Mutex;
use rand::{Rng, seq::IndexedRandom};
use std::{
    collections::BTreeSet,
    sync::Arc,
    time::{Duration, Instant},
};

pub const NUMBER_GUESS_RANGE: std::ops::RangeInclusive<u32> = 1..=100;
pub const NUMBER_GUESS_ATTEMPTS: u32 = 7;
pub const HANGMAN_LIVES: u32 = 6;
pub const HANGMAN_WORDS: &[&str] = &[
    "JAVASCRIPT",
    "PYTHON",
    "PROGRAMMING",
    "COMPUTER",
    "ALGORITHM",
    "DATABASE",
    "NETWORK",
    "SECURITY",
    "INTERFACE",
    "DEVELOPER",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberGuess {
    secret: u32,
    attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    Higher { attempts_left: u32 },
    Lower { attempts_left: u32 },
    Correct { attempts: u32 },
    OutOfAttempts { secret: u32 },
}

impl GuessOutcome {
    pub fn is_finished(self) -> bool {
        matches!(self, GuessOutcome::Correct { .. } | GuessOutcome::OutOfAttempts { .. })
    }
}

impl NumberGuess {
    pub fn new(secret: u32) -> Self {
        NumberGuess { secret, attempts: 0 }
    }

    pub fn random() -> Self {
        Self::new(rand::rng().random_range(NUMBER_GUESS_RANGE))
    }

    pub fn guess(&mut self, guess: u32) -> GuessOutcome {
        self.attempts += 1;
        let attempts_left = NUMBER_GUESS_ATTEMPTS.saturating_sub(self.attempts);

        if guess == self.secret {
            GuessOutcome::Correct {
                attempts: self.attempts,
            }
        } else if attempts_left == 0 {
            GuessOutcome::OutOfAttempts {
                secret: self.secret,
            }
        } else if guess < self.secret {
            GuessOutcome::Higher { attempts_left }
        } else {
            GuessOutcome::Lower { attempts_left }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hangman {
    word: &'static str,
    guessed: BTreeSet<char>,
    lives: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangmanOutcome {
    AlreadyGuessed,
    Hit,
    Miss { lives: u32 },
    Won,
    Lost,
}

impl HangmanOutcome {
    pub fn is_finished(self) -> bool {
        matches!(self, HangmanOutcome::Won | HangmanOutcome::Lost)
    }
}

impl Hangman {
    pub fn new(word: &'static str) -> Self {
        Hangman {
            word,
            guessed: BTreeSet::new(),
            lives: HANGMAN_LIVES,
        }
    }

    pub fn random() -> Self {
        Self::new(HANGMAN_WORDS.choose(&mut rand::rng()).copied().unwrap_or("PYTHON"))
    }

    pub fn word(&self) -> &'static str {
        self.word
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    /// `P _ T H _ N`
    pub fn masked(&self) -> String {
        self.word
            .chars()
            .map(|c| if self.guessed.contains(&c) { c } else { '_' })
            .join(" ")
    }

    pub fn guessed(&self) -> String {
        self.guessed.iter().join(", ")
    }

    pub fn guess(&mut self, letter: char) -> HangmanOutcome {
        let letter = letter.to_ascii_uppercase();
        if !self.guessed.insert(letter) {
            return HangmanOutcome::AlreadyGuessed;
        }

        if self.word.contains(letter) {
            if self.word.chars().all(|c| self.guessed.contains(&c)) {
                HangmanOutcome::Won
            } else {
                HangmanOutcome::Hit
            }
        } else {
            self.lives = self.lives.saturating_sub(1);
            if self.lives == 0 {
                HangmanOutcome::Lost
            } else {
                HangmanOutcome::Miss { lives: self.lives }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Game {
    NumberGuess(NumberGuess),
    Hangman(Hangman),
}

impl Game {
    pub fn name(&self) -> &'static str {
        match self {
            Game::NumberGuess(_) => "numguess",
            Game::Hangman(_) => "hangman",
        }
    }
}

struct Session {
    game: Game,
    touched: Instant,
}

/// Running games, one per player per chat.
#[derive(Default)]
pub struct GameSessions {
    sessions: Mutex<AHashMap<(Arc<str>, Arc<str>), Session>>,
}

impl GameSessions {
    fn key(chat: &str, player: &str) -> (Arc<str>, Arc<str>) {
        (Arc::from(chat), Arc::from(player))
    }

    /// Starts `game`, returning the unfinished game it replaced.
    pub fn start(&self, chat: &str, player: &str, game: Game, now: Instant) -> Option<Game> {
        self.sessions
            .lock()
            .insert(Self::key(chat, player), Session { game, touched: now })
            .map(|session| session.game)
    }

    /// Runs `play` against the player's current game.
    ///
    /// Returns `None` when no game is running. When `play` reports the game
    /// finished, the session is removed; otherwise it counts as active at `now`.
    pub fn play<T>(
        &self,
        chat: &str,
        player: &str,
        now: Instant,
        play: impl FnOnce(&mut Game) -> (T, bool),
    ) -> Option<T> {
        let key = Self::key(chat, player);
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(&key)?;
        let (result, finished) = play(&mut session.game);
        if finished {
            sessions.remove(&key);
        } else {
            session.touched = now;
        }
        Some(result)
    }

    pub fn is_playing(&self, chat: &str, player: &str) -> bool {
        self.sessions.lock().contains_key(&Self::key(chat, player))
    }

    /// Drops games with no move for `timeout`.
    pub fn expire(&self, timeout: Duration, now: Instant) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| now.saturating_duration_since(session.touched) < timeout);
        before - sessions.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn number_guess_gives_hints() {
        let mut game = NumberGuess::new(42);

        assert_eq!(game.guess(10), GuessOutcome::Higher { attempts_left: 6 });
        assert_eq!(game.guess(50), GuessOutcome::Lower { attempts_left: 5 });
        assert_eq!(game.guess(42), GuessOutcome::Correct { attempts: 3 });
    }

    #[test]
    fn number_guess_runs_out() {
        let mut game = NumberGuess::new(42);

        for _ in 0..6 {
            assert!(!game.guess(1).is_finished());
        }

        assert_eq!(game.guess(1), GuessOutcome::OutOfAttempts { secret: 42 });
    }

    #[test]
    fn hangman_win() {
        let mut game = Hangman::new("NETWORK");

        for letter in ['n', 'e', 't', 'w', 'o', 'r'] {
            assert_eq!(game.guess(letter), HangmanOutcome::Hit);
        }
        assert_eq!(game.guess('n'), HangmanOutcome::AlreadyGuessed);
        assert_eq!(game.masked(), "N E T W O R _");
        assert_eq!(game.guess('k'), HangmanOutcome::Won);
    }

    #[test]
    fn hangman_loss_after_six_misses() {
        let mut game = Hangman::new("PYTHON");

        for (i, letter) in ['a', 'b', 'c', 'd', 'e'].into_iter().enumerate() {
            assert_eq!(
                game.guess(letter),
                HangmanOutcome::Miss {
                    lives: HANGMAN_LIVES - 1 - i as u32
                }
            );
        }

        assert_eq!(game.guess('f'), HangmanOutcome::Lost);
    }

    #[test]
    fn sessions_finish_and_expire() {
        let sessions = GameSessions::default();
        let start = Instant::now();
        sessions.start("chat", "alice", Game::NumberGuess(NumberGuess::new(5)), start);
        sessions.start("chat", "bob", Game::Hangman(Hangman::new("PYTHON")), start);

        let outcome = sessions.play("chat", "alice", start, |game| match game {
            Game::NumberGuess(game) => {
                let outcome = game.guess(5);
                (outcome, outcome.is_finished())
            }
            Game::Hangman(_) => unreachable!(),
        });

        assert_eq!(outcome, Some(GuessOutcome::Correct { attempts: 1 }));
        assert!(!sessions.is_playing("chat", "alice"));
        assert!(sessions.play("other", "bob", start, |_| ((), false)).is_none());

        assert_eq!(sessions.expire(Duration::from_secs(60), start + Duration::from_secs(61)), 1);
        assert!(!sessions.is_playing("chat", "bob"));
    }

    #[test]
    fn moves_keep_a_game_alive() {
        let sessions = GameSessions::default();
        let start = Instant::now();
        sessions.start("chat", "alice", Game::Hangman(Hangman::new("PYTHON")), start);

        sessions.play("chat", "alice", start + Duration::from_secs(250), |game| match game {
            Game::Hangman(game) => ((), game.guess('p').is_finished()),
            Game::NumberGuess(_) => unreachable!(),
        });

        let timeout = Duration::from_secs(300);
        assert_eq!(sessions.expire(timeout, start + Duration::from_secs(301)), 0);
        assert!(sessions.is_playing("chat", "alice"));
        assert_eq!(sessions.expire(timeout, start + Duration::from_secs(551)), 1);
    }

    #[test]
    fn starting_returns_the_replaced_game() {
        let sessions = GameSessions::default();
        let start = Instant::now();

        assert!(sessions
            .start("chat", "alice", Game::NumberGuess(NumberGuess::new(5)), start)
            .is_none());
        let replaced = sessions.start("chat", "alice", Game::Hangman(Hangman::new("RUST")), start);

        assert_eq!(replaced.map(|game| game.name()), Some("numguess"));
    }
}
