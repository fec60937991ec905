use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sled::Tree;

use crate::{
    BotDb, ReadWriteTree, StoreError, StoreResult,
    economy::{Activity, Reward},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub played: u32,
    pub won: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub gold: i64,
    pub bank: i64,
    pub inventory: BTreeMap<String, u32>,
    pub claims: BTreeMap<Reward, DateTime<Utc>>,
    pub cooldowns: BTreeMap<Activity, DateTime<Utc>>,
    pub level: u32,
    pub xp: u64,
    pub name: Option<String>,
    pub age: Option<u8>,
    pub registered_at: Option<DateTime<Utc>>,
    pub preferences: BTreeMap<String, String>,
    pub games: BTreeMap<String, GameStats>,
}

impl Default for UserRecord {
    fn default() -> Self {
        Self {
            gold: 0,
            bank: 0,
            inventory: BTreeMap::new(),
            claims: BTreeMap::new(),
            cooldowns: BTreeMap::new(),
            level: 1,
            xp: 0,
            name: None,
            age: None,
            registered_at: None,
            preferences: BTreeMap::new(),
            games: BTreeMap::new(),
        }
    }
}

impl UserRecord {
    pub fn is_registered(&self) -> bool {
        self.name.is_some() && self.age.is_some()
    }

    pub fn is_adult(&self) -> bool {
        self.age.is_some_and(|age| age >= 18)
    }

    pub fn net_worth(&self) -> i64 {
        self.gold.saturating_add(self.bank)
    }

    fn gain_xp(&mut self, amount: u64) -> XpGain {
        let previous_level = self.level;
        self.xp = self.xp.saturating_add(amount);
        self.level = self.level.max(level_for_xp(self.xp));
        XpGain {
            xp: self.xp,
            previous_level,
            level: self.level,
        }
    }
}

/// `floor(0.1 * sqrt(xp))`, never below 1.
pub fn level_for_xp(xp: u64) -> u32 {
    ((0.1 * (xp as f64).sqrt()).floor() as u32).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpGain {
    pub xp: u64,
    pub previous_level: u32,
    pub level: u32,
}

impl XpGain {
    pub fn leveled_up(&self) -> bool {
        self.level > self.previous_level
    }
}

pub struct UserDb(pub(crate) Tree);

impl UserDb {
    pub fn new(db: &BotDb) -> StoreResult<Self> {
        let db = db.open_tree("users")?;

        fn add_xp(_key: &[u8], old_value: Option<&[u8]>, merged_bytes: &[u8]) -> Option<Vec<u8>> {
            BotDb::create_update_with_deserialization::<UserRecord>(
                old_value,
                |mut user| {
                    let Ok(amount) = bincode::deserialize::<u64>(merged_bytes) else {
                        tracing::error!("Failed to deserialize xp amount, {:?}", merged_bytes);
                        return user;
                    };
                    user.gain_xp(amount);
                    user
                },
                UserRecord::default,
            )
        }

        db.set_merge_operator(add_xp);

        Ok(UserDb(db))
    }

    /// The stored record, or a fresh default one.
    pub fn get(&self, jid: &str) -> StoreResult<UserRecord> {
        self.0.typed_get_or_default(jid)
    }

    pub fn find(&self, jid: &str) -> StoreResult<Option<UserRecord>> {
        self.0.typed_get(jid)
    }

    /// Transactional read-modify-write; the record is created on first touch.
    pub fn update<T>(
        &self,
        jid: &str,
        update: impl Fn(&mut UserRecord) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.0.typed_update(jid, update)
    }

    pub fn register(&self, jid: &str, name: &str, age: u8, now: DateTime<Utc>) -> StoreResult<UserRecord> {
        if !(1..=100).contains(&age) {
            return Err(StoreError::Rejected(
                "Please provide a valid age between 1 and 100!".to_owned(),
            ));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Rejected("Please provide your name!".to_owned()));
        }
        self.update(jid, |user| {
            user.name = Some(name.to_owned());
            user.age = Some(age);
            user.registered_at.get_or_insert(now);
            Ok(user.clone())
        })
    }

    /// Adds XP and reports whether the level went up.
    pub fn add_xp(&self, jid: &str, amount: u64) -> StoreResult<XpGain> {
        self.update(jid, |user| Ok(user.gain_xp(amount)))
    }

    /// Fire-and-forget XP for ordinary chat messages; goes through the merge operator.
    pub fn award_message_xp(&self, jid: &str, amount: u64) -> StoreResult<()> {
        self.0.typed_merge::<u64, UserRecord>(jid, &amount)?;
        Ok(())
    }

    pub fn set_preference(&self, jid: &str, key: &str, value: &str) -> StoreResult<()> {
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return Err(StoreError::Rejected("Preference name cannot be empty".to_owned()));
        }
        self.update(jid, |user| {
            user.preferences.insert(key.clone(), value.to_owned());
            Ok(())
        })
    }

    pub fn preference(&self, jid: &str, key: &str) -> StoreResult<Option<String>> {
        Ok(self.get(jid)?.preferences.remove(&key.trim().to_lowercase()))
    }

    pub fn record_game(&self, jid: &str, game: &str, won: bool) -> StoreResult<GameStats> {
        self.update(jid, |user| {
            let stats = user.games.entry(game.to_owned()).or_default();
            stats.played += 1;
            if won {
                stats.won += 1;
            }
            Ok(*stats)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (String, UserRecord)> {
        self.0.typed_iter::<UserRecord>()
    }

    /// Top `n` users by wallet plus bank.
    pub fn richest(&self, n: usize) -> Vec<(String, UserRecord)> {
        self.iter()
            .sorted_by(|(_, a), (_, b)| b.net_worth().cmp(&a.net_worth()))
            .take(n)
            .collect()
    }

    /// Top `n` users by games won across all games.
    pub fn game_leaderboard(&self, n: usize) -> Vec<(String, GameStats)> {
        self.iter()
            .map(|(jid, user)| {
                let total = user.games.values().fold(GameStats::default(), |acc, s| GameStats {
                    played: acc.played + s.played,
                    won: acc.won + s.won,
                });
                (jid, total)
            })
            .filter(|(_, stats)| stats.played > 0)
            .sorted_by(|(_, a), (_, b)| b.won.cmp(&a.won).then(a.played.cmp(&b.played)))
            .take(n)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALICE: &str = "15550001111@s.whatsapp.net";
    const BOB: &str = "15550002222@s.whatsapp.net";

    fn users() -> UserDb {
        UserDb::new(&BotDb::temporary().unwrap()).unwrap()
    }

    #[test]
    fn level_formula_starts_at_one() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(399), 1);
        assert_eq!(level_for_xp(400), 2);
        assert_eq!(level_for_xp(10_000), 10);
    }

    #[test]
    fn net_worth_saturates() {
        let user = UserRecord {
            gold: i64::MAX,
            bank: 1,
            ..UserRecord::default()
        };

        assert_eq!(user.net_worth(), i64::MAX);
    }

    #[test]
    fn unknown_user_reads_as_default() {
        let db = users();

        let user = db.get(ALICE).unwrap();

        assert_eq!(user.level, 1);
        assert_eq!(user.gold, 0);
        assert!(db.find(ALICE).unwrap().is_none());
    }

    #[test]
    fn add_xp_reports_level_up() {
        let db = users();

        let gain = db.add_xp(ALICE, 399).unwrap();
        assert!(!gain.leveled_up());

        let gain = db.add_xp(ALICE, 1).unwrap();
        assert!(gain.leveled_up());
        assert_eq!(gain.level, 2);
        assert_eq!(db.get(ALICE).unwrap().xp, 400);
    }

    #[test]
    fn message_xp_merges_into_record() {
        let db = users();
        db.update(ALICE, |user| {
            user.gold = 10;
            Ok(())
        })
        .unwrap();

        db.award_message_xp(ALICE, 1).unwrap();
        db.award_message_xp(ALICE, 1).unwrap();

        let user = db.get(ALICE).unwrap();
        assert_eq!(user.xp, 2);
        assert_eq!(user.gold, 10);
    }

    #[test]
    fn register_validates_age() {
        let db = users();
        let now = Utc::now();

        assert!(matches!(
            db.register(ALICE, "Alice", 0, now),
            Err(StoreError::Rejected(_))
        ));
        assert!(matches!(
            db.register(ALICE, "Alice", 101, now),
            Err(StoreError::Rejected(_))
        ));

        let user = db.register(ALICE, " Alice ", 21, now).unwrap();
        assert_eq!(user.name.as_deref(), Some("Alice"));
        assert!(user.is_registered());
        assert!(user.is_adult());
    }

    #[test]
    fn preferences_are_case_insensitive() {
        let db = users();

        db.set_preference(ALICE, "Language", "de").unwrap();

        assert_eq!(db.preference(ALICE, "language").unwrap().as_deref(), Some("de"));
        assert_eq!(db.preference(ALICE, "theme").unwrap(), None);
    }

    #[test]
    fn leaderboards_sort_descending() {
        let db = users();
        db.update(ALICE, |user| {
            user.gold = 10;
            user.bank = 500;
            Ok(())
        })
        .unwrap();
        db.update(BOB, |user| {
            user.gold = 300;
            Ok(())
        })
        .unwrap();
        db.record_game(BOB, "hangman", true).unwrap();
        db.record_game(ALICE, "hangman", false).unwrap();

        let richest = db.richest(5);
        assert_eq!(richest[0].0, ALICE);
        assert_eq!(richest[1].0, BOB);

        let games = db.game_leaderboard(5);
        assert_eq!(games[0], (BOB.to_owned(), GameStats { played: 1, won: 1 }));
        assert_eq!(games.len(), 2);
    }
}
