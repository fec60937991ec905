use chrono::{DateTime, Utc};
use sled::Tree;

use crate::{BotDb, ReadWriteTree, StoreResult};

/// A set of banned JIDs, value is when the ban was placed.
pub struct BanList(Tree);

impl BanList {
    pub fn users(db: &BotDb) -> StoreResult<Self> {
        Ok(BanList(db.open_tree("banned_users")?))
    }

    pub fn groups(db: &BotDb) -> StoreResult<Self> {
        Ok(BanList(db.open_tree("banned_groups")?))
    }

    /// Returns `true` if the JID was not banned before.
    pub fn ban(&self, jid: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let previous = self
            .0
            .compare_and_swap(jid.as_bytes(), None as Option<&[u8]>, Some(bincode::serialize(&now)?))?;
        Ok(previous.is_ok())
    }

    /// Returns `true` if the JID was banned.
    pub fn unban(&self, jid: &str) -> StoreResult<bool> {
        Ok(self.0.remove(jid.as_bytes())?.is_some())
    }

    pub fn is_banned(&self, jid: &str) -> StoreResult<bool> {
        Ok(self.0.contains_key(jid.as_bytes())?)
    }

    pub fn list(&self) -> Vec<(String, DateTime<Utc>)> {
        self.0.typed_iter().collect()
    }
}
