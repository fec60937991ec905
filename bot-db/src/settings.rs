use sled::Tree;

use crate::{BotDb, ReadWriteTree, StoreResult};

pub const MAINTENANCE: &str = "maintenance";

/// Free-form string settings (maintenance mode and friends).
pub struct SettingsDb(Tree);

impl SettingsDb {
    pub fn new(db: &BotDb) -> StoreResult<Self> {
        Ok(SettingsDb(db.open_tree("settings")?))
    }

    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.0.typed_get(key)
    }

    pub fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.0.typed_insert(key, &value)
    }

    /// Returns the removed value, if any.
    pub fn delete(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .0
            .remove(key.as_bytes())?
            .map(|value| bincode::deserialize::<String>(&value))
            .transpose()?)
    }

    pub fn flag(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some_and(|value| value == "on"))
    }

    pub fn set_flag(&self, key: &str, enabled: bool) -> StoreResult<()> {
        self.set(key, if enabled { "on" } else { "off" })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_get_delete() {
        let settings = SettingsDb::new(&BotDb::temporary().unwrap()).unwrap();

        settings.set("motd", "hello").unwrap();
        assert_eq!(settings.get("motd").unwrap().as_deref(), Some("hello"));

        assert_eq!(settings.delete("motd").unwrap().as_deref(), Some("hello"));
        assert_eq!(settings.get("motd").unwrap(), None);
    }

    #[test]
    fn flags_default_off() {
        let settings = SettingsDb::new(&BotDb::temporary().unwrap()).unwrap();

        assert!(!settings.flag(MAINTENANCE).unwrap());
        settings.set_flag(MAINTENANCE, true).unwrap();
        assert!(settings.flag(MAINTENANCE).unwrap());
    }
}
