use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Tree;

use crate::{BotDb, ReadWriteTree, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub reason: String,
    pub warned_by: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSettings {
    pub antilink: bool,
    pub antispam: bool,
    pub nsfw: bool,
    pub welcome_message: Option<String>,
    pub rules: Option<String>,
    pub warnings: BTreeMap<String, Vec<Warning>>,
}

/// On/off group switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Antilink,
    Antispam,
    Nsfw,
}

impl Toggle {
    pub fn name(self) -> &'static str {
        match self {
            Toggle::Antilink => "Anti-link",
            Toggle::Antispam => "Anti-spam",
            Toggle::Nsfw => "NSFW",
        }
    }
}

pub struct GroupDb(pub(crate) Tree);

impl GroupDb {
    pub fn new(db: &BotDb) -> StoreResult<Self> {
        Ok(GroupDb(db.open_tree("groups")?))
    }

    pub fn get(&self, group: &str) -> StoreResult<GroupSettings> {
        self.0.typed_get_or_default(group)
    }

    pub fn update<T>(
        &self,
        group: &str,
        update: impl Fn(&mut GroupSettings) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.0.typed_update(group, update)
    }

    pub fn set_toggle(&self, group: &str, toggle: Toggle, enabled: bool) -> StoreResult<()> {
        self.update(group, |settings| {
            match toggle {
                Toggle::Antilink => settings.antilink = enabled,
                Toggle::Antispam => settings.antispam = enabled,
                Toggle::Nsfw => settings.nsfw = enabled,
            }
            Ok(())
        })
    }

    pub fn set_welcome(&self, group: &str, message: Option<String>) -> StoreResult<()> {
        self.update(group, |settings| {
            settings.welcome_message = message.clone();
            Ok(())
        })
    }

    pub fn set_rules(&self, group: &str, rules: Option<String>) -> StoreResult<()> {
        self.update(group, |settings| {
            settings.rules = rules.clone();
            Ok(())
        })
    }

    /// Appends a warning and returns how many `user` now has in `group`.
    pub fn add_warning(&self, group: &str, user: &str, warning: Warning) -> StoreResult<usize> {
        self.update(group, |settings| {
            let warnings = settings.warnings.entry(user.to_owned()).or_default();
            warnings.push(warning.clone());
            Ok(warnings.len())
        })
    }

    pub fn warnings(&self, group: &str, user: &str) -> StoreResult<Vec<Warning>> {
        Ok(self.get(group)?.warnings.remove(user).unwrap_or_default())
    }

    /// Clears `user`'s warnings; returns how many were removed.
    pub fn reset_warnings(&self, group: &str, user: &str) -> StoreResult<usize> {
        self.update(group, |settings| {
            Ok(settings.warnings.remove(user).map_or(0, |w| w.len()))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const GROUP: &str = "120363000000000001@g.us";
    const ALICE: &str = "15550001111@s.whatsapp.net";

    fn groups() -> GroupDb {
        GroupDb::new(&BotDb::temporary().unwrap()).unwrap()
    }

    fn warning(reason: &str) -> Warning {
        Warning {
            reason: reason.to_owned(),
            warned_by: "system".to_owned(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_group_has_everything_off() {
        let settings = groups().get(GROUP).unwrap();

        assert!(!settings.antilink && !settings.antispam && !settings.nsfw);
        assert!(settings.welcome_message.is_none());
    }

    #[test]
    fn toggles_persist() {
        let db = groups();

        db.set_toggle(GROUP, Toggle::Nsfw, true).unwrap();
        db.set_toggle(GROUP, Toggle::Antilink, true).unwrap();
        db.set_toggle(GROUP, Toggle::Antilink, false).unwrap();

        let settings = db.get(GROUP).unwrap();
        assert!(settings.nsfw);
        assert!(!settings.antilink);
    }

    #[test]
    fn warnings_count_up_and_reset() {
        let db = groups();

        assert_eq!(db.add_warning(GROUP, ALICE, warning("spam")).unwrap(), 1);
        assert_eq!(db.add_warning(GROUP, ALICE, warning("links")).unwrap(), 2);
        assert_eq!(db.warnings(GROUP, ALICE).unwrap()[1].reason, "links");

        assert_eq!(db.reset_warnings(GROUP, ALICE).unwrap(), 2);
        assert!(db.warnings(GROUP, ALICE).unwrap().is_empty());
        assert_eq!(db.reset_warnings(GROUP, ALICE).unwrap(), 0);
    }
}
