//! One-shot import of the old whole-file `store.json`.
//!
//! Records already present in the trees win; the import never overwrites.

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    BotDb, ReadWriteTree, StoreError, StoreResult,
    bans::BanList,
    economy::Reward,
    groups::{GroupDb, GroupSettings, Warning},
    users::{UserDb, UserRecord, level_for_xp},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyStore {
    users: BTreeMap<String, LegacyUser>,
    groups: BTreeMap<String, LegacyGroup>,
    banned: Vec<String>,
    #[serde(rename = "bannedGroups")]
    banned_groups: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LegacyUser {
    gold: Option<f64>,
    bank: Option<f64>,
    inventory: Value,
    last_daily: Option<DateTime<Utc>>,
    level: Option<u32>,
    xp: Option<f64>,
    name: Option<String>,
    age: Option<Value>,
    registered_at: Option<DateTime<Utc>>,
    preferences: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LegacyGroup {
    antilink: bool,
    antispam: bool,
    nsfw: bool,
    welcome_message: Option<String>,
    rules: Option<String>,
    warnings: BTreeMap<String, Vec<LegacyWarning>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LegacyWarning {
    reason: String,
    warned_by: String,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub users: usize,
    pub groups: usize,
    pub banned_users: usize,
    pub banned_groups: usize,
    pub skipped: usize,
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} users, {} groups, {} banned users, {} banned groups imported ({} already present)",
            self.users, self.groups, self.banned_users, self.banned_groups, self.skipped
        )
    }
}

/// Inventories were either `{item: qty}` or a list of item ids.
fn inventory_from(value: &Value) -> BTreeMap<String, u32> {
    let mut inventory = BTreeMap::new();
    match value {
        Value::Object(items) => {
            for (item, qty) in items {
                let qty = qty.as_u64().unwrap_or(1).min(u32::MAX as u64) as u32;
                if qty > 0 {
                    inventory.insert(item.to_lowercase(), qty);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter().filter_map(Value::as_str) {
                *inventory.entry(item.to_lowercase()).or_default() += 1;
            }
        }
        _ => {}
    }
    inventory
}

fn age_from(value: &Option<Value>) -> Option<u8> {
    let age = match value.as_ref()? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    u8::try_from(age).ok().filter(|age| (1..=100).contains(age))
}

fn preference_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<LegacyUser> for UserRecord {
    fn from(legacy: LegacyUser) -> Self {
        let xp = legacy.xp.unwrap_or(0.0).max(0.0) as u64;
        let mut user = UserRecord {
            gold: legacy.gold.unwrap_or(0.0).max(0.0) as i64,
            bank: legacy.bank.unwrap_or(0.0).max(0.0) as i64,
            inventory: inventory_from(&legacy.inventory),
            xp,
            level: legacy.level.unwrap_or(1).max(level_for_xp(xp)),
            age: age_from(&legacy.age),
            registered_at: legacy.registered_at,
            preferences: legacy
                .preferences
                .iter()
                .map(|(k, v)| (k.to_lowercase(), preference_string(v)))
                .collect(),
            ..UserRecord::default()
        };
        user.name = legacy.name.filter(|name| !name.trim().is_empty());
        if let Some(last_daily) = legacy.last_daily {
            user.claims.insert(Reward::Daily, last_daily);
        }
        user
    }
}

impl From<LegacyGroup> for GroupSettings {
    fn from(legacy: LegacyGroup) -> Self {
        GroupSettings {
            antilink: legacy.antilink,
            antispam: legacy.antispam,
            nsfw: legacy.nsfw,
            welcome_message: legacy.welcome_message,
            rules: legacy.rules,
            warnings: legacy
                .warnings
                .into_iter()
                .map(|(user, warnings)| {
                    let warnings = warnings
                        .into_iter()
                        .map(|w| Warning {
                            reason: w.reason,
                            warned_by: w.warned_by,
                            timestamp: w.timestamp.unwrap_or_default(),
                        })
                        .collect();
                    (user, warnings)
                })
                .collect(),
        }
    }
}

pub fn import_json_file(db: &BotDb, path: &Path, now: DateTime<Utc>) -> StoreResult<ImportReport> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Legacy(format!("{}: {e}", path.display())))?;
    import_json(db, &raw, now)
}

pub fn import_json(db: &BotDb, raw: &str, now: DateTime<Utc>) -> StoreResult<ImportReport> {
    let legacy: LegacyStore =
        serde_json::from_str(raw).map_err(|e| StoreError::Legacy(e.to_string()))?;
    let mut report = ImportReport::default();

    let users = UserDb::new(db)?;
    for (jid, user) in legacy.users {
        if users.find(&jid)?.is_some() {
            report.skipped += 1;
            continue;
        }
        users.0.typed_insert(&jid, &UserRecord::from(user))?;
        report.users += 1;
    }

    let groups = GroupDb::new(db)?;
    for (jid, group) in legacy.groups {
        if groups.0.contains_key(jid.as_bytes())? {
            report.skipped += 1;
            continue;
        }
        groups.0.typed_insert(&jid, &GroupSettings::from(group))?;
        report.groups += 1;
    }

    let banned_users = BanList::users(db)?;
    for jid in legacy.banned {
        if banned_users.ban(&jid, now)? {
            report.banned_users += 1;
        } else {
            report.skipped += 1;
        }
    }

    let banned_groups = BanList::groups(db)?;
    for jid in legacy.banned_groups {
        if banned_groups.ban(&jid, now)? {
            report.banned_groups += 1;
        } else {
            report.skipped += 1;
        }
    }

    tracing::info!("legacy import: {report}");
    Ok(report)
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    const STORE: &str = r#"{
        "users": {
            "15550001111@s.whatsapp.net": {
                "gold": 1200, "bank": 300, "xp": 450, "level": 1,
                "inventory": ["pickaxe", "Pickaxe"],
                "name": "Alice", "age": "22",
                "lastDaily": "2024-01-01T10:00:00Z",
                "preferences": {"language": "en", "notifications": true}
            },
            "15550002222@s.whatsapp.net": { "xp": 3 }
        },
        "groups": {
            "120363000000000001@g.us": {
                "antilink": true,
                "welcomeMessage": "Hi @user, welcome to @group",
                "warnings": {
                    "15550002222@s.whatsapp.net": [
                        {"reason": "spam", "warnedBy": "15550001111@s.whatsapp.net", "timestamp": "2024-02-01T00:00:00Z"}
                    ]
                }
            }
        },
        "banned": ["15550003333@s.whatsapp.net"],
        "bannedGroups": [],
        "someUnrelatedKey": 5
    }"#;

    #[test]
    fn imports_every_section() {
        let db = BotDb::temporary().unwrap();

        let report = import_json(&db, STORE, Utc::now()).unwrap();

        assert_eq!(
            report,
            ImportReport {
                users: 2,
                groups: 1,
                banned_users: 1,
                banned_groups: 0,
                skipped: 0,
            }
        );

        let alice = UserDb::new(&db)
            .unwrap()
            .get("15550001111@s.whatsapp.net")
            .unwrap();
        assert_eq!(alice.gold, 1200);
        assert_eq!(alice.level, 2);
        assert_eq!(alice.age, Some(22));
        assert_eq!(alice.inventory.get("pickaxe"), Some(&2));
        assert_eq!(alice.preferences.get("notifications").map(String::as_str), Some("true"));
        assert!(alice.claims.contains_key(&Reward::Daily));

        let group = GroupDb::new(&db).unwrap().get("120363000000000001@g.us").unwrap();
        assert!(group.antilink);
        assert_eq!(group.warnings["15550002222@s.whatsapp.net"].len(), 1);
    }

    #[test]
    fn second_import_skips_existing_records() {
        let db = BotDb::temporary().unwrap();
        import_json(&db, STORE, Utc::now()).unwrap();
        UserDb::new(&db)
            .unwrap()
            .update("15550001111@s.whatsapp.net", |user| {
                user.gold = 5;
                Ok(())
            })
            .unwrap();

        let report = import_json(&db, STORE, Utc::now()).unwrap();

        assert_eq!(report.users, 0);
        assert_eq!(report.skipped, 4);
        let alice = UserDb::new(&db)
            .unwrap()
            .get("15550001111@s.whatsapp.net")
            .unwrap();
        assert_eq!(alice.gold, 5);
    }

    #[test]
    fn reads_from_file_and_rejects_garbage() {
        let db = BotDb::temporary().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();

        assert!(matches!(
            import_json_file(&db, file.path(), Utc::now()),
            Err(StoreError::Legacy(_))
        ));
    }
}
