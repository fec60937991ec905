use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    StoreError, StoreResult, abort, read_in, transact,
    users::{UserDb, UserRecord},
    write_in,
};

/// Periodic payouts, each with its own claim window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Reward {
    Daily,
    Weekly,
    Monthly,
}

impl Reward {
    pub fn cooldown(self) -> Duration {
        match self {
            Reward::Daily => Duration::from_secs(24 * 60 * 60),
            Reward::Weekly => Duration::from_secs(7 * 24 * 60 * 60),
            Reward::Monthly => Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

/// Earning activities. Some need a tool from the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Activity {
    Work,
    Mine,
    Fish,
    Hunt,
    Rob,
}

impl Activity {
    pub fn cooldown(self) -> Duration {
        let minutes = match self {
            Activity::Work => 60,
            Activity::Mine | Activity::Fish => 30,
            Activity::Hunt => 45,
            Activity::Rob => 120,
        };
        Duration::from_secs(minutes * 60)
    }

    pub fn required_tool(self) -> Option<&'static str> {
        match self {
            Activity::Mine => Some("pickaxe"),
            Activity::Fish => Some("fishing_rod"),
            Activity::Hunt => Some("hunting_rifle"),
            Activity::Work | Activity::Rob => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopItem {
    pub id: &'static str,
    pub name: &'static str,
    pub price: i64,
    pub description: &'static str,
}

impl ShopItem {
    pub fn sell_price(&self) -> i64 {
        self.price / 2
    }
}

pub const SHOP: &[ShopItem] = &[
    ShopItem {
        id: "pickaxe",
        name: "Pickaxe",
        price: 500,
        description: "Required for mining",
    },
    ShopItem {
        id: "fishing_rod",
        name: "Fishing Rod",
        price: 300,
        description: "Required for fishing",
    },
    ShopItem {
        id: "hunting_rifle",
        name: "Hunting Rifle",
        price: 1000,
        description: "Required for hunting",
    },
    ShopItem {
        id: "lucky_charm",
        name: "Lucky Charm",
        price: 2500,
        description: "A shiny trinket to show off",
    },
];

pub fn shop_item(id: &str) -> Option<&'static ShopItem> {
    let id = id.trim().to_lowercase();
    SHOP.iter().find(|item| item.id == id)
}

/// Minimum gold a victim has to carry before they can be robbed.
pub const ROB_MIN_VICTIM_GOLD: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobOutcome {
    Stolen(i64),
    Fined(i64),
}

/// Remaining time until `last + cooldown`, or `None` if it has elapsed.
fn remaining(last: Option<DateTime<Utc>>, cooldown: Duration, now: DateTime<Utc>) -> Option<Duration> {
    let elapsed = (now - last?).to_std().unwrap_or_default();
    cooldown.checked_sub(elapsed).filter(|left| !left.is_zero())
}

fn check_amount(amount: i64) -> StoreResult<()> {
    if amount <= 0 {
        return Err(StoreError::InvalidAmount);
    }
    Ok(())
}

fn take_gold(user: &mut UserRecord, amount: i64) -> StoreResult<()> {
    if user.gold < amount {
        return Err(StoreError::InsufficientFunds {
            needed: amount,
            available: user.gold,
        });
    }
    user.gold -= amount;
    Ok(())
}

/// `a + b`, refusing instead of wrapping.
pub fn checked_sum(a: i64, b: i64) -> StoreResult<i64> {
    a.checked_add(b).ok_or(StoreError::Overflow)
}

fn give_gold(user: &mut UserRecord, amount: i64) -> StoreResult<()> {
    user.gold = checked_sum(user.gold, amount)?;
    Ok(())
}

impl UserDb {
    /// Time left until `reward` can be claimed again, `None` when it is ready.
    pub fn claim_cooldown(&self, jid: &str, reward: Reward, now: DateTime<Utc>) -> StoreResult<Option<Duration>> {
        let user = self.get(jid)?;
        Ok(remaining(user.claims.get(&reward).copied(), reward.cooldown(), now))
    }

    /// Pays out `amount` if the reward's window has passed. Returns the new wallet balance.
    pub fn claim(&self, jid: &str, reward: Reward, amount: i64, now: DateTime<Utc>) -> StoreResult<i64> {
        self.update(jid, |user| {
            if let Some(remaining) = remaining(user.claims.get(&reward).copied(), reward.cooldown(), now) {
                return Err(StoreError::OnCooldown { remaining });
            }
            give_gold(user, amount)?;
            user.claims.insert(reward, now);
            Ok(user.gold)
        })
    }

    /// Checks cooldown and tool, then pays `earnings`. Returns the new wallet balance.
    pub fn perform_activity(
        &self,
        jid: &str,
        activity: Activity,
        earnings: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<i64> {
        self.update(jid, |user| {
            if let Some(tool) = activity.required_tool() {
                if user.inventory.get(tool).copied().unwrap_or(0) == 0 {
                    return Err(StoreError::MissingItem(tool));
                }
            }
            if let Some(remaining) =
                remaining(user.cooldowns.get(&activity).copied(), activity.cooldown(), now)
            {
                return Err(StoreError::OnCooldown { remaining });
            }
            give_gold(user, earnings.max(0))?;
            user.cooldowns.insert(activity, now);
            Ok(user.gold)
        })
    }

    /// Moves gold from wallet to bank. Returns `(gold, bank)`.
    pub fn deposit(&self, jid: &str, amount: i64) -> StoreResult<(i64, i64)> {
        check_amount(amount)?;
        self.update(jid, |user| {
            take_gold(user, amount)?;
            user.bank = checked_sum(user.bank, amount)?;
            Ok((user.gold, user.bank))
        })
    }

    /// Moves gold from bank to wallet. Returns `(gold, bank)`.
    pub fn withdraw(&self, jid: &str, amount: i64) -> StoreResult<(i64, i64)> {
        check_amount(amount)?;
        self.update(jid, |user| {
            if user.bank < amount {
                return Err(StoreError::InsufficientFunds {
                    needed: amount,
                    available: user.bank,
                });
            }
            give_gold(user, amount)?;
            user.bank -= amount;
            Ok((user.gold, user.bank))
        })
    }

    /// Moves wallet gold between two users in one transaction. Returns the sender's new balance.
    pub fn transfer(&self, from: &str, to: &str, amount: i64) -> StoreResult<i64> {
        check_amount(amount)?;
        if from == to {
            return Err(StoreError::SelfTarget);
        }
        transact(&self.0, |tx| {
            let mut sender: UserRecord = read_in(tx, from)?.unwrap_or_default();
            let mut receiver: UserRecord = read_in(tx, to)?.unwrap_or_default();
            if let Err(e) = take_gold(&mut sender, amount) {
                return abort(e);
            }
            if let Err(e) = give_gold(&mut receiver, amount) {
                return abort(e);
            }
            write_in(tx, from, &sender)?;
            write_in(tx, to, &receiver)?;
            Ok(sender.gold)
        })
    }

    /// Settles a bet of `stake` that pays `stake * multiplier` back. Returns the new balance.
    pub fn settle_bet(&self, jid: &str, stake: i64, multiplier: i64) -> StoreResult<i64> {
        check_amount(stake)?;
        self.update(jid, |user| {
            let payout = stake
                .checked_mul(multiplier.max(0))
                .ok_or(StoreError::Overflow)?;
            take_gold(user, stake)?;
            give_gold(user, payout)?;
            Ok(user.gold)
        })
    }

    /// A robbery attempt decided by the caller's roll.
    ///
    /// On success up to `amount` moves from victim to robber. On failure the
    /// robber pays half of `amount`, capped at what they carry.
    pub fn rob(
        &self,
        robber: &str,
        victim: &str,
        success: bool,
        amount: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<RobOutcome> {
        check_amount(amount)?;
        if robber == victim {
            return Err(StoreError::SelfTarget);
        }
        transact(&self.0, |tx| {
            let mut thief: UserRecord = read_in(tx, robber)?.unwrap_or_default();
            let mut target: UserRecord = read_in(tx, victim)?.unwrap_or_default();

            if let Some(remaining) = remaining(
                thief.cooldowns.get(&Activity::Rob).copied(),
                Activity::Rob.cooldown(),
                now,
            ) {
                return abort(StoreError::OnCooldown { remaining });
            }
            if target.gold < ROB_MIN_VICTIM_GOLD {
                return abort(StoreError::Rejected(
                    "This user doesn't have enough gold to rob!".to_owned(),
                ));
            }

            thief.cooldowns.insert(Activity::Rob, now);
            let outcome = if success {
                let stolen = amount.min(target.gold);
                if let Err(e) = give_gold(&mut thief, stolen) {
                    return abort(e);
                }
                target.gold -= stolen;
                write_in(tx, victim, &target)?;
                RobOutcome::Stolen(stolen)
            } else {
                let fine = (amount / 2).min(thief.gold);
                thief.gold -= fine;
                RobOutcome::Fined(fine)
            };
            write_in(tx, robber, &thief)?;
            Ok(outcome)
        })
    }

    /// Buys one of `item_id`. Returns the item and the new balance.
    pub fn buy(&self, jid: &str, item_id: &str) -> StoreResult<(&'static ShopItem, i64)> {
        let item = shop_item(item_id).ok_or_else(|| StoreError::UnknownItem(item_id.to_owned()))?;
        self.update(jid, |user| {
            take_gold(user, item.price)?;
            *user.inventory.entry(item.id.to_owned()).or_default() += 1;
            Ok((item, user.gold))
        })
    }

    /// Sells `quantity` of `item_id` at half price. Returns the gold earned.
    pub fn sell(&self, jid: &str, item_id: &str, quantity: u32) -> StoreResult<i64> {
        let item = shop_item(item_id).ok_or_else(|| StoreError::UnknownItem(item_id.to_owned()))?;
        if quantity == 0 {
            return Err(StoreError::InvalidAmount);
        }
        self.update(jid, |user| {
            let owned = user.inventory.get(item.id).copied().unwrap_or(0);
            if owned < quantity {
                return Err(StoreError::NotEnoughItems {
                    item: item.name.to_owned(),
                    owned,
                });
            }
            if owned == quantity {
                user.inventory.remove(item.id);
            } else {
                user.inventory.insert(item.id.to_owned(), owned - quantity);
            }
            let earned = item
                .sell_price()
                .checked_mul(i64::from(quantity))
                .ok_or(StoreError::Overflow)?;
            give_gold(user, earned)?;
            Ok(earned)
        })
    }
}
