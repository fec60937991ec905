use super::parse_amount;
use crate::{
    data::Ctx,
    dispatch::{Category, Command, wait},
    handler, jid,
    utils::thousands,
};
use blacksky_db::economy::{Activity, ROB_MIN_VICTIM_GOLD, RobOutcome, Reward, SHOP};
use color_eyre::eyre::Result;
use itertools::Itertools;
use rand::Rng;
use std::{fmt::Write, ops::RangeInclusive};

pub const DAILY_REWARD: RangeInclusive<i64> = 500..=1000;
pub const WEEKLY_REWARD: RangeInclusive<i64> = 1000..=3000;
pub const MONTHLY_REWARD: RangeInclusive<i64> = 5000..=10000;
pub const WORK_PAY: RangeInclusive<i64> = 500..=999;
pub const FISH_PAY: RangeInclusive<i64> = 300..=900;
pub const HUNT_PAY: RangeInclusive<i64> = 500..=1500;
pub const ROB_AMOUNT: RangeInclusive<i64> = 100..=300;
pub const ROB_SUCCESS_CHANCE: f64 = 0.4;
pub const GAMBLE_WIN_CHANCE: f64 = 0.45;

pub fn commands() -> Vec<Command> {
    vec![
        Command::new("balance", Category::Economy, "Wallet and bank balance", handler!(balance))
            .aliases(&["bal", "wallet"])
            .usage("[@user]"),
        Command::new("daily", Category::Economy, "Claim your daily reward", handler!(daily)),
        Command::new("weekly", Category::Economy, "Claim your weekly reward", handler!(weekly)),
        Command::new("monthly", Category::Economy, "Claim your monthly reward", handler!(monthly)),
        Command::new("work", Category::Economy, "Work a shift for gold", handler!(work)),
        Command::new("mine", Category::Economy, "Mine for minerals (needs a pickaxe)", handler!(mine)),
        Command::new("fish", Category::Economy, "Go fishing (needs a fishing rod)", handler!(fish)),
        Command::new("hunt", Category::Economy, "Go hunting (needs a hunting rifle)", handler!(hunt)),
        Command::new("deposit", Category::Economy, "Move gold into the bank", handler!(deposit))
            .aliases(&["dep"])
            .usage("<amount|all>"),
        Command::new("withdraw", Category::Economy, "Take gold out of the bank", handler!(withdraw))
            .aliases(&["wd"])
            .usage("<amount|all>"),
        Command::new("transfer", Category::Economy, "Give gold to someone", handler!(transfer))
            .aliases(&["pay", "give"])
            .usage("@user <amount>"),
        Command::new("gamble", Category::Economy, "Bet gold on a 45% chance to double it", handler!(gamble))
            .aliases(&["bet"])
            .usage("<amount>"),
        Command::new("flip", Category::Economy, "Bet gold on a coin flip", handler!(flip))
            .usage("heads|tails <amount>"),
        Command::new("rob", Category::Economy, "Try to rob someone", handler!(rob)).usage("@user"),
        Command::new("shop", Category::Economy, "What you can buy", handler!(shop)),
        Command::new("buy", Category::Economy, "Buy an item from the shop", handler!(buy))
            .usage("<item>"),
        Command::new("sell", Category::Economy, "Sell items for half price", handler!(sell))
            .usage("<item> [quantity]"),
        Command::new("inventory", Category::Economy, "Your items", handler!(inventory))
            .aliases(&["inv"]),
        Command::new("richest", Category::Economy, "The wealthiest users", handler!(richest))
            .aliases(&["leaderboard", "lb"]),
    ]
}

pub struct Mineral {
    pub name: &'static str,
    pub chance: f64,
    pub reward: RangeInclusive<i64>,
}

pub const MINERALS: &[Mineral] = &[
    Mineral {
        name: "Diamond",
        chance: 0.05,
        reward: 1000..=2000,
    },
    Mineral {
        name: "Gold",
        chance: 0.15,
        reward: 500..=1000,
    },
    Mineral {
        name: "Silver",
        chance: 0.3,
        reward: 250..=500,
    },
    Mineral {
        name: "Iron",
        chance: 0.5,
        reward: 100..=250,
    },
];

/// Picks a mineral for a roll in `0.0..1.0` by cumulative chance.
pub fn mineral_for_roll(roll: f64) -> &'static Mineral {
    let mut cumulative = 0.0;
    for mineral in MINERALS {
        cumulative += mineral.chance;
        if roll < cumulative {
            return mineral;
        }
    }
    &MINERALS[MINERALS.len() - 1]
}

/// `all` or a positive amount.
fn amount_or_all(arg: Option<&String>, all: i64) -> Option<i64> {
    match arg {
        Some(arg) if arg.eq_ignore_ascii_case("all") => Some(all).filter(|all| *all > 0),
        other => parse_amount(other),
    }
}

/// Wallet and bank balance
async fn balance(ctx: Ctx) -> Result<()> {
    let target = ctx.target().unwrap_or_else(|| ctx.author());
    let user = ctx.state.users.get(&target)?;

    let mut text = format!(
        "💰 *Balance of {}*\n\n👛 Wallet: {} gold\n🏦 Bank: {} gold\n💎 Net worth: {} gold",
        jid::mention(&target),
        thousands(user.gold),
        thousands(user.bank),
        thousands(user.net_worth())
    );

    if target == ctx.author() {
        let now = chrono::Utc::now();
        text.push_str("\n\n🎁 *Rewards*");
        for (reward, name) in [
            (Reward::Daily, "Daily"),
            (Reward::Weekly, "Weekly"),
            (Reward::Monthly, "Monthly"),
        ] {
            let status = match ctx.state.users.claim_cooldown(&target, reward, now)? {
                Some(remaining) => format!("in {}", wait(remaining)),
                None => "ready".to_owned(),
            };
            let _ = write!(text, "\n• {name}: {status}");
        }
    }

    ctx.say_mentioning(text, vec![target]).await
}

async fn claim(ctx: Ctx, reward: Reward, title: &str, range: RangeInclusive<i64>) -> Result<()> {
    let amount = rand::rng().random_range(range);
    let gold = ctx
        .state
        .users
        .claim(&ctx.author(), reward, amount, chrono::Utc::now())?;

    ctx.say(format!(
        "✨ *{title} Reward*\n\nYou received {} gold!\nNew balance: {} gold",
        thousands(amount),
        thousands(gold)
    ))
    .await
}

/// Claim your daily reward
async fn daily(ctx: Ctx) -> Result<()> {
    claim(ctx, Reward::Daily, "Daily", DAILY_REWARD).await
}

/// Claim your weekly reward
async fn weekly(ctx: Ctx) -> Result<()> {
    claim(ctx, Reward::Weekly, "Weekly", WEEKLY_REWARD).await
}

/// Claim your monthly reward
async fn monthly(ctx: Ctx) -> Result<()> {
    claim(ctx, Reward::Monthly, "Monthly", MONTHLY_REWARD).await
}

fn activity(ctx: &Ctx, activity: Activity, earnings: i64) -> Result<i64> {
    Ok(ctx
        .state
        .users
        .perform_activity(&ctx.author(), activity, earnings, chrono::Utc::now())?)
}

/// Work a shift for gold
async fn work(ctx: Ctx) -> Result<()> {
    let earnings = rand::rng().random_range(WORK_PAY);
    let gold = activity(&ctx, Activity::Work, earnings)?;

    ctx.say(format!(
        "💼 *Work Complete*\n\nYou earned {} gold!\nNew balance: {} gold",
        thousands(earnings),
        thousands(gold)
    ))
    .await
}

/// Mine for minerals
async fn mine(ctx: Ctx) -> Result<()> {
    let (mineral, earnings) = {
        let mut rng = rand::rng();
        let mineral = mineral_for_roll(rng.random());
        (mineral, rng.random_range(mineral.reward.clone()))
    };
    let gold = activity(&ctx, Activity::Mine, earnings)?;

    ctx.say(format!(
        "⛏️ *Mining Complete!*\n\n💎 Found: {}\n💰 Earned: {} gold\n💳 New balance: {} gold",
        mineral.name,
        thousands(earnings),
        thousands(gold)
    ))
    .await
}

/// Go fishing
async fn fish(ctx: Ctx) -> Result<()> {
    let earnings = rand::rng().random_range(FISH_PAY);
    let gold = activity(&ctx, Activity::Fish, earnings)?;

    ctx.say(format!(
        "🎣 *Fishing Complete*\n\nYou caught fish worth {} gold!\nNew balance: {} gold",
        thousands(earnings),
        thousands(gold)
    ))
    .await
}

/// Go hunting
async fn hunt(ctx: Ctx) -> Result<()> {
    let earnings = rand::rng().random_range(HUNT_PAY);
    let gold = activity(&ctx, Activity::Hunt, earnings)?;

    ctx.say(format!(
        "🏹 *Hunting Complete*\n\nYou hunted and earned {} gold!\nNew balance: {} gold",
        thousands(earnings),
        thousands(gold)
    ))
    .await
}

/// Move gold into the bank
async fn deposit(ctx: Ctx) -> Result<()> {
    let author = ctx.author();
    let wallet = ctx.state.users.get(&author)?.gold;
    let Some(amount) = amount_or_all(ctx.args.first(), wallet) else {
        return ctx.usage("<amount|all>").await;
    };

    let (gold, bank) = ctx.state.users.deposit(&author, amount)?;
    ctx.say(format!(
        "💳 Deposited {} gold to your bank account!\n👛 Wallet: {} gold\n🏦 Bank: {} gold",
        thousands(amount),
        thousands(gold),
        thousands(bank)
    ))
    .await
}

/// Take gold out of the bank
async fn withdraw(ctx: Ctx) -> Result<()> {
    let author = ctx.author();
    let bank = ctx.state.users.get(&author)?.bank;
    let Some(amount) = amount_or_all(ctx.args.first(), bank) else {
        return ctx.usage("<amount|all>").await;
    };

    let (gold, bank) = ctx.state.users.withdraw(&author, amount)?;
    ctx.say(format!(
        "🏧 Withdrew {} gold from your bank account!\n👛 Wallet: {} gold\n🏦 Bank: {} gold",
        thousands(amount),
        thousands(gold),
        thousands(bank)
    ))
    .await
}

/// Give gold to someone
async fn transfer(ctx: Ctx) -> Result<()> {
    let (Some(target), Some(amount)) = (ctx.target(), parse_amount(ctx.args.get(1))) else {
        return ctx.usage("@user <amount>").await;
    };

    let gold = ctx.state.users.transfer(&ctx.author(), &target, amount)?;
    ctx.say_mentioning(
        format!(
            "💸 Transferred {} gold to {}!\nYour balance: {} gold",
            thousands(amount),
            jid::mention(&target),
            thousands(gold)
        ),
        vec![target],
    )
    .await
}

fn bet(ctx: &Ctx, stake: i64, won: bool) -> Result<i64> {
    let multiplier = if won { 2 } else { 0 };
    Ok(ctx.state.users.settle_bet(&ctx.author(), stake, multiplier)?)
}

/// Bet gold on a 45% chance to double it
async fn gamble(ctx: Ctx) -> Result<()> {
    let Some(stake) = parse_amount(ctx.args.first()) else {
        return ctx.usage("<amount>").await;
    };
    let won = rand::rng().random_bool(GAMBLE_WIN_CHANCE);
    let gold = bet(&ctx, stake, won)?;

    let text = if won {
        format!("🎰 You won {} gold!\n\nNew balance: {} gold", thousands(stake.saturating_mul(2)), thousands(gold))
    } else {
        format!("💸 You lost {} gold!\n\nNew balance: {} gold", thousands(stake), thousands(gold))
    };
    ctx.say(text).await
}

/// Bet gold on a coin flip
async fn flip(ctx: Ctx) -> Result<()> {
    let choice = ctx.args.first().map(|choice| choice.to_lowercase());
    let (Some(choice), Some(stake)) = (choice, parse_amount(ctx.args.get(1))) else {
        return ctx.usage("heads|tails <amount>").await;
    };
    if choice != "heads" && choice != "tails" {
        return ctx.say("❌ Please choose either heads or tails!").await;
    }

    let side = if rand::rng().random_bool(0.5) { "heads" } else { "tails" };
    let won = side == choice;
    let gold = bet(&ctx, stake, won)?;

    ctx.say(format!(
        "🪙 The coin landed on *{side}*!\n{}\nNew balance: {} gold",
        if won {
            format!("🎉 You won {} gold!", thousands(stake.saturating_mul(2)))
        } else {
            format!("😢 You lost {} gold!", thousands(stake))
        },
        thousands(gold)
    ))
    .await
}

/// Try to rob someone
async fn rob(ctx: Ctx) -> Result<()> {
    let Some(victim) = ctx.target() else {
        return ctx.usage("@user").await;
    };

    let (success, amount) = {
        let mut rng = rand::rng();
        (rng.random_bool(ROB_SUCCESS_CHANCE), rng.random_range(ROB_AMOUNT))
    };
    let outcome =
        ctx.state
            .users
            .rob(&ctx.author(), &victim, success, amount, chrono::Utc::now())?;

    let mention = jid::mention(&victim);
    let text = match outcome {
        RobOutcome::Stolen(stolen) => {
            format!("🦹 Successfully robbed {mention} and got away with {} gold!", thousands(stolen))
        }
        RobOutcome::Fined(fine) => format!(
            "👮 You got caught trying to rob {mention} and had to pay a fine of {} gold!",
            thousands(fine)
        ),
    };
    ctx.say_mentioning(text, vec![victim]).await
}

/// What you can buy
async fn shop(ctx: Ctx) -> Result<()> {
    let prefix = ctx.prefix().await;
    let mut text = String::from("🏪 *Shop*\n\n");
    for item in SHOP {
        let _ = writeln!(
            text,
            "*{}* ({})\n💰 Price: {} gold\n📝 {}\n",
            item.name,
            item.id,
            thousands(item.price),
            item.description
        );
    }
    let _ = write!(text, "Buy with {prefix}buy <item>");
    ctx.say(text).await
}

/// Buy an item from the shop
async fn buy(ctx: Ctx) -> Result<()> {
    let Some(item) = ctx.args.first() else {
        return ctx.usage("<item>").await;
    };

    let (item, gold) = ctx.state.users.buy(&ctx.author(), item)?;
    ctx.say(format!(
        "✅ Successfully bought {} for {} gold!\nNew balance: {} gold",
        item.name,
        thousands(item.price),
        thousands(gold)
    ))
    .await
}

/// Sell items for half price
async fn sell(ctx: Ctx) -> Result<()> {
    let Some(item) = ctx.args.first() else {
        return ctx.usage("<item> [quantity]").await;
    };
    let quantity = match ctx.args.get(1) {
        None => 1,
        Some(quantity) => match quantity.parse::<u32>() {
            Ok(quantity) if quantity > 0 => quantity,
            _ => return ctx.say("❌ Please enter a valid quantity!").await,
        },
    };

    let earned = ctx.state.users.sell(&ctx.author(), item, quantity)?;
    ctx.say(format!("💰 Successfully sold {quantity} item(s) for {} gold!", thousands(earned)))
        .await
}

/// Your items
async fn inventory(ctx: Ctx) -> Result<()> {
    let user = ctx.state.users.get(&ctx.author())?;
    if user.inventory.is_empty() {
        return ctx.say("📦 Your inventory is empty!").await;
    }

    let items = user
        .inventory
        .iter()
        .map(|(id, count)| {
            let name = blacksky_db::economy::shop_item(id).map_or(id.as_str(), |item| item.name);
            format!("• {name} x{count}")
        })
        .join("\n");
    ctx.say(format!("🎒 *Inventory*\n\n{items}")).await
}

pub fn medal(rank: usize) -> String {
    match rank {
        0 => "🥇".to_owned(),
        1 => "🥈".to_owned(),
        2 => "🥉".to_owned(),
        n => format!("{}.", n + 1),
    }
}

/// The wealthiest users
async fn richest(ctx: Ctx) -> Result<()> {
    let richest = ctx.state.users.richest(10);
    if richest.is_empty() {
        return ctx.say("📊 Nobody has any gold yet!").await;
    }

    let lines = richest
        .iter()
        .enumerate()
        .map(|(rank, (user, record))| {
            format!(
                "{} {} - {} gold",
                medal(rank),
                jid::mention(user),
                thousands(record.net_worth())
            )
        })
        .join("\n");
    let mentions = richest.into_iter().map(|(user, _)| user).collect();

    ctx.say_mentioning(format!("🏆 *Richest Users*\n\n{lines}"), mentions)
        .await
}
