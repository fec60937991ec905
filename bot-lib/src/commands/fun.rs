use super::get_json;
use crate::{
    data::Ctx,
    dispatch::{Category, Command},
    handler, jid,
};
use color_eyre::eyre::{OptionExt, Result};
use rand::{Rng, seq::IndexedRandom};
use serde::Deserialize;

pub const QUOTES: &[&str] = &[
    "Life is what happens when you're busy making other plans.",
    "The only way to do great work is to love what you do.",
    "In three words I can sum up everything I've learned about life: it goes on.",
    "Success is not final, failure is not fatal.",
    "Be yourself; everyone else is already taken.",
];

pub const INSULTS: &[&str] = &[
    "You're as useful as a screen door on a submarine!",
    "I'd agree with you but then we'd both be wrong.",
    "You're not the sharpest knife in the drawer, are you?",
    "I'd explain it to you but I ran out of crayons.",
];

pub const EIGHT_BALL: &[&str] = &[
    "It is certain.",
    "Without a doubt.",
    "You may rely on it.",
    "Most likely.",
    "Outlook good.",
    "Reply hazy, try again.",
    "Ask again later.",
    "Cannot predict now.",
    "Don't count on it.",
    "My sources say no.",
    "Very doubtful.",
];

pub const JOKES: &[&str] = &[
    "Why do programmers prefer dark mode? Because light attracts bugs.",
    "I told my computer I needed a break, and it said: no problem, I'll go to sleep.",
    "Why did the scarecrow win an award? He was outstanding in his field.",
    "There are 10 kinds of people: those who understand binary and those who don't.",
    "Why don't skeletons fight each other? They don't have the guts.",
];

pub const FACTS: &[&str] = &[
    "Honey never spoils; edible honey has been found in ancient Egyptian tombs.",
    "Octopuses have three hearts and blue blood.",
    "A day on Venus is longer than a year on Venus.",
    "Bananas are berries, but strawberries are not.",
    "Sharks existed before trees.",
];

pub const TRUTHS: &[&str] = &[
    "What is the most embarrassing thing you have ever done?",
    "What is a secret you have never told anyone?",
    "Who was your first crush?",
    "What is your biggest fear?",
    "What is the last lie you told?",
];

pub const DARES: &[&str] = &[
    "Send a voice note singing your favourite song.",
    "Change your profile picture to a potato for an hour.",
    "Text your last contact \"I know what you did\".",
    "Talk only in emojis for the next 10 minutes.",
    "Send the 5th photo in your gallery.",
];

/// Command name (also the waifu.pics category), verb, emoji.
pub const REACTIONS: &[(&str, &str, &str)] = &[
    ("hug", "hugged", "🤗"),
    ("slap", "slapped", "👋"),
    ("pat", "patted", "🥰"),
    ("kiss", "kissed", "💋"),
    ("cuddle", "cuddled", "🥰"),
    ("poke", "poked", "👉"),
    ("bonk", "bonked", "🔨"),
    ("wave", "waved at", "👋"),
    ("dance", "is dancing with", "💃"),
];

pub fn commands() -> Vec<Command> {
    let mut commands = vec![
        Command::new("coinflip", Category::Fun, "Flip a coin", handler!(coinflip)).aliases(&["cf"]),
        Command::new("dice", Category::Fun, "Roll a die", handler!(dice)).aliases(&["roll"]),
        Command::new("8ball", Category::Fun, "Ask the magic 8 ball", handler!(eight_ball))
            .aliases(&["magic8ball"])
            .usage("<question>"),
        Command::new("quote", Category::Fun, "A random quote", handler!(quote)),
        Command::new("joke", Category::Fun, "A random joke", handler!(joke)),
        Command::new("fact", Category::Fun, "A random fact", handler!(fact)),
        Command::new("truth", Category::Fun, "A truth question", handler!(truth)),
        Command::new("dare", Category::Fun, "A dare challenge", handler!(dare)),
        Command::new("insult", Category::Fun, "Insult someone (playfully)", handler!(insult))
            .usage("[@user]"),
    ];
    commands.extend(REACTIONS.iter().map(|&(name, _, _)| {
        Command::new(name, Category::Fun, "Anime reaction GIF", handler!(reaction)).usage("[@user]")
    }));
    commands
}

fn pick(list: &'static [&'static str]) -> &'static str {
    list.choose(&mut rand::rng()).copied().unwrap_or_default()
}

/// Flip a coin
async fn coinflip(ctx: Ctx) -> Result<()> {
    let result = if rand::rng().random_bool(0.5) { "Heads" } else { "Tails" };
    ctx.say(format!("🎲 Coin flip result: *{result}*")).await
}

/// Roll a die
async fn dice(ctx: Ctx) -> Result<()> {
    let result = rand::rng().random_range(1..=6);
    ctx.say(format!("🎲 Dice roll result: *{result}*")).await
}

/// Ask the magic 8 ball
async fn eight_ball(ctx: Ctx) -> Result<()> {
    let question = ctx.rest();
    if question.is_empty() {
        return ctx.usage("<question>").await;
    }
    ctx.say(format!("🎱 *Question:* {question}\n*Answer:* {}", pick(EIGHT_BALL)))
        .await
}

/// A random quote
async fn quote(ctx: Ctx) -> Result<()> {
    ctx.say(format!("📜 Random Quote:\n\n*{}*", pick(QUOTES))).await
}

/// A random joke
async fn joke(ctx: Ctx) -> Result<()> {
    ctx.say(format!("😂 {}", pick(JOKES))).await
}

/// A random fact
async fn fact(ctx: Ctx) -> Result<()> {
    ctx.say(format!("🧠 *Did you know?*\n\n{}", pick(FACTS))).await
}

/// A truth question
async fn truth(ctx: Ctx) -> Result<()> {
    ctx.say(format!("🤔 *Truth:* {}", pick(TRUTHS))).await
}

/// A dare challenge
async fn dare(ctx: Ctx) -> Result<()> {
    ctx.say(format!("😈 *Dare:* {}", pick(DARES))).await
}

/// `@user` text and mention list for an optional target.
fn target_text(ctx: &Ctx) -> (String, Vec<String>) {
    match ctx.target() {
        Some(target) => (jid::mention(&target), vec![target]),
        None => ("themselves".to_owned(), vec![]),
    }
}

/// Insult someone
async fn insult(ctx: Ctx) -> Result<()> {
    let (target, mentions) = target_text(&ctx);
    ctx.say_mentioning(
        format!(
            "*{}* insults {target}:\n\n\"{}\" 😈",
            ctx.message.display_name(),
            pick(INSULTS)
        ),
        mentions,
    )
    .await
}

#[derive(Deserialize)]
struct WaifuPics {
    url: String,
}

/// Anime reaction GIF, chosen by the command name
async fn reaction(ctx: Ctx) -> Result<()> {
    let (name, verb, emoji) = REACTIONS
        .iter()
        .find(|(name, _, _)| *name == ctx.command)
        .copied()
        .ok_or_eyre("reaction handler registered for an unknown reaction")?;

    let image: WaifuPics = get_json(&ctx, &format!("https://api.waifu.pics/sfw/{name}")).await?;
    let (target, mentions) = target_text(&ctx);

    ctx.send_image(
        &image.url,
        format!("*{}* {verb} {target}! {emoji}", ctx.message.display_name()),
        mentions,
    )
    .await
}
