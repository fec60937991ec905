use super::get_json;
use crate::{
    data::Ctx,
    dispatch::{Category, Command},
    handler,
};
use color_eyre::eyre::{OptionExt, Result};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

/// waifu.im tags offered by `nsfw <category>`.
pub const CATEGORIES: &[&str] = &[
    "waifu", "neko", "milf", "oral", "hentai", "ecchi", "ero", "trap", "blowjob", "ass", "paizuri",
];

pub fn commands() -> Vec<Command> {
    vec![
        Command::new("nsfwcheck", Category::Nsfw, "Check whether you can use NSFW commands", handler!(nsfwcheck)),
        Command::new("nsfw", Category::Nsfw, "NSFW picture from a category", handler!(nsfw))
            .usage("<category>")
            .cooldown(Duration::from_secs(10)),
    ]
}

fn tick(ok: bool) -> &'static str {
    if ok { "✅" } else { "❌" }
}

/// Check whether you can use NSFW commands
async fn nsfwcheck(ctx: Ctx) -> Result<()> {
    let user = ctx.state.users.get(&ctx.author())?;
    let prefix = ctx.prefix().await;

    let mut status = format!(
        "*NSFW Status Check*\n\n\
         • Registration: {}\n\
         • Name: {}\n\
         • Age: {}\n\
         • Age Verified: {}\n",
        tick(user.is_registered()),
        user.name.as_deref().unwrap_or("Not registered"),
        user.age.map_or_else(|| "Not set".to_owned(), |age| age.to_string()),
        tick(user.is_adult()),
    );
    if ctx.is_group() {
        let enabled = ctx.state.groups.get(ctx.chat())?.nsfw;
        status.push_str(&format!("• Group NSFW: {}\n", tick(enabled)));
    }
    status.push_str(&format!("\nTo register: {prefix}register <name> <age>"));

    ctx.say(status).await
}

/// The refusal for this user in this chat, if any.
async fn refusal(ctx: &Ctx) -> Result<Option<String>> {
    let user = ctx.state.users.get(&ctx.author())?;
    let prefix = ctx.prefix().await;

    if !user.is_registered() {
        return Ok(Some(format!(
            "⚠️ Please register first with {prefix}register <name> <age>. Must be 18+."
        )));
    }
    if !user.is_adult() {
        return Ok(Some("⚠️ You must be 18+ to use NSFW commands.".to_owned()));
    }
    if ctx.is_group() && !ctx.state.groups.get(ctx.chat())?.nsfw {
        return Ok(Some(format!(
            "⚠️ NSFW commands are disabled in this group. Admins can enable them with {prefix}setnsfw on"
        )));
    }
    Ok(None)
}

#[derive(Deserialize)]
struct WaifuIm {
    images: Vec<WaifuImImage>,
}

#[derive(Deserialize)]
struct WaifuImImage {
    url: String,
}

/// NSFW picture from a category
async fn nsfw(ctx: Ctx) -> Result<()> {
    if let Some(refusal) = refusal(&ctx).await? {
        tracing::debug!("refused nsfw for {} in {}", ctx.author(), ctx.chat());
        return ctx.say(refusal).await;
    }

    let category = ctx.args.first().map(|arg| arg.to_lowercase());
    let Some(category) = category.filter(|category| CATEGORIES.contains(&category.as_str())) else {
        let prefix = ctx.prefix().await;
        return ctx
            .say(format!(
                "🔞 *NSFW Categories*\n\n{}\n\nUsage: {prefix}nsfw <category>",
                CATEGORIES.join(", ")
            ))
            .await;
    };

    let url = Url::parse_with_params(
        "https://api.waifu.im/search/",
        &[("included_tags", category.as_str()), ("is_nsfw", "true")],
    )?;
    let found: WaifuIm = get_json(&ctx, url.as_str()).await?;
    let image = found
        .images
        .into_iter()
        .next()
        .ok_or_eyre("Content not available at the moment")?;

    ctx.send_image(&image.url, format!("🔞 NSFW {category} content"), vec![])
        .await
}
