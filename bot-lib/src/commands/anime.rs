use super::get_json;
use crate::{
    data::Ctx,
    dispatch::{Category, Command},
    handler,
    utils::truncate,
};
use color_eyre::eyre::Result;
use reqwest::Url;
use serde::Deserialize;
use std::fmt::Display;

const JIKAN: &str = "https://api.jikan.moe/v4";
const SYNOPSIS_CHARS: usize = 700;

pub fn commands() -> Vec<Command> {
    vec![
        Command::new("anime", Category::Anime, "Look up an anime", handler!(anime)).usage("<name>"),
        Command::new("manga", Category::Anime, "Look up a manga", handler!(manga)).usage("<name>"),
        Command::new("character", Category::Anime, "Look up an anime character", handler!(character))
            .aliases(&["char"])
            .usage("<name>"),
        Command::new("waifu", Category::Anime, "A random waifu picture", handler!(random_image)),
        Command::new("neko", Category::Anime, "A random neko picture", handler!(random_image)),
    ]
}

#[derive(Deserialize)]
struct Search<T> {
    data: Vec<T>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Images {
    jpg: Jpg,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Jpg {
    image_url: Option<String>,
}

#[derive(Deserialize)]
struct Anime {
    title: String,
    url: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    score: Option<f64>,
    status: Option<String>,
    episodes: Option<u32>,
    synopsis: Option<String>,
    #[serde(default)]
    images: Images,
}

#[derive(Deserialize)]
struct Manga {
    title: String,
    url: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    score: Option<f64>,
    status: Option<String>,
    chapters: Option<u32>,
    synopsis: Option<String>,
    #[serde(default)]
    images: Images,
}

#[derive(Deserialize)]
struct Character {
    name: String,
    url: String,
    name_kanji: Option<String>,
    favorites: Option<u32>,
    about: Option<String>,
    #[serde(default)]
    images: Images,
}

fn or<T: Display>(value: Option<T>, fallback: &str) -> String {
    value.map_or_else(|| fallback.to_owned(), |value| value.to_string())
}

fn synopsis(text: Option<&str>) -> String {
    text.map_or_else(
        || "No synopsis available.".to_owned(),
        |text| truncate(text.trim(), SYNOPSIS_CHARS),
    )
}

fn describe_anime(anime: &Anime) -> String {
    format!(
        "🎬 *{}*\n\n\
         📺 Type: {}\n\
         ⭐ Rating: {}\n\
         🔍 Status: {}\n\
         📝 Episodes: {}\n\n\
         📖 Synopsis:\n{}\n\n\
         🔗 More info: {}",
        anime.title,
        or(anime.kind.as_deref(), "N/A"),
        or(anime.score, "N/A"),
        or(anime.status.as_deref(), "Unknown"),
        or(anime.episodes, "Unknown"),
        synopsis(anime.synopsis.as_deref()),
        anime.url
    )
}

fn describe_manga(manga: &Manga) -> String {
    format!(
        "📚 *{}*\n\n\
         📖 Type: {}\n\
         ⭐ Rating: {}\n\
         🔍 Status: {}\n\
         📝 Chapters: {}\n\n\
         📖 Synopsis:\n{}\n\n\
         🔗 More info: {}",
        manga.title,
        or(manga.kind.as_deref(), "N/A"),
        or(manga.score, "N/A"),
        or(manga.status.as_deref(), "Unknown"),
        or(manga.chapters, "Ongoing"),
        synopsis(manga.synopsis.as_deref()),
        manga.url
    )
}

fn describe_character(character: &Character) -> String {
    format!(
        "👤 *{}*{}\n\n\
         ❤️ Favorites: {}\n\n\
         📖 About:\n{}\n\n\
         🔗 More info: {}",
        character.name,
        character
            .name_kanji
            .as_deref()
            .map(|kanji| format!(" ({kanji})"))
            .unwrap_or_default(),
        or(character.favorites, "0"),
        character.about.as_deref().map_or_else(
            || "No description available.".to_owned(),
            |about| truncate(about.trim(), SYNOPSIS_CHARS)
        ),
        character.url
    )
}

/// First Jikan search hit for the command's arguments.
///
/// Replies with usage or "no results" itself and returns `None` in those cases.
async fn search<T: serde::de::DeserializeOwned>(ctx: &Ctx, endpoint: &str) -> Result<Option<T>> {
    let query = ctx.rest();
    if query.is_empty() {
        ctx.usage("<name>").await?;
        return Ok(None);
    }

    let url = Url::parse_with_params(
        &format!("{JIKAN}/{endpoint}"),
        &[("q", query.as_str()), ("limit", "1")],
    )?;
    tracing::debug!("searching {endpoint} for {query}");
    let found: Search<T> = get_json(ctx, url.as_str()).await?;

    match found.data.into_iter().next() {
        Some(hit) => Ok(Some(hit)),
        None => {
            ctx.say(format!("❌ No results found for: {query}")).await?;
            Ok(None)
        }
    }
}

/// Sends `text` with the cover picture when there is one.
async fn reply_with_cover(ctx: &Ctx, images: &Images, text: String) -> Result<()> {
    match &images.jpg.image_url {
        Some(url) => ctx.send_image(url, text, vec![]).await,
        None => ctx.say(text).await,
    }
}

/// Look up an anime
async fn anime(ctx: Ctx) -> Result<()> {
    let Some(anime) = search::<Anime>(&ctx, "anime").await? else {
        return Ok(());
    };
    reply_with_cover(&ctx, &anime.images, describe_anime(&anime)).await
}

/// Look up a manga
async fn manga(ctx: Ctx) -> Result<()> {
    let Some(manga) = search::<Manga>(&ctx, "manga").await? else {
        return Ok(());
    };
    reply_with_cover(&ctx, &manga.images, describe_manga(&manga)).await
}

/// Look up an anime character
async fn character(ctx: Ctx) -> Result<()> {
    let Some(character) = search::<Character>(&ctx, "characters").await? else {
        return Ok(());
    };
    reply_with_cover(&ctx, &character.images, describe_character(&character)).await
}

#[derive(Deserialize)]
struct WaifuPics {
    url: String,
}

/// Random SFW picture from the waifu.pics category named like the command
async fn random_image(ctx: Ctx) -> Result<()> {
    let image: WaifuPics =
        get_json(&ctx, &format!("https://api.waifu.pics/sfw/{}", ctx.command)).await?;
    ctx.send_image(&image.url, format!("✨ Here's your {}!", ctx.command), vec![])
        .await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::test_support::*;

    #[test]
    fn describes_jikan_anime() {
        let found: Search<Anime> = serde_json::from_str(
            r#"{"data": [{
                "title": "Cowboy Bebop",
                "url": "https://myanimelist.net/anime/1",
                "type": "TV",
                "score": 8.75,
                "status": "Finished Airing",
                "episodes": 26,
                "synopsis": null,
                "images": {"jpg": {"image_url": "https://cdn.example/1.jpg"}}
            }]}"#,
        )
        .unwrap();
        let anime = &found.data[0];

        let text = describe_anime(anime);
        assert!(text.starts_with("🎬 *Cowboy Bebop*\n\n📺 Type: TV\n⭐ Rating: 8.75\n"));
        assert!(text.contains("📝 Episodes: 26"));
        assert!(text.contains("No synopsis available."));
        assert_eq!(anime.images.jpg.image_url.as_deref(), Some("https://cdn.example/1.jpg"));
    }

    #[test]
    fn missing_manga_fields_fall_back() {
        let manga: Manga = serde_json::from_str(
            r#"{"title": "Berserk", "url": "https://myanimelist.net/manga/2", "type": null,
                "score": null, "status": "Publishing", "chapters": null, "synopsis": "Guts."}"#,
        )
        .unwrap();

        let text = describe_manga(&manga);
        assert!(text.contains("📖 Type: N/A\n⭐ Rating: N/A"));
        assert!(text.contains("📝 Chapters: Ongoing"));
        assert!(text.contains("📖 Synopsis:\nGuts."));
        assert!(manga.images.jpg.image_url.is_none());
    }

    #[test]
    fn character_shows_kanji() {
        let character: Character = serde_json::from_str(
            r#"{"name": "Spike Spiegel", "url": "https://myanimelist.net/character/1",
                "name_kanji": "スパイク", "favorites": 50000, "about": null}"#,
        )
        .unwrap();

        assert!(describe_character(&character).starts_with("👤 *Spike Spiegel* (スパイク)\n\n❤️ Favorites: 50000"));
    }

    #[tokio::test]
    async fn empty_query_shows_usage() {
        let (state, transport) = state();

        anime(ctx(&state, message(ALICE, ALICE, ".anime"), "anime")).await.unwrap();

        assert_eq!(transport.texts(), vec!["❌ Usage: .anime <name>"]);
    }
}
