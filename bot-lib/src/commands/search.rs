use super::get_json;
use crate::{
    data::Ctx,
    dispatch::{Category, Command},
    handler,
};
use color_eyre::eyre::{OptionExt, Result, WrapErr, eyre};
use itertools::Itertools;
use reqwest::Url;
use serde::Deserialize;
use std::fmt::Write;

pub fn commands() -> Vec<Command> {
    vec![
        Command::new("wiki", Category::Search, "Wikipedia summary", handler!(wiki))
            .aliases(&["wikipedia"])
            .usage("<term>"),
        Command::new("define", Category::Search, "Dictionary definition", handler!(define))
            .aliases(&["dictionary", "dict"])
            .usage("<word>"),
        Command::new("translate", Category::Search, "Translate text", handler!(translate))
            .aliases(&["tr"])
            .usage("<lang> <text>"),
        Command::new("math", Category::Search, "Evaluate a math expression", handler!(math))
            .aliases(&["calc"])
            .usage("<expression>"),
        Command::new("weather", Category::Search, "Current weather for a city", handler!(weather))
            .usage("<city>"),
    ]
}

/// `base` with `segment` appended as one percent-encoded path segment.
fn with_segment(base: &str, segment: &str) -> Result<Url> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|()| eyre!("{base} cannot take path segments"))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

#[derive(Deserialize)]
struct WikiSummary {
    title: String,
    extract: String,
    content_urls: Option<ContentUrls>,
}

#[derive(Deserialize)]
struct ContentUrls {
    desktop: Page,
}

#[derive(Deserialize)]
struct Page {
    page: String,
}

/// Wikipedia summary
async fn wiki(ctx: Ctx) -> Result<()> {
    let query = ctx.rest();
    if query.is_empty() {
        return ctx.usage("<term>").await;
    }

    let url = with_segment("https://en.wikipedia.org/api/rest_v1/page/summary/", &query)?;
    let summary: WikiSummary = get_json(&ctx, url.as_str()).await?;

    let mut text = format!("📚 *Wikipedia: {}*\n\n{}", summary.title, summary.extract);
    if let Some(urls) = summary.content_urls {
        let _ = write!(text, "\n\n🔗 Read more: {}", urls.desktop.page);
    }
    ctx.say(text).await
}

#[derive(Deserialize)]
struct Entry {
    word: String,
    phonetic: Option<String>,
    meanings: Vec<Meaning>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meaning {
    part_of_speech: String,
    definitions: Vec<Definition>,
}

#[derive(Deserialize)]
struct Definition {
    definition: String,
    example: Option<String>,
}

fn describe_entry(entry: &Entry) -> String {
    let mut text = format!(
        "📚 *Dictionary: {}*\n\n*Phonetic:* {}\n",
        entry.word,
        entry.phonetic.as_deref().unwrap_or("N/A")
    );
    for meaning in &entry.meanings {
        let _ = write!(text, "\n*{}*\n", meaning.part_of_speech);
        for (i, definition) in meaning.definitions.iter().take(2).enumerate() {
            let _ = writeln!(text, "{}. {}", i + 1, definition.definition);
            if let Some(example) = &definition.example {
                let _ = writeln!(text, "Example: {example}");
            }
        }
    }
    text.trim_end().to_owned()
}

/// Dictionary definition
async fn define(ctx: Ctx) -> Result<()> {
    let Some(word) = ctx.args.first() else {
        return ctx.usage("<word>").await;
    };

    let url = with_segment("https://api.dictionaryapi.dev/api/v2/entries/en/", word)?;
    let response = ctx
        .state
        .http
        .get(url)
        .send()
        .await
        .wrap_err("Failed to reach the dictionary")?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return ctx.say(format!("❌ No definition found for: {word}")).await;
    }

    let entries: Vec<Entry> = response
        .error_for_status()
        .wrap_err("The dictionary returned an error")?
        .json()
        .await
        .wrap_err("Unexpected response from the dictionary")?;
    let entry = entries.first().ok_or_eyre("The dictionary returned no entries")?;

    ctx.say(describe_entry(entry)).await
}

/// Joins the translated segments of a `translate_a/single` response.
fn translated_text(response: &serde_json::Value) -> Option<String> {
    let segments = response.get(0)?.as_array()?;
    let text = segments
        .iter()
        .filter_map(|segment| segment.get(0)?.as_str())
        .join("");
    (!text.is_empty()).then_some(text)
}

/// Translate text
async fn translate(ctx: Ctx) -> Result<()> {
    let Some((lang, words)) = ctx.args.split_first().filter(|(_, words)| !words.is_empty()) else {
        return ctx.usage("<lang> <text>").await;
    };
    let text = words.join(" ");

    let url = Url::parse_with_params(
        "https://translate.googleapis.com/translate_a/single",
        &[
            ("client", "gtx"),
            ("sl", "auto"),
            ("tl", lang.as_str()),
            ("dt", "t"),
            ("q", text.as_str()),
        ],
    )?;
    let response: serde_json::Value = get_json(&ctx, url.as_str()).await?;
    let translation = translated_text(&response).ok_or_eyre("No translation returned")?;

    ctx.say(format!("🌐 *Translation*\n\nFrom: {text}\nTo ({lang}): {translation}"))
        .await
}

/// Evaluate a math expression
async fn math(ctx: Ctx) -> Result<()> {
    let expression = ctx.rest();
    if expression.is_empty() {
        return ctx.usage("<expression>").await;
    }

    let url = Url::parse_with_params("https://api.mathjs.org/v4/", &[("expr", expression.as_str())])?;
    let response = ctx
        .state
        .http
        .get(url)
        .send()
        .await
        .wrap_err("Failed to reach the calculator")?;
    let ok = response.status().is_success();
    let body = response.text().await.wrap_err("Unreadable calculator response")?;

    if ok {
        ctx.say(format!("🔢 *Math Result*\n\n{expression} = {body}")).await
    } else {
        ctx.say(format!("❌ Could not evaluate {expression}: {body}")).await
    }
}

#[derive(Deserialize)]
struct Weather {
    name: String,
    sys: Option<Country>,
    main: Readings,
    weather: Vec<Conditions>,
    wind: Option<Wind>,
}

#[derive(Deserialize)]
struct Country {
    country: Option<String>,
}

#[derive(Deserialize)]
struct Readings {
    temp: f64,
    feels_like: f64,
    humidity: u32,
}

#[derive(Deserialize)]
struct Conditions {
    description: String,
}

#[derive(Deserialize)]
struct Wind {
    speed: f64,
}

fn describe_weather(weather: &Weather) -> String {
    let place = match weather.sys.as_ref().and_then(|sys| sys.country.as_deref()) {
        Some(country) => format!("{}, {country}", weather.name),
        None => weather.name.clone(),
    };
    format!(
        "🌤️ *Weather in {place}*\n\n\
         🌡️ Temperature: {:.1}°C (feels like {:.1}°C)\n\
         💧 Humidity: {}%\n\
         💨 Wind: {} m/s\n\
         ☁️ Conditions: {}",
        weather.main.temp,
        weather.main.feels_like,
        weather.main.humidity,
        weather.wind.as_ref().map_or(0.0, |wind| wind.speed),
        weather
            .weather
            .iter()
            .map(|conditions| conditions.description.as_str())
            .join(", ")
    )
}

/// Current weather for a city
async fn weather(ctx: Ctx) -> Result<()> {
    let city = ctx.rest();
    if city.is_empty() {
        return ctx.usage("<city>").await;
    }
    let Some(key) = ctx.state.secrets.weather_api_key.clone() else {
        return ctx
            .say("❌ Weather is not configured. The bot owner needs to set OPENWEATHER_API_KEY.")
            .await;
    };

    let url = Url::parse_with_params(
        "https://api.openweathermap.org/data/2.5/weather",
        &[("q", city.as_str()), ("appid", key.as_str()), ("units", "metric")],
    )?;
    let response = ctx
        .state
        .http
        .get(url)
        .send()
        .await
        .wrap_err("Failed to reach the weather service")?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return ctx.say(format!("❌ City not found: {city}")).await;
    }

    let weather: Weather = response
        .error_for_status()
        .wrap_err("The weather service returned an error")?
        .json()
        .await
        .wrap_err("Unexpected response from the weather service")?;
    ctx.say(describe_weather(&weather)).await
}
