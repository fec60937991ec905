use crate::{
    conversation::{ChatMessage, Role},
    data::Ctx,
    dispatch::{Category, Command},
    handler,
};
use color_eyre::eyre::{OptionExt, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const OPENAI: &str = "https://api.openai.com";

pub fn commands() -> Vec<Command> {
    vec![
        Command::new("gpt", Category::Ai, "Chat with the AI", handler!(gpt))
            .aliases(&["ai", "chatgpt"])
            .usage("<prompt>")
            .cooldown(Duration::from_secs(5)),
        Command::new("clearchat", Category::Ai, "Forget your AI chat history", handler!(clearchat)),
        Command::new("imagine", Category::Ai, "Generate an image from a prompt", handler!(imagine))
            .aliases(&["dalle"])
            .usage("<description>")
            .cooldown(Duration::from_secs(30)),
    ]
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    url: String,
}

/// The OpenAI key, or a reply telling the user the feature is off.
async fn api_key(ctx: &Ctx) -> Result<Option<String>> {
    match &ctx.state.secrets.openai_api_key {
        Some(key) => Ok(Some(key.clone())),
        None => {
            ctx.say("❌ AI features are not configured. The bot owner needs to set OPENAI_API_KEY.")
                .await?;
            Ok(None)
        }
    }
}

async fn post_openai<B: Serialize, R: serde::de::DeserializeOwned>(
    ctx: &Ctx,
    key: &str,
    path: &str,
    body: &B,
) -> Result<R> {
    ctx.state
        .http
        .post(format!("{OPENAI}{path}"))
        .bearer_auth(key)
        .json(body)
        .send()
        .await
        .wrap_err("Failed to reach OpenAI")?
        .error_for_status()
        .wrap_err("OpenAI rejected the request")?
        .json()
        .await
        .wrap_err("Unexpected response from OpenAI")
}

/// The system prompt followed by the user's history and the new prompt.
fn build_messages(system_prompt: &str, conversation: Vec<ChatMessage>) -> Vec<ChatMessage> {
    std::iter::once(ChatMessage::new(Role::System, system_prompt))
        .chain(conversation)
        .collect()
}

/// Chat with the AI
async fn gpt(ctx: Ctx) -> Result<()> {
    let prompt = ctx.rest();
    if prompt.is_empty() {
        return ctx.usage("<prompt>").await;
    }
    let Some(key) = api_key(&ctx).await? else {
        return Ok(());
    };

    let (model, system_prompt, max_history) = {
        let config = ctx.state.config.read().await;
        (
            config.ai.model.clone(),
            config.ai.system_prompt.clone(),
            config.ai.max_history,
        )
    };

    let author = ctx.author();
    let messages = build_messages(
        &system_prompt,
        ctx.state.conversations.prompt_with_history(&author, &prompt),
    );
    tracing::debug!("sending {} messages to {model} for {author}", messages.len());

    let response: ChatResponse = post_openai(
        &ctx,
        &key,
        "/v1/chat/completions",
        &ChatRequest {
            model: &model,
            messages,
        },
    )
    .await?;
    let answer = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_owned())
        .ok_or_eyre("OpenAI returned no answer")?;

    ctx.state
        .conversations
        .record(&author, &prompt, &answer, max_history * 2, Instant::now());

    ctx.say(format!("🤖 {answer}")).await
}

/// Forget your AI chat history
async fn clearchat(ctx: Ctx) -> Result<()> {
    if ctx.state.conversations.clear(&ctx.author()) {
        ctx.say("🧹 Your AI chat history has been cleared!").await
    } else {
        ctx.say("ℹ️ You have no AI chat history.").await
    }
}

/// Generate an image from a prompt
async fn imagine(ctx: Ctx) -> Result<()> {
    let prompt = ctx.rest();
    if prompt.is_empty() {
        return ctx.usage("<description>").await;
    }
    let Some(key) = api_key(&ctx).await? else {
        return Ok(());
    };
    let model = ctx.state.config.read().await.ai.image_model.clone();

    ctx.say("🎨 Generating your image, please wait...").await?;
    let response: ImageResponse = post_openai(
        &ctx,
        &key,
        "/v1/images/generations",
        &ImageRequest {
            model: &model,
            prompt: &prompt,
            n: 1,
            size: "1024x1024",
        },
    )
    .await?;
    let image = response
        .data
        .into_iter()
        .next()
        .ok_or_eyre("OpenAI returned no image")?;

    ctx.send_image(&image.url, format!("🎨 *Prompt:* {prompt}"), vec![])
        .await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::test_support::*;

    #[test]
    fn system_prompt_comes_first() {
        let messages = build_messages(
            "be brief",
            vec![
                ChatMessage::new(Role::User, "hi"),
                ChatMessage::new(Role::Assistant, "hello"),
                ChatMessage::new(Role::User, "how are you?"),
            ],
        );

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], ChatMessage::new(Role::System, "be brief"));
        assert_eq!(messages[3].content, "how are you?");
    }

    #[test]
    fn chat_payload_shape() {
        let body = serde_json::to_value(ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage::new(Role::User, "hi")],
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({"model": "gpt-4o-mini", "messages": [{"role": "user", "content": "hi"}]})
        );

        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello!"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.choices[0].message.content, "Hello!");
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let (state, transport) = state();

        gpt(ctx(&state, message(ALICE, ALICE, ".gpt hello"), "gpt")).await.unwrap();
        imagine(ctx(&state, message(ALICE, ALICE, ".imagine"), "imagine")).await.unwrap();

        assert_eq!(
            transport.texts(),
            vec![
                "❌ AI features are not configured. The bot owner needs to set OPENAI_API_KEY.",
                "❌ Usage: .imagine <description>",
            ]
        );
    }

    #[tokio::test]
    async fn clearchat_forgets_history() {
        let (state, transport) = state();
        state
            .conversations
            .record(ALICE, "hi", "hello", 20, Instant::now());

        clearchat(ctx(&state, message(ALICE, ALICE, ".clearchat"), "clearchat")).await.unwrap();
        clearchat(ctx(&state, message(ALICE, ALICE, ".clearchat"), "clearchat")).await.unwrap();

        assert_eq!(
            transport.texts(),
            vec!["🧹 Your AI chat history has been cleared!", "ℹ️ You have no AI chat history."]
        );
    }
}
