pub mod ai;
pub mod anime;
pub mod basic;
pub mod economy;
pub mod fun;
pub mod games;
pub mod group;
pub mod nsfw;
pub mod owner;
pub mod search;
pub mod user;

use crate::{data::Ctx, dispatch::{Command, Registry}};
use color_eyre::eyre::{Result, WrapErr};
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

/// The command table every inbound message is dispatched against.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(|| Registry::new(all()));

pub fn all() -> Vec<Command> {
    [
        basic::commands(),
        economy::commands(),
        user::commands(),
        group::commands(),
        owner::commands(),
        fun::commands(),
        games::commands(),
        anime::commands(),
        ai::commands(),
        search::commands(),
        nsfw::commands(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// GETs `url` with the shared client and decodes the JSON body.
pub async fn get_json<T: DeserializeOwned>(ctx: &Ctx, url: &str) -> Result<T> {
    ctx.state
        .http
        .get(url)
        .send()
        .await
        .wrap_err("Failed to reach the API")?
        .error_for_status()
        .wrap_err("The API returned an error")?
        .json()
        .await
        .wrap_err("Unexpected response from the API")
}

/// A positive whole amount, or `None`.
pub fn parse_amount(arg: Option<&String>) -> Option<i64> {
    arg?.trim().parse::<i64>().ok().filter(|amount| *amount > 0)
}

/// `on`/`off` style switches.
pub fn parse_switch(arg: Option<&String>) -> Option<bool> {
    match arg?.to_lowercase().as_str() {
        "on" | "enable" | "true" => Some(true),
        "off" | "disable" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_and_aliases_are_unique() {
        let mut seen = HashSet::new();
        for command in all() {
            for name in std::iter::once(&command.name).chain(command.aliases) {
                assert!(seen.insert(*name), "`{name}` is registered twice");
            }
        }
        assert_eq!(REGISTRY.len(), all().len());
    }

    #[test]
    fn every_command_is_documented() {
        for command in REGISTRY.iter() {
            assert!(!command.description.is_empty(), "{} has no description", command.name);
            assert_eq!(command.name, command.name.to_lowercase());
        }
    }

    #[test]
    fn argument_helpers() {
        assert_eq!(parse_amount(Some(&"250".to_owned())), Some(250));
        assert_eq!(parse_amount(Some(&"-5".to_owned())), None);
        assert_eq!(parse_amount(Some(&"lots".to_owned())), None);
        assert_eq!(parse_amount(None), None);

        assert_eq!(parse_switch(Some(&"ON".to_owned())), Some(true));
        assert_eq!(parse_switch(Some(&"off".to_owned())), Some(false));
        assert_eq!(parse_switch(Some(&"maybe".to_owned())), None);
    }
}
