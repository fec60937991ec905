//! WhatsApp ids: `<digits>@s.whatsapp.net` for people, `<id>@g.us` for groups.

pub const USER_SUFFIX: &str = "@s.whatsapp.net";
pub const GROUP_SUFFIX: &str = "@g.us";

pub fn is_group(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

/// Drops the device part: `123:4@s.whatsapp.net` becomes `123@s.whatsapp.net`.
pub fn normalize(jid: &str) -> String {
    let jid = jid.trim();
    match jid.split_once('@') {
        Some((user, server)) => {
            let user = user.split(':').next().unwrap_or(user);
            format!("{user}@{server}")
        }
        None => jid.to_owned(),
    }
}

/// The digits of the phone number behind a JID or a loosely formatted number.
pub fn phone_digits(jid_or_number: &str) -> String {
    let user = jid_or_number.split('@').next().unwrap_or(jid_or_number);
    let user = user.split(':').next().unwrap_or(user);
    user.chars().filter(char::is_ascii_digit).collect()
}

/// Turns `@4915...` or `+49 155...` into a user JID. No digits, no mention.
pub fn user_jid_from_arg(arg: &str) -> Option<String> {
    let digits = phone_digits(arg);
    (!digits.is_empty()).then(|| format!("{digits}{USER_SUFFIX}"))
}

/// The `@digits` text WhatsApp renders as a mention.
pub fn mention(jid: &str) -> String {
    format!("@{}", phone_digits(jid))
}

pub fn is_owner(jid: &str, owner_numbers: &[String]) -> bool {
    let digits = phone_digits(jid);
    !digits.is_empty() && owner_numbers.iter().any(|owner| phone_digits(owner) == digits)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_device_suffix() {
        assert_eq!(normalize("4915561048015:12@s.whatsapp.net"), "4915561048015@s.whatsapp.net");
        assert_eq!(normalize("120363000000000001@g.us"), "120363000000000001@g.us");
        assert_eq!(normalize("status"), "status");
    }

    #[test]
    fn mentions_become_jids() {
        assert_eq!(
            user_jid_from_arg("@4915561048015").as_deref(),
            Some("4915561048015@s.whatsapp.net")
        );
        assert_eq!(
            user_jid_from_arg("+49 155-610").as_deref(),
            Some("49155610@s.whatsapp.net")
        );
        assert_eq!(user_jid_from_arg("heads"), None);
    }

    #[test]
    fn owner_check_ignores_formatting() {
        let owners = vec!["+49 1556 1048015".to_owned()];

        assert!(is_owner("4915561048015:3@s.whatsapp.net", &owners));
        assert!(!is_owner("4915561048016@s.whatsapp.net", &owners));
        assert!(!is_owner("@g.us", &owners));
    }

    #[test]
    fn groups_are_detected() {
        assert!(is_group("120363000000000001@g.us"));
        assert!(!is_group("4915561048015@s.whatsapp.net"));
        assert_eq!(mention("4915561048015@s.whatsapp.net"), "@4915561048015");
    }
}
