//! Talking to WhatsApp through the Baileys bridge sidecar.
//!
//! The bridge owns the WhatsApp session; it posts inbound events to our
//! webhook and exposes a small HTTP API for everything we send.

use async_trait::async_trait;
use color_eyre::eyre::{Result, WrapErr, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::jid;

/// One inbound chat message as posted by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub id: String,
    /// Where the message was posted: a user JID or a group JID.
    pub chat: String,
    /// The author in group chats. Absent in private chats.
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub from_me: bool,
    /// JIDs mentioned in the message.
    #[serde(default)]
    pub mentions: Vec<String>,
}

impl InboundMessage {
    /// The author, with device suffixes stripped.
    pub fn author(&self) -> String {
        jid::normalize(self.sender.as_deref().unwrap_or(&self.chat))
    }

    pub fn is_group(&self) -> bool {
        jid::is_group(&self.chat)
    }

    pub fn display_name(&self) -> String {
        self.push_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| jid::mention(&self.author()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAction {
    Add,
    Remove,
    Promote,
    Demote,
}

/// Group membership change as posted by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantUpdate {
    pub group: String,
    pub participants: Vec<String>,
    pub action: ParticipantAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    /// `null`, `"admin"` or `"superadmin"`.
    #[serde(default)]
    pub admin: Option<String>,
}

impl Participant {
    pub fn is_admin(&self) -> bool {
        self.admin.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl GroupMetadata {
    pub fn is_admin(&self, user: &str) -> bool {
        let user = jid::phone_digits(user);
        self.participants
            .iter()
            .any(|p| p.is_admin() && jid::phone_digits(&p.id) == user)
    }

    pub fn admins(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.is_admin())
    }
}

/// Everything the bot sends to WhatsApp goes through here.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the id of the sent message.
    async fn send_text(&self, to: &str, text: &str, mentions: &[String]) -> Result<String>;

    async fn send_image(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
        mentions: &[String],
    ) -> Result<String>;

    async fn group_metadata(&self, group: &str) -> Result<GroupMetadata>;

    /// JIDs of every group the bot account is a member of.
    async fn joined_groups(&self) -> Result<Vec<String>>;

    async fn update_participants(
        &self,
        group: &str,
        participants: &[String],
        action: ParticipantAction,
    ) -> Result<()>;

    async fn set_blocked(&self, jid: &str, blocked: bool) -> Result<()>;

    async fn is_connected(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    success: bool,
    #[serde(rename = "messageId")]
    message_id: Option<String>,
    error: Option<String>,
}

impl SendResponse {
    fn into_result(self) -> Result<String> {
        if self.success {
            Ok(self.message_id.unwrap_or_default())
        } else {
            bail!(
                "bridge refused: {}",
                self.error.unwrap_or_else(|| "unknown error".to_owned())
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    connected: bool,
}

/// [`Transport`] backed by the bridge's HTTP API.
#[derive(Debug, Clone)]
pub struct BridgeTransport {
    base_url: String,
    client: reqwest::Client,
    secret: Option<String>,
}

impl BridgeTransport {
    pub fn new(base_url: &str, timeout: Duration, secret: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to create bridge HTTP client")?;

        Ok(BridgeTransport {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
            secret,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.secret {
            Some(secret) => request.bearer_auth(secret),
            None => request,
        }
    }

    async fn post_send(&self, path: &str, body: &impl Serialize) -> Result<String> {
        self.authorized(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await
            .wrap_err_with(|| format!("Failed to reach bridge at {path}"))?
            .error_for_status()?
            .json::<SendResponse>()
            .await
            .wrap_err("Invalid send response from bridge")?
            .into_result()
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    async fn send_text(&self, to: &str, text: &str, mentions: &[String]) -> Result<String> {
        #[derive(Serialize)]
        struct SendRequest<'a> {
            to: &'a str,
            text: &'a str,
            mentions: &'a [String],
        }

        tracing::debug!("sending {} chars to {to}", text.len());
        self.post_send("/send", &SendRequest { to, text, mentions })
            .await
    }

    async fn send_image(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
        mentions: &[String],
    ) -> Result<String> {
        #[derive(Serialize)]
        struct SendImageRequest<'a> {
            to: &'a str,
            url: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            caption: Option<&'a str>,
            mentions: &'a [String],
        }

        self.post_send(
            "/send-image",
            &SendImageRequest {
                to,
                url,
                caption,
                mentions,
            },
        )
        .await
    }

    async fn group_metadata(&self, group: &str) -> Result<GroupMetadata> {
        self.authorized(self.client.get(self.url(&format!("/groups/{group}"))))
            .send()
            .await
            .wrap_err("Failed to fetch group metadata")?
            .error_for_status()?
            .json()
            .await
            .wrap_err("Invalid group metadata from bridge")
    }

    async fn joined_groups(&self) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct JoinedGroup {
            id: String,
        }

        let groups: Vec<JoinedGroup> = self
            .authorized(self.client.get(self.url("/groups")))
            .send()
            .await
            .wrap_err("Failed to list groups")?
            .error_for_status()?
            .json()
            .await
            .wrap_err("Invalid group list from bridge")?;

        Ok(groups.into_iter().map(|group| group.id).collect())
    }

    async fn update_participants(
        &self,
        group: &str,
        participants: &[String],
        action: ParticipantAction,
    ) -> Result<()> {
        #[derive(Serialize)]
        struct ParticipantsRequest<'a> {
            participants: &'a [String],
            action: ParticipantAction,
        }

        self.authorized(
            self.client
                .post(self.url(&format!("/groups/{group}/participants"))),
        )
        .json(&ParticipantsRequest {
            participants,
            action,
        })
        .send()
        .await
        .wrap_err("Failed to update group participants")?
        .error_for_status()?;

        Ok(())
    }

    async fn set_blocked(&self, jid: &str, blocked: bool) -> Result<()> {
        #[derive(Serialize)]
        struct BlockRequest<'a> {
            jid: &'a str,
            action: &'static str,
        }

        let action = if blocked { "block" } else { "unblock" };
        self.authorized(self.client.post(self.url("/block")))
            .json(&BlockRequest { jid, action })
            .send()
            .await
            .wrap_err("Failed to update block list")?
            .error_for_status()?;

        Ok(())
    }

    async fn is_connected(&self) -> bool {
        let status = async {
            self.authorized(self.client.get(self.url("/status")))
                .send()
                .await?
                .json::<StatusResponse>()
                .await
        };

        match status.await {
            Ok(status) => status.connected,
            Err(e) => {
                tracing::debug!("bridge status check failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! An in-memory [`Transport`] that records what was sent.

    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Sent {
        pub to: String,
        pub text: String,
        pub mentions: Vec<String>,
        pub image: Option<String>,
    }

    #[derive(Debug, Default)]
    pub struct FakeTransport {
        pub sent: Mutex<Vec<Sent>>,
        pub groups: Mutex<Vec<GroupMetadata>>,
        pub participant_updates: Mutex<Vec<(String, Vec<String>, ParticipantAction)>>,
        pub blocked: Mutex<Vec<(String, bool)>>,
    }

    impl FakeTransport {
        pub fn texts(&self) -> Vec<String> {
            self.sent.lock().iter().map(|s| s.text.clone()).collect()
        }

        pub fn with_group(self, group: &str, admins: &[&str], members: &[&str]) -> Self {
            let participants = admins
                .iter()
                .map(|id| Participant {
                    id: (*id).to_owned(),
                    admin: Some("admin".to_owned()),
                })
                .chain(members.iter().map(|id| Participant {
                    id: (*id).to_owned(),
                    admin: None,
                }))
                .collect();
            self.groups.lock().push(GroupMetadata {
                id: group.to_owned(),
                subject: "Test Group".to_owned(),
                participants,
            });
            self
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send_text(&self, to: &str, text: &str, mentions: &[String]) -> Result<String> {
            let mut sent = self.sent.lock();
            sent.push(Sent {
                to: to.to_owned(),
                text: text.to_owned(),
                mentions: mentions.to_vec(),
                image: None,
            });
            Ok(format!("MSG{}", sent.len()))
        }

        async fn send_image(
            &self,
            to: &str,
            url: &str,
            caption: Option<&str>,
            mentions: &[String],
        ) -> Result<String> {
            let mut sent = self.sent.lock();
            sent.push(Sent {
                to: to.to_owned(),
                text: caption.unwrap_or_default().to_owned(),
                mentions: mentions.to_vec(),
                image: Some(url.to_owned()),
            });
            Ok(format!("MSG{}", sent.len()))
        }

        async fn group_metadata(&self, group: &str) -> Result<GroupMetadata> {
            match self.groups.lock().iter().find(|g| g.id == group) {
                Some(metadata) => Ok(metadata.clone()),
                None => bail!("unknown group {group}"),
            }
        }

        async fn joined_groups(&self) -> Result<Vec<String>> {
            Ok(self.groups.lock().iter().map(|g| g.id.clone()).collect())
        }

        async fn update_participants(
            &self,
            group: &str,
            participants: &[String],
            action: ParticipantAction,
        ) -> Result<()> {
            self.participant_updates
                .lock()
                .push((group.to_owned(), participants.to_vec(), action));
            Ok(())
        }

        async fn set_blocked(&self, jid: &str, blocked: bool) -> Result<()> {
            self.blocked.lock().push((jid.to_owned(), blocked));
            Ok(())
        }

        async fn is_connected(&self) -> bool {
            true
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn inbound_message_uses_bridge_field_names() {
        let message: InboundMessage = serde_json::from_str(
            r#"{
                "id": "ABC",
                "chat": "120363000000000001@g.us",
                "sender": "4915561048015:7@s.whatsapp.net",
                "pushName": "Alice",
                "text": ".ping",
                "timestamp": 1700000000,
                "fromMe": false
            }"#,
        )
        .unwrap();

        assert_eq!(message.author(), "4915561048015@s.whatsapp.net");
        assert!(message.is_group());
        assert!(message.mentions.is_empty());
        assert_eq!(message.display_name(), "Alice");
    }

    #[test]
    fn private_chat_author_is_the_chat() {
        let message = InboundMessage {
            id: "1".to_owned(),
            chat: "4915561048015@s.whatsapp.net".to_owned(),
            sender: None,
            push_name: None,
            text: "hi".to_owned(),
            timestamp: 0,
            from_me: false,
            mentions: vec![],
        };

        assert_eq!(message.author(), "4915561048015@s.whatsapp.net");
        assert_eq!(message.display_name(), "@4915561048015");
    }

    #[test]
    fn admin_lookup_ignores_device_suffix() {
        let metadata: GroupMetadata = serde_json::from_str(
            r#"{
                "id": "1@g.us",
                "subject": "Friends",
                "participants": [
                    {"id": "111@s.whatsapp.net", "admin": "superadmin"},
                    {"id": "222@s.whatsapp.net", "admin": null},
                    {"id": "333@s.whatsapp.net"}
                ]
            }"#,
        )
        .unwrap();

        assert!(metadata.is_admin("111:2@s.whatsapp.net"));
        assert!(!metadata.is_admin("222@s.whatsapp.net"));
        assert_eq!(metadata.admins().count(), 1);
    }

    #[test]
    fn refused_send_is_an_error() {
        let refused = SendResponse {
            success: false,
            message_id: None,
            error: Some("not connected".to_owned()),
        };

        assert!(refused.into_result().is_err());
    }
}
