use crate::dispatcher::{ Dispatcher, Reply };
use crate::models::chat::{ ChatMessage, Role };
use log::info;
use uuid::Uuid;

/// State owned by one interactive connection. Created when the connection
/// opens, threaded through every exchange, dropped when it closes.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    messages: Vec<ChatMessage>,
    reply_prefix: Option<String>,
}

impl Session {
    pub fn start(reply_prefix: Option<String>) -> Self {
        let id = Uuid::new_v4().to_string();
        info!("Session {} started", id);
        Self {
            id,
            messages: Vec::new(),
            reply_prefix: reply_prefix.filter(|p| !p.is_empty()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Appends the user message, dispatches it and appends the reply.
    /// Blank input leaves the session untouched and yields `None`.
    pub async fn exchange(mut self, dispatcher: &Dispatcher, input: &str) -> (Self, Option<String>) {
        if input.trim().is_empty() {
            return (self, None);
        }

        self.messages.push(ChatMessage::now(Role::User, input));
        let reply = dispatcher.dispatch(input).await;
        info!("Session {} reply route: {}", self.id, reply.route());

        let text = match reply {
            Reply::Canned { text, .. } =>
                match &self.reply_prefix {
                    Some(prefix) => format!("{}{}", prefix, text),
                    None => text,
                }
            other => other.into_text(),
        };
        self.messages.push(ChatMessage::now(Role::Assistant, text.clone()));
        (self, Some(text))
    }

    pub fn reset(mut self) -> Self {
        info!("Session {} cleared ({} messages dropped)", self.id, self.messages.len());
        self.messages.clear();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::tests::{ greeting_intents, StubClient };
    use crate::dispatcher::FixedPicker;
    use std::sync::Arc;

    fn dispatcher(client: Arc<StubClient>) -> Dispatcher {
        Dispatcher::new(greeting_intents(), client, "sys").with_picker(Arc::new(FixedPicker(0)))
    }

    #[tokio::test]
    async fn exchange_appends_user_then_assistant() {
        let d = dispatcher(StubClient::answering("Photosynthesis turns light into sugar."));
        let session = Session::start(None);

        let (session, reply) = session.exchange(&d, "Hello").await;
        assert_eq!(reply.as_deref(), Some("Hi there!"));
        let (session, reply) = session.exchange(&d, "explain photosynthesis").await;
        assert_eq!(reply.as_deref(), Some("Photosynthesis turns light into sugar."));

        let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(session.messages()[2].content, "explain photosynthesis");
        assert_eq!(session.messages()[0].timestamp.len(), 14);
    }

    #[tokio::test]
    async fn prefix_applies_only_to_canned_replies() {
        let d = dispatcher(StubClient::answering("generated"));
        let session = Session::start(Some("[RESPONSE PROTOCOL ACTIVATED] >> ".into()));

        let (session, canned) = session.exchange(&d, "hi").await;
        assert_eq!(canned.as_deref(), Some("[RESPONSE PROTOCOL ACTIVATED] >> Hi there!"));
        let (_, generated) = session.exchange(&d, "tell me a story").await;
        assert_eq!(generated.as_deref(), Some("generated"));
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let client = StubClient::answering("unused");
        let d = dispatcher(client.clone());
        let (session, reply) = Session::start(None).exchange(&d, "   ").await;
        assert!(reply.is_none());
        assert!(session.messages().is_empty());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn reset_clears_history_but_keeps_identity() {
        let d = dispatcher(StubClient::failing());
        let session = Session::start(None);
        let id = session.id().to_string();
        let (session, _) = session.exchange(&d, "hello").await;
        assert_eq!(session.messages().len(), 2);

        let session = session.reset();
        assert!(session.messages().is_empty());
        assert_eq!(session.id(), id);
    }

    #[tokio::test]
    async fn sessions_do_not_share_history() {
        let d = dispatcher(StubClient::failing());
        let (first, _) = Session::start(None).exchange(&d, "hello").await;
        let second = Session::start(None);
        assert_eq!(first.messages().len(), 2);
        assert!(second.messages().is_empty());
        assert_ne!(first.id(), second.id());
    }
}
