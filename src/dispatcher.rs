use crate::config::{ Intent, Intents, FALLBACK_REPLY };
use crate::llm::chat::ChatClient;
use log::{ debug, error, info };
use rand::Rng;
use std::sync::Arc;

/// Chooses which canned response to use when an intent matches.
pub trait ReplyPicker: Send + Sync {
    /// Returns an index in `0..len`. `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// Uniform choice backed by the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngPicker;

impl ReplyPicker for ThreadRngPicker {
    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Always picks the same position, clamped to the available responses.
#[derive(Debug, Clone, Copy)]
pub struct FixedPicker(pub usize);

impl ReplyPicker for FixedPicker {
    fn pick(&self, len: usize) -> usize {
        self.0.min(len.saturating_sub(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Canned {
        tag: String,
        text: String,
    },
    Generated {
        text: String,
    },
    Fallback {
        text: String,
    },
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Canned { text, .. } | Reply::Generated { text } | Reply::Fallback { text } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Reply::Canned { text, .. } | Reply::Generated { text } | Reply::Fallback { text } => text,
        }
    }

    pub fn route(&self) -> &'static str {
        match self {
            Reply::Canned { .. } => "canned",
            Reply::Generated { .. } => "generated",
            Reply::Fallback { .. } => "fallback",
        }
    }
}

/// Routes a message to a canned intent response or to the language model.
#[derive(Clone)]
pub struct Dispatcher {
    intents: Arc<Intents>,
    chat_client: Arc<dyn ChatClient>,
    picker: Arc<dyn ReplyPicker>,
    system_prompt: Arc<str>,
    fallback: Arc<str>,
}

impl Dispatcher {
    pub fn new(intents: Arc<Intents>, chat_client: Arc<dyn ChatClient>, system_prompt: &str) -> Self {
        Self {
            intents,
            chat_client,
            picker: Arc::new(ThreadRngPicker),
            system_prompt: Arc::from(system_prompt),
            fallback: Arc::from(FALLBACK_REPLY),
        }
    }

    pub fn with_picker(mut self, picker: Arc<dyn ReplyPicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = Arc::from(fallback);
        self
    }

    /// Same store, client and picker; different system prompt.
    pub fn with_persona(&self, system_prompt: &str) -> Self {
        let mut other = self.clone();
        other.system_prompt = Arc::from(system_prompt);
        other
    }

    pub fn intents(&self) -> &Intents {
        &self.intents
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// First intent, in store order, with a pattern contained in `message`
    /// (case-insensitive).
    pub fn match_intent(&self, message: &str) -> Option<&Intent> {
        let normalized = message.to_lowercase();
        self.intents.iter().find(|intent| intent.matches(&normalized))
    }

    pub async fn dispatch(&self, message: &str) -> Reply {
        if let Some(intent) = self.match_intent(message) {
            let index = self.picker.pick(intent.responses.len());
            debug!("Message matched intent '{}' (response {})", intent.tag, index);
            return Reply::Canned {
                tag: intent.tag.clone(),
                text: intent.responses[index].clone(),
            };
        }

        info!("No intent matched; forwarding to {}", self.chat_client.get_model());
        match self.chat_client.complete(&self.system_prompt, message).await {
            Ok(completion) => Reply::Generated { text: completion.response },
            Err(e) => {
                error!("Error generating response: {}", e);
                Reply::Fallback { text: self.fallback.to_string() }
            }
        }
    }

    pub async fn respond(&self, message: &str) -> String {
        self.dispatch(message).await.into_text()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ExternalServiceError;
    use crate::llm::chat::CompletionResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes a canned answer and remembers what it was asked.
    pub struct StubClient {
        pub answer: Option<String>,
        pub calls: Mutex<Vec<(String, String)>>,
    }

    impl StubClient {
        pub fn answering(answer: &str) -> Arc<Self> {
            Arc::new(Self { answer: Some(answer.to_string()), calls: Mutex::new(Vec::new()) })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self { answer: None, calls: Mutex::new(Vec::new()) })
        }

        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatClient for StubClient {
        async fn complete(
            &self,
            system: &str,
            prompt: &str
        ) -> Result<CompletionResponse, ExternalServiceError> {
            self.calls.lock().unwrap().push((system.to_string(), prompt.to_string()));
            match &self.answer {
                Some(answer) => Ok(CompletionResponse { response: answer.clone() }),
                None => Err(ExternalServiceError::EmptyResponse("stub")),
            }
        }

        fn get_model(&self) -> String {
            "stub".to_string()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    pub fn greeting_intents() -> Arc<Intents> {
        Arc::new(
            Intents::from_json(
                r#"{"intents":[
                    {"tag":"greeting","patterns":["hello","hi"],"responses":["Hi there!","Hello!"]},
                    {"tag":"goodbye","patterns":["bye"],"responses":["See you!"]},
                    {"tag":"farewell","patterns":["goodbye"],"responses":["Farewell!"]}
                ]}"#
            ).unwrap()
        )
    }

    #[tokio::test]
    async fn greeting_scenario_returns_one_of_the_responses() {
        let dispatcher = Dispatcher::new(greeting_intents(), StubClient::failing(), "sys");
        for _ in 0..20 {
            let reply = dispatcher.respond("Hello, how are you?").await;
            assert!(reply == "Hi there!" || reply == "Hello!", "unexpected reply {reply}");
        }
    }

    #[tokio::test]
    async fn fixed_picker_makes_selection_deterministic() {
        let dispatcher = Dispatcher::new(greeting_intents(), StubClient::failing(), "sys")
            .with_picker(Arc::new(FixedPicker(1)));
        assert_eq!(dispatcher.respond("HELLO").await, "Hello!");

        let clamped = dispatcher.with_picker(Arc::new(FixedPicker(9)));
        assert_eq!(clamped.respond("bye now").await, "See you!");
    }

    #[tokio::test]
    async fn earlier_intent_wins_when_several_match() {
        // "goodbye" contains both "bye" (goodbye intent) and "goodbye" (farewell intent).
        let dispatcher = Dispatcher::new(greeting_intents(), StubClient::failing(), "sys");
        let reply = dispatcher.dispatch("Goodbye!").await;
        assert_eq!(reply, Reply::Canned { tag: "goodbye".into(), text: "See you!".into() });
    }

    #[tokio::test]
    async fn matching_is_raw_substring() {
        let dispatcher = Dispatcher::new(greeting_intents(), StubClient::failing(), "sys");
        assert_eq!(dispatcher.match_intent("this").map(|i| i.tag.as_str()), Some("greeting"));
    }

    #[tokio::test]
    async fn unmatched_message_goes_to_model_verbatim() {
        let client = StubClient::answering("Entanglement links particle states.");
        let dispatcher = Dispatcher::new(greeting_intents(), client.clone(), "be helpful");

        let reply = dispatcher.dispatch("Quantum Entanglement explained simply").await;
        assert_eq!(reply, Reply::Generated { text: "Entanglement links particle states.".into() });
        assert_eq!(
            client.calls(),
            vec![("be helpful".to_string(), "Quantum Entanglement explained simply".to_string())]
        );
    }

    #[tokio::test]
    async fn canned_reply_never_calls_the_model() {
        let client = StubClient::answering("unused");
        let dispatcher = Dispatcher::new(greeting_intents(), client.clone(), "sys");
        dispatcher.respond("hi").await;
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn model_failure_yields_fallback() {
        let dispatcher = Dispatcher::new(greeting_intents(), StubClient::failing(), "sys");
        let reply = dispatcher.dispatch("quantum entanglement explained simply").await;
        assert_eq!(reply.route(), "fallback");
        assert_eq!(reply.text(), FALLBACK_REPLY);

        let custom = dispatcher.with_fallback("Try again soon.");
        assert_eq!(custom.respond("quantum entanglement explained simply").await, "Try again soon.");
    }

    #[tokio::test]
    async fn empty_message_goes_to_model() {
        let client = StubClient::answering("What would you like to talk about?");
        let dispatcher = Dispatcher::new(greeting_intents(), client.clone(), "sys");
        assert_eq!(dispatcher.respond("").await, "What would you like to talk about?");
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn with_persona_changes_only_the_system_prompt() {
        let client = StubClient::answering("ok");
        let base = Dispatcher::new(greeting_intents(), client.clone(), "first");
        let other = base.with_persona("second");
        other.respond("tell me a story").await;
        assert_eq!(base.system_prompt(), "first");
        assert_eq!(client.calls()[0].0, "second");
        assert_eq!(other.intents(), base.intents());
    }
}
