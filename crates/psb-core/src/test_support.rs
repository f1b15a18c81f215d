//! Fakes for the ports, shared by the unit tests in this crate.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{
    config::Config,
    domain::{ChatId, Credentials, MessageId, MessageRef, Profile, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineKeyboard, MemberStatus, MessagingCapabilities, TextFormat},
    },
    ports::{BackendError, ProcessControl, ProfileBackend},
    Result,
};

pub(crate) fn sample_profile(username: &str, biography: &str) -> Profile {
    Profile {
        username: username.to_string(),
        full_name: String::new(),
        biography: biography.to_string(),
        follower_count: 1200,
        following_count: 80,
        is_private: false,
        post_count: 35,
        profile_url: Profile::url_for(username),
        external_url: None,
    }
}

pub(crate) fn test_config() -> Config {
    Config {
        telegram_bot_token: "123:abc".to_string(),
        force_join_channel: "team_loops".to_string(),
        admin_id: UserId(42),
        instagram_credentials: None,
        instagram_min_interval: Duration::from_secs(5),
        instagram_request_timeout: Duration::from_secs(60),
        health_port: 8080,
        polling_restart_delay: Duration::from_secs(5),
        updates_url: Some("https://t.me/team_loops".to_string()),
        developer_url: Some("https://t.me/focro".to_string()),
    }
}

// ============== Backend ==============

#[derive(Default)]
pub(crate) struct FakeBackend {
    profiles: Mutex<HashMap<String, Profile>>,
    login_results: Mutex<VecDeque<std::result::Result<(), BackendError>>>,
    login_failure: Mutex<Option<BackendError>>,
    load_failure: Mutex<Option<BackendError>>,
    login_delay: Mutex<Duration>,
    load_delay: Mutex<Duration>,
    login_calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
    spans: Mutex<Vec<(Instant, Instant)>>,
}

impl FakeBackend {
    pub(crate) fn add_profile(&self, profile: Profile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.username.clone(), profile);
    }

    /// Queue one login outcome; once the queue is empty logins succeed.
    pub(crate) fn push_login_result(&self, result: std::result::Result<(), BackendError>) {
        self.login_results.lock().unwrap().push_back(result);
    }

    pub(crate) fn fail_all_logins(&self, err: BackendError) {
        *self.login_failure.lock().unwrap() = Some(err);
    }

    pub(crate) fn fail_loads(&self, err: BackendError) {
        *self.load_failure.lock().unwrap() = Some(err);
    }

    pub(crate) fn set_login_delay(&self, d: Duration) {
        *self.login_delay.lock().unwrap() = d;
    }

    pub(crate) fn set_load_delay(&self, d: Duration) {
        *self.load_delay.lock().unwrap() = d;
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn load_calls(&self) -> usize {
        self.requested.lock().unwrap().len()
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    /// (entered, exited) for every completed `load_profile` call.
    pub(crate) fn load_spans(&self) -> Vec<(Instant, Instant)> {
        self.spans.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileBackend for FakeBackend {
    async fn login(&self, _credentials: &Credentials) -> std::result::Result<(), BackendError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.login_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.login_failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.login_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn load_profile(&self, username: &str) -> std::result::Result<Profile, BackendError> {
        let entered = Instant::now();
        self.requested.lock().unwrap().push(username.to_string());
        let delay = *self.load_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = match self.load_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => self
                .profiles
                .lock()
                .unwrap()
                .get(username)
                .cloned()
                .ok_or(BackendError::NotFound),
        };
        self.spans.lock().unwrap().push((entered, Instant::now()));
        result
    }
}

// ============== Messenger ==============

#[derive(Clone, Debug)]
pub(crate) struct SentMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub format: TextFormat,
    pub keyboard: Option<InlineKeyboard>,
    pub message: MessageRef,
}

#[derive(Default)]
pub(crate) struct FakeMessenger {
    next_id: Mutex<i32>,
    sends: Mutex<Vec<SentMessage>>,
    edits: Mutex<Vec<(MessageRef, String)>>,
    answers: Mutex<Vec<(String, Option<String>)>>,
    members: Mutex<HashMap<UserId, MemberStatus>>,
    failing_chats: Mutex<HashSet<i64>>,
    actions: Mutex<Vec<ChatId>>,
}

impl FakeMessenger {
    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(*guard),
        }
    }

    pub(crate) fn set_member_status(&self, user: UserId, status: MemberStatus) {
        self.members.lock().unwrap().insert(user, status);
    }

    pub(crate) fn fail_sends_to(&self, chat_id: ChatId) {
        self.failing_chats.lock().unwrap().insert(chat_id.0);
    }

    pub(crate) fn sent(&self) -> Vec<SentMessage> {
        self.sends.lock().unwrap().clone()
    }

    pub(crate) fn texts_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|s| s.chat_id == chat_id)
            .map(|s| s.text)
            .collect()
    }

    pub(crate) fn edits(&self) -> Vec<(MessageRef, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub(crate) fn answers(&self) -> Vec<(String, Option<String>)> {
        self.answers.lock().unwrap().clone()
    }

    pub(crate) fn chat_actions(&self) -> Vec<ChatId> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_markdown_v2: true,
            supports_edit: true,
            supports_chat_actions: true,
            supports_inline_keyboards: true,
            max_message_len: 4096,
        }
    }

    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        if self.failing_chats.lock().unwrap().contains(&chat_id.0) {
            return Err(Error::External("telegram error: Forbidden: bot was blocked by the user".into()));
        }
        let message = self.alloc(chat_id);
        self.sends.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            format,
            keyboard,
            message,
        });
        Ok(message)
    }

    async fn edit_text(&self, msg: MessageRef, text: &str, _format: TextFormat) -> Result<()> {
        self.edits.lock().unwrap().push((msg, text.to_string()));
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: ChatId, _action: ChatAction) -> Result<()> {
        self.actions.lock().unwrap().push(chat_id);
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }

    async fn member_status(&self, _channel: &str, user_id: UserId) -> Result<MemberStatus> {
        self.members
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .ok_or_else(|| Error::External("telegram error: Bad Request: user not found".into()))
    }
}

// ============== Process ==============

#[derive(Default)]
pub(crate) struct FakeProcess {
    restarts: AtomicUsize,
}

impl FakeProcess {
    pub(crate) fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl ProcessControl for FakeProcess {
    fn restart(&self) -> Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
