//! Chat command handlers.
//!
//! Each handler maps one inbound command or callback to replies, calling into the
//! remote-access manager, the classifier and the user registry. Handlers keep no
//! state of their own.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{info, warn};

use crate::{
    access::{is_admin, is_channel_member},
    classifier::ProfileRiskClassifier,
    config::Config,
    domain::{ChatId, MessageRef, Profile, UserId},
    formatting::{render_profile_report, render_remote_status},
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, ChatAction, Command, IncomingUpdate, InlineKeyboard, TextFormat},
    },
    ports::ProcessControl,
    registry::{broadcast, UserRegistry},
    remote::{normalize_username, FetchError, RemoteAccessManager},
    Result,
};

const WELCOME: &str = "Welcome! Use /analyze <username> to analyze an Instagram profile.";
const HELP: &str = "Use /analyze <username> (or /getmeth <username>) to analyze a public Instagram profile. You must be a member of the channel to use this bot.";
const ANALYZE_USAGE: &str = "Wrong method. Please use: /analyze <username> (for example /analyze cristiano).";
const REMOVE_USER_USAGE: &str = "Please provide a numeric user ID: /remove_user <id>";
const NOT_AUTHORIZED: &str = "You are not authorized to use this command.";
const TRY_LATER: &str = "Could not fetch that profile right now. Please try again later.";

const CB_RELOAD: &str = "reload";
const CB_HELP: &str = "help";

/// Instagram's username alphabet: letters, digits, `.` and `_`, at most 30 chars.
fn is_valid_username(username: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._]{1,30}$").expect("valid regex"))
        .is_match(username)
}

pub struct CommandDispatcher {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub remote: Arc<RemoteAccessManager>,
    pub classifier: Arc<ProfileRiskClassifier>,
    pub users: Arc<UserRegistry>,
    pub process: Arc<dyn ProcessControl>,
}

impl CommandDispatcher {
    pub async fn handle(&self, update: IncomingUpdate) -> Result<()> {
        match update {
            IncomingUpdate::Command(cmd) => self.handle_command(cmd).await,
            IncomingUpdate::Callback(q) => self.handle_callback(q).await,
        }
    }

    pub async fn handle_command(&self, cmd: Command) -> Result<()> {
        info!(
            command = %cmd.name,
            user_id = cmd.user_id.0,
            username = cmd.username.as_deref().unwrap_or("unknown"),
            "command received"
        );

        match cmd.name.as_str() {
            "start" => self.start(&cmd).await,
            "help" => {
                if self.gate(&cmd).await {
                    self.say(cmd.chat_id, HELP).await;
                }
                Ok(())
            }
            "analyze" | "getmeth" => self.analyze(&cmd).await,
            "broadcast" | "users" | "remove_user" | "instastatus" | "restart" => {
                if !is_admin(Some(cmd.user_id), self.cfg.admin_id) {
                    self.say(cmd.chat_id, NOT_AUTHORIZED).await;
                    return Ok(());
                }
                self.admin(&cmd).await
            }
            other => {
                self.say(
                    cmd.chat_id,
                    &format!("Unknown command: /{other}. Use /analyze <username>."),
                )
                .await;
                Ok(())
            }
        }
    }

    pub async fn handle_callback(&self, q: CallbackQuery) -> Result<()> {
        match q.data.as_str() {
            CB_RELOAD => {
                if self.is_member(q.user_id).await {
                    self.answer(&q.callback_id, Some("You're authorized!")).await;
                    self.users.add(q.user_id).await;
                    self.say(q.chat_id, WELCOME).await;
                } else {
                    self.answer(&q.callback_id, Some("Still not in the channel. Join first."))
                        .await;
                }
            }
            CB_HELP => {
                self.answer(&q.callback_id, Some(HELP)).await;
                self.say(q.chat_id, HELP).await;
            }
            _ => self.answer(&q.callback_id, None).await,
        }
        Ok(())
    }

    // ============== Member commands ==============

    async fn start(&self, cmd: &Command) -> Result<()> {
        if !self.gate(cmd).await {
            return Ok(());
        }

        if self.users.add(cmd.user_id).await {
            info!(user_id = cmd.user_id.0, "registered new user");
        }

        let mut keyboard = InlineKeyboard::default().callback("Help", CB_HELP);
        if let Some(url) = &self.cfg.updates_url {
            keyboard = keyboard.url("Update Channel", url);
        }
        self.send(cmd.chat_id, WELCOME, TextFormat::Plain, Some(keyboard))
            .await;
        Ok(())
    }

    async fn analyze(&self, cmd: &Command) -> Result<()> {
        if !self.gate(cmd).await {
            return Ok(());
        }

        let username = normalize_username(&cmd.args);
        if !is_valid_username(&username) {
            self.say(cmd.chat_id, ANALYZE_USAGE).await;
            return Ok(());
        }

        let scanning = self
            .send(
                cmd.chat_id,
                &format!("Scanning profile: {username}. Please wait..."),
                TextFormat::Plain,
                None,
            )
            .await;
        let _ = self
            .messenger
            .send_chat_action(cmd.chat_id, ChatAction::Typing)
            .await;

        match self.remote.fetch_profile(&username).await {
            Ok(profile) => self.send_report(cmd.chat_id, &profile).await,
            Err(FetchError::NotFound) => {
                self.replace(
                    cmd.chat_id,
                    scanning,
                    &format!("Profile {username} was not found."),
                )
                .await
            }
            Err(FetchError::InvalidUsername) => {
                self.replace(cmd.chat_id, scanning, ANALYZE_USAGE).await
            }
            Err(FetchError::Backend(_)) => self.replace(cmd.chat_id, scanning, TRY_LATER).await,
        }
        Ok(())
    }

    async fn send_report(&self, chat_id: ChatId, profile: &Profile) {
        let report = self.classifier.classify(&[
            profile.username.as_str(),
            profile.full_name.as_str(),
            profile.biography.as_str(),
        ]);
        let text = render_profile_report(profile, &report);

        let mut keyboard = InlineKeyboard::default().url("View Profile", &profile.profile_url);
        if let Some(url) = &self.cfg.developer_url {
            keyboard = keyboard.url("Developer", url);
        }
        self.send(chat_id, &text, TextFormat::MarkdownV2, Some(keyboard))
            .await;
    }

    // ============== Admin commands ==============

    async fn admin(&self, cmd: &Command) -> Result<()> {
        match cmd.name.as_str() {
            "broadcast" => {
                let text = cmd.args.trim();
                if text.is_empty() {
                    self.say(cmd.chat_id, "Please provide a message: /broadcast <text>")
                        .await;
                    return Ok(());
                }
                let tally = broadcast(&self.users, self.messenger.as_ref(), text).await;
                self.say(
                    cmd.chat_id,
                    &format!(
                        "Broadcast finished: {} delivered, {} failed.",
                        tally.success, tally.failed
                    ),
                )
                .await;
            }
            "users" => {
                let users = self.users.snapshot().await;
                if users.is_empty() {
                    self.say(cmd.chat_id, "No users found.").await;
                } else {
                    let mut lines = vec![format!("Registered users ({}):", users.len())];
                    lines.extend(users.iter().map(|u| format!("User ID: {}", u.0)));
                    let limit = self.messenger.capabilities().max_message_len;
                    for chunk in split_lines(&lines, limit) {
                        self.say(cmd.chat_id, &chunk).await;
                    }
                }
            }
            "remove_user" => match cmd.args.trim().parse::<i64>() {
                Ok(id) => {
                    let reply = if self.users.remove(UserId(id)).await {
                        format!("Removed user ID {id}")
                    } else {
                        format!("User ID {id} is not registered.")
                    };
                    self.say(cmd.chat_id, &reply).await;
                }
                Err(_) => self.say(cmd.chat_id, REMOVE_USER_USAGE).await,
            },
            "instastatus" => {
                let status = self.remote.status().await;
                self.say(cmd.chat_id, &render_remote_status(&status)).await;
            }
            "restart" => {
                self.say(cmd.chat_id, "Restarting bot...").await;
                info!(user_id = cmd.user_id.0, "restart requested");
                if let Err(e) = self.process.restart() {
                    warn!(error = %e, "restart failed");
                    self.say(cmd.chat_id, &format!("Restart failed: {e}")).await;
                }
            }
            _ => {}
        }
        Ok(())
    }

    // ============== Helpers ==============

    /// Channel-membership gate. Sends the join prompt and returns `false` for non-members.
    async fn gate(&self, cmd: &Command) -> bool {
        if self.is_member(cmd.user_id).await {
            return true;
        }

        let channel = &self.cfg.force_join_channel;
        let keyboard = InlineKeyboard::default()
            .url("Join Channel", &self.cfg.channel_url())
            .callback("Joined", CB_RELOAD);
        self.send(
            cmd.chat_id,
            &format!("Please join @{channel} to use this bot."),
            TextFormat::Plain,
            Some(keyboard),
        )
        .await;
        false
    }

    async fn is_member(&self, user: UserId) -> bool {
        is_channel_member(
            self.messenger.as_ref(),
            &self.cfg.force_join_channel,
            user,
        )
        .await
    }

    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
        keyboard: Option<InlineKeyboard>,
    ) -> Option<MessageRef> {
        match self
            .messenger
            .send_text(chat_id, text, format, keyboard)
            .await
        {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "send failed");
                None
            }
        }
    }

    async fn say(&self, chat_id: ChatId, text: &str) {
        self.send(chat_id, text, TextFormat::Plain, None).await;
    }

    /// Edit the progress message in place, or send a fresh one if that fails.
    async fn replace(&self, chat_id: ChatId, progress: Option<MessageRef>, text: &str) {
        if let Some(msg) = progress {
            if self
                .messenger
                .edit_text(msg, text, TextFormat::Plain)
                .await
                .is_ok()
            {
                return;
            }
        }
        self.say(chat_id, text).await;
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.messenger.answer_callback_query(callback_id, text).await {
            warn!(error = %e, "answer_callback_query failed");
        }
    }
}

/// Join lines into messages no longer than `limit` bytes.
fn split_lines(lines: &[String], limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    for line in lines {
        if !cur.is_empty() && cur.len() + 1 + line.len() > limit {
            out.push(std::mem::take(&mut cur));
        }
        if !cur.is_empty() {
            cur.push('\n');
        }
        cur.push_str(line);
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        messaging::types::MemberStatus,
        ports::BackendError,
        test_support::{sample_profile, test_config, FakeBackend, FakeMessenger, FakeProcess},
    };

    const ADMIN: UserId = UserId(42);
    const MEMBER: UserId = UserId(7);
    const STRANGER: UserId = UserId(9);

    struct Harness {
        dispatcher: CommandDispatcher,
        messenger: Arc<FakeMessenger>,
        backend: Arc<FakeBackend>,
        process: Arc<FakeProcess>,
    }

    fn harness() -> Harness {
        let cfg = Arc::new(test_config());
        let messenger = Arc::new(FakeMessenger::default());
        messenger.set_member_status(MEMBER, MemberStatus::Member);
        messenger.set_member_status(ADMIN, MemberStatus::Creator);
        messenger.set_member_status(STRANGER, MemberStatus::Left);
        let backend = Arc::new(FakeBackend::default());
        let process = Arc::new(FakeProcess::default());

        let dispatcher = CommandDispatcher {
            remote: Arc::new(RemoteAccessManager::new(
                backend.clone(),
                cfg.instagram_min_interval,
                cfg.instagram_request_timeout,
            )),
            cfg,
            messenger: messenger.clone(),
            classifier: Arc::new(ProfileRiskClassifier::with_seed(11)),
            users: Arc::new(UserRegistry::new()),
            process: process.clone(),
        };

        Harness {
            dispatcher,
            messenger,
            backend,
            process,
        }
    }

    fn cmd(user: UserId, text: &str) -> Command {
        Command::parse(ChatId(user.0), user, Some("tester".into()), text).unwrap()
    }

    fn callback(user: UserId, data: &str) -> CallbackQuery {
        CallbackQuery {
            chat_id: ChatId(user.0),
            user_id: user,
            username: None,
            callback_id: "cb-1".to_string(),
            data: data.to_string(),
            message: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn analyze_renders_report_with_spam_and_profile_link() {
        let h = harness();
        h.backend
            .add_profile(sample_profile("cristiano", "buy followers now"));

        h.dispatcher
            .handle_command(cmd(MEMBER, "/analyze cristiano"))
            .await
            .unwrap();

        let sent = h.messenger.sent();
        let report = sent
            .iter()
            .find(|s| s.format == TextFormat::MarkdownV2)
            .expect("a MarkdownV2 report");
        assert_eq!(report.chat_id, ChatId(MEMBER.0));
        assert!(report.text.contains("Username: cristiano"));
        assert!(report
            .text
            .contains("[View Profile](https://instagram.com/cristiano)"));
        assert!(
            (1..=5).any(|n| report.text.contains(&format!("• {n}x \\- SPAM"))),
            "SPAM line missing: {}",
            report.text
        );

        let keyboard = report.keyboard.as_ref().unwrap();
        assert_eq!(
            keyboard.url_for("View Profile"),
            Some("https://instagram.com/cristiano")
        );
        assert_eq!(keyboard.url_for("Developer"), Some("https://t.me/focro"));
        assert_eq!(h.messenger.chat_actions(), vec![ChatId(MEMBER.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn getmeth_alias_and_at_prefix() {
        let h = harness();
        h.backend.add_profile(sample_profile("john_doe", ""));

        h.dispatcher
            .handle_command(cmd(MEMBER, "/getmeth @john_doe"))
            .await
            .unwrap();

        assert_eq!(h.backend.requested(), vec!["john_doe".to_string()]);
        let report = h
            .messenger
            .sent()
            .into_iter()
            .find(|s| s.format == TextFormat::MarkdownV2)
            .unwrap();
        assert!(report.text.contains("Username: john\\_doe"));
    }

    #[tokio::test(start_paused = true)]
    async fn bad_arguments_are_usage_errors_without_backend_calls() {
        let h = harness();
        for text in [
            "/analyze",
            "/analyze @",
            "/analyze   ",
            "/analyze two words",
            "/analyze bad$name",
        ] {
            h.dispatcher.handle_command(cmd(MEMBER, text)).await.unwrap();
        }

        assert_eq!(h.backend.load_calls(), 0);
        let texts = h.messenger.texts_to(ChatId(MEMBER.0));
        assert_eq!(texts.len(), 5);
        assert!(texts.iter().all(|t| t == ANALYZE_USAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn non_member_gets_join_prompt_and_no_fetch() {
        let h = harness();
        h.backend.add_profile(sample_profile("cristiano", ""));

        h.dispatcher
            .handle_command(cmd(STRANGER, "/analyze cristiano"))
            .await
            .unwrap();

        assert_eq!(h.backend.load_calls(), 0);
        let sent = h.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "Please join @team_loops to use this bot.");
        let kb = sent[0].keyboard.as_ref().unwrap();
        assert_eq!(kb.url_for("Join Channel"), Some("https://t.me/team_loops"));
    }

    #[tokio::test(start_paused = true)]
    async fn membership_lookup_error_fails_closed() {
        let h = harness();
        let unknown = UserId(1234);

        h.dispatcher
            .handle_command(cmd(unknown, "/start"))
            .await
            .unwrap();

        assert!(h.dispatcher.users.is_empty().await);
        assert!(h.messenger.texts_to(ChatId(unknown.0))[0].starts_with("Please join"));
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_edits_progress_message() {
        let h = harness();

        h.dispatcher
            .handle_command(cmd(MEMBER, "/analyze ghost"))
            .await
            .unwrap();

        let sent = h.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.starts_with("Scanning profile: ghost"));
        let edits = h.messenger.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0, sent[0].message);
        assert_eq!(edits[0].1, "Profile ghost was not found.");
    }

    #[tokio::test(start_paused = true)]
    async fn backend_error_shows_try_later_and_surfaces_in_instastatus() {
        let h = harness();
        h.backend
            .fail_loads(BackendError::Request("HTTP 401 login_required".into()));

        h.dispatcher
            .handle_command(cmd(MEMBER, "/analyze cristiano"))
            .await
            .unwrap();
        assert_eq!(h.messenger.edits()[0].1, TRY_LATER);

        h.dispatcher
            .handle_command(cmd(ADMIN, "/instastatus"))
            .await
            .unwrap();
        let status = h.messenger.texts_to(ChatId(ADMIN.0)).pop().unwrap();
        assert!(status.contains("Auth state: anonymous"));
        assert!(status.contains("login_required"));
    }

    #[tokio::test(start_paused = true)]
    async fn start_registers_members_only() {
        let h = harness();

        h.dispatcher.handle_command(cmd(MEMBER, "/start")).await.unwrap();
        h.dispatcher.handle_command(cmd(MEMBER, "/start")).await.unwrap();
        h.dispatcher
            .handle_command(cmd(STRANGER, "/start"))
            .await
            .unwrap();

        assert_eq!(h.dispatcher.users.snapshot().await, vec![MEMBER]);
        let welcome = &h.messenger.sent()[0];
        assert_eq!(welcome.text, WELCOME);
        assert_eq!(
            welcome.keyboard.as_ref().unwrap().url_for("Update Channel"),
            Some("https://t.me/team_loops")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn admin_commands_reject_other_users() {
        let h = harness();
        for text in [
            "/users",
            "/broadcast hi",
            "/instastatus",
            "/restart",
            "/remove_user 7",
        ] {
            h.dispatcher.handle_command(cmd(MEMBER, text)).await.unwrap();
        }

        assert_eq!(h.process.restarts(), 0);
        let texts = h.messenger.texts_to(ChatId(MEMBER.0));
        assert_eq!(texts.len(), 5);
        assert!(texts.iter().all(|t| t == NOT_AUTHORIZED));
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_reports_tally_to_admin() {
        let h = harness();
        for id in [1, 2, 3] {
            h.dispatcher.users.add(UserId(id)).await;
        }
        h.messenger.fail_sends_to(ChatId(2));

        h.dispatcher
            .handle_command(cmd(ADMIN, "/broadcast maintenance tonight"))
            .await
            .unwrap();

        assert_eq!(h.messenger.texts_to(ChatId(1)), vec!["maintenance tonight"]);
        assert_eq!(h.messenger.texts_to(ChatId(3)), vec!["maintenance tonight"]);
        assert_eq!(
            h.messenger.texts_to(ChatId(ADMIN.0)),
            vec!["Broadcast finished: 2 delivered, 1 failed."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn users_and_remove_user() {
        let h = harness();
        h.dispatcher.handle_command(cmd(ADMIN, "/users")).await.unwrap();
        h.dispatcher.users.add(UserId(5)).await;
        h.dispatcher.users.add(UserId(6)).await;
        h.dispatcher.handle_command(cmd(ADMIN, "/users")).await.unwrap();
        h.dispatcher
            .handle_command(cmd(ADMIN, "/remove_user abc"))
            .await
            .unwrap();
        h.dispatcher
            .handle_command(cmd(ADMIN, "/remove_user 5"))
            .await
            .unwrap();

        let texts = h.messenger.texts_to(ChatId(ADMIN.0));
        assert_eq!(texts[0], "No users found.");
        assert_eq!(texts[1], "Registered users (2):\nUser ID: 5\nUser ID: 6");
        assert_eq!(texts[2], REMOVE_USER_USAGE);
        assert_eq!(texts[3], "Removed user ID 5");
        assert_eq!(h.dispatcher.users.snapshot().await, vec![UserId(6)]);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_goes_through_process_control() {
        let h = harness();
        h.dispatcher
            .handle_command(cmd(ADMIN, "/restart"))
            .await
            .unwrap();

        assert_eq!(h.process.restarts(), 1);
        assert_eq!(
            h.messenger.texts_to(ChatId(ADMIN.0)),
            vec!["Restarting bot..."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reload_callback_rechecks_membership() {
        let h = harness();

        h.dispatcher
            .handle_callback(callback(STRANGER, "reload"))
            .await
            .unwrap();
        h.dispatcher
            .handle_callback(callback(MEMBER, "reload"))
            .await
            .unwrap();

        let answers = h.messenger.answers();
        assert_eq!(
            answers[0].1.as_deref(),
            Some("Still not in the channel. Join first.")
        );
        assert_eq!(answers[1].1.as_deref(), Some("You're authorized!"));
        assert_eq!(h.messenger.texts_to(ChatId(MEMBER.0)), vec![WELCOME]);
        assert!(h.messenger.texts_to(ChatId(STRANGER.0)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn two_users_analyzing_at_once_are_serialized() {
        let h = Arc::new(harness());
        h.backend.set_load_delay(Duration::from_millis(500));
        h.backend.add_profile(sample_profile("alpha", ""));
        h.backend.add_profile(sample_profile("beta", ""));
        h.messenger.set_member_status(UserId(8), MemberStatus::Member);

        let a = {
            let h = h.clone();
            tokio::spawn(async move {
                h.dispatcher
                    .handle_command(cmd(MEMBER, "/analyze alpha"))
                    .await
            })
        };
        let b = {
            let h = h.clone();
            tokio::spawn(async move {
                h.dispatcher
                    .handle_command(cmd(UserId(8), "/analyze beta"))
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let mut spans = h.backend.load_spans();
        spans.sort();
        assert_eq!(spans.len(), 2);
        assert!(spans[1].0 >= spans[0].1);
        assert!(spans[1].0 - spans[0].0 >= Duration::from_secs(5));
    }

    #[test]
    fn username_alphabet() {
        assert!(is_valid_username("cristiano"));
        assert!(is_valid_username("john.doe_99"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("two words"));
        assert!(!is_valid_username(&"a".repeat(31)));
    }

    #[test]
    fn split_lines_respects_limit() {
        let lines: Vec<String> = (0..10).map(|i| format!("User ID: {i}")).collect();
        let chunks = split_lines(&lines, 30);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 30));
        assert_eq!(chunks.join("\n"), lines.join("\n"));
    }
}
