//! Bot behavior: modes, model switching, DM forwarding and the group keyword watch.
//!
//! This layer only talks to ports, so the Telegram adapter stays a thin
//! translation of updates into [`IncomingMessage`]s.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    commands::{is_command, BotCommand},
    config::Config,
    domain::{ChatId, ChatKind, UserId},
    formatting::{
        escape_html, format_duration, render_reply, sender_header, split_chunks, utf16_len,
    },
    messaging::{
        port::MessagingPort,
        types::{ChatAction, IncomingMessage},
    },
    model::{
        client::CompletionClient,
        prompts::{summary_prompt, SYSTEM_PROMPT},
        types::{CompletionRequest, ModelChoice},
    },
    security::{is_owner, RateLimiter},
    watch::{KeywordWatch, RecentMessages},
    Result,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Private messages are forwarded to the owner.
    #[default]
    ForwardOnly,
    /// Private messages are answered by the completion model.
    Chat,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::ForwardOnly => "只转发模式",
            Mode::Chat => "聊天模式",
        }
    }
}

/// Process-wide settings changed by commands. Not persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BotState {
    pub mode: Mode,
    pub model: ModelChoice,
}

pub struct BotService {
    cfg: Arc<Config>,
    state: RwLock<BotState>,
    watch: KeywordWatch,
    recent: Mutex<RecentMessages>,
    messenger: Arc<dyn MessagingPort>,
    completion: Option<Arc<dyn CompletionClient>>,
    rate_limiter: Mutex<RateLimiter>,
    bot_username: Option<String>,
    started_at: DateTime<Utc>,
}

impl BotService {
    pub fn new(
        cfg: Arc<Config>,
        messenger: Arc<dyn MessagingPort>,
        completion: Option<Arc<dyn CompletionClient>>,
    ) -> Self {
        Self {
            state: RwLock::new(BotState {
                mode: Mode::default(),
                model: cfg.openai_model,
            }),
            watch: KeywordWatch::new(cfg.keywords.clone()),
            recent: Mutex::new(RecentMessages::new(cfg.history_limit)),
            rate_limiter: Mutex::new(RateLimiter::new(
                cfg.rate_limit_enabled,
                cfg.rate_limit_requests,
                cfg.rate_limit_window,
            )),
            messenger,
            completion,
            bot_username: None,
            started_at: Utc::now(),
            cfg,
        }
    }

    /// Our own `@username`, used to ignore commands addressed to other bots.
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    pub async fn state(&self) -> BotState {
        *self.state.read().await
    }

    pub async fn handle_message(&self, msg: IncomingMessage) -> Result<()> {
        if msg.chat_kind == ChatKind::Channel {
            return Ok(());
        }

        if is_command(&msg.text) {
            return match BotCommand::parse(&msg.text, self.bot_username.as_deref()) {
                Some(cmd) => self.handle_command(&msg, cmd).await,
                None => Ok(()),
            };
        }

        match msg.chat_kind {
            ChatKind::Private => self.handle_private(&msg).await,
            ChatKind::Group | ChatKind::Supergroup => self.handle_group(&msg).await,
            ChatKind::Channel => Ok(()),
        }
    }

    // ============== Commands ==============

    async fn handle_command(&self, msg: &IncomingMessage, cmd: BotCommand) -> Result<()> {
        let owner = is_owner(msg.user_id, self.cfg.owner_id);
        let restricted = self.cfg.admin_only_commands && !owner;
        debug!(user_id = msg.user_id.0, ?cmd, owner, "command");

        if restricted && cmd.is_admin() {
            return self
                .answer(msg, "⛔ Only the bot owner can change the mode or model.")
                .await;
        }

        let html = match cmd {
            BotCommand::Start if restricted => self.status_html().await,
            BotCommand::Start => {
                let model = self.set_mode(Mode::ForwardOnly).await;
                [
                    "🔔 已切换到 <b>只转发模式</b>".to_string(),
                    "📌 私聊消息将转发给管理员，不调用 GPT".to_string(),
                    format!("📦 当前模型：{model}"),
                ]
                .join("\n")
            }
            BotCommand::Chat => {
                let model = self.set_mode(Mode::Chat).await;
                let mut lines = vec![
                    "💬 已切换到 <b>聊天模式</b>".to_string(),
                    "📌 私聊将调用 GPT 回复（群聊仍会关键词监听并转发）".to_string(),
                    format!("📦 当前模型：{model}"),
                ];
                if self.completion.is_none() {
                    lines.push("⚠️ 未配置 OPENAI_API_KEY，GPT 回复不可用".to_string());
                }
                lines.join("\n")
            }
            BotCommand::Model(None) => {
                format!("ℹ️ Current model: {}", self.state().await.model)
            }
            BotCommand::Model(Some(name)) => match name.parse::<ModelChoice>() {
                Ok(model) => {
                    self.state.write().await.model = model;
                    info!(user_id = msg.user_id.0, %model, "model switched");
                    format!("✅ Model switched to: {model}")
                }
                Err(_) => format!(
                    "❌ Invalid model. Allowed: {}",
                    ModelChoice::allowed_list()
                ),
            },
            BotCommand::Status => self.status_html().await,
            BotCommand::Ping => "✅ I'm alive".to_string(),
            BotCommand::Help => help_html(),
        };

        self.answer(msg, &html).await
    }

    /// Switch mode and return the current model for the banner.
    async fn set_mode(&self, mode: Mode) -> ModelChoice {
        let mut st = self.state.write().await;
        if st.mode != mode {
            info!(mode = mode.label(), "mode switched");
        }
        st.mode = mode;
        st.model
    }

    async fn status_html(&self) -> String {
        let st = self.state().await;
        let uptime = (Utc::now() - self.started_at).num_seconds();
        let mut lines = vec![
            format!("📊 当前模式：{}", st.mode.label()),
            format!("📦 当前模型：{}", st.model),
            format!("👀 关键词：{}", self.watch.keywords().len()),
            format!("⏱️ 运行时间：{}", format_duration(uptime)),
        ];
        if self.completion.is_none() {
            lines.push("⚠️ GPT 未配置".to_string());
        }
        lines.join("\n")
    }

    // ============== Private chats ==============

    async fn handle_private(&self, msg: &IncomingMessage) -> Result<()> {
        match self.state().await.mode {
            Mode::Chat => self.chat_reply(msg).await,
            Mode::ForwardOnly => self.forward_to_owner(msg).await,
        }
    }

    async fn chat_reply(&self, msg: &IncomingMessage) -> Result<()> {
        if let Some(wait) = self.rate_limited(msg.user_id).await {
            return self
                .answer(msg, &format!("⏳ Too many requests. Try again in {wait}s."))
                .await;
        }

        if let Err(e) = self
            .messenger
            .send_chat_action(msg.chat_id, ChatAction::Typing)
            .await
        {
            debug!(error = %e, "typing indicator failed");
        }

        let reply = self.ask_model(&msg.text).await;
        for chunk in split_chunks(&reply, self.cfg.telegram_safe_limit) {
            self.answer(msg, &render_reply(&chunk)).await?;
        }
        Ok(())
    }

    async fn forward_to_owner(&self, msg: &IncomingMessage) -> Result<()> {
        if is_owner(msg.user_id, self.cfg.owner_id) {
            return self
                .answer(
                    msg,
                    "ℹ️ 当前为只转发模式，管理员自己的消息不会被转发。发送 /chat 切换到聊天模式。",
                )
                .await;
        }

        let header = sender_header("📬 <b>Private DM</b>", msg.username.as_deref(), msg.user_id);
        let head = format!("{header}\n\n💬 Message:\n");

        if let Err(e) = self.send_to_owner(&head, &msg.text, escape_html).await {
            warn!(user_id = msg.user_id.0, error = %e, "forward to owner failed");
            self.answer(msg, "❌ 转发失败，请稍后再试。").await?;
            return Err(e);
        }

        info!(user_id = msg.user_id.0, "forwarded private message to owner");
        self.answer(msg, "✅ 已转发你的消息给管理员。").await
    }

    // ============== Groups ==============

    async fn handle_group(&self, msg: &IncomingMessage) -> Result<()> {
        let Some(keyword) = self.watch.first_match(&msg.text) else {
            return Ok(());
        };
        info!(
            user_id = msg.user_id.0,
            chat_id = msg.chat_id.0,
            keyword,
            "keyword triggered"
        );

        let window = self.recent.lock().await.push(msg.user_id, &msg.text);

        let summary = match self.rate_limited(msg.user_id).await {
            Some(wait) => format!("⏳ Summary skipped: rate limited for {wait}s."),
            None => self.ask_model(&summary_prompt(&window)).await,
        };

        let mut header = sender_header("📩 <b>Group Trigger</b>", msg.username.as_deref(), msg.user_id);
        if let Some(title) = &msg.chat_title {
            header.push_str(&format!("\n👥 Group: {}", escape_html(title)));
        }
        let recent = window.join("\n");
        let full = format!(
            "{header}\n\n🗣 Recent Messages:\n{}\n\n🧠 Summary by GPT:\n{}",
            escape_html(&recent),
            render_reply(&summary)
        );
        let notified = if utf16_len(&full) <= self.cfg.telegram_safe_limit {
            self.messenger
                .send_html(self.owner_chat(), &full)
                .await
                .map(|_| ())
        } else {
            let head = format!("{header}\n\n🗣 Recent Messages:\n");
            match self.send_to_owner(&head, &recent, escape_html).await {
                Ok(()) => {
                    self.send_to_owner("🧠 Summary by GPT:\n", &summary, render_reply)
                        .await
                }
                Err(e) => Err(e),
            }
        };

        if let Err(e) = notified {
            warn!(chat_id = msg.chat_id.0, error = %e, "group trigger notification failed");
        }

        let mention = match &msg.username {
            Some(name) => format!("@{}", escape_html(name)),
            None => format!(
                "<a href=\"tg://user?id={}\">{}</a>",
                msg.user_id.0,
                escape_html(&msg.display_name)
            ),
        };
        self.messenger
            .reply_html(
                msg.message_ref(),
                &format!("🔔 Hey {mention}, your message triggered a keyword alert!"),
            )
            .await?;
        Ok(())
    }

    // ============== Helpers ==============

    /// Ask the completion model; failures become a user-visible error string.
    async fn ask_model(&self, prompt: &str) -> String {
        let Some(client) = &self.completion else {
            return "❌ Error from GPT: OPENAI_API_KEY is not configured".to_string();
        };
        let model = self.state().await.model;
        let req = CompletionRequest {
            model,
            system_prompt: SYSTEM_PROMPT.to_string(),
            prompt: prompt.to_string(),
        };
        match client.complete(req).await {
            Ok(text) => text,
            Err(e) => {
                warn!(%model, error = %e, "completion failed");
                format!("❌ Error from GPT: {e}")
            }
        }
    }

    /// Seconds to wait if the user is over the completion budget.
    async fn rate_limited(&self, user_id: UserId) -> Option<u64> {
        let (allowed, retry_after) = self.rate_limiter.lock().await.check(user_id);
        if allowed {
            return None;
        }
        let wait = retry_after.map(|d| d.as_secs().max(1)).unwrap_or(1);
        info!(user_id = user_id.0, wait, "rate limited");
        Some(wait)
    }

    fn owner_chat(&self) -> ChatId {
        ChatId::from(self.cfg.owner_id)
    }

    /// Send trusted `head` markup followed by `body` rendered with `render`.
    ///
    /// An oversized body is split before rendering so every piece is valid HTML.
    async fn send_to_owner(
        &self,
        head: &str,
        body: &str,
        render: fn(&str) -> String,
    ) -> Result<()> {
        let limit = self.cfg.telegram_safe_limit;
        let owner_chat = self.owner_chat();
        if utf16_len(head) + utf16_len(body) <= limit {
            self.messenger
                .send_html(owner_chat, &format!("{head}{}", render(body)))
                .await?;
            return Ok(());
        }

        self.messenger.send_html(owner_chat, head.trim_end()).await?;
        for chunk in split_chunks(body, limit) {
            self.messenger.send_html(owner_chat, &render(&chunk)).await?;
        }
        Ok(())
    }

    /// Private chats get a plain message; groups get a reply to the command.
    async fn answer(&self, msg: &IncomingMessage, html: &str) -> Result<()> {
        let sent = if msg.chat_kind == ChatKind::Private {
            self.messenger.send_html(msg.chat_id, html).await
        } else {
            self.messenger.reply_html(msg.message_ref(), html).await
        };
        sent.map(|_| ())
    }
}

fn help_html() -> String {
    let mut lines = vec!["🤖 <b>Commands</b>".to_string()];
    for (name, desc) in BotCommand::MENU {
        lines.push(format!("/{name} - {desc}"));
    }
    lines.push(String::new());
    lines.push("Group messages mentioning a watched keyword are summarized for the owner.".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        domain::{MessageId, MessageRef},
        errors::Error,
        messaging::types::MessagingCapabilities,
    };

    const OWNER: i64 = 1000;
    const GROUP: i64 = -500;

    #[derive(Clone, Debug, PartialEq)]
    struct Sent {
        chat_id: i64,
        reply_to: Option<i32>,
        html: String,
    }

    #[derive(Default)]
    struct FakeMessenger {
        sent: std::sync::Mutex<Vec<Sent>>,
        actions: std::sync::Mutex<Vec<i64>>,
        fail_chat: Option<i64>,
    }

    impl FakeMessenger {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn to(&self, chat_id: i64) -> Vec<Sent> {
            self.sent().into_iter().filter(|s| s.chat_id == chat_id).collect()
        }

        fn record(&self, chat_id: ChatId, reply_to: Option<i32>, html: &str) -> Result<MessageRef> {
            if self.fail_chat == Some(chat_id.0) {
                return Err(Error::External("chat not found".to_string()));
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push(Sent {
                chat_id: chat_id.0,
                reply_to,
                html: html.to_string(),
            });
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(sent.len() as i32),
            })
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_html: true,
                supports_chat_actions: true,
                max_message_len: 4096,
            }
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            self.record(chat_id, None, html)
        }

        async fn reply_html(&self, to: MessageRef, html: &str) -> Result<MessageRef> {
            self.record(to.chat_id, Some(to.message_id.0), html)
        }

        async fn send_chat_action(&self, chat_id: ChatId, _action: ChatAction) -> Result<()> {
            self.actions.lock().unwrap().push(chat_id.0);
            Ok(())
        }
    }

    struct FakeCompletion {
        reply: Result<String>,
        requests: std::sync::Mutex<Vec<CompletionRequest>>,
    }

    impl FakeCompletion {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                requests: Default::default(),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(Error::Unauthorized("invalid api key".to_string())),
                requests: Default::default(),
            })
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for FakeCompletion {
        async fn complete(&self, req: CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(req);
            match &self.reply {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(Error::External(e.to_string())),
            }
        }
    }

    fn config(extra: &[(&str, &str)]) -> Arc<Config> {
        let mut map: HashMap<String, String> = HashMap::new();
        map.insert("BOT_TOKEN".into(), "t".into());
        map.insert("OWNER_ID".into(), OWNER.to_string());
        for (k, v) in extra {
            map.insert(k.to_string(), v.to_string());
        }
        Arc::new(Config::from_lookup(|k| map.get(k).cloned()).unwrap())
    }

    fn service(
        extra: &[(&str, &str)],
        completion: Option<Arc<FakeCompletion>>,
    ) -> (BotService, Arc<FakeMessenger>) {
        let messenger = Arc::new(FakeMessenger::default());
        let completion = completion.map(|c| c as Arc<dyn CompletionClient>);
        let svc = BotService::new(config(extra), messenger.clone(), completion);
        (svc, messenger)
    }

    fn private(user: i64, username: Option<&str>, text: &str) -> IncomingMessage {
        IncomingMessage {
            chat_id: ChatId(user),
            chat_kind: ChatKind::Private,
            chat_title: None,
            message_id: MessageId(1),
            user_id: UserId(user),
            username: username.map(str::to_string),
            display_name: "Someone".to_string(),
            text: text.to_string(),
        }
    }

    fn group(user: i64, username: Option<&str>, text: &str) -> IncomingMessage {
        IncomingMessage {
            chat_id: ChatId(GROUP),
            chat_kind: ChatKind::Supergroup,
            chat_title: Some("Rentals <EU>".to_string()),
            message_id: MessageId(77),
            user_id: UserId(user),
            username: username.map(str::to_string),
            display_name: "Ann".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn forwards_private_messages_to_owner() {
        let (svc, tg) = service(&[], None);
        svc.handle_message(private(5, Some("bob"), "hi <3")).await.unwrap();

        let to_owner = tg.to(OWNER);
        assert_eq!(to_owner.len(), 1);
        let html = &to_owner[0].html;
        assert!(html.starts_with("📬 <b>Private DM</b>\n👤 From: @bob\n🆔 User ID: 5"));
        assert!(html.ends_with("💬 Message:\nhi &lt;3"));

        let to_user = tg.to(5);
        assert_eq!(to_user.len(), 1);
        assert_eq!(to_user[0].html, "✅ 已转发你的消息给管理员。");
        assert_eq!(to_user[0].reply_to, None);
    }

    #[tokio::test]
    async fn forward_without_username_and_owner_is_not_echoed() {
        let (svc, tg) = service(&[], None);
        svc.handle_message(private(6, None, "x")).await.unwrap();
        assert!(tg.to(OWNER)[0].html.contains("(no username)"));

        svc.handle_message(private(OWNER, Some("boss"), "note to self")).await.unwrap();
        let to_owner = tg.to(OWNER);
        assert_eq!(to_owner.len(), 2);
        assert!(to_owner[1].html.contains("/chat"));
    }

    #[tokio::test]
    async fn failed_forward_tells_the_sender() {
        let messenger = Arc::new(FakeMessenger {
            fail_chat: Some(OWNER),
            ..Default::default()
        });
        let svc = BotService::new(config(&[]), messenger.clone(), None);
        let err = svc.handle_message(private(5, None, "hello")).await.unwrap_err();
        assert!(err.to_string().contains("chat not found"));
        assert_eq!(messenger.to(5)[0].html, "❌ 转发失败，请稍后再试。");
    }

    #[tokio::test]
    async fn chat_mode_answers_with_model_reply() {
        let gpt = FakeCompletion::ok("**Sure** `code`");
        let (svc, tg) = service(&[], Some(gpt.clone()));

        svc.handle_message(private(OWNER, None, "/chat")).await.unwrap();
        assert_eq!(svc.state().await.mode, Mode::Chat);

        svc.handle_message(private(5, None, "what is rent?")).await.unwrap();
        let reqs = gpt.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].prompt, "what is rent?");
        assert_eq!(reqs[0].model, ModelChoice::Gpt5Mini);
        assert_eq!(reqs[0].system_prompt, SYSTEM_PROMPT);

        assert_eq!(tg.to(5)[0].html, "<b>Sure</b> <code>code</code>");
        assert_eq!(*tg.actions.lock().unwrap(), vec![5]);
        assert!(tg.to(OWNER).iter().all(|s| !s.html.contains("Private DM")));
    }

    #[tokio::test]
    async fn long_chat_replies_are_split_into_well_formed_pieces() {
        let reply = format!(
            "**Plan** for a < b:\n```\n{}```\n{}",
            "if a < b && c { swap(); }\n".repeat(250),
            "tail line\n".repeat(200)
        );
        assert!(utf16_len(&reply) > 8000);
        let (svc, tg) = service(&[], Some(FakeCompletion::ok(&reply)));
        svc.handle_message(private(OWNER, None, "/chat")).await.unwrap();
        svc.handle_message(private(5, None, "plan?")).await.unwrap();

        let pieces = tg.to(5);
        assert!(pieces.len() >= 3, "got {} pieces", pieces.len());
        assert!(pieces[0].html.starts_with("<b>Plan</b> for a &lt; b:\n<pre>"));
        for p in &pieces {
            assert_eq!(p.reply_to, None);
            assert_eq!(p.html.matches("<pre>").count(), p.html.matches("</pre>").count());
            let stripped = ["<pre>", "</pre>", "<b>", "</b>"]
                .iter()
                .fold(p.html.clone(), |acc, tag| acc.replace(tag, ""));
            assert!(!stripped.contains('<'), "unescaped markup in {stripped:?}");
            assert!(!stripped.contains("```"));
        }
        assert!(pieces.last().unwrap().html.ends_with("tail line"));
    }

    #[tokio::test]
    async fn chat_mode_reports_model_errors_inline() {
        let (svc, tg) = service(&[], Some(FakeCompletion::failing()));
        svc.handle_message(private(OWNER, None, "/chat")).await.unwrap();
        svc.handle_message(private(5, None, "hello")).await.unwrap();
        assert!(tg.to(5)[0].html.starts_with("❌ Error from GPT:"));

        let (svc, tg) = service(&[], None);
        svc.handle_message(private(OWNER, None, "/chat")).await.unwrap();
        assert!(tg.to(OWNER)[0].html.contains("OPENAI_API_KEY"));
        svc.handle_message(private(5, None, "hello")).await.unwrap();
        assert!(tg.to(5)[0].html.contains("not configured"));
    }

    #[tokio::test]
    async fn chat_mode_is_rate_limited_per_user() {
        let (svc, tg) = service(
            &[("RATE_LIMIT_REQUESTS", "1"), ("RATE_LIMIT_WINDOW", "3600")],
            Some(FakeCompletion::ok("ok")),
        );
        svc.handle_message(private(OWNER, None, "/chat")).await.unwrap();
        svc.handle_message(private(5, None, "one")).await.unwrap();
        svc.handle_message(private(5, None, "two")).await.unwrap();
        let replies = tg.to(5);
        assert_eq!(replies[0].html, "ok");
        assert!(replies[1].html.starts_with("⏳ Too many requests"));
    }

    #[tokio::test]
    async fn model_command_switches_and_validates() {
        let gpt = FakeCompletion::ok("fine");
        let (svc, tg) = service(&[], Some(gpt.clone()));

        svc.handle_message(private(OWNER, None, "/model")).await.unwrap();
        svc.handle_message(private(OWNER, None, "/model gpt-5-pro")).await.unwrap();
        svc.handle_message(private(OWNER, None, "/model gpt-4")).await.unwrap();

        let out: Vec<String> = tg.to(OWNER).into_iter().map(|s| s.html).collect();
        assert_eq!(out[0], "ℹ️ Current model: gpt-5-mini");
        assert_eq!(out[1], "✅ Model switched to: gpt-5-pro");
        assert_eq!(out[2], "❌ Invalid model. Allowed: gpt-5-mini, gpt-5, gpt-5-pro");
        assert_eq!(svc.state().await.model, ModelChoice::Gpt5Pro);

        svc.handle_message(private(OWNER, None, "/chat")).await.unwrap();
        svc.handle_message(private(5, None, "hey")).await.unwrap();
        assert_eq!(gpt.requests()[0].model, ModelChoice::Gpt5Pro);
    }

    #[tokio::test]
    async fn non_owner_cannot_change_settings() {
        let (svc, tg) = service(&[], None);
        svc.handle_message(private(5, None, "/chat")).await.unwrap();
        svc.handle_message(private(5, None, "/model gpt-5")).await.unwrap();
        svc.handle_message(private(5, None, "/start")).await.unwrap();

        let st = svc.state().await;
        assert_eq!(st.mode, Mode::ForwardOnly);
        assert_eq!(st.model, ModelChoice::Gpt5Mini);
        let out = tg.to(5);
        assert!(out[0].html.starts_with("⛔"));
        assert!(out[1].html.starts_with("⛔"));
        assert!(out[2].html.contains("只转发模式"));
    }

    #[tokio::test]
    async fn anyone_can_switch_when_admin_restriction_is_off() {
        let (svc, _tg) = service(&[("ADMIN_ONLY_COMMANDS", "false")], None);
        svc.handle_message(private(5, None, "/chat")).await.unwrap();
        assert_eq!(svc.state().await.mode, Mode::Chat);
        svc.handle_message(private(6, None, "/start")).await.unwrap();
        assert_eq!(svc.state().await.mode, Mode::ForwardOnly);
    }

    #[tokio::test]
    async fn status_ping_and_unknown_commands() {
        let (svc, tg) = service(&[], None);
        svc.handle_message(private(OWNER, None, "/status")).await.unwrap();
        svc.handle_message(private(OWNER, None, "/ping")).await.unwrap();
        svc.handle_message(private(OWNER, None, "/weather")).await.unwrap();

        let out = tg.to(OWNER);
        assert_eq!(out.len(), 2);
        assert!(out[0].html.starts_with("📊 当前模式：只转发模式\n📦 当前模型：gpt-5-mini"));
        assert_eq!(out[1].html, "✅ I'm alive");
    }

    #[tokio::test]
    async fn commands_for_other_bots_are_ignored() {
        let messenger = Arc::new(FakeMessenger::default());
        let svc = BotService::new(config(&[]), messenger.clone(), None).with_bot_username("rentbot");
        svc.handle_message(group(5, None, "/ping@otherbot")).await.unwrap();
        svc.handle_message(group(5, None, "/ping@RentBot")).await.unwrap();
        let out = messenger.sent();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reply_to, Some(77));
    }

    #[tokio::test]
    async fn group_keyword_notifies_owner_and_replies() {
        let gpt = FakeCompletion::ok("wants a **Netflix** seat");
        let (svc, tg) = service(&[("HISTORY_LIMIT", "2")], Some(gpt.clone()));

        svc.handle_message(group(5, Some("ann"), "weather is nice")).await.unwrap();
        assert!(tg.sent().is_empty());

        svc.handle_message(group(5, Some("ann"), "netflix slot?")).await.unwrap();
        svc.handle_message(group(5, Some("ann"), "still need a RENT share")).await.unwrap();
        svc.handle_message(group(5, Some("ann"), "合租 anyone")).await.unwrap();

        let prompts = gpt.requests();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[2].prompt.ends_with("still need a RENT share\n合租 anyone"));

        let owner = tg.to(OWNER);
        assert_eq!(owner.len(), 3);
        let last = &owner[2].html;
        assert!(last.starts_with("📩 <b>Group Trigger</b>\n👤 From: @ann\n🆔 User ID: 5\n👥 Group: Rentals &lt;EU&gt;"));
        assert!(last.contains("🗣 Recent Messages:\nstill need a RENT share\n合租 anyone"));
        assert!(last.ends_with("🧠 Summary by GPT:\nwants a <b>Netflix</b> seat"));

        let replies = tg.to(GROUP);
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0].reply_to, Some(77));
        assert_eq!(
            replies[0].html,
            "🔔 Hey @ann, your message triggered a keyword alert!"
        );
    }

    #[tokio::test]
    async fn group_trigger_without_username_mentions_by_id() {
        let (svc, tg) = service(&[], None);
        svc.handle_message(group(8, None, "YouTube premium")).await.unwrap();

        let owner = tg.to(OWNER);
        assert!(owner[0].html.contains("Summary by GPT:\n❌ Error from GPT"));
        let reply = &tg.to(GROUP)[0].html;
        assert!(reply.contains("<a href=\"tg://user?id=8\">Ann</a>"));
    }

    #[tokio::test]
    async fn group_messages_ignore_mode() {
        let gpt = FakeCompletion::ok("s");
        let (svc, tg) = service(&[], Some(gpt.clone()));
        svc.handle_message(private(OWNER, None, "/chat")).await.unwrap();
        svc.handle_message(group(5, None, "hello there")).await.unwrap();
        assert!(gpt.requests().is_empty());
        assert!(tg.to(GROUP).is_empty());
    }

    #[tokio::test]
    async fn channels_are_ignored() {
        let (svc, tg) = service(&[], None);
        let mut msg = group(5, None, "netflix");
        msg.chat_kind = ChatKind::Channel;
        svc.handle_message(msg).await.unwrap();
        assert!(tg.sent().is_empty());
    }

    #[tokio::test]
    async fn long_forwards_are_split() {
        let (svc, tg) = service(&[], None);
        let long = "line of text\n".repeat(600);
        svc.handle_message(private(5, None, &long)).await.unwrap();
        let owner = tg.to(OWNER);
        assert!(owner.len() > 2);
        assert!(owner[0].html.ends_with("💬 Message:"));
        assert!(owner.iter().all(|s| utf16_len(&s.html) <= 4000));
        let rejoined = owner[1..].iter().map(|s| s.html.as_str()).collect::<Vec<_>>().join("\n");
        assert_eq!(rejoined, long.trim_end());
    }

    #[tokio::test]
    async fn long_group_notifications_keep_markup_whole() {
        let summary = format!("```\n{}```", "let x = 1;\n".repeat(500));
        let (svc, tg) = service(&[], Some(FakeCompletion::ok(&summary)));
        let text = format!("netflix {}", "<&> ".repeat(1200));
        svc.handle_message(group(5, Some("ann"), &text)).await.unwrap();

        let owner = tg.to(OWNER);
        assert_eq!(owner.len(), 6);
        assert!(owner[0].html.ends_with("🗣 Recent Messages:"));
        assert!(owner[1].html.starts_with("netflix &lt;&amp;&gt; "));
        for s in &owner {
            assert_eq!(s.html.matches("<pre>").count(), s.html.matches("</pre>").count());
        }
        assert!(owner.iter().any(|s| s.html == "🧠 Summary by GPT:"));
        assert_eq!(tg.to(GROUP).len(), 1);
    }
}
