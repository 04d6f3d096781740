//! ライブチャットのセッション管理
//!
//! 初期化（ページのスクレイピング）、ポーリング、メッセージ送信、
//! モデレーション操作をまとめる。操作はすべて`&mut self`で逐次実行され、
//! 内部でタスクを起動したりリトライしたりはしない。

use chrono::Utc;

use super::bootstrap;
use super::continuation::{ContinuationPhase, ContinuationState, PollStep};
use super::json::{self, JsonMap, JsonValue};
use super::moderation::apply_context_menu;
use super::parser::{self, ParsedActions};
use super::types::{
    ChatItem, ChatItemDelete, ChatMode, IdType, LiveBroadcastDetails, Locale, ModerationAction,
};
use crate::config::ClientConfig;
use crate::util::{generate_client_message_id, mask_api_key};
use crate::youtube::auth::Credentials;
use crate::youtube::errors::{LiveChatError, TransportError};
use crate::youtube::transport::{Headers, HttpTransport, Transport};

const LIVE_CHAT_API: &str = "/youtubei/v1/live_chat/get_live_chat";
const LIVE_CHAT_REPLAY_API: &str = "/youtubei/v1/live_chat/get_live_chat_replay";
const SEND_MESSAGE_API: &str = "/youtubei/v1/live_chat/send_message";
const CONTEXT_MENU_API: &str = "/youtubei/v1/live_chat/get_item_context_menu";

/// 送信メッセージの連番がこの値に達したら0に戻す
const MESSAGE_COUNTER_LIMIT: u32 = i32::MAX as u32 - 1;

/// ライブチャットクライアント
///
/// 1つのセッションは1つのポーラーから使う前提で、並行呼び出しは想定しない。
/// アイテムのコレクションはポーリングのたびに置き換えられるため、
/// 必要なものは呼び出し側で保持すること。
pub struct LiveChatClient<T: Transport = HttpTransport> {
    transport: T,
    config: ClientConfig,
    video_id: Option<String>,
    channel_id: Option<String>,
    continuation: ContinuationState,
    visitor_data: Option<String>,
    locale: Locale,
    client_version: Option<String>,
    api_key: Option<String>,
    datasync_id: Option<String>,
    send_params: Option<String>,
    message_counter: u32,
    client_message_id: String,
    credentials: Option<Credentials>,
    chat_items: Vec<ChatItem>,
    ticker_paid_messages: Vec<ChatItem>,
    chat_item_deletes: Vec<ChatItemDelete>,
    banner_item: Option<ChatItem>,
}

impl LiveChatClient<HttpTransport> {
    /// デフォルト設定のクライアントを作成
    ///
    /// # Errors
    /// HTTPクライアントのビルドに失敗した場合にエラーを返す
    pub fn new() -> Result<Self, LiveChatError> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, LiveChatError> {
        let transport = HttpTransport::new(&config)
            .map_err(|e| LiveChatError::transport("Failed to build HTTP client", e))?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> LiveChatClient<T> {
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            video_id: None,
            channel_id: None,
            continuation: ContinuationState::new(ChatMode::default().is_top_chat_only()),
            visitor_data: None,
            locale: Locale::default(),
            client_version: None,
            api_key: None,
            datasync_id: None,
            send_params: None,
            message_counter: 0,
            client_message_id: generate_client_message_id(),
            credentials: None,
            chat_items: Vec::new(),
            ticker_paid_messages: Vec::new(),
            chat_item_deletes: Vec::new(),
            banner_item: None,
        }
    }

    /// 動画IDまたはチャンネルIDからセッションを初期化する
    ///
    /// リプレイの場合は初期データのチャットが`chat_items()`に入った状態になる。
    pub async fn initialize(
        &mut self,
        id: &str,
        mode: ChatMode,
        id_type: IdType,
    ) -> Result<(), LiveChatError> {
        self.continuation = ContinuationState::new(mode.is_top_chat_only());
        self.clear_broadcast();
        self.bootstrap(id, id_type).await
    }

    /// 再初期化する（エラー発生時のリカバリー用）
    ///
    /// ロケールと認証情報は引き継ぐ。
    pub async fn reset(&mut self) -> Result<(), LiveChatError> {
        let video_id = self
            .video_id
            .clone()
            .ok_or(LiveChatError::MissingContinuation)?;
        self.clear_broadcast();
        self.continuation.reset();
        self.bootstrap(&video_id, IdType::Video).await
    }

    async fn bootstrap(&mut self, id: &str, id_type: IdType) -> Result<(), LiveChatError> {
        self.clear_cycle();

        let headers = self.auth_headers();
        let page = match id_type {
            IdType::Video => {
                let url = format!("{}/watch?v={}", self.config.web_base_url, id);
                let html = self.get(&url, &headers, "Couldn't fetch the watch page").await?;
                let page = bootstrap::scrape_watch_page(&html);
                self.video_id = Some(id.to_string());
                self.channel_id = page.channel_id.clone();
                page
            }
            IdType::Channel => {
                let url = format!("{}/channel/{}/live", self.config.web_base_url, id);
                let html = self.get(&url, &headers, "Couldn't fetch the channel page").await?;
                let page = bootstrap::scrape_watch_page(&html);
                let video_id = page
                    .live_video_id
                    .clone()
                    .ok_or_else(|| LiveChatError::ChannelNotLive(id.to_string()))?;
                self.channel_id = Some(id.to_string());
                self.video_id = Some(video_id);
                page
            }
        };

        let Some(mut token) = ContinuationState::select_initial(
            page.top_chat_continuation.as_deref(),
            page.all_chat_continuation.as_deref(),
            self.continuation.top_chat_only(),
        ) else {
            return Err(LiveChatError::InvalidIdentifier {
                kind: id_type,
                id: id.to_string(),
            });
        };
        if page.api_key.is_some() {
            self.api_key = page.api_key;
        }
        if page.datasync_id.is_some() {
            self.datasync_id = page.datasync_id;
        }

        if page.is_replay {
            let url = format!(
                "{}/live_chat_replay?continuation={}",
                self.config.web_base_url, token
            );
            let html = self.get(&url, &[], "Couldn't fetch the chat replay page").await?;
            let initial_data = bootstrap::parse_initial_data(&html)?;
            if let Some(replay_token) = bootstrap::replay_continuation(&initial_data) {
                token = replay_token;
            }
            self.absorb(parser::parse_chat_response(&initial_data));
        } else {
            let url = format!("{}/live_chat?continuation={}", self.config.web_base_url, token);
            let html = self.get(&url, &headers, "Couldn't fetch the live chat page").await?;
            self.send_params = match bootstrap::parse_initial_data(&html) {
                Ok(initial_data) => bootstrap::send_message_params(&initial_data),
                Err(e) => {
                    log::warn!("Live chat page has no usable initial data: {}", e);
                    None
                }
            };
        }

        log::info!(
            "Live chat initialized (video: {}, replay: {}, api key: {})",
            self.video_id.as_deref().unwrap_or_default(),
            page.is_replay,
            mask_api_key(self.api_key.as_deref().unwrap_or_default())
        );
        self.continuation.bootstrap(token, page.is_replay);
        Ok(())
    }

    /// チャットを取得する
    ///
    /// `offset_ms`はリプレイでの再生位置（ミリ秒）。ライブでは無視される。
    /// 初期化直後の1回目は通信せずに終わる。
    pub async fn update(&mut self, offset_ms: i64) -> Result<(), LiveChatError> {
        let token = match self.continuation.begin_poll()? {
            PollStep::AlreadyFetched => {
                log::debug!("Initial data already fetched, skipping poll");
                return Ok(());
            }
            PollStep::Fetch(token) => token.to_string(),
        };
        self.clear_cycle();

        let api = if self.continuation.is_replay() {
            LIVE_CHAT_REPLAY_API
        } else {
            LIVE_CHAT_API
        };
        let url = self.api_url(&self.config.web_base_url, api);
        let payload = self.polling_payload(&token, offset_ms);
        let body = self
            .post(&url, &payload, &self.auth_headers(), "Can't get youtube live chat")
            .await?;
        let response = json::parse(&body)?;

        if self.visitor_data.is_none() {
            self.visitor_data = bootstrap::visitor_data(&response);
        }
        if let Some(version) = bootstrap::client_version(&response) {
            self.client_version = Some(version);
        }

        self.absorb(parser::parse_chat_response(&response));
        self.continuation.advance(&response);
        log::debug!(
            "Fetched {} chat items, {} deletes",
            self.chat_items.len(),
            self.chat_item_deletes.len()
        );
        Ok(())
    }

    /// メッセージを送信する（要ログイン、ライブのみ）
    pub async fn send_message(&mut self, message: &str) -> Result<(), LiveChatError> {
        if self.continuation.is_replay() {
            return Err(LiveChatError::UnsupportedInReplay("send_message"));
        }
        if self.credentials.is_none() || self.datasync_id.is_none() || self.send_params.is_none() {
            return Err(LiveChatError::CredentialsRequired);
        }
        let url = self.api_url(&self.config.web_base_url, SEND_MESSAGE_API);
        let payload = self.send_message_payload(message);
        self.post(&url, &payload, &self.auth_headers(), "Couldn't send a message")
            .await?;
        Ok(())
    }

    /// チャットを削除する
    pub async fn delete_item(&mut self, item: &mut ChatItem) -> Result<(), LiveChatError> {
        self.moderate(item, ModerationAction::Delete).await
    }

    /// 投稿者を一時的にタイムアウトする
    pub async fn timeout_author(&mut self, item: &mut ChatItem) -> Result<(), LiveChatError> {
        self.moderate(item, ModerationAction::Timeout).await
    }

    /// 投稿者をブロックする
    pub async fn ban_author(&mut self, item: &mut ChatItem) -> Result<(), LiveChatError> {
        self.moderate(item, ModerationAction::Ban).await
    }

    pub async fn unban_author(&mut self, item: &mut ChatItem) -> Result<(), LiveChatError> {
        self.moderate(item, ModerationAction::Unban).await
    }

    /// チャットを上部に固定する
    pub async fn pin_as_banner(&mut self, item: &mut ChatItem) -> Result<(), LiveChatError> {
        self.moderate(item, ModerationAction::Pin).await
    }

    /// 事前条件を確認し、トークンが無ければコンテキストメニューから1回だけ解決してから送信する
    async fn moderate(
        &mut self,
        item: &mut ChatItem,
        action: ModerationAction,
    ) -> Result<(), LiveChatError> {
        if self.continuation.is_replay() {
            return Err(LiveChatError::UnsupportedInReplay(action.as_str()));
        }
        if self.credentials.is_none() || self.datasync_id.is_none() {
            return Err(LiveChatError::CredentialsRequired);
        }
        if item.moderation.get(action).is_none() {
            self.resolve_moderation_tokens(item)
                .await
                .map_err(|e| e.with_summary(action.failure_summary()))?;
        }
        let params = item
            .moderation
            .get(action)
            .map(str::to_string)
            .ok_or(LiveChatError::PermissionDenied(action))?;

        let url = self.api_url(&self.config.studio_base_url, action.api_path());
        let payload = self.moderation_payload(&params);
        self.post(&url, &payload, &self.auth_headers(), action.failure_summary())
            .await?;
        log::info!("Chat item {} moderated: {}", item.id, action);
        Ok(())
    }

    /// アイテムのコンテキストメニューを取得してモデレーション用トークンを設定する
    ///
    /// 設定できたトークンの数を返す。
    pub async fn resolve_moderation_tokens(
        &mut self,
        item: &mut ChatItem,
    ) -> Result<usize, LiveChatError> {
        if self.credentials.is_none() {
            return Err(LiveChatError::CredentialsRequired);
        }
        let Some(context_menu) = item.moderation.context_menu.clone() else {
            log::debug!("Chat item {} has no context menu", item.id);
            return Ok(0);
        };
        let url = format!(
            "{}&params={}",
            self.api_url(&self.config.web_base_url, CONTEXT_MENU_API),
            context_menu
        );
        let payload = self.send_message_payload("");
        let body = self
            .post(&url, &payload, &self.auth_headers(), "Couldn't get the context menu")
            .await?;
        let response = json::parse(&body)?;
        Ok(apply_context_menu(&response, &mut item.moderation))
    }

    /// 配信情報を取得する
    ///
    /// ライブ配信が終了していれば、以降のポーリングは`BroadcastEnded`になる。
    pub async fn fetch_broadcast_status(&mut self) -> Result<LiveBroadcastDetails, LiveChatError> {
        let video_id = self
            .video_id
            .as_deref()
            .ok_or(LiveChatError::MissingContinuation)?;
        let url = format!(
            "{}/watch?v={}&hl=en&pbj=1",
            self.config.web_base_url, video_id
        );
        let headers = vec![
            ("x-youtube-client-name".to_string(), "1".to_string()),
            ("x-youtube-client-version".to_string(), self.client_version()),
        ];
        let body = self.get(&url, &headers, "Couldn't get broadcast info").await?;

        let response: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| LiveChatError::MalformedInput(format!("broadcast info: {}", e)))?;
        let details = bootstrap::find_by_key(&response, "liveBroadcastDetails").ok_or_else(|| {
            LiveChatError::MalformedInput("liveBroadcastDetails not found".to_string())
        })?;
        let details: LiveBroadcastDetails = serde_json::from_value(details.clone())
            .map_err(|e| LiveChatError::MalformedInput(format!("liveBroadcastDetails: {}", e)))?;

        if !self.continuation.is_replay() && details.is_live_now == Some(false) {
            log::info!("Broadcast {} has ended", video_id);
            self.continuation.mark_ended();
        }
        Ok(details)
    }

    /// チャット取得に使う言語（国コードと言語コードは必須）
    pub fn set_locale(&mut self, country: &str, language: &str) -> Result<(), LiveChatError> {
        if country.is_empty() {
            return Err(LiveChatError::InvalidLocale("country is required".to_string()));
        }
        if language.is_empty() {
            return Err(LiveChatError::InvalidLocale("language is required".to_string()));
        }
        self.locale = Locale {
            country: country.to_string(),
            language: language.to_string(),
        };
        Ok(())
    }

    /// ログインユーザーのCookieを設定する
    ///
    /// 初期化済みであれば、ユーザー固有の値を取り直すため再初期化する。
    pub async fn set_credentials(&mut self, credentials: Credentials) -> Result<(), LiveChatError> {
        log::info!("Credentials set ({} cookies)", credentials.len());
        self.credentials = Some(credentials);
        if self.video_id.is_some() {
            self.reset().await?;
        }
        Ok(())
    }

    /// `"a=b; c=d"`形式のCookie文字列から設定する
    pub async fn set_cookie_string(&mut self, cookie: &str) -> Result<(), LiveChatError> {
        self.set_credentials(cookie.parse()?).await
    }

    // ------------------------------------------------------------------
    // ペイロード
    // ------------------------------------------------------------------

    fn polling_payload(&self, token: &str, offset_ms: i64) -> JsonMap {
        let client = JsonValue::object([
            ("visitorData", self.visitor_data.clone().unwrap_or_default().into()),
            ("userAgent", self.config.user_agent.as_str().into()),
            ("clientName", "WEB".into()),
            ("clientVersion", self.client_version().into()),
            ("gl", self.locale.country.as_str().into()),
            ("hl", self.locale.language.as_str().into()),
        ]);
        let mut payload = JsonMap::new();
        payload.insert(
            "context".to_string(),
            JsonValue::object([("client", client)]),
        );
        payload.insert("continuation".to_string(), token.into());
        if self.continuation.is_replay() {
            payload.insert(
                "currentPlayerState".to_string(),
                JsonValue::object([("playerOffsetMs", offset_ms.max(0).to_string().into())]),
            );
        }
        payload
    }

    fn user_context(&self) -> JsonValue {
        JsonValue::object([
            (
                "client",
                JsonValue::object([
                    ("clientName", "WEB".into()),
                    ("clientVersion", self.client_version().into()),
                ]),
            ),
            (
                "user",
                JsonValue::object([("onBehalfOfUser", self.datasync_id.clone().into())]),
            ),
        ])
    }

    fn send_message_payload(&mut self, message: &str) -> JsonMap {
        let client_message_id = self.next_client_message_id();
        let mut payload = JsonMap::new();
        payload.insert("clientMessageId".to_string(), client_message_id.into());
        payload.insert("context".to_string(), self.user_context());
        payload.insert("params".to_string(), self.send_params.clone().into());
        payload.insert(
            "richMessage".to_string(),
            JsonValue::object([(
                "textSegments",
                JsonValue::object([("text", message.into())]),
            )]),
        );
        payload
    }

    fn moderation_payload(&self, params: &str) -> JsonMap {
        let mut payload = JsonMap::new();
        payload.insert("context".to_string(), self.user_context());
        payload.insert("params".to_string(), params.into());
        payload
    }

    fn next_client_message_id(&mut self) -> String {
        if self.message_counter >= MESSAGE_COUNTER_LIMIT {
            self.message_counter = 0;
        }
        let id = format!("{}{}", self.client_message_id, self.message_counter);
        self.message_counter += 1;
        id
    }

    // ------------------------------------------------------------------
    // 通信
    // ------------------------------------------------------------------

    fn api_url(&self, base_url: &str, path: &str) -> String {
        format!(
            "{}{}?key={}",
            base_url,
            path,
            self.api_key.as_deref().unwrap_or_default()
        )
    }

    fn auth_headers(&self) -> Headers {
        self.credentials
            .as_ref()
            .map(|credentials| credentials.auth_headers(Utc::now().timestamp(), &self.config.origin))
            .unwrap_or_default()
    }

    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        summary: &str,
    ) -> Result<String, LiveChatError> {
        self.transport
            .get(url, headers)
            .await
            .map_err(|e| Self::failure(summary, e))
    }

    async fn post(
        &self,
        url: &str,
        payload: &JsonMap,
        headers: &[(String, String)],
        summary: &str,
    ) -> Result<String, LiveChatError> {
        self.transport
            .post_json(url, &json::serialize(payload), headers)
            .await
            .map_err(|e| Self::failure(summary, e))
    }

    fn failure(summary: &str, source: TransportError) -> LiveChatError {
        log::warn!("{}: {}", summary, source);
        LiveChatError::transport(summary, source)
    }

    /// 配信ごとの状態を破棄する（前の配信の値を持ち越さない）
    fn clear_broadcast(&mut self) {
        self.visitor_data = None;
        self.client_version = None;
        self.send_params = None;
        self.banner_item = None;
        self.message_counter = 0;
        self.client_message_id = generate_client_message_id();
    }

    fn clear_cycle(&mut self) {
        self.chat_items.clear();
        self.ticker_paid_messages.clear();
        self.chat_item_deletes.clear();
    }

    fn absorb(&mut self, parsed: ParsedActions) {
        self.chat_items.extend(parsed.items);
        self.ticker_paid_messages.extend(parsed.ticker_items);
        self.chat_item_deletes.extend(parsed.deletes);
        if let Some(banner) = parsed.banner {
            self.banner_item = Some(banner);
        }
    }

    // ------------------------------------------------------------------
    // アクセサ
    // ------------------------------------------------------------------

    /// 取得済みの`cver`、未取得なら前日の日付から組み立てたバージョン
    pub fn client_version(&self) -> String {
        self.client_version
            .clone()
            .unwrap_or_else(|| bootstrap::fallback_client_version(Utc::now()))
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    pub fn is_replay(&self) -> bool {
        self.continuation.is_replay()
    }

    pub fn is_top_chat_only(&self) -> bool {
        self.continuation.top_chat_only()
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// 現在ピン留めされているチャット
    pub fn banner_item(&self) -> Option<&ChatItem> {
        self.banner_item.as_ref()
    }

    /// 直近のポーリングで取得したチャット
    pub fn chat_items(&self) -> &[ChatItem] {
        &self.chat_items
    }

    pub fn chat_item_deletes(&self) -> &[ChatItemDelete] {
        &self.chat_item_deletes
    }

    pub fn ticker_paid_messages(&self) -> &[ChatItem] {
        &self.ticker_paid_messages
    }

    pub fn continuation_phase(&self) -> ContinuationPhase {
        self.continuation.phase()
    }

    /// 次のポーリングまでの推奨待機時間
    pub fn suggested_poll_interval(&self) -> std::time::Duration {
        self.continuation.suggested_poll_interval()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> std::fmt::Debug for LiveChatClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveChatClient")
            .field("video_id", &self.video_id)
            .field("channel_id", &self.channel_id)
            .field("phase", &self.continuation.phase())
            .field("replay", &self.continuation.is_replay())
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}
