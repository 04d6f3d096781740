//! ライブチャットのエンティティ定義

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 初期化時に渡すIDの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdType {
    Video,
    Channel,
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdType::Video => f.write_str("video"),
            IdType::Channel => f.write_str("channel"),
        }
    }
}

/// チャットの表示モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatMode {
    /// 上位のチャットのみ
    #[default]
    TopChat,
    /// すべてのチャット
    AllChat,
}

impl ChatMode {
    pub fn is_top_chat_only(&self) -> bool {
        matches!(self, ChatMode::TopChat)
    }
}

/// リクエストに付与するロケール（国コードと言語コードは必須）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub country: String,
    pub language: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            country: "US".to_string(),
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatItemType {
    #[default]
    Message,
    PaidMessage,
    PaidSticker,
    TickerPaidMessage,
    NewMemberMessage,
}

/// 投稿者の属性（複数同時に付与され得る）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorType {
    Normal,
    Verified,
    Owner,
    Member,
    Moderator,
    #[serde(rename = "YOUTUBE")]
    YouTube,
}

/// メッセージ内の絵文字
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emoji {
    pub emoji_id: Option<String>,
    pub shortcuts: Vec<String>,
    pub search_terms: Vec<String>,
    pub icon_url: Option<String>,
    pub is_custom_emoji: bool,
}

/// リッチメッセージの要素（テキストと絵文字が交互に並ぶ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageSegment {
    Text { text: String },
    Emoji { emoji: Emoji },
}

/// モデレーション操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModerationAction {
    Pin,
    Delete,
    Timeout,
    Ban,
    Unban,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationAction::Pin => "pin",
            ModerationAction::Delete => "delete",
            ModerationAction::Timeout => "timeout",
            ModerationAction::Ban => "ban",
            ModerationAction::Unban => "unban",
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// アイテムごとのモデレーション用トークン
///
/// `context_menu`はフィードから取得され、それ以外はコンテキストメニューを
/// 問い合わせるまで`None`のまま。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModerationTokens {
    pub context_menu: Option<String>,
    pub pin: Option<String>,
    pub delete: Option<String>,
    pub timeout: Option<String>,
    pub ban: Option<String>,
    pub unban: Option<String>,
}

impl ModerationTokens {
    pub fn get(&self, action: ModerationAction) -> Option<&str> {
        match action {
            ModerationAction::Pin => self.pin.as_deref(),
            ModerationAction::Delete => self.delete.as_deref(),
            ModerationAction::Timeout => self.timeout.as_deref(),
            ModerationAction::Ban => self.ban.as_deref(),
            ModerationAction::Unban => self.unban.as_deref(),
        }
    }

    pub fn set(&mut self, action: ModerationAction, token: Option<String>) {
        let slot = match action {
            ModerationAction::Pin => &mut self.pin,
            ModerationAction::Delete => &mut self.delete,
            ModerationAction::Timeout => &mut self.timeout,
            ModerationAction::Ban => &mut self.ban,
            ModerationAction::Unban => &mut self.unban,
        };
        *slot = token;
    }
}

/// チャットアイテム
///
/// ポーリングごとに新しく生成される。モデレーション操作は
/// `LiveChatClient`のメソッドにこのアイテムを渡して行う。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ChatItemType,
    pub author_name: Option<String>,
    pub author_channel_id: Option<String>,
    pub author_icon_url: Option<String>,
    pub author_types: Vec<AuthorType>,
    pub member_badge_icon_url: Option<String>,
    /// プレーンテキスト（テキスト要素がなければ`None`）
    pub message: Option<String>,
    pub message_extended: Vec<MessageSegment>,
    /// 投稿時刻（UNIXエポックからのマイクロ秒）
    pub timestamp: i64,
    // スーパーチャット
    pub body_background_color: u32,
    pub body_text_color: u32,
    pub header_background_color: u32,
    pub header_text_color: u32,
    pub author_name_text_color: u32,
    pub purchase_amount: Option<String>,
    // スーパーステッカー
    pub sticker_icon_url: Option<String>,
    pub background_color: u32,
    // ティッカー
    pub end_background_color: u32,
    pub duration_sec: i64,
    pub full_duration_sec: i64,
    #[serde(skip)]
    pub moderation: ModerationTokens,
}

impl ChatItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type: ChatItemType::Message,
            author_name: None,
            author_channel_id: None,
            author_icon_url: None,
            author_types: vec![AuthorType::Normal],
            member_badge_icon_url: None,
            message: None,
            message_extended: Vec::new(),
            timestamp: 0,
            body_background_color: 0,
            body_text_color: 0,
            header_background_color: 0,
            header_text_color: 0,
            author_name_text_color: 0,
            purchase_amount: None,
            sticker_icon_url: None,
            background_color: 0,
            end_background_color: 0,
            duration_sec: 0,
            full_duration_sec: 0,
            moderation: ModerationTokens::default(),
        }
    }

    /// 属性を追加する（重複は追加しない）
    pub fn add_author_type(&mut self, author_type: AuthorType) {
        if !self.author_types.contains(&author_type) {
            self.author_types.push(author_type);
        }
    }

    pub fn has_author_type(&self, author_type: AuthorType) -> bool {
        self.author_types.contains(&author_type)
    }

    pub fn is_author_verified(&self) -> bool {
        self.has_author_type(AuthorType::Verified)
    }

    pub fn is_author_owner(&self) -> bool {
        self.has_author_type(AuthorType::Owner)
    }

    pub fn is_author_moderator(&self) -> bool {
        self.has_author_type(AuthorType::Moderator)
    }

    pub fn is_author_member(&self) -> bool {
        self.has_author_type(AuthorType::Member)
    }

    /// 投稿時刻を`DateTime<Utc>`で取得（タイムスタンプが範囲外なら`None`）
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_micros(self.timestamp).single()
    }
}

/// チャット削除通知
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatItemDelete {
    /// 削除対象のチャットアイテムID
    pub target_id: Option<String>,
    /// 削除後に表示される置き換えテキスト
    pub message: Option<String>,
}

/// 配信情報（`liveBroadcastDetails`）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastDetails {
    pub is_live_now: Option<bool>,
    pub start_timestamp: Option<String>,
    pub end_timestamp: Option<String>,
}
