//! モデレーション用トークンの解決
//!
//! チャットアイテムのコンテキストメニューを取得し、メニュー項目の
//! アイコン種別から各操作のトークンを取り出す。

use super::json::JsonValue;
use super::query::JsonQuery;
use super::types::{ModerationAction, ModerationTokens};

impl ModerationAction {
    /// コンテキストメニューのアイコン種別から操作を判定する
    ///
    /// 通報やモデレーター追加/解除の項目は認識するが、扱わないので`None`。
    pub fn from_icon_type(icon_type: &str) -> Option<Self> {
        match icon_type {
            "KEEP" => Some(ModerationAction::Pin),
            "DELETE" => Some(ModerationAction::Delete),
            "HOURGLASS" => Some(ModerationAction::Timeout),
            "REMOVE_CIRCLE" => Some(ModerationAction::Ban),
            "ADD_CIRCLE" => Some(ModerationAction::Unban),
            "FLAG" | "ADD_MODERATOR" | "REMOVE_MODERATOR" => None,
            other => {
                log::debug!("Unknown context menu icon type: {}", other);
                None
            }
        }
    }

    /// トークンが格納されているエンドポイント名
    fn endpoint_key(&self) -> &'static str {
        match self {
            ModerationAction::Pin => "liveChatActionEndpoint",
            _ => "moderateLiveChatEndpoint",
        }
    }

    /// 送信先のAPIパス（studio.youtube.com 配下）
    pub fn api_path(&self) -> &'static str {
        match self {
            ModerationAction::Pin => "/youtubei/v1/live_chat/live_chat_action",
            _ => "/youtubei/v1/live_chat/moderate",
        }
    }

    /// 失敗時のエラーメッセージ
    pub fn failure_summary(&self) -> &'static str {
        match self {
            ModerationAction::Pin => "Couldn't pin chat",
            ModerationAction::Delete => "Couldn't delete chat",
            ModerationAction::Timeout | ModerationAction::Ban => "Couldn't ban user",
            ModerationAction::Unban => "Couldn't unban user",
        }
    }
}

/// コンテキストメニューのレスポンスからトークンを取り出して`tokens`に設定する
///
/// 設定したトークンの数を返す。
pub fn apply_context_menu(response: &JsonValue, tokens: &mut ModerationTokens) -> usize {
    let Some(items) = response.get_list(
        "items",
        &["liveChatItemContextMenuSupportedRenderers", "menuRenderer"],
    ) else {
        return 0;
    };

    let mut resolved = 0;
    for item in items {
        let renderer = item.get_map(&["menuServiceItemRenderer"]);
        let Some(action) = renderer
            .get_map(&["icon"])
            .get_str("iconType")
            .and_then(ModerationAction::from_icon_type)
        else {
            continue;
        };
        if let Some(params) = renderer
            .get_map(&["serviceEndpoint", action.endpoint_key()])
            .get_str("params")
        {
            log::debug!("Resolved {} token from context menu", action);
            tokens.set(action, Some(params.to_string()));
            resolved += 1;
        }
    }
    resolved
}
