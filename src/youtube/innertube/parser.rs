//! InnerTube レスポンスパーサー
//!
//! フィードのアクションを1件ずつ調べ、レンダラーの種類に応じて
//! `ChatItem` / `ChatItemDelete` に変換する。欠損フィールドはすべて
//! デフォルト値で吸収し、ここからエラーを返すことはない。

use super::json::{JsonMap, JsonValue};
use super::query::JsonQuery;
use super::types::{AuthorType, ChatItem, ChatItemDelete, ChatItemType, Emoji, MessageSegment};

/// 1回のポーリングで得られた解析結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedActions {
    pub items: Vec<ChatItem>,
    pub ticker_items: Vec<ChatItem>,
    pub deletes: Vec<ChatItemDelete>,
    /// ピン留めメッセージ（このサイクルで受信した最後のもの）
    pub banner: Option<ChatItem>,
}

/// レスポンス全体から`continuationContents.liveChatContinuation.actions`を解析する
pub fn parse_chat_response(response: &JsonValue) -> ParsedActions {
    let mut parsed = ParsedActions::default();
    if let Some(actions) = response.get_list(
        "actions",
        &["continuationContents", "liveChatContinuation"],
    ) {
        parse_actions(actions, &mut parsed);
    }
    parsed
}

/// アクションのリストを解析し、結果を`out`に追加する
pub fn parse_actions(actions: &[JsonValue], out: &mut ParsedActions) {
    for action in actions {
        parse_action(action, out);
    }
}

fn parse_action(action: &JsonValue, out: &mut ParsedActions) {
    match action.get_map(&["addChatItemAction", "item"]) {
        Some(item) => {
            if let Some(chat_item) = parse_chat_item(item) {
                out.items.push(chat_item);
            }
        }
        None => {
            // リプレイではアクションが1段ラップされている
            if let Some(inner) = action.get_list("actions", &["replayChatItemAction"]) {
                parse_actions(inner, out);
            }
        }
    }

    if let Some(item) = action.get_map(&["addLiveChatTickerItemAction", "item"]) {
        if let Some(chat_item) = parse_chat_item(item) {
            out.ticker_items.push(chat_item);
        }
    }

    // ピン留めメッセージはリストに追加せず、現在のバナーを置き換える
    if let Some(contents) = action.get_map(&[
        "addBannerToLiveChatCommand",
        "bannerRenderer",
        "liveChatBannerRenderer",
        "contents",
    ]) {
        if let Some(chat_item) = parse_chat_item(contents) {
            out.banner = Some(chat_item);
        }
    }

    if let Some(deleted) = action.get_map(&["markChatItemAsDeletedAction"]) {
        let (message, _) = parse_message(deleted.get_map(&["deletedStateMessage"]));
        out.deletes.push(ChatItemDelete {
            target_id: deleted.get_str("targetItemId").map(str::to_string),
            message,
        });
    }
}

/// レンダラーを含むアイテムを`ChatItem`に変換する（IDが取れなければ`None`）
pub fn parse_chat_item(item: &JsonMap) -> Option<ChatItem> {
    let mut chat_item = ChatItem::new(String::new());
    apply_renderers(&mut chat_item, item);
    if chat_item.id.is_empty() {
        log::debug!("Dropped chat item without id");
        return None;
    }
    Some(chat_item)
}

fn apply_renderers(chat_item: &mut ChatItem, item: &JsonMap) {
    let paid_message = item.get_map(&["liveChatPaidMessageRenderer"]);
    let paid_sticker = item.get_map(&["liveChatPaidStickerRenderer"]);
    let membership = item.get_map(&["liveChatMembershipItemRenderer"]);

    // テキストメッセージと同じ形のレンダラー（通常 → スーパーチャット → ステッカー → メンバーシップ）
    let text_shaped = item
        .get_map(&["liveChatTextMessageRenderer"])
        .or(paid_message)
        .or(paid_sticker)
        .or(membership);
    if let Some(renderer) = text_shaped {
        apply_text_message(chat_item, renderer);
    }

    if let Some(engagement) = item.get_map(&["liveChatViewerEngagementMessageRenderer"]) {
        chat_item.author_name = Some("YouTube".to_string());
        chat_item.author_channel_id = Some("user/YouTube".to_string());
        chat_item.add_author_type(AuthorType::YouTube);
        set_id(chat_item, engagement);
        let (message, extended) = parse_message(engagement.get_map(&["message"]));
        chat_item.message = message;
        chat_item.message_extended = extended;
        chat_item.timestamp = parse_timestamp(engagement.get_str("timestampUsec"));
    }

    if let Some(renderer) = paid_message {
        // 4色とも bodyBackgroundColor を参照する（既存クライアントとの互換のため）
        let color = parse_color(renderer, "bodyBackgroundColor");
        chat_item.body_background_color = color;
        chat_item.body_text_color = color;
        chat_item.header_background_color = color;
        chat_item.header_text_color = color;
        chat_item.author_name_text_color = parse_color(renderer, "authorNameTextColor");
        chat_item.purchase_amount = simple_text(renderer, "purchaseAmountText");
        chat_item.item_type = ChatItemType::PaidMessage;
    }

    if let Some(renderer) = paid_sticker {
        chat_item.background_color = parse_color(renderer, "backgroundColor");
        chat_item.purchase_amount = simple_text(renderer, "purchaseAmountText");
        if let Some(thumbnails) = renderer.get_list("thumbnails", &["sticker"]) {
            chat_item.sticker_icon_url = select_thumbnail_url(thumbnails);
        }
        chat_item.item_type = ChatItemType::PaidSticker;
    }

    if let Some(ticker) = item.get_map(&["liveChatTickerPaidMessageItemRenderer"]) {
        const SHOW_ITEM_PATH: [&str; 3] = ["showItemEndpoint", "showLiveChatItemEndpoint", "renderer"];
        let shown = ticker
            .get_map(&SHOW_ITEM_PATH)
            .or_else(|| paid_message.get_map(&SHOW_ITEM_PATH));
        if let Some(shown) = shown {
            apply_renderers(chat_item, shown);
        }
        chat_item.end_background_color = parse_color(ticker, "endBackgroundColor");
        chat_item.duration_sec = ticker.get_i64("durationSec");
        chat_item.full_duration_sec = ticker.get_i64("fullDurationSec");
        chat_item.item_type = ChatItemType::TickerPaidMessage;
    }

    if let Some(renderer) = membership {
        let (message, extended) = parse_message(renderer.get_map(&["headerSubtext"]));
        chat_item.message = message;
        chat_item.message_extended = extended;
        chat_item.item_type = ChatItemType::NewMemberMessage;
    }
}

fn apply_text_message(chat_item: &mut ChatItem, renderer: &JsonMap) {
    chat_item.author_name = simple_text(renderer, "authorName");
    set_id(chat_item, renderer);
    chat_item.author_channel_id = renderer
        .get_str("authorExternalChannelId")
        .map(str::to_string);

    let (message, extended) = parse_message(renderer.get_map(&["message"]));
    chat_item.message = message;
    chat_item.message_extended = extended;

    if let Some(thumbnails) = renderer.get_list("thumbnails", &["authorPhoto"]) {
        chat_item.author_icon_url = select_thumbnail_url(thumbnails);
    }
    if let Some(timestamp) = renderer.get_str("timestampUsec") {
        chat_item.timestamp = parse_timestamp(Some(timestamp));
    }

    if let Some(badges) = renderer.get_list("authorBadges", &[]) {
        parse_author_badges(chat_item, badges);
    }

    if let Some(params) = renderer
        .get_map(&["contextMenuEndpoint", "liveChatItemContextMenuEndpoint"])
        .get_str("params")
    {
        chat_item.moderation.context_menu = Some(params.to_string());
    }
}

fn set_id(chat_item: &mut ChatItem, renderer: &JsonMap) {
    chat_item.id = renderer.get_str("id").unwrap_or_default().to_string();
}

/// 投稿者バッジから属性を付与する
fn parse_author_badges(chat_item: &mut ChatItem, badges: &[JsonValue]) {
    for badge in badges {
        let Some(renderer) = badge.get_map(&["liveChatAuthorBadgeRenderer"]) else {
            continue;
        };
        match renderer.get_map(&["icon"]).get_str("iconType") {
            Some("VERIFIED") => chat_item.add_author_type(AuthorType::Verified),
            Some("OWNER") => chat_item.add_author_type(AuthorType::Owner),
            Some("MODERATOR") => chat_item.add_author_type(AuthorType::Moderator),
            _ => {}
        }
        // カスタムサムネイルがある場合はメンバー
        if let Some(custom) = renderer.get_map(&["customThumbnail"]) {
            chat_item.add_author_type(AuthorType::Member);
            if let Some(thumbnails) = custom.get_list("thumbnails", &[]) {
                chat_item.member_badge_icon_url = select_thumbnail_url(thumbnails);
            }
        }
    }
}

/// メッセージのrunsをプレーンテキストとリッチメッセージに変換する
///
/// 絵文字はプレーンテキストでは前後に空白を付けた最初のショートカットになる。
/// テキストが空なら`None`を返す。
pub fn parse_message(message: Option<&JsonMap>) -> (Option<String>, Vec<MessageSegment>) {
    let mut text = String::new();
    let mut segments = Vec::new();

    for run in message.get_list("runs", &[]).into_iter().flatten() {
        if let Some(run_text) = run.get_str("text") {
            text.push_str(run_text);
            segments.push(MessageSegment::Text {
                text: run_text.to_string(),
            });
        }
        if let Some(emoji) = run.get_map(&["emoji"]) {
            let emoji = parse_emoji(emoji);
            if let Some(shortcut) = emoji.shortcuts.first() {
                text.push(' ');
                text.push_str(shortcut);
                text.push(' ');
            }
            segments.push(MessageSegment::Emoji { emoji });
        }
    }

    let text = if text.is_empty() { None } else { Some(text) };
    (text, segments)
}

fn parse_emoji(emoji: &JsonMap) -> Emoji {
    Emoji {
        emoji_id: emoji.get_str("emojiId").map(str::to_string),
        shortcuts: string_list(emoji, "shortcuts"),
        search_terms: string_list(emoji, "searchTerms"),
        icon_url: emoji
            .get_list("thumbnails", &["image"])
            .and_then(|thumbnails| select_thumbnail_url(thumbnails)),
        is_custom_emoji: emoji.get_bool("isCustomEmoji"),
    }
}

fn string_list(map: &JsonMap, key: &str) -> Vec<String> {
    map.get_list(key, &[])
        .map(|items| {
            items
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// 最も幅の大きいサムネイルのURLを返す（同じ幅なら先に見つかった方）
pub fn select_thumbnail_url(thumbnails: &[JsonValue]) -> Option<String> {
    let mut best: Option<(i64, &str)> = None;
    for thumbnail in thumbnails {
        let Some(url) = thumbnail.get_str("url") else {
            continue;
        };
        let width = thumbnail.get_i64("width");
        if best.map_or(true, |(best_width, _)| width > best_width) {
            best = Some((width, url));
        }
    }
    best.map(|(_, url)| url.to_string())
}

fn simple_text(renderer: &JsonMap, key: &str) -> Option<String> {
    renderer
        .get_map(&[key])
        .get_str("simpleText")
        .map(str::to_string)
}

/// ARGB色（0xAARRGGBB）を取得する
fn parse_color(renderer: &JsonMap, key: &str) -> u32 {
    renderer.get_i64(key) as u32
}

/// タイムスタンプ（マイクロ秒の10進文字列）をパースする
/// 頻繁に呼ばれるため、パース失敗時のログはdebugレベル
fn parse_timestamp(timestamp_usec: Option<&str>) -> i64 {
    match timestamp_usec {
        Some(ts) => ts.parse::<i64>().unwrap_or_else(|e| {
            log::debug!("Failed to parse timestamp '{}': {}", ts, e);
            0
        }),
        None => 0,
    }
}
