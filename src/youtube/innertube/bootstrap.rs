//! 初期化用のHTMLスクレイピング
//!
//! 視聴ページ（またはチャンネルのライブページ）とチャットページの
//! HTMLから、ポーリング開始に必要な値を取り出す。

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::json::{self, JsonValue};
use super::query::{JsonQuery, PathKey};
use crate::youtube::errors::LiveChatError;

static CHANNEL_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""channelId":"([^"]*)","isOwnerViewing""#)
        .expect("Failed to compile channel id regex")
});

static LIVE_VIDEO_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""updatedMetadataEndpoint":\{"videoId":"([^"]*)"#)
        .expect("Failed to compile live video id regex")
});

static IS_REPLAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""isReplay":([^,]*)"#).expect("Failed to compile isReplay regex")
});

static TOP_CHAT_CONTINUATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""selected":true,"continuation":\{"reloadContinuationData":\{"continuation":"([^"]*)"#)
        .expect("Failed to compile top chat continuation regex")
});

static ALL_CHAT_CONTINUATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""selected":false,"continuation":\{"reloadContinuationData":\{"continuation":"([^"]*)"#)
        .expect("Failed to compile all chat continuation regex")
});

static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""innertubeApiKey":"([^"]*)""#).expect("Failed to compile API key regex")
});

static DATASYNC_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""datasyncId":"([^|]*)\|\|.*""#).expect("Failed to compile datasyncId regex")
});

/// `ytInitialData`の開始マーカー（新旧2種類）
const INITIAL_DATA_MARKERS: [&str; 2] = ["window[\"ytInitialData\"] = ", "var ytInitialData = "];
const INITIAL_DATA_END: &str = ";</script>";

/// 視聴ページから取り出した値
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchPage {
    pub channel_id: Option<String>,
    pub live_video_id: Option<String>,
    pub is_replay: bool,
    pub top_chat_continuation: Option<String>,
    pub all_chat_continuation: Option<String>,
    pub api_key: Option<String>,
    /// ログイン時のみ埋め込まれる
    pub datasync_id: Option<String>,
}

fn capture(re: &Regex, html: &str) -> Option<String> {
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// 視聴ページ（`/watch?v=`または`/channel/<id>/live`）をスクレイピングする
pub fn scrape_watch_page(html: &str) -> WatchPage {
    let page = WatchPage {
        channel_id: capture(&CHANNEL_ID_RE, html),
        live_video_id: capture(&LIVE_VIDEO_ID_RE, html),
        is_replay: capture(&IS_REPLAY_RE, html)
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false),
        top_chat_continuation: capture(&TOP_CHAT_CONTINUATION_RE, html),
        all_chat_continuation: capture(&ALL_CHAT_CONTINUATION_RE, html),
        api_key: capture(&API_KEY_RE, html),
        datasync_id: capture(&DATASYNC_ID_RE, html),
    };
    if page.api_key.is_none() {
        log::warn!("innertubeApiKey not found in page");
    }
    page
}

/// 埋め込まれた`ytInitialData`のJSON文字列を切り出す
pub fn extract_initial_data(html: &str) -> Option<&str> {
    INITIAL_DATA_MARKERS.iter().find_map(|marker| {
        let start = html.find(marker)? + marker.len();
        let rest = &html[start..];
        let end = rest.find(INITIAL_DATA_END)?;
        Some(&rest[..end])
    })
}

/// `ytInitialData`を汎用JSONツリーとしてパースする
pub fn parse_initial_data(html: &str) -> Result<JsonValue, LiveChatError> {
    let data = extract_initial_data(html)
        .ok_or_else(|| LiveChatError::MalformedInput("ytInitialData not found".to_string()))?;
    json::parse(data)
}

/// ライブチャットページの`ytInitialData`からメッセージ送信用の`params`を取り出す
pub fn send_message_params(initial_data: &JsonValue) -> Option<String> {
    initial_data
        .get_map(&[
            "continuationContents",
            "liveChatContinuation",
            "actionPanel",
            "liveChatMessageInputRenderer",
            "sendButton",
            "buttonRenderer",
            "serviceEndpoint",
            "sendLiveChatMessageEndpoint",
        ])
        .get_str("params")
        .map(str::to_string)
}

/// リプレイページの`ytInitialData`から最初のcontinuationを取り出す
pub fn replay_continuation(initial_data: &JsonValue) -> Option<String> {
    initial_data
        .get_map_at(&[
            PathKey::Key("continuationContents"),
            PathKey::Key("liveChatContinuation"),
            PathKey::Key("continuations"),
            PathKey::Index(0),
            PathKey::Key("liveChatReplayContinuationData"),
        ])
        .get_str("continuation")
        .map(str::to_string)
}

/// `responseContext.serviceTrackingParams`のCSIサービスから`cver`を読む
///
/// 複数見つかった場合は最後のものを採用する。
pub fn client_version(response: &JsonValue) -> Option<String> {
    let services = response.get_list("serviceTrackingParams", &["responseContext"])?;
    services
        .iter()
        .filter(|service| service.get_str("service") == Some("CSI"))
        .filter_map(|service| service.get_value("params").and_then(JsonValue::as_array))
        .flatten()
        .filter(|param| param.get_str("key") == Some("cver"))
        .filter_map(|param| param.get_str("value"))
        .last()
        .map(str::to_string)
}

/// `cver`が未取得のときに使うクライアントバージョン（前日の日付）
pub fn fallback_client_version(now: DateTime<Utc>) -> String {
    let yesterday = now - Duration::days(1);
    format!("2.{}.06.00", yesterday.format("%Y%m%d"))
}

/// `responseContext.visitorData`
pub fn visitor_data(response: &JsonValue) -> Option<String> {
    response
        .get_map(&["responseContext"])
        .get_str("visitorData")
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// 文書順の深さ優先（行きがけ順）で最初に見つかった`key`の値を返す
///
/// 各エントリについて、キーの一致を確認してからその値の中を探す。
pub fn find_by_key<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map.iter().find_map(|(name, child)| {
            if name == key {
                Some(child)
            } else {
                find_by_key(child, key)
            }
        }),
        serde_json::Value::Array(items) => items.iter().find_map(|child| find_by_key(child, key)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const WATCH_HTML: &str = r#"<script>var ytInitialPlayerResponse = {"videoDetails":{"channelId":"UCabc","isOwnerViewing":false}};
        "liveChatRenderer":{"continuations":[],"isReplay":true,"header":{"subMenuItems":[
        {"title":"Top chat","selected":true,"continuation":{"reloadContinuationData":{"continuation":"top-token"}}},
        {"title":"Live chat","selected":false,"continuation":{"reloadContinuationData":{"continuation":"all-token"}}}]}}
        "innertubeApiKey":"AIzaTestKey","datasyncId":"user123||456"</script>"#;

    #[test]
    fn test_scrape_watch_page() {
        let page = scrape_watch_page(WATCH_HTML);
        assert_eq!(page.channel_id.as_deref(), Some("UCabc"));
        assert!(page.is_replay);
        assert_eq!(page.top_chat_continuation.as_deref(), Some("top-token"));
        assert_eq!(page.all_chat_continuation.as_deref(), Some("all-token"));
        assert_eq!(page.api_key.as_deref(), Some("AIzaTestKey"));
        assert_eq!(page.datasync_id.as_deref(), Some("user123"));
        assert!(page.live_video_id.is_none());
    }

    #[test]
    fn test_scrape_channel_live_page() {
        let html = r#""updatedMetadataEndpoint":{"videoId":"vid123","x":1},"isReplay":false,"#;
        let page = scrape_watch_page(html);
        assert_eq!(page.live_video_id.as_deref(), Some("vid123"));
        assert!(!page.is_replay);
        assert!(page.datasync_id.is_none());
    }

    #[test]
    fn test_extract_initial_data_markers() {
        let old = r#"<script>window["ytInitialData"] = {"a":1};</script>"#;
        let new = r#"<script nonce="x">var ytInitialData = {"b":2};</script>"#;
        assert_eq!(extract_initial_data(old), Some(r#"{"a":1}"#));
        assert_eq!(extract_initial_data(new), Some(r#"{"b":2}"#));
        assert_eq!(extract_initial_data("<html></html>"), None);
    }

    #[test]
    fn test_parse_initial_data_missing() {
        assert!(matches!(
            parse_initial_data("<html></html>"),
            Err(LiveChatError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_send_message_params() {
        let html = r#"var ytInitialData = {"continuationContents":{"liveChatContinuation":{"actionPanel":{"liveChatMessageInputRenderer":{"sendButton":{"buttonRenderer":{"serviceEndpoint":{"sendLiveChatMessageEndpoint":{"params":"send-params"}}}}}}}}};</script>"#;
        let data = parse_initial_data(html).unwrap();
        assert_eq!(send_message_params(&data).as_deref(), Some("send-params"));
    }

    #[test]
    fn test_replay_continuation() {
        let data = json::parse(
            r#"{"continuationContents":{"liveChatContinuation":{"continuations":[{"liveChatReplayContinuationData":{"continuation":"replay-1"}},{"playerSeekContinuationData":{}}]}}}"#,
        )
        .unwrap();
        assert_eq!(replay_continuation(&data).as_deref(), Some("replay-1"));
    }

    #[test]
    fn test_client_version() {
        let data = json::parse(
            r#"{"responseContext":{"visitorData":"vis","serviceTrackingParams":[
                {"service":"GFEEDBACK","params":[{"key":"cver","value":"wrong"}]},
                {"service":"CSI","params":[{"key":"c","value":"WEB"},{"key":"cver","value":"2.20240101.00.00"}]}]}}"#,
        )
        .unwrap();
        assert_eq!(client_version(&data).as_deref(), Some("2.20240101.00.00"));
        assert_eq!(visitor_data(&data).as_deref(), Some("vis"));
        assert_eq!(client_version(&json::parse("{}").unwrap()), None);
    }

    #[test]
    fn test_fallback_client_version() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap();
        assert_eq!(fallback_client_version(now), "2.20240229.06.00");
    }

    #[test]
    fn test_find_by_key_depth_first() {
        let value: serde_json::Value = serde_json::from_str(
            r#"[{"page":"watch"},{"playerResponse":{"microformat":{"playerMicroformatRenderer":{"liveBroadcastDetails":{"isLiveNow":true}}}}},{"liveBroadcastDetails":{"isLiveNow":false}}]"#,
        )
        .unwrap();
        let found = find_by_key(&value, "liveBroadcastDetails").unwrap();
        assert_eq!(found["isLiveNow"], true);
        assert!(find_by_key(&value, "missing").is_none());
    }

    #[test]
    fn test_find_by_key_document_order() {
        // 先に現れる兄弟の中にあるキーが、後ろの同階層のキーより優先される
        let value: serde_json::Value =
            serde_json::from_str(r#"{"z":{"target":1},"target":2,"a":{"target":3}}"#).unwrap();
        assert_eq!(find_by_key(&value, "target"), Some(&serde_json::json!(1)));

        let value: serde_json::Value =
            serde_json::from_str(r#"{"z":{"target":"first"},"a":{"target":"second"}}"#).unwrap();
        assert_eq!(find_by_key(&value, "target"), Some(&serde_json::json!("first")));
    }
}
