use rand::Rng;

use crate::youtube::errors::LiveChatError;

/// 送信メッセージIDに使う文字
const CLIENT_MESSAGE_ID_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ-";
const CLIENT_MESSAGE_ID_LEN: usize = 26;

/// APIキーをマスキングしてログ出力用の文字列を生成
///
/// APIキーの最初の4文字と最後の4文字のみを表示し、中間を***でマスキング
///
/// # Examples
/// ```
/// use youtube_live_chat::util::mask_api_key;
///
/// let masked = mask_api_key("AIzaSyABC123def456GHI789");
/// assert_eq!(masked, "AIza***I789");
/// ```
pub fn mask_api_key(api_key: &str) -> String {
    if api_key.is_empty() {
        return "***".to_string();
    }

    let len = api_key.len();
    if len <= 8 || !api_key.is_ascii() {
        // 短いキーは全体をマスク
        return "***".to_string();
    }

    let prefix = &api_key[..4];
    let suffix = &api_key[len - 4..];
    format!("{}***{}", prefix, suffix)
}

/// 送信メッセージIDの接頭辞（ランダムな26文字）を生成
pub fn generate_client_message_id() -> String {
    let mut rng = rand::thread_rng();
    (0..CLIENT_MESSAGE_ID_LEN)
        .map(|_| CLIENT_MESSAGE_ID_CHARS[rng.gen_range(0..CLIENT_MESSAGE_ID_CHARS.len())] as char)
        .collect()
}

/// URLでなくIDそのものが渡されたか
fn is_bare_id(value: &str) -> bool {
    !value.contains('?')
        && !value.contains(".com/")
        && !value.contains(".be/")
        && !value.contains('/')
        && !value.contains('&')
}

/// `?`以降を取り除く
fn strip_query(value: &str) -> &str {
    value.split('?').next().unwrap_or(value)
}

/// URLから動画IDを取得する
///
/// `watch?v=`、`embed/`、`youtu.be/`の各形式とID単体に対応。
///
/// # Examples
/// ```
/// use youtube_live_chat::util::video_id_from_url;
///
/// assert_eq!(video_id_from_url("https://www.youtube.com/watch?v=Aw5b1sa0w").unwrap(), "Aw5b1sa0w");
/// ```
pub fn video_id_from_url(url: &str) -> Result<String, LiveChatError> {
    if is_bare_id(url) {
        return Ok(url.to_string());
    }
    if url.contains("youtube.com/watch?") {
        let video_id = url
            .split_once('?')
            .map(|(_, query)| query)
            .into_iter()
            .flat_map(|query| query.split('&'))
            .find_map(|pair| pair.strip_prefix("v="))
            .filter(|id| !id.is_empty());
        if let Some(video_id) = video_id {
            return Ok(video_id.to_string());
        }
    }
    for marker in ["youtube.com/embed/", "youtu.be/"] {
        if let Some((_, rest)) = url.split_once(marker) {
            return Ok(strip_query(rest).to_string());
        }
    }
    Err(LiveChatError::InvalidUrl(url.to_string()))
}

/// URLからチャンネルIDを取得する
///
/// `youtube.com/channel/<id>`形式とID単体に対応。
/// カスタムURL（`@handle`など）は解決しない。
pub fn channel_id_from_url(url: &str) -> Result<String, LiveChatError> {
    if is_bare_id(url) {
        return Ok(url.to_string());
    }
    if url.contains("youtube.com/") {
        if let Some((_, rest)) = url.split_once("channel/") {
            return Ok(strip_query(rest).to_string());
        }
    }
    Err(LiveChatError::InvalidUrl(url.to_string()))
}
