// =============================================================================
// 共通設定・定数モジュール
// =============================================================================
// クライアント全体で使用する接続先・ヘッダー・タイムアウトを定義
// =============================================================================

use std::time::Duration;

/// HTTPリクエストのデフォルトタイムアウト（秒）
///
/// ネットワーク状況が悪い場合でも適切にタイムアウトし、
/// ポーリングループを長時間止めないようにする。
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// ブラウザを装うUser-Agent（ポーリングペイロードにも埋め込まれる）
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.102 Safari/537.36,gzip(gfe)";

/// 視聴ページ・チャットAPIのオリジン
pub const YOUTUBE_ORIGIN: &str = "https://www.youtube.com";

/// モデレーション・ピン留めAPIのオリジン
pub const STUDIO_ORIGIN: &str = "https://studio.youtube.com";

/// HTTPリクエストのデフォルトタイムアウト（Duration）
///
/// HTTPクライアント構築時に直接使用可能
pub fn http_timeout() -> Duration {
    Duration::from_secs(HTTP_TIMEOUT_SECS)
}

/// クライアントの接続設定
///
/// ベースURLはモックサーバーに向けるために差し替えられる。
/// `origin`はSAPISIDHASHの計算にも使われるため、通常は変更しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub user_agent: String,
    pub origin: String,
    pub web_base_url: String,
    pub studio_base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            origin: YOUTUBE_ORIGIN.to_string(),
            web_base_url: YOUTUBE_ORIGIN.to_string(),
            studio_base_url: STUDIO_ORIGIN.to_string(),
            timeout: http_timeout(),
        }
    }
}

impl ClientConfig {
    /// www と studio の両方を同じベースURLに向けた設定（テスト用のモックサーバー向け）
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            web_base_url: base_url.clone(),
            studio_base_url: base_url,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_timeout_secs() {
        assert_eq!(HTTP_TIMEOUT_SECS, 10);
    }

    #[test]
    fn test_http_timeout_duration() {
        assert_eq!(http_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.web_base_url, "https://www.youtube.com");
        assert_eq!(config.studio_base_url, "https://studio.youtube.com");
        assert_eq!(config.origin, config.web_base_url);
        assert_eq!(config.timeout, http_timeout());
    }

    #[test]
    fn test_with_base_url_keeps_origin() {
        let config = ClientConfig::with_base_url("http://127.0.0.1:1234/");
        assert_eq!(config.web_base_url, "http://127.0.0.1:1234");
        assert_eq!(config.studio_base_url, "http://127.0.0.1:1234");
        assert_eq!(config.origin, YOUTUBE_ORIGIN);
    }
}
