//! ログインユーザーとしてのリクエスト認証
//!
//! ブラウザのCookieをそのまま保持し、SAPISIDHASH形式の
//! `Authorization`ヘッダーを組み立てる。

use std::str::FromStr;

use indexmap::IndexMap;
use sha1::{Digest, Sha1};

use super::errors::LiveChatError;
use super::transport::Headers;

/// Cookie（名前 → 値、挿入順を保持）
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    cookies: IndexMap<String, String>,
}

impl Credentials {
    pub fn from_map<K, V>(cookies: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cookies: cookies
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// `Cookie`ヘッダーの値（`name=value;`を連結）
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={};", name, value))
            .collect()
    }

    /// `SAPISIDHASH <t>_<sha1("<t> <SAPISID> <origin>")>`
    ///
    /// SAPISIDが無い場合は空文字列としてハッシュする。
    pub fn sapisid_hash(&self, timestamp: i64, origin: &str) -> String {
        let sapisid = self.get("SAPISID").unwrap_or_default();
        let digest = Sha1::digest(format!("{} {} {}", timestamp, sapisid, origin).as_bytes());
        format!("SAPISIDHASH {}_{}", timestamp, hex::encode(digest))
    }

    /// 認証付きリクエストのヘッダー一式
    pub fn auth_headers(&self, timestamp: i64, origin: &str) -> Headers {
        vec![
            (
                "Authorization".to_string(),
                self.sapisid_hash(timestamp, origin),
            ),
            ("X-Origin".to_string(), origin.to_string()),
            ("Origin".to_string(), origin.to_string()),
            ("Cookie".to_string(), self.cookie_header()),
        ]
    }
}

/// `"a=b; c=d"`形式のCookie文字列をパースする
impl FromStr for Credentials {
    type Err = LiveChatError;

    fn from_str(cookie: &str) -> Result<Self, Self::Err> {
        let mut cookies = IndexMap::new();
        for pair in cookie.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                LiveChatError::MalformedInput(format!("Cookie entry without '=': {}", pair))
            })?;
            cookies.insert(name.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { cookies })
    }
}

// Cookieの値はログに出さない
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookie_string() {
        let credentials: Credentials = "SID=abc; SAPISID=xyz/123;HSID = h ;".parse().unwrap();
        assert_eq!(credentials.len(), 3);
        assert_eq!(credentials.get("SAPISID"), Some("xyz/123"));
        assert_eq!(credentials.get("HSID"), Some("h"));
        assert_eq!(credentials.cookie_header(), "SID=abc;SAPISID=xyz/123;HSID=h;");
    }

    #[test]
    fn test_parse_cookie_value_containing_equals() {
        let credentials: Credentials = "PREF=f6=400&tz=Asia.Tokyo".parse().unwrap();
        assert_eq!(credentials.get("PREF"), Some("f6=400&tz=Asia.Tokyo"));
    }

    #[test]
    fn test_parse_cookie_without_equals() {
        let result = "SID=abc; broken".parse::<Credentials>();
        assert!(matches!(result, Err(LiveChatError::MalformedInput(_))));
    }

    #[test]
    fn test_sapisid_hash() {
        let credentials = Credentials::from_map([("SAPISID", "abc")]);
        // sha1("1700000000 abc https://www.youtube.com")
        let expected = hex::encode(Sha1::digest(b"1700000000 abc https://www.youtube.com"));
        assert_eq!(
            credentials.sapisid_hash(1_700_000_000, "https://www.youtube.com"),
            format!("SAPISIDHASH 1700000000_{}", expected)
        );
        assert_eq!(expected.len(), 40);
    }

    #[test]
    fn test_sapisid_hash_without_sapisid() {
        let credentials = Credentials::from_map([("SID", "abc")]);
        let expected = hex::encode(Sha1::digest(b"5  https://www.youtube.com"));
        assert_eq!(
            credentials.sapisid_hash(5, "https://www.youtube.com"),
            format!("SAPISIDHASH 5_{}", expected)
        );
    }

    #[test]
    fn test_auth_headers() {
        let credentials = Credentials::from_map([("SID", "s"), ("SAPISID", "p")]);
        let headers = credentials.auth_headers(1, "https://www.youtube.com");
        let names: Vec<&str> = headers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Authorization", "X-Origin", "Origin", "Cookie"]);
        assert_eq!(headers[1].1, "https://www.youtube.com");
        assert_eq!(headers[3].1, "SID=s;SAPISID=p;");
    }

    #[test]
    fn test_debug_hides_values() {
        let credentials = Credentials::from_map([("SAPISID", "secret")]);
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("SAPISID"));
        assert!(!debug.contains("secret"));
    }
}
