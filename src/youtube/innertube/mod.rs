//! InnerTube API クライアントモジュール
//!
//! YouTubeの内部APIを使用してライブチャットを取得・操作する。
//! 公式API Data v3と異なり、APIキー不要でクォータ制限なし。
//! ログイン済みのCookieを設定すればメッセージ送信とモデレーションも行える。
//!
//! ## 注意事項
//! - 非公式APIのため、仕様変更のリスクあり

pub mod bootstrap;
pub mod client;
pub mod continuation;
pub mod json;
pub mod moderation;
pub mod parser;
pub mod query;
pub mod types;

pub use client::LiveChatClient;
pub use continuation::{ContinuationPhase, ContinuationState, ContinuationType};
pub use json::{JsonMap, JsonValue};
pub use parser::{parse_chat_response, ParsedActions};
pub use query::{JsonQuery, PathKey};
pub use types::*;
