//! YouTube Live のチャットを InnerTube API 経由で取得し、
//! メッセージ送信やモデレーション操作を行うクライアント。
//!
//! ```no_run
//! use youtube_live_chat::{ChatMode, IdType, LiveChatClient};
//!
//! # async fn run() -> Result<(), youtube_live_chat::LiveChatError> {
//! let mut client = LiveChatClient::new()?;
//! client.initialize("VIDEO_ID", ChatMode::TopChat, IdType::Video).await?;
//! loop {
//!     client.update(0).await?;
//!     for item in client.chat_items() {
//!         println!("{}: {}", item.author_name.as_deref().unwrap_or_default(), item.message.as_deref().unwrap_or_default());
//!     }
//!     tokio::time::sleep(client.suggested_poll_interval()).await;
//! }
//! # }
//! ```

pub mod config;
pub mod util; // doctestのためpubにする
pub mod youtube;

pub use config::ClientConfig;
pub use youtube::auth::Credentials;
pub use youtube::errors::{LiveChatError, TransportError};
pub use youtube::innertube::{
    AuthorType, ChatItem, ChatItemDelete, ChatItemType, ChatMode, ContinuationPhase, Emoji, IdType,
    LiveBroadcastDetails, LiveChatClient, Locale, MessageSegment, ModerationAction,
};
pub use youtube::transport::{HttpTransport, Transport};
