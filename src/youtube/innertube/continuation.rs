//! continuationトークンの状態管理
//!
//! セッションが持つ唯一のcontinuationトークンと、フィードモード
//! （リプレイ / ライブ、上位チャットのみ）を保持し、ポーリングのたびに
//! レスポンスの`continuations`から次のトークンへ進める。

use std::time::Duration;

use serde::Serialize;

use super::json::JsonValue;
use super::query::JsonQuery;
use crate::youtube::errors::LiveChatError;

/// ポーリング間隔の最大値（30秒）
/// 極端に大きな値が返された場合のガード
const MAX_POLLING_INTERVAL_MS: u64 = 30000;

/// ポーリング間隔の最小値（500ms）
/// 極端に短い値によるサーバー過負荷を防止
const MIN_POLLING_INTERVAL_MS: u64 = 500;

/// タイムアウト値が返されなかった場合の間隔
const DEFAULT_POLLING_INTERVAL_MS: u64 = 1000;

/// Continuation種別
///
/// InnerTube APIは次のContinuationデータを返す:
/// - `invalidationContinuationData`: timeoutMsは推奨間隔
/// - `timedContinuationData`: timeoutMsは明示的な待機時間（厳守）
/// - `reloadContinuationData`: 再読み込み用
/// - `liveChatReplayContinuationData`: リプレイ用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContinuationType {
    Invalidation,
    Timed,
    Reload,
    Replay,
}

impl ContinuationType {
    /// ライブモードでの優先順位
    const LIVE_PRECEDENCE: [ContinuationType; 3] = [
        ContinuationType::Invalidation,
        ContinuationType::Timed,
        ContinuationType::Reload,
    ];

    fn data_key(&self) -> &'static str {
        match self {
            ContinuationType::Invalidation => "invalidationContinuationData",
            ContinuationType::Timed => "timedContinuationData",
            ContinuationType::Reload => "reloadContinuationData",
            ContinuationType::Replay => "liveChatReplayContinuationData",
        }
    }

    /// 実効的なポーリング間隔を計算
    ///
    /// - `Timed`: APIの値を使用（500ms〜30秒でガード）
    /// - それ以外: 値があればガード付きで使用、なければ1秒
    pub fn effective_timeout_ms(&self, api_timeout: Option<u64>) -> u64 {
        match (self, api_timeout) {
            (_, Some(timeout)) => timeout.clamp(MIN_POLLING_INTERVAL_MS, MAX_POLLING_INTERVAL_MS),
            (ContinuationType::Timed, None) => MIN_POLLING_INTERVAL_MS,
            _ => DEFAULT_POLLING_INTERVAL_MS,
        }
    }
}

/// 状態遷移: `Uninitialized → Bootstrapped → Polling`（`Ended`は配信情報の確認でのみ到達）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContinuationPhase {
    Uninitialized,
    Bootstrapped,
    Polling,
    Ended,
}

/// ポーリング開始時の判定結果
#[derive(Debug, PartialEq, Eq)]
pub enum PollStep<'a> {
    /// 初期化時に取得済みのため、今回は通信しない
    AlreadyFetched,
    /// このトークンでリクエストする
    Fetch(&'a str),
}

#[derive(Debug, Clone)]
pub struct ContinuationState {
    phase: ContinuationPhase,
    token: Option<String>,
    is_replay: bool,
    top_chat_only: bool,
    initial_data_available: bool,
    last_type: Option<ContinuationType>,
    timeout_ms: Option<u64>,
}

impl ContinuationState {
    pub fn new(top_chat_only: bool) -> Self {
        Self {
            phase: ContinuationPhase::Uninitialized,
            token: None,
            is_replay: false,
            top_chat_only,
            initial_data_available: false,
            last_type: None,
            timeout_ms: None,
        }
    }

    /// ページに埋め込まれた2つのcontinuationから初期トークンを選ぶ
    ///
    /// `selected: true`（上位チャット）を採用し、上位チャットのみでなければ
    /// `selected: false`（すべてのチャット）で上書きする。
    pub fn select_initial(
        top_chat: Option<&str>,
        all_chat: Option<&str>,
        top_chat_only: bool,
    ) -> Option<String> {
        let mut selected = top_chat;
        if !top_chat_only && all_chat.is_some() {
            selected = all_chat;
        }
        selected.map(str::to_string)
    }

    /// 初期化完了。直後の1回のポーリングは通信せずに終わる
    pub fn bootstrap(&mut self, token: String, is_replay: bool) {
        log::debug!(
            "Continuation bootstrapped (replay: {}, length: {})",
            is_replay,
            token.len()
        );
        self.token = Some(token);
        self.is_replay = is_replay;
        self.phase = ContinuationPhase::Bootstrapped;
        self.initial_data_available = true;
        self.last_type = None;
        self.timeout_ms = None;
    }

    /// ポーリングを開始できるか判定する
    pub fn begin_poll(&mut self) -> Result<PollStep<'_>, LiveChatError> {
        match self.phase {
            ContinuationPhase::Ended => return Err(LiveChatError::BroadcastEnded),
            ContinuationPhase::Uninitialized => return Err(LiveChatError::MissingContinuation),
            ContinuationPhase::Bootstrapped | ContinuationPhase::Polling => {}
        }
        if self.initial_data_available {
            self.initial_data_available = false;
            return Ok(PollStep::AlreadyFetched);
        }
        let token = self
            .token
            .as_deref()
            .ok_or(LiveChatError::MissingContinuation)?;
        self.phase = ContinuationPhase::Polling;
        Ok(PollStep::Fetch(token))
    }

    /// レスポンスの`continuations`から次のトークンへ進める
    ///
    /// リストに複数のエントリがある場合は後のものが優先される。
    pub fn advance(&mut self, response: &JsonValue) {
        let Some(continuations) = response.get_list(
            "continuations",
            &["continuationContents", "liveChatContinuation"],
        ) else {
            log::warn!("No continuations found in response");
            return;
        };

        for continuation in continuations {
            if self.is_replay {
                let data = continuation.get_map(&[ContinuationType::Replay.data_key()]);
                if let Some(value) = data.get_str("continuation") {
                    self.token = Some(value.to_string());
                    self.record(ContinuationType::Replay, data.get_value("timeUntilLastMessageMsec"));
                }
            } else {
                let found = ContinuationType::LIVE_PRECEDENCE.iter().find_map(|kind| {
                    let data = continuation.get_map(&[kind.data_key()]);
                    data.get_str("continuation")
                        .map(|value| (*kind, value, data.get_value("timeoutMs")))
                });
                match found {
                    Some((kind, value, timeout)) => {
                        self.token = Some(value.to_string());
                        self.record(kind, timeout);
                    }
                    None => {
                        log::warn!("Continuation entry carries no usable token");
                        self.token = None;
                    }
                }
            }
        }
    }

    fn record(&mut self, kind: ContinuationType, timeout: Option<&JsonValue>) {
        self.last_type = Some(kind);
        self.timeout_ms = timeout.and_then(|value| match value {
            JsonValue::String(s) => s.parse::<u64>().ok(),
            other => other.as_i64().and_then(|n| u64::try_from(n).ok()),
        });
    }

    /// 配信終了を確認した
    pub fn mark_ended(&mut self) {
        log::info!("Live chat marked as ended");
        self.phase = ContinuationPhase::Ended;
    }

    /// 再初期化のために状態を破棄する
    pub fn reset(&mut self) {
        self.phase = ContinuationPhase::Uninitialized;
        self.token = None;
        self.is_replay = false;
        self.initial_data_available = false;
        self.last_type = None;
        self.timeout_ms = None;
    }

    pub fn phase(&self) -> ContinuationPhase {
        self.phase
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_replay(&self) -> bool {
        self.is_replay
    }

    pub fn top_chat_only(&self) -> bool {
        self.top_chat_only
    }

    pub fn last_type(&self) -> Option<ContinuationType> {
        self.last_type
    }

    /// 次回ポーリングまでの推奨待機時間
    pub fn suggested_poll_interval(&self) -> Duration {
        let millis = match self.last_type {
            Some(kind) => kind.effective_timeout_ms(self.timeout_ms),
            None => DEFAULT_POLLING_INTERVAL_MS,
        };
        Duration::from_millis(millis)
    }
}
