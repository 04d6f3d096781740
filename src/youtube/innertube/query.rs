//! 汎用JSONツリーへの安全なパス検索
//!
//! どの検索も失敗しない。途中のキーが見つからなければ`None`（またはデフォルト値）を返すので、
//! パーサー側では`?`や`unwrap_or_default`で欠損フィールドを吸収できる。

use super::json::{JsonMap, JsonValue};

/// 混在パスの要素（マッピングのキー、またはリストのインデックス）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKey<'k> {
    Key(&'k str),
    Index(usize),
}

impl<'k> From<&'k str> for PathKey<'k> {
    fn from(key: &'k str) -> Self {
        PathKey::Key(key)
    }
}

impl From<usize> for PathKey<'_> {
    fn from(index: usize) -> Self {
        PathKey::Index(index)
    }
}

/// ツリーのライフタイム`'a`を保ったままチェーンできる検索インターフェース
///
/// `&JsonMap` / `&JsonValue` とそれらの`Option`に実装されているため、
/// `renderer.get_map(&["authorName"]).get_str("simpleText")` のように書ける。
pub trait JsonQuery<'a>: Sized {
    /// 起点となるマッピング（マッピングでなければ`None`）
    fn as_map(self) -> Option<&'a JsonMap>;

    /// 文字列キーで順にマッピングを辿る
    fn get_map(self, keys: &[&str]) -> Option<&'a JsonMap> {
        let mut map = self.as_map()?;
        for key in keys {
            map = map.get(*key)?.as_object()?;
        }
        Some(map)
    }

    /// キーとインデックスが混在したパスを辿る
    ///
    /// インデックスは直前のキーで解決されたリストに対して適用される
    /// （例: `continuations[0].liveChatReplayContinuationData`）。
    fn get_map_at(self, path: &[PathKey<'_>]) -> Option<&'a JsonMap> {
        let mut map = Some(self.as_map()?);
        let mut list: Option<&'a Vec<JsonValue>> = None;
        for key in path {
            match key {
                PathKey::Key(key) => match map?.get(*key)? {
                    JsonValue::Array(items) => {
                        list = Some(items);
                        map = None;
                    }
                    other => {
                        map = Some(other.as_object()?);
                        list = None;
                    }
                },
                PathKey::Index(index) => {
                    map = Some(list?.get(*index)?.as_object()?);
                    list = None;
                }
            }
        }
        map
    }

    /// `path`で解決したマッピングから`list_key`のリストを取得する
    fn get_list(self, list_key: &str, path: &[&str]) -> Option<&'a Vec<JsonValue>> {
        self.get_map(path)?.get(list_key)?.as_array()
    }

    fn get_value(self, key: &str) -> Option<&'a JsonValue> {
        self.as_map()?.get(key)
    }

    /// 文字列値（存在しない、または文字列でなければ`None`）
    fn get_str(self, key: &str) -> Option<&'a str> {
        self.get_value(key)?.as_str()
    }

    /// 真偽値（存在しなければ`false`）
    fn get_bool(self, key: &str) -> bool {
        self.get_value(key)
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }

    /// 整数値（存在しなければ`0`、小数は切り捨て）
    fn get_i64(self, key: &str) -> i64 {
        self.get_value(key)
            .and_then(JsonValue::as_i64)
            .unwrap_or(0)
    }
}

impl<'a> JsonQuery<'a> for &'a JsonMap {
    fn as_map(self) -> Option<&'a JsonMap> {
        Some(self)
    }
}

impl<'a> JsonQuery<'a> for Option<&'a JsonMap> {
    fn as_map(self) -> Option<&'a JsonMap> {
        self
    }
}

impl<'a> JsonQuery<'a> for &'a JsonValue {
    fn as_map(self) -> Option<&'a JsonMap> {
        self.as_object()
    }
}

impl<'a> JsonQuery<'a> for Option<&'a JsonValue> {
    fn as_map(self) -> Option<&'a JsonMap> {
        self.and_then(JsonValue::as_object)
    }
}
