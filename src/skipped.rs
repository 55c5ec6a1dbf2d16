//! 回復可能エラーの記録
//!
//! バッチ処理では1件の失敗で全体を止めず、警告を出して次に進む。
//! 最後にスキップ件数をまとめて表示する。

use crate::error::TacoSortError;

#[derive(Debug)]
pub struct SkippedItem {
    /// 対象（ファイル名・行番号など）
    pub item: String,
    pub error: TacoSortError,
}

#[derive(Debug, Default)]
pub struct Skipped {
    items: Vec<SkippedItem>,
}

impl Skipped {
    pub fn new() -> Self {
        Self::default()
    }

    /// 警告ログを出して記録
    pub fn record(&mut self, item: impl Into<String>, error: TacoSortError) {
        let item = item.into();
        log::warn!("スキップ: {}: {}", item, error);
        self.items.push(SkippedItem { item, error });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SkippedItem> {
        self.items.iter()
    }

    /// 条件に合う件数
    pub fn count_where(&self, pred: impl Fn(&TacoSortError) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.error)).count()
    }

    pub fn extend(&mut self, other: Skipped) {
        self.items.extend(other.items);
    }

    /// 終了時のサマリー表示
    pub fn print_summary(&self, stage: &str) {
        if self.items.is_empty() {
            return;
        }
        println!("⚠ {}: {}件をスキップしました", stage, self.items.len());
        for item in &self.items {
            println!("  - {}: {}", item.item, item.error);
        }
    }
}
