//! 参照データと現行データのスキーマ整合
//!
//! `class_distribution` をクラス列に展開し、両テーブルを列の和集合に揃える。
//! どちらかが0件なら比較はせず「データ不足」を返す。

use taco_sort_common::{column_union, FeatureTable, PredictionLogRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// 同じ列集合を持つ2テーブル
    Ready {
        reference: FeatureTable,
        current: FeatureTable,
    },
    /// どちらかが0件
    InsufficientData {
        reference_rows: usize,
        current_rows: usize,
    },
}

pub fn reconcile(reference: &[PredictionLogRecord], current: &[PredictionLogRecord]) -> Reconciled {
    if reference.is_empty() || current.is_empty() {
        return Reconciled::InsufficientData {
            reference_rows: reference.len(),
            current_rows: current.len(),
        };
    }

    let mut reference = FeatureTable::from_records(reference);
    let mut current = FeatureTable::from_records(current);

    let columns = column_union(&reference, &current);
    reference.reindex(&columns);
    current.reindex(&columns);

    Reconciled::Ready { reference, current }
}
