//! 比較用の数値テーブル
//!
//! 予測ログの `class_distribution` をクラス毎の列に展開し、
//! 参照データと現行データを同じ列集合に揃える。

use crate::prediction::PredictionLogRecord;
use std::collections::{BTreeMap, BTreeSet};

/// クラス列の接頭辞
pub const CLASS_COLUMN_PREFIX: &str = "class_";
pub const COLUMN_NUM_BOXES: &str = "num_boxes_predicted";
pub const COLUMN_AVG_CONFIDENCE: &str = "avg_confidence";

/// 列指向の数値テーブル
///
/// 全列の長さは常に `rows` と等しい。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: usize,
    columns: BTreeMap<String, Vec<f64>>,
}

impl FeatureTable {
    /// 予測ログから作成
    ///
    /// 同じテーブル内で一部のレコードにしか出ないクラスは、出ないレコードを0で埋める。
    pub fn from_records(records: &[PredictionLogRecord]) -> Self {
        let rows = records.len();
        let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        if rows == 0 {
            return Self { rows, columns };
        }

        columns.insert(
            COLUMN_NUM_BOXES.to_string(),
            records.iter().map(|r| r.num_boxes_predicted as f64).collect(),
        );
        columns.insert(
            COLUMN_AVG_CONFIDENCE.to_string(),
            records.iter().map(|r| r.avg_confidence).collect(),
        );

        for (row, record) in records.iter().enumerate() {
            for (class_name, count) in &record.class_distribution {
                let column = columns
                    .entry(class_column(class_name))
                    .or_insert_with(|| vec![0.0; rows]);
                column[row] = *count as f64;
            }
        }

        Self { rows, columns }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_names(&self) -> BTreeSet<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// 指定列集合に揃える
    ///
    /// 無い列は0埋めで追加する。既存の列は削除も変更もしない。
    pub fn reindex(&mut self, columns: &BTreeSet<String>) {
        for name in columns {
            if !self.columns.contains_key(name) {
                self.columns.insert(name.clone(), vec![0.0; self.rows]);
            }
        }
    }
}

/// クラス名から列名を作る
pub fn class_column(class_name: &str) -> String {
    format!("{}{}", CLASS_COLUMN_PREFIX, class_name)
}

/// 2つのテーブルの列の和集合
pub fn column_union(a: &FeatureTable, b: &FeatureTable) -> BTreeSet<String> {
    let mut union = a.column_names();
    union.extend(b.column_names());
    union
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::LogTimestamp;

    fn record(boxes: u64, conf: f64, classes: &[(&str, u64)]) -> PredictionLogRecord {
        PredictionLogRecord {
            timestamp: LogTimestamp::default(),
            num_boxes_predicted: boxes,
            avg_confidence: conf,
            class_distribution: classes.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_from_records_flattens_classes() {
        let table = FeatureTable::from_records(&[
            record(2, 0.8, &[("Bottle", 2)]),
            record(1, 0.6, &[("Can", 1)]),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("class_Bottle"), Some(&[2.0, 0.0][..]));
        assert_eq!(table.column("class_Can"), Some(&[0.0, 1.0][..]));
        assert_eq!(table.column(COLUMN_NUM_BOXES), Some(&[2.0, 1.0][..]));
        assert_eq!(table.column(COLUMN_AVG_CONFIDENCE), Some(&[0.8, 0.6][..]));
    }

    #[test]
    fn test_class_named_like_base_column_does_not_collide() {
        let table = FeatureTable::from_records(&[record(1, 0.5, &[("avg_confidence", 1)])]);
        assert_eq!(table.column(COLUMN_AVG_CONFIDENCE), Some(&[0.5][..]));
        assert_eq!(table.column("class_avg_confidence"), Some(&[1.0][..]));
    }

    #[test]
    fn test_empty_records() {
        let table = FeatureTable::from_records(&[]);
        assert!(table.is_empty());
        assert!(table.column_names().is_empty());
    }

    #[test]
    fn test_reindex_adds_zero_columns_only() {
        let mut table = FeatureTable::from_records(&[record(1, 0.5, &[("A", 1)])]);
        let before = table.clone();
        let other = FeatureTable::from_records(&[record(1, 0.5, &[("B", 3)])]);

        let union = column_union(&table, &other);
        table.reindex(&union);

        assert_eq!(table.column_names(), union);
        assert_eq!(table.column("class_B"), Some(&[0.0][..]));
        for (name, values) in before.columns() {
            assert_eq!(table.column(name), Some(values));
        }
    }
}
