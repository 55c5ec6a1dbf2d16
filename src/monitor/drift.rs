//! ドリフト検定
//!
//! 列毎の検定:
//! - 参照データが1000件以下: 2標本コルモゴロフ–スミルノフ検定（p < 0.05 でドリフト）
//! - それ以上: 参照の標準偏差で正規化したワッサースタイン距離（> 0.1 でドリフト）
//!
//! データセット全体の判定はドリフト列の割合が0.5以上かどうか。
//! 列毎の結果は判定の根拠ではなく参考情報。

use serde::{Deserialize, Serialize};
use taco_sort_common::table::{COLUMN_AVG_CONFIDENCE, COLUMN_NUM_BOXES};
use taco_sort_common::FeatureTable;

pub const KS_P_VALUE_THRESHOLD: f64 = 0.05;
pub const WASSERSTEIN_THRESHOLD: f64 = 0.1;
pub const LARGE_SAMPLE_SIZE: usize = 1000;
pub const DRIFT_SHARE: f64 = 0.5;

/// 常に個別に確認する列
pub const PRIMARY_COLUMNS: &[&str] = &[COLUMN_AVG_CONFIDENCE, COLUMN_NUM_BOXES];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatTest {
    Ks,
    Wasserstein,
}

impl std::fmt::Display for StatTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatTest::Ks => write!(f, "K-S p_value"),
            StatTest::Wasserstein => write!(f, "Wasserstein distance (normed)"),
        }
    }
}

/// 列毎の検定結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub column: String,
    pub stattest: StatTest,
    /// KSならp値、ワッサースタインなら正規化距離
    pub score: f64,
    pub threshold: f64,
    pub drift_detected: bool,
    pub reference_mean: f64,
    pub current_mean: f64,
}

/// データセット全体の結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDrift {
    pub dataset_drift: bool,
    pub drift_share: f64,
    pub number_of_columns: usize,
    pub number_of_drifted_columns: usize,
    pub share_of_drifted_columns: f64,
    pub columns: Vec<ColumnDrift>,
}

impl DatasetDrift {
    pub fn column(&self, name: &str) -> Option<&ColumnDrift> {
        self.columns.iter().find(|c| c.column == name)
    }

    /// 主要列の結果
    pub fn primary_columns(&self) -> Vec<&ColumnDrift> {
        PRIMARY_COLUMNS.iter().filter_map(|c| self.column(c)).collect()
    }
}

/// 整合済みテーブル同士でドリフトを検定
///
/// 列集合が異なる場合、参照側にだけある列を対象にし、現行側に無い列は0埋めとみなす。
pub fn detect_dataset_drift(reference: &FeatureTable, current: &FeatureTable) -> DatasetDrift {
    let zeros = vec![0.0; current.len()];
    let columns: Vec<ColumnDrift> = reference
        .columns()
        .map(|(name, ref_values)| {
            let cur_values = current.column(name).unwrap_or(zeros.as_slice());
            column_drift(name, ref_values, cur_values)
        })
        .collect();

    let number_of_columns = columns.len();
    let number_of_drifted_columns = columns.iter().filter(|c| c.drift_detected).count();
    let share_of_drifted_columns = if number_of_columns == 0 {
        0.0
    } else {
        number_of_drifted_columns as f64 / number_of_columns as f64
    };

    DatasetDrift {
        dataset_drift: number_of_columns > 0 && share_of_drifted_columns >= DRIFT_SHARE,
        drift_share: DRIFT_SHARE,
        number_of_columns,
        number_of_drifted_columns,
        share_of_drifted_columns,
        columns,
    }
}

/// 1列の検定
pub fn column_drift(name: &str, reference: &[f64], current: &[f64]) -> ColumnDrift {
    let (stattest, score, threshold, drift_detected) = if reference.len() <= LARGE_SAMPLE_SIZE {
        let d = ks_statistic(reference, current);
        let p = ks_p_value(d, reference.len(), current.len());
        (StatTest::Ks, p, KS_P_VALUE_THRESHOLD, p < KS_P_VALUE_THRESHOLD)
    } else {
        let norm = std_dev(reference).max(0.001);
        let score = wasserstein_distance(reference, current) / norm;
        (StatTest::Wasserstein, score, WASSERSTEIN_THRESHOLD, score > WASSERSTEIN_THRESHOLD)
    };

    ColumnDrift {
        column: name.to_string(),
        stattest,
        score,
        threshold,
        drift_detected,
        reference_mean: mean(reference),
        current_mean: mean(current),
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 母標準偏差
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// 2標本KS統計量（経験分布関数の最大差）
pub fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    let a = sorted(a);
    let b = sorted(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (n, m) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;

    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n - j as f64 / m).abs());
    }

    d
}

/// KS統計量の漸近p値
pub fn ks_p_value(d: f64, n: usize, m: usize) -> f64 {
    if n == 0 || m == 0 {
        return 1.0;
    }
    let en = ((n * m) as f64 / (n + m) as f64).sqrt();
    kolmogorov_q((en + 0.12 + 0.11 / en) * d)
}

/// コルモゴロフ分布の上側確率 Q(λ)
fn kolmogorov_q(lambda: f64) -> f64 {
    if lambda < 0.2 {
        return 1.0;
    }

    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut prev_term: f64 = 0.0;

    for j in 1..=100 {
        let jf = j as f64;
        let term = fac * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= 0.001 * prev_term || term.abs() <= 1.0e-8 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        prev_term = term.abs();
    }

    1.0
}

/// 1次元ワッサースタイン距離（経験分布関数の差の積分）
pub fn wasserstein_distance(a: &[f64], b: &[f64]) -> f64 {
    let a = sorted(a);
    let b = sorted(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut all: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    all.sort_by(|x, y| x.total_cmp(y));

    let (n, m) = (a.len() as f64, b.len() as f64);
    let mut distance = 0.0;

    for w in all.windows(2) {
        let dx = w[1] - w[0];
        if dx <= 0.0 {
            continue;
        }
        let fa = a.partition_point(|v| *v <= w[0]) as f64 / n;
        let fb = b.partition_point(|v| *v <= w[0]) as f64 / m;
        distance += (fa - fb).abs() * dx;
    }

    distance
}
