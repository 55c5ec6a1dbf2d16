//! データセット準備の統合テスト
//!
//! 変換→分割→dataset.yaml を一時ディレクトリ上で通しで実行する

use image::{ImageFormat, RgbImage};
use std::collections::HashSet;
use std::path::Path;
use taco_sort::dataset::{
    load_annotations, prepare_dataset, split_dataset, subset_image_dir, subset_label_dir,
    unique_images, DatasetYaml, PrepareOptions, SplitConfig, Subset, DATASET_YAML_NAME,
};
use taco_sort::error::TacoSortError;
use tempfile::tempdir;

fn write_image(path: &Path, format: ImageFormat) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::new(16, 16).save_with_format(path, format).unwrap();
}

fn options(root: &Path, seed: u64) -> PrepareOptions {
    PrepareOptions {
        annotations_file: root.join("raw").join("annotations.json"),
        raw_dir: root.join("raw"),
        labels_dir: root.join("raw").join("labels"),
        output_dir: root.join("prepared"),
        val_ratio: 0.2,
        seed,
        keep_existing: false,
    }
}

fn file_stems(dir: &Path) -> HashSet<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            e.unwrap()
                .path()
                .file_stem()
                .unwrap()
                .to_string_lossy()
                .to_string()
        })
        .collect()
}

/// 10枚のデータセットを作る（0番だけボックスあり）
fn ten_image_dataset(root: &Path) {
    let mut images = Vec::new();
    for i in 0..10 {
        let file_name = format!("batch_{}/{:06}.jpg", i % 2, i);
        write_image(&root.join("raw").join(&file_name), ImageFormat::Jpeg);
        images.push(serde_json::json!({
            "id": i, "file_name": file_name, "width": 16, "height": 16
        }));
    }
    let coco = serde_json::json!({
        "images": images,
        "annotations": [{"image_id": 0, "category_id": 1, "bbox": [2, 2, 4, 4]}],
        "categories": [{"id": 1, "name": "Bottle", "supercategory": "Plastic"}]
    });
    std::fs::write(root.join("raw").join("annotations.json"), coco.to_string()).unwrap();
}

/// 2画像・片方だけボックスありのCOCO
#[test]
fn test_scenario_label_content() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_image(&root.join("raw/batch_1/000001.jpg"), ImageFormat::Jpeg);
    write_image(&root.join("raw/batch_1/000002.jpg"), ImageFormat::Jpeg);
    std::fs::write(
        root.join("raw/annotations.json"),
        r#"{
            "images": [
                {"id": 1, "file_name": "batch_1/000001.jpg", "width": 100, "height": 100},
                {"id": 2, "file_name": "batch_1/000002.jpg", "width": 100, "height": 100}
            ],
            "annotations": [{"image_id": 1, "category_id": 3, "bbox": [10, 10, 20, 20]}],
            "categories": [{"id": 3, "name": "Can", "supercategory": "Metal"}]
        }"#,
    )
    .unwrap();

    let summary = prepare_dataset(&options(root, 42)).unwrap();
    assert_eq!(summary.conversion.label_files, 2);
    assert_eq!(summary.conversion.non_empty, 1);

    let labels = root.join("raw/labels");
    let first = std::fs::read_to_string(labels.join("batch_1_000001.txt")).unwrap();
    assert_eq!(first.trim(), "3 0.2 0.2 0.2 0.2");
    let second = std::fs::read_to_string(labels.join("batch_1_000002.txt")).unwrap();
    assert!(second.is_empty());

    let yaml = DatasetYaml::load(&root.join("prepared").join(DATASET_YAML_NAME)).unwrap();
    assert_eq!(yaml.nc, 1);
    assert_eq!(yaml.class_name(3), "Can");
}

/// 10枚・比率0.2 → 学習8/検証2、同じシードなら同じ分割
#[test]
fn test_split_sizes_and_reproducibility() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    ten_image_dataset(root);

    let summary = prepare_dataset(&options(root, 7)).unwrap();
    assert_eq!(summary.split.train.images, 8);
    assert_eq!(summary.split.val.images, 2);
    assert_eq!(summary.skipped_count(), 0);

    let train_first = file_stems(&subset_image_dir(&root.join("prepared"), Subset::Train));
    let val_first = file_stems(&subset_image_dir(&root.join("prepared"), Subset::Val));

    // 再実行（前回の出力は消える）
    prepare_dataset(&options(root, 7)).unwrap();
    let train_second = file_stems(&subset_image_dir(&root.join("prepared"), Subset::Train));
    let val_second = file_stems(&subset_image_dir(&root.join("prepared"), Subset::Val));

    assert_eq!(train_first, train_second);
    assert_eq!(val_first, val_second);
    assert!(train_first.is_disjoint(&val_first));
    assert_eq!(train_first.len() + val_first.len(), 10);
}

/// 各サブセットで画像とラベルが1対1
#[test]
fn test_image_label_pairing() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    ten_image_dataset(root);
    prepare_dataset(&options(root, 1)).unwrap();

    for subset in [Subset::Train, Subset::Val] {
        let images = file_stems(&subset_image_dir(&root.join("prepared"), subset));
        let labels = file_stems(&subset_label_dir(&root.join("prepared"), subset));
        assert_eq!(images, labels, "{} の画像とラベルが一致しない", subset);
    }
}

/// PNGや大文字拡張子も .jpg として出力される
#[test]
fn test_mixed_extensions_are_standardized() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_image(&root.join("raw/a.PNG"), ImageFormat::Png);
    write_image(&root.join("raw/b.JPG"), ImageFormat::Jpeg);
    write_image(&root.join("raw/c.jpeg"), ImageFormat::Jpeg);
    std::fs::write(
        root.join("raw/annotations.json"),
        r#"{"images": [
            {"id": 1, "file_name": "a.PNG", "width": 16, "height": 16},
            {"id": 2, "file_name": "b.JPG", "width": 16, "height": 16},
            {"id": 3, "file_name": "c.jpeg", "width": 16, "height": 16}
        ]}"#,
    )
    .unwrap();

    let mut opts = options(root, 3);
    opts.val_ratio = 0.5;
    prepare_dataset(&opts).unwrap();

    let prepared = root.join("prepared");
    let mut outputs = Vec::new();
    for subset in [Subset::Train, Subset::Val] {
        for entry in std::fs::read_dir(subset_image_dir(&prepared, subset)).unwrap() {
            let path = entry.unwrap().path();
            assert_eq!(path.extension().unwrap(), "jpg");
            assert!(image::open(&path).is_ok());
            outputs.push(path.file_stem().unwrap().to_string_lossy().to_string());
        }
    }
    outputs.sort();
    assert_eq!(outputs, vec!["a", "b", "c"]);
}

/// 元画像が無い画像はスキップされ、他は処理される
#[test]
fn test_missing_source_image_is_skipped() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_image(&root.join("raw/present.jpg"), ImageFormat::Jpeg);
    std::fs::write(
        root.join("raw/annotations.json"),
        r#"{"images": [
            {"id": 1, "file_name": "present.jpg", "width": 16, "height": 16},
            {"id": 2, "file_name": "missing.jpg", "width": 16, "height": 16}
        ]}"#,
    )
    .unwrap();

    let mut opts = options(root, 5);
    opts.val_ratio = 0.5;
    let summary = prepare_dataset(&opts).unwrap();

    assert_eq!(summary.split.train.images + summary.split.val.images, 1);
    assert_eq!(
        summary
            .split
            .skipped
            .count_where(|e| matches!(e, TacoSortError::MissingSourceAsset(_))),
        1
    );
}

/// 単独の分割: ラベルの無い画像も空ラベル付きで配置される
#[test]
fn test_split_without_raw_label_writes_empty_label() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        write_image(&root.join("raw").join(name), ImageFormat::Jpeg);
    }
    std::fs::write(
        root.join("raw/annotations.json"),
        r#"{"images": [
            {"id": 1, "file_name": "a.jpg", "width": 16, "height": 16},
            {"id": 2, "file_name": "b.jpg", "width": 16, "height": 16},
            {"id": 3, "file_name": "c.jpg", "width": 16, "height": 16}
        ]}"#,
    )
    .unwrap();
    let labels = root.join("raw/labels");
    std::fs::create_dir_all(&labels).unwrap();
    std::fs::write(labels.join("a.txt"), "0 0.5 0.5 0.2 0.2\n").unwrap();
    std::fs::write(labels.join("b.txt"), "").unwrap();

    let coco = load_annotations(&root.join("raw/annotations.json")).unwrap();
    let images = unique_images(&coco);
    assert_eq!(images.len(), 3);

    let config = SplitConfig {
        raw_dir: root.join("raw"),
        labels_dir: labels,
        output_dir: root.join("prepared"),
        val_ratio: 0.5,
        seed: 11,
        keep_existing: false,
    };
    let summary = split_dataset(&images, &config).unwrap();
    assert_eq!(summary.train.images + summary.val.images, 3);
    assert_eq!(summary.train.labels_copied + summary.val.labels_copied, 1);
    assert_eq!(summary.train.empty_labels + summary.val.empty_labels, 2);
    assert!(summary.skipped.is_empty());

    let prepared = root.join("prepared");
    let subset = [Subset::Train, Subset::Val]
        .into_iter()
        .find(|s| subset_label_dir(&prepared, *s).join("c.txt").exists())
        .expect("c.txt がどちらかのサブセットにあるはず");
    let c_label = subset_label_dir(&prepared, subset).join("c.txt");
    assert!(std::fs::read_to_string(&c_label).unwrap().is_empty());
    assert!(subset_image_dir(&prepared, subset).join("c.jpg").is_file());
}

/// アノテーションファイルが無いのは致命的エラー
#[test]
fn test_missing_annotations_is_fatal() {
    let dir = tempdir().unwrap();
    let err = prepare_dataset(&options(dir.path(), 1)).unwrap_err();
    assert!(matches!(err, TacoSortError::FileNotFound(_)));
    assert!(!dir.path().join("prepared").exists());
}

/// 不正な比率は設定エラー
#[test]
fn test_invalid_val_ratio() {
    let dir = tempdir().unwrap();
    ten_image_dataset(dir.path());
    let mut opts = options(dir.path(), 1);
    opts.val_ratio = 1.0;
    assert!(matches!(prepare_dataset(&opts), Err(TacoSortError::Config(_))));
}
