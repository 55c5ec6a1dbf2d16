use anyhow::Context;
use clap::Parser;
use taco_sort::{cli, config, dataset, detector, monitor, serve, verify};
use cli::{Cli, Commands};
use config::Config;
use detector::{CommandDetector, DetectParams, Detector, ModelHandle};

/// 致命的エラー
const EXIT_FATAL: i32 = 1;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ エラー: {:#}", e);
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

/// 設定された検出器を作る（未設定なら None）
fn load_detector(config: &Config) -> anyhow::Result<Option<Box<dyn Detector>>> {
    match config.get_detector_command() {
        Some(command) => Ok(Some(Box::new(CommandDetector::new(&command)?))),
        None => Ok(None),
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = Config::load().context("設定ファイルを読み込めません")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::Prepare { annotations, raw_dir, output, val_ratio, seed, keep_existing } => {
            println!("🗑 taco-sort - データセット準備\n");

            let options = dataset::PrepareOptions {
                annotations_file: annotations.unwrap_or_else(|| config.annotations_file()),
                raw_dir: raw_dir.unwrap_or_else(|| config.raw_dir()),
                labels_dir: config.raw_labels_dir(),
                output_dir: output.unwrap_or_else(|| config.prepared_dir()),
                val_ratio: val_ratio.unwrap_or(config.val_ratio),
                seed: seed.unwrap_or(config.seed),
                keep_existing,
            };
            let summary = dataset::prepare_dataset(&options)?;

            summary.conversion.skipped.print_summary("変換");
            summary.split.skipped.print_summary("分割");
            println!("\n✅ 準備完了（スキップ{}件）", summary.skipped_count());
        }

        Commands::Convert { annotations, output } => {
            println!("🗑 taco-sort - COCO → YOLO 変換\n");

            let annotations = annotations.unwrap_or_else(|| config.annotations_file());
            let labels_dir = output.unwrap_or_else(|| config.raw_labels_dir());

            let coco = dataset::load_annotations(&annotations)
                .with_context(|| format!("アノテーションを読み込めません: {}", annotations.display()))?;
            let summary = dataset::convert_coco_to_yolo(&coco, &labels_dir)?;

            println!(
                "✔ ラベル{}件・ボックス{}件: {}",
                summary.label_files,
                summary.boxes,
                labels_dir.display()
            );
            summary.skipped.print_summary("変換");
            println!("\n✅ 変換完了");
        }

        Commands::Split { annotations, raw_dir, labels, output, val_ratio, seed, keep_existing } => {
            println!("🗑 taco-sort - 学習/検証分割\n");

            let annotations = annotations.unwrap_or_else(|| config.annotations_file());
            let labels_dir = labels.unwrap_or_else(|| config.raw_labels_dir());
            let output_dir = output.unwrap_or_else(|| config.prepared_dir());

            let coco = dataset::load_annotations(&annotations)
                .with_context(|| format!("アノテーションを読み込めません: {}", annotations.display()))?;
            let images = dataset::unique_images(&coco);
            if images.len() < coco.images.len() {
                log::warn!(
                    "ベース名が重複する画像{}件を除外しました",
                    coco.images.len() - images.len()
                );
            }

            let split_config = dataset::SplitConfig {
                raw_dir: raw_dir.unwrap_or_else(|| config.raw_dir()),
                labels_dir,
                output_dir: output_dir.clone(),
                val_ratio: val_ratio.unwrap_or(config.val_ratio),
                seed: seed.unwrap_or(config.seed),
                keep_existing,
            };
            let summary = dataset::split_dataset(&images, &split_config)?;

            let yaml_path = output_dir.join(dataset::DATASET_YAML_NAME);
            dataset::DatasetYaml::new(&output_dir, coco.class_names()).save(&yaml_path)?;

            summary.skipped.print_summary("分割");
            println!("✔ {}", yaml_path.display());
            println!("\n✅ 分割完了");
        }

        Commands::Verify { dataset: dataset_dir, count, seed, output, font } => {
            println!("🗑 taco-sort - ラベル検証\n");

            let options = verify::VerifyOptions {
                dataset_dir: dataset_dir.unwrap_or_else(|| config.prepared_dir()),
                output_dir: output.unwrap_or_else(|| config.verification_dir()),
                count,
                seed,
                font: font.or_else(|| config.font_path.clone()),
            };
            let summary = verify::verify_labels(&options)?;

            summary.skipped.print_summary("検証");
            println!(
                "\n✅ {}枚を保存: {}",
                summary.saved.len(),
                options.output_dir.display()
            );
        }

        Commands::Reference { images, output, conf, iou } => {
            println!("🗑 taco-sort - 参照データ作成\n");

            let params = DetectParams::new(conf.unwrap_or(config.confidence), iou.unwrap_or(config.iou))?;
            let detector = load_detector(&config)?.context(format!(
                "検出器が設定されていません（config --set-detector または {}）",
                config::DETECTOR_ENV
            ))?;
            let model = ModelHandle::new(detector);
            let images_dir = images.unwrap_or_else(|| {
                dataset::subset_image_dir(&config.prepared_dir(), dataset::Subset::Val)
            });
            let output = output.unwrap_or_else(|| config.reference_file());

            println!("[1/1] 推論中: {}", images_dir.display());
            let summary = monitor::generate_reference(&model, &images_dir, &output, &params)?;

            summary.skipped.print_summary("推論");
            println!(
                "\n✅ {}/{}枚の結果を保存: {}",
                summary.records,
                summary.images,
                output.display()
            );
        }

        Commands::Serve { bind, log } => {
            println!("🗑 taco-sort - 推論API\n");

            let model = load_detector(&config)?.map(ModelHandle::shared);
            let prediction_log = monitor::PredictionLog::new(log.unwrap_or_else(|| config.prediction_log_file()));
            let bind = bind.unwrap_or_else(|| config.bind.clone());

            let state = serve::AppState::new(model, prediction_log)?;
            serve::serve(&bind, state)
                .await
                .with_context(|| format!("推論APIを起動できません: {}", bind))?;
        }

        Commands::Monitor { reference, current, report } => {
            println!("🗑 taco-sort - ドリフト監視\n");

            let options = monitor::MonitorOptions {
                reference: reference.unwrap_or_else(|| config.reference_file()),
                current: current.unwrap_or_else(|| config.prediction_log_file()),
                report: report.unwrap_or_else(|| config.drift_report_file()),
            };
            let outcome = monitor::run_monitor(&options)?;

            match &outcome {
                monitor::MonitorOutcome::InsufficientData { .. } => {
                    println!("\n⚠ データ不足のため比較しませんでした");
                }
                monitor::MonitorOutcome::Completed { report, .. } if report.drift_detected() => {
                    println!("\n⚠ ドリフトを検出しました");
                }
                monitor::MonitorOutcome::Completed { .. } => {
                    println!("\n✅ ドリフトなし");
                }
            }
            return Ok(outcome.exit_code());
        }

        Commands::Config { set_detector, show } => {
            if let Some(command) = set_detector {
                config.set_detector_command(&command)?;
                println!("✔ 検出器コマンドを設定しました");
            }

            if show {
                println!("設定:");
                println!("  データディレクトリ: {}", config.data_dir.display());
                println!("  検証データ比率: {}", config.val_ratio);
                println!("  乱数シード: {}", config.seed);
                println!(
                    "  検出器: {}",
                    config
                        .get_detector_command()
                        .map(|c| c.join(" "))
                        .unwrap_or_else(|| "未設定".into())
                );
                println!("  信頼度しきい値: {}", config.confidence);
                println!("  IoUしきい値: {}", config.iou);
                println!("  待ち受けアドレス: {}", config.bind);
                println!(
                    "  フォント: {}",
                    config
                        .font_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "自動検出".into())
                );
            }
        }
    }

    Ok(0)
}
