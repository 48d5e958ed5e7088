mod estimator;
mod logging;
mod models;
mod scenario;
mod simulation;

use clap::{Arg, Command};
use estimator::EulerEstimator;
use logging::{init_logging, level_from_verbosity, LogConfig, LogOutput};
use models::common::Position;
use models::coverage::CoverageField;
use models::sensor::{Modality, Sensor};
use models::target::Target;
use models::trajectory::Trajectory;
use scenario::ScenarioConfig;
use simulation::SimulationEngine;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("countsim")
        .version("0.1.0")
        .about("ターゲット数え上げシミュレーション (Target Counting Playground)")
        .long_about("センサー群の被覆フィールドからターゲット数を推定する\n\
                     離散時間シミュレーションプレイグラウンドです。\n\
                     オイラー標数積分による位相的な数え上げを行います。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help("実行するシナリオファイル(.yaml)のパスを指定します。\n\
                           指定しない場合、利用方法の案内を表示します。")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
                .conflicts_with("test")
        )
        .arg(
            Arg::new("test")
                .short('t')
                .long("test")
                .action(clap::ArgAction::SetTrue)
                .help("コンポーネントモデルのテストを実行")
                .conflicts_with("info")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("log")
                .long("log")
                .value_name("OUTPUT")
                .help("ログ出力先 (console, file, both)")
        )
        .get_matches();

    println!("ターゲット数え上げシミュレーション - countsim v0.1.0");
    println!();

    // 詳細レベルの設定
    let verbose_level = matches.get_count("verbose");
    if verbose_level > 0 {
        println!("詳細出力レベル: {}", verbose_level);
    }

    // ログシステムの初期化
    let log_output = match matches.get_one::<String>("log") {
        Some(s) => match s.parse::<LogOutput>() {
            Ok(output) => output,
            Err(e) => {
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        },
        None => LogOutput::Console,
    };
    let log_config = LogConfig {
        level: level_from_verbosity(verbose_level),
        output: log_output,
        ..LogConfig::default()
    };
    if log_output != LogOutput::Console {
        if let Err(e) = logging::ensure_log_directory(&log_config.log_dir) {
            eprintln!("エラー: ログディレクトリを作成できません: {}", e);
            std::process::exit(1);
        }
    }
    if let Err(e) = init_logging(log_config) {
        eprintln!("エラー: ログ初期化に失敗しました: {}", e);
        std::process::exit(1);
    }

    // テストモードの実行
    if matches.get_flag("test") {
        println!("=== コンポーネントモデルテストモード ===");
        test_component_models();
        return;
    }

    // シナリオファイルの処理
    if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        match run_scenario(scenario_path, matches.get_flag("info"), verbose_level) {
            Ok(_) => {
                if verbose_level > 0 {
                    println!("シナリオ実行が正常に完了しました。");
                }
            }
            Err(e) => {
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        // デフォルト動作: 利用方法を表示
        show_default_help();
    }
}

/// コンポーネントモデルの作成と推定の動作確認
fn test_component_models() {
    println!("\n=== コンポーネントモデルのテスト ===");

    // ターゲットの作成
    let mut target = Target::new(
        "T001".to_string(),
        Position::new(2.0, 2.0),
        Trajectory::line(Position::new(0.5, 0.0)),
    );
    target.advance();
    println!(
        "ターゲットが作成されました: {} (位置: {:.1}, {:.1})",
        target.id, target.position.x, target.position.y
    );

    // 各モダリティのセンサー作成
    let disc_sensor = Sensor::new(
        "S001".to_string(),
        Position::new(3.0, 2.0),
        Modality::Disc { radius: 1.5 },
    );
    println!("円板センサーが作成されました: {}", disc_sensor.id);

    let decay_sensor = Sensor::new(
        "S002".to_string(),
        Position::new(3.5, 2.5),
        Modality::Decay {
            scale: 1.0,
            threshold: 0.2,
        },
    );
    println!("減衰センサーが作成されました: {}", decay_sensor.id);

    let arc_sensor = Sensor::new(
        "S003".to_string(),
        Position::new(0.0, 2.0),
        Modality::Arc {
            radius: 4.0,
            bearing: 0.0,
            half_angle: std::f64::consts::FRAC_PI_4,
        },
    );
    println!("扇形センサーが作成されました: {}", arc_sensor.id);

    // 観測と推定の実行
    let targets = vec![target.position];
    let readings: Result<Vec<_>, _> = [&disc_sensor, &decay_sensor, &arc_sensor]
        .iter()
        .map(|s| s.observe(&targets))
        .collect();
    match readings {
        Ok(readings) => {
            let detecting = readings.iter().filter(|r| r.count > 0).count();
            println!("観測完了: {}基中{}基が検知", readings.len(), detecting);

            let field = CoverageField::new(0, readings, None);
            let estimate = EulerEstimator::estimate(&field);
            println!("推定ターゲット数: {}", estimate.count);
        }
        Err(e) => {
            eprintln!("観測エラー: {}", e);
            std::process::exit(1);
        }
    }

    println!("\n全てのコンポーネントモデルが正常に動作しました！");
}

/// シナリオファイルを読み込んで実行
fn run_scenario(
    scenario_path: &str,
    info_only: bool,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    // シナリオファイルの読み込み
    let scenario = ScenarioConfig::from_file(scenario_path)?;

    if verbose_level > 0 {
        println!("シナリオファイル読み込み完了: {}", scenario_path);
    }

    // 情報表示のみの場合
    if info_only {
        scenario.print_summary();
        return Ok(());
    }

    // シナリオ実行
    execute_scenario(&scenario, verbose_level)?;

    Ok(())
}

/// シナリオの実行
fn execute_scenario(
    scenario: &ScenarioConfig,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    // 基本情報表示
    scenario.print_summary();
    println!();

    // シミュレーションエンジンの作成と実行
    let mut simulation = SimulationEngine::new(scenario, verbose_level)?;
    let records = simulation.run()?;

    // ティックごとの推定結果を表示
    println!();
    println!("=== 推定結果 ===");
    for record in records {
        match &record.estimate.quality {
            models::coverage::Quality::Undefined => {
                println!("ティック{:>4}: 推定 0 (被覆フィールドが空)", record.tick);
            }
            models::coverage::Quality::Graded {
                score, error_bound, ..
            } => {
                let flag = if record.estimate.quality.is_degraded() {
                    " ※位相的曖昧さあり"
                } else {
                    ""
                };
                println!(
                    "ティック{:>4}: 推定 {} (score: {:.3}, 誤差限界: {:.3}){}",
                    record.tick, record.estimate.count, score, error_bound, flag
                );
            }
        }
    }

    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  countsim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>  シナリオファイルを指定して実行");
    println!("  -i, --info             シナリオ情報のみ表示");
    println!("  -t, --test             コンポーネントモデルのテスト実行");
    println!("  -v, --verbose          詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log <OUTPUT>     ログ出力先 (console, file, both)");
    println!("  -h, --help             このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/scenario_static_discs.yaml   - 静止円板センサーの基本シナリオ");
    println!("  scenarios/scenario_mixed_modality.yaml - 混合モダリティシナリオ");
    println!("  scenarios/scenario_random_walk.yaml    - ランダムウォークシナリオ");
    println!();
    println!("例:");
    println!("  countsim -s scenarios/scenario_static_discs.yaml");
    println!("  countsim -s scenarios/scenario_mixed_modality.yaml -v");
    println!("  countsim -s scenarios/scenario_random_walk.yaml -i");
    println!("  countsim --test");
}
