//! # Scenario モジュール
//!
//! YAMLシナリオファイルの読み込み・検証・エージェント構築を提供します。
//!
//! ## 主要機能
//!
//! - シナリオファイルの読み込みとYAML解析
//! - 設定値の検証（実行前に構成エラーで必ず失敗させる）
//! - 設定からターゲット・センサーエージェント列への変換
//!
//! 構成の誤り（ゼロセンサー、非正のホライズン、次元不一致、領域外配置）は
//! シミュレーション開始前に検出します。黙って続行してはいけません。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::models::common::{math_utils, Position, RegionRect};
use crate::models::sensor::{Modality, Sensor};
use crate::models::target::Target;
use crate::models::trajectory::{self, Trajectory};

/// シナリオメタデータ
#[derive(Debug, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// 実行するティック数
    pub tick_horizon: u64,
    /// 乱数シード（再現性のため必須）
    pub seed: u64,
}

/// 世界設定
#[derive(Debug, Deserialize, Serialize)]
pub struct WorldConfig {
    pub region_rect: RegionRectConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RegionRectConfig {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

/// 軌道設定
///
/// 位置はすべて`[x, y]`の2要素配列です。要素数の不一致は
/// 検証エラーになります。
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrajectoryConfig {
    /// 静止
    Static,
    /// 等速直線運動
    Line { velocity: Vec<f64> },
    /// ウェイポイント列を順にたどる（有限軌道）
    Waypoints { points: Vec<Vec<f64>> },
    /// シードからの再現可能なランダムウォーク
    RandomWalk { step: f64 },
}

/// モダリティ設定
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModalityConfig {
    /// 2値円板
    Disc { radius: f64 },
    /// 減衰スカラー + 閾値
    Decay { scale: f64, threshold: f64 },
    /// 方位制限付き扇形
    Arc {
        radius: f64,
        bearing_deg: f64,
        half_angle_deg: f64,
    },
}

/// ターゲット設定
#[derive(Debug, Deserialize, Serialize)]
pub struct TargetConfig {
    pub id: String,
    pub position: Vec<f64>,
    pub trajectory: TrajectoryConfig,
}

/// センサー設定
#[derive(Debug, Deserialize, Serialize)]
pub struct SensorConfig {
    pub id: String,
    pub position: Vec<f64>,
    pub modality: ModalityConfig,
    /// 占有非依存モード（省略時はfalse）
    #[serde(default)]
    pub always_on: bool,
    /// 移動センサーの場合の軌道（省略時は静止）
    pub trajectory: Option<TrajectoryConfig>,
}

/// 完全なシナリオ設定
#[derive(Debug, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub world: WorldConfig,
    pub targets: Vec<TargetConfig>,
    pub sensors: Vec<SensorConfig>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        // ファイル読み込み
        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        // YAML解析
        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ScenarioError::ParseError(path.to_path_buf(), e))?;

        // 基本的な検証
        config.validate()?;

        Ok(config)
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        // 時間設定の検証
        if self.sim.tick_horizon == 0 {
            return Err(ScenarioError::ValidationError(
                "tick_horizon must be positive".to_string(),
            ));
        }

        // 座標範囲の検証
        let region = &self.world.region_rect;
        if region.xmin >= region.xmax || region.ymin >= region.ymax {
            return Err(ScenarioError::ValidationError(
                "Invalid region bounds".to_string(),
            ));
        }

        // センサーゼロのシナリオは意味を持たない
        if self.sensors.is_empty() {
            return Err(ScenarioError::ValidationError(
                "At least one sensor is required".to_string(),
            ));
        }

        // ID重複の検証
        let mut ids = std::collections::HashSet::new();
        for id in self
            .targets
            .iter()
            .map(|t| &t.id)
            .chain(self.sensors.iter().map(|s| &s.id))
        {
            if !ids.insert(id) {
                return Err(ScenarioError::ValidationError(format!(
                    "Duplicate agent id: {}",
                    id
                )));
            }
        }

        // ターゲットの検証
        for target in &self.targets {
            self.validate_position(&target.id, &target.position)?;
            Self::validate_trajectory(&target.id, &target.trajectory)?;
        }

        // センサーの検証
        for sensor in &self.sensors {
            self.validate_position(&sensor.id, &sensor.position)?;
            Self::validate_modality(&sensor.id, &sensor.modality)?;
            if let Some(trajectory) = &sensor.trajectory {
                Self::validate_trajectory(&sensor.id, trajectory)?;
            }
        }

        Ok(())
    }

    /// 位置配列の検証（次元数と領域内チェック）
    fn validate_position(&self, id: &str, position: &[f64]) -> Result<(), ScenarioError> {
        let p = Self::parse_position(id, position)?;
        let region = &self.world.region_rect;
        let rect = RegionRect::new(region.xmin, region.xmax, region.ymin, region.ymax);
        if !rect.contains(&p) {
            return Err(ScenarioError::ValidationError(format!(
                "{}: position ({}, {}) outside region bounds",
                id, p.x, p.y
            )));
        }
        Ok(())
    }

    /// 2要素の位置配列をPositionへ変換
    fn parse_position(id: &str, position: &[f64]) -> Result<Position, ScenarioError> {
        match position {
            [x, y] => Ok(Position::new(*x, *y)),
            _ => Err(ScenarioError::ValidationError(format!(
                "{}: position must have exactly 2 components, got {}",
                id,
                position.len()
            ))),
        }
    }

    fn validate_trajectory(id: &str, config: &TrajectoryConfig) -> Result<(), ScenarioError> {
        match config {
            TrajectoryConfig::Static => Ok(()),
            TrajectoryConfig::Line { velocity } => {
                if velocity.len() != 2 {
                    return Err(ScenarioError::ValidationError(format!(
                        "{}: velocity must have exactly 2 components, got {}",
                        id,
                        velocity.len()
                    )));
                }
                Ok(())
            }
            TrajectoryConfig::Waypoints { points } => {
                if points.is_empty() {
                    return Err(ScenarioError::ValidationError(format!(
                        "{}: waypoints must not be empty",
                        id
                    )));
                }
                for point in points {
                    if point.len() != 2 {
                        return Err(ScenarioError::ValidationError(format!(
                            "{}: waypoint must have exactly 2 components, got {}",
                            id,
                            point.len()
                        )));
                    }
                }
                Ok(())
            }
            TrajectoryConfig::RandomWalk { step } => {
                if *step <= 0.0 {
                    return Err(ScenarioError::ValidationError(format!(
                        "{}: random walk step must be positive",
                        id
                    )));
                }
                Ok(())
            }
        }
    }

    fn validate_modality(id: &str, config: &ModalityConfig) -> Result<(), ScenarioError> {
        match config {
            ModalityConfig::Disc { radius } => {
                if *radius <= 0.0 {
                    return Err(ScenarioError::ValidationError(format!(
                        "{}: disc radius must be positive",
                        id
                    )));
                }
            }
            ModalityConfig::Decay { scale, threshold } => {
                if *scale <= 0.0 {
                    return Err(ScenarioError::ValidationError(format!(
                        "{}: decay scale must be positive",
                        id
                    )));
                }
                if *threshold <= 0.0 || *threshold >= 1.0 {
                    return Err(ScenarioError::ValidationError(format!(
                        "{}: decay threshold must be in (0, 1)",
                        id
                    )));
                }
            }
            ModalityConfig::Arc {
                radius,
                half_angle_deg,
                ..
            } => {
                if *radius <= 0.0 {
                    return Err(ScenarioError::ValidationError(format!(
                        "{}: arc radius must be positive",
                        id
                    )));
                }
                if *half_angle_deg <= 0.0 || *half_angle_deg > 90.0 {
                    return Err(ScenarioError::ValidationError(format!(
                        "{}: arc half angle must be in (0, 90] degrees",
                        id
                    )));
                }
            }
        }
        Ok(())
    }

    /// シミュレーション領域
    pub fn bounds(&self) -> RegionRect {
        let region = &self.world.region_rect;
        RegionRect::new(region.xmin, region.xmax, region.ymin, region.ymax)
    }

    /// ターゲットエージェント列を構築
    pub fn build_targets(&self) -> Result<Vec<Target>, ScenarioError> {
        self.targets
            .iter()
            .map(|t| {
                let start = Self::parse_position(&t.id, &t.position)?;
                let trajectory = Self::build_trajectory(&t.id, &t.trajectory, self.sim.seed)?;
                Ok(Target::new(t.id.clone(), start, trajectory))
            })
            .collect()
    }

    /// センサーエージェント列を構築
    pub fn build_sensors(&self) -> Result<Vec<Sensor>, ScenarioError> {
        self.sensors
            .iter()
            .map(|s| {
                let position = Self::parse_position(&s.id, &s.position)?;
                let modality = Self::build_modality(&s.modality);
                let mut sensor = Sensor::new(s.id.clone(), position, modality);
                sensor.always_on = s.always_on;
                if let Some(config) = &s.trajectory {
                    sensor.trajectory =
                        Some(Self::build_trajectory(&s.id, config, self.sim.seed)?);
                }
                Ok(sensor)
            })
            .collect()
    }

    /// 軌道設定から軌道生成器を構築
    ///
    /// ランダムウォークはシナリオシードとエージェントIDから導出した
    /// 個別シードを使うため、同一シナリオの再実行は同一の軌道になります。
    fn build_trajectory(
        id: &str,
        config: &TrajectoryConfig,
        base_seed: u64,
    ) -> Result<Trajectory, ScenarioError> {
        match config {
            TrajectoryConfig::Static => Ok(Trajectory::Static),
            TrajectoryConfig::Line { velocity } => {
                let v = Self::parse_position(id, velocity)?;
                Ok(Trajectory::line(v))
            }
            TrajectoryConfig::Waypoints { points } => {
                let points = points
                    .iter()
                    .map(|p| Self::parse_position(id, p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Trajectory::waypoints(points))
            }
            TrajectoryConfig::RandomWalk { step } => Ok(Trajectory::random_walk(
                *step,
                trajectory::derive_seed(base_seed, id),
            )),
        }
    }

    fn build_modality(config: &ModalityConfig) -> Modality {
        match config {
            ModalityConfig::Disc { radius } => Modality::Disc { radius: *radius },
            ModalityConfig::Decay { scale, threshold } => Modality::Decay {
                scale: *scale,
                threshold: *threshold,
            },
            ModalityConfig::Arc {
                radius,
                bearing_deg,
                half_angle_deg,
            } => Modality::Arc {
                radius: *radius,
                bearing: math_utils::deg_to_rad(*bearing_deg),
                half_angle: math_utils::deg_to_rad(*half_angle_deg),
            },
        }
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("ティック数: {}", self.sim.tick_horizon);
        println!("シード値: {}", self.sim.seed);
        let region = &self.world.region_rect;
        println!(
            "領域: [{}, {}] × [{}, {}]",
            region.xmin, region.xmax, region.ymin, region.ymax
        );
        println!();

        println!("=== エージェント ===");
        println!("ターゲット: {}体", self.targets.len());
        println!("センサー: {}基", self.sensors.len());
        let always_on = self.sensors.iter().filter(|s| s.always_on).count();
        if always_on > 0 {
            println!("  うち占有非依存: {}基", always_on);
        }
        for sensor in &self.sensors {
            let kind = match &sensor.modality {
                ModalityConfig::Disc { radius } => format!("円板 r={}", radius),
                ModalityConfig::Decay { scale, threshold } => {
                    format!("減衰 scale={} threshold={}", scale, threshold)
                }
                ModalityConfig::Arc {
                    radius,
                    bearing_deg,
                    half_angle_deg,
                } => format!(
                    "扇形 r={} 方位={}° 半開き角={}°",
                    radius, bearing_deg, half_angle_deg
                ),
            };
            println!("  {}: {}", sensor.id, kind);
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug)]
pub enum ScenarioError {
    FileNotFound(std::path::PathBuf),
    IoError(std::path::PathBuf, std::io::Error),
    ParseError(std::path::PathBuf, serde_yaml::Error),
    ValidationError(String),
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioError::FileNotFound(path) => {
                write!(f, "シナリオファイルが見つかりません: {}", path.display())
            }
            ScenarioError::IoError(path, err) => {
                write!(f, "ファイル読み込みエラー {}: {}", path.display(), err)
            }
            ScenarioError::ParseError(path, err) => {
                write!(f, "YAML解析エラー {}: {}", path.display(), err)
            }
            ScenarioError::ValidationError(msg) => {
                write!(f, "設定検証エラー: {}", msg)
            }
        }
    }
}

impl std::error::Error for ScenarioError {}
