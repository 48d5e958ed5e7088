//! # Simulation モジュール
//!
//! ターゲット数え上げプレイグラウンドの中核となるシミュレーションエンジンを
//! 提供します。
//!
//! このモジュールは離散時間シミュレーションのメインループを管理し、
//! ターゲット・センサー・推定器の協調動作を制御します。ティックごとに
//! 全エージェントを固定順序で更新し、被覆フィールドを組み立てて推定を
//! 1回実行します。
//!
//! ## 主要機能
//!
//! - **シミュレーションループ管理**: ティック地平までの時間進行制御
//! - **エージェント統合管理**: ターゲット・センサーのライフサイクル管理
//! - **処理順序制御**: 決定的な更新順序（再現性の前提）
//! - **実行記録**: ティックごとのTickRecord生成と実行サマリー
//!
//! ## ティック処理順序
//!
//! 各ティックにおいて、以下の順序で処理が実行されます：
//!
//! 1. **ターゲット処理**: 全ターゲットの軌道前進と枯渇判定
//! 2. **センサー処理**: 移動センサーの前進と、移動後のターゲット位置の観測
//! 3. **フィールド組み立て**: 全読み取りからCoverageFieldを構築
//! 4. **推定**: 推定器を1回実行しTickRecordを生成
//!
//! 同一シード・同一シナリオの実行は同一のレコード列を生成します。
//! キャンセルはティック間でのみ検査され、ティックは常に完全に実行されます。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::estimator::EulerEstimator;
use crate::models::common::RegionRect;
use crate::models::coverage::{CoverageField, Quality, TickRecord};
use crate::models::sensor::Sensor;
use crate::models::target::Target;
use crate::scenario::ScenarioConfig;

/// エンジンの実行状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// 構築済み・未実行
    Initialized,
    /// ティック実行中
    Running,
    /// 地平到達またはキャンセルで終了
    Finished,
}

pub struct SimulationEngine {
    pub current_tick: u64,
    pub tick_horizon: u64,
    pub seed: u64,
    pub state: RunState,

    pub targets: Vec<Target>,
    pub sensors: Vec<Sensor>,
    pub bounds: RegionRect,

    pub records: Vec<TickRecord>,
    pub verbose_level: u8,

    /// ティック間でのみ検査されるキャンセルフラグ
    cancel: Arc<AtomicBool>,
}

impl SimulationEngine {
    /// 検証済みシナリオからエンジンを構築
    ///
    /// # 引数
    ///
    /// * `scenario` - 読み込み・検証済みのシナリオ設定
    /// * `verbose_level` - ログ詳細度（0〜3）
    pub fn new(
        scenario: &ScenarioConfig,
        verbose_level: u8,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let targets = scenario.build_targets()?;
        let sensors = scenario.build_sensors()?;

        if verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
            info!("  ターゲット: {}体", targets.len());
            info!("  センサー: {}基", sensors.len());
            info!("  ティック地平: {}", scenario.sim.tick_horizon);
        }
        if verbose_level > 1 {
            for sensor in &sensors {
                debug!(
                    "センサー初期化: {} (位置: {:.1}, {:.1})",
                    sensor.id, sensor.position.x, sensor.position.y
                );
            }
            for target in &targets {
                let horizon = if target.trajectory.is_finite() {
                    " [有限軌道]"
                } else {
                    ""
                };
                debug!(
                    "ターゲット初期化: {} (位置: {:.1}, {:.1}){}",
                    target.id, target.position.x, target.position.y, horizon
                );
            }
        }

        Ok(Self {
            current_tick: 0,
            tick_horizon: scenario.sim.tick_horizon,
            seed: scenario.sim.seed,
            state: RunState::Initialized,
            targets,
            sensors,
            bounds: scenario.bounds(),
            records: Vec::new(),
            verbose_level,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// キャンセルフラグのハンドルを取得
    ///
    /// 別スレッド（シグナルハンドラ等）からフラグを立てると、
    /// 実行中のティックの完了後に停止します。
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// 1ティック実行してレコードを返す
    ///
    /// 地平到達またはキャンセル後はNoneを返し、状態をFinishedにします。
    /// ティックの途中で中断されることはありません。
    pub fn step(&mut self) -> Result<Option<TickRecord>, Box<dyn std::error::Error>> {
        if self.state == RunState::Finished {
            return Ok(None);
        }
        if self.current_tick >= self.tick_horizon || self.cancel.load(Ordering::Relaxed) {
            self.state = RunState::Finished;
            return Ok(None);
        }
        self.state = RunState::Running;

        // 1. ターゲット処理: 全ターゲットの軌道前進
        for target in &mut self.targets {
            target.advance();
        }

        // 2. センサー処理: 前進してから移動後のターゲット位置を観測
        let positions: Vec<_> = self
            .targets
            .iter()
            .filter(|t| t.is_active())
            .map(|t| t.position)
            .collect();
        let mut readings = Vec::with_capacity(self.sensors.len());
        for sensor in &mut self.sensors {
            sensor.advance();
            readings.push(sensor.observe(&positions)?);
        }

        // 3. フィールド組み立てと 4. 推定
        let field = CoverageField::new(self.current_tick, readings, Some(self.bounds));
        let estimate = EulerEstimator::estimate(&field);

        if self.verbose_level > 2 {
            let peak_multiplicity = field
                .footprints()
                .iter()
                .map(|fp| field.multiplicity(&fp.interior_point()))
                .max()
                .unwrap_or(0);
            trace!(
                "ティック{}: アクティブターゲット{}体, 推定{}, 最大被覆多重度{}",
                self.current_tick,
                positions.len(),
                estimate.count,
                peak_multiplicity
            );
        }

        let record = TickRecord {
            tick: self.current_tick,
            readings: field.readings,
            estimate,
        };
        self.records.push(record.clone());
        self.current_tick += 1;

        if self.current_tick >= self.tick_horizon {
            self.state = RunState::Finished;
        }

        Ok(Some(record))
    }

    /// 地平までシミュレーションを実行
    ///
    /// # 戻り値
    ///
    /// 実行された全ティックのレコード列への参照
    pub fn run(&mut self) -> Result<&[TickRecord], Box<dyn std::error::Error>> {
        info!("=== シミュレーション実行開始 ===");

        while self.step()?.is_some() {
            if self.current_tick % 100 == 0 && self.verbose_level > 0 {
                let progress = (self.current_tick as f64 / self.tick_horizon as f64) * 100.0;
                info!(
                    "進行状況: {:.1}% ({}/{}ティック)",
                    progress, self.current_tick, self.tick_horizon
                );
            }
        }

        if self.cancel.load(Ordering::Relaxed) && self.current_tick < self.tick_horizon {
            info!("キャンセル要求によりティック{}で停止", self.current_tick);
        }

        self.log_summary();
        Ok(&self.records)
    }

    /// 実行サマリーをログ出力
    fn log_summary(&self) {
        info!("=== シミュレーション完了 ===");
        info!("実行ティック数: {}", self.records.len());

        let counts: Vec<i64> = self.records.iter().map(|r| r.estimate.count).collect();
        if !counts.is_empty() {
            let mean = counts.iter().sum::<i64>() as f64 / counts.len() as f64;
            let max = counts.iter().max().copied().unwrap_or(0);
            info!("推定値: 平均{:.2} / 最大{}", mean, max);
        }
        let undefined = self
            .records
            .iter()
            .filter(|r| r.estimate.quality == Quality::Undefined)
            .count();
        if undefined > 0 {
            info!("被覆フィールドが空だったティック: {}", undefined);
        }
    }
}
