//! # Sensor モジュール
//!
//! 検知モダリティとセンサーエージェントを提供します。
//!
//! モダリティは相対位置から検知結果への純粋で状態を持たない写像です。
//! 閉じたタグ付き直和で表現し、`footprint`と`respond`の2つの能力だけを
//! 契約とするため、変種を追加してもセンサー・ターゲット・推定器の
//! いずれにも変更は不要です。
//!
//! ## スカラー応答の2値化規約
//!
//! 減衰型モダリティの応答 exp(-d/scale) はモダリティ内部で設定値
//! thresholdにより2値化し、実効半径 -scale·ln(threshold) の閉円板を
//! フットプリントとします。和集合・交差の位相計算は常に2値化後の
//! フットプリントに対して行います。

use crate::models::common::{math_utils, Position};
use crate::models::geometry::{GeometryError, Region};
use crate::models::trajectory::{Step, Trajectory};

/// 検知モダリティ
///
/// 検知ジオメトリと応答関数の不変な記述です。複数のセンサーから
/// 読み取り専用で共有できます。
#[derive(Debug, Clone, PartialEq)]
pub enum Modality {
    /// 2値円板: 距離が半径以下なら検知（閉円板）
    Disc { radius: f64 },
    /// 減衰スカラー: exp(-d/scale)を閾値で2値化
    Decay { scale: f64, threshold: f64 },
    /// 方位制限付き扇形: 方位±半開き角かつ半径以内なら検知
    Arc {
        radius: f64,
        /// 中心方位（ラジアン）
        bearing: f64,
        /// 方位からの半開き角（ラジアン、π/2以下）
        half_angle: f64,
    },
}

impl Modality {
    /// センサー位置に対する現在のフットプリント領域
    pub fn footprint(&self, at: Position) -> Result<Region, GeometryError> {
        match self {
            Modality::Disc { radius } => Region::disc(at, *radius),
            Modality::Decay { scale, threshold } => {
                Region::disc(at, Self::effective_radius(*scale, *threshold))
            }
            Modality::Arc {
                radius,
                bearing,
                half_angle,
            } => Region::sector(at, *radius, *bearing, *half_angle),
        }
    }

    /// ターゲット位置への応答値（0〜1）
    pub fn respond(&self, at: Position, target: Position) -> f64 {
        let d = at.distance_to(&target);
        match self {
            Modality::Disc { radius } => {
                if d <= *radius {
                    1.0
                } else {
                    0.0
                }
            }
            Modality::Decay { scale, .. } => (-d / scale).exp(),
            Modality::Arc {
                radius,
                bearing,
                half_angle,
            } => {
                let off = math_utils::normalize_angle((target - at).bearing() - bearing).abs();
                if d <= *radius && off <= *half_angle {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// ターゲットを検知するかどうか（2値化済み）
    pub fn detects(&self, at: Position, target: Position) -> bool {
        match self {
            Modality::Decay { threshold, .. } => self.respond(at, target) >= *threshold,
            _ => self.respond(at, target) >= 1.0,
        }
    }

    /// 減衰モダリティの実効検知半径
    pub fn effective_radius(scale: f64, threshold: f64) -> f64 {
        -scale * threshold.ln()
    }
}

/// センサーの1ティック分の読み取り
///
/// 推定器が受け取る唯一の入力です。ターゲットの真の位置やIDは含みません。
#[derive(Debug, Clone)]
pub struct SensorReading {
    /// 読み取り元センサーのID
    pub sensor_id: String,
    /// 現在のフットプリント（報告なしの場合はNone）
    pub footprint: Option<Region>,
    /// フットプリント内で検知したターゲット数
    pub count: u32,
}

/// センサーエージェント
///
/// モダリティを位置（移動する場合は自身の軌道）に束縛します。
/// ターゲットと異なり、センサーの位置・フットプリントは推定器から見えます。
#[derive(Debug, Clone)]
pub struct Sensor {
    /// センサーの一意識別子
    pub id: String,
    /// 現在位置
    pub position: Position,
    /// 移動センサーの場合の軌道生成器
    pub trajectory: Option<Trajectory>,
    /// 検知モダリティ
    pub modality: Modality,
    /// 占有非依存モード
    ///
    /// trueの場合、ターゲットを検知していなくても毎ティック
    /// フットプリントを報告します（カウントは0になりえます）。
    pub always_on: bool,
}

impl Sensor {
    /// 新しい静止センサーを作成
    pub fn new(id: String, position: Position, modality: Modality) -> Self {
        Self {
            id,
            position,
            trajectory: None,
            modality,
            always_on: false,
        }
    }

    /// 1ティック分の自己移動処理
    ///
    /// 自身の軌道が枯渇した場合はその場に留まります。
    pub fn advance(&mut self) {
        if let Some(trajectory) = &mut self.trajectory {
            if let Step::Moved(p) = trajectory.advance(self.position) {
                self.position = p;
            }
        }
    }

    /// 検知処理
    ///
    /// 渡されるのはアクティブなターゲットの位置スナップショットのみです。
    /// 2値モダリティでは、少なくとも1つのターゲットがフットプリント内に
    /// ある場合にのみ領域を報告します（実検知器の「何かがいる」報告を模倣）。
    /// 占有非依存モードでは常に報告し、カウント0を許容します。
    ///
    /// # 引数
    ///
    /// * `targets` - 移動処理後のターゲット位置スナップショット
    pub fn observe(&self, targets: &[Position]) -> Result<SensorReading, GeometryError> {
        let count = targets
            .iter()
            .filter(|t| self.modality.detects(self.position, **t))
            .count() as u32;

        let footprint = if count > 0 || self.always_on {
            Some(self.modality.footprint(self.position)?)
        } else {
            None
        };

        Ok(SensorReading {
            sensor_id: self.id.clone(),
            footprint,
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_disc_detects_boundary() {
        let m = Modality::Disc { radius: 1.0 };
        let at = Position::new(0.0, 0.0);
        assert!(m.detects(at, Position::new(0.5, 0.0)));
        // 閉領域: ちょうど半径上でも検知
        assert!(m.detects(at, Position::new(1.0, 0.0)));
        assert!(!m.detects(at, Position::new(1.001, 0.0)));
    }

    #[test]
    fn test_decay_threshold() {
        let m = Modality::Decay {
            scale: 1.0,
            threshold: 0.5,
        };
        let at = Position::new(0.0, 0.0);
        let r_eff = Modality::effective_radius(1.0, 0.5);
        assert!((r_eff - std::f64::consts::LN_2).abs() < 1e-12);
        assert!(m.detects(at, Position::new(r_eff - 0.01, 0.0)));
        assert!(!m.detects(at, Position::new(r_eff + 0.01, 0.0)));
        // フットプリントは実効半径の円板
        match m.footprint(at).unwrap() {
            Region::Disc { radius, .. } => assert!((radius - r_eff).abs() < 1e-12),
            other => panic!("円板ではない: {:?}", other),
        }
    }

    #[test]
    fn test_arc_detects_bearing() {
        let m = Modality::Arc {
            radius: 2.0,
            bearing: 0.0,
            half_angle: PI / 4.0,
        };
        let at = Position::new(0.0, 0.0);
        assert!(m.detects(at, Position::new(1.0, 0.5)));
        assert!(!m.detects(at, Position::new(1.0, 1.5))); // 角度範囲外
        assert!(!m.detects(at, Position::new(-1.0, 0.0))); // 背後
    }

    #[test]
    fn test_observe_reports_only_when_occupied() {
        let s = Sensor::new(
            "S001".to_string(),
            Position::new(0.0, 0.0),
            Modality::Disc { radius: 1.0 },
        );
        // ターゲットが範囲外なら報告なし
        let reading = s.observe(&[Position::new(5.0, 0.0)]).unwrap();
        assert!(reading.footprint.is_none());
        assert_eq!(reading.count, 0);
        // 範囲内なら全フットプリントを報告
        let reading = s.observe(&[Position::new(0.5, 0.0)]).unwrap();
        assert!(reading.footprint.is_some());
        assert_eq!(reading.count, 1);
    }

    #[test]
    fn test_observe_always_on() {
        let mut s = Sensor::new(
            "S001".to_string(),
            Position::new(0.0, 0.0),
            Modality::Disc { radius: 1.0 },
        );
        s.always_on = true;
        let reading = s.observe(&[]).unwrap();
        assert!(reading.footprint.is_some());
        assert_eq!(reading.count, 0);
    }

    #[test]
    fn test_observe_counts_multiple() {
        let s = Sensor::new(
            "S001".to_string(),
            Position::new(0.0, 0.0),
            Modality::Disc { radius: 1.0 },
        );
        let reading = s
            .observe(&[
                Position::new(0.1, 0.0),
                Position::new(0.0, 0.2),
                Position::new(3.0, 0.0),
            ])
            .unwrap();
        assert_eq!(reading.count, 2);
    }

    #[test]
    fn test_mobile_sensor_advances() {
        let mut s = Sensor::new(
            "S001".to_string(),
            Position::new(0.0, 0.0),
            Modality::Disc { radius: 1.0 },
        );
        s.trajectory = Some(Trajectory::line(Position::new(0.5, 0.0)));
        s.advance();
        assert_eq!(s.position, Position::new(0.5, 0.0));
    }

    #[test]
    fn test_negative_radius_surfaces_on_use() {
        let m = Modality::Disc { radius: -1.0 };
        assert!(m.footprint(Position::new(0.0, 0.0)).is_err());
    }
}
