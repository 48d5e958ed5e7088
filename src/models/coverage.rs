//! # Coverage モジュール
//!
//! ティックごとの被覆フィールドと、推定結果の値型を提供します。
//!
//! 被覆フィールドは現在センサーが報告しているフットプリントの集まり
//! （多重度付き和集合）で、推定器の唯一の入力です。毎ティック作り直され、
//! 永続化されません。ターゲットの真の位置・IDは決して含みません。

use crate::models::common::{Position, RegionRect};
use crate::models::geometry::Region;
use crate::models::sensor::SensorReading;

/// 1ティック分の被覆フィールド
///
/// 全センサー読み取りの集約です。推定器はこれ以外の入力を必要としません
/// （ターゲット数や真位置を要求することは問題設定への違反です）。
#[derive(Debug, Clone)]
pub struct CoverageField {
    /// ティック番号
    pub tick: u64,
    /// 全センサーの読み取り（報告なしのセンサーも含む）
    pub readings: Vec<SensorReading>,
    /// シミュレーション領域（境界露出の算定に使用）
    pub bounds: Option<RegionRect>,
}

impl CoverageField {
    /// センサー読み取り列から被覆フィールドを組み立てる
    pub fn new(tick: u64, readings: Vec<SensorReading>, bounds: Option<RegionRect>) -> Self {
        Self {
            tick,
            readings,
            bounds,
        }
    }

    /// 現在フットプリントを報告しているセンサーの読み取り
    pub fn active(&self) -> Vec<&SensorReading> {
        self.readings
            .iter()
            .filter(|r| r.footprint.is_some())
            .collect()
    }

    /// 指定点を覆っているセンサーの数（被覆多重度）
    pub fn multiplicity(&self, p: &Position) -> usize {
        self.readings
            .iter()
            .filter_map(|r| r.footprint.as_ref())
            .filter(|fp| fp.contains(p))
            .count()
    }

    /// アクティブなフットプリント領域の一覧
    pub fn footprints(&self) -> Vec<&Region> {
        self.readings
            .iter()
            .filter_map(|r| r.footprint.as_ref())
            .collect()
    }
}

/// 推定の品質指標
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quality {
    /// 被覆フィールドが空で信頼区間が定義できない
    ///
    /// 「検知ゼロ」と「確信を持った0」を区別するため、明示的に
    /// フラグ付けします。偽の高信頼0として報告してはいけません。
    Undefined,
    /// 信頼度付きの推定
    Graded {
        /// 位相判定の確からしさ（0〜1、1.0が最大）
        ///
        /// 許容誤差ぎりぎりの接触（位相的曖昧さ）があるたびに低下します。
        score: f64,
        /// 上振れバイアスの推定誤差限界（0〜1）
        ///
        /// 単一センサーにのみ覆われた境界の周長割合です。被覆の隙間が
        /// 1つのターゲットを複数成分に分裂させうる度合いを表します。
        error_bound: f64,
        /// 許容誤差内の接触と判定されたペア・三つ組の数
        ambiguities: usize,
    },
}

impl Quality {
    /// 位相的曖昧さで信頼度が劣化しているか
    pub fn is_degraded(&self) -> bool {
        match self {
            Quality::Undefined => true,
            Quality::Graded {
                ambiguities, ..
            } => *ambiguities > 0,
        }
    }
}

/// ターゲット数の推定結果
///
/// 推定器が1ティックに1回生成する不変の値です。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountEstimate {
    /// 推定ターゲット数（オイラー標数積分値）
    pub count: i64,
    /// 品質指標（点推定と分離して必ず併記する）
    pub quality: Quality,
}

/// ティックごとの出力レコード
///
/// 外部の協調コンポーネント（描画、ログ、ノートブック）が消費する
/// 唯一の成果物です。コアはこれの描画・保存方法に依存しません。
#[derive(Debug, Clone)]
pub struct TickRecord {
    /// ティック番号
    pub tick: u64,
    /// 全センサーの読み取り
    pub readings: Vec<SensorReading>,
    /// 推定結果
    pub estimate: CountEstimate,
}
