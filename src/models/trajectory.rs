//! # Trajectory モジュール
//!
//! エージェントとセンサーの軌道生成器を提供します。
//!
//! 軌道はティック番号から位置への写像ですが、無限列を先行評価せず、
//! 「状態 + 次位置」の明示的な生成器として表現します（遅延・再開可能）。
//! 有限軌道（ウェイポイント列）は地平を使い切ると枯渇し、
//! 確率的軌道（ランダムウォーク）はエージェントごとに所有する
//! シード付き乱数生成器から導出され、実行の再現性を保証します。
//!
//! 地平（ティック上限）の管理は軌道ではなくシミュレーションエンジンの責務です。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::common::Position;

/// 1ティック分の軌道前進の結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// 新しい位置へ移動（静止を含む）
    Moved(Position),
    /// 軌道を使い切った（有限軌道のみ）
    Exhausted,
}

/// 軌道生成器
///
/// 閉じたタグ付き直和です。すべての変種は`advance`で1ティックずつ
/// 位置を生成し、`reset`で初期状態に巻き戻せます。
#[derive(Debug, Clone)]
pub enum Trajectory {
    /// 静止（無限）
    Static,
    /// 等速直線運動（無限）
    Line {
        /// 1ティックあたりの変位（m/tick）
        velocity: Position,
    },
    /// ウェイポイント列を順に辿る（有限、1ティックに1点）
    Waypoints {
        points: Vec<Position>,
        cursor: usize,
    },
    /// シード付きランダムウォーク（無限）
    RandomWalk {
        /// 1ティックあたりの最大変位（m）
        step: f64,
        seed: u64,
        rng: StdRng,
    },
}

impl Trajectory {
    /// 等速直線軌道を作成
    pub fn line(velocity: Position) -> Self {
        Trajectory::Line { velocity }
    }

    /// ウェイポイント軌道を作成
    pub fn waypoints(points: Vec<Position>) -> Self {
        Trajectory::Waypoints { points, cursor: 0 }
    }

    /// ランダムウォーク軌道を作成
    ///
    /// # 引数
    ///
    /// * `step` - 1ティックあたりの最大変位（各軸±step/√2の一様乱数）
    /// * `seed` - この軌道専用のシード値
    pub fn random_walk(step: f64, seed: u64) -> Self {
        Trajectory::RandomWalk {
            step,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// 軌道を1ティック前進させる
    ///
    /// # 引数
    ///
    /// * `from` - 現在位置
    ///
    /// # 戻り値
    ///
    /// 次の位置、または有限軌道の枯渇
    pub fn advance(&mut self, from: Position) -> Step {
        match self {
            Trajectory::Static => Step::Moved(from),
            Trajectory::Line { velocity } => Step::Moved(from + *velocity),
            Trajectory::Waypoints { points, cursor } => {
                if *cursor < points.len() {
                    let p = points[*cursor];
                    *cursor += 1;
                    Step::Moved(p)
                } else {
                    Step::Exhausted
                }
            }
            Trajectory::RandomWalk { step, rng, .. } => {
                let scale = *step / std::f64::consts::SQRT_2;
                let dx = rng.gen_range(-scale..=scale);
                let dy = rng.gen_range(-scale..=scale);
                Step::Moved(from + Position::new(dx, dy))
            }
        }
    }

    /// 軌道を初期状態に巻き戻す
    ///
    /// ランダムウォークは保存したシードから乱数生成器を再構築するため、
    /// 巻き戻し後も同一の位置列を再生します。
    pub fn reset(&mut self) {
        match self {
            Trajectory::Static | Trajectory::Line { .. } => {}
            Trajectory::Waypoints { cursor, .. } => *cursor = 0,
            Trajectory::RandomWalk { seed, rng, .. } => {
                *rng = StdRng::seed_from_u64(*seed);
            }
        }
    }

    /// 有限軌道かどうか
    pub fn is_finite(&self) -> bool {
        matches!(self, Trajectory::Waypoints { .. })
    }
}

/// エージェントIDとシナリオのシード値から軌道用シードを導出
///
/// 同一シナリオ・同一IDなら常に同じシードになり、実行が再現可能です。
pub fn derive_seed(base_seed: u64, id: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    id.hash(&mut hasher);
    base_seed ^ hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_stays() {
        let mut t = Trajectory::Static;
        let p = Position::new(1.0, 2.0);
        assert_eq!(t.advance(p), Step::Moved(p));
    }

    #[test]
    fn test_line_advances() {
        let mut t = Trajectory::line(Position::new(1.0, -0.5));
        let mut p = Position::new(0.0, 0.0);
        for _ in 0..3 {
            match t.advance(p) {
                Step::Moved(next) => p = next,
                Step::Exhausted => panic!("直線軌道は枯渇しない"),
            }
        }
        assert_eq!(p, Position::new(3.0, -1.5));
    }

    #[test]
    fn test_waypoints_exhaust() {
        let mut t = Trajectory::waypoints(vec![
            Position::new(1.0, 0.0),
            Position::new(2.0, 0.0),
        ]);
        let p0 = Position::new(0.0, 0.0);
        assert_eq!(t.advance(p0), Step::Moved(Position::new(1.0, 0.0)));
        assert_eq!(t.advance(p0), Step::Moved(Position::new(2.0, 0.0)));
        assert_eq!(t.advance(p0), Step::Exhausted);
    }

    #[test]
    fn test_waypoints_reset() {
        let mut t = Trajectory::waypoints(vec![Position::new(5.0, 5.0)]);
        let p0 = Position::new(0.0, 0.0);
        assert_eq!(t.advance(p0), Step::Moved(Position::new(5.0, 5.0)));
        assert_eq!(t.advance(p0), Step::Exhausted);
        t.reset();
        assert_eq!(t.advance(p0), Step::Moved(Position::new(5.0, 5.0)));
    }

    #[test]
    fn test_random_walk_reproducible() {
        let p0 = Position::new(0.0, 0.0);
        let mut t1 = Trajectory::random_walk(0.5, 42);
        let mut t2 = Trajectory::random_walk(0.5, 42);
        for _ in 0..10 {
            assert_eq!(t1.advance(p0), t2.advance(p0));
        }
        // 巻き戻すと同じ列を再生する
        let first = t2.advance(p0);
        t2.reset();
        for _ in 0..10 {
            t2.advance(p0);
        }
        assert_eq!(t2.advance(p0), first);
    }

    #[test]
    fn test_random_walk_step_bound() {
        let mut t = Trajectory::random_walk(0.5, 7);
        let p0 = Position::new(0.0, 0.0);
        for _ in 0..100 {
            if let Step::Moved(p) = t.advance(p0) {
                assert!(p.distance_to(&p0) <= 0.5 + 1e-12);
            }
        }
    }

    #[test]
    fn test_derive_seed_stable() {
        assert_eq!(derive_seed(1, "T001"), derive_seed(1, "T001"));
        assert_ne!(derive_seed(1, "T001"), derive_seed(1, "T002"));
    }
}
