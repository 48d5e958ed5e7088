//! # Target モジュール
//!
//! 数え上げの対象となるターゲットエージェントを提供します。
//!
//! ターゲットは位置と軌道を持ちますが、センサーから観測可能な
//! 識別子は持ちません。IDはシミュレーションの帳簿管理専用であり、
//! センサーにも推定器にも渡されないことが不変条件です。

use crate::models::common::{AgentStatus, Position};
use crate::models::trajectory::{Step, Trajectory};

/// ターゲットエージェント
///
/// プレイグラウンド構築時に生成され、毎ティック自身の軌道を1歩進めます。
/// 有限軌道を使い切るとFinishedになり、以後は検知対象から除外されます。
#[derive(Debug, Clone)]
pub struct Target {
    /// 帳簿管理専用の識別子（センサーへは決して渡さない）
    pub id: String,
    /// 現在位置
    pub position: Position,
    /// このターゲットが所有する軌道生成器
    pub trajectory: Trajectory,
    /// 現在状態
    pub status: AgentStatus,
}

impl Target {
    /// 新しいターゲットを作成
    pub fn new(id: String, start: Position, trajectory: Trajectory) -> Self {
        Self {
            id,
            position: start,
            trajectory,
            status: AgentStatus::Active,
        }
    }

    /// 1ティック分の移動処理
    ///
    /// 軌道が枯渇した場合はFinishedに遷移し、位置は最終位置のまま保持します。
    pub fn advance(&mut self) {
        if self.status != AgentStatus::Active {
            return;
        }
        match self.trajectory.advance(self.position) {
            Step::Moved(p) => self.position = p,
            Step::Exhausted => self.status = AgentStatus::Finished,
        }
    }

    /// 検知対象として有効かどうか
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_line() {
        let mut t = Target::new(
            "T001".to_string(),
            Position::new(0.0, 0.0),
            Trajectory::line(Position::new(1.0, 0.0)),
        );
        t.advance();
        t.advance();
        assert_eq!(t.position, Position::new(2.0, 0.0));
        assert!(t.is_active());
    }

    #[test]
    fn test_finishes_on_exhausted_trajectory() {
        let mut t = Target::new(
            "T001".to_string(),
            Position::new(0.0, 0.0),
            Trajectory::waypoints(vec![Position::new(1.0, 1.0)]),
        );
        t.advance();
        assert_eq!(t.position, Position::new(1.0, 1.0));
        t.advance();
        assert_eq!(t.status, AgentStatus::Finished);
        // 最終位置は保持されるが、検知対象からは外れる
        assert_eq!(t.position, Position::new(1.0, 1.0));
        assert!(!t.is_active());
        // 以後のadvanceは何もしない
        t.advance();
        assert_eq!(t.status, AgentStatus::Finished);
    }
}
