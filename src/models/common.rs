use std::ops::{Add, Mul, Sub};

/// 幾何計算全体で共有する許容誤差
///
/// 接触判定・位相判定はすべてこの1つのεで行います。
/// 呼び出しごとに個別の許容値を使うことは禁止です。
pub const GEOM_EPS: f64 = 1e-9;

/// 2次元位置を表す構造体
///
/// プレイグラウンドの空間は2次元固定です。位置は不変な値型として扱い、
/// 距離計算と領域包含判定のみを提供します。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64, // m
    pub y: f64, // m
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 2点間のユークリッド距離を計算
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// 原点からの距離（ベクトル長）
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2)).sqrt()
    }

    /// X軸正方向を0とした方位角（ラジアン、-π〜π）
    pub fn bearing(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// 内積
    pub fn dot(&self, other: &Position) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// 外積のz成分（符号付き面積の2倍）
    pub fn cross(&self, other: &Position) -> f64 {
        self.x * other.y - self.y * other.x
    }
}

impl Add for Position {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Position {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Position {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

/// エージェントの状態を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentStatus {
    Active,   // アクティブ（移動・被検知の対象）
    Finished, // 軌道を使い切り停止（検知対象から除外）
}

/// 矩形のシミュレーション領域
///
/// 境界を含む閉領域として扱います。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRect {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl RegionRect {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self { xmin, xmax, ymin, ymax }
    }

    /// 位置が領域内（境界含む）かどうかを判定
    pub fn contains(&self, p: &Position) -> bool {
        p.x >= self.xmin - GEOM_EPS
            && p.x <= self.xmax + GEOM_EPS
            && p.y >= self.ymin - GEOM_EPS
            && p.y <= self.ymax + GEOM_EPS
    }
}

/// 数学ユーティリティ関数
pub mod math_utils {
    /// 度をラジアンに変換
    pub fn deg_to_rad(degrees: f64) -> f64 {
        degrees * std::f64::consts::PI / 180.0
    }

    /// ラジアンを度に変換
    pub fn rad_to_deg(radians: f64) -> f64 {
        radians * 180.0 / std::f64::consts::PI
    }

    /// 角度を-π〜πの範囲に正規化
    pub fn normalize_angle(angle_rad: f64) -> f64 {
        let two_pi = 2.0 * std::f64::consts::PI;
        let mut normalized = angle_rad % two_pi;
        if normalized > std::f64::consts::PI {
            normalized -= two_pi;
        } else if normalized <= -std::f64::consts::PI {
            normalized += two_pi;
        }
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let p = Position::new(0.0, 0.0);
        let q = Position::new(3.0, 4.0);
        assert_eq!(p.distance_to(&q), 5.0);
    }

    #[test]
    fn test_vector_ops() {
        let p = Position::new(1.0, 2.0);
        let q = Position::new(3.0, -1.0);
        assert_eq!(p + q, Position::new(4.0, 1.0));
        assert_eq!(p - q, Position::new(-2.0, 3.0));
        assert_eq!(p * 2.0, Position::new(2.0, 4.0));
        assert_eq!(p.dot(&q), 1.0);
        assert_eq!(p.cross(&q), -7.0);
    }

    #[test]
    fn test_rect_contains_boundary() {
        let rect = RegionRect::new(0.0, 10.0, 0.0, 10.0);
        // 閉領域なので境界点を含む
        assert!(rect.contains(&Position::new(0.0, 5.0)));
        assert!(rect.contains(&Position::new(10.0, 10.0)));
        assert!(!rect.contains(&Position::new(10.1, 5.0)));
    }

    #[test]
    fn test_normalize_angle() {
        use std::f64::consts::PI;
        assert!((math_utils::normalize_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!((math_utils::normalize_angle(-3.0 * PI) - PI).abs() < 1e-12);
        assert_eq!(math_utils::normalize_angle(0.5), 0.5);
    }
}
