// 基本的なデータ型と数学ユーティリティ
pub mod common;

// 幾何プリミティブと領域演算
pub mod geometry;

// 各コンポーネントモデルの実装
pub mod trajectory;
pub mod target;
pub mod sensor;
pub mod coverage;

// 便利な re-export
pub use common::*;
pub use geometry::{GeometryError, Overlap, Region, TripleMeet};
pub use trajectory::{Step, Trajectory};
pub use target::Target;
pub use sensor::{Modality, Sensor, SensorReading};
pub use coverage::{CountEstimate, CoverageField, Quality, TickRecord};
