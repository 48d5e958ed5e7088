//! # Estimator モジュール
//!
//! オイラー標数積分によるターゲット数推定器を提供します。
//!
//! 被覆フィールド（センサーフットプリントの多重度付き和集合）から、
//! フットプリント同士の重なり構造を神経複体（nerve）として構築し、
//! 各センサーの観測カウントを複体上でオイラー積分することで
//! ターゲット数を推定します。
//!
//! ## アルゴリズム
//!
//! 1. 頂点 = 現在報告中のフットプリント
//! 2. 辺 = 交差するペア（閉領域の意味論: 接触も連結として扱う）
//! 3. 三角形 = さらに3領域の共通交差を要求する（Čech複体）。
//!    ペア交差のみの複体では「3円のリング」のような穴のある配置の
//!    標数を誤るため、共通点の検査は省略できません。
//! 4. 4次以上の単体は、平面のHellyの定理により3つ組がすべて交われば
//!    共通点を持つので、幾何検査なしの組合せ拡張で構築できます。
//! 5. カウントを面の最小値として上位単体へ伝播し、
//!    Σ (-1)^次数 × カウント を積分値とします。
//!
//! 全部分集合を列挙する素朴な包除計算はO(2^k)のため、テストの
//! 照合オラクルとしてのみ保持しています。
//!
//! ## 品質指標
//!
//! 点推定には必ず品質を併記します。空フィールドはUndefined、
//! それ以外は位相判定の確からしさ（接触曖昧さで劣化するscore）と、
//! 単独被覆境界の周長割合による上振れ誤差限界（error_bound）です。

use tracing::{debug, trace};

use crate::models::common::GEOM_EPS;
use crate::models::coverage::{CountEstimate, CoverageField, Quality};
use crate::models::geometry::{self, Overlap, Region, TripleMeet};

/// オイラー標数積分による数え上げ推定器
///
/// 状態を持たず、同一フィールドに対して常に同一の推定を返します。
/// プレイグラウンドから独立して、任意に構築した被覆フィールドにも
/// 適用できます。
pub struct EulerEstimator;

/// 重なり構造（神経複体）
///
/// 次数kの単体は、相互に交差しフットプリント全体の共通点を持つ
/// (k+1)個のセンサーの組です。頂点はアクティブな読み取りの添字です。
#[derive(Debug)]
pub struct Nerve {
    /// 次数ごとの単体列（simplices[k] = 次数kの単体の頂点列）
    pub simplices: Vec<Vec<Vec<usize>>>,
    /// 許容誤差内の接触と判定されたペア・三つ組の数
    pub ambiguities: usize,
}

impl Nerve {
    /// 複体の最大次数
    pub fn max_order(&self) -> usize {
        self.simplices.len().saturating_sub(1)
    }

    /// 指定次数の単体数
    pub fn count_of_order(&self, k: usize) -> usize {
        self.simplices.get(k).map(|s| s.len()).unwrap_or(0)
    }
}

impl EulerEstimator {
    /// 被覆フィールドからターゲット数を推定
    ///
    /// # 引数
    ///
    /// * `field` - 1ティック分の被覆フィールド
    ///
    /// # 戻り値
    ///
    /// 推定値と品質指標。空フィールドは推定0・品質Undefinedになります。
    pub fn estimate(field: &CoverageField) -> CountEstimate {
        let active = field.active();
        if active.is_empty() {
            return CountEstimate {
                count: 0,
                quality: Quality::Undefined,
            };
        }

        let footprints: Vec<&Region> = active
            .iter()
            .filter_map(|r| r.footprint.as_ref())
            .collect();
        let counts: Vec<i64> = active.iter().map(|r| r.count as i64).collect();

        let nerve = Self::build_nerve(&footprints);

        // カウントを面の最小値として伝播しつつオイラー積分
        let mut total: i64 = 0;
        for (order, simplices) in nerve.simplices.iter().enumerate() {
            let sign = if order % 2 == 0 { 1 } else { -1 };
            for simplex in simplices {
                let weight = simplex
                    .iter()
                    .map(|&v| counts[v])
                    .min()
                    .unwrap_or(0);
                total += sign * weight;
            }
        }

        let (score, error_bound) = Self::quality_of(field, &footprints, nerve.ambiguities);
        debug!(
            "推定完了: count={} score={:.3} error_bound={:.3} 曖昧判定={}",
            total, score, error_bound, nerve.ambiguities
        );

        CountEstimate {
            count: total,
            quality: Quality::Graded {
                score,
                error_bound,
                ambiguities: nerve.ambiguities,
            },
        }
    }

    /// 重なり構造（神経複体）を構築
    ///
    /// 幾何検査は次数1（ペア交差）と次数2（3領域の共通交差）のみで、
    /// それ以上はHellyの定理による組合せ拡張です。元の部分集合列挙と
    /// 同様に、次の次数を構成できる単体数がなければ打ち切ります。
    pub fn build_nerve(footprints: &[&Region]) -> Nerve {
        let n = footprints.len();
        let mut ambiguities = 0usize;

        // 次数0: 全フットプリント
        let vertices: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

        // 次数1: 交差するペア（接触は連結扱い、ただし曖昧として記録）
        let mut adjacent = vec![vec![false; n]; n];
        let mut edges = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                match geometry::relate(footprints[i], footprints[j]) {
                    Overlap::Overlapping => {
                        adjacent[i][j] = true;
                        adjacent[j][i] = true;
                        edges.push(vec![i, j]);
                    }
                    Overlap::Tangent => {
                        adjacent[i][j] = true;
                        adjacent[j][i] = true;
                        edges.push(vec![i, j]);
                        ambiguities += 1;
                        trace!("接触ペア: {} - {}", i, j);
                    }
                    Overlap::Disjoint => {}
                }
            }
        }

        // 次数2: ペア交差に加えて3領域の共通点を要求（Čech複体）
        let mut tri_ok = std::collections::HashSet::new();
        let mut triangles = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if !adjacent[i][j] {
                    continue;
                }
                for k in (j + 1)..n {
                    if !adjacent[i][k] || !adjacent[j][k] {
                        continue;
                    }
                    match geometry::triple_meet(footprints[i], footprints[j], footprints[k]) {
                        TripleMeet::Proper => {
                            tri_ok.insert([i, j, k]);
                            triangles.push(vec![i, j, k]);
                        }
                        TripleMeet::Touching => {
                            tri_ok.insert([i, j, k]);
                            triangles.push(vec![i, j, k]);
                            ambiguities += 1;
                            trace!("接触三つ組: {} - {} - {}", i, j, k);
                        }
                        TripleMeet::Empty => {}
                    }
                }
            }
        }

        let mut simplices = vec![vertices];
        if !edges.is_empty() {
            simplices.push(edges);
        }
        if !triangles.is_empty() {
            simplices.push(triangles);
        }

        // 次数3以上: 全3つ組が有効なら共通点を持つ（Helly）ので
        // 幾何検査なしで拡張できる
        loop {
            let order = simplices.len() - 1;
            if order < 2 {
                break;
            }
            let current = &simplices[order];
            // 次の次数を構成するには少なくとも order + 2 個の単体が必要
            if current.len() < order + 2 {
                break;
            }
            let mut next = Vec::new();
            for simplex in current {
                let Some(&last) = simplex.last() else {
                    continue;
                };
                for v in (last + 1)..n {
                    if !simplex.iter().all(|&u| adjacent[u][v]) {
                        continue;
                    }
                    let all_triples_ok = simplex.iter().enumerate().all(|(a, &i)| {
                        simplex
                            .iter()
                            .skip(a + 1)
                            .all(|&j| tri_ok.contains(&[i, j, v]))
                    });
                    if all_triples_ok {
                        let mut extended = simplex.clone();
                        extended.push(v);
                        next.push(extended);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            simplices.push(next);
        }

        Nerve {
            simplices,
            ambiguities,
        }
    }

    /// 品質指標の計算
    ///
    /// scoreは曖昧判定1件ごとに半減します。error_boundは境界横断イベントで
    /// 分割した各フットプリント境界のうち、他センサーに覆われていない
    /// （または世界境界の外にある）周長の割合です。
    fn quality_of(field: &CoverageField, footprints: &[&Region], ambiguities: usize) -> (f64, f64) {
        let score = 0.5_f64.powi(ambiguities as i32);

        let mut covered_total = 0.0;
        let mut length_total = 0.0;
        for (i, fp) in footprints.iter().enumerate() {
            let others: Vec<&Region> = footprints
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, r)| *r)
                .collect();
            let (covered, total) =
                geometry::boundary_coverage(fp, &others, field.bounds.as_ref());
            covered_total += covered;
            length_total += total;
        }
        let error_bound = if length_total > GEOM_EPS {
            (1.0 - covered_total / length_total).clamp(0.0, 1.0)
        } else {
            1.0
        };
        (score, error_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::Position;
    use crate::models::sensor::SensorReading;

    fn disc(x: f64, y: f64, r: f64) -> Region {
        Region::disc(Position::new(x, y), r).unwrap()
    }

    fn field(readings: Vec<(Option<Region>, u32)>) -> CoverageField {
        let readings = readings
            .into_iter()
            .enumerate()
            .map(|(i, (footprint, count))| SensorReading {
                sensor_id: format!("S{:03}", i + 1),
                footprint,
                count,
            })
            .collect();
        CoverageField::new(0, readings, None)
    }

    /// 素朴な包除計算によるオラクル
    ///
    /// アクティブな全部分集合について幾何的に共通交差を検査し、
    /// χ(∪) = Σ (-1)^(|S|+1) χ(∩S) をカウント重み付きで計算する。
    /// 指数時間のため小さな入力の照合専用。
    fn naive_estimate(field: &CoverageField) -> i64 {
        let active = field.active();
        let footprints: Vec<&Region> =
            active.iter().map(|r| r.footprint.as_ref().unwrap()).collect();
        let counts: Vec<i64> = active.iter().map(|r| r.count as i64).collect();
        let n = footprints.len();
        assert!(n <= 16, "素朴列挙は小規模入力専用");

        let mut total = 0i64;
        for mask in 1u32..(1 << n) {
            let subset: Vec<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();
            let regions: Vec<&Region> = subset.iter().map(|&i| footprints[i]).collect();
            let meets = if regions.len() == 1 {
                true
            } else {
                geometry::meet_margin(&regions) >= -crate::models::common::GEOM_EPS
            };
            if meets {
                let weight = subset.iter().map(|&i| counts[i]).min().unwrap();
                let sign = if subset.len() % 2 == 1 { 1 } else { -1 };
                total += sign * weight;
            }
        }
        total
    }

    // ---------- 重なり構造 ----------

    #[test]
    fn test_nerve_single_sensor() {
        let fps = [disc(0.5, 0.5, 0.1)];
        let nerve = EulerEstimator::build_nerve(&fps.iter().collect::<Vec<_>>());
        assert_eq!(nerve.max_order(), 0);
        assert_eq!(nerve.count_of_order(0), 1);
    }

    #[test]
    fn test_nerve_two_separated() {
        let fps = [disc(0.25, 0.25, 0.1), disc(0.25, 0.75, 0.1)];
        let nerve = EulerEstimator::build_nerve(&fps.iter().collect::<Vec<_>>());
        assert_eq!(nerve.max_order(), 0);
        assert_eq!(nerve.count_of_order(0), 2);
    }

    #[test]
    fn test_nerve_two_overlapping() {
        let fps = [disc(0.25, 0.25, 0.1), disc(0.25, 0.35, 0.1)];
        let nerve = EulerEstimator::build_nerve(&fps.iter().collect::<Vec<_>>());
        assert_eq!(nerve.max_order(), 1);
        assert_eq!(nerve.count_of_order(0), 2);
        assert_eq!(nerve.count_of_order(1), 1);
    }

    #[test]
    fn test_nerve_three_overlapping() {
        // 中心が一直線上の3円板: 共通交差を持つ
        let fps = [
            disc(0.25, 0.25, 0.1),
            disc(0.25, 0.35, 0.1),
            disc(0.25, 0.31, 0.1),
        ];
        let nerve = EulerEstimator::build_nerve(&fps.iter().collect::<Vec<_>>());
        assert_eq!(nerve.max_order(), 2);
        assert_eq!(nerve.count_of_order(0), 3);
        assert_eq!(nerve.count_of_order(1), 3);
        assert_eq!(nerve.count_of_order(2), 1);
    }

    #[test]
    fn test_nerve_four_overlapping() {
        let fps = [
            disc(0.25, 0.25, 0.1),
            disc(0.25, 0.35, 0.1),
            disc(0.25, 0.31, 0.1),
            disc(0.3, 0.31, 0.1),
        ];
        let nerve = EulerEstimator::build_nerve(&fps.iter().collect::<Vec<_>>());
        assert_eq!(nerve.max_order(), 3);
        assert_eq!(nerve.count_of_order(0), 4);
        assert_eq!(nerve.count_of_order(1), 6);
        assert_eq!(nerve.count_of_order(2), 4);
        assert_eq!(nerve.count_of_order(3), 1);
    }

    #[test]
    fn test_nerve_ring_has_no_triangle() {
        // ペア交差はあるが3円の共通点がないリング: 三角形を作ってはいけない
        let fps = [
            disc(0.0, 0.0, 1.1),
            disc(2.0, 0.0, 1.1),
            disc(1.0, 1.732_050_8, 1.1),
        ];
        let nerve = EulerEstimator::build_nerve(&fps.iter().collect::<Vec<_>>());
        assert_eq!(nerve.max_order(), 1);
        assert_eq!(nerve.count_of_order(1), 3);
    }

    // ---------- 数え上げ ----------

    #[test]
    fn test_disjoint_footprints_count_exactly() {
        // 互いに素な凸フットプリントにターゲット1つずつ → 数は厳密、scoreは最大
        let f = field(vec![
            (Some(disc(0.0, 0.0, 1.0)), 1),
            (Some(disc(5.0, 0.0, 1.0)), 1),
            (Some(disc(0.0, 5.0, 1.0)), 1),
        ]);
        let est = EulerEstimator::estimate(&f);
        assert_eq!(est.count, 3);
        match est.quality {
            Quality::Graded {
                score, ambiguities, ..
            } => {
                assert_eq!(score, 1.0);
                assert_eq!(ambiguities, 0);
            }
            Quality::Undefined => panic!("品質が未定義になってはいけない"),
        }
    }

    #[test]
    fn test_overlap_does_not_inflate() {
        // 同一ターゲットを2つの重なるセンサーが観測 → 1のまま
        let f = field(vec![
            (Some(disc(0.0, 0.0, 1.0)), 1),
            (Some(disc(0.5, 0.0, 1.0)), 1),
        ]);
        let est = EulerEstimator::estimate(&f);
        assert_eq!(est.count, 1);
    }

    #[test]
    fn test_gap_bias_is_surfaced() {
        // 1つの実ターゲットの占有域が2つの離れたセンサーに分かれて
        // 報告される（被覆の隙間）→ 2と数えるが誤差限界で上振れを明示する
        let f = field(vec![
            (Some(disc(0.0, 0.0, 0.5)), 1),
            (Some(disc(2.0, 0.0, 0.5)), 1),
        ]);
        let est = EulerEstimator::estimate(&f);
        assert_eq!(est.count, 2);
        match est.quality {
            Quality::Graded { error_bound, .. } => {
                // 全境界が単独被覆なので誤差限界は最大
                assert!((error_bound - 1.0).abs() < 1e-9);
            }
            Quality::Undefined => panic!("品質が未定義になってはいけない"),
        }
    }

    #[test]
    fn test_empty_field_is_flagged_undefined() {
        let f = field(vec![(None, 0), (None, 0)]);
        let est = EulerEstimator::estimate(&f);
        assert_eq!(est.count, 0);
        assert_eq!(est.quality, Quality::Undefined);
    }

    #[test]
    fn test_estimate_is_idempotent() {
        let f = field(vec![
            (Some(disc(0.0, 0.0, 1.0)), 2),
            (Some(disc(0.5, 0.5, 1.0)), 1),
            (Some(disc(4.0, 0.0, 0.4)), 1),
        ]);
        let first = EulerEstimator::estimate(&f);
        let second = EulerEstimator::estimate(&f);
        assert_eq!(first, second);
    }

    #[test]
    fn test_tangent_discs_are_one_component() {
        // ちょうど2r離れた2円板（外接）: 閉領域の意味論では連結
        let f = field(vec![
            (Some(disc(0.0, 0.0, 1.0)), 1),
            (Some(disc(2.0, 0.0, 1.0)), 1),
        ]);
        let est = EulerEstimator::estimate(&f);
        assert_eq!(est.count, 1);
        match est.quality {
            Quality::Graded {
                score, ambiguities, ..
            } => {
                // 位相的に曖昧な判定として必ず劣化フラグが立つ
                assert_eq!(ambiguities, 1);
                assert!(score < 1.0);
            }
            Quality::Undefined => panic!("品質が未定義になってはいけない"),
        }
    }

    #[test]
    fn test_triangle_two_targets() {
        // 共通交差を持つ3センサーが2ターゲットを観測
        let f = field(vec![
            (Some(disc(0.0, 0.0, 0.15)), 2),
            (Some(disc(0.0, 0.1, 0.15)), 2),
            (Some(disc(0.1, 0.0, 0.15)), 2),
        ]);
        let est = EulerEstimator::estimate(&f);
        // 3·2 - 3·2 + 2 = 2
        assert_eq!(est.count, 2);
    }

    #[test]
    fn test_always_on_zero_count_is_defined_zero() {
        // 占有非依存センサーのみ報告、検知なし → Undefinedではなく確定した0
        let f = field(vec![(Some(disc(0.0, 0.0, 1.0)), 0)]);
        let est = EulerEstimator::estimate(&f);
        assert_eq!(est.count, 0);
        assert!(matches!(est.quality, Quality::Graded { .. }));
    }

    #[test]
    fn test_dense_triple_coverage_is_not_ambiguous() {
        // 3センサーが同一ターゲットを共同被覆する通常の密な配置。
        // 共通部分の角は境界上（マージンほぼ0）だが内部は十分深いので、
        // 曖昧判定を立てずにscore最大のまま1と数えること
        let f = field(vec![
            (Some(disc(0.0, 0.0, 1.2)), 1),
            (Some(disc(2.0, 0.0, 1.2)), 1),
            (Some(disc(1.0, 1.732_050_8, 1.2)), 1),
        ]);
        let est = EulerEstimator::estimate(&f);
        // 3 - 3 + 1 = 1
        assert_eq!(est.count, 1);
        match est.quality {
            Quality::Graded {
                score, ambiguities, ..
            } => {
                assert_eq!(ambiguities, 0);
                assert_eq!(score, 1.0);
            }
            Quality::Undefined => panic!("品質が未定義になってはいけない"),
        }
    }

    #[test]
    fn test_ring_union_has_zero_characteristic() {
        // リング配置（穴あり）の標数は0。ペア交差のみの複体では1になるため、
        // 3円の共通点検査が省略されていないことを確認する
        let f = field(vec![
            (Some(disc(0.0, 0.0, 1.1)), 1),
            (Some(disc(2.0, 0.0, 1.1)), 1),
            (Some(disc(1.0, 1.732_050_8, 1.1)), 1),
        ]);
        let est = EulerEstimator::estimate(&f);
        assert_eq!(est.count, 0);
    }

    #[test]
    fn test_matches_naive_enumeration() {
        // 代表的な配置で素朴な包除オラクルと一致すること
        let cases = vec![
            field(vec![
                (Some(disc(0.0, 0.0, 1.0)), 1),
                (Some(disc(0.5, 0.0, 1.0)), 2),
                (Some(disc(4.0, 0.0, 1.0)), 1),
            ]),
            field(vec![
                (Some(disc(0.0, 0.0, 0.15)), 2),
                (Some(disc(0.0, 0.1, 0.15)), 2),
                (Some(disc(0.1, 0.0, 0.15)), 2),
                (Some(disc(0.1, 0.1, 0.15)), 1),
            ]),
            field(vec![
                (Some(disc(0.0, 0.0, 1.1)), 1),
                (Some(disc(2.0, 0.0, 1.1)), 1),
                (Some(disc(1.0, 1.732_050_8, 1.1)), 1),
            ]),
        ];
        for (i, f) in cases.iter().enumerate() {
            let est = EulerEstimator::estimate(f);
            assert_eq!(
                est.count,
                naive_estimate(f),
                "配置{}で素朴列挙と不一致",
                i
            );
        }
    }

    #[test]
    fn test_matches_naive_on_random_fields() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(20240817);
        for trial in 0..30 {
            let n = rng.gen_range(1..=6);
            let readings: Vec<(Option<Region>, u32)> = (0..n)
                .map(|_| {
                    let x: f64 = rng.gen_range(0.0..4.0);
                    let y: f64 = rng.gen_range(0.0..4.0);
                    let r: f64 = rng.gen_range(0.3..1.2);
                    let c: u32 = rng.gen_range(0..3);
                    (Some(disc(x, y, r)), c)
                })
                .collect();
            let f = field(readings);
            let est = EulerEstimator::estimate(&f);
            assert_eq!(
                est.count,
                naive_estimate(&f),
                "乱択試行{}で素朴列挙と不一致",
                trial
            );
        }
    }

    #[test]
    fn test_mixed_shapes() {
        // 扇形と円板の混在フィールドでも推定できる
        use std::f64::consts::PI;
        let sector =
            Region::sector(Position::new(0.0, 0.0), 2.0, 0.0, PI / 4.0).unwrap();
        let f = field(vec![
            (Some(sector), 1),
            (Some(disc(1.5, 0.0, 0.5)), 1),
            (Some(disc(6.0, 0.0, 0.5)), 1),
        ]);
        let est = EulerEstimator::estimate(&f);
        // 扇形と前方円板は連結で1、離れた円板で+1
        assert_eq!(est.count, 2);
    }
}
