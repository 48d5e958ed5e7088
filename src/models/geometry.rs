//! # Geometry モジュール
//!
//! センサーフットプリントを表す閉領域（Region）と、その交差判定機構を提供します。
//!
//! 領域は円板・扇形・凸多角形の閉じたタグ付き直和として表現します。
//! すべて凸であるため、3領域以上の共通交差判定は平面のHellyの定理により
//! 3つ組の検査に帰着できます。交差判定は境界同士の交点（境界横断イベント）と
//! 領域の代表点を候補点として列挙し、符号付きマージンで分類します。
//!
//! 接触のみ（測度ゼロの重なり）はTangentとして区別し、閉領域の意味論では
//! 連結として扱います。許容誤差は`GEOM_EPS`の1つだけです。

use crate::models::common::{math_utils, Position, RegionRect, GEOM_EPS};

/// 幾何エラー
///
/// 不正な領域は最初に構築された時点で検出し、呼び出し側へ返します。
/// 黙って値を丸めることはしません。
#[derive(Debug)]
pub enum GeometryError {
    /// 半径が正でない
    NonPositiveRadius(f64),
    /// 扇形の半角が(0, 90]度の範囲外（凸性が保てない）
    InvalidSectorAngle(f64),
    /// 多角形の頂点数が3未満
    InsufficientVertices(usize),
    /// 多角形が凸でない、または自己交差している
    NonConvexPolygon,
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::NonPositiveRadius(r) => {
                write!(f, "半径が正ではありません: {}", r)
            }
            GeometryError::InvalidSectorAngle(deg) => {
                write!(f, "扇形の半角が不正です（0〜90度である必要）: {}度", deg)
            }
            GeometryError::InsufficientVertices(n) => {
                write!(f, "多角形の頂点数が不足しています: {}", n)
            }
            GeometryError::NonConvexPolygon => {
                write!(f, "多角形が凸ではない、または自己交差しています")
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// センサーフットプリントを表す閉領域
///
/// すべての変種は凸です。推定器が位相仮定（可縮性）を
/// 網羅的にパターンマッチできるよう、閉じた直和にしています。
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// 円板
    Disc { center: Position, radius: f64 },
    /// 扇形（方位制限付きの検知範囲）
    Sector {
        apex: Position,
        radius: f64,
        /// 中心方位（ラジアン）
        bearing: f64,
        /// 方位からの半角（ラジアン、π/2以下）
        half_angle: f64,
    },
    /// 凸多角形（反時計回り）
    Polygon { vertices: Vec<Position> },
}

/// 2領域の位置関係
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Overlap {
    /// 互いに素
    Disjoint,
    /// 境界のみの接触（閉領域の意味論では連結、位相的には曖昧）
    Tangent,
    /// 内部が重なる
    Overlapping,
}

/// 3領域の共通交差の分類
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TripleMeet {
    /// 共通点なし
    Empty,
    /// 許容誤差内の接触のみ
    Touching,
    /// 共通の内部点あり
    Proper,
}

impl Region {
    /// 円板領域を構築
    pub fn disc(center: Position, radius: f64) -> Result<Region, GeometryError> {
        if radius <= 0.0 {
            return Err(GeometryError::NonPositiveRadius(radius));
        }
        Ok(Region::Disc { center, radius })
    }

    /// 扇形領域を構築
    ///
    /// # 引数
    ///
    /// * `bearing` - 中心方位（ラジアン）
    /// * `half_angle` - 方位からの半角（ラジアン）。凸性のためπ/2以下に制限
    pub fn sector(
        apex: Position,
        radius: f64,
        bearing: f64,
        half_angle: f64,
    ) -> Result<Region, GeometryError> {
        if radius <= 0.0 {
            return Err(GeometryError::NonPositiveRadius(radius));
        }
        if half_angle <= 0.0 || half_angle > std::f64::consts::FRAC_PI_2 + GEOM_EPS {
            return Err(GeometryError::InvalidSectorAngle(math_utils::rad_to_deg(
                half_angle,
            )));
        }
        Ok(Region::Sector {
            apex,
            radius,
            bearing: math_utils::normalize_angle(bearing),
            half_angle,
        })
    }

    /// 凸多角形領域を構築（頂点は反時計回り）
    pub fn polygon(vertices: Vec<Position>) -> Result<Region, GeometryError> {
        if vertices.len() < 3 {
            return Err(GeometryError::InsufficientVertices(vertices.len()));
        }
        // 全頂点で左折（外積が正）であることを確認
        let n = vertices.len();
        for i in 0..n {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            let c = vertices[(i + 2) % n];
            if (b - a).cross(&(c - b)) <= GEOM_EPS {
                return Err(GeometryError::NonConvexPolygon);
            }
        }
        Ok(Region::Polygon { vertices })
    }

    /// 符号付きマージン（内側が正）
    ///
    /// 凸制約群の最小マージンです。境界上でほぼ0、外側で負になります。
    /// 角付近ではユークリッド距離と一致しませんが、符号は常に正しいため
    /// ε比較による包含・接触判定にはこれで十分です。
    pub fn margin(&self, p: &Position) -> f64 {
        match self {
            Region::Disc { center, radius } => radius - center.distance_to(p),
            Region::Sector {
                apex,
                radius,
                bearing,
                half_angle,
            } => {
                let radial = radius - apex.distance_to(p);
                // 扇形 = 円板 ∩ 2つの半平面（凸なので半角はπ/2以下）
                let (ls, lc) = (bearing - half_angle).sin_cos();
                let (rs, rc) = (bearing + half_angle).sin_cos();
                let v = *p - *apex;
                // 左縁の内向き法線: 縁方向(lc, ls)を反時計回りに90度回転
                let left = v.dot(&Position::new(-ls, lc));
                // 右縁の内向き法線: 縁方向(rc, rs)を時計回りに90度回転
                let right = v.dot(&Position::new(rs, -rc));
                radial.min(left).min(right)
            }
            Region::Polygon { vertices } => {
                let n = vertices.len();
                let mut m = f64::INFINITY;
                for i in 0..n {
                    let a = vertices[i];
                    let b = vertices[(i + 1) % n];
                    let edge = b - a;
                    let d = edge.cross(&(*p - a)) / edge.magnitude();
                    m = m.min(d);
                }
                m
            }
        }
    }

    /// 閉領域としての包含判定（境界を含む）
    pub fn contains(&self, p: &Position) -> bool {
        self.margin(p) >= -GEOM_EPS
    }

    /// 境界を弧・線分プリミティブに分解
    pub fn boundary(&self) -> Vec<Primitive> {
        match self {
            Region::Disc { center, radius } => vec![Primitive::Arc {
                center: *center,
                radius: *radius,
                start: -std::f64::consts::PI,
                sweep: 2.0 * std::f64::consts::PI,
            }],
            Region::Sector {
                apex,
                radius,
                bearing,
                half_angle,
            } => {
                let start = bearing - half_angle;
                let end = bearing + half_angle;
                let p1 = *apex + Position::new(start.cos(), start.sin()) * *radius;
                let p2 = *apex + Position::new(end.cos(), end.sin()) * *radius;
                vec![
                    Primitive::Segment { a: *apex, b: p1 },
                    Primitive::Arc {
                        center: *apex,
                        radius: *radius,
                        start,
                        sweep: 2.0 * half_angle,
                    },
                    Primitive::Segment { a: p2, b: *apex },
                ]
            }
            Region::Polygon { vertices } => {
                let n = vertices.len();
                (0..n)
                    .map(|i| Primitive::Segment {
                        a: vertices[i],
                        b: vertices[(i + 1) % n],
                    })
                    .collect()
            }
        }
    }

    /// 周長
    pub fn perimeter(&self) -> f64 {
        self.boundary().iter().map(|p| p.length()).sum()
    }

    /// 厳密に内部にある代表点
    pub fn interior_point(&self) -> Position {
        match self {
            Region::Disc { center, .. } => *center,
            Region::Sector {
                apex,
                radius,
                bearing,
                ..
            } => *apex + Position::new(bearing.cos(), bearing.sin()) * (radius * 0.5),
            Region::Polygon { vertices } => {
                let n = vertices.len() as f64;
                let mut c = Position::new(0.0, 0.0);
                for v in vertices {
                    c = c + *v;
                }
                c * (1.0 / n)
            }
        }
    }

    /// 交差判定の候補に使う代表点（境界上の点を含む）
    fn key_points(&self) -> Vec<Position> {
        match self {
            Region::Disc { center, .. } => vec![*center],
            Region::Sector {
                apex,
                radius,
                bearing,
                half_angle,
            } => {
                let start = bearing - half_angle;
                let end = bearing + half_angle;
                vec![
                    *apex,
                    *apex + Position::new(start.cos(), start.sin()) * *radius,
                    *apex + Position::new(end.cos(), end.sin()) * *radius,
                    *apex + Position::new(bearing.cos(), bearing.sin()) * *radius,
                    self.interior_point(),
                ]
            }
            Region::Polygon { vertices } => {
                let mut ps = vertices.clone();
                ps.push(self.interior_point());
                ps
            }
        }
    }
}

/// 境界プリミティブ（円弧または線分）
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// 円弧（反時計回り、sweep > 0）
    Arc {
        center: Position,
        radius: f64,
        start: f64,
        sweep: f64,
    },
    /// 線分
    Segment { a: Position, b: Position },
}

impl Primitive {
    /// プリミティブの長さ
    pub fn length(&self) -> f64 {
        match self {
            Primitive::Arc { radius, sweep, .. } => radius * sweep.abs(),
            Primitive::Segment { a, b } => a.distance_to(b),
        }
    }

    /// パラメータt（0〜1）に対応する点
    pub fn point_at(&self, t: f64) -> Position {
        match self {
            Primitive::Arc {
                center,
                radius,
                start,
                sweep,
            } => {
                let theta = start + sweep * t;
                *center + Position::new(theta.cos(), theta.sin()) * *radius
            }
            Primitive::Segment { a, b } => *a + (*b - *a) * t,
        }
    }

    /// 円弧上の角度をパラメータに変換（範囲外ならNone）
    fn param_of_angle(&self, theta: f64) -> Option<f64> {
        if let Primitive::Arc { start, sweep, .. } = self {
            let mut delta = math_utils::normalize_angle(theta - *start);
            if delta < 0.0 {
                delta += 2.0 * std::f64::consts::PI;
            }
            // 角度許容量: 弧長εに相当する値より緩い固定値で十分
            const ANG_EPS: f64 = 1e-9;
            if delta <= *sweep + ANG_EPS {
                Some((delta / sweep).clamp(0.0, 1.0))
            } else {
                None
            }
        } else {
            None
        }
    }

    /// 他プリミティブとの交点の、自身の上でのパラメータ列
    pub fn intersection_params(&self, other: &Primitive) -> Vec<f64> {
        let mut params = Vec::new();
        for p in intersection_points(self, other) {
            match self {
                Primitive::Arc { center, .. } => {
                    let theta = (p - *center).bearing();
                    if let Some(t) = self.param_of_angle(theta) {
                        params.push(t);
                    }
                }
                Primitive::Segment { a, b } => {
                    let ab = *b - *a;
                    let len2 = ab.dot(&ab);
                    if len2 > 0.0 {
                        let t = (p - *a).dot(&ab) / len2;
                        if (-GEOM_EPS..=1.0 + GEOM_EPS).contains(&t) {
                            params.push(t.clamp(0.0, 1.0));
                        }
                    }
                }
            }
        }
        params
    }
}

/// 2つの円の交点（接触は許容誤差内で1点として返す）
fn circle_circle_points(c1: Position, r1: f64, c2: Position, r2: f64) -> Vec<Position> {
    let d = c1.distance_to(&c2);
    if d < GEOM_EPS {
        // 同心円は交点を持たない（同一円周は測度ゼロ配置として無視）
        return Vec::new();
    }
    let sum = r1 + r2;
    let diff = (r1 - r2).abs();
    if d > sum + GEOM_EPS || d < diff - GEOM_EPS {
        return Vec::new();
    }
    let dir = (c2 - c1) * (1.0 / d);
    if d >= sum - GEOM_EPS || d <= diff + GEOM_EPS {
        // 外接または内接: 接点1つ（内接では小さい方の円が内側にある）
        let sign = if d >= sum - GEOM_EPS || r1 >= r2 { 1.0 } else { -1.0 };
        return vec![c1 + dir * (r1 * sign)];
    }
    let a = (d * d + r1 * r1 - r2 * r2) / (2.0 * d);
    let h2 = r1 * r1 - a * a;
    let h = h2.max(0.0).sqrt();
    let mid = c1 + dir * a;
    let normal = Position::new(-dir.y, dir.x);
    vec![mid + normal * h, mid - normal * h]
}

/// 線分と円の交点
fn segment_circle_points(a: Position, b: Position, center: Position, radius: f64) -> Vec<Position> {
    let d = b - a;
    let f = a - center;
    let qa = d.dot(&d);
    if qa < GEOM_EPS * GEOM_EPS {
        return Vec::new();
    }
    let qb = 2.0 * f.dot(&d);
    let qc = f.dot(&f) - radius * radius;
    let mut disc = qb * qb - 4.0 * qa * qc;
    // 接触（判別式が誤差内で0）は1点に縮退させる
    if disc < 0.0 && disc > -GEOM_EPS * qa {
        disc = 0.0;
    }
    if disc < 0.0 {
        return Vec::new();
    }
    let sq = disc.sqrt();
    let mut points = Vec::new();
    for t in [(-qb - sq) / (2.0 * qa), (-qb + sq) / (2.0 * qa)] {
        if (-GEOM_EPS..=1.0 + GEOM_EPS).contains(&t) {
            points.push(a + d * t.clamp(0.0, 1.0));
        }
    }
    points.dedup_by(|p, q| p.distance_to(q) < GEOM_EPS);
    points
}

/// 線分同士の交点
fn segment_segment_points(a1: Position, b1: Position, a2: Position, b2: Position) -> Vec<Position> {
    let d1 = b1 - a1;
    let d2 = b2 - a2;
    let denom = d1.cross(&d2);
    if denom.abs() < GEOM_EPS {
        // 平行（共線の重なりは測度ゼロ配置として無視）
        return Vec::new();
    }
    let t = (a2 - a1).cross(&d2) / denom;
    let u = (a2 - a1).cross(&d1) / denom;
    if (-GEOM_EPS..=1.0 + GEOM_EPS).contains(&t) && (-GEOM_EPS..=1.0 + GEOM_EPS).contains(&u) {
        vec![a1 + d1 * t.clamp(0.0, 1.0)]
    } else {
        Vec::new()
    }
}

/// プリミティブ同士の交点列
fn intersection_points(p: &Primitive, q: &Primitive) -> Vec<Position> {
    let raw = match (p, q) {
        (
            Primitive::Arc {
                center: c1,
                radius: r1,
                ..
            },
            Primitive::Arc {
                center: c2,
                radius: r2,
                ..
            },
        ) => circle_circle_points(*c1, *r1, *c2, *r2),
        (Primitive::Arc { center, radius, .. }, Primitive::Segment { a, b })
        | (Primitive::Segment { a, b }, Primitive::Arc { center, radius, .. }) => {
            segment_circle_points(*a, *b, *center, *radius)
        }
        (Primitive::Segment { a: a1, b: b1 }, Primitive::Segment { a: a2, b: b2 }) => {
            segment_segment_points(*a1, *b1, *a2, *b2)
        }
    };
    // 円交点は弧の角度範囲内のもののみ残す
    raw.into_iter()
        .filter(|pt| on_primitive(p, pt) && on_primitive(q, pt))
        .collect()
}

/// 点がプリミティブの範囲内にあるか（円の場合は弧の角度範囲）
fn on_primitive(prim: &Primitive, p: &Position) -> bool {
    match prim {
        Primitive::Arc { center, .. } => {
            let theta = (*p - *center).bearing();
            prim.param_of_angle(theta).is_some()
        }
        Primitive::Segment { a, b } => {
            let ab = *b - *a;
            let len2 = ab.dot(&ab);
            if len2 < GEOM_EPS * GEOM_EPS {
                return a.distance_to(p) < GEOM_EPS;
            }
            let t = (*p - *a).dot(&ab) / len2;
            (-GEOM_EPS..=1.0 + GEOM_EPS).contains(&t)
        }
    }
}

/// 2領域の境界同士の交点（境界横断イベント）をすべて列挙
fn boundary_crossings(a: &Region, b: &Region) -> Vec<Position> {
    let mut points = Vec::new();
    for pa in &a.boundary() {
        for pb in &b.boundary() {
            points.extend(intersection_points(pa, pb));
        }
    }
    points
}

/// 2領域の位置関係を判定
///
/// 円板同士は中心距離による厳密判定、それ以外は候補点方式で判定します。
/// 候補点は境界横断点と各領域の代表点で、閉凸領域に対してはこれで十分です。
pub fn relate(a: &Region, b: &Region) -> Overlap {
    // 円板同士の高速経路（接触の分類もここで厳密に行う）
    if let (
        Region::Disc {
            center: c1,
            radius: r1,
        },
        Region::Disc {
            center: c2,
            radius: r2,
        },
    ) = (a, b)
    {
        let d = c1.distance_to(c2);
        let sum = r1 + r2;
        if d < sum - GEOM_EPS {
            return Overlap::Overlapping;
        } else if d <= sum + GEOM_EPS {
            return Overlap::Tangent;
        } else {
            return Overlap::Disjoint;
        }
    }

    // 内部代表点による包含チェック
    if b.margin(&a.interior_point()) > GEOM_EPS || a.margin(&b.interior_point()) > GEOM_EPS {
        return Overlap::Overlapping;
    }

    // 境界横断点で分割した境界片の中点が相手の内部にあれば重なっている
    let crossings = boundary_crossings(a, b);
    for (this, other) in [(a, b), (b, a)] {
        for prim in &this.boundary() {
            let mut params = vec![0.0, 1.0];
            for opb in &other.boundary() {
                params.extend(prim.intersection_params(opb));
            }
            params.sort_by(|x, y| x.partial_cmp(y).unwrap());
            for w in params.windows(2) {
                let mid = prim.point_at((w[0] + w[1]) / 2.0);
                if other.margin(&mid) > GEOM_EPS {
                    return Overlap::Overlapping;
                }
            }
        }
    }

    // 重なりはない: 候補点のいずれかが両方の境界上にあれば接触
    let mut best = f64::NEG_INFINITY;
    let mut candidates = crossings;
    candidates.extend(a.key_points());
    candidates.extend(b.key_points());
    for p in &candidates {
        best = best.max(a.margin(p).min(b.margin(p)));
    }
    if best >= -GEOM_EPS {
        Overlap::Tangent
    } else {
        Overlap::Disjoint
    }
}

/// 領域集合の共通交差マージン
///
/// 候補点 = 全ペアの境界横断点 + 各領域の代表点について、
/// 全領域マージンの最小値を最大化した値を返します。凸閉領域の共通部分が
/// 空でなければ、その境界の頂点は必ず候補点に現れるため、
/// 戻り値が-GEOM_EPS以上であることが共通点の存在と同値です。
///
/// 共通部分の角は2つの境界上にあるためマージンがほぼ0になります。
/// 深さの評価には、許容誤差内で全領域に入る候補点の重心を追加します。
/// 凸領域では、共通部分が内部を持つとき重心は真に内部の点になるため、
/// 内部を持つ共通交差と測度ゼロの接触を区別できます。
pub fn meet_margin(regions: &[&Region]) -> f64 {
    let mut candidates = Vec::new();
    for (i, a) in regions.iter().enumerate() {
        candidates.extend(a.key_points());
        for b in regions.iter().skip(i + 1) {
            candidates.extend(boundary_crossings(a, b));
        }
    }

    let min_margin = |p: &Position| {
        regions
            .iter()
            .map(|r| r.margin(p))
            .fold(f64::INFINITY, f64::min)
    };

    let mut best = f64::NEG_INFINITY;
    let mut feasible = Vec::new();
    for p in &candidates {
        let m = min_margin(p);
        best = best.max(m);
        if m >= -GEOM_EPS {
            feasible.push(*p);
        }
    }

    if feasible.len() >= 2 {
        let mut c = Position::new(0.0, 0.0);
        for p in &feasible {
            c = c + *p;
        }
        let centroid = c * (1.0 / feasible.len() as f64);
        best = best.max(min_margin(&centroid));
    }
    best
}

/// 3領域の共通交差を判定
///
/// 平面のHellyの定理により、凸領域の4つ以上の共通交差判定は
/// 3つ組の検査に帰着できるため、推定器が必要とするのはこれだけです。
pub fn triple_meet(a: &Region, b: &Region, c: &Region) -> TripleMeet {
    let best = meet_margin(&[a, b, c]);
    if best > GEOM_EPS {
        TripleMeet::Proper
    } else if best >= -GEOM_EPS {
        TripleMeet::Touching
    } else {
        TripleMeet::Empty
    }
}

/// 領域境界の被覆区間計算
///
/// `region`の境界のうち、`others`のいずれかに覆われ、かつ`bounds`の内側に
/// ある長さを計算します。戻り値は（被覆長, 総周長）。世界境界の外に出ている
/// 境界部分は、他センサーに覆われていても露出として扱います。
pub fn boundary_coverage(
    region: &Region,
    others: &[&Region],
    bounds: Option<&RegionRect>,
) -> (f64, f64) {
    let bounds_edges: Vec<Primitive> = match bounds {
        Some(r) => {
            let corners = [
                Position::new(r.xmin, r.ymin),
                Position::new(r.xmax, r.ymin),
                Position::new(r.xmax, r.ymax),
                Position::new(r.xmin, r.ymax),
            ];
            (0..4)
                .map(|i| Primitive::Segment {
                    a: corners[i],
                    b: corners[(i + 1) % 4],
                })
                .collect()
        }
        None => Vec::new(),
    };

    let mut covered = 0.0;
    let mut total = 0.0;
    for prim in &region.boundary() {
        total += prim.length();

        // 境界横断イベントで分割し、各片を中点で分類する
        let mut params = vec![0.0, 1.0];
        for other in others {
            for opb in &other.boundary() {
                params.extend(prim.intersection_params(opb));
            }
        }
        for edge in &bounds_edges {
            params.extend(prim.intersection_params(edge));
        }
        params.sort_by(|x, y| x.partial_cmp(y).unwrap());

        for w in params.windows(2) {
            let span = w[1] - w[0];
            if span <= 0.0 {
                continue;
            }
            let mid = prim.point_at((w[0] + w[1]) / 2.0);
            let inside_world = bounds.map(|b| b.contains(&mid)).unwrap_or(true);
            if inside_world && others.iter().any(|o| o.contains(&mid)) {
                covered += prim.length() * span;
            }
        }
    }
    (covered, total)
}
