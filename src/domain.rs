//! 時空間グリッドの構築と学習点のサンプリング。
//!
//! グリッドは x を外側、t を内側のループとして平坦化します。
//! 平坦化インデックス `k` は `(i_x, i_t) = (k / n_t, k % n_t)` に対応します。

use crate::config::{DomainConfig, check_bounds};
use crate::error::PinnError;
use burn::prelude::Backend;
use burn::tensor::Tensor;
use rand::Rng;
use rand::seq::index;

/// 区間を等間隔に分割した座標列。
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    values: Vec<f32>,
}

impl Axis {
    /// `[lower, upper]` を両端を含めて `n` 点に分割します。
    pub fn linspace(
        name: &'static str,
        lower: f64,
        upper: f64,
        n: usize,
    ) -> Result<Self, PinnError> {
        if n == 0 {
            return Err(PinnError::InvalidResolution { axis: name, count: n });
        }
        check_bounds(name, lower, upper)?;
        let values = if n == 1 {
            vec![lower as f32]
        } else {
            let step = (upper - lower) / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    let value = if i == n - 1 { upper } else { lower + i as f64 * step };
                    value as f32
                })
                .collect()
        };
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 1つの領域に属する x 軸と t 軸の組。
#[derive(Debug, Clone)]
pub struct SpaceTime {
    pub x: Axis,
    pub t: Axis,
}

/// 物理領域と補助領域の軸。
#[derive(Debug, Clone)]
pub struct Axes {
    /// 最終評価に使う領域
    pub physical: SpaceTime,
    /// 学習点の候補を生成する、x方向に広い領域
    pub auxiliary: SpaceTime,
}

/// 両方の領域の軸を構築します。
///
/// 2つの領域は同じ分割数 `n_x`, `n_t` を共有します。
pub fn build_axes(config: &DomainConfig) -> Result<Axes, PinnError> {
    let physical = SpaceTime {
        x: Axis::linspace("x", config.x_lower, config.x_upper, config.n_x)?,
        t: Axis::linspace("t", config.t_lower, config.t_upper, config.n_t)?,
    };
    let auxiliary = SpaceTime {
        x: Axis::linspace("補助 x", config.aux_x_lower, config.aux_x_upper, config.n_x)?,
        t: Axis::linspace("t", config.t_lower, config.t_upper, config.n_t)?,
    };
    Ok(Axes { physical, auxiliary })
}

/// 平坦化された (t, x) の組の列。
#[derive(Debug, Clone)]
pub struct Grid {
    n_x: usize,
    n_t: usize,
    points: Vec<[f32; 2]>,
}

impl Grid {
    pub fn n_x(&self) -> usize {
        self.n_x
    }

    pub fn n_t(&self) -> usize {
        self.n_t
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 平坦化インデックス `k` の点 `[t, x]`。
    pub fn point(&self, k: usize) -> [f32; 2] {
        self.points[k]
    }

    /// x 軸インデックス `i_x`、t 軸インデックス `i_t` の点。
    pub fn at(&self, i_x: usize, i_t: usize) -> [f32; 2] {
        self.points[i_x * self.n_t + i_t]
    }

    pub fn points(&self) -> &[[f32; 2]] {
        &self.points
    }
}

/// x を外側、t を内側として (t, x) のグリッドを作ります。
pub fn make_grid(x: &Axis, t: &Axis) -> Grid {
    let mut points = Vec::with_capacity(x.len() * t.len());
    for &x_val in x.values() {
        for &t_val in t.values() {
            points.push([t_val, x_val]);
        }
    }
    Grid {
        n_x: x.len(),
        n_t: t.len(),
        points,
    }
}

/// 推論専用の評価グリッド。物理領域全体を覆います。
pub fn make_eval_grid(physical: &SpaceTime) -> Grid {
    make_grid(&physical.x, &physical.t)
}

/// 初期条件 `u(x, 0)`: `-0.5 <= x <= 0` で1、それ以外で0。
pub fn initial_condition(x: f32) -> f32 {
    if (-0.5..=0.0).contains(&x) { 1.0 } else { 0.0 }
}

/// 初期条件点とその目標値。
#[derive(Debug, Clone)]
pub struct IcSamples {
    pub points: Vec<[f32; 2]>,
    pub targets: Vec<f32>,
}

/// 内部（残差）点。
#[derive(Debug, Clone)]
pub struct InteriorSamples {
    pub points: Vec<[f32; 2]>,
}

/// x 軸インデックスから `n_ic` 個を非復元抽出し、グリッドの最初の時刻列の点を返します。
pub fn sample_ic<R: Rng + ?Sized>(
    rng: &mut R,
    n_ic: usize,
    x: &Axis,
    grid: &Grid,
) -> Result<IcSamples, PinnError> {
    if n_ic > x.len() {
        return Err(PinnError::SampleCountExceedsPool {
            role: "初期条件",
            requested: n_ic,
            pool: x.len(),
        });
    }
    if grid.n_x() != x.len() {
        return Err(PinnError::ShapeMismatch {
            context: "初期条件グリッド",
            expected: vec![x.len()],
            actual: vec![grid.n_x()],
        });
    }

    let ids = index::sample(rng, x.len(), n_ic).into_vec();
    let points: Vec<[f32; 2]> = ids.iter().map(|&i| grid.at(i, 0)).collect();
    let targets = points.iter().map(|p| initial_condition(p[1])).collect();
    Ok(IcSamples { points, targets })
}

/// グリッド全体から `n_f` 点を非復元抽出します。
pub fn sample_interior<R: Rng + ?Sized>(
    rng: &mut R,
    n_f: usize,
    grid: &Grid,
) -> Result<InteriorSamples, PinnError> {
    if n_f > grid.len() {
        return Err(PinnError::SampleCountExceedsPool {
            role: "内部点",
            requested: n_f,
            pool: grid.len(),
        });
    }
    let points = index::sample(rng, grid.len(), n_f)
        .into_iter()
        .map(|k| grid.point(k))
        .collect();
    Ok(InteriorSamples { points })
}

/// `[t, x]` の列を `[n, 2]` のテンソルに変換します。
pub fn points_to_tensor<B: Backend>(points: &[[f32; 2]], device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = points.iter().flatten().copied().collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([points.len(), 2])
}
