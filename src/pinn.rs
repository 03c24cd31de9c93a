use crate::error::PinnError;
use crate::jet::{Jet, differentiate};
use crate::model::Model;
use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// Buckley-Leverett の分流関数 `F(u) = u² / (4u² + (1-u)²)`。
///
/// 分母は実数 u に対して常に正なので、クランプは行いません。
pub fn fractional_flow<B: Backend>(u: Jet<B>) -> Jet<B> {
    let u2 = u.clone().square();
    let oil = u.neg().add_scalar(1.0).square();
    u2.clone() / (u2.mul_scalar(4.0) + oil)
}

/// `fractional_flow` のスカラー版。
pub fn flux(u: f64) -> f64 {
    u * u / (4.0 * u * u + (1.0 - u) * (1.0 - u))
}

/// 物理損失を計算します。
///
/// 保存則 `u_t + F(u)_x = 0` の残差を内部点で評価し、その二乗平均誤差を返します。
/// `u` の勾配と、`u` から作った `F` の勾配の両方を同じ微分の根に対して取ります。
pub fn residual_loss<B: Backend>(
    model: &Model<B>,
    interior: Tensor<B, 2>,
) -> Result<Tensor<B, 1>, PinnError> {
    let n = interior.dims()[0];
    let u = differentiate(interior, |roots| model.forward_jet(roots))?;
    let u_t = u.gradient().slice([0..n, 0..1]);

    let flux = fractional_flow(u);
    let f_x = flux.gradient().slice([0..n, 1..2]);

    let residual = u_t + f_x;
    Ok(MseLoss::new().forward(residual.clone(), residual.zeros_like(), Reduction::Mean))
}

/// 初期条件損失を計算します。
///
/// 初期条件点での予測値（出力の1列目）と目標値の二乗平均誤差です。
pub fn ic_loss<B: Backend>(
    model: &Model<B>,
    coords: Tensor<B, 2>,
    targets: Tensor<B, 1>,
) -> Result<Tensor<B, 1>, PinnError> {
    let n = coords.dims()[0];
    if targets.dims() != [n] {
        return Err(PinnError::ShapeMismatch {
            context: "初期条件の目標値",
            expected: vec![n],
            actual: targets.dims().to_vec(),
        });
    }
    let pred = model.forward(coords).slice([0..n, 0..1]).squeeze::<1>(1);
    Ok(MseLoss::new().forward(pred, targets, Reduction::Mean))
}
