//! 入力 (t, x) に関する微分の提供。
//!
//! `burn` の逆伝播は入力に関する勾配をさらに微分可能な形で残さないため、
//! ここでは値と (t, x) 方向の接ベクトルを組にした前進モードの「ジェット」で
//! 入力微分を厳密に計算します。各演算は通常のテンソル演算として記録されるので、
//! `Autodiff` バックエンド上ではパラメータに関する勾配が両方の微分を通って流れます。
//!
//! ジェットどうしを合成すれば、微分済みの量（例えば `u` から作った流束 `F(u)`）の
//! 勾配をもう一度取り出せます。

use crate::error::PinnError;
use burn::nn::Linear;
use burn::prelude::Backend;
use burn::tensor::Tensor;
use burn::tensor::activation;
use std::ops::{Add, Div, Mul, Sub};

/// 値と、微分の根 (t, x) に関する偏微分の組。
///
/// `value` が `[n, d]` のとき、`d_t` と `d_x` も `[n, d]` です。
#[derive(Debug, Clone)]
pub struct Jet<B: Backend> {
    value: Tensor<B, 2>,
    d_t: Tensor<B, 2>,
    d_x: Tensor<B, 2>,
}

impl<B: Backend> Jet<B> {
    /// `[n, 2]` の座標 (t, x) を微分の根としてマークします。
    pub fn root(coords: Tensor<B, 2>) -> Result<Self, PinnError> {
        let [n, d] = coords.dims();
        if d != 2 {
            return Err(PinnError::ShapeMismatch {
                context: "微分の根",
                expected: vec![n, 2],
                actual: vec![n, d],
            });
        }
        let device = coords.device();
        let ones = Tensor::<B, 2>::ones([n, 1], &device);
        let zeros = Tensor::<B, 2>::zeros([n, 1], &device);
        Ok(Self {
            value: coords,
            d_t: Tensor::cat(vec![ones.clone(), zeros.clone()], 1),
            d_x: Tensor::cat(vec![zeros, ones], 1),
        })
    }

    /// 根に依存しない量。勾配は常にゼロです。
    pub fn constant(value: Tensor<B, 2>) -> Self {
        Self {
            d_t: value.zeros_like(),
            d_x: value.zeros_like(),
            value,
        }
    }

    pub fn value(&self) -> Tensor<B, 2> {
        self.value.clone()
    }

    /// t に関する偏微分。
    pub fn d_t(&self) -> Tensor<B, 2> {
        self.d_t.clone()
    }

    /// x に関する偏微分。
    pub fn d_x(&self) -> Tensor<B, 2> {
        self.d_x.clone()
    }

    /// スカラー出力 `[n, 1]` の勾配 `[n, 2]`（1列目が t、2列目が x）。
    pub fn gradient(&self) -> Tensor<B, 2> {
        Tensor::cat(vec![self.d_t.clone(), self.d_x.clone()], 1)
    }

    /// 値の `k` 列目だけを取り出したジェット。
    pub fn column(self, k: usize) -> Self {
        let n = self.value.dims()[0];
        Self {
            value: self.value.slice([0..n, k..k + 1]),
            d_t: self.d_t.slice([0..n, k..k + 1]),
            d_x: self.d_x.slice([0..n, k..k + 1]),
        }
    }

    /// 全結合層 `y = v W + b`。接ベクトルにはバイアスが加わりません。
    pub fn linear(self, layer: &Linear<B>) -> Self {
        let weight = layer.weight.val();
        Self {
            value: layer.forward(self.value),
            d_t: self.d_t.matmul(weight.clone()),
            d_x: self.d_x.matmul(weight),
        }
    }

    pub fn tanh(self) -> Self {
        let value = activation::tanh(self.value);
        let slope = value.clone().powf_scalar(2.0).neg().add_scalar(1.0);
        Self {
            d_t: self.d_t * slope.clone(),
            d_x: self.d_x * slope,
            value,
        }
    }

    pub fn neg(self) -> Self {
        Self {
            value: self.value.neg(),
            d_t: self.d_t.neg(),
            d_x: self.d_x.neg(),
        }
    }

    pub fn add_scalar(self, rhs: f64) -> Self {
        Self {
            value: self.value.add_scalar(rhs),
            ..self
        }
    }

    pub fn mul_scalar(self, rhs: f64) -> Self {
        Self {
            value: self.value.mul_scalar(rhs),
            d_t: self.d_t.mul_scalar(rhs),
            d_x: self.d_x.mul_scalar(rhs),
        }
    }

    pub fn square(self) -> Self {
        self.clone() * self
    }
}

impl<B: Backend> Add for Jet<B> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
            d_t: self.d_t + rhs.d_t,
            d_x: self.d_x + rhs.d_x,
        }
    }
}

impl<B: Backend> Sub for Jet<B> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + rhs.neg()
    }
}

impl<B: Backend> Mul for Jet<B> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            d_t: self.d_t * rhs.value.clone() + rhs.d_t * self.value.clone(),
            d_x: self.d_x * rhs.value.clone() + rhs.d_x * self.value.clone(),
            value: self.value * rhs.value,
        }
    }
}

impl<B: Backend> Div for Jet<B> {
    type Output = Self;

    // (a / b)' = (a' - (a / b) b') / b
    fn div(self, rhs: Self) -> Self {
        let value = self.value / rhs.value.clone();
        Self {
            d_t: (self.d_t - value.clone() * rhs.d_t) / rhs.value.clone(),
            d_x: (self.d_x - value.clone() * rhs.d_x) / rhs.value,
            value,
        }
    }
}

/// `inputs` を微分の根として `f` を評価し、値と勾配を持つジェットを返します。
///
/// 返されたジェットはさらに別の計算に渡すことができ、その結果からも
/// 同じ根に関する勾配を取り出せます。
pub fn differentiate<B, F>(inputs: Tensor<B, 2>, f: F) -> Result<Jet<B>, PinnError>
where
    B: Backend,
    F: FnOnce(Jet<B>) -> Jet<B>,
{
    Ok(f(Jet::root(inputs)?))
}
