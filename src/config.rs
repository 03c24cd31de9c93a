//! 学習・推論で使用する設定値。
//!
//! いずれも `burn` の `Config` として定義しているため、JSONファイルとして
//! 保存・読み込みができます。既定値は参照構成（1000x1000グリッド、6層x30ユニット）です。

use crate::error::PinnError;
use burn::config::Config;
use burn::optim::AdamConfig;
use std::path::Path;

/// ニューラルネットワークの構成。
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 入力次元 (t, x)
    #[config(default = 2)]
    pub d_input: usize,
    /// 隠れ層のユニット数
    #[config(default = 30)]
    pub hidden_width: usize,
    /// 隠れ層の数（各層の後に tanh が入る）
    #[config(default = 6)]
    pub hidden_layers: usize,
    /// 出力次元 u
    #[config(default = 1)]
    pub d_output: usize,
}

/// 時空間領域の構成。
///
/// 物理領域は最終評価に、補助領域は初期条件・内部点の候補点の生成に使います。
/// 両者は同じ分割数を共有するため、平坦化したグリッドはインデックス単位で対応します。
#[derive(Config, Debug)]
pub struct DomainConfig {
    #[config(default = 1000)]
    pub n_x: usize,
    #[config(default = 1000)]
    pub n_t: usize,
    #[config(default = "-1.0")]
    pub x_lower: f64,
    #[config(default = 1.0)]
    pub x_upper: f64,
    #[config(default = "-2.625")]
    pub aux_x_lower: f64,
    #[config(default = 2.5)]
    pub aux_x_upper: f64,
    #[config(default = 0.0)]
    pub t_lower: f64,
    #[config(default = 1.5)]
    pub t_upper: f64,
}

/// 学習点のサンプル数。
#[derive(Config, Debug)]
pub struct SamplingConfig {
    /// 初期条件点の数
    #[config(default = 1000)]
    pub n_ic: usize,
    /// 内部（残差）点の数
    #[config(default = 11000)]
    pub n_f: usize,
}

/// 学習全体の構成。
#[derive(Config)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub domain: DomainConfig,
    pub sampling: SamplingConfig,
    pub optimizer: AdamConfig,
    #[config(default = 5e-4)]
    pub learning_rate: f64,
    #[config(default = 49911)]
    pub epochs: usize,
    /// PDE残差損失の重み
    #[config(default = 0.1)]
    pub w_pde: f64,
    /// 初期条件損失の重み
    #[config(default = 10.0)]
    pub w_ic: f64,
    #[config(default = 123456)]
    pub seed: u64,
    /// 何エポックごとに損失を出力するか
    #[config(default = 1)]
    pub log_interval: usize,
}

impl TrainingConfig {
    /// 参照構成を返します。
    pub fn reference() -> Self {
        Self::new(
            ModelConfig::new(),
            DomainConfig::new(),
            SamplingConfig::new(),
            AdamConfig::new(),
        )
    }

    /// JSONファイルから設定を読み込みます。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PinnError> {
        Self::load(path).map_err(|e| PinnError::Config(e.to_string()))
    }

    /// 学習を開始する前に設定値を検証します。
    pub fn validate(&self) -> Result<(), PinnError> {
        let d = &self.domain;
        if d.n_x == 0 {
            return Err(PinnError::InvalidResolution { axis: "x", count: d.n_x });
        }
        if d.n_t == 0 {
            return Err(PinnError::InvalidResolution { axis: "t", count: d.n_t });
        }
        check_bounds("x", d.x_lower, d.x_upper)?;
        check_bounds("補助 x", d.aux_x_lower, d.aux_x_upper)?;
        check_bounds("t", d.t_lower, d.t_upper)?;

        let s = &self.sampling;
        if s.n_ic > d.n_x {
            return Err(PinnError::SampleCountExceedsPool {
                role: "初期条件",
                requested: s.n_ic,
                pool: d.n_x,
            });
        }
        if s.n_f > d.n_x * d.n_t {
            return Err(PinnError::SampleCountExceedsPool {
                role: "内部点",
                requested: s.n_f,
                pool: d.n_x * d.n_t,
            });
        }

        if self.model.hidden_layers == 0 || self.model.hidden_width == 0 {
            return Err(PinnError::InvalidModel(
                "隠れ層の数とユニット数は1以上である必要があります",
            ));
        }
        if self.model.d_input != 2 || self.model.d_output != 1 {
            return Err(PinnError::InvalidModel("入力は (t, x) の2次元、出力は1次元です"));
        }
        Ok(())
    }
}

pub(crate) fn check_bounds(axis: &'static str, lower: f64, upper: f64) -> Result<(), PinnError> {
    if lower < upper {
        Ok(())
    } else {
        Err(PinnError::InvalidBounds { axis, lower, upper })
    }
}
