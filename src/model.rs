use crate::config::ModelConfig;
use crate::error::PinnError;
use crate::jet::Jet;
use burn::module::{Module, Param};
use burn::nn::{Linear, Tanh};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use rand::Rng;

/// 層の後に適用する活性化関数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Tanh,
}

/// 1つの全結合層の記述子。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSpec {
    pub d_input: usize,
    pub d_output: usize,
    pub activation: Option<Activation>,
}

impl ModelConfig {
    /// 入力層から出力層までの層の並び。最後の層だけ活性化関数を持ちません。
    pub fn layer_specs(&self) -> Vec<LayerSpec> {
        let mut specs = Vec::with_capacity(self.hidden_layers + 1);
        let mut d_input = self.d_input;
        for _ in 0..self.hidden_layers {
            specs.push(LayerSpec {
                d_input,
                d_output: self.hidden_width,
                activation: Some(Activation::Tanh),
            });
            d_input = self.hidden_width;
        }
        specs.push(LayerSpec {
            d_input,
            d_output: self.d_output,
            activation: None,
        });
        specs
    }

    /// 与えられた乱数源でパラメータを初期化したモデルを作ります。
    pub fn init<B: Backend, R: Rng>(
        &self,
        rng: &mut R,
        device: &B::Device,
    ) -> Result<Model<B>, PinnError> {
        Model::from_specs(&self.layer_specs(), rng, device)
    }
}

/// PINNの本体となるニューラルネットワークモデル。
///
/// 座標(t, x)を入力とし、その点における飽和度uを予測する多層パーセプトロン（MLP）です。
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
    activation: Tanh,
}

impl<B: Backend> Model<B> {
    /// 層の記述子の並びからモデルを組み立てます。
    ///
    /// 重みとバイアスは `U(-1/√fan_in, 1/√fan_in)` から引きます。
    pub fn from_specs<R: Rng>(
        specs: &[LayerSpec],
        rng: &mut R,
        device: &B::Device,
    ) -> Result<Self, PinnError> {
        let (last, hidden_specs) = specs
            .split_last()
            .ok_or(PinnError::InvalidModel("層が1つもありません"))?;
        if last.activation.is_some() {
            return Err(PinnError::InvalidModel("出力層に活性化関数は付けられません"));
        }
        if hidden_specs.iter().any(|s| s.activation != Some(Activation::Tanh)) {
            return Err(PinnError::InvalidModel("隠れ層の活性化関数は tanh のみです"));
        }
        if specs.windows(2).any(|w| w[0].d_output != w[1].d_input) {
            return Err(PinnError::InvalidModel("隣り合う層の次元が一致しません"));
        }

        let hidden = hidden_specs
            .iter()
            .map(|spec| init_linear(spec, &mut *rng, device))
            .collect();
        Ok(Self {
            hidden,
            output: init_linear(last, rng, device),
            activation: Tanh::new(),
        })
    }

    /// モデルの順伝播を実行します。
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for layer in &self.hidden {
            x = self.activation.forward(layer.forward(x));
        }
        self.output.forward(x)
    }

    /// 入力の微分を伴う順伝播。
    pub fn forward_jet(&self, input: Jet<B>) -> Jet<B> {
        let mut jet = input;
        for layer in &self.hidden {
            jet = jet.linear(layer).tanh();
        }
        jet.linear(&self.output)
    }

    /// 全層の重みをゼロにし、出力が常に `value` になるモデルを作ります。
    #[cfg(test)]
    pub(crate) fn constant(config: &ModelConfig, value: f32, device: &B::Device) -> Self {
        let zero_linear = |spec: &LayerSpec, bias: f32| Linear {
            weight: Param::from_tensor(Tensor::zeros([spec.d_input, spec.d_output], device)),
            bias: Some(Param::from_tensor(Tensor::full([spec.d_output], bias, device))),
        };
        let specs = config.layer_specs();
        let (last, hidden) = specs.split_last().unwrap();
        Self {
            hidden: hidden.iter().map(|s| zero_linear(s, 0.0)).collect(),
            output: zero_linear(last, value),
            activation: Tanh::new(),
        }
    }
}

fn init_linear<B: Backend, R: Rng>(
    spec: &LayerSpec,
    rng: &mut R,
    device: &B::Device,
) -> Linear<B> {
    let bound = 1.0 / (spec.d_input as f32).sqrt();
    let mut uniform = |n: usize| -> Vec<f32> {
        (0..n).map(|_| rng.random_range(-bound..bound)).collect()
    };
    let weight = uniform(spec.d_input * spec.d_output);
    let bias = uniform(spec.d_output);
    Linear {
        weight: Param::from_tensor(
            Tensor::<B, 1>::from_floats(weight.as_slice(), device)
                .reshape([spec.d_input, spec.d_output]),
        ),
        bias: Some(Param::from_tensor(Tensor::<B, 1>::from_floats(
            bias.as_slice(),
            device,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::points_to_tensor;
    use burn::backend::NdArray;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    type TestBackend = NdArray<f32>;

    fn model(seed: u64) -> Model<TestBackend> {
        let config = ModelConfig::new().with_hidden_width(8).with_hidden_layers(3);
        config
            .init(&mut StdRng::seed_from_u64(seed), &Default::default())
            .unwrap()
    }

    #[test]
    fn reference_topology() {
        let specs = ModelConfig::new().layer_specs();
        assert_eq!(specs.len(), 7);
        assert_eq!(specs[0].d_input, 2);
        assert!(specs[..6].iter().all(|s| s.d_output == 30));
        assert_eq!(specs[6].d_output, 1);
        assert_eq!(specs[6].activation, None);
    }

    #[test]
    fn rejects_inconsistent_specs() {
        let mut rng = StdRng::seed_from_u64(0);
        let device = Default::default();
        let specs = [
            LayerSpec { d_input: 2, d_output: 4, activation: Some(Activation::Tanh) },
            LayerSpec { d_input: 5, d_output: 1, activation: None },
        ];
        assert!(Model::<TestBackend>::from_specs(&specs, &mut rng, &device).is_err());

        let specs = [LayerSpec { d_input: 2, d_output: 1, activation: Some(Activation::Tanh) }];
        assert!(Model::<TestBackend>::from_specs(&specs, &mut rng, &device).is_err());
        assert!(Model::<TestBackend>::from_specs(&[], &mut rng, &device).is_err());
    }

    #[test]
    fn forward_produces_one_column() {
        let points = [[0.0, -1.0], [0.5, 0.0], [1.5, 1.0]];
        let output = model(1).forward(points_to_tensor(&points, &Default::default()));
        assert_eq!(output.dims(), [3, 1]);
    }

    #[test]
    fn seeded_initialisation_is_reproducible() {
        let points = points_to_tensor::<TestBackend>(&[[0.2, 0.3]], &Default::default());
        let a = model(42).forward(points.clone()).into_data().to_vec::<f32>().unwrap();
        let b = model(42).forward(points.clone()).into_data().to_vec::<f32>().unwrap();
        let c = model(43).forward(points).into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn jet_matches_plain_forward_and_finite_differences() {
        let model = model(7);
        let device = Default::default();
        let points = [[0.3_f32, -0.4_f32], [1.1, 0.8]];
        let h = 1e-2_f32;

        let jet = model.forward_jet(Jet::root(points_to_tensor(&points, &device)).unwrap());
        let value = jet.value().into_data().to_vec::<f32>().unwrap();
        let grad = jet.gradient().into_data().to_vec::<f32>().unwrap();
        let plain = model
            .forward(points_to_tensor(&points, &device))
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        let eval = |p: [f32; 2]| -> f32 {
            model.forward(points_to_tensor(&[p], &device)).into_data().to_vec::<f32>().unwrap()[0]
        };
        for (i, [t, x]) in points.iter().copied().enumerate() {
            assert!((value[i] - plain[i]).abs() < 1e-6);
            let u_t = (eval([t + h, x]) - eval([t - h, x])) / (2.0 * h);
            let u_x = (eval([t, x + h]) - eval([t, x - h])) / (2.0 * h);
            assert!((grad[2 * i] - u_t).abs() < 1e-3, "u_t {} vs {}", grad[2 * i], u_t);
            assert!((grad[2 * i + 1] - u_x).abs() < 1e-3, "u_x {} vs {}", grad[2 * i + 1], u_x);
        }
    }
}
