use crate::MODEL_FILENAME;
use crate::config::TrainingConfig;
use crate::domain::{
    Axes, IcSamples, InteriorSamples, build_axes, make_eval_grid, make_grid, points_to_tensor,
    sample_ic, sample_interior,
};
use crate::error::PinnError;
use crate::export::{SOLUTION_FILENAME, Solution};
use crate::inference::evaluate;
use crate::model::Model;
use crate::pinn::{ic_loss, residual_loss};
use crate::plot;
use burn::backend::{Autodiff, NdArray};
use burn::module::{AutodiffModule, Module};
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

type MyBackend = Autodiff<NdArray<f32>>;

/// 学習中に使い回す固定の学習点。
#[derive(Debug, Clone)]
pub struct TrainingBatches<B: Backend> {
    pub interior: Tensor<B, 2>,
    pub ic_points: Tensor<B, 2>,
    pub ic_targets: Tensor<B, 1>,
}

impl<B: Backend> TrainingBatches<B> {
    pub fn new(
        ic: &IcSamples,
        interior: &InteriorSamples,
        device: &B::Device,
    ) -> Result<Self, PinnError> {
        if ic.points.len() != ic.targets.len() {
            return Err(PinnError::ShapeMismatch {
                context: "初期条件点と目標値",
                expected: vec![ic.points.len()],
                actual: vec![ic.targets.len()],
            });
        }
        Ok(Self {
            interior: points_to_tensor(&interior.points, device),
            ic_points: points_to_tensor(&ic.points, device),
            ic_targets: Tensor::<B, 1>::from_floats(ic.targets.as_slice(), device),
        })
    }
}

/// 1エポック分の損失。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochLosses {
    pub epoch: usize,
    pub pde: f64,
    pub ic: f64,
    pub total: f64,
}

/// 学習の進行状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Idle,
    Running { epoch: usize },
    Converged,
}

/// 固定エポック数だけ複合損失を最小化するドライバ。
///
/// オプティマイザは `burn` の `Optimizer` を満たすものなら何でも差し替えられます。
pub struct Trainer<B: AutodiffBackend, O> {
    optim: O,
    batches: TrainingBatches<B>,
    learning_rate: f64,
    epochs: usize,
    w_pde: f64,
    w_ic: f64,
    log_interval: usize,
    state: TrainingState,
    history: Vec<EpochLosses>,
}

impl<B, O> Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Model<B>, B>,
{
    pub fn new(config: &TrainingConfig, optim: O, batches: TrainingBatches<B>) -> Self {
        Self {
            optim,
            batches,
            learning_rate: config.learning_rate,
            epochs: config.epochs,
            w_pde: config.w_pde,
            w_ic: config.w_ic,
            log_interval: config.log_interval,
            state: TrainingState::Idle,
            history: Vec::with_capacity(config.epochs),
        }
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn history(&self) -> &[EpochLosses] {
        &self.history
    }

    /// 1エポック分の更新を行います。終了済みならモデルをそのまま返します。
    pub fn step(&mut self, model: Model<B>) -> Result<Model<B>, PinnError> {
        let epoch = match self.state {
            TrainingState::Converged => return Ok(model),
            _ if self.epochs == 0 => {
                self.state = TrainingState::Converged;
                return Ok(model);
            }
            TrainingState::Idle => 1,
            TrainingState::Running { epoch } => epoch + 1,
        };
        self.state = TrainingState::Running { epoch };

        // 勾配は backward ごとに新しく作られるので、ゼロクリアは不要
        let loss_pde = residual_loss(&model, self.batches.interior.clone())?;
        let loss_ic = ic_loss(
            &model,
            self.batches.ic_points.clone(),
            self.batches.ic_targets.clone(),
        )?;
        let loss = loss_pde.clone().mul_scalar(self.w_pde) + loss_ic.clone().mul_scalar(self.w_ic);

        let losses = EpochLosses {
            epoch,
            pde: loss_pde.into_scalar().elem::<f64>(),
            ic: loss_ic.into_scalar().elem::<f64>(),
            total: loss.clone().into_scalar().elem::<f64>(),
        };
        if !(losses.pde.is_finite() && losses.ic.is_finite()) {
            return Err(PinnError::Diverged {
                epoch,
                loss_pde: losses.pde,
                loss_ic: losses.ic,
            });
        }
        if self.log_interval > 0 && epoch % self.log_interval == 0 {
            info!(
                "epoch {} loss_pde:{:.8}, loss_ic:{:.8}, loss:{:.6}",
                epoch, losses.pde, losses.ic, losses.total
            );
        }
        self.history.push(losses);

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        let model = self.optim.step(self.learning_rate, model, grads);

        if epoch >= self.epochs {
            self.state = TrainingState::Converged;
        }
        Ok(model)
    }

    /// 終了状態になるまで学習を続けます。
    pub fn fit(&mut self, mut model: Model<B>) -> Result<Model<B>, PinnError> {
        while self.state != TrainingState::Converged {
            model = self.step(model)?;
        }
        Ok(model)
    }
}

/// 学習の結果一式。
pub struct TrainingOutcome<B: AutodiffBackend> {
    pub model: Model<B>,
    pub axes: Axes,
    pub history: Vec<EpochLosses>,
    pub elapsed: Duration,
}

/// 設定の検証、サンプリング、モデルの初期化、学習までを行います。
///
/// 乱数源は `config.seed` から1つだけ作り、サンプリングと初期化の両方に渡します。
pub fn train<B: AutodiffBackend>(
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<TrainingOutcome<B>, PinnError> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    // --- データセットの準備 ---
    let axes = build_axes(&config.domain)?;
    let grid = make_grid(&axes.auxiliary.x, &axes.auxiliary.t);
    let ic = sample_ic(&mut rng, config.sampling.n_ic, &axes.auxiliary.x, &grid)?;
    let interior = sample_interior(&mut rng, config.sampling.n_f, &grid)?;
    let batches = TrainingBatches::<B>::new(&ic, &interior, device)?;

    // --- モデルとオプティマイザの初期化 ---
    let model = config.model.init::<B, _>(&mut rng, device)?;
    let optim = config.optimizer.init::<B, Model<B>>();
    let mut trainer = Trainer::new(config, optim, batches);

    info!(
        "学習を開始します (Buckley-Leverett) - 内部点: {}, 初期条件点: {}, エポック数: {}",
        config.sampling.n_f, config.sampling.n_ic, config.epochs
    );
    let training_start = Instant::now();
    let model = trainer.fit(model)?;
    let elapsed = training_start.elapsed();
    info!("学習が完了しました。学習時間: {:.2?}", elapsed);

    Ok(TrainingOutcome {
        model,
        axes,
        history: trainer.history().to_vec(),
        elapsed,
    })
}

/// `train`サブコマンドを実行します。
///
/// 学習、損失グラフの描画、モデルの保存、全領域での評価と結果の書き出しを行います。
pub fn run(config: &TrainingConfig, out_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let device = Default::default();
    std::fs::create_dir_all(out_dir)?;

    let outcome = train::<MyBackend>(config, &device)?;

    // --- 結果の保存と描画 ---
    let loss_path = out_dir.join(plot::LOSS_GRAPH_FILENAME);
    match plot::plot_loss_history(&loss_path, &outcome.history) {
        Ok(()) => info!("=> 損失グラフを '{}' に保存しました。", loss_path.display()),
        Err(e) => warn!("損失グラフの描画に失敗しました: {}", e),
    }

    let model_path = out_dir.join(MODEL_FILENAME);
    outcome
        .model
        .clone()
        .save_file(&model_path, &NamedMpkFileRecorder::<FullPrecisionSettings>::new())
        .map_err(PinnError::from)?;
    info!("=> モデルを '{}' に保存しました。", model_path.display());

    let eval_grid = make_eval_grid(&outcome.axes.physical);
    let field = evaluate(&outcome.model.valid(), &eval_grid, &device)?;
    let solution = Solution::new(&outcome.axes.physical, field)?;
    let solution_path = out_dir.join(SOLUTION_FILENAME);
    solution.save(&solution_path)?;
    info!("=> 解を '{}' に保存しました。", solution_path.display());

    let heatmap_path = out_dir.join(plot::SOLUTION_PLOT_FILENAME);
    if let Err(e) = plot::plot_solution(&heatmap_path, &solution) {
        warn!("解のヒートマップの描画に失敗しました: {}", e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainConfig, ModelConfig, SamplingConfig};
    use burn::optim::AdamConfig;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn tiny_config(epochs: usize) -> TrainingConfig {
        TrainingConfig::new(
            ModelConfig::new().with_hidden_width(8).with_hidden_layers(2),
            DomainConfig::new().with_n_x(12).with_n_t(12),
            SamplingConfig::new().with_n_ic(6).with_n_f(30),
            AdamConfig::new(),
        )
        .with_epochs(epochs)
        .with_seed(17)
    }

    fn tiny_trainer(
        config: &TrainingConfig,
    ) -> (Model<TestBackend>, Trainer<TestBackend, impl Optimizer<Model<TestBackend>, TestBackend>>)
    {
        let device = Default::default();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let axes = build_axes(&config.domain).unwrap();
        let grid = make_grid(&axes.auxiliary.x, &axes.auxiliary.t);
        let ic = sample_ic(&mut rng, config.sampling.n_ic, &axes.auxiliary.x, &grid).unwrap();
        let interior = sample_interior(&mut rng, config.sampling.n_f, &grid).unwrap();
        let batches = TrainingBatches::new(&ic, &interior, &device).unwrap();
        let model = config.model.init(&mut rng, &device).unwrap();
        let optim = config.optimizer.init::<TestBackend, Model<TestBackend>>();
        (model, Trainer::new(config, optim, batches))
    }

    #[test]
    fn state_machine_runs_to_converged() {
        let config = tiny_config(3);
        let (model, mut trainer) = tiny_trainer(&config);
        assert_eq!(trainer.state(), TrainingState::Idle);

        let model = trainer.step(model).unwrap();
        assert_eq!(trainer.state(), TrainingState::Running { epoch: 1 });
        let model = trainer.step(model).unwrap();
        let model = trainer.step(model).unwrap();
        assert_eq!(trainer.state(), TrainingState::Converged);

        let _ = trainer.step(model).unwrap();
        assert_eq!(trainer.history().len(), 3);
        let epochs: Vec<usize> = trainer.history().iter().map(|l| l.epoch).collect();
        assert_eq!(epochs, vec![1, 2, 3]);
    }

    #[test]
    fn total_loss_uses_fixed_weights() {
        let config = tiny_config(2);
        let (model, mut trainer) = tiny_trainer(&config);
        trainer.fit(model).unwrap();
        for losses in trainer.history() {
            let expected = 0.1 * losses.pde + 10.0 * losses.ic;
            assert!((losses.total - expected).abs() < 1e-4 * expected.max(1.0));
        }
    }

    #[test]
    fn zero_epochs_converge_immediately() {
        let config = tiny_config(0);
        let (model, mut trainer) = tiny_trainer(&config);
        trainer.fit(model).unwrap();
        assert_eq!(trainer.state(), TrainingState::Converged);
        assert!(trainer.history().is_empty());
    }

    #[test]
    fn mismatched_ic_samples_are_rejected() {
        let ic = IcSamples {
            points: vec![[0.0, 0.1], [0.0, 0.2]],
            targets: vec![0.0],
        };
        let interior = InteriorSamples {
            points: vec![[0.5, 0.5]],
        };
        let result = TrainingBatches::<TestBackend>::new(&ic, &interior, &Default::default());
        assert!(matches!(result, Err(PinnError::ShapeMismatch { .. })));
    }

    #[test]
    fn invalid_config_fails_before_training() {
        let mut config = tiny_config(1);
        config.sampling.n_ic = 13;
        let result = train::<TestBackend>(&config, &Default::default());
        assert!(matches!(
            result,
            Err(PinnError::SampleCountExceedsPool { requested: 13, pool: 12, .. })
        ));
    }
}
