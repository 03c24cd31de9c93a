use crate::MODEL_FILENAME;
use crate::config::TrainingConfig;
use crate::domain::{Grid, build_axes, make_eval_grid, points_to_tensor};
use crate::error::PinnError;
use crate::export::{SOLUTION_FILENAME, Solution};
use crate::model::Model;
use burn::backend::NdArray;
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use std::time::Instant;
use tracing::info;

type MyBackend = NdArray<f32>;

/// 評価グリッド上の予測値。グリッドと同じ順序（x が外側、t が内側）で並びます。
#[derive(Debug, Clone, PartialEq)]
pub struct ResultField {
    n_x: usize,
    n_t: usize,
    values: Vec<f32>,
}

impl ResultField {
    pub fn new(n_x: usize, n_t: usize, values: Vec<f32>) -> Result<Self, PinnError> {
        if n_t == 0 {
            return Err(PinnError::InvalidResolution { axis: "t", count: n_t });
        }
        if values.len() != n_x * n_t {
            return Err(PinnError::ShapeMismatch {
                context: "解の配列",
                expected: vec![n_x * n_t],
                actual: vec![values.len()],
            });
        }
        Ok(Self { n_x, n_t, values })
    }

    pub fn n_x(&self) -> usize {
        self.n_x
    }

    pub fn n_t(&self) -> usize {
        self.n_t
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// x 軸インデックス `i_x`、t 軸インデックス `i_t` での値。
    pub fn at(&self, i_x: usize, i_t: usize) -> f32 {
        self.values[i_x * self.n_t + i_t]
    }

    /// `[n_x][n_t]` の2次元配列に戻します。
    pub fn rows(&self) -> Vec<Vec<f32>> {
        self.values.chunks(self.n_t).map(<[f32]>::to_vec).collect()
    }
}

/// 評価グリッド全体で1回だけ順伝播を行います。
///
/// 非有限値が含まれる場合は、発散した学習結果として扱いエラーを返します。
pub fn evaluate<B: Backend>(
    model: &Model<B>,
    grid: &Grid,
    device: &B::Device,
) -> Result<ResultField, PinnError> {
    let coords = points_to_tensor::<B>(grid.points(), device);
    let predictions = model.forward(coords);
    let values = predictions
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PinnError::TensorData(format!("{:?}", e)))?;

    let non_finite = values.iter().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        return Err(PinnError::NonFiniteField { count: non_finite });
    }
    ResultField::new(grid.n_x(), grid.n_t(), values)
}

/// `infer`サブコマンドを実行します。
///
/// 保存済みモデルを読み込み、物理領域全体で解を評価して書き出します。
pub fn run(config: &TrainingConfig, out_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let device = Default::default();
    let model_path = out_dir.join(MODEL_FILENAME);

    if !model_path.exists() {
        return Err(format!(
            "モデルファイル '{}' が見つかりません。\n最初に 'train' コマンドでモデルを学習・保存してください。",
            model_path.display()
        )
        .into());
    }
    config.validate()?;

    info!("推論を実行します - バックエンド: NdArray (CPU)");
    let inference_start = Instant::now();

    info!("保存済みモデルを '{}' からロード中...", model_path.display());
    let mut rng = StdRng::seed_from_u64(config.seed);
    let model = config
        .model
        .init::<MyBackend, _>(&mut rng, &device)?
        .load_file(
            model_path,
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            &device,
        )
        .map_err(PinnError::from)?;

    let axes = build_axes(&config.domain)?;
    let grid = make_eval_grid(&axes.physical);
    let field = evaluate(&model, &grid, &device)?;
    let inference_duration = inference_start.elapsed();

    info!(
        "推論が完了しました。入力グリッド数: {}x{}={}",
        grid.n_x(),
        grid.n_t(),
        grid.len()
    );
    info!("=> 推論時間: {:.2?}", inference_duration);

    let solution = Solution::new(&axes.physical, field)?;
    let solution_path = out_dir.join(SOLUTION_FILENAME);
    solution.save(&solution_path)?;
    info!("=> 解を '{}' に保存しました。", solution_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainConfig, ModelConfig};

    #[test]
    fn field_rows_recover_grid_order() {
        let config = DomainConfig::new().with_n_x(4).with_n_t(3);
        let axes = build_axes(&config).unwrap();
        let grid = make_eval_grid(&axes.physical);
        assert_eq!(grid.len(), 12);

        // 各点の値を x 座標そのものにすると、行ごとに x が一定になる
        let values: Vec<f32> = grid.points().iter().map(|p| p[1]).collect();
        let field = ResultField::new(grid.n_x(), grid.n_t(), values).unwrap();
        let rows = field.rows();
        assert_eq!(rows.len(), 4);
        for (i_x, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), 3);
            assert!(row.iter().all(|&v| v == axes.physical.x.values()[i_x]));
        }
        assert_eq!(field.at(2, 1), axes.physical.x.values()[2]);
    }

    #[test]
    fn evaluate_covers_every_grid_point() {
        let device = Default::default();
        let model_config = ModelConfig::new().with_hidden_width(6).with_hidden_layers(2);
        let model = model_config
            .init::<MyBackend, _>(&mut StdRng::seed_from_u64(1), &device)
            .unwrap();
        let axes = build_axes(&DomainConfig::new().with_n_x(20).with_n_t(20)).unwrap();
        let grid = make_eval_grid(&axes.physical);

        let field = evaluate(&model, &grid, &device).unwrap();
        assert_eq!(field.values().len(), 400);
        assert_eq!(field.n_x(), 20);
        assert_eq!(field.n_t(), 20);
    }

    #[test]
    fn field_rejects_wrong_length() {
        assert!(matches!(
            ResultField::new(3, 3, vec![0.0; 8]),
            Err(PinnError::ShapeMismatch { .. })
        ));
    }
}
