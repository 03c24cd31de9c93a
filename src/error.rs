use thiserror::Error;

/// クレート全体で使用するエラー型。
#[derive(Error, Debug)]
pub enum PinnError {
    #[error("{axis} 軸の分割数は正の整数である必要があります (指定値: {count})")]
    InvalidResolution { axis: &'static str, count: usize },

    #[error("{axis} 軸の範囲が不正です: 下限 {lower} は上限 {upper} より小さくなければなりません")]
    InvalidBounds {
        axis: &'static str,
        lower: f64,
        upper: f64,
    },

    #[error("{role} のサンプル数 {requested} が候補点数 {pool} を超えています")]
    SampleCountExceedsPool {
        role: &'static str,
        requested: usize,
        pool: usize,
    },

    #[error("{context} の形状が不正です: 期待値 {expected:?}, 実際 {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("エポック {epoch} で損失が発散しました (loss_pde: {loss_pde}, loss_ic: {loss_ic})")]
    Diverged {
        epoch: usize,
        loss_pde: f64,
        loss_ic: f64,
    },

    #[error("予測値に非有限値が {count} 個含まれています（学習が発散した可能性があります）")]
    NonFiniteField { count: usize },

    #[error("ネットワーク構成が不正です: {0}")]
    InvalidModel(&'static str),

    #[error("テンソルデータの取り出しに失敗しました: {0}")]
    TensorData(String),

    #[error("設定ファイルの読み込みに失敗しました: {0}")]
    Config(String),

    #[error("モデルの保存・読み込みに失敗しました: {0}")]
    Record(#[from] burn::record::RecorderError),

    #[error("入出力エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON エラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("グラフの描画に失敗しました: {0}")]
    Plot(String),
}
