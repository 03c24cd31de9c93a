use crate::config::TrainingConfig;
use crate::error::PinnError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "A Physics-Informed Neural Network (PINN) for the Buckley-Leverett problem with Burn", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 実行するサブコマンドを定義します。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// PINNモデルを学習し、モデルと解をファイルに保存します
    Train(TrainArgs),
    /// 保存されたPINNモデルを使い、全領域で解を評価します
    Infer(InferArgs),
    /// 参照構成をJSONファイルに書き出します
    Config {
        #[arg(long, default_value = "config.json")]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// 設定ファイル（JSON）。省略時は参照構成
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub epochs: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// 出力先ディレクトリ
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct InferArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
}

/// 設定ファイルを読み込み（なければ参照構成）、コマンドライン引数で上書きします。
pub fn resolve_config(
    path: Option<&PathBuf>,
    epochs: Option<usize>,
    seed: Option<u64>,
) -> Result<TrainingConfig, PinnError> {
    let mut config = match path {
        Some(path) => TrainingConfig::from_file(path)?,
        None => TrainingConfig::reference(),
    };
    if let Some(epochs) = epochs {
        config.epochs = epochs;
    }
    if let Some(seed) = seed {
        config.seed = seed;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_train_overrides() {
        let cli = Cli::parse_from(["bl_pinn", "train", "--epochs", "5", "--seed", "3", "--out", "runs"]);
        let Commands::Train(args) = cli.command else {
            panic!("train が解釈されませんでした");
        };
        assert_eq!(args.epochs, Some(5));
        assert_eq!(args.out, PathBuf::from("runs"));

        let config = resolve_config(args.config.as_ref(), args.epochs, args.seed).unwrap();
        assert_eq!(config.epochs, 5);
        assert_eq!(config.seed, 3);
        assert_eq!(config.domain.n_x, 1000);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let path = PathBuf::from("does/not/exist.json");
        assert!(matches!(
            resolve_config(Some(&path), None, None),
            Err(PinnError::Config(_))
        ));
    }
}
