//! # Buckley-Leverett 問題の PINN プログラム
//!
//! `burn` フレームワークを使用して、物理情報ニューラルネットワーク（PINN）で
//! Buckley-Leverett 方程式を解きます。
//!
//! `clap` クレートを利用して、コマンドラインから`train`（学習）と`infer`（推論）の
//! 機能を個別に実行できます。
//!
//! ## 使い方
//!
//! ### 学習
//! ```bash
//! cargo run --release -- train --out runs
//! ```
//!
//! ### 推論
//! ```bash
//! cargo run --release -- infer --out runs
//! ```

use bl_pinn::cli::{Cli, Commands, resolve_config};
use bl_pinn::config::TrainingConfig;
use bl_pinn::{inference, training};
use burn::config::Config;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// プログラムのエントリーポイント。
///
/// コマンドライン引数を解析し、各サブコマンドの処理に振り分けます。
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => {
            let config = resolve_config(args.config.as_ref(), args.epochs, args.seed)?;
            training::run(&config, &args.out)?;
        }
        Commands::Infer(args) => {
            let config = resolve_config(args.config.as_ref(), None, None)?;
            inference::run(&config, &args.out)?;
        }
        Commands::Config { out } => {
            TrainingConfig::reference().save(&out)?;
            println!("=> 参照構成を '{}' に保存しました。", out.display());
        }
    }

    Ok(())
}
