//! # Buckley-Leverett 問題のための物理情報ニューラルネットワーク (PINN) ライブラリ
//!
//! `burn` フレームワークを使用して、物理情報ニューラルネットワーク（PINN）を構築し、
//! 1次元の双曲型保存則 `u_t + F(u)_x = 0`（Buckley-Leverett 方程式）を解くための
//! 主要なコンポーネントを提供します。

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod inference;
pub mod jet;
pub mod model;
pub mod pinn;
pub mod plot;
pub mod training;

/// モデルを保存するファイル名
pub const MODEL_FILENAME: &str = "pinn_model.mpk";
