//! 解の書き出し。
//!
//! 空間軸 `x`、時間軸 `t`、解 `u` の3つの名前付き配列を1つのJSONファイルに保存します。
//! `u` は長さ `n_x * n_t` で、x が外側、t が内側の順に並びます。

use crate::domain::SpaceTime;
use crate::error::PinnError;
use crate::inference::ResultField;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// 解を保存するファイル名
pub const SOLUTION_FILENAME: &str = "buckley_leverett.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub x: Vec<f32>,
    pub t: Vec<f32>,
    pub u: Vec<f32>,
}

impl Solution {
    pub fn new(axes: &SpaceTime, field: ResultField) -> Result<Self, PinnError> {
        if field.n_x() != axes.x.len() || field.n_t() != axes.t.len() {
            return Err(PinnError::ShapeMismatch {
                context: "解と評価軸",
                expected: vec![axes.x.len(), axes.t.len()],
                actual: vec![field.n_x(), field.n_t()],
            });
        }
        Ok(Self {
            x: axes.x.values().to_vec(),
            t: axes.t.values().to_vec(),
            u: field.into_values(),
        })
    }

    /// `x` のインデックス `i_x`、`t` のインデックス `i_t` での値。
    pub fn value(&self, i_x: usize, i_t: usize) -> f32 {
        self.u[i_x * self.t.len() + i_t]
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PinnError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PinnError> {
        let reader = BufReader::new(File::open(path)?);
        let solution: Self = serde_json::from_reader(reader)?;
        if solution.u.len() != solution.x.len() * solution.t.len() {
            return Err(PinnError::ShapeMismatch {
                context: "保存された解",
                expected: vec![solution.x.len() * solution.t.len()],
                actual: vec![solution.u.len()],
            });
        }
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainConfig;
    use crate::domain::build_axes;

    #[test]
    fn saves_three_named_arrays() {
        let axes = build_axes(&DomainConfig::new().with_n_x(3).with_n_t(2)).unwrap();
        let field = ResultField::new(3, 2, vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]).unwrap();
        let solution = Solution::new(&axes.physical, field).unwrap();
        assert_eq!(solution.value(1, 1), 0.3);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SOLUTION_FILENAME);
        solution.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["x"].as_array().unwrap().len(), 3);
        assert_eq!(raw["t"].as_array().unwrap().len(), 2);
        assert_eq!(raw["u"].as_array().unwrap().len(), 6);

        assert_eq!(Solution::load(&path).unwrap(), solution);
    }

    #[test]
    fn rejects_field_from_another_grid() {
        let axes = build_axes(&DomainConfig::new().with_n_x(3).with_n_t(2)).unwrap();
        let field = ResultField::new(2, 3, vec![0.0; 6]).unwrap();
        assert!(Solution::new(&axes.physical, field).is_err());
    }
}
