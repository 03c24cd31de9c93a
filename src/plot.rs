use crate::error::PinnError;
use crate::export::Solution;
use crate::training::EpochLosses;
use plotters::prelude::*;
use std::path::Path;

/// 損失グラフのファイル名
pub const LOSS_GRAPH_FILENAME: &str = "loss_graph.png";
/// 解のヒートマップのファイル名
pub const SOLUTION_PLOT_FILENAME: &str = "solution.png";

// ヒートマップの1辺あたりの最大セル数
const MAX_CELLS: usize = 200;

fn plot_err(e: impl std::fmt::Display) -> PinnError {
    PinnError::Plot(e.to_string())
}

/// 学習過程の損失をグラフとしてPNGファイルに出力します。
pub fn plot_loss_history(path: &Path, history: &[EpochLosses]) -> Result<(), PinnError> {
    let series: [(&str, RGBColor, Vec<(usize, f64)>); 3] = [
        ("Total Loss", RED, log_series(history, |l| l.total)),
        ("PDE Loss", BLUE, log_series(history, |l| l.pde)),
        ("IC Loss", GREEN, log_series(history, |l| l.ic)),
    ];
    let (min_log_loss, max_log_loss) = series
        .iter()
        .flat_map(|(_, _, points)| points.iter().map(|&(_, v)| v))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min_log_loss.is_finite() {
        return Err(PinnError::Plot("描画できる損失がありません".to_string()));
    }

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..history.len() + 1, (min_log_loss - 0.5)..(max_log_loss + 0.5))
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Epochs")
        .draw()
        .map_err(plot_err)?;
    for (label, color, points) in series {
        chart
            .draw_series(LineSeries::new(points, &color))
            .map_err(plot_err)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

fn log_series(history: &[EpochLosses], pick: impl Fn(&EpochLosses) -> f64) -> Vec<(usize, f64)> {
    history
        .iter()
        .filter(|l| pick(*l) > 0.0)
        .map(|l| (l.epoch, pick(l).log10()))
        .collect()
}

/// 解 `u(t, x)` をヒートマップとしてPNGファイルに出力します（横軸 x、縦軸 t）。
pub fn plot_solution(path: &Path, solution: &Solution) -> Result<(), PinnError> {
    let (n_x, n_t) = (solution.x.len(), solution.t.len());
    if n_x < 2 || n_t < 2 {
        return Err(PinnError::Plot("ヒートマップには各軸2点以上が必要です".to_string()));
    }
    let stride_x = n_x.div_ceil(MAX_CELLS);
    let stride_t = n_t.div_ceil(MAX_CELLS);
    let x_range = solution.x[0]..solution.x[n_x - 1];
    let t_range = solution.t[0]..solution.t[n_t - 1];

    let root = BitMapBackend::new(path, (900, 700)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("u(t, x)", ("sans-serif", 32).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, t_range)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("x")
        .y_desc("t")
        .draw()
        .map_err(plot_err)?;

    let cells = (0..n_x - 1).step_by(stride_x).flat_map(|i_x| {
        (0..n_t - 1).step_by(stride_t).map(move |i_t| {
            let x1 = solution.x[(i_x + stride_x).min(n_x - 1)];
            let t1 = solution.t[(i_t + stride_t).min(n_t - 1)];
            let color = saturation_color(solution.value(i_x, i_t));
            Rectangle::new(
                [(solution.x[i_x], solution.t[i_t]), (x1, t1)],
                color.filled(),
            )
        })
    });
    chart.draw_series(cells).map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

// 0 を青、1 を赤に対応させる
fn saturation_color(u: f32) -> HSLColor {
    let u = f64::from(u.clamp(0.0, 1.0));
    HSLColor((1.0 - u) * 2.0 / 3.0, 0.85, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_series_skips_non_positive_losses() {
        let history = [
            EpochLosses { epoch: 1, pde: 10.0, ic: 0.0, total: 1.0 },
            EpochLosses { epoch: 2, pde: 0.01, ic: 1.0, total: 0.1 },
        ];
        let pde = log_series(&history, |l| l.pde);
        assert_eq!(pde.len(), 2);
        assert!((pde[0].1 - 1.0).abs() < 1e-12);
        assert!((pde[1].1 + 2.0).abs() < 1e-12);
        let ic = log_series(&history, |l| l.ic);
        assert_eq!(ic, vec![(2, 0.0)]);
    }

    #[test]
    fn colors_span_blue_to_red() {
        assert_eq!(saturation_color(0.0).0, 2.0 / 3.0);
        assert_eq!(saturation_color(1.0).0, 0.0);
        assert_eq!(saturation_color(7.0).0, 0.0);
    }

    #[test]
    fn empty_history_is_reported() {
        let dir = std::env::temp_dir().join("bl_pinn_empty_loss.png");
        assert!(matches!(plot_loss_history(&dir, &[]), Err(PinnError::Plot(_))));
    }
}
