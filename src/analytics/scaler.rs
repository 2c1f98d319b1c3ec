use serde::{Deserialize, Serialize};

/// Per-column standardization: `(x - mean) / scale`.
///
/// `scale` is the population standard deviation; a constant column gets
/// scale 1 so it maps to zeros instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit<const D: usize>(rows: &[[f64; D]]) -> Self {
        let n = rows.len() as f64;
        let mut mean = vec![0.0; D];
        let mut scale = vec![1.0; D];
        if rows.is_empty() {
            return Self { mean, scale };
        }

        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        for (d, s) in scale.iter_mut().enumerate() {
            let var = rows.iter().map(|row| (row[d] - mean[d]).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            *s = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        }

        Self { mean, scale }
    }

    pub fn transform<const D: usize>(&self, rows: &[[f64; D]]) -> Vec<[f64; D]> {
        rows.iter()
            .map(|row| {
                let mut out = [0.0; D];
                for (d, value) in out.iter_mut().enumerate() {
                    *value = (row[d] - self.mean[d]) / self.scale[d];
                }
                out
            })
            .collect()
    }
}
