//! Synthetic phone-spec tables with the layout of the Kaggle mobile price data.
//!
//! The price range is driven mainly by `ram`, with smaller contributions from
//! battery capacity and screen resolution, so the generated data reproduces the
//! correlation structure the analysis looks for.

use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use super::model::Frame;

/// Feature columns in source order.
pub const FEATURE_COLUMNS: [&str; 20] = [
    "battery_power",
    "blue",
    "clock_speed",
    "dual_sim",
    "fc",
    "four_g",
    "int_memory",
    "m_dep",
    "mobile_wt",
    "n_cores",
    "pc",
    "px_height",
    "px_width",
    "ram",
    "sc_h",
    "sc_w",
    "talk_time",
    "three_g",
    "touch_screen",
    "wifi",
];

pub const LABEL_COLUMN: &str = "price_range";
pub const INDEX_COLUMN: &str = "id";

/// Standard deviation of the noise added to the latent price score.
const LATENT_NOISE: f64 = 0.025;

fn flag(rng: &mut ChaCha8Rng, p: f64) -> f64 {
    if rng.gen_bool(p) { 1.0 } else { 0.0 }
}

fn generate_row(rng: &mut ChaCha8Rng, noise: &Normal<f64>) -> (Vec<f64>, f64) {
    let battery_power = rng.gen_range(501..=1998) as f64;
    let clock_speed = rng.gen_range(5..=30) as f64 / 10.0;
    let fc = rng.gen_range(0..=19) as f64;
    let pc = (fc + rng.gen_range(0..=6) as f64).min(20.0);
    let four_g = flag(rng, 0.52);
    let three_g = if four_g == 1.0 { 1.0 } else { flag(rng, 0.5) };
    let px_width = rng.gen_range(500..=1998) as f64;
    let mut px_height = (px_width * rng.gen_range(0.05..0.95)).round().max(1.0);
    let ram = rng.gen_range(256..=3998) as f64;
    let sc_h = rng.gen_range(5..=19) as f64;
    let mut sc_w = ((sc_h * rng.gen_range(0.05..0.95)).round()).max(1.0);

    // Unrecorded measurements show up as zeros.
    if rng.gen_bool(0.03) {
        px_height = 0.0;
    }
    if rng.gen_bool(0.08) {
        sc_w = 0.0;
    }

    let latent = 0.82 * (ram - 256.0) / 3742.0
        + 0.1 * (battery_power - 501.0) / 1497.0
        + 0.04 * (px_width - 500.0) / 1498.0
        + 0.04 * px_height / 1960.0
        + noise.sample(rng);
    let price_range = (latent * 4.0).floor().clamp(0.0, 3.0);

    let row = vec![
        battery_power,
        flag(rng, 0.5),
        clock_speed,
        flag(rng, 0.5),
        fc,
        four_g,
        rng.gen_range(2..=64) as f64,
        rng.gen_range(1..=10) as f64 / 10.0,
        rng.gen_range(80..=200) as f64,
        rng.gen_range(1..=8) as f64,
        pc,
        px_height,
        px_width,
        ram,
        sc_h,
        sc_w,
        rng.gen_range(2..=20) as f64,
        three_g,
        flag(rng, 0.5),
        flag(rng, 0.5),
    ];
    (row, price_range)
}

/// Generate `n` phones.
///
/// Training tables (`labelled`) carry a trailing `price_range` column; test
/// tables carry a leading `id` column (1-based) instead.
pub fn generate_phones(n: usize, seed: u64, labelled: bool) -> Result<Frame> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise = Normal::new(0.0, LATENT_NOISE).context("latent noise distribution")?;
    let mut rows = Vec::with_capacity(n);

    for i in 0..n {
        let (mut features, price_range) = generate_row(&mut rng, &noise);
        if labelled {
            features.push(price_range);
        } else {
            features.insert(0, (i + 1) as f64);
        }
        rows.push(features);
    }

    let mut columns: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
    if labelled {
        columns.push(LABEL_COLUMN.to_string());
    } else {
        columns.insert(0, INDEX_COLUMN.to_string());
    }
    Frame::from_rows(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::PriceRange;

    #[test]
    fn test_layout() {
        let train = generate_phones(50, 7, true).unwrap();
        assert_eq!(train.n_columns(), 21);
        assert_eq!(train.columns.last().map(String::as_str), Some(LABEL_COLUMN));

        let test = generate_phones(10, 8, false).unwrap();
        assert_eq!(test.columns[0], INDEX_COLUMN);
        assert_eq!(test.column(INDEX_COLUMN).unwrap()[9], 10.0);
    }

    #[test]
    fn test_labels_are_valid_and_deterministic() {
        let a = generate_phones(200, 3, true).unwrap();
        let b = generate_phones(200, 3, true).unwrap();
        assert_eq!(a, b);
        for &v in a.column(LABEL_COLUMN).unwrap() {
            assert!(PriceRange::from_value(v).is_some());
        }
    }

    #[test]
    fn test_price_range_follows_ram() {
        let f = generate_phones(400, 5, true).unwrap();
        let ram = f.column("ram").unwrap();
        let label = f.column(LABEL_COLUMN).unwrap();
        let mean_ram: Vec<f64> = (0..4)
            .map(|class| {
                let picked: Vec<f64> = ram
                    .iter()
                    .zip(label.iter())
                    .filter(|(_, &l)| l == class as f64)
                    .map(|(&r, _)| r)
                    .collect();
                picked.iter().sum::<f64>() / picked.len() as f64
            })
            .collect();
        assert!(mean_ram.windows(2).all(|w| w[0] < w[1]), "{mean_ram:?}");
    }

    #[test]
    fn test_four_g_implies_three_g() {
        let f = generate_phones(300, 11, true).unwrap();
        let four = f.column("four_g").unwrap();
        let three = f.column("three_g").unwrap();
        assert!(four.iter().zip(three.iter()).all(|(&f4, &f3)| f4 == 0.0 || f3 == 1.0));
    }
}
