//! Writes a legacy-layout titanium calibration (unsorted, overlapping, with a
//! blank row) and a matching synthetic spectrum, for trying out `tof-calib`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::json;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn generate_spectrum(
    masses: &[f64],
    peaks: &[(f64, f64, f64)],
    baseline: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    masses
        .iter()
        .map(|&m| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(m, mu, sigma, amp))
                .sum();
            let mean = signal + baseline;
            // counting noise, clipped at zero
            rng.gauss(mean, mean.sqrt()).round().max(0.0)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Titanium isotopes: (name, mass, abundance in %).
const TITANIUM: [(&str, f64, f64); 5] = [
    ("Ti-46", 45.953, 8.25),
    ("Ti-47", 46.952, 7.44),
    ("Ti-48", 47.948, 73.72),
    ("Ti-49", 48.948, 5.41),
    ("Ti-50", 49.945, 5.18),
];

fn main() -> Result<()> {
    env_logger::init();
    let out_dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_default();
    let mut rng = SimpleRng::new(42);

    // Masses: 44.0 → 52.0, step 0.01
    let masses: Vec<f64> = (0..=800).map(|i| 44.0 + i as f64 * 0.01).collect();
    let peaks: Vec<(f64, f64, f64)> = TITANIUM
        .iter()
        .map(|&(_, mu, abu)| (mu, 0.04, abu * 20.0))
        .collect();
    let counts = generate_spectrum(&masses, &peaks, 2.0, &mut rng);

    let spectrum_path = out_dir.join("sample_spectrum.csv");
    let mut writer = csv::Writer::from_path(&spectrum_path)
        .with_context(|| format!("creating {}", spectrum_path.display()))?;
    writer.write_record(["mass", "counts"])?;
    for (m, c) in masses.iter().zip(&counts) {
        writer.write_record([format!("{m:.2}"), c.to_string()])?;
    }
    writer.flush()?;

    // Windows of ±0.6 around masses 1 apart overlap their neighbours; the
    // order is scrambled and a blank editor row is left in.
    let order = [2usize, 0, 4, 1, 3];
    let mut names: Vec<&str> = order.iter().map(|&i| TITANIUM[i].0).collect();
    let mut values: Vec<[f64; 2]> = order
        .iter()
        .map(|&i| [TITANIUM[i].1 - 0.6, TITANIUM[i].1 + 0.6])
        .collect();
    names.insert(2, "");
    values.insert(2, [0.0, 0.0]);

    let calibration = json!({
        "integrals": { "names": names, "values": values },
        "backgrounds": {
            "names": ["low", "high", "Ti-48 shoulder"],
            "values": [[44.5, 45.2], [50.8, 51.6], [47.9, 48.1]]
        },
        "norm_isos": { "Ti": "Ti-48" },
        "mcal": [[10.512, 45.953], [11.049, 49.945]]
    });

    let calibration_path = out_dir.join("sample_calibration.json");
    std::fs::write(&calibration_path, serde_json::to_string_pretty(&calibration)?)
        .with_context(|| format!("writing {}", calibration_path.display()))?;

    println!(
        "Wrote {} bins to {} and {} peak windows to {}",
        masses.len(),
        spectrum_path.display(),
        TITANIUM.len(),
        calibration_path.display()
    );
    Ok(())
}
