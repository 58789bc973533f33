use std::f64::consts::TAU;

/// Zero-phase low-pass filter: forward DFT, zero every bin at or above the
/// cutoff frequency, inverse DFT, keep the real part.
///
/// The transform is evaluated directly in O(n²); thrust tables are a few
/// thousand samples at most.
///
/// A non-positive `cutoff_hz` disables filtering and returns the input.
pub fn lowpass_zero_phase(samples: &[f64], dt: f64, cutoff_hz: f64) -> Vec<f64> {
    let n = samples.len();
    if n < 2 || cutoff_hz <= 0.0 {
        return samples.to_vec();
    }

    let nf = n as f64;

    let mut re = vec![0.0; n];
    let mut im = vec![0.0; n];
    for k in 0..n {
        let w = TAU * k as f64 / nf;
        for (j, &s) in samples.iter().enumerate() {
            let ang = w * j as f64;
            re[k] += s * ang.cos();
            im[k] -= s * ang.sin();
        }
    }

    for k in 0..n {
        let f = bin_frequency(k, n, dt);
        if f.abs() >= cutoff_hz {
            re[k] = 0.0;
            im[k] = 0.0;
        }
    }

    let mut out = vec![0.0; n];
    for (j, o) in out.iter_mut().enumerate() {
        let w = TAU * j as f64 / nf;
        for k in 0..n {
            let ang = w * k as f64;
            *o += re[k] * ang.cos() - im[k] * ang.sin();
        }
        *o /= nf;
    }

    out
}

/// Frequency of DFT bin `k` for an `n`-point transform sampled at `dt`,
/// with the upper half of the spectrum mapped to negative frequencies.
fn bin_frequency(k: usize, n: usize, dt: f64) -> f64 {
    let k = if 2 * k < n {
        k as f64
    } else {
        k as f64 - n as f64
    };
    k / (n as f64 * dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Amplitude of the `k`-th DFT bin of `samples`.
    fn bin_amplitude(samples: &[f64], k: usize) -> f64 {
        let n = samples.len() as f64;
        let (mut re, mut im) = (0.0, 0.0);
        for (j, &s) in samples.iter().enumerate() {
            let ang = TAU * k as f64 * j as f64 / n;
            re += s * ang.cos();
            im -= s * ang.sin();
        }
        (re * re + im * im).sqrt()
    }

    #[test]
    fn test_cutoff_removes_high_bins() {
        // 2 Hz + 12 Hz tones, 1 s of samples at 100 Hz
        let dt = 0.01;
        let n = 100;
        let samples: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 * dt;
                (TAU * 2.0 * t).sin() + (TAU * 12.0 * t).sin()
            })
            .collect();

        let filtered = lowpass_zero_phase(&samples, dt, 10.0);

        // bin k corresponds to k Hz here
        assert!(bin_amplitude(&filtered, 12) < 1e-7);
        assert_relative_eq!(
            bin_amplitude(&filtered, 2),
            bin_amplitude(&samples, 2),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_dc_preserved() {
        let samples = vec![3.0; 64];
        let filtered = lowpass_zero_phase(&samples, 0.05, 4.0);
        for s in filtered {
            assert_relative_eq!(s, 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_disabled_cutoff_is_identity() {
        let samples = vec![1.0, -2.0, 3.5];
        assert_eq!(lowpass_zero_phase(&samples, 0.1, 0.0), samples);
    }
}
