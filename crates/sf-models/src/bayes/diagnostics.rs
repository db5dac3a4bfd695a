//! Convergence diagnostics for multi-chain MCMC output
//!
//! Both statistics work on split chains: every chain is cut in half (the
//! middle draw of an odd-length chain is dropped) so that drift within a
//! chain shows up as disagreement between halves.

/// Split each chain into two halves of equal length
fn split_chains(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    chains
        .iter()
        .flat_map(|chain| {
            let half = chain.len() / 2;
            let offset = chain.len() - half;
            [&chain[..half], &chain[offset..]]
        })
        .filter(|half| !half.is_empty())
        .collect()
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn sample_variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64
}

/// Split potential scale reduction factor (R-hat)
///
/// Returns 1.0 for constant draws and `f64::INFINITY` when chains are
/// individually constant but disagree.
pub fn split_r_hat(chains: &[Vec<f64>]) -> f64 {
    let halves = split_chains(chains);
    let m = halves.len();
    if m < 2 {
        return f64::NAN;
    }
    let n = halves.iter().map(|h| h.len()).min().unwrap_or(0);
    if n < 2 {
        return f64::NAN;
    }

    let means: Vec<f64> = halves.iter().map(|h| mean(&h[..n])).collect();
    let within = halves.iter().map(|h| sample_variance(&h[..n])).sum::<f64>() / m as f64;
    let between_over_n = sample_variance(&means);

    if within == 0.0 {
        return if between_over_n == 0.0 { 1.0 } else { f64::INFINITY };
    }

    let var_plus = (n - 1) as f64 / n as f64 * within + between_over_n;
    (var_plus / within).sqrt()
}

/// Effective sample size from Geyer's initial monotone sequence
pub fn effective_sample_size(chains: &[Vec<f64>]) -> f64 {
    let halves = split_chains(chains);
    let m = halves.len();
    let n = halves.iter().map(|h| h.len()).min().unwrap_or(0);
    if m == 0 || n < 4 {
        return f64::NAN;
    }
    let halves: Vec<&[f64]> = halves.iter().map(|h| &h[..n]).collect();
    let total = (m * n) as f64;

    let means: Vec<f64> = halves.iter().map(|h| mean(h)).collect();

    // Biased autocovariance of each half at lag t, averaged over halves
    let mean_autocov = |t: usize| -> f64 {
        halves
            .iter()
            .zip(&means)
            .map(|(h, &mu)| {
                (0..n - t).map(|i| (h[i] - mu) * (h[i + t] - mu)).sum::<f64>() / n as f64
            })
            .sum::<f64>()
            / m as f64
    };

    let acov0 = mean_autocov(0);
    let mean_var = acov0 * n as f64 / (n - 1) as f64;
    let mut var_plus = mean_var * (n - 1) as f64 / n as f64;
    if m > 1 {
        var_plus += sample_variance(&means);
    }
    if var_plus == 0.0 {
        return total;
    }

    let rho = |t: usize| 1.0 - (mean_var - mean_autocov(t)) / var_plus;

    let mut rho_hat = vec![0.0; n];
    rho_hat[0] = 1.0;
    let mut rho_even = 1.0;
    let mut rho_odd = rho(1);
    rho_hat[1] = rho_odd;

    // Sum paired autocorrelations while the pairs stay positive
    let mut s = 1;
    while s + 4 < n && rho_even + rho_odd > 0.0 {
        rho_even = rho(s + 1);
        rho_odd = rho(s + 2);
        if rho_even + rho_odd >= 0.0 {
            rho_hat[s + 1] = rho_even;
            rho_hat[s + 2] = rho_odd;
        }
        s += 2;
    }
    let max_s = s;

    // Enforce a monotone sequence of pair sums
    let mut s = 1;
    while s + 3 <= max_s {
        let prev = rho_hat[s - 1] + rho_hat[s];
        if rho_hat[s + 1] + rho_hat[s + 2] > prev {
            rho_hat[s + 1] = prev / 2.0;
            rho_hat[s + 2] = prev / 2.0;
        }
        s += 2;
    }

    let tau = -1.0 + 2.0 * rho_hat[..=max_s.min(n - 1)].iter().sum::<f64>();
    let tau = tau.max(1.0 / total.log10());
    total / tau
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use rand_distr::StandardNormal;

    fn iid_chains(n_chains: usize, n: usize, seed: u64) -> Vec<Vec<f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n_chains)
            .map(|_| (0..n).map(|_| rng.sample(StandardNormal)).collect())
            .collect()
    }

    #[test]
    fn test_r_hat_near_one_for_iid_chains() {
        let chains = iid_chains(4, 1000, 1);
        let r_hat = split_r_hat(&chains);
        assert!((r_hat - 1.0).abs() < 0.01, "r_hat = {}", r_hat);
    }

    #[test]
    fn test_r_hat_flags_disagreeing_chains() {
        let mut chains = iid_chains(4, 500, 2);
        for x in chains[0].iter_mut() {
            *x += 5.0;
        }
        assert!(split_r_hat(&chains) > 1.05);
    }

    #[test]
    fn test_r_hat_flags_trending_chain() {
        let chains: Vec<Vec<f64>> = (0..2)
            .map(|_| (0..400).map(|i| i as f64 / 10.0).collect())
            .collect();
        assert!(split_r_hat(&chains) > 1.05);
    }

    #[test]
    fn test_r_hat_constant_draws() {
        let chains = vec![vec![2.0; 10], vec![2.0; 10]];
        assert_eq!(split_r_hat(&chains), 1.0);
        let chains = vec![vec![2.0; 10], vec![3.0; 10]];
        assert!(split_r_hat(&chains).is_infinite());
    }

    #[test]
    fn test_ess_iid_close_to_draw_count() {
        let chains = iid_chains(4, 1000, 3);
        let ess = effective_sample_size(&chains);
        assert!(ess > 2500.0 && ess < 6000.0, "ess = {}", ess);
    }

    #[test]
    fn test_ess_small_for_autocorrelated_chain() {
        // AR(1) with φ = 0.95 has τ ≈ 39
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let chains: Vec<Vec<f64>> = (0..4)
            .map(|_| {
                let mut x = 0.0;
                (0..1000)
                    .map(|_| {
                        let e: f64 = rng.sample(StandardNormal);
                        x = 0.95 * x + e;
                        x
                    })
                    .collect()
            })
            .collect();
        let ess = effective_sample_size(&chains);
        assert!(ess < 400.0, "ess = {}", ess);
    }
}
