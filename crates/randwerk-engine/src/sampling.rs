// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sampling planner — selects which documents of the discovered population are
// analyzed.
//
// Statistical samples use the finite-population proportion formula with a
// worst-case proportion of 0.5. Every random draw is seeded; when the caller
// gives no seed one is generated and recorded so the run can be repeated.

use rand::SeedableRng;
use rand::rngs::StdRng;
use randwerk_core::config::SamplingPolicy;
use randwerk_core::error::Result;
use randwerk_core::types::{Document, SamplingPlan};
use tracing::info;

/// Worst-case proportion for the sample-size formula.
const WORST_CASE_PROPORTION: f64 = 0.5;

/// Smallest statistical sample, unless the population is smaller.
pub const MIN_STATISTICAL_SAMPLE: usize = 30;

/// Confidence used to report the achieved margin of error of a random-N draw.
pub const REPORTING_CONFIDENCE: f64 = 95.0;

/// Build the sampling plan for `population` under `policy`.
///
/// The policy is validated first; invalid parameters are a configuration
/// error and nothing is drawn.
pub fn plan(population: Vec<Document>, policy: &SamplingPolicy) -> Result<SamplingPlan> {
    policy.validate()?;
    let population_size = population.len();

    let plan = match policy {
        SamplingPolicy::Full => SamplingPlan {
            policy: policy.clone(),
            documents: population,
            population_size,
            requested_size: population_size,
            seed: None,
            achieved_margin_of_error: None,
        },
        SamplingPolicy::Statistical {
            confidence,
            margin_of_error,
            seed,
        } => {
            let requested = statistical_sample_size(population_size, *confidence, *margin_of_error);
            let seed = seed.unwrap_or_else(rand::random);
            let documents = draw(population, requested, seed);
            SamplingPlan {
                policy: policy.clone(),
                achieved_margin_of_error: achieved_margin_of_error(
                    documents.len(),
                    population_size,
                    *confidence,
                ),
                documents,
                population_size,
                requested_size: requested,
                seed: Some(seed),
            }
        }
        SamplingPolicy::RandomN { n, seed } => {
            let seed = seed.unwrap_or_else(rand::random);
            let documents = draw(population, *n, seed);
            SamplingPlan {
                policy: policy.clone(),
                achieved_margin_of_error: achieved_margin_of_error(
                    documents.len(),
                    population_size,
                    REPORTING_CONFIDENCE,
                ),
                documents,
                population_size,
                requested_size: *n,
                seed: Some(seed),
            }
        }
    };

    info!(
        method = plan.policy.method_name(),
        population = plan.population_size,
        sample = plan.sample_size(),
        seed = ?plan.seed,
        "Sampling plan ready"
    );

    Ok(plan)
}

/// Draw `n` documents without replacement, keeping population order.
fn draw(population: Vec<Document>, n: usize, seed: u64) -> Vec<Document> {
    let total = population.len();
    if n >= total {
        return population;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut selected = vec![false; total];
    for index in rand::seq::index::sample(&mut rng, total, n) {
        selected[index] = true;
    }
    population
        .into_iter()
        .zip(selected)
        .filter_map(|(doc, keep)| keep.then_some(doc))
        .collect()
}

/// Required sample size for estimating a proportion.
///
/// n = z²·p(1−p)·N / (N·E² + z²·p(1−p)), rounded up, then raised to
/// `min(30, N)`. Percentages are given as e.g. 95 and 5.
pub fn statistical_sample_size(population: usize, confidence: f64, margin_of_error: f64) -> usize {
    if population == 0 {
        return 0;
    }
    let z = z_score(confidence);
    let e = margin_of_error / 100.0;
    let n_pop = population as f64;
    let pq = WORST_CASE_PROPORTION * (1.0 - WORST_CASE_PROPORTION);

    let n = (z * z * pq * n_pop) / (n_pop * e * e + z * z * pq);
    let n = (n.ceil() as usize).min(population);
    n.max(MIN_STATISTICAL_SAMPLE.min(population))
}

/// Margin of error (percent) achieved by a sample of `sample` out of
/// `population`, with finite-population correction. `None` for an empty sample.
pub fn achieved_margin_of_error(sample: usize, population: usize, confidence: f64) -> Option<f64> {
    if sample == 0 || population == 0 {
        return None;
    }
    if population == 1 || sample >= population {
        return Some(0.0);
    }
    let z = z_score(confidence);
    let n = sample as f64;
    let n_pop = population as f64;
    let pq = WORST_CASE_PROPORTION * (1.0 - WORST_CASE_PROPORTION);
    let fpc = ((n_pop - n) / (n_pop - 1.0)).sqrt();
    Some(z * (pq / n).sqrt() * fpc * 100.0)
}

/// Two-sided critical value for a confidence level given in percent.
pub fn z_score(confidence: f64) -> f64 {
    let alpha = 1.0 - confidence / 100.0;
    inverse_normal_cdf(1.0 - alpha / 2.0)
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_671_348_242_06,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p <= 0.0 {
        f64::NEG_INFINITY
    } else if p >= 1.0 {
        f64::INFINITY
    } else if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}
