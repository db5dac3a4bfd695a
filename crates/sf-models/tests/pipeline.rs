//! End-to-end run: panel CSV in, every family fitted, tables out

use std::fmt::Write as _;
use std::fs;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};

use sf_core::data::io::read_panel_csv;
use sf_models::{Evaluator, FamilyKind, PipelineConfig, ResultExporter, SamplerConfig};

/// Panel CSV whose strike rate is Gamma with a mean rising in CAPE×P and T
fn write_panel_csv(path: &std::path::Path, n: usize) {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut text = String::from("lon,lat,year,strikes,cape,precip,tair,wind,swr,sp,rh\n");

    for i in 0..n {
        let cape: f64 = rng.random_range(50.0..1500.0);
        let precip: f64 = rng.random_range(0.5..8.0);
        let tair: f64 = rng.random_range(270.0..305.0);
        let wind: f64 = rng.random_range(0.5..12.0);
        let swr: f64 = rng.random_range(80.0..320.0);
        let sp: f64 = rng.random_range(95000.0..103000.0);
        let rh: f64 = rng.random_range(20.0..95.0);

        let mean = (-0.5 + 0.0001 * cape * precip + 0.02 * (tair - 288.0)).exp();
        let strikes = Gamma::new(4.0, mean / 4.0).unwrap().sample(&mut rng).max(1e-6);

        writeln!(
            text,
            "{},{},{},{},{},{},{},{},{},{},{}",
            -100.0 + (i % 20) as f64,
            30.0 + (i / 20) as f64,
            2000 + i % 10,
            strikes,
            cape,
            precip,
            tair,
            wind,
            swr,
            sp,
            rh
        )
        .unwrap();
    }

    fs::write(path, text).unwrap();
}

fn quick_config() -> PipelineConfig {
    PipelineConfig {
        sampler: SamplerConfig {
            chains: 2,
            warmup: 200,
            draws: 200,
            max_leapfrog: 16,
            log_likelihood_draws: 100,
            ..SamplerConfig::default()
        },
        ..PipelineConfig::default()
    }
}

#[test]
fn test_full_pipeline_writes_every_table() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("panel.csv");
    write_panel_csv(&csv_path, 250);

    let panel = read_panel_csv(&csv_path).unwrap();
    assert!(panel.has_column("cxp"));

    let report = Evaluator::new(quick_config()).run(&panel).unwrap();
    assert_eq!(report.partition.train().len(), 200);
    assert_eq!(report.partition.test().len(), 50);

    let kinds: Vec<FamilyKind> = report.families.iter().map(|f| f.family).collect();
    assert_eq!(
        kinds,
        vec![
            FamilyKind::Linear,
            FamilyKind::GammaGlm,
            FamilyKind::BayesianGamma,
            FamilyKind::PowerLaw
        ]
    );

    let linear = report.family(FamilyKind::Linear).unwrap();
    assert_eq!(linear.performance.len(), 13);
    let glm = report.family(FamilyKind::GammaGlm).unwrap();
    assert_eq!(glm.performance.len(), 13);

    let bayes = report.family(FamilyKind::BayesianGamma).unwrap();
    let ids: Vec<&str> = bayes.predictions.ids().collect();
    assert_eq!(ids, vec!["B1", "B2", "B3", "B4", "B5"]);
    // Shape and rate rows per tier
    assert_eq!(bayes.parameters.len(), 10);
    for model in &bayes.models {
        assert!(model.statistics.waic.is_some(), "{} has no WAIC", model.id);
    }
    for (_, column) in bayes.predictions.columns() {
        assert!(column.iter().all(|p| p.is_finite() && *p > 0.0));
    }

    let chen = report.family(FamilyKind::PowerLaw).unwrap();
    assert_eq!(chen.predictions.n_models(), 6);
    assert_eq!(chen.performance.len(), 5);

    let out = dir.path().join("out");
    let files = ResultExporter::new(&out).export(&report).unwrap();
    assert_eq!(files.len(), 4);
    for stem in ["linear", "glm", "bayesian", "chen"] {
        for table in ["predictions", "performance", "parameters"] {
            let path = out.join(format!("{}_{}.csv", stem, table));
            assert!(path.exists(), "missing {}", path.display());
        }
    }

    let predictions = fs::read_to_string(out.join("chen_predictions.csv")).unwrap();
    let mut lines = predictions.lines();
    assert_eq!(lines.next(), Some("observed,C1,C2,C3,C4,C5,NP"));
    assert_eq!(lines.count(), 50);

    let performance = fs::read_to_string(out.join("glm_performance.csv")).unwrap();
    assert!(performance.starts_with("model_name,fitting_function,distribution,predictors,group_name,rmse,cor,sscore"));
    assert!(performance.contains("G13,glm_irls,Gamma,SWR + T + RH + W + P + SP,GLM,"));
}

#[test]
fn test_gamma_glm_deviance_never_exceeds_null() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("panel.csv");
    write_panel_csv(&csv_path, 200);
    let panel = read_panel_csv(&csv_path).unwrap();

    let config = PipelineConfig {
        families: vec![FamilyKind::GammaGlm],
        ..PipelineConfig::default()
    };
    let report = Evaluator::new(config).run(&panel).unwrap();
    let glm = report.family(FamilyKind::GammaGlm).unwrap();

    assert!(glm.failures.is_empty());
    for model in &glm.models {
        assert!(model.statistics.deviance.unwrap() <= model.statistics.null_deviance.unwrap() + 1e-9);
    }
}
