//! Tests for data module

use super::*;

use approx::assert_abs_diff_eq;
use proptest::prelude::*;
use std::collections::HashSet;
use std::io::Write;

fn small_panel(n: usize) -> Panel {
    let cape: Vec<f64> = (0..n).map(|i| 100.0 + 10.0 * i as f64).collect();
    let precip: Vec<f64> = (0..n).map(|i| 1.0 + (i % 7) as f64).collect();
    let strikes: Vec<f64> = (0..n).map(|i| 0.5 + 0.1 * i as f64).collect();

    PanelBuilder::new()
        .with_column(STRIKES, strikes)
        .unwrap()
        .with_covariate(Covariate::Cape, cape)
        .unwrap()
        .with_covariate(Covariate::Precip, precip)
        .unwrap()
        .build()
        .unwrap()
}

// ==================== Panel ====================

#[test]
fn test_panel_creation() {
    let panel = small_panel(5);
    assert_eq!(panel.shape(), (5, 3));
    assert_eq!(panel.column_names(), vec!["strikes", "cape", "precip"]);
    assert!(panel.has_column("cape"));
    assert!(!panel.has_column("rh"));
}

#[test]
fn test_panel_dimension_mismatch() {
    let result = PanelBuilder::new()
        .with_column("a", vec![1.0, 2.0])
        .unwrap()
        .with_column("b", vec![1.0, 2.0, 3.0]);
    assert!(matches!(result, Err(DataError::DimensionMismatch { .. })));
}

#[test]
fn test_panel_duplicate_column() {
    let result = PanelBuilder::new()
        .with_column("a", vec![1.0])
        .unwrap()
        .with_column("a", vec![2.0]);
    assert!(matches!(result, Err(DataError::DuplicateColumn(_))));
}

#[test]
fn test_panel_missing_column() {
    let panel = small_panel(3);
    assert!(matches!(
        panel.covariate(Covariate::RelativeHumidity),
        Err(DataError::ColumnNotFound(name)) if name == "rh"
    ));
}

#[test]
fn test_panel_take_preserves_requested_order() {
    let panel = small_panel(5);
    let taken = panel.take(&[4, 0, 2]).unwrap();
    assert_eq!(taken.nrows(), 3);
    assert_eq!(
        taken.covariate(Covariate::Cape).unwrap().to_vec(),
        vec![140.0, 100.0, 120.0]
    );
    assert!(matches!(
        panel.take(&[5]),
        Err(DataError::IndexOutOfBounds { index: 5, len: 5 })
    ));
}

#[test]
fn test_covariate_matrix() {
    let panel = small_panel(3);
    let x = panel
        .covariate_matrix(&[Covariate::Precip, Covariate::Cape])
        .unwrap();
    assert_eq!(x.dim(), (3, 2));
    assert_eq!(x[[1, 0]], 2.0);
    assert_eq!(x[[2, 1]], 120.0);
}

#[test]
fn test_covariate_parsing_and_labels() {
    assert_eq!("cxp".parse::<Covariate>().unwrap(), Covariate::CapeXPrecip);
    assert_eq!("SWR".parse::<Covariate>().unwrap(), Covariate::ShortwaveRadiation);
    assert!("foo".parse::<Covariate>().is_err());
    assert_eq!(
        Covariate::subset_label(&[
            Covariate::ShortwaveRadiation,
            Covariate::AirTemperature,
            Covariate::RelativeHumidity
        ]),
        "SWR + T + RH"
    );
}

// ==================== DatasetSplitter ====================

#[test]
fn test_partition_sizes() {
    let partition = DatasetSplitter::default().partition(100).unwrap();
    assert_eq!(partition.train().len(), 80);
    assert_eq!(partition.test().len(), 20);

    let partition = DatasetSplitter::default().partition(7).unwrap();
    assert_eq!(partition.train().len(), 5);
    assert_eq!(partition.test().len(), 2);
}

#[test]
fn test_partition_smallest_panel() {
    let partition = DatasetSplitter::default().partition(2).unwrap();
    assert_eq!(partition.train().len(), 1);
    assert_eq!(partition.test().len(), 1);
}

#[test]
fn test_partition_insufficient_data() {
    for n in [0, 1] {
        assert!(matches!(
            DatasetSplitter::default().partition(n),
            Err(DataError::InsufficientData { required: 2, .. })
        ));
    }
}

#[test]
fn test_partition_invalid_fraction() {
    let splitter = DatasetSplitter::default().train_fraction(1.5);
    assert!(matches!(
        splitter.partition(10),
        Err(DataError::InvalidParameter(_))
    ));
}

#[test]
fn test_partition_is_reproducible() {
    let a = DatasetSplitter::new(DEFAULT_SEED).partition(250).unwrap();
    let b = DatasetSplitter::new(DEFAULT_SEED).partition(250).unwrap();
    assert_eq!(a, b);

    let c = DatasetSplitter::new(DEFAULT_SEED + 1).partition(250).unwrap();
    assert_ne!(a.train(), c.train());
}

#[test]
fn test_split_materializes_rows_in_panel_order() {
    let panel = small_panel(20);
    let (train, test, partition) = DatasetSplitter::default().split(&panel).unwrap();

    assert_eq!(train.nrows(), 16);
    assert_eq!(test.nrows(), 4);

    let cape = panel.covariate(Covariate::Cape).unwrap();
    let expected: Vec<f64> = partition.test().iter().map(|&i| cape[i]).collect();
    assert_eq!(test.covariate(Covariate::Cape).unwrap().to_vec(), expected);
    assert!(partition.train().windows(2).all(|w| w[0] < w[1]));
}

proptest! {
    #[test]
    fn prop_partition_is_disjoint_and_covering(n in 2usize..500, seed in any::<u64>()) {
        let partition = DatasetSplitter::new(seed).partition(n).unwrap();

        prop_assert_eq!(partition.train().len() + partition.test().len(), n);
        prop_assert_eq!(partition.train().len(), (0.8 * n as f64).floor() as usize);

        let train: HashSet<usize> = partition.train().iter().copied().collect();
        let test: HashSet<usize> = partition.test().iter().copied().collect();
        prop_assert!(train.is_disjoint(&test));
        prop_assert_eq!(train.union(&test).count(), n);

        let again = DatasetSplitter::new(seed).partition(n).unwrap();
        prop_assert_eq!(partition, again);
    }
}

// ==================== Standardizer ====================

#[test]
fn test_standardizer_round_trip() {
    let panel = small_panel(30);
    let (train, _, _) = DatasetSplitter::default().split(&panel).unwrap();

    let covariates = [Covariate::Cape, Covariate::Precip];
    let stats = Standardizer::fit(&train, &covariates).unwrap();
    let standardized = Standardizer::apply(&stats, &train).unwrap();

    for covariate in covariates {
        let column = standardized.covariate(covariate).unwrap();
        assert_abs_diff_eq!(column.mean().unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(column.std(1.0), 1.0, epsilon = 1e-12);
    }

    // The response is never standardized
    assert_eq!(standardized.strikes().unwrap(), train.strikes().unwrap());
}

#[test]
fn test_standardizer_uses_training_statistics_only() {
    let panel = small_panel(30);
    let (train, test, _) = DatasetSplitter::default().split(&panel).unwrap();

    let stats = Standardizer::fit(&train, &[Covariate::Cape]).unwrap();
    let cape_stats = *stats.get(Covariate::Cape).unwrap();
    let train_cape = train.covariate(Covariate::Cape).unwrap();
    assert_abs_diff_eq!(cape_stats.mean, train_cape.mean().unwrap(), epsilon = 1e-12);
    assert_abs_diff_eq!(cape_stats.std, train_cape.std(1.0), epsilon = 1e-12);

    let first = stats.apply(&test).unwrap();
    let second = stats.apply(&test).unwrap();
    assert_eq!(first, second);

    let raw = test.covariate(Covariate::Cape).unwrap();
    let standardized = first.covariate(Covariate::Cape).unwrap();
    for (r, s) in raw.iter().zip(standardized.iter()) {
        assert_abs_diff_eq!(*s, (r - cape_stats.mean) / cape_stats.std, epsilon = 1e-12);
    }
}

#[test]
fn test_standardizer_degenerate_variance() {
    let panel = PanelBuilder::new()
        .with_column(STRIKES, vec![1.0, 2.0, 3.0])
        .unwrap()
        .with_covariate(Covariate::WindSpeed, vec![4.0, 4.0, 4.0])
        .unwrap()
        .build()
        .unwrap();

    assert!(matches!(
        Standardizer::fit(&panel, &[Covariate::WindSpeed]),
        Err(DataError::DegenerateVariance { column, .. }) if column == "wind"
    ));
}

// ==================== CSV ingestion ====================

const HEADER: &str = "lon,lat,year,strikes,cape,precip,tair,wind,swr,sp,rh";

#[test]
fn test_read_panel_derives_cxp() {
    let csv = format!(
        "{HEADER}\n10.0,45.0,2010,0.3,200,2.0,290,3,180,101000,60\n\
         10.5,45.0,2010,0.5,400,3.0,291,2,190,100900,65\n"
    );
    let panel = io::read_panel(csv.as_bytes()).unwrap();
    assert_eq!(panel.nrows(), 2);
    assert_eq!(
        panel.covariate(Covariate::CapeXPrecip).unwrap().to_vec(),
        vec![400.0, 1200.0]
    );
}

#[test]
fn test_read_panel_missing_required_column() {
    let csv = "lon,lat,year,strikes\n1,2,2010,0.1\n";
    assert!(matches!(
        io::read_panel(csv.as_bytes()),
        Err(DataError::ColumnNotFound(_))
    ));
}

#[test]
fn test_read_panel_rejects_bad_cells() {
    let csv = format!("{HEADER}\n10.0,45.0,2010,abc,200,2.0,290,3,180,101000,60\n");
    assert!(matches!(
        io::read_panel(csv.as_bytes()),
        Err(DataError::Parse { row: 0, .. })
    ));

    let csv = format!("{HEADER}\n10.0,45.0,2010,NA,200,2.0,290,3,180,101000,60\n");
    assert!(matches!(
        io::read_panel(csv.as_bytes()),
        Err(DataError::MissingData { .. })
    ));
}

#[test]
fn test_read_panel_csv_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER},cxp").unwrap();
    writeln!(file, "10.0,45.0,2010,0.3,200,2.0,290,3,180,101000,60,999").unwrap();

    let panel = io::read_panel_csv(file.path()).unwrap();
    // An explicit cxp column wins over the derived one
    assert_eq!(panel.covariate(Covariate::CapeXPrecip).unwrap()[0], 999.0);
}
