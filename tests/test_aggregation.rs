use dqcore::{
    mean, pooled_sd, sd, sum, AggregateMode, AggregateParams, Aggregator, ImageCube, Mask,
    Moments, QualityFlags, ScalarValue, Statistic, Value,
};
use ndarray::{Array1, Array2, Array3};

/// 5x5 patch with a diamond-shaped selection of 13 pixels straddling
/// the boundary between a 0.0 region (columns 0-2) and a 0.5 region
/// (columns 3-4).
fn boundary_patch() -> (ImageCube, Mask) {
    let n = Array2::from_shape_fn((5, 5), |(_, c)| if c >= 3 { 0.5f32 } else { 0.0 });
    let img = ImageCube::from_band(n, Array2::zeros((5, 5)), Array2::zeros((5, 5))).unwrap();
    let mask = Mask::from_shape_fn((5, 5), |(r, c)| {
        (r as i32 - 2).abs() + (c as i32 - 2).abs() <= 2
    });
    (img, mask)
}

#[test]
fn test_boundary_patch_mean() {
    let (img, mask) = boundary_patch();
    assert_eq!(mask.iter().filter(|&&m| m).count(), 13);

    let result = Aggregator::standard()
        .reduce_image(Statistic::Mean, &img, &mask)
        .unwrap();
    assert_eq!(result.shape(), &[1]);
    let band = result.get(&[0]).unwrap();
    assert!((band.n - 0.153_846_15).abs() < 1e-6);
    assert!((band.u - 0.230_769_23).abs() < 1e-6);
}

#[test]
fn test_pooling_law_on_synthetic_data() {
    let count = 200;
    let n: Vec<f32> = (0..count).map(|i| ((i * 37) % 101) as f32 * 0.01).collect();
    let u: Vec<f32> = (0..count).map(|i| 0.05 + (i % 7) as f32 * 0.01).collect();
    let value = Value::vector(n.clone(), u.clone(), vec![QualityFlags::empty(); count]).unwrap();

    let result = mean(&[value]).as_scalar().unwrap();

    let nf: Vec<f64> = n.iter().map(|&x| x as f64).collect();
    let m = nf.iter().sum::<f64>() / count as f64;
    let var = nf.iter().map(|x| (x - m).powi(2)).sum::<f64>() / count as f64;
    let mean_u2 = u.iter().map(|&x| (x as f64).powi(2)).sum::<f64>() / count as f64;

    assert!((result.n as f64 - m).abs() < 1e-6);
    assert!((result.u as f64 - (var + mean_u2).sqrt()).abs() < 1e-6);

    let helper = pooled_sd(&Array1::from(n), &Array1::from(u)).unwrap();
    assert!((helper - result.u).abs() < 1e-6);
}

#[test]
fn test_mixed_scalar_and_array_inputs() {
    let values = vec![
        Value::from(ScalarValue::new(1.0, 0.0)),
        Value::vector(vec![2.0, 3.0], vec![0.0, 0.0], vec![QualityFlags::empty(); 2]).unwrap(),
    ];
    let r = mean(&values).as_scalar().unwrap();
    assert_eq!(r.n, 2.0);
    let r = sum(&values).as_scalar().unwrap();
    assert_eq!(r.n, 6.0);
    let r = sd(&values).as_scalar().unwrap();
    assert!((r.n - (2.0f32 / 3.0).sqrt()).abs() < 1e-6);
    assert_eq!(r.u, 0.0);
    assert!(r.dq.contains(QualityFlags::NOUNCERTAINTY));
}

#[test]
fn test_bad_pixels_excluded_from_image_stats() {
    let n = Array3::from_elem((3, 3, 2), 1.0f32);
    let u = Array3::from_elem((3, 3, 2), 0.1f32);
    let mut dq = Array3::<u16>::zeros((3, 3, 2));
    let mut n_bad = n.clone();
    n_bad[[1, 1, 0]] = 1000.0;
    dq[[1, 1, 0]] = QualityFlags::SATURATED.bits();
    let img = ImageCube::new(n_bad, u, dq).unwrap();

    let result = Aggregator::standard()
        .reduce_image(Statistic::Sum, &img, &img.full_mask())
        .unwrap()
        .split();
    assert_eq!(result[0].n, 8.0);
    assert!((result[0].u - (8.0f32 * 0.01).sqrt()).abs() < 1e-6);
    assert_eq!(result[1].n, 9.0);
    assert!(result[0].dq.is_empty());
}

#[test]
fn test_scalar_mode_flattens_bands() {
    let n = Array3::from_shape_fn((2, 2, 3), |(_, _, b)| b as f32);
    let img = ImageCube::new(n, Array3::zeros((2, 2, 3)), Array3::zeros((2, 2, 3))).unwrap();
    let agg = Aggregator::new(AggregateParams {
        mode: AggregateMode::Scalar,
        ..Default::default()
    });

    let max = agg.reduce_image(Statistic::Max, &img, &img.full_mask()).unwrap();
    assert_eq!(max.as_scalar().unwrap().n, 2.0);
    let min = agg.reduce_image(Statistic::Min, &img, &img.full_mask()).unwrap();
    assert_eq!(min.as_scalar().unwrap().n, 0.0);
}

#[test]
fn test_large_reduction_matches_chunked_merge() {
    let count = 100_000;
    let items: Vec<ScalarValue> = (0..count)
        .map(|i| ScalarValue::new(((i * 7919) % 1000) as f32 * 1e-3, 0.01))
        .collect();
    let value = Value::from_scalars(&[count], items.clone()).unwrap();

    let result = mean(&[value]).as_scalar().unwrap();

    let sequential: Moments = items.iter().copied().collect();
    let halves = items[..count / 3]
        .iter()
        .copied()
        .collect::<Moments>()
        .merge(items[count / 3..].iter().copied().collect());

    assert!((result.n as f64 - sequential.mean).abs() < 1e-6);
    assert!((result.u as f64 - sequential.pooled_sd()).abs() < 1e-6);
    assert!((halves.pooled_sd() - sequential.pooled_sd()).abs() < 1e-9);
}
