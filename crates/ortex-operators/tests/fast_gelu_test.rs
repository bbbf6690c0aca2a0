//! FastGelu kernel tests across both domains that define it.

mod common;

use common::{make_bias_graph, make_unary_graph, run_single_node};
use half::f16;
use ortex_core::{Domain, ErrorKind, OperatorRegistry, Resolver, Tensor};
use ortex_graph::DataType;
use ortex_operators::math::{gelu_exact_f64, scaled_error};
use ortex_operators::{CUSTOM_DOMAIN, VENDOR_DOMAIN, core_operator_registry, register_custom_kernels};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};
use std::sync::Arc;

fn registry() -> OperatorRegistry {
    let mut registry = core_operator_registry().unwrap();
    register_custom_kernels(&mut registry).unwrap();
    registry
}

fn fast_gelu(domain: &str, values: Vec<f32>, shape: &[usize]) -> Vec<f32> {
    let graph = make_unary_graph(domain, "FastGelu", 1, DataType::F32, shape);
    let input = Tensor::from_vec(values, shape);
    run_single_node(&graph, &registry(), &[input])
        .unwrap()
        .to_vec::<f32>()
        .unwrap()
}

fn assert_close(actual: &[f32], expected: &[f64], tolerance: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (&got, &want)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (f64::from(got) - want).abs() < tolerance,
            "index {i}: got {got}, want {want}"
        );
    }
}

#[test]
fn test_fast_gelu_reference_values() {
    let output = fast_gelu(CUSTOM_DOMAIN, vec![-1.0, 0.0, 1.0], &[3]);
    assert_close(&output, &[-0.158808, 0.0, 0.841192], 1e-6);

    let output = fast_gelu(CUSTOM_DOMAIN, vec![-0.5, 0.5, 0.25, 0.75, 1.5, 2.0], &[2, 3]);
    assert_close(
        &output,
        &[
            -0.15428599017485606,
            0.34571400982514394,
            0.149675350701685,
            0.5799605551656203,
            1.3995715769802328,
            1.954597694087775,
        ],
        1e-6,
    );
}

#[test]
fn test_fast_gelu_edge_cases() {
    let output = fast_gelu(CUSTOM_DOMAIN, vec![10.0, -10.0, 0.001, -0.001], &[4]);
    assert!((output[0] - 10.0).abs() < 1e-5, "{}", output[0]);
    assert!(output[1].abs() < 1e-5, "{}", output[1]);
    assert!((output[2] - 0.0005).abs() < 1e-6, "{}", output[2]);
    assert!((output[3] + 0.0005).abs() < 1e-6, "{}", output[3]);
}

#[test]
fn test_fast_gelu_large_random_input() {
    let shape = [1, 8, 768];
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let input: Vec<f32> = (0..shape.iter().product::<usize>())
        .map(|_| StandardNormal.sample(&mut rng))
        .collect();

    let graph = make_unary_graph(CUSTOM_DOMAIN, "FastGelu", 1, DataType::F32, &shape);
    let output = run_single_node(&graph, &registry(), &[Tensor::from_vec(input.clone(), &shape)]).unwrap();

    assert_eq!(output.shape(), &shape);
    let output = output.to_vec::<f32>().unwrap();
    assert!(output.iter().all(|v| v.is_finite()));

    let worst = input
        .iter()
        .zip(&output)
        .map(|(&x, &y)| scaled_error(f64::from(y), gelu_exact_f64(f64::from(x))))
        .fold(0.0, f64::max);
    assert!(worst < 1e-3, "worst deviation from exact GELU: {worst}");
}

#[test]
fn test_fast_gelu_accuracy_sweep() {
    // [-10, 10] in steps of 0.01
    let input: Vec<f32> = (-1000..=1000).map(|i| i as f32 * 0.01).collect();
    let output = fast_gelu(CUSTOM_DOMAIN, input.clone(), &[input.len()]);

    for (&x, &y) in input.iter().zip(&output) {
        let err = scaled_error(f64::from(y), gelu_exact_f64(f64::from(x)));
        assert!(err < 1e-3, "x={x}: deviation {err}");
    }
}

#[test]
fn test_fast_gelu_with_bias() {
    let graph = make_bias_graph(CUSTOM_DOMAIN, "FastGelu", DataType::F32, &[2, 2], &[2]);
    let x = Tensor::from_vec(vec![-1.5f32, 0.0, 0.5, 1.0], &[2, 2]);
    let bias = Tensor::from_vec(vec![0.5f32, 1.0], &[2]);

    let output = run_single_node(&graph, &registry(), &[x, bias]).unwrap();
    assert_close(
        &output.to_vec::<f32>().unwrap(),
        &[-0.15880800939172324, 0.8411919906082768, 0.8411919906082768, 1.954597694087775],
        1e-6,
    );
}

#[test]
fn test_bias_that_does_not_tile_fails_resolution() {
    let graph = make_bias_graph(CUSTOM_DOMAIN, "FastGelu", DataType::F32, &[2, 3], &[4]);
    let err = Resolver::new(&registry()).resolve(&graph, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

#[test]
fn test_fast_gelu_f16_and_f64() {
    let registry = registry();

    let graph = make_unary_graph(CUSTOM_DOMAIN, "FastGelu", 1, DataType::F64, &[3]);
    let output = run_single_node(&graph, &registry, &[Tensor::from_vec(vec![-1.0f64, 0.0, 1.0], &[3])])
        .unwrap()
        .to_vec::<f64>()
        .unwrap();
    assert!((output[0] + 0.15880800939172324).abs() < 1e-12);
    assert!((output[2] - 0.8411919906082768).abs() < 1e-12);

    let graph = make_unary_graph(CUSTOM_DOMAIN, "FastGelu", 1, DataType::F16, &[3]);
    let input: Vec<f16> = [-1.0f32, 1.0, 100.0].into_iter().map(f16::from_f32).collect();
    let output: Vec<f32> = run_single_node(&graph, &registry, &[Tensor::from_vec(input, &[3])])
        .unwrap()
        .to_vec::<f16>()
        .unwrap()
        .into_iter()
        .map(f16::to_f32)
        .collect();
    assert!((output[0] + 0.1588).abs() < 1e-3, "{}", output[0]);
    assert!((output[1] - 0.8412).abs() < 1e-3, "{}", output[1]);
    assert_eq!(output[2], 100.0);
}

#[test]
fn test_custom_and_vendor_fast_gelu_coexist() {
    let registry = registry();
    let input = vec![-2.0f32, -1.0, -0.5, 0.5, 1.0, 2.0];

    let custom_graph = make_unary_graph(CUSTOM_DOMAIN, "FastGelu", 1, DataType::F32, &[2, 3]);
    let vendor_graph = make_unary_graph(VENDOR_DOMAIN, "FastGelu", 1, DataType::F32, &[2, 3]);

    let resolver = Resolver::new(&registry);
    let custom = resolver.resolve(&custom_graph, 0).unwrap();
    let vendor = resolver.resolve(&vendor_graph, 0).unwrap();
    assert_eq!(custom.descriptor.domain(), &Domain::new(CUSTOM_DOMAIN));
    assert_eq!(vendor.descriptor.domain(), &Domain::new(VENDOR_DOMAIN));
    assert!(!Arc::ptr_eq(&custom.descriptor, &vendor.descriptor));

    let custom_out = fast_gelu(CUSTOM_DOMAIN, input.clone(), &[2, 3]);
    let vendor_out = fast_gelu(VENDOR_DOMAIN, input, &[2, 3]);
    assert_eq!(custom_out, vendor_out);
}

#[test]
fn test_vendor_fast_gelu_is_float_only() {
    let graph = make_unary_graph(VENDOR_DOMAIN, "FastGelu", 1, DataType::F16, &[3]);
    let err = Resolver::new(&registry()).resolve(&graph, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let graph = make_unary_graph(CUSTOM_DOMAIN, "FastGelu", 1, DataType::F16, &[3]);
    assert!(Resolver::new(&registry()).resolve(&graph, 0).is_ok());
}

#[test]
fn test_unregistered_version_and_domain() {
    let registry = registry();

    let graph = make_unary_graph(CUSTOM_DOMAIN, "FastGelu", 2, DataType::F32, &[3]);
    let err = Resolver::new(&registry).resolve(&graph, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionUnsupported);

    let graph = make_unary_graph("com.unknown", "FastGelu", 1, DataType::F32, &[3]);
    let err = Resolver::new(&registry).resolve(&graph, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // The built-in domain has no FastGelu of its own
    let graph = make_unary_graph("", "FastGelu", 1, DataType::F32, &[3]);
    let err = Resolver::new(&registry).resolve(&graph, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
