use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;
use zsample::{RequestLog, SampleCollection, SampleError, SamplerConfig, Tensor, VolumeStore};

const CONFIG: &str = r#"
[params]
out_type = "boundary"
is_rebalance = true
dtype = "float64"

[network]
inputs = { input = [1, 3, 3, 3] }
outputs = { label = [2, 3, 3, 3] }

[[sample]]
id = 1
channels = { input = 1, label = 1 }
"#;

#[test]
fn test_load_and_draw_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("sampler.toml");
    std::fs::File::create(&config_path)
        .unwrap()
        .write_all(CONFIG.as_bytes())
        .unwrap();
    let log_path = dir.path().join("requests.log");

    let config = SamplerConfig::load(&config_path).unwrap();
    let mut store = VolumeStore::new();
    store.insert_image(1, Tensor::zeros([1, 5, 5, 5]));
    store.insert_label(1, Tensor::ones([1, 5, 5, 5]), None).unwrap();

    let log = RequestLog::append(&log_path).unwrap();
    let mut samples =
        SampleCollection::<f64>::from_config(&config, &store, [3, 3, 3], Some(log)).unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..3 {
        let patch = samples.get_random_sample(&mut rng).unwrap();
        assert_eq!(patch.weights["label"].shape(), &[2, 3, 3, 3]);
    }

    let text = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "sample1");
    assert!(lines[1].starts_with("subvolume: [") && lines[1].ends_with("] requested"));
}

#[test]
fn test_dtype_mismatch_is_reported() {
    let config = SamplerConfig::from_toml_str(CONFIG).unwrap();
    let mut store = VolumeStore::new();
    store.insert_image(1, Tensor::zeros([1, 5, 5, 5]));
    store.insert_label(1, Tensor::ones([1, 5, 5, 5]), None).unwrap();
    let err = SampleCollection::<f32>::from_config(&config, &store, [3, 3, 3], None).unwrap_err();
    assert!(matches!(
        err,
        SampleError::DTypeMismatch {
            configured: "float64",
            built: "float32"
        }
    ));
}

#[test]
fn test_missing_file_and_network() {
    let dir = tempfile::tempdir().unwrap();
    let err = SamplerConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SampleError::Io { .. }));

    let config = SamplerConfig::from_toml_str("[params]\nout_type = \"affinity\"\n").unwrap();
    let err = SampleCollection::<f32>::from_config(&config, &VolumeStore::new(), [1, 1, 1], None)
        .unwrap_err();
    assert!(matches!(err, SampleError::MissingNetwork));
}
