use std::collections::BTreeMap;
use zsample::{
    OutputAccumulator, PatchShapes, Sample, SampleContext, SampleParams, SampleSection, Tensor,
    VolumeStore,
};

fn ramp(shape: [usize; 4]) -> Tensor<f32, 4> {
    let n = shape.iter().product::<usize>();
    Tensor::new((0..n).map(|v| v as f32).collect(), shape).unwrap()
}

/// Reads every forward-mode input patch, stands in for a network that outputs the center
/// of its input, and stitches the outputs back together.
fn run_forward(image: Tensor<f32, 4>, fov: usize, out: usize) -> (Tensor<f32, 4>, Tensor<f32, 4>) {
    let mut store = VolumeStore::new();
    store.insert_image(1, image.clone());
    let params = SampleParams::new("affinity");
    let ctx = SampleContext {
        factory: &store,
        params: &params,
        outsz: [out; 3],
        forward: true,
        log: None,
    };
    let section = SampleSection::new(1).with_channel("input", 1);
    let inputs: BTreeMap<String, [usize; 3]> =
        [("input".to_string(), [fov; 3])].into_iter().collect();
    let mut sample = Sample::new(&section, &ctx, &inputs, &BTreeMap::new()).unwrap();

    let shape = sample.output_volume_shape()["input"];
    let net = PatchShapes::new()
        .with_input("input", [1, fov, fov, fov])
        .with_output("output", [1, out, out, out]);
    let mut acc = OutputAccumulator::<f32>::new(&net, shape);
    let total = sample.num_patches()["input"].total;
    assert_eq!(acc.num_patches()["output"].total, total);

    let offset = (fov - out) / 2;
    while let Some(patches) = sample.get_next_patch().unwrap() {
        let center = patches.inputs["input"]
            .crop([0, offset, offset, offset], [1, out, out, out])
            .unwrap();
        let outputs = [("output".to_string(), center)].into_iter().collect();
        acc.set_next_patch(&outputs).unwrap();
    }
    assert!(acc.is_complete());
    assert_eq!(sample.num_patches()["input"].remaining, 0);

    let [z, y, x] = shape;
    let expected = image
        .crop([0, offset, offset, offset], [1, z, y, x])
        .unwrap();
    let stitched = acc.into_volumes().remove("output").unwrap();
    (stitched, expected)
}

#[test]
fn test_forward_round_trip_exact_tiling() {
    let (stitched, expected) = run_forward(ramp([1, 9, 9, 9]), 5, 5);
    assert_eq!(stitched.shape(), &[1, 9, 9, 9]);
    assert_eq!(stitched.data(), expected.data());
}

#[test]
fn test_forward_round_trip_with_overlapping_last_tile() {
    // output extent 8 - 5 + 2 = 5 is tiled at 0, 2, 3
    let (stitched, expected) = run_forward(ramp([1, 8, 8, 8]), 5, 2);
    assert_eq!(stitched.shape(), &[1, 5, 5, 5]);
    assert_eq!(stitched.data(), expected.data());
}

#[test]
fn test_forward_mode_is_not_augmented() {
    let mut store = VolumeStore::new();
    store.insert_image(1, ramp([1, 4, 4, 4]));
    store.insert_label(1, Tensor::ones([1, 4, 4, 4]), None).unwrap();
    let mut params = SampleParams::new("boundary");
    params.is_data_aug = true;
    let ctx = SampleContext {
        factory: &store,
        params: &params,
        outsz: [2, 2, 2],
        forward: true,
        log: None,
    };
    let section = SampleSection::new(1)
        .with_channel("input", 1)
        .with_channel("label", 1);
    let shapes: BTreeMap<String, [usize; 3]> =
        [("input".to_string(), [2, 2, 2])].into_iter().collect();
    let labels: BTreeMap<String, [usize; 3]> =
        [("label".to_string(), [2, 2, 2])].into_iter().collect();
    let sample = Sample::new(&section, &ctx, &shapes, &labels).unwrap();
    assert!(sample.is_forward());

    let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(3);
    for _ in 0..20 {
        let drawn = sample.get_random_sample(&mut rng).unwrap();
        let matches_a_location = sample.candidates().iter().any(|d| {
            sample.patches_at(*d).unwrap().inputs["input"].data() == drawn.inputs["input"].data()
        });
        assert!(matches_a_location);
    }
}
