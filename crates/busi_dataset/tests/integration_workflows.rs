//! End-to-end workflows over a synthetic BUSI-style directory tree:
//! 1. Image tree → generated manifests → datasets
//! 2. Config file → prepared train/test datasets
//! 3. Dataset → batches with synchronized masks

use busi_dataset::{
    generate_image_list, prepare_data, prepare_data_default, AugmentationSpec, BatchConfig,
    BatchIter, BusiDataset, DataConfig, DatasetError, DatasetSource, InMemoryMaskProvider,
    Mode, SampleIndex, SiblingMaskProvider, SpecPair, SplitOptions,
};
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Textured ultrasound stand-in with a bright lesion in the upper-left region.
fn write_scan(path: &Path, w: u32, h: u32) -> anyhow::Result<()> {
    let mut img = RgbImage::new(w, h);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let lesion = x < w / 3 && y < h / 2;
        let g = ((x * 13 + y * 7) % 200) as u8;
        *px = if lesion { Rgb([255, g, g]) } else { Rgb([g / 4, g, g / 2]) };
    }
    img.save(path)?;
    Ok(())
}

fn write_lesion_mask(path: &Path, w: u32, h: u32) -> anyhow::Result<()> {
    let mut mask = GrayImage::new(w, h);
    for (x, y, px) in mask.enumerate_pixels_mut() {
        if x < w / 3 && y < h / 2 {
            *px = Luma([255]);
        }
    }
    mask.save(path)?;
    Ok(())
}

/// `<root>/<class>/<class> (i).bmp` plus `_mask.png` siblings.
fn create_busi_tree(root: &Path, per_class: usize) -> anyhow::Result<()> {
    for class in ["normal", "malignant", "benign"] {
        let dir = root.join(class);
        fs::create_dir_all(&dir)?;
        for i in 0..per_class {
            let stem = format!("{class} ({i})");
            write_scan(&dir.join(format!("{stem}.bmp")), 40, 32)?;
            write_lesion_mask(&dir.join(format!("{stem}_mask.png")), 40, 32)?;
        }
    }
    Ok(())
}

fn write_two_row_manifests(dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    let a = dir.join("a.bmp");
    let b = dir.join("b.bmp");
    write_scan(&a, 300, 260)?;
    write_scan(&b, 260, 300)?;
    let train = dir.join("train_sample.txt");
    let test = dir.join("test_sample.txt");
    fs::write(&train, format!("{},benign\n", a.display()))?;
    fs::write(&test, format!("{},normal\n", b.display()))?;
    Ok((train, test))
}

#[test]
fn workflow_generated_manifests_feed_datasets() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let images = tmp.path().join("Dataset_BUSI");
    let lists = tmp.path().join("lists");
    create_busi_tree(&images, 4)?;

    let opts = SplitOptions {
        test_samples_per_class: 1,
        seed: Some(7),
        ..Default::default()
    };
    // masks are .png so they never match the bmp filter
    let summary = generate_image_list(&images, &lists, &opts)?;
    assert_eq!(summary.test_total(), 3);
    assert_eq!(summary.train_total(), 9);

    let index = SampleIndex::load(&summary.train_manifest)?;
    assert_eq!(index.len(), 9);
    assert!(index.iter().all(|s| !s.image_path.to_string_lossy().contains("mask")));

    let cfg = DataConfig::new(16, DatasetSource::busi(&summary.train_manifest, &summary.test_manifest))
        .with_mask(true, 2);
    let (datasets, sizes) = prepare_data_default(&cfg)?;
    assert_eq!(sizes[&Mode::Train], 9);
    assert_eq!(sizes[&Mode::Test], 3);

    let ex = datasets[&Mode::Train].get(0)?;
    assert_eq!(ex.image.shape, [3, 16, 16]);
    let mask = ex.mask.expect("mask enabled");
    assert_eq!(mask.shape, [1, 16, 16]);
    assert!(mask.data.iter().all(|v| *v == 0.0 || *v == 1.0));
    Ok(())
}

#[test]
fn workflow_config_file_to_prepared_data() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let (train, test) = write_two_row_manifests(tmp.path())?;
    let cfg_path = tmp.path().join("busi-data.toml");
    fs::write(
        &cfg_path,
        format!(
            "image_size = 224\n\n[dataset]\nkind = \"BUSI\"\ntrain = \"{}\"\ntest = \"{}\"\n",
            train.display(),
            test.display()
        ),
    )?;

    let cfg = DataConfig::from_path(&cfg_path)?;
    let (datasets, sizes) = prepare_data_default(&cfg)?;
    assert_eq!(sizes[&Mode::Train], 1);
    assert_eq!(sizes[&Mode::Test], 1);

    let train_ex = datasets[&Mode::Train].get(0)?;
    assert_eq!(train_ex.image.shape, [3, 224, 224]);
    assert_eq!(train_ex.label_id, 2);
    assert!(train_ex.mask.is_none());

    let test_ds = &datasets[&Mode::Test];
    let first = test_ds.get(0)?;
    let second = test_ds.get(0)?;
    assert_eq!(first.label_id, 0);
    assert_eq!(first.image, second.image);
    assert!(first.image.data.iter().all(|v| (-1.0..=1.0).contains(v)));
    Ok(())
}

#[test]
fn train_access_redraws_augmentation() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let (train, test) = write_two_row_manifests(tmp.path())?;
    let cfg = DataConfig::new(64, DatasetSource::busi(train, test));
    let (datasets, _) = prepare_data(&cfg, Arc::new(InMemoryMaskProvider::new()))?;
    let ds = &datasets[&Mode::Train];

    let a = ds.get_with_seed(0, 1)?;
    let b = ds.get_with_seed(0, 2)?;
    assert_ne!(a.image, b.image);
    assert_eq!(ds.get_with_seed(0, 1)?.image, a.image);

    // unseeded access draws fresh entropy on every call
    let first = ds.get(0)?;
    let second = ds.get(0)?;
    assert_eq!(first.image.shape, second.image.shape);
    assert_ne!(first.image, second.image);
    Ok(())
}

#[test]
fn mask_tracks_image_geometry_through_dataset() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("benign (1).bmp");
    let (w, h) = (36, 30);
    // red channel equals the mask so any geometric mismatch is visible
    let mut img = RgbImage::new(w, h);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let v = if x < w / 3 && y < h / 2 { 255 } else { 0 };
        *px = Rgb([v, 40, 90]);
    }
    img.save(&path)?;
    write_lesion_mask(&tmp.path().join("benign (1)_mask.png"), w, h)?;
    let manifest = tmp.path().join("list.txt");
    fs::write(&manifest, format!("{},benign\n", path.display()))?;

    let spec = AugmentationSpec::builder()
        .random_rotation(45.0)
        .horizontal_flip(0.5)
        .vertical_flip(0.5)
        .center_crop(24)
        .to_tensor()
        .build();
    let specs = SpecPair::new(spec.clone(), spec)?;
    let ds = BusiDataset::new(
        &manifest,
        specs,
        true,
        0,
        Arc::new(SiblingMaskProvider::default()),
    )?;

    for seed in 0..20u64 {
        let ex = ds.get_with_seed(0, seed)?;
        let mask = ex.mask.expect("mask enabled");
        assert_eq!(ex.image.plane(0), mask.plane(0), "seed {seed}");
    }
    Ok(())
}

#[test]
fn batches_stack_images_labels_and_masks() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let images = tmp.path().join("tree");
    create_busi_tree(&images, 2)?;
    let summary = generate_image_list(
        &images,
        tmp.path(),
        &SplitOptions {
            test_samples_per_class: 0,
            seed: Some(1),
            ..Default::default()
        },
    )?;
    assert_eq!(summary.train_total(), 6);

    let cfg = DataConfig::new(12, DatasetSource::busi(&summary.train_manifest, &summary.test_manifest))
        .with_mask(true, 0);
    let (mut datasets, _) = prepare_data_default(&cfg)?;
    let train = datasets.remove(&Mode::Train).expect("train split");

    let iter = BatchIter::new(
        train,
        BatchConfig {
            batch_size: 4,
            shuffle: true,
            seed: Some(21),
            drop_last: false,
        },
    )?;
    let batches = iter.collect::<Result<Vec<_>, _>>()?;
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].image_shape, [4, 3, 12, 12]);
    assert_eq!(batches[0].mask_shape, Some([4, 1, 12, 12]));
    assert_eq!(batches[1].image_shape, [2, 3, 12, 12]);
    let mut labels: Vec<i64> = batches.iter().flat_map(|b| b.labels.clone()).collect();
    labels.sort_unstable();
    assert_eq!(labels, vec![0, 0, 1, 1, 2, 2]);
    Ok(())
}

#[test]
fn unknown_label_surfaces_on_access_not_load() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let img = tmp.path().join("x.bmp");
    write_scan(&img, 20, 20)?;
    let manifest = tmp.path().join("list.txt");
    fs::write(&manifest, format!("\n{},cyst\n\n", img.display()))?;

    let cfg = DataConfig::new(8, DatasetSource::busi(&manifest, &manifest));
    let (datasets, sizes) = prepare_data_default(&cfg)?;
    assert_eq!(sizes[&Mode::Test], 1);
    let err = datasets[&Mode::Test].get(0).unwrap_err();
    assert!(matches!(err, DatasetError::UnknownLabel { .. }));
    Ok(())
}

#[test]
fn malformed_manifest_fails_preparation() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let manifest = tmp.path().join("list.txt");
    fs::write(&manifest, "a.bmp,benign\nb.bmp\n")?;
    let cfg = DataConfig::new(8, DatasetSource::busi(&manifest, &manifest));
    let err = prepare_data_default(&cfg).unwrap_err();
    assert!(matches!(err, DatasetError::ManifestFormat { line: 2, .. }));
    Ok(())
}
