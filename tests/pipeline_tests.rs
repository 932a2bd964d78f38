use std::fs;
use std::path::{Path, PathBuf};

use yolo_curate::config::{ConvertArgs, GatherArgs, MergeArgs, ScoreArgs, SplitArgs};
use yolo_curate::evaluate::read_results;
use yolo_curate::types::Split;
use yolo_curate::{
    clean_and_merge, convert_coco_dataset, fix_label_files, gather_images, run_scoring,
    split_dataset, LabelDir, PredictionDir,
};

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn score_args(root: &Path) -> ScoreArgs {
    ScoreArgs {
        images_dir: root.join("images"),
        labels_dir: root.join("labels"),
        predictions_dir: root.join("preds"),
        output_dir: root.join("inference_results"),
        hardest_dir_name: "hardest_10_percent".to_string(),
        fraction: 0.1,
        confidence: 0.25,
        iou: 0.7,
    }
}

#[test]
fn test_scoring_run_writes_manifest_and_copies_hardest() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();

    // 12 images: img00 perfect, img01 missed detection, the rest near-perfect
    for i in 0..12 {
        let name = format!("img{:02}", i);
        write(&root.join(format!("images/{}.png", name)), "png");
        write(
            &root.join(format!("labels/{}.txt", name)),
            "0 0.5 0.5 0.2 0.2\n",
        );
        if i != 1 {
            write(
                &root.join(format!("preds/{}.txt", name)),
                "0 0.5 0.5 0.2 0.2 0.9\n",
            );
        }
    }
    // A background image with a false positive
    write(&root.join("images/background.jpg"), "jpg");
    write(
        &root.join("preds/background.txt"),
        "2 0.3 0.3 0.1 0.1 0.8\n1 0.7 0.7 0.1 0.1 0.6\n",
    );

    let args = score_args(root);
    let report = run_scoring(
        &args,
        &LabelDir::new(&args.labels_dir),
        &PredictionDir::new(&args.predictions_dir),
    )
    .unwrap();

    assert_eq!(report.scores.len(), 13);
    assert_eq!(report.failed, 0);
    assert_eq!(report.hardest.len(), 1);
    assert_eq!(report.hardest[0].image_id, "background.jpg");
    assert_eq!(report.hardest[0].error_score, 7.0);

    let manifest = read_results(&report.results_path).unwrap();
    assert_eq!(manifest.len(), report.scores.len());
    for (read, scored) in manifest.iter().zip(&report.scores) {
        assert_eq!(read.image_id, scored.image_id);
        assert!((read.error_score - scored.error_score).abs() < 1e-12);
    }
    let missed = manifest.iter().find(|s| s.image_id == "img01.png").unwrap();
    assert_eq!(missed.error_score, 6.0);
    assert_eq!(missed.num_ground_truth, 1);
    assert_eq!(missed.num_predicted, 0);

    assert_eq!(file_names(&args.hardest_dir()), vec!["background.jpg"]);
}

#[test]
fn test_scoring_run_on_empty_folder() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("images")).unwrap();

    let args = score_args(root);
    let report = run_scoring(
        &args,
        &LabelDir::new(&args.labels_dir),
        &PredictionDir::new(&args.predictions_dir),
    )
    .unwrap();

    assert!(report.scores.is_empty());
    assert!(report.hardest.is_empty());
    assert_eq!(fs::read_to_string(&report.results_path).unwrap(), "[]");
}

#[test]
fn test_fix_label_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    write(
        &dir.join("bad.txt"),
        "0 0.5 0.5 0.1 0.1\n7 0.5 0.5 0.1 0.1\n4 0.2 0.2 0.1 0.1\n",
    );
    write(&dir.join("good.txt"), "1 0.5 0.5 0.1 0.1\nshort line\n");
    write(&dir.join("notes.md"), "9 0.5 0.5 0.1 0.1\n");

    let stats = fix_label_files(dir, 4).unwrap();

    assert_eq!(stats.files_fixed, 1);
    assert_eq!(stats.lines_removed, 1);
    assert_eq!(
        fs::read_to_string(dir.join("bad.txt")).unwrap(),
        "0 0.5 0.5 0.1 0.1\n4 0.2 0.2 0.1 0.1\n"
    );
    assert_eq!(
        fs::read_to_string(dir.join("good.txt")).unwrap(),
        "1 0.5 0.5 0.1 0.1\nshort line\n"
    );
    assert_eq!(
        fs::read_to_string(dir.join("notes.md")).unwrap(),
        "9 0.5 0.5 0.1 0.1\n"
    );
}

#[test]
fn test_split_dataset() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = temp_dir.path().join("clean_dataset");
    for i in 0..10 {
        write(&source.join(format!("images/{}.jpg", i)), "jpg");
        if i != 3 {
            write(&source.join(format!("labels/{}.txt", i)), "0 0.5 0.5 0.1 0.1");
        }
    }

    let args = SplitArgs {
        source,
        output_dir: temp_dir.path().join("split_dataset"),
        train_size: 0.8,
        seed: 42,
    };
    let stats = split_dataset(&args).unwrap();

    assert_eq!(stats.train_images, 8);
    assert_eq!(stats.val_images, 2);
    assert_eq!(stats.missing_labels, 1);

    let train_images = file_names(&args.output_dir.join("images/train"));
    let val_images = file_names(&args.output_dir.join("images/val"));
    assert_eq!(train_images.len(), 8);
    assert_eq!(val_images.len(), 2);
    assert!(val_images.iter().all(|name| !train_images.contains(name)));

    let labels = file_names(&args.output_dir.join("labels/train")).len()
        + file_names(&args.output_dir.join("labels/val")).len();
    assert_eq!(labels, 9);
    assert!(!args.output_dir.join("labels/test").exists());
}

#[test]
fn test_split_dataset_requires_images_dir() {
    let temp_dir = tempfile::tempdir().unwrap();
    let args = SplitArgs {
        source: temp_dir.path().join("missing"),
        output_dir: temp_dir.path().join("out"),
        train_size: 0.8,
        seed: 42,
    };
    assert!(split_dataset(&args).is_err());
}

fn write_coco(path: &Path, image_count: u32) {
    let images: Vec<String> = (1..=image_count)
        .map(|id| {
            format!(
                r#"{{"id": {id}, "file_name": "im{id}.png", "width": 200, "height": 100}}"#
            )
        })
        .collect();
    let mut annotations: Vec<String> = (1..=image_count)
        .map(|id| {
            format!(r#"{{"id": {id}, "image_id": {id}, "category_id": 62, "bbox": [20, 10, 40, 20]}}"#)
        })
        .collect();
    // Dropped: unkept category, crowd box
    annotations.push(r#"{"id": 900, "image_id": 1, "category_id": 1, "bbox": [0, 0, 5, 5]}"#.to_string());
    annotations.push(
        r#"{"id": 901, "image_id": 2, "category_id": 62, "bbox": [0, 0, 5, 5], "iscrowd": 1}"#.to_string(),
    );

    let json = format!(
        r#"{{"categories": [{{"id": 1, "name": "person"}}, {{"id": 62, "name": "chair"}}, {{"id": 64, "name": "potted plant"}}],
            "images": [{}], "annotations": [{}]}}"#,
        images.join(","),
        annotations.join(",")
    );
    write(path, &json);
}

#[test]
fn test_convert_coco_dataset() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_coco(&root.join("coco.json"), 10);
    for id in 1..=9 {
        write(&root.join(format!("images_all/im{}.png", id)), "png");
    }

    let args = ConvertArgs {
        coco_json: root.join("coco.json"),
        images_root: root.join("images_all"),
        output_dir: root.join("yolo_dataset"),
        train_size: 0.8,
        val_size: 0.1,
        test_size: 0.1,
        seed: 42,
        classes: vec!["potted plant".to_string(), "chair".to_string()],
    };
    let stats = convert_coco_dataset(&args).unwrap();

    use std::sync::atomic::Ordering::Relaxed;
    assert_eq!(stats.copied.load(Relaxed), 9);
    assert_eq!(stats.missing.load(Relaxed), 1);
    let written: usize = Split::ALL.iter().map(|&s| stats.labels_written(s)).sum();
    assert_eq!(written, 9);

    let label_files: Vec<PathBuf> = Split::ALL
        .iter()
        .flat_map(|s| {
            let dir = args.output_dir.join("labels").join(s.dir_name());
            file_names(&dir).into_iter().map(move |n| dir.join(n))
        })
        .collect();
    assert_eq!(label_files.len(), 9);
    for path in &label_files {
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "1 0.200000 0.200000 0.200000 0.200000"
        );
    }

    let yaml = fs::read_to_string(args.output_dir.join("data.yaml")).unwrap();
    assert!(yaml.contains("test: images/test\n"));
    assert!(yaml.contains("  0: potted plant\n  1: chair\n"));
}

#[test]
fn test_convert_coco_dataset_rejects_unknown_classes() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_coco(&root.join("coco.json"), 2);

    let args = ConvertArgs {
        coco_json: root.join("coco.json"),
        images_root: root.join("images_all"),
        output_dir: root.join("yolo_dataset"),
        train_size: 0.8,
        val_size: 0.1,
        test_size: 0.1,
        seed: 42,
        classes: vec!["giraffe".to_string()],
    };
    assert!(convert_coco_dataset(&args).is_err());
}

#[test]
fn test_gather_images() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_coco(&root.join("coco.json"), 3);
    write(&root.join("roots/a/im1.png"), "one");
    write(&root.join("roots/b/nested/deeper/im2.png"), "two");

    let args = GatherArgs {
        coco_json: root.join("coco.json"),
        dest: root.join("images_all"),
        search_roots: vec![root.join("roots/a"), root.join("roots/b")],
    };
    let stats = gather_images(&args).unwrap();

    assert_eq!(stats.found, 2);
    assert_eq!(stats.missing, 1);
    assert_eq!(file_names(&args.dest), vec!["im1.png", "im2.png"]);
    assert_eq!(fs::read_to_string(args.dest.join("im2.png")).unwrap(), "two");
}

#[test]
fn test_clean_and_merge() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    for name in ["a", "b", "c"] {
        write(&root.join(format!("dataset/images/{}.png", name)), "original");
        write(&root.join(format!("dataset/labels/{}.txt", name)), "0 0.5 0.5 0.1 0.1");
    }
    write(&root.join("hardest/b.png"), "reviewed");
    write(&root.join("corrected/b.txt"), "3 0.4 0.4 0.2 0.2");

    let args = MergeArgs {
        images_dir: root.join("dataset/images"),
        labels_dir: root.join("dataset/labels"),
        hardest_dir: root.join("hardest"),
        corrected_labels_dir: root.join("corrected"),
        output_dir: root.join("clean_dataset"),
    };
    let stats = clean_and_merge(&args).unwrap();

    assert_eq!(stats.removed, 1);
    assert_eq!(stats.kept_images, 2);
    assert_eq!(stats.kept_labels, 2);
    assert_eq!(stats.corrected_images, 1);
    assert_eq!(stats.corrected_labels, 1);

    let out = &args.output_dir;
    assert_eq!(file_names(&out.join("images")), vec!["a.png", "b.png", "c.png"]);
    assert_eq!(fs::read_to_string(out.join("images/b.png")).unwrap(), "reviewed");
    assert_eq!(
        fs::read_to_string(out.join("labels/b.txt")).unwrap(),
        "3 0.4 0.4 0.2 0.2"
    );
}

#[test]
fn test_scoring_run_dotted_file_names() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write(&root.join("images/cam.png"), "png");
    write(&root.join("images/cam.v1.png"), "png");
    write(&root.join("labels/cam.txt"), "0 0.2 0.2 0.1 0.1\n0 0.7 0.7 0.1 0.1\n");
    write(&root.join("labels/cam.v1.txt"), "0 0.5 0.5 0.2 0.2\n");
    write(&root.join("preds/cam.v1.txt"), "0 0.5 0.5 0.2 0.2 0.9\n");

    let args = score_args(root);
    let report = run_scoring(
        &args,
        &LabelDir::new(&args.labels_dir),
        &PredictionDir::new(&args.predictions_dir),
    )
    .unwrap();

    let dotted = report
        .scores
        .iter()
        .find(|s| s.image_id == "cam.v1.png")
        .unwrap();
    assert_eq!(dotted.num_ground_truth, 1);
    assert_eq!(dotted.num_predicted, 1);
    assert!(dotted.error_score < 1e-4);

    let plain = report.scores.iter().find(|s| s.image_id == "cam.png").unwrap();
    assert_eq!(plain.num_ground_truth, 2);
    assert_eq!(plain.error_score, 7.0);
}

#[test]
fn test_split_dataset_dotted_file_names() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = temp_dir.path().join("clean_dataset");
    for name in ["cam.a", "cam.b"] {
        write(&source.join(format!("images/{}.jpg", name)), "jpg");
        write(&source.join(format!("labels/{}.txt", name)), name);
    }

    let args = SplitArgs {
        source,
        output_dir: temp_dir.path().join("split_dataset"),
        train_size: 0.5,
        seed: 42,
    };
    let stats = split_dataset(&args).unwrap();

    assert_eq!(stats.missing_labels, 0);
    assert_eq!(stats.failed, 0);
    for part in ["train", "val"] {
        let images = file_names(&args.output_dir.join("images").join(part));
        let labels = file_names(&args.output_dir.join("labels").join(part));
        assert_eq!(images.len(), 1);
        assert_eq!(labels, vec![images[0].replace(".jpg", ".txt")]);
    }
}

#[test]
fn test_convert_coco_dataset_dotted_file_names() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write(
        &root.join("coco.json"),
        r#"{"categories": [{"id": 1, "name": "chair"}],
            "images": [
                {"id": 1, "file_name": "a.b.png", "width": 100, "height": 100},
                {"id": 2, "file_name": "a.c.png", "width": 100, "height": 100}
            ],
            "annotations": [
                {"id": 1, "image_id": 1, "category_id": 1, "bbox": [0, 0, 10, 10]},
                {"id": 2, "image_id": 2, "category_id": 1, "bbox": [50, 50, 10, 10]}
            ]}"#,
    );
    write(&root.join("images_all/a.b.png"), "png");
    write(&root.join("images_all/a.c.png"), "png");

    let args = ConvertArgs {
        coco_json: root.join("coco.json"),
        images_root: root.join("images_all"),
        output_dir: root.join("yolo_dataset"),
        train_size: 1.0,
        val_size: 0.0,
        test_size: 0.0,
        seed: 42,
        classes: Vec::new(),
    };
    convert_coco_dataset(&args).unwrap();

    let labels = args.output_dir.join("labels/train");
    assert_eq!(file_names(&labels), vec!["a.b.txt", "a.c.txt"]);
    assert_eq!(
        fs::read_to_string(labels.join("a.b.txt")).unwrap(),
        "0 0.050000 0.050000 0.100000 0.100000"
    );
    assert_eq!(
        fs::read_to_string(labels.join("a.c.txt")).unwrap(),
        "0 0.550000 0.550000 0.100000 0.100000"
    );
}

#[test]
fn test_gather_images_refuses_names_outside_roots() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let victim = root.join("victim.png");
    write(&victim, "precious bytes");
    write(&root.join("roots/a/escape.png"), "escape");

    let names = [victim.to_string_lossy().into_owned(), "../escape.png".to_string()];
    let images: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(id, name)| {
            format!(
                r#"{{"id": {}, "file_name": {}}}"#,
                id,
                serde_json::to_string(name).unwrap()
            )
        })
        .collect();
    write(
        &root.join("coco.json"),
        &format!(r#"{{"images": [{}]}}"#, images.join(",")),
    );

    let args = GatherArgs {
        coco_json: root.join("coco.json"),
        dest: root.join("roots/a/gathered"),
        search_roots: vec![root.join("roots/a")],
    };
    let stats = gather_images(&args).unwrap();

    assert_eq!(stats.found, 0);
    assert_eq!(stats.missing, 2);
    assert_eq!(fs::read_to_string(&victim).unwrap(), "precious bytes");
    assert!(file_names(&args.dest).is_empty());
}

#[test]
fn test_gather_images_into_a_search_root() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_coco(&root.join("coco.json"), 1);
    write(&root.join("images_all/im1.png"), "already here");

    let args = GatherArgs {
        coco_json: root.join("coco.json"),
        dest: root.join("images_all"),
        search_roots: vec![root.join("images_all")],
    };
    let stats = gather_images(&args).unwrap();

    assert_eq!(stats.found, 1);
    assert_eq!(
        fs::read_to_string(args.dest.join("im1.png")).unwrap(),
        "already here"
    );
}

#[test]
fn test_clean_and_merge_continues_after_copy_failure() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    for name in ["a", "b", "c"] {
        write(&root.join(format!("dataset/images/{}.png", name)), name);
    }
    // Unwritable destination for a.png
    fs::create_dir_all(root.join("clean_dataset/images/a.png")).unwrap();

    let args = MergeArgs {
        images_dir: root.join("dataset/images"),
        labels_dir: root.join("dataset/labels"),
        hardest_dir: root.join("hardest"),
        corrected_labels_dir: root.join("corrected"),
        output_dir: root.join("clean_dataset"),
    };
    let stats = clean_and_merge(&args).unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.kept_images, 2);
    let out = args.output_dir.join("images");
    assert_eq!(fs::read_to_string(out.join("b.png")).unwrap(), "b");
    assert_eq!(fs::read_to_string(out.join("c.png")).unwrap(), "c");
}

#[test]
fn test_hardest_images_merge_back_once() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    // Sanitizing drops the colon from this name
    write(&root.join("images/odd:name.png"), "png");
    write(&root.join("preds/odd:name.txt"), "0 0.5 0.5 0.2 0.2 0.9\n");
    write(&root.join("images/plain.png"), "png");

    let args = score_args(root);
    let report = run_scoring(
        &args,
        &LabelDir::new(&args.labels_dir),
        &PredictionDir::new(&args.predictions_dir),
    )
    .unwrap();
    assert_eq!(report.hardest[0].image_id, "odd:name.png");
    assert_eq!(file_names(&args.hardest_dir()), vec!["odd:name.png"]);

    let merge = MergeArgs {
        images_dir: args.images_dir.clone(),
        labels_dir: args.labels_dir.clone(),
        hardest_dir: args.hardest_dir(),
        corrected_labels_dir: root.join("corrected"),
        output_dir: root.join("clean_dataset"),
    };
    let stats = clean_and_merge(&merge).unwrap();

    assert_eq!(stats.removed, 1);
    assert_eq!(stats.kept_images, 1);
    assert_eq!(stats.corrected_images, 1);
}
