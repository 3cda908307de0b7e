use std::fs;
use std::io::Read;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rep_solve::{PrimalDual, SolveStatus, SolverDiagnostics};
use rep_store::{
    write_source_archive, ArtifactKind, CheckpointStore, Clock, FixedClock, LoadOutcome,
    OutputLayout, Snapshot, SteppingClock,
};
use tempfile::tempdir;

fn fixed() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
}

fn stepping() -> Arc<dyn Clock> {
    Arc::new(SteppingClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        Duration::milliseconds(7),
    ))
}

fn snapshot(index: usize) -> Snapshot {
    Snapshot {
        index,
        data: PrimalDual {
            primal: vec![index as f64],
            dual: vec![],
        },
        details: SolverDiagnostics {
            backend: "pdhg".into(),
            status: SolveStatus::MaxIterations,
            objective: Some(1.0 / index as f64),
            iterations: index,
            residual: None,
        },
    }
}

#[test]
fn missing_and_corrupt_artifacts_load_as_absent() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path(), Arc::new(fixed()));

    assert_eq!(store.probe::<PrimalDual>(ArtifactKind::Params), LoadOutcome::Missing);
    assert!(store.load::<PrimalDual>(ArtifactKind::Params).is_none());

    fs::write(store.path(ArtifactKind::Params), b"\x00\xffnot json").unwrap();
    assert!(matches!(
        store.probe::<PrimalDual>(ArtifactKind::Params),
        LoadOutcome::Corrupt(_)
    ));
    assert!(store.load::<PrimalDual>(ArtifactKind::Params).is_none());

    fs::write(store.path(ArtifactKind::Result), br#"{"primal": "wrong"}"#).unwrap();
    assert!(store.load::<PrimalDual>(ArtifactKind::Result).is_none());
}

#[test]
fn save_replaces_atomically_and_leaves_no_temp_files() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path(), Arc::new(fixed()));
    let first = PrimalDual::zeros(2, 1);
    let second = PrimalDual {
        primal: vec![1.0, 2.0],
        dual: vec![3.0],
    };
    store.save(ArtifactKind::Data, &first).unwrap();
    let path = store.save(ArtifactKind::Data, &second).unwrap();
    assert_eq!(path, dir.path().join("data.json"));
    assert_eq!(store.load::<PrimalDual>(ArtifactKind::Data), Some(second));

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["data.json".to_string()]);
}

#[test]
fn save_into_missing_directory_is_fatal() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("gone"), Arc::new(fixed()));
    let err = store
        .save(ArtifactKind::Result, &PrimalDual::default())
        .unwrap_err();
    assert!(!err.is_config());
    assert_eq!(err.info().code, "checkpoint-tempfile");
}

#[test]
fn snapshots_list_in_creation_order() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path(), stepping());
    for index in [1, 2, 3] {
        store.save_snapshot(&snapshot(index)).unwrap();
    }
    // A second solve restarting its iteration count sorts after the first.
    store.save_snapshot(&snapshot(1)).unwrap();
    fs::write(dir.path().join("snapshot-notes.txt"), "ignored").unwrap();

    let listed: Vec<usize> = store
        .list_snapshots()
        .unwrap()
        .into_iter()
        .map(|snapshot| snapshot.index)
        .collect();
    assert_eq!(listed, vec![1, 2, 3, 1]);
    let again: Vec<usize> = store
        .list_snapshots()
        .unwrap()
        .into_iter()
        .map(|snapshot| snapshot.index)
        .collect();
    assert_eq!(listed, again);
}

#[test]
fn snapshot_names_never_collide_silently() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path(), Arc::new(fixed()));
    let path = store.save_snapshot(&snapshot(4)).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_string_lossy(),
        "snapshot-20240301123000000-000004.json"
    );
    let err = store.save_snapshot(&snapshot(4)).unwrap_err();
    assert_eq!(err.info().code, "snapshot-persist");
}

#[test]
fn corrupt_snapshots_are_skipped() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path(), stepping());
    store.save_snapshot(&snapshot(1)).unwrap();
    let broken = store.save_snapshot(&snapshot(2)).unwrap();
    store.save_snapshot(&snapshot(3)).unwrap();
    fs::write(broken, "{").unwrap();
    let listed: Vec<usize> = store
        .list_snapshots()
        .unwrap()
        .iter()
        .map(|snapshot| snapshot.index)
        .collect();
    assert_eq!(listed, vec![1, 3]);
}

#[test]
fn generated_output_dirs_do_not_collide() {
    let root = tempdir().unwrap();
    let clock = fixed();
    let first = OutputLayout::resolve(None, "linear-ridge", root.path(), &clock).unwrap();
    let second = OutputLayout::resolve(None, "linear-ridge", root.path(), &clock).unwrap();
    let third = OutputLayout::resolve(None, "linear-ridge", root.path(), &clock).unwrap();
    assert_eq!(first.dir, root.path().join("20240301123000-linear-ridge"));
    assert_eq!(second.dir, root.path().join("20240301123000-linear-ridge-1"));
    assert_eq!(third.dir, root.path().join("20240301123000-linear-ridge-2"));
    assert!(!first.explicit);

    let reused = OutputLayout::resolve(Some(&first.dir), "ignored", root.path(), &clock).unwrap();
    assert_eq!(reused.dir, first.dir);
    assert!(reused.explicit);
}

#[test]
fn source_archive_skips_build_and_result_dirs() {
    let src = tempdir().unwrap();
    let project = src.path().join("project");
    fs::create_dir_all(project.join("src")).unwrap();
    fs::create_dir_all(project.join("target/debug")).unwrap();
    fs::create_dir_all(project.join("results/run")).unwrap();
    fs::write(project.join("Cargo.toml"), "[package]").unwrap();
    fs::write(project.join("src/main.rs"), "fn main() {}").unwrap();
    fs::write(project.join("target/debug/rep"), "binary").unwrap();
    fs::write(project.join("results/run/result.json"), "{}").unwrap();

    let out = tempdir().unwrap();
    let dest = out.path().join("20240301123000-source.zip");
    let missing = src.path().join("absent");
    let entries = write_source_archive(&[project.clone(), missing], &dest).unwrap();
    assert_eq!(
        entries,
        vec!["project/Cargo.toml".to_string(), "project/src/main.rs".to_string()]
    );

    let mut archive = zip::ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
    assert_eq!(archive.len(), 2);
    let mut contents = String::new();
    archive
        .by_name("project/src/main.rs")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "fn main() {}");
}
