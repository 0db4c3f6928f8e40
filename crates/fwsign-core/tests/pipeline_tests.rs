//! Integration tests for the release pipeline

mod common;

use std::path::{Path, PathBuf};

use common::{
    capture_logs, firmware, test_key, write_keypair, write_ota_header, CorruptingEngine,
    ObservingEngine,
};
use fwsign_core::{
    image::split, Error, KeyPairPaths, Manifest, Pipeline, PipelineOutcome, PipelineState,
    PrerequisiteKind, ReleaseTarget, RsaPkcs1Engine, Signature, SignatureEngine, Stage,
    DEFAULT_VERSION,
};

struct Project {
    dir: tempfile::TempDir,
    keys: KeyPairPaths,
    binary: PathBuf,
    metadata: PathBuf,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let keys = write_keypair(dir.path(), test_key());
        let metadata = write_ota_header(dir.path(), "2", "3", "1");

        let build = dir.path().join(".pio").join("build");
        std::fs::create_dir_all(&build).unwrap();
        let binary = build.join("firmware.bin");
        std::fs::write(&binary, firmware(32 * 1024)).unwrap();

        Self {
            dir,
            keys,
            binary,
            metadata,
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn target(&self) -> ReleaseTarget {
        ReleaseTarget::new(self.root().join("firmware_release"))
    }

    fn pipeline(&self, engine: Box<dyn SignatureEngine>) -> Pipeline {
        Pipeline::new(self.keys.clone(), self.target(), &self.metadata, engine)
    }
}

#[test]
fn test_complete_run_publishes_image_and_manifest() {
    let project = Project::new();
    let target = project.target();

    let report = project
        .pipeline(Box::new(RsaPkcs1Engine::new()))
        .run(&project.binary);

    assert_eq!(
        report.states,
        vec![
            PipelineState::NotStarted,
            PipelineState::PrerequisitesChecked,
            PipelineState::VersionResolved,
            PipelineState::Signed,
            PipelineState::Verified,
            PipelineState::Assembled,
            PipelineState::ManifestWritten,
            PipelineState::Complete,
        ]
    );

    let PipelineOutcome::Complete(summary) = report.outcome else {
        panic!("expected complete run");
    };
    assert_eq!(summary.version.to_string(), "2.3.1");
    assert!(!summary.used_default_version);
    assert_eq!(summary.signature_size, 256);
    assert_eq!(summary.firmware_size, 32 * 1024);
    assert_eq!(summary.image_size, 256 + 32 * 1024);
    assert_eq!(summary.image_path, target.image_path());

    let image = std::fs::read(target.image_path()).unwrap();
    assert_eq!(summary.image_sha256, hex::encode(fwsign_core::signature::digest(&image)));
    let (sig, payload) = split(&image, summary.signature_size).unwrap();
    assert_eq!(payload, firmware(32 * 1024).as_slice());
    assert!(RsaPkcs1Engine::new()
        .verify(&project.keys.public_key, payload, &Signature::new(sig.to_vec()))
        .unwrap());

    let manifest = std::fs::read_to_string(target.manifest_path()).unwrap();
    assert_eq!(
        manifest,
        "{\n  \"type\": \"esp32-fota-http\",\n  \"version\": \"2.3.1\",\n  \"bin\": \"firmware.img\"\n}\n"
    );

    assert!(!target.signature_path().exists());
}

#[test]
fn test_missing_private_key_skips() {
    let project = Project::new();
    std::fs::remove_file(&project.keys.private_key).unwrap();

    let report = project
        .pipeline(Box::new(RsaPkcs1Engine::new()))
        .run(&project.binary);

    assert!(report.is_skipped());
    assert!(!report.is_failed());
    match &report.outcome {
        PipelineOutcome::Skipped(missing) => {
            assert_eq!(missing.kind, PrerequisiteKind::PrivateKey);
            assert_eq!(missing.path, project.keys.private_key);
        }
        other => panic!("expected skip, got {:?}", other),
    }
    assert!(!project.target().image_path().exists());
    assert!(!project.target().manifest_path().exists());
}

#[test]
fn test_missing_public_key_skips() {
    let project = Project::new();
    std::fs::remove_file(&project.keys.public_key).unwrap();

    let report = project
        .pipeline(Box::new(RsaPkcs1Engine::new()))
        .run(&project.binary);

    match report.outcome {
        PipelineOutcome::Skipped(missing) => assert_eq!(missing.kind, PrerequisiteKind::PublicKey),
        other => panic!("expected skip, got {:?}", other),
    }
}

#[test]
fn test_missing_binary_skips() {
    let project = Project::new();

    let report = project
        .pipeline(Box::new(RsaPkcs1Engine::new()))
        .run(&project.root().join("nope.bin"));

    assert_eq!(report.final_state(), PipelineState::Skipped);
}

#[test]
fn test_corrupted_signature_publishes_nothing() {
    let project = Project::new();
    let target = project.target();

    let report = project
        .pipeline(Box::new(CorruptingEngine(RsaPkcs1Engine::new())))
        .run(&project.binary);

    assert_eq!(report.final_state(), PipelineState::Failed(Stage::Verify));
    match &report.outcome {
        PipelineOutcome::Failed { stage, error } => {
            assert_eq!(*stage, Stage::Verify);
            assert!(matches!(error, Error::Verification(_)));
        }
        other => panic!("expected failure, got {:?}", other),
    }

    assert!(!target.image_path().exists());
    assert!(!target.manifest_path().exists());
    assert!(!target.signature_path().exists());
}

#[test]
fn test_mismatched_key_pair_fails_verification() {
    let project = Project::new();
    let other_dir = tempfile::tempdir().unwrap();
    let other = write_keypair(other_dir.path(), common::other_key());
    std::fs::copy(&other.public_key, &project.keys.public_key).unwrap();

    let report = project
        .pipeline(Box::new(RsaPkcs1Engine::new()))
        .run(&project.binary);

    assert_eq!(report.final_state(), PipelineState::Failed(Stage::Verify));
    assert!(!project.target().signature_path().exists());
    assert!(!project.target().image_path().exists());
}

#[test]
fn test_malformed_private_key_fails_signing() {
    let project = Project::new();
    std::fs::write(&project.keys.private_key, "garbage").unwrap();

    let report = project
        .pipeline(Box::new(RsaPkcs1Engine::new()))
        .run(&project.binary);

    match report.outcome {
        PipelineOutcome::Failed { stage, error } => {
            assert_eq!(stage, Stage::Sign);
            assert!(matches!(error, Error::Signing(_)));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(!project.target().signature_path().exists());
    assert!(!project.target().image_path().exists());
}

#[test]
fn test_manifest_failure_keeps_image() {
    let project = Project::new();
    let target = project.target();
    // A directory where the manifest should go makes the rename fail
    std::fs::create_dir_all(target.manifest_path()).unwrap();

    let report = project
        .pipeline(Box::new(RsaPkcs1Engine::new()))
        .run(&project.binary);

    match report.outcome {
        PipelineOutcome::Failed { stage, error } => {
            assert_eq!(stage, Stage::Manifest);
            assert!(matches!(error, Error::ManifestWrite(_)));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(target.image_path().is_file());
    assert!(!target.signature_path().exists());
}

#[test]
fn test_missing_metadata_uses_default_version() {
    let project = Project::new();
    std::fs::remove_file(&project.metadata).unwrap();

    let report = project
        .pipeline(Box::new(RsaPkcs1Engine::new()))
        .run(&project.binary);

    let PipelineOutcome::Complete(summary) = report.outcome else {
        panic!("expected complete run");
    };
    assert!(summary.used_default_version);
    assert_eq!(summary.version.to_string(), DEFAULT_VERSION);

    let manifest =
        Manifest::from_json(&std::fs::read_to_string(project.target().manifest_path()).unwrap())
            .unwrap();
    assert_eq!(manifest.version, DEFAULT_VERSION);
}

#[test]
fn test_rerun_replaces_previous_release() {
    let project = Project::new();
    let target = project.target();
    let pipeline = project.pipeline(Box::new(RsaPkcs1Engine::new()));

    assert!(pipeline.run(&project.binary).is_complete());

    write_ota_header(project.root(), "2", "4", "0");
    std::fs::write(&project.binary, firmware(1000)).unwrap();
    assert!(pipeline.run(&project.binary).is_complete());

    let manifest = Manifest::from_json(&std::fs::read_to_string(target.manifest_path()).unwrap())
        .unwrap();
    assert_eq!(manifest.version, "2.4.0");
    assert_eq!(
        std::fs::metadata(target.image_path()).unwrap().len(),
        256 + 1000
    );

    let mut entries: Vec<String> = std::fs::read_dir(&target.dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    assert_eq!(entries, vec!["firmware.img", "manifest.json"]);
}

#[test]
fn test_custom_manifest_type_and_names() {
    let project = Project::new();
    let target = ReleaseTarget {
        dir: project.root().join("out"),
        image_name: "app-signed.bin".to_string(),
        manifest_name: "latest.json".to_string(),
        signature_name: "app.sig".to_string(),
    };

    let report = Pipeline::new(
        project.keys.clone(),
        target.clone(),
        &project.metadata,
        Box::new(RsaPkcs1Engine::new()),
    )
    .with_manifest_type("custom-ota")
    .run(&project.binary);

    assert!(report.is_complete());
    let manifest = Manifest::from_json(&std::fs::read_to_string(target.manifest_path()).unwrap())
        .unwrap();
    assert_eq!(manifest.kind, "custom-ota");
    assert_eq!(manifest.bin, "app-signed.bin");
    assert!(target.image_path().is_file());
}

/// Keys provisioned in a directory whose name must never reach the logs
fn project_with_hidden_keys() -> (Project, PathBuf) {
    let mut project = Project::new();
    let key_dir = project.root().join("SECRET-KEY-LOCATION");
    std::fs::create_dir_all(&key_dir).unwrap();
    project.keys = write_keypair(&key_dir, test_key());
    (project, key_dir)
}

#[test]
fn test_logs_never_name_key_paths() {
    let (project, _key_dir) = project_with_hidden_keys();

    let (report, logs) = capture_logs(|| {
        project
            .pipeline(Box::new(RsaPkcs1Engine::new()))
            .run(&project.binary)
    });
    assert!(report.is_complete());
    assert!(logs.contains("Firmware signing complete"));
    assert!(!logs.contains("SECRET-KEY-LOCATION"));
}

#[test]
fn test_skip_log_names_kind_not_path() {
    let (project, _key_dir) = project_with_hidden_keys();
    std::fs::remove_file(&project.keys.private_key).unwrap();

    let (report, logs) = capture_logs(|| {
        project
            .pipeline(Box::new(RsaPkcs1Engine::new()))
            .run(&project.binary)
    });
    assert!(report.is_skipped());
    assert!(logs.contains("Private key not found; skipping firmware signing"));
    assert!(!logs.contains("SECRET-KEY-LOCATION"));
}

#[test]
fn test_signing_failure_log_omits_key_path() {
    let (project, _key_dir) = project_with_hidden_keys();
    std::fs::write(&project.keys.private_key, "garbage").unwrap();

    let (report, logs) = capture_logs(|| {
        project
            .pipeline(Box::new(RsaPkcs1Engine::new()))
            .run(&project.binary)
    });
    assert_eq!(report.final_state(), PipelineState::Failed(Stage::Sign));
    assert!(logs.contains("Firmware signing failed"));
    assert!(!logs.contains("SECRET-KEY-LOCATION"));
}

#[test]
fn test_in_process_backend_keeps_signature_off_disk() {
    let project = Project::new();
    let target = project.target();
    let engine = ObservingEngine::new(RsaPkcs1Engine::new(), target.signature_path());
    let seen = engine.seen_on_disk.clone();

    let report = project.pipeline(Box::new(engine)).run(&project.binary);

    assert!(report.is_complete());
    assert_eq!(*seen.lock().unwrap(), Some(false));
    assert!(!target.signature_path().exists());
}
