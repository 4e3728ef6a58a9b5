//! End-to-end builds through `ArchiveBuilder`.

use std::fs;

use zapper_lib::build::StageError;
use zapper_lib::deps::InstallError;
use zapper_lib::{ArchiveBuilder, BuildStage, BuildState, IgnoreMode, IgnoreSet};

use super::common::{Project, archive_members, python, read_member};

const APP: &str = "import sys\n\ndef main(argv=None):\n    print('hello', *(argv or []))\n    return 0\n";

mod scenarios {
  use super::*;

  #[cfg(unix)]
  #[tokio::test]
  async fn single_module_app() {
    use std::os::unix::fs::PermissionsExt;

    let project = Project::new();
    project.write("app.py", APP);

    let mut builder = ArchiveBuilder::new(project.spec("app:main"));
    let report = builder.build().await.unwrap();

    let archive = project.dist.join("myapp.pyz");
    assert_eq!(report.archive, archive);
    assert_eq!(builder.state(), BuildState::Done);

    let mode = fs::metadata(&archive).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);

    let members = archive_members(&archive);
    assert_eq!(members, vec!["__main__.py", "app.py"]);
    assert!(!members.iter().any(|m| m.starts_with("vendor/")));

    let launcher = read_member(&archive, "__main__.py");
    assert!(launcher.contains("from app import main as _entry_point"));
    assert!(launcher.contains("sys.exit(_main())"));

    assert!(!project.src.join("__main__.py").exists());
    assert!(!project.src.join("vendor").exists());
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn virtualenv_directories_are_left_out() {
    let project = Project::new();
    project.write("env/lib/x.py", "x = 1\n");
    project.write("venv/bin/activate", "");
    project.write("src/main.py", APP);

    let report = ArchiveBuilder::new(project.spec("src.main:main")).build().await.unwrap();

    let members = archive_members(&report.archive);
    assert!(members.contains(&"src/main.py".to_string()));
    assert!(!members.iter().any(|m| m.starts_with("env/") || m.starts_with("venv/")));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn segment_mode_keeps_lookalike_names() {
    let project = Project::new();
    project.write("app.py", APP);
    project.write("environment.py", "X = 1\n");
    project.write("env/lib/x.py", "x = 1\n");

    let mut loose_spec = project.spec("app:main");
    loose_spec.archive_name = Some("loose.pyz".to_string());
    let loose = ArchiveBuilder::new(loose_spec).build().await.unwrap();

    let mut strict_spec = project.spec("app:main");
    strict_spec.archive_name = Some("strict.pyz".to_string());
    strict_spec.ignore = IgnoreSet::new(vec!["env".to_string()], IgnoreMode::Segments);
    let strict = ArchiveBuilder::new(strict_spec).build().await.unwrap();

    assert!(!loose.members.contains(&"environment.py".to_string()));
    assert!(strict.members.contains(&"environment.py".to_string()));
    assert!(!strict.members.iter().any(|m| m.starts_with("env/")));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn explicit_dependencies_are_vendored() {
    let project = Project::new();
    project.write("app.py", APP);
    let mut spec = project.spec("app:main");
    spec.dependencies = vec!["alpha".to_string(), "beta".to_string()];

    let report = ArchiveBuilder::new(spec).build().await.unwrap();

    assert!(report.members.contains(&"vendor/alpha/__init__.py".to_string()));
    assert!(report.members.contains(&"vendor/beta/__init__.py".to_string()));
    assert!(!project.src.join("vendor").exists());

    let log = project.installer_log();
    assert_eq!(log.lines().count(), 2);
    assert!(log.lines().all(|l| l.starts_with("install ") && l.contains("--target=")));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn requirements_txt_is_installed_by_default() {
    let project = Project::new();
    project.write("app.py", APP);
    project.write("requirements.txt", "gamma\n");

    let report = ArchiveBuilder::new(project.spec("app:main")).build().await.unwrap();

    assert_eq!(report.manifest, Some(project.src.join("requirements.txt")));
    assert!(report.members.contains(&"vendor/gamma/__init__.py".to_string()));
    assert!(report.members.contains(&"requirements.txt".to_string()));
    assert!(project.installer_log().contains("install -r"));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn archive_runs_under_python() {
    let Some(python) = python() else {
      eprintln!("no python interpreter found, skipping");
      return;
    };

    let project = Project::new();
    project.write(
      "app.py",
      "import alpha\n\ndef main(argv):\n    print(alpha.NAME, *argv)\n    return 3\n",
    );
    let mut spec = project.spec("app:main 'big world' again");
    spec.dependencies = vec!["alpha".to_string()];

    let report = ArchiveBuilder::new(spec).build().await.unwrap();

    let output = std::process::Command::new(python).arg(&report.archive).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "alpha big world again");
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn argv_style_main_receives_one_list() {
    let Some(python) = python() else {
      eprintln!("no python interpreter found, skipping");
      return;
    };

    let project = Project::new();
    project.write(
      "app.py",
      "def main(argv):\n    print(type(argv).__name__, len(argv), argv[0])\n    return 0\n",
    );

    let report = ArchiveBuilder::new(project.spec("app:main --x 1")).build().await.unwrap();

    let output = std::process::Command::new(python).arg(&report.archive).output().unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "list 2 --x");
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn main_without_arguments_is_called_bare() {
    let Some(python) = python() else {
      eprintln!("no python interpreter found, skipping");
      return;
    };

    let project = Project::new();
    project.write("app.py", "def main():\n    print('bare')\n    return 0\n");

    let report = ArchiveBuilder::new(project.spec("app:main")).build().await.unwrap();

    let output = std::process::Command::new(python).arg(&report.archive).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "bare");
  }
}

mod rebuilds {
  use super::*;

  #[cfg(unix)]
  #[tokio::test]
  async fn rebuilding_unchanged_tree_is_identical() {
    let project = Project::new();
    project.write("app.py", APP);
    project.write("pkg/__init__.py", "");
    project.write("pkg/util.py", "X = 1\n");

    let mut builder = ArchiveBuilder::new(project.spec("app:main"));
    let first_report = builder.build().await.unwrap();
    let first = fs::read(&first_report.archive).unwrap();
    let second_report = builder.build().await.unwrap();
    let second = fs::read(&second_report.archive).unwrap();

    assert_eq!(first_report.members, second_report.members);
    assert_eq!(first, second);
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn rebuild_replaces_previous_archive() {
    let project = Project::new();
    project.write("app.py", APP);
    let spec = project.spec("app:main");

    ArchiveBuilder::new(spec.clone()).build().await.unwrap();
    project.write("extra.py", "");
    let report = ArchiveBuilder::new(spec).build().await.unwrap();

    assert!(report.members.contains(&"extra.py".to_string()));
    let names: Vec<_> = fs::read_dir(&project.dist)
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
      .collect();
    assert_eq!(names, vec!["myapp.pyz"]);
  }
}

mod teardown {
  use super::*;

  #[cfg(unix)]
  #[tokio::test]
  async fn successful_build_leaves_source_tree_unchanged() {
    let project = Project::new();
    project.write("app.py", APP);
    project.write("pkg/mod.py", "");
    let before = project.source_listing();
    let mut spec = project.spec("app:main");
    spec.dependencies = vec!["alpha".to_string()];

    ArchiveBuilder::new(spec).build().await.unwrap();

    assert_eq!(project.source_listing(), before);
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn failed_install_leaves_source_tree_unchanged() {
    let project = Project::new();
    project.write("app.py", APP);
    let before = project.source_listing();
    let mut spec = project.spec("app:main");
    spec.dependencies = vec!["alpha".to_string(), "broken".to_string()];

    let err = ArchiveBuilder::new(spec).build().await.unwrap_err();

    assert_eq!(err.stage, BuildStage::InstallDependencies);
    let StageError::Install(InstallError::Failed { failures }) = &err.error else {
      panic!("expected install failure, got {err}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].target, "broken");
    assert_eq!(project.source_listing(), before);
    assert!(!project.dist.join("myapp.pyz").exists());
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn existing_vendor_dir_is_archived_and_kept() {
    let project = Project::new();
    project.write("app.py", APP);
    project.write("vendor/local/__init__.py", "");
    let mut spec = project.spec("app:main");
    spec.dependencies = vec!["alpha".to_string()];

    let report = ArchiveBuilder::new(spec).build().await.unwrap();

    assert!(report.members.contains(&"vendor/local/__init__.py".to_string()));
    assert!(report.members.contains(&"vendor/alpha/__init__.py".to_string()));
    assert!(project.src.join("vendor/local/__init__.py").exists());
  }

  #[tokio::test]
  async fn malformed_entry_point_touches_nothing() {
    let project = Project::new();
    project.write("app.py", APP);
    let before = project.source_listing();

    let err = ArchiveBuilder::new(project.spec("app:main:extra")).build().await.unwrap_err();

    assert_eq!(err.stage, BuildStage::SynthesizeEntryPoint);
    assert_eq!(project.source_listing(), before);
    assert!(fs::read_dir(&project.dist).unwrap().next().is_none());
  }

  #[tokio::test]
  async fn missing_installer_is_reported_and_cleaned_up() {
    let project = Project::new();
    project.write("app.py", APP);
    let before = project.source_listing();
    let mut spec = project.spec("app:main");
    spec.installer.program = project.tools.join("missing-pip").to_string_lossy().into_owned();

    let err = ArchiveBuilder::new(spec).build().await.unwrap_err();

    assert!(matches!(err.error, StageError::Install(InstallError::ToolMissing { .. })));
    assert!(err.to_string().contains("missing-pip"));
    assert_eq!(project.source_listing(), before);
  }
}
