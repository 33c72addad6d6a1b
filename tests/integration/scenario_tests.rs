//! End-to-end runs over the Person/School module.

use immutablecheck::check::{Detection, MutationKind};
use immutablecheck::{exit_code, AnalyzerConfig};

use crate::common::{findings, Fixture};

#[test]
fn test_person_and_school_diagnostics() {
    let fixture = Fixture::school();
    let report = fixture.run("");

    assert_eq!(report.packages_analyzed, 1);
    assert!(report.parse_failures.is_empty());
    assert_eq!(
        findings(&report),
        vec![
            (9, "assignment to immutable field Id".to_string()),
            (11, "assignment to immutable field Age".to_string()),
            (24, "assignment to immutable field Teachers".to_string()),
            (33, "assignment to immutable field Teachers".to_string()),
            (35, "modifying immutable field Teachers (map/slice index)".to_string()),
        ]
    );
    assert_eq!(report.exit_code(), exit_code::DIAGNOSTICS);
}

#[test]
fn test_diagnostic_details() {
    let fixture = Fixture::school();
    let report = fixture.run("main.go");

    let first = &report.diagnostics[0];
    assert_eq!(first.path, fixture.path("main.go"));
    assert_eq!(first.column, 2);
    assert_eq!(first.owner, "Person");
    assert_eq!(first.field, "Id");
    assert_eq!(first.kind, MutationKind::Assign);
    assert_eq!(first.detection, Detection::DescriptorFallback);
    assert_eq!(
        first.to_string(),
        format!("{}:9:2: assignment to immutable field Id", fixture.path("main.go").display())
    );

    let index = report.diagnostics.last().unwrap();
    assert_eq!(index.kind, MutationKind::IndexMutate);
    assert_eq!(index.owner, "TeacherTeam");
    assert_eq!(report.descriptors, vec![fixture.descriptor_path()]);
}

#[test]
fn test_descriptor_found_at_conventional_location() {
    let fixture = Fixture::school();
    // No explicit path: the package directory's pb/descriptor/all.protos.pb is tried.
    let report = fixture.run_with("", &AnalyzerConfig::default());
    assert_eq!(report.diagnostics.len(), 5);
}

#[test]
fn test_fallback_needs_generated_package() {
    let fixture = Fixture::school();
    let config = AnalyzerConfig {
        generated_packages: Vec::new(),
        generated_path_suffixes: Vec::new(),
        ..fixture.config()
    };
    let report = fixture.run_with("", &config);
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.exit_code(), exit_code::CLEAN);
}

#[test]
fn test_generated_package_is_analyzed_directly() {
    let fixture = Fixture::school();
    fixture.write(
        "pb/mutate.go",
        "package pb\n\nfunc Reset(p *Person) {\n\tp.Id = 0\n\tp.Name = \"\"\n}\n",
    );
    let report = fixture.run("pb");

    // Message types declared in the package are upgraded to local identities.
    assert_eq!(findings(&report), vec![(4, "assignment to immutable field Id".to_string())]);
    assert_eq!(report.diagnostics[0].detection, Detection::Local);
}

#[test]
fn test_missing_descriptor_keeps_local_markers() {
    let fixture = Fixture::new();
    fixture.write(
        "model/model.go",
        r#"package model

type Account struct {
	ID      string `immutable:"true"`
	Owner   string // immutable
	Balance int64
}

func Touch(a *Account) {
	a.ID = "x"
	a.Owner = "y"
	a.Balance = 1
}
"#,
    );
    let report = fixture.run("model");
    assert!(report.descriptors.is_empty());
    assert_eq!(
        findings(&report),
        vec![
            (10, "assignment to immutable field ID".to_string()),
            (11, "assignment to immutable field Owner".to_string()),
        ]
    );
}

#[test]
fn test_malformed_descriptor_is_not_fatal() {
    let fixture = Fixture::school();
    std::fs::write(fixture.descriptor_path(), [0xFF, 0xFF, 0xFF]).unwrap();
    let report = fixture.run("");
    assert!(report.diagnostics.is_empty());
    assert!(report.parse_failures.is_empty());
}

#[test]
fn test_recursive_pattern_covers_every_package() {
    let fixture = Fixture::school();
    let report = immutablecheck::run(&[format!("{}/...", fixture.root().display())], &fixture.config()).unwrap();
    assert_eq!(report.packages_analyzed, 2);
    assert_eq!(report.diagnostics.len(), 5);
}

#[test]
fn test_parse_failure_skips_only_that_file() {
    let fixture = Fixture::school();
    fixture.write("broken.go", "package main\n\nfunc broken( {\n");
    let report = fixture.run("");

    assert_eq!(report.parse_failures.len(), 1);
    assert_eq!(report.parse_failures[0].path, fixture.path("broken.go"));
    assert!(report.parse_failures[0].detail.starts_with("syntax error"));
    assert_eq!(report.diagnostics.len(), 5);
    assert_eq!(report.exit_code(), exit_code::LOAD_ERROR);
}

#[test]
fn test_unmatched_pattern_is_an_error() {
    let fixture = Fixture::new();
    let result = immutablecheck::run(&[fixture.pattern("nowhere")], &AnalyzerConfig::default());
    assert!(matches!(result, Err(immutablecheck::CheckError::NoMatch(_))));
}
