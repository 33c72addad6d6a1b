//! Local markers, mutation shapes and type resolution through real packages.

use immutablecheck::check::{Detection, MutationKind};
use immutablecheck::AnalyzerConfig;

use crate::common::{findings, Fixture};

fn run_single(source: &str) -> immutablecheck::Report {
    let fixture = Fixture::new();
    fixture.write("app/app.go", source);
    fixture.run("app")
}

#[test]
fn test_map_index_write_on_field_never_reassigned() {
    let report = run_single(
        r#"package app

type Config struct {
	Labels map[string]string `immutable:"1"`
	Hosts  []string          `immutable:"true"`
}

func Edit(c *Config) {
	c.Labels["env"] = "prod"
	c.Hosts[0] = "localhost"
	delete(c.Labels, "env")
	_ = c.Labels["env"]
}
"#,
    );
    assert_eq!(
        findings(&report),
        vec![
            (9, "modifying immutable field Labels (map/slice index)".to_string()),
            (10, "modifying immutable field Hosts (map/slice index)".to_string()),
        ]
    );
    assert!(report.diagnostics.iter().all(|d| d.kind == MutationKind::IndexMutate));
}

#[test]
fn test_inc_dec_and_compound_assignment() {
    let report = run_single(
        r#"package app

type Counter struct {
	// Hits is immutable once the counter is published.
	Hits  int
	Other int
}

func Bump(c *Counter) {
	c.Hits++
	c.Hits--
	c.Hits += 2
	c.Other++
}
"#,
    );
    assert_eq!(
        findings(&report),
        vec![
            (10, "modifying immutable field Hits (inc/dec)".to_string()),
            (11, "modifying immutable field Hits (inc/dec)".to_string()),
            (12, "assignment to immutable field Hits".to_string()),
        ]
    );
}

#[test]
fn test_unmarked_fields_produce_nothing() {
    let report = run_single(
        r#"package app

type Plain struct {
	A int
	B map[string]int
	C int `json:"c,omitempty"`
	D int `immutable:"false"`
}

func Mutate(p *Plain) {
	p.A = 1
	p.B["x"] = 2
	p.C++
	p.D = 3
}
"#,
    );
    assert!(report.diagnostics.is_empty());
}

#[test]
fn test_same_field_name_on_unrelated_types() {
    let report = run_single(
        r#"package app

type Frozen struct {
	ID int `immutable:"true"`
}

type Thawed struct {
	ID int
}

func Set(f *Frozen, t *Thawed) {
	t.ID = 1
	f.ID = 2
}
"#,
    );
    assert_eq!(findings(&report), vec![(13, "assignment to immutable field ID".to_string())]);
    assert_eq!(report.diagnostics[0].owner, "Frozen");
    assert_eq!(report.diagnostics[0].detection, Detection::Local);
}

#[test]
fn test_resolution_through_locals_and_embedding() {
    let report = run_single(
        r#"package app

type Meta struct {
	Version int `immutable:"true"`
}

type Doc struct {
	Meta
	Parts []*Doc
	Index map[string]Doc
}

func NewDoc() *Doc { return &Doc{} }

func (d *Doc) Child(i int) *Doc { return d.Parts[i] }

func Walk(d *Doc) {
	d.Version = 1
	for _, p := range d.Parts {
		p.Version = 2
	}
	n := NewDoc()
	n.Meta.Version = 3
	d.Child(0).Version = 4
	var m Doc
	m.Version = 5
	(d).Version = 6
	func() {
		d.Version = 7
	}()
}
"#,
    );
    let lines: Vec<usize> = report.diagnostics.iter().map(|d| d.line).collect();
    assert_eq!(lines, vec![18, 20, 23, 24, 26, 27, 29]);
    assert!(report.diagnostics.iter().all(|d| d.field == "Version"));
}

#[test]
fn test_multiple_assignment_targets() {
    let report = run_single(
        r#"package app

type Pair struct {
	Left  int `immutable:"true"`
	Right int
}

func Swap(p *Pair) {
	p.Left, p.Right = p.Right, p.Left
}
"#,
    );
    assert_eq!(findings(&report), vec![(9, "assignment to immutable field Left".to_string())]);
}

#[test]
fn test_shadowed_variables_use_innermost_binding() {
    let report = run_single(
        r#"package app

type Locked struct {
	Key string `immutable:"true"`
}

type Open struct {
	Key string
}

func Shadow(v *Locked) {
	{
		v := &Open{}
		v.Key = "open"
	}
	v.Key = "locked"
}
"#,
    );
    assert_eq!(findings(&report), vec![(16, "assignment to immutable field Key".to_string())]);
}

#[test]
fn test_cross_package_local_marker() {
    let fixture = Fixture::new();
    fixture.write(
        "model/model.go",
        "package model\n\ntype User struct {\n\tEmail string `immutable:\"true\"`\n}\n",
    );
    fixture.write(
        "svc/svc.go",
        "package svc\n\nimport \"goci-const-check/model\"\n\nfunc Update(u *model.User) {\n\tu.Email = \"x\"\n}\n",
    );
    // Markers are collected per analyzed package, so a struct tag in an
    // imported package does not mark the field for its importers.
    let report = fixture.run("svc");
    assert!(report.diagnostics.is_empty());

    let report = fixture.run("model");
    assert!(report.diagnostics.is_empty());
}

#[test]
fn test_test_files_follow_config() {
    let fixture = Fixture::new();
    fixture.write(
        "app/app.go",
        "package app\n\ntype T struct {\n\tX int `immutable:\"true\"`\n}\n",
    );
    fixture.write(
        "app/app_test.go",
        "package app\n\nfunc mutate(t *T) {\n\tt.X = 1\n}\n",
    );

    let report = fixture.run("app");
    assert_eq!(report.diagnostics.len(), 1);

    let config = AnalyzerConfig {
        include_tests: false,
        ..AnalyzerConfig::default()
    };
    let report = fixture.run_with("app", &config);
    assert!(report.diagnostics.is_empty());
}

#[test]
fn test_custom_markers_from_config() {
    let fixture = Fixture::new();
    fixture.write(
        "app/app.go",
        r#"package app

type T struct {
	A int `frozen:"yes"`
	B int `immutable:"true"`
	C int // READONLY
}

func f(t *T) {
	t.A = 1
	t.B = 2
	t.C = 3
}
"#,
    );
    let config = AnalyzerConfig {
        tag_key: "frozen".to_string(),
        truthy_values: vec!["yes".to_string()],
        comment_marker: "readonly".to_string(),
        ..AnalyzerConfig::default()
    };
    let report = fixture.run_with("app", &config);
    let fields: Vec<&str> = report.diagnostics.iter().map(|d| d.field.as_str()).collect();
    assert_eq!(fields, vec!["A", "C"]);
}

#[test]
fn test_function_local_struct_type_markers() {
    let report = run_single(
        r#"package app

func Build() {
	type Token struct {
		Value string // immutable
		Note  string
	}
	t := Token{}
	t.Value = "x"
	t.Note = "y"
	_ = t
}
"#,
    );
    assert_eq!(findings(&report), vec![(9, "assignment to immutable field Value".to_string())]);
    assert_eq!(report.diagnostics[0].owner, "Token");
}

#[test]
fn test_local_anonymous_struct_values() {
    let report = run_single(
        r#"package app

type Session struct {
	Count int // immutable
}

func Track() {
	holder := struct{ s *Session }{s: &Session{}}
	holder.s.Count++
	local := struct {
		ID int `immutable:"true"`
	}{}
	local.ID = 3
}
"#,
    );
    assert_eq!(
        findings(&report),
        vec![
            (9, "modifying immutable field Count (inc/dec)".to_string()),
            (13, "assignment to immutable field ID".to_string()),
        ]
    );
}

#[test]
fn test_local_type_shadows_package_type() {
    let report = run_single(
        r#"package app

type T struct {
	A int // immutable
}

func Shadowed() {
	type T struct {
		A int
	}
	t := T{}
	t.A = 1
}

func Outer(p *T) {
	p.A = 2
}
"#,
    );
    assert_eq!(findings(&report), vec![(16, "assignment to immutable field A".to_string())]);
}
