//! Descriptor-driven detection: name reconciliation, decoders, nesting.

use immutablecheck::descriptor::proto::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
};
use immutablecheck::descriptor::{load_descriptor_set, DecoderKind, FixedPatternDecoder};
use immutablecheck::AnalyzerConfig;
use prost::Message;

use crate::common::{encode_descriptor, Fixture};

#[test]
fn test_snake_case_reconciliation() {
    let fixture = Fixture::new();
    fixture.write(
        "model/team.go",
        r#"package model

type Team struct {
	TeamLead   string
	TeamLeadId int64
	team_lead  string
}

func Rename(t *Team) {
	t.TeamLead = "a"
	t.TeamLeadId = 2
	t.team_lead = "c"
}
"#,
    );
    fixture.write_descriptor(&[("Team", &[("team_lead", true), ("team_lead_id", false)])]);

    let report = fixture.run("model");
    let fields: Vec<&str> = report.diagnostics.iter().map(|d| d.field.as_str()).collect();
    assert_eq!(fields, vec!["TeamLead", "team_lead"]);
}

#[test]
fn test_message_name_matches_case_insensitively() {
    let fixture = Fixture::new();
    fixture.write(
        "model/user.go",
        "package model\n\ntype user struct {\n\tId int64\n}\n\nfunc f(u *user) {\n\tu.Id = 1\n}\n",
    );
    fixture.write_descriptor(&[("User", &[("id", true)])]);

    let report = fixture.run("model");
    assert_eq!(report.diagnostics.len(), 1);
}

fn nested_descriptor(options: Vec<u8>) -> Vec<u8> {
    FileDescriptorSet {
        file: vec![FileDescriptorProto {
            name: Some("outer.proto".to_string()),
            package: Some("pb".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Outer".to_string()),
                field: Vec::new(),
                nested_type: vec![DescriptorProto {
                    name: Some("Inner".to_string()),
                    field: vec![FieldDescriptorProto {
                        name: Some("serial_no".to_string()),
                        number: Some(1),
                        options: Some(options),
                        json_name: Some("serialNo".to_string()),
                    }],
                    nested_type: Vec::new(),
                }],
            }],
        }],
    }
    .encode_to_vec()
}

const NESTED_PB: &str = r#"package pb

type Outer_Inner struct {
	SerialNo string `protobuf:"bytes,1,opt,name=serial_no,json=serialNo,proto3" json:"serial_no,omitempty"`
}
"#;

const NESTED_MAIN: &str = r#"package main

import "goci-const-check/pb"

func main() {
	in := &pb.Outer_Inner{}
	in.SerialNo = "x"
}
"#;

#[test]
fn test_nested_message_uses_generated_symbol_name() {
    let fixture = Fixture::new();
    fixture.write("pb/outer.pb.go", NESTED_PB);
    fixture.write("main.go", NESTED_MAIN);
    std::fs::create_dir_all(fixture.descriptor_path().parent().unwrap()).unwrap();
    std::fs::write(
        fixture.descriptor_path(),
        nested_descriptor(FixedPatternDecoder::default().pattern().to_vec()),
    )
    .unwrap();

    let report = fixture.run("");
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].owner, "Outer_Inner");
    assert_eq!(report.diagnostics[0].line, 7);
}

#[test]
fn test_scan_decoder_finds_option_after_other_options() {
    let fixture = Fixture::new();
    fixture.write("pb/outer.pb.go", NESTED_PB);
    fixture.write("main.go", NESTED_MAIN);

    // `deprecated = true` (field 3) precedes the immutable option.
    let mut options = vec![0x18, 0x01];
    options.extend_from_slice(FixedPatternDecoder::default().pattern());
    std::fs::create_dir_all(fixture.descriptor_path().parent().unwrap()).unwrap();
    std::fs::write(fixture.descriptor_path(), nested_descriptor(options)).unwrap();

    let report = fixture.run("");
    assert!(report.diagnostics.is_empty());

    let config = AnalyzerConfig {
        decoder: DecoderKind::Scan,
        ..fixture.config()
    };
    let report = fixture.run_with("", &config);
    assert_eq!(report.diagnostics.len(), 1);
}

#[test]
fn test_load_reports_only_marked_fields() {
    let fixture = Fixture::new();
    fixture.write_descriptor(&[
        ("Person", &[("id", true), ("name", false)]),
        ("Empty", &[("note", false)]),
    ]);
    let decoder = FixedPatternDecoder::default();
    let index = load_descriptor_set(&fixture.descriptor_path(), &decoder).unwrap();

    assert_eq!(index.len(), 1);
    assert_eq!(index.fields_for("Person"), Some(&["id".to_string()][..]));
    assert!(!index.contains_message("Empty"));
}

#[test]
fn test_explicit_descriptor_wins_over_conventional_location() {
    let fixture = Fixture::school();
    let alternate = fixture.path("gen/alternate.pb");
    std::fs::create_dir_all(alternate.parent().unwrap()).unwrap();
    std::fs::write(&alternate, encode_descriptor(&[("Person", &[("name", true)])])).unwrap();

    let config = AnalyzerConfig {
        descriptor_paths: vec![alternate.clone()],
        ..AnalyzerConfig::default()
    };
    let report = fixture.run_with("", &config);
    assert_eq!(report.descriptors, vec![alternate]);
    let fields: Vec<&str> = report.diagnostics.iter().map(|d| d.field.as_str()).collect();
    assert_eq!(fields, vec!["Name"]);
}

#[test]
fn test_custom_option_number() {
    let fixture = Fixture::school();
    // Marked with the default number, checked with another: nothing matches.
    let config = AnalyzerConfig {
        option_number: 50001,
        ..fixture.config()
    };
    let report = fixture.run_with("", &config);
    assert!(report.diagnostics.is_empty());
}
