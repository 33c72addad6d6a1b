//! On-disk Go module fixtures.

use std::path::{Path, PathBuf};

use immutablecheck::descriptor::proto::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
};
use immutablecheck::descriptor::{FixedPatternDecoder, DEFAULT_DESCRIPTOR_PATH};
use immutablecheck::{AnalyzerConfig, Report};
use prost::Message;
use tempfile::TempDir;

pub const MODULE_PATH: &str = "goci-const-check";

/// Generated-style code for the `pb` package.
pub const PB_SOURCE: &str = r#"package pb

type Person struct {
	Id   uint32 `protobuf:"varint,1,opt,name=id,proto3" json:"id,omitempty"`
	Name string `protobuf:"bytes,2,opt,name=name,proto3" json:"name,omitempty"`
	Age  uint32 `protobuf:"varint,3,opt,name=age,proto3" json:"age,omitempty"`
}

type TeacherTeam struct {
	Teachers map[uint32]*Person `protobuf:"bytes,1,rep,name=teachers,proto3" json:"teachers,omitempty"`
}

type School struct {
	Name     string       `protobuf:"bytes,1,opt,name=name,proto3" json:"name,omitempty"`
	Address  string       `protobuf:"bytes,2,opt,name=address,proto3" json:"address,omitempty"`
	Teachers *TeacherTeam `protobuf:"bytes,3,opt,name=teachers,proto3" json:"teachers,omitempty"`
}

func (x *Person) GetId() uint32 {
	if x != nil {
		return x.Id
	}
	return 0
}
"#;

pub const MAIN_SOURCE: &str = r#"package main

import (
	pb "goci-const-check/pb"
)

func main() {
	t := &pb.Person{}
	t.Id = 12345
	t.Name = "Alice"
	t.Age = 30

	println(t.Id, t.Name, t.Age)

	School := &pb.School{}
	School.Name = "Sunshine High"
	School.Address = "123 Main St"
	team := &pb.TeacherTeam{
		Teachers: map[uint32]*pb.Person{
			1: {Id: 1, Name: "Mr. Smith", Age: 40},
			2: {Id: 2, Name: "Ms. Johnson", Age: 35},
		},
	}
	School.Teachers = team

	team2 := &pb.TeacherTeam{
		Teachers: map[uint32]*pb.Person{
			3: {Id: 3, Name: "Mr. Lee", Age: 40},
			4: {Id: 4, Name: "Ms. Cool ", Age: 35},
		},
	}

	School.Teachers = team2

	School.Teachers.Teachers[5] = &pb.Person{Id: 5, Name: "Ms. New", Age: 29}
}
"#;

/// A temporary Go module.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Self {
            dir: tempfile::tempdir().expect("tempdir"),
        };
        fixture.write("go.mod", &format!("module {}\n\ngo 1.21\n", MODULE_PATH));
        fixture
    }

    /// The Person/School module with its descriptor set.
    pub fn school() -> Self {
        let fixture = Self::new();
        fixture.write("pb/school.pb.go", PB_SOURCE);
        fixture.write("main.go", MAIN_SOURCE);
        fixture.write_descriptor(&[
            ("Person", &[("id", true), ("name", false), ("age", true)]),
            ("School", &[("name", false), ("address", false), ("teachers", true)]),
            ("TeacherTeam", &[("teachers", true)]),
        ]);
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dir");
        }
        std::fs::write(path, contents).expect("write fixture file");
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.path(DEFAULT_DESCRIPTOR_PATH)
    }

    /// Write a descriptor set at the conventional location.
    pub fn write_descriptor(&self, messages: &[(&str, &[(&str, bool)])]) {
        let bytes = encode_descriptor(messages);
        let path = self.descriptor_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create descriptor dir");
        }
        std::fs::write(path, bytes).expect("write descriptor");
    }

    /// Config that names this fixture's descriptor explicitly.
    pub fn config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            descriptor_paths: vec![self.descriptor_path()],
            ..AnalyzerConfig::default()
        }
    }

    pub fn pattern(&self, rel: &str) -> String {
        if rel.is_empty() {
            self.root().display().to_string()
        } else {
            self.path(rel).display().to_string()
        }
    }

    pub fn run(&self, rel: &str) -> Report {
        self.run_with(rel, &self.config())
    }

    pub fn run_with(&self, rel: &str, config: &AnalyzerConfig) -> Report {
        immutablecheck::run(&[self.pattern(rel)], config).expect("run")
    }
}

/// Encode a `FileDescriptorSet` with one file holding `messages`.
pub fn encode_descriptor(messages: &[(&str, &[(&str, bool)])]) -> Vec<u8> {
    let immutable = FixedPatternDecoder::default().pattern().to_vec();
    let message_type = messages
        .iter()
        .map(|(name, fields)| DescriptorProto {
            name: Some(name.to_string()),
            field: fields
                .iter()
                .enumerate()
                .map(|(i, (field, marked))| FieldDescriptorProto {
                    name: Some(field.to_string()),
                    number: Some(i as i32 + 1),
                    options: marked.then(|| immutable.clone()),
                    json_name: None,
                })
                .collect(),
            nested_type: Vec::new(),
        })
        .collect();

    FileDescriptorSet {
        file: vec![FileDescriptorProto {
            name: Some("school.proto".to_string()),
            package: Some("pb".to_string()),
            message_type,
        }],
    }
    .encode_to_vec()
}

/// `(line, message)` pairs of a report, in order.
pub fn findings(report: &Report) -> Vec<(usize, String)> {
    report
        .diagnostics
        .iter()
        .map(|d| (d.line, d.message.clone()))
        .collect()
}
