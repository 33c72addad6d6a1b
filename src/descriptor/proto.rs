//! Minimal mirror of `google/protobuf/descriptor.proto`.
//!
//! Only the fields the loader reads are declared; prost skips everything
//! else. `FieldDescriptorProto.options` is declared as `bytes` instead of a
//! `FieldOptions` message: both share the length-delimited wire type, and
//! keeping the raw bytes preserves custom extensions that a typed decode
//! would drop as unknown fields.

/// `google.protobuf.FileDescriptorSet`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileDescriptorSet {
    #[prost(message, repeated, tag = "1")]
    pub file: Vec<FileDescriptorProto>,
}

/// `google.protobuf.FileDescriptorProto`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub package: Option<String>,
    #[prost(message, repeated, tag = "4")]
    pub message_type: Vec<DescriptorProto>,
}

/// `google.protobuf.DescriptorProto`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    pub field: Vec<FieldDescriptorProto>,
    #[prost(message, repeated, tag = "3")]
    pub nested_type: Vec<DescriptorProto>,
}

/// `google.protobuf.FieldDescriptorProto`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FieldDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(int32, optional, tag = "3")]
    pub number: Option<i32>,
    /// Serialized `google.protobuf.FieldOptions`.
    #[prost(bytes = "vec", optional, tag = "8")]
    pub options: Option<Vec<u8>>,
    #[prost(string, optional, tag = "10")]
    pub json_name: Option<String>,
}
