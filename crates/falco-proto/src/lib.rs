//! Protocol buffer definitions for the Falco gRPC API.
//!
//! This crate contains:
//! - Generated types and stubs for `falco.output` (alert subscription)
//! - Generated types and stubs for `falco.version` (daemon version)
//! - Shared enums from `falco.schema`
//! - Small helpers in [`convert`] for rendering generated values
//!
//! The module tree mirrors the protobuf package names so that cross-package
//! references in generated code (`super::schema::Priority`) resolve.

#![allow(missing_docs)] // Generated code doesn't have docs

pub mod convert;

/// Generated protobuf packages, nested the way `protoc` names them.
pub mod falco {
    /// Shared enums (`falco.schema`).
    pub mod schema {
        tonic::include_proto!("falco.schema");
    }

    /// Output subscription service (`falco.output`).
    pub mod output {
        tonic::include_proto!("falco.output");
    }

    /// Version service (`falco.version`).
    pub mod version {
        tonic::include_proto!("falco.version");
    }
}

pub use convert::ParsePriorityError;
pub use falco::{output, schema, version};
