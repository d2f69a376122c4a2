//! Build script for falco-proto
//!
//! Generates gRPC/protobuf bindings for the Falco output and version services
//! during `cargo build`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .type_attribute(".", "#[allow(missing_docs)]")
        .compile(
            &[
                "proto/schema.proto",
                "proto/output.proto",
                "proto/version.proto",
            ],
            &["proto"],
        )?;

    Ok(())
}
