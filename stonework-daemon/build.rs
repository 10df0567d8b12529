fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile protobuf definitions.
    tonic_prost_build::configure()
        .compile_protos(&["../proto/puntmgr.proto"], &["../proto"])?;

    Ok(())
}
