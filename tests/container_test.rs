const DOCKERFILE: &str = include_str!("../Dockerfile");

fn runtime_stage() -> &'static str {
    let start = DOCKERFILE
        .rfind("\nFROM ")
        .expect("Dockerfile has a runtime stage");
    &DOCKERFILE[start..]
}

#[test]
fn test_runtime_environment() {
    let runtime = runtime_stage();
    assert!(runtime.contains("ENV PYTHONUNBUFFERED=1"));
    assert!(runtime.contains("ENV RUST_LOG=info"));
    assert!(runtime.contains("WORKDIR /app"));
    assert!(runtime.contains("COPY . ."));
    assert!(runtime.contains("EXPOSE 8080"));
    assert!(runtime.contains(r#"CMD ["diamond-data", "serve", "--host", "0.0.0.0", "--port", "8080"]"#));
}

#[test]
fn test_builder_upgrades_toolchain_before_dependencies() {
    let upgrade = DOCKERFILE.find("rustup self update").unwrap();
    let manifest = DOCKERFILE.find("COPY Cargo.toml").unwrap();
    let tree = DOCKERFILE.find("COPY . .").unwrap();
    assert!(upgrade < manifest);
    assert!(manifest < tree);
}
