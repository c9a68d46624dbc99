use solgraph::handlers::*;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use url::Url;

#[test]
fn test_parse_endpoint_line_with_scheme() {
    let result = parse_endpoint_line("https://rpc.example.com");
    assert_eq!(result, Some(Url::parse("https://rpc.example.com").unwrap()));
}

#[test]
fn test_parse_endpoint_line_without_scheme() {
    let result = parse_endpoint_line("rpc.example.com");
    assert_eq!(result, Some(Url::parse("https://rpc.example.com").unwrap()));
}

#[test]
fn test_parse_endpoint_line_invalid() {
    let result = parse_endpoint_line("not a valid url!!!");
    assert_eq!(result, None);
}

#[test]
fn test_load_endpoints_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://rpc-one.example.com")?;
    writeln!(temp_file, "rpc-two.example.com")?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "https://rpc-three.example.com")?;

    let path = PathBuf::from(temp_file.path());
    let endpoints = load_endpoints_from_file(&path)?;

    assert_eq!(endpoints.len(), 3);
    assert_eq!(endpoints[0].as_str(), "https://rpc-one.example.com/");
    assert_eq!(endpoints[1].as_str(), "https://rpc-two.example.com/");
    assert_eq!(endpoints[2].as_str(), "https://rpc-three.example.com/");

    Ok(())
}

#[test]
fn test_load_endpoints_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let path = PathBuf::from(temp_file.path());
    let result = load_endpoints_from_file(&path);

    assert!(result.is_err());
    assert!(result.unwrap_err().contains("No valid endpoint URLs"));
}

#[test]
fn test_load_endpoints_from_source_explicit_flags() {
    let url = Url::parse("https://rpc.example.com").unwrap();
    let result = load_endpoints_from_source(vec![url.clone()], None).unwrap();

    assert_eq!(result, vec![url]);
}

#[test]
fn test_load_endpoints_from_source_defaults_to_public() {
    let result = load_endpoints_from_source(Vec::new(), None).unwrap();

    assert_eq!(result.len(), 1);
    assert!(result[0].as_str().contains("mainnet"));
}

#[test]
fn test_seed_classification() {
    use solgraph::Seed;

    // 32 bytes of base58 is an address, 64 a signature.
    let address = bs58_id(32);
    let signature = bs58_id(64);

    assert_eq!(Seed::parse(&address).unwrap(), Seed::Account(address));
    assert_eq!(Seed::parse(&signature).unwrap(), Seed::Transaction(signature));
    assert!(Seed::parse("garbage!").is_err());
}

fn bs58_id(len: usize) -> String {
    // Hand-rolled base58 of [1; len] would be overkill; the all-ones pubkey
    // spellings below decode to exactly 32 and 64 bytes.
    match len {
        32 => "11111111111111111111111111111112".to_string(),
        64 => "1111111111111111111111111111111111111111111111111111111111111112".to_string(),
        _ => unreachable!(),
    }
}
