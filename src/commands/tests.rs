use super::*;
use crate::capability::CapabilityMode;
use tempfile::TempDir;

#[test]
fn p_values_are_formatted_for_display() {
    assert_eq!(format_p_value(None), "n/a");
    assert_eq!(format_p_value(Some(0.0734)), "0.073");
    assert_eq!(format_p_value(Some(0.00002)), "2.0e-5");
}

#[test]
fn mime_types_follow_the_extension() {
    assert_eq!(mime_type_for(Path::new("notes.md")), Some("text/markdown"));
    assert_eq!(mime_type_for(Path::new("NOTES.TXT")), Some("text/plain"));
    assert_eq!(mime_type_for(Path::new("paper.pdf")), None);
    assert_eq!(mime_type_for(Path::new("README")), None);
}

#[test]
fn read_document_uses_the_file_stem_as_title() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("photosynthesis.md");
    fs::write(&path, "Plants convert light into energy.").expect("Failed to write document");

    let document = read_document(&path).expect("document should be read");

    assert_eq!(document.text, "Plants convert light into energy.");
    assert_eq!(document.title.as_deref(), Some("photosynthesis"));
    assert_eq!(document.mime_type.as_deref(), Some("text/markdown"));
}

#[test]
fn missing_document_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    assert!(read_document(&temp_dir.path().join("missing.txt")).is_err());
}

#[test]
fn init_config_writes_defaults_once() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let path = init_config(Some(temp_dir.path())).expect("config should be written");
    assert!(path.exists());

    let loaded = load_config(Some(temp_dir.path())).expect("config should load");
    assert_eq!(loaded.comparison, crate::config::ComparisonConfig::default());

    let again = init_config(Some(temp_dir.path())).expect("existing config is kept");
    assert_eq!(again, path);
}

#[tokio::test]
async fn offline_capabilities_are_heuristic() {
    let capabilities = build_capabilities(&Config::default(), true).await;
    assert_eq!(capabilities.mode(), CapabilityMode::Heuristic);
}

#[tokio::test]
async fn disabled_ollama_is_not_contacted() {
    let mut config = Config::default();
    config.ollama.enabled = false;

    let capabilities = build_capabilities(&config, false).await;
    assert!(!capabilities.has_embedder());
    assert!(!capabilities.has_generator());
}
