use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.embedding.model, "all-minilm");
    assert_eq!(config.embedding.dimension, 384);
    assert_eq!(config.generation.model, "llama3.2");
    assert_eq!(config.chunking.chunk_size, 300);
    assert_eq!(config.chunking.overlap, 30);
    assert_eq!(config.retrieval.n_results, 3);
    assert_eq!(config.retrieval.distance, DistanceMetric::L2);
    assert_eq!(config.storage.collection, "articles");
    assert_eq!(config.storage.insert_batch_size, 100);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.model = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.max_workers = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.n_results = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.storage.collection = "../escape".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.chunking.overlap = invalid_config.chunking.chunk_size;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidOverlap(300, 300))
    ));
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn https_url_generation() {
    let mut config = Config::default();
    config.ollama.protocol = "https".to_string();
    config.ollama.host = "secure.example.com".to_string();
    config.ollama.port = 443;

    let url = config
        .ollama_url()
        .expect("should generate https url successfully");
    assert_eq!(url.as_str(), "https://secure.example.com/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn enum_settings_use_snake_case() {
    let toml_str = r#"
        [embedding]
        failure_policy = "skip_and_log"

        [retrieval]
        distance = "cosine"
    "#;

    let config: Config = toml::from_str(toml_str).expect("should parse toml correctly");
    assert_eq!(config.embedding.failure_policy, FailurePolicy::SkipAndLog);
    assert_eq!(config.retrieval.distance, DistanceMetric::Cosine);
}

#[test]
fn protocol_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("http".to_string()).is_ok());
    assert!(config.set_protocol("https".to_string()).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_protocol(String::new()).is_err());
    assert!(config.set_protocol("HTTP".to_string()).is_err()); // case sensitive
}

#[test]
fn setter_validation() {
    let mut ollama = OllamaConfig::default();
    assert!(ollama.set_host("example.com".to_string()).is_ok());
    assert!(ollama.set_port(8080).is_ok());
    assert!(ollama.set_port(0).is_err());

    let mut embedding = EmbeddingConfig::default();
    assert!(embedding.set_model("nomic-embed-text".to_string()).is_ok());
    assert!(embedding.set_model(String::new()).is_err());
    assert!(embedding.set_dimension(768).is_ok());
    assert!(embedding.set_dimension(1).is_err());

    let mut generation = GenerationConfig::default();
    assert!(generation.set_model("mistral".to_string()).is_ok());
    assert!(generation.set_model("   ".to_string()).is_err());
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should load defaults");
    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.config_file_path(), temp_dir.path().join("config.toml"));
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    config.generation.model = "mistral".to_string();
    config.retrieval.n_results = 5;
    config.save().expect("should save config");

    let loaded = Config::load(temp_dir.path()).expect("should load saved config");
    assert_eq!(loaded.generation.model, "mistral");
    assert_eq!(loaded.retrieval.n_results, 5);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nchunk_size = 10\noverlap = 20\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn vector_database_path_resolution() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    assert_eq!(
        config.vector_database_path(),
        temp_dir.path().join("vector_db")
    );

    let absolute = temp_dir.path().join("elsewhere");
    config.storage.db_path = absolute.clone();
    assert_eq!(config.vector_database_path(), absolute);
}

#[test]
#[serial]
fn home_env_var_overrides_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    // SAFETY: serialized with every other test touching this variable
    unsafe { std::env::set_var(HOME_ENV_VAR, temp_dir.path()) };
    let base = Config::default_base_dir().expect("should resolve base dir");
    // SAFETY: as above
    unsafe { std::env::remove_var(HOME_ENV_VAR) };

    assert_eq!(base, temp_dir.path());
}
