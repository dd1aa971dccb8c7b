#[cfg(test)]
mod tests {
    use super::super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_padel_layout() {
        let config = Config::default();
        assert_eq!(
            config.descriptors.jar_path,
            PathBuf::from("./PaDEL-Descriptor/PaDEL-Descriptor.jar")
        );
        assert_eq!(config.resources.schema_path, PathBuf::from("descriptor_list.csv"));

        let padel = config.padel_config();
        assert_eq!(padel.timeout, Duration::from_secs(600));
        assert_eq!(padel.flags, vec!["-removesalt", "-standardizenitro", "-fingerprints"]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [resources]
            model_path = "models/acetylcholinesterase.json"

            [descriptors]
            timeout_secs = 30

            [input]
            delimiter = "\t"
            "#,
        )
        .unwrap();

        assert_eq!(config.resources.model_path, PathBuf::from("models/acetylcholinesterase.json"));
        assert_eq!(config.resources.schema_path, PathBuf::from("descriptor_list.csv"));
        assert_eq!(config.descriptors.timeout_secs, 30);
        assert_eq!(config.descriptors.name_column, "Name");
        assert_eq!(config.parser_options().unwrap().delimiter, b'\t');
        assert_eq!(config.export.value_column, "pIC50");
    }

    #[test]
    fn test_env_overrides_resource_paths_only() {
        let env: HashMap<&str, &str> = [
            ("BIOACTIVITY_SCHEMA_PATH", "/srv/schema.csv"),
            ("BIOACTIVITY_MODEL_PATH", ""),
            ("BIOACTIVITY_DESCRIPTOR_JAR", "/opt/padel/PaDEL-Descriptor.jar"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.resources.schema_path, PathBuf::from("/srv/schema.csv"));
        assert_eq!(config.resources.model_path, PathBuf::from("model.json"));
        assert_eq!(
            config.descriptors.jar_path,
            PathBuf::from("/opt/padel/PaDEL-Descriptor.jar")
        );
    }

    #[test]
    fn test_multi_byte_delimiter_is_rejected() {
        let mut config = Config::default();
        config.input.delimiter = ";;".to_string();
        assert!(config.parser_options().is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bioactivity.toml");
        std::fs::write(&path, "[export]\nfilename = \"out.csv\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.export_options().filename, "out.csv");
        assert_eq!(config.export_options().identifier_column, "Molecule Name");
    }
}
