use std::{env, fs};

use crate::config::types::GenericSourceValue;
use crate::error::IssuerError;

/// Resolve a configured header value
pub fn prepare_generic_source_value(value: &GenericSourceValue) -> Result<String, IssuerError> {
    match value {
        GenericSourceValue::Literal { value } => Ok(value.to_owned()),
        GenericSourceValue::FromEnv { from_env } => env::var(from_env)
            .map_err(|err| IssuerError::Other(format!("env '{}': {}", from_env, err))),
        GenericSourceValue::FromFile { path } => fs::read_to_string(path)
            .map(|res| res.trim().to_string())
            .map_err(|err| IssuerError::Other(format!("file '{}': {}", path, err))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn resolves_every_value_kind() {
        let literal = GenericSourceValue::Literal { value: "en-US".into() };
        assert_eq!(prepare_generic_source_value(&literal).unwrap(), "en-US");

        env::set_var("ROTATOR_TEST_HEADER", "from-env");
        let from_env = GenericSourceValue::FromEnv { from_env: "ROTATOR_TEST_HEADER".into() };
        assert_eq!(prepare_generic_source_value(&from_env).unwrap(), "from-env");
        env::remove_var("ROTATOR_TEST_HEADER");
        assert!(prepare_generic_source_value(&from_env).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  from-file  ").unwrap();
        let from_file = GenericSourceValue::FromFile {
            path: file.path().to_string_lossy().into_owned(),
        };
        assert_eq!(prepare_generic_source_value(&from_file).unwrap(), "from-file");
    }
}
