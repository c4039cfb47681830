use super::{Compression, LogFormat, SinkConfig, StorageBackend};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "RECORDS2S3_";

/// Abstraction over environment-variable lookups so tests and embedders can
/// supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the RECORDS2S3_ prefix
    /// Used for AWS standard variables (AWS_ACCESS_KEY_ID, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the sink config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut SinkConfig, env: &E) -> Result<()> {
    // Destination
    if let Some(bucket) = get_env_string(env, "BUCKET") {
        config.bucket = bucket;
    }
    if let Some(prefix) = get_env_string(env, "PREFIX") {
        config.prefix = prefix;
    }
    if let Some(name) = get_env_string(env, "STREAM_NAME_PATH_OVERRIDE") {
        config.stream_name_path_override = (!name.is_empty()).then_some(name);
    }

    // Partitioning
    if let Some(val) = get_env_bool(env, "APPEND_DATE_TO_PREFIX")? {
        config.append_date_to_prefix = val;
    }
    if let Some(grain) = get_env_string(env, "APPEND_DATE_TO_PREFIX_GRAIN") {
        config.append_date_to_prefix_grain = grain;
    }
    if let Some(val) = get_env_bool(env, "APPEND_DATE_TO_FILENAME")? {
        config.append_date_to_filename = val;
    }
    if let Some(grain) = get_env_string(env, "APPEND_DATE_TO_FILENAME_GRAIN") {
        config.append_date_to_filename_grain = grain;
    }

    // Record preparation and encoding
    if let Some(val) = get_env_bool(env, "INCLUDE_PROCESS_DATE")? {
        config.include_process_date = val;
    }
    if let Some(val) = get_env_bool(env, "FLATTEN_RECORDS")? {
        config.flatten_records = val;
    }
    if let Some(format) = get_env_string(env, "FORMAT_TYPE") {
        config.format_type = format;
    }
    if let Some(compression) = get_env_string(env, "COMPRESSION") {
        config.compression = compression
            .parse::<Compression>()
            .context("Invalid RECORDS2S3_COMPRESSION value")?;
    }

    // Storage backend
    if let Some(backend) = get_env_string(env, "STORAGE_BACKEND") {
        config.storage_backend = backend
            .parse::<StorageBackend>()
            .context("Invalid RECORDS2S3_STORAGE_BACKEND value")?;
    }
    if let Some(path) = get_env_string(env, "STORAGE_PATH") {
        config.storage_path = Some(path);
    }
    if let Some(val) = get_env_bool(env, "VERIFY_CONNECTION")? {
        config.verify_connection = val;
    }

    // Batching and logging
    if let Some(val) = get_env_usize(env, "BATCH_MAX_ROWS")? {
        config.batch.max_rows = val;
    }
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.log.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    apply_aws_overrides(config, env);
    Ok(())
}

/// Prefixed variables always win; AWS standard variables only fill gaps so an
/// explicit file setting is never replaced by ambient shell credentials.
fn apply_aws_overrides<E: EnvSource>(config: &mut SinkConfig, env: &E) {
    let aws = &mut config.aws;
    let fields: [(&mut Option<String>, &str, &str); 6] = [
        (&mut aws.aws_access_key, "AWS_ACCESS_KEY", "AWS_ACCESS_KEY_ID"),
        (
            &mut aws.aws_secret_access_key,
            "AWS_SECRET_ACCESS_KEY",
            "AWS_SECRET_ACCESS_KEY",
        ),
        (&mut aws.aws_session_token, "AWS_SESSION_TOKEN", "AWS_SESSION_TOKEN"),
        (&mut aws.aws_profile, "AWS_PROFILE", "AWS_PROFILE"),
        (&mut aws.aws_region, "AWS_REGION", "AWS_REGION"),
        (&mut aws.endpoint_url, "ENDPOINT_URL", "AWS_ENDPOINT_URL"),
    ];

    for (field, prefixed, raw) in fields {
        if let Some(value) = get_env_string(env, prefixed) {
            *field = Some(value);
        } else if field.is_none() {
            if let Some(value) = env.get_raw(raw) {
                *field = Some(value);
            }
        }
    }
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val.to_lowercase().parse::<bool>().map_err(|e| {
                anyhow!(
                    "Failed to parse {}{} (expected bool): {}",
                    ENV_PREFIX,
                    key,
                    e
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapEnv {
        prefixed: HashMap<&'static str, &'static str>,
        raw: HashMap<&'static str, &'static str>,
    }

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.prefixed.get(key).map(|v| v.to_string())
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.raw.get(key).map(|v| v.to_string())
        }
    }

    #[test]
    fn test_overrides_destination_and_flags() {
        let env = MapEnv {
            prefixed: HashMap::from([
                ("BUCKET", "env-bucket"),
                ("PREFIX", "raw"),
                ("FLATTEN_RECORDS", "True"),
                ("APPEND_DATE_TO_FILENAME_GRAIN", "hour"),
                ("FORMAT_TYPE", "parquet"),
                ("COMPRESSION", "zstd"),
                ("BATCH_MAX_ROWS", "500"),
                ("LOG_FORMAT", "json"),
            ]),
            raw: HashMap::new(),
        };

        let mut config = SinkConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.bucket, "env-bucket");
        assert_eq!(config.prefix, "raw");
        assert!(config.flatten_records);
        assert_eq!(config.append_date_to_filename_grain, "hour");
        assert_eq!(config.format_type, "parquet");
        assert_eq!(config.compression, Compression::Zstd);
        assert_eq!(config.batch.max_rows, 500);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_bool_is_an_error() {
        let env = MapEnv {
            prefixed: HashMap::from([("INCLUDE_PROCESS_DATE", "yes please")]),
            raw: HashMap::new(),
        };
        let mut config = SinkConfig::default();
        assert!(apply_env_overrides(&mut config, &env).is_err());
    }

    #[test]
    fn test_raw_aws_variables_only_fill_gaps() {
        let env = MapEnv {
            prefixed: HashMap::new(),
            raw: HashMap::from([
                ("AWS_ACCESS_KEY_ID", "AKIA-ENV"),
                ("AWS_SECRET_ACCESS_KEY", "secret-env"),
                ("AWS_REGION", "eu-west-1"),
            ]),
        };

        let mut config = SinkConfig::default();
        config.aws.aws_region = Some("us-east-2".to_string());
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.aws.aws_access_key.as_deref(), Some("AKIA-ENV"));
        assert_eq!(
            config.aws.aws_secret_access_key.as_deref(),
            Some("secret-env")
        );
        assert_eq!(config.aws.aws_region.as_deref(), Some("us-east-2"));
    }

    #[test]
    fn test_prefixed_aws_variables_win() {
        let env = MapEnv {
            prefixed: HashMap::from([
                ("AWS_REGION", "ap-south-1"),
                ("ENDPOINT_URL", "http://minio:9000"),
            ]),
            raw: HashMap::from([("AWS_REGION", "eu-west-1")]),
        };

        let mut config = SinkConfig::default();
        config.aws.aws_region = Some("us-east-2".to_string());
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.aws.aws_region.as_deref(), Some("ap-south-1"));
        assert_eq!(config.aws.endpoint_url.as_deref(), Some("http://minio:9000"));
    }
}
