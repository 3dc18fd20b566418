use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DB_SOURCE: &str = "BENCH_DB_SOURCE";
pub const MAX_CONNS: &str = "BENCH_MAX_CONNS";
pub const MIN_CONNS: &str = "BENCH_MIN_CONNS";
pub const MAX_CONN_LIFETIME: &str = "BENCH_MAX_CONN_LIFETIME";
pub const MAX_CONN_IDLE_TIME: &str = "BENCH_MAX_CONN_IDLE_TIME";
pub const TLS_VERIFY: &str = "BENCH_TLS_VERIFY";
pub const QUERY_MODE_EXEC: &str = "DB_QUERY_MODE_EXEC";
pub const SAMPLE_SIZE: &str = "BENCH_SAMPLE_SIZE";
pub const PARALLELISM: &str = "BENCH_PARALLELISM";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid locator '{0}': {1}")]
  InvalidLocator(String, &'static str),
  #[error("Invalid value for {key}: '{value}'")]
  InvalidValue { key: &'static str, value: String },
  #[error("Invalid pool bounds: min {min} > max {max}")]
  PoolBounds { min: u32, max: u32 },
  #[error("{0} must be non-zero")]
  Zero(&'static str),
  #[error("{key} must be at least {min}")]
  TooSmall { key: &'static str, min: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
  Path(PathBuf),
  /// `file:` URI, passed to SQLite verbatim.
  Uri(String),
}

impl Locator {
  // The default open flags include SQLITE_OPEN_URI.
  pub fn target(&self) -> PathBuf {
    return match self {
      Self::Path(path) => path.clone(),
      Self::Uri(uri) => PathBuf::from(uri),
    };
  }

  pub fn open(&self) -> rusqlite::Result<rusqlite::Connection> {
    return rusqlite::Connection::open(self.target());
  }
}

impl FromStr for Locator {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    if s.is_empty() {
      return Err(ConfigError::InvalidLocator(s.to_string(), "empty"));
    }

    if let Some(path) = s.strip_prefix("sqlite://") {
      if path.is_empty() {
        return Err(ConfigError::InvalidLocator(s.to_string(), "missing path"));
      }
      return Ok(Self::Path(PathBuf::from(path)));
    }

    if s.starts_with("file:") {
      return Ok(Self::Uri(s.to_string()));
    }

    if s.contains("://") {
      return Err(ConfigError::InvalidLocator(
        s.to_string(),
        "unsupported scheme",
      ));
    }

    return Ok(Self::Path(PathBuf::from(s)));
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryMode {
  #[default]
  Prepared,
  Simple,
}

impl QueryMode {
  fn from_env_value(value: &str) -> Self {
    return match value {
      "SIMPLE_PROTOCOL" => Self::Simple,
      _ => Self::Prepared,
    };
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorConfig {
  /// Raw locator text. Parsed and validated at initialize.
  pub source: String,
  pub max_conns: u32,
  pub min_conns: u32,
  pub max_conn_lifetime: Duration,
  pub max_conn_idle_time: Duration,
  pub tls_verify: bool,
  pub query_mode: QueryMode,
}

impl AccessorConfig {
  pub fn pooled(source: impl Into<String>) -> Self {
    return Self {
      source: source.into(),
      max_conns: 200,
      min_conns: 20,
      max_conn_lifetime: Duration::from_secs(9),
      max_conn_idle_time: Duration::from_secs(3),
      tls_verify: false,
      query_mode: QueryMode::Prepared,
    };
  }

  /// Reference settings for strategies driving a bare connection. Idle connections are kept for
  /// their whole lifetime.
  pub fn unpooled(source: impl Into<String>) -> Self {
    return Self {
      max_conn_lifetime: Duration::from_secs(5 * 60),
      max_conn_idle_time: Duration::from_secs(5 * 60),
      ..Self::pooled(source)
    };
  }

  pub fn from_env(defaults: Self) -> Result<Self, ConfigError> {
    return Self::from_lookup(defaults, |key| std::env::var(key).ok());
  }

  pub fn from_lookup(
    defaults: Self,
    lookup: impl Fn(&str) -> Option<String>,
  ) -> Result<Self, ConfigError> {
    let mut config = defaults;

    if let Some(source) = lookup(DB_SOURCE) {
      config.source = source;
    }
    if let Some(v) = lookup(MAX_CONNS) {
      config.max_conns = parse(MAX_CONNS, &v)?;
    }
    if let Some(v) = lookup(MIN_CONNS) {
      config.min_conns = parse(MIN_CONNS, &v)?;
    }
    if let Some(v) = lookup(MAX_CONN_LIFETIME) {
      config.max_conn_lifetime = Duration::from_secs(parse(MAX_CONN_LIFETIME, &v)?);
    }
    if let Some(v) = lookup(MAX_CONN_IDLE_TIME) {
      config.max_conn_idle_time = Duration::from_secs(parse(MAX_CONN_IDLE_TIME, &v)?);
    }
    if let Some(v) = lookup(TLS_VERIFY) {
      config.tls_verify = parse_bool(TLS_VERIFY, &v)?;
    }
    if let Some(v) = lookup(QUERY_MODE_EXEC) {
      config.query_mode = QueryMode::from_env_value(&v);
    }

    return Ok(config);
  }

  pub fn validate(&self) -> Result<Locator, ConfigError> {
    let locator: Locator = self.source.parse()?;

    if self.max_conns == 0 {
      return Err(ConfigError::Zero(MAX_CONNS));
    }
    if self.min_conns > self.max_conns {
      return Err(ConfigError::PoolBounds {
        min: self.min_conns,
        max: self.max_conns,
      });
    }
    if self.max_conn_lifetime.is_zero() {
      return Err(ConfigError::Zero(MAX_CONN_LIFETIME));
    }
    if self.max_conn_idle_time.is_zero() {
      return Err(ConfigError::Zero(MAX_CONN_IDLE_TIME));
    }

    return Ok(locator);
  }
}

/// Minimum criterion accepts for a benchmark group.
const MIN_SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
  pub parallelism: usize,
  pub batch_size: usize,
  pub read_limit: usize,
  /// Criterion samples per phase. Criterion picks the iterations per sample.
  pub sample_size: usize,
}

impl Default for RunConfig {
  fn default() -> Self {
    return Self {
      parallelism: 1,
      batch_size: 100,
      read_limit: 100,
      sample_size: 20,
    };
  }
}

impl RunConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    return Self::from_lookup(|key| std::env::var(key).ok());
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    let mut config = Self::default();

    if let Some(v) = lookup(SAMPLE_SIZE) {
      config.sample_size = parse(SAMPLE_SIZE, &v)?;
    }
    if let Some(v) = lookup(PARALLELISM) {
      config.parallelism = match v.trim() {
        "auto" => crate::num_tasks(),
        v => parse(PARALLELISM, v)?,
      };
    }
    if config.parallelism == 0 {
      return Err(ConfigError::Zero(PARALLELISM));
    }
    if config.sample_size < MIN_SAMPLE_SIZE {
      return Err(ConfigError::TooSmall {
        key: SAMPLE_SIZE,
        min: MIN_SAMPLE_SIZE,
      });
    }

    return Ok(config);
  }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
  return value.trim().parse().map_err(|_| ConfigError::InvalidValue {
    key,
    value: value.to_string(),
  });
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
  return match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Ok(true),
    "0" | "false" | "no" | "off" => Ok(false),
    _ => Err(ConfigError::InvalidValue {
      key,
      value: value.to_string(),
    }),
  };
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    return move |key: &str| vars.get(key).cloned();
  }

  #[test]
  fn reference_defaults() {
    let pooled = AccessorConfig::pooled("bench.sqlite");
    assert_eq!(pooled.max_conns, 200);
    assert_eq!(pooled.min_conns, 20);
    assert_eq!(pooled.max_conn_lifetime, Duration::from_secs(9));
    assert_eq!(pooled.max_conn_idle_time, Duration::from_secs(3));
    assert!(!pooled.tls_verify);
    assert_eq!(pooled.query_mode, QueryMode::Prepared);

    let unpooled = AccessorConfig::unpooled("bench.sqlite");
    assert_eq!(unpooled.max_conn_lifetime, Duration::from_secs(300));
    assert_eq!(unpooled.max_conn_idle_time, unpooled.max_conn_lifetime);
    assert_eq!(unpooled.max_conns, 200);

    let run = RunConfig::default();
    assert_eq!(run.batch_size, 100);
    assert_eq!(run.read_limit, 100);
    assert_eq!(run.parallelism, 1);
    assert_eq!(run.sample_size, 20);
  }

  #[test]
  fn env_overrides() {
    let config = AccessorConfig::from_lookup(
      AccessorConfig::pooled("unused"),
      lookup(&[
        (DB_SOURCE, "/tmp/x.sqlite"),
        (MAX_CONNS, "8"),
        (MIN_CONNS, "2"),
        (MAX_CONN_LIFETIME, "60"),
        (MAX_CONN_IDLE_TIME, "5"),
        (TLS_VERIFY, "true"),
        (QUERY_MODE_EXEC, "SIMPLE_PROTOCOL"),
      ]),
    )
    .unwrap();

    assert_eq!(config.source, "/tmp/x.sqlite");
    assert_eq!(config.max_conns, 8);
    assert_eq!(config.min_conns, 2);
    assert_eq!(config.max_conn_lifetime, Duration::from_secs(60));
    assert_eq!(config.max_conn_idle_time, Duration::from_secs(5));
    assert!(config.tls_verify);
    assert_eq!(config.query_mode, QueryMode::Simple);

    let config = AccessorConfig::from_lookup(
      AccessorConfig::pooled("unused"),
      lookup(&[(QUERY_MODE_EXEC, "EXEC")]),
    )
    .unwrap();
    assert_eq!(config.query_mode, QueryMode::Prepared);
  }

  #[test]
  fn unparseable_values_are_rejected() {
    let err = AccessorConfig::from_lookup(
      AccessorConfig::pooled("unused"),
      lookup(&[(MAX_CONNS, "lots")]),
    )
    .unwrap_err();
    assert_eq!(
      err,
      ConfigError::InvalidValue {
        key: MAX_CONNS,
        value: "lots".to_string()
      }
    );

    assert!(RunConfig::from_lookup(lookup(&[(PARALLELISM, "0")])).is_err());
    assert_eq!(
      RunConfig::from_lookup(lookup(&[(SAMPLE_SIZE, "5")])).unwrap_err(),
      ConfigError::TooSmall {
        key: SAMPLE_SIZE,
        min: 10
      }
    );
    assert!(RunConfig::from_lookup(lookup(&[(SAMPLE_SIZE, "-1")])).is_err());

    let run = RunConfig::from_lookup(lookup(&[(SAMPLE_SIZE, "50"), (PARALLELISM, "4")])).unwrap();
    assert_eq!(run.sample_size, 50);
    assert_eq!(run.parallelism, 4);
  }

  #[test]
  fn locators() {
    assert_eq!(
      "bench.sqlite".parse::<Locator>().unwrap(),
      Locator::Path(PathBuf::from("bench.sqlite"))
    );
    assert_eq!(
      "sqlite:///tmp/bench.sqlite".parse::<Locator>().unwrap(),
      Locator::Path(PathBuf::from("/tmp/bench.sqlite"))
    );
    assert_eq!(
      "file:bench?mode=memory&cache=shared"
        .parse::<Locator>()
        .unwrap(),
      Locator::Uri("file:bench?mode=memory&cache=shared".to_string())
    );

    assert!("".parse::<Locator>().is_err());
    assert!("   ".parse::<Locator>().is_err());
    assert!("sqlite://".parse::<Locator>().is_err());
    assert!("postgres://user@localhost/db".parse::<Locator>().is_err());
  }

  #[test]
  fn validate_checks_pool_bounds() {
    let mut config = AccessorConfig::pooled("bench.sqlite");
    assert!(config.validate().is_ok());

    config.min_conns = 201;
    assert_eq!(
      config.validate().unwrap_err(),
      ConfigError::PoolBounds { min: 201, max: 200 }
    );

    config.min_conns = 0;
    config.max_conns = 0;
    assert_eq!(config.validate().unwrap_err(), ConfigError::Zero(MAX_CONNS));

    let mut config = AccessorConfig::unpooled("bench.sqlite");
    config.max_conn_lifetime = Duration::ZERO;
    assert!(config.validate().is_err());
  }
}
