pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
  /// Initialization-time failure. Fatal to the strategy's run.
  #[error("Connection error: {0}")]
  Connection(BoxError),
  /// Shutdown-time failure. Logged only.
  #[error("Release error: {0}")]
  Release(BoxError),
  #[error("Write error: {0}")]
  Write(BoxError),
  #[error("Read error: {0}")]
  Read(BoxError),
}

impl AccessError {
  pub fn connection(err: impl Into<BoxError>) -> Self {
    return Self::Connection(err.into());
  }

  pub fn release(err: impl Into<BoxError>) -> Self {
    return Self::Release(err.into());
  }

  pub fn write(err: impl Into<BoxError>) -> Self {
    return Self::Write(err.into());
  }

  pub fn read(err: impl Into<BoxError>) -> Self {
    return Self::Read(err.into());
  }

  pub fn not_initialized(name: &str) -> Self {
    return Self::Connection(format!("accessor '{name}' is not initialized").into());
  }

  pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
    return match self {
      Self::Connection(err) | Self::Release(err) | Self::Write(err) | Self::Read(err) => {
        err.as_ref()
      }
    };
  }
}
