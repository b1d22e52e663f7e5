use std::{error::Error, sync::Arc};

/// Terminal failure carried by `on_error`.
///
/// Cheaply cloneable so a cold error source can be subscribed more than
/// once and an operator can hand the same failure to a tap and to the
/// downstream stage.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlowError {
  /// The timeout operator fired before the next item arrived.
  #[error("stream timed out waiting for the next item")]
  Timeout,
  /// An item arrived without outstanding credit.
  #[error("backpressure violation: item emitted without outstanding credit")]
  MissingBackpressure,
  /// A single-use source was subscribed to a second time.
  #[error("source value was already consumed by an earlier subscription")]
  AlreadyConsumed,
  /// A failure described by a plain message.
  #[error("{0}")]
  Message(Arc<str>),
  /// A failure raised by user code.
  #[error("{0}")]
  Custom(Arc<dyn Error + Send + Sync>),
}

impl FlowError {
  pub fn message(msg: impl Into<String>) -> Self {
    FlowError::Message(msg.into().into())
  }

  pub fn custom(err: impl Error + Send + Sync + 'static) -> Self {
    FlowError::Custom(Arc::new(err))
  }
}
