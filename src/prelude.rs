//! One import for the crate's whole surface.

pub use crate::base::{BaseSubscriber, SubscriberState};
pub use crate::credits;
pub use crate::error::FlowError;
pub use crate::executor::{Executor, InlineExecutor, ManualExecutor, Task};
pub use crate::flowable::{Flowable, FlowableExt, SharedFlowable};
pub use crate::ops::{
  backpressure::{BackpressureStrategy, OnBackpressureOp},
  concat::ConcatWithOp,
  do_on::DoOp,
  filter::FilterOp,
  flat_map::{FlatMapOp, TryFlatMapOp},
  ignore_elements::IgnoreElementsOp,
  map::{MapOp, TryMapOp},
  map_err::MapErrOp,
  observe_on::ObserveOnOp,
  reduce::ReduceOp,
  skip::SkipOp,
  subscribe_on::SubscribeOnOp,
  take::TakeOp,
  timeout::TimeoutOp,
};
pub use crate::source;
pub use crate::source::Emission;
pub use crate::subscriber::{Disposable, LambdaSubscriber, Subscriber};
pub use crate::subscription::{noop as noop_subscription, Subscription};
pub use crate::test_subscriber::TestSubscriber;
pub use crate::timer::{ManualTimer, ThreadTimer, Timer, TimerHandle};
