//! # flowable: reactive streams with credit-based backpressure
//!
//! A cold [`Flowable`] describes an item sequence; subscribing wires the
//! operator chain from the tail toward the head and hands the consumer a
//! [`Subscription`](subscription::Subscription) it uses to pull items
//! (`request(n)`) or stop (`cancel`). Producers never emit beyond the
//! outstanding credit, and exactly one terminal signal (`on_complete` or
//! `on_error`) reaches the subscriber no matter how signals race across
//! threads.
//!
//! ## Quick start
//!
//! ```rust
//! use flowable::prelude::*;
//!
//! let consumer = TestSubscriber::unbounded();
//! source::range(1, 5).map(|v| v * 2).subscribe(consumer.clone());
//! assert_eq!(consumer.values(), vec![2, 4, 6, 8, 10]);
//! assert!(consumer.is_completed());
//! ```
//!
//! ## Key pieces
//!
//! | Type | Role |
//! |------|------|
//! | [`Flowable`] / [`FlowableExt`] | Cold sequence descriptor and its operator algebra |
//! | [`Subscriber`](subscriber::Subscriber) | Consumer of `on_subscribe` / `on_next` / terminal signals |
//! | [`Subscription`](subscription::Subscription) | `request(n)` / `cancel` handle |
//! | [`BaseSubscriber`](base::BaseSubscriber) | Reusable exactly-once-terminal state machine |
//! | [`Executor`](executor::Executor) / [`Timer`](timer::Timer) | Boundaries for `subscribe_on` / `observe_on` / `timeout` |
//!
//! [`Flowable`]: flowable::Flowable
//! [`FlowableExt`]: flowable::FlowableExt

pub mod base;
pub mod credits;
mod drain;
pub mod error;
pub mod executor;
pub mod flowable;
pub mod ops;
pub mod prelude;
pub mod source;
pub mod subscriber;
pub mod subscription;
pub mod test_subscriber;
pub mod timer;

pub use prelude::*;
