//! Flowable factories.

mod create;
mod defer;
mod from_iter;
mod just;
mod trivial;

pub use create::{create, CreateFlowable, Emission};
pub use defer::{defer, DeferFlowable};
pub use from_iter::{from_iter, range};
pub use just::{just, just_n, just_once};
pub use trivial::{
  empty, error, never, EmptyFlowable, ErrorFlowable, NeverFlowable,
};
