use std::sync::{Arc, Mutex};

use crate::{
  error::FlowError,
  flowable::Flowable,
  source::create::{create, Emission},
  source::from_iter::from_iter,
};

/// Emits one cloned value then completes.
pub fn just<T>(value: T) -> impl Flowable<Item = T>
where
  T: Clone + Send + Sync + 'static,
{
  create(move |emission: &mut Emission<T>, _requested| {
    emission.next(value.clone());
    emission.complete();
  })
}

/// Emits each value of the list in order, then completes.
pub fn just_n<T>(values: Vec<T>) -> impl Flowable<Item = T>
where
  T: Clone + Send + Sync + 'static,
{
  from_iter(values)
}

/// Emits the value to the first subscriber only; every later subscription
/// ends with [`FlowError::AlreadyConsumed`].
pub fn just_once<T>(value: T) -> impl Flowable<Item = T>
where
  T: Send + 'static,
{
  let value = Arc::new(Mutex::new(Some(value)));
  create(move |emission: &mut Emission<T>, _requested| {
    match value.lock().unwrap().take() {
      Some(value) => {
        emission.next(value);
        emission.complete();
      }
      None => emission.error(FlowError::AlreadyConsumed),
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{base::BaseSubscriber, test_subscriber::TestSubscriber};

  #[test]
  fn just_emits_once_per_subscription() {
    let source = just(5);
    for _ in 0..2 {
      let consumer = TestSubscriber::unbounded();
      source.subscribe(consumer.clone());
      assert_eq!(consumer.values(), vec![5]);
      assert!(consumer.is_completed());
    }
  }

  #[test]
  fn just_waits_for_a_request() {
    let source = just("hi");
    let consumer = TestSubscriber::with_request(0);
    source.subscribe(consumer.clone());
    assert_eq!(consumer.value_count(), 0);
    consumer.request(1);
    assert_eq!(consumer.values(), vec!["hi"]);
  }

  #[test]
  fn just_n_emits_in_order() {
    let consumer = TestSubscriber::unbounded();
    just_n(vec![1, 2, 3]).subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec![1, 2, 3]);
    assert!(consumer.is_completed());
  }

  #[test]
  fn just_once_fails_the_second_subscriber() {
    let source = just_once(9);

    let first = TestSubscriber::unbounded();
    source.subscribe(first.clone());
    assert_eq!(first.values(), vec![9]);
    assert!(first.is_completed());

    let second = TestSubscriber::unbounded();
    source.subscribe(second.clone());
    assert_eq!(second.value_count(), 0);
    assert!(matches!(second.error(), Some(FlowError::AlreadyConsumed)));
  }
}
