use crate::{
  flowable::Flowable,
  source::create::{create, Emission},
};

/// Emits the iterator's items, honoring the requested credit, and
/// completes on exhaustion. Each subscription walks a fresh copy of the
/// iterator.
pub fn from_iter<I>(iter: I) -> impl Flowable<Item = I::Item>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::IntoIter: Clone + Send + Sync,
  I::Item: Clone + Send + Sync + 'static,
{
  let mut cursor: Option<std::iter::Peekable<I::IntoIter>> = None;
  create(move |emission: &mut Emission<I::Item>, _requested| {
    let items =
      cursor.get_or_insert_with(|| iter.clone().into_iter().peekable());
    while emission.requested() > 0 {
      match items.next() {
        Some(item) => emission.next(item),
        None => break,
      }
    }
    if items.peek().is_none() {
      emission.complete();
    }
  })
}

/// Emits the `count` integers starting at `start`, then completes.
pub fn range(start: i64, count: i64) -> impl Flowable<Item = i64> {
  let end = start.saturating_add(count.max(0));
  from_iter(start..end)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{base::BaseSubscriber, test_subscriber::TestSubscriber};

  #[test]
  fn emits_everything_under_unbounded_request() {
    let consumer = TestSubscriber::unbounded();
    from_iter(vec!['a', 'b', 'c']).subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec!['a', 'b', 'c']);
    assert!(consumer.is_completed());
  }

  #[test]
  fn never_exceeds_the_requested_credit() {
    let consumer = TestSubscriber::with_request(2);
    range(0, 100).subscribe(consumer.clone());
    assert_eq!(consumer.values(), vec![0, 1]);
    assert!(!consumer.is_terminated());

    consumer.request(1);
    assert_eq!(consumer.values(), vec![0, 1, 2]);
  }

  #[test]
  fn completes_exactly_at_the_boundary() {
    let consumer = TestSubscriber::with_request(3);
    range(0, 3).subscribe(consumer.clone());
    assert_eq!(consumer.value_count(), 3);
    assert!(consumer.is_completed());
  }

  #[test]
  fn range_is_cold_and_repeatable() {
    let source = range(1, 3);
    for _ in 0..2 {
      let consumer = TestSubscriber::unbounded();
      source.subscribe(consumer.clone());
      assert_eq!(consumer.values(), vec![1, 2, 3]);
    }
  }

  #[test]
  fn empty_range_completes_immediately_under_request() {
    let consumer = TestSubscriber::unbounded();
    range(5, 0).subscribe(consumer.clone());
    assert_eq!(consumer.value_count(), 0);
    assert!(consumer.is_completed());
  }
}
