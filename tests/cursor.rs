mod common;

use bytes::Bytes;
use common::{ctx, doc, ints, keys, open, pks, single_field};
use futures::TryStreamExt;
use idxcursor::ctx::MutableContext;
use idxcursor::err::Error;
use idxcursor::idx::bounds::{Bounds, FieldRange, Interval, KeyRange};
use idxcursor::idx::strategy::FetchPolicy;
use idxcursor::idx::{CursorConfig, make};
use idxcursor::key::{Direction, IndexKey, Ordering, Value};
use idxcursor::kvs::IndexKind;
use idxcursor::kvs::mem::Datastore;
use rstest::rstest;
use test_log::test;
use trice::Instant;

#[test(tokio::test)]
async fn single_interval_stops_at_the_end_of_bounds() {
	let (_ds, idx) = single_field([5, 10, 15, 20, 25]);
	let bounds = Bounds::intervals(vec![FieldRange::new(vec![Interval::closed(10, 20)])]);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(bounds)).await.unwrap();
	assert_eq!(pks(&mut cur, &ctx).await.unwrap(), ints(&[10, 15, 20]));
	// 25 was delivered by the engine, but never exposed
	assert_eq!(cur.nscanned(), 4);
	assert!(cur.eof());
	assert!(!cur.advance(&ctx).await.unwrap());
}

#[test(tokio::test)]
async fn disjoint_intervals_reposition_over_the_gap() {
	let (_ds, idx) = single_field(1..=10);
	let bounds = Bounds::intervals(vec![FieldRange::new(vec![
		Interval::closed(1, 3),
		Interval::closed(7, 9),
	])]);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(bounds)).await.unwrap();
	assert_eq!(pks(&mut cur, &ctx).await.unwrap(), ints(&[1, 2, 3, 7, 8, 9]));
	let stats = idx.stats();
	// The initial positioning, then one jump from 4 to 7
	assert_eq!(stats.seeks, 2);
	assert_eq!(stats.fetches, 2);
	// 1, 2, 3, 4, 7, 8, 9, 10: neither 5 nor 6 is ever read
	assert_eq!(stats.rows, 8);
	assert_eq!(cur.nscanned(), 8);
}

#[test(tokio::test)]
async fn multikey_document_is_returned_once() {
	let ds = Datastore::new();
	let idx = ds.define_index("tags", IndexKind::Secondary, Ordering::ascending(1));
	ds.insert(1, doc(1));
	ds.insert(2, doc(2));
	idx.insert_keys(vec![ints(&[1]), ints(&[2]), ints(&[3])], 1);
	idx.insert_keys(vec![ints(&[2])], 2);
	let bounds = Bounds::intervals(vec![FieldRange::new(vec![Interval::closed(1, 2)])]);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(bounds)).await.unwrap();
	assert!(cur.is_multikey());
	assert_eq!(cur.to_string(), "IndexCursor tags multi");
	assert_eq!(pks(&mut cur, &ctx).await.unwrap(), ints(&[1, 2]));
	assert_eq!(cur.state().seen(), 2);
	// Already seen documents are reported as duplicates
	assert!(cur.observe_and_check_duplicate(&Value::Int(1)));
	assert!(!cur.observe_and_check_duplicate(&Value::Int(3)));
}

#[test(tokio::test)]
async fn duplicates_are_not_tracked_without_multikey() {
	let (_ds, idx) = single_field(1..=3);
	let mut cur = open(&idx, CursorConfig::new(Bounds::Full)).await.unwrap();
	assert!(!cur.observe_and_check_duplicate(&Value::Int(1)));
	assert!(!cur.observe_and_check_duplicate(&Value::Int(1)));
	assert_eq!(cur.state().seen(), 0);
}

#[test(tokio::test)]
async fn index_turning_multikey_never_repeats_a_document() {
	let ds = Datastore::new();
	let idx = ds.define_index("tags", IndexKind::Secondary, Ordering::ascending(1));
	for pk in 0..4 {
		ds.insert(pk, doc(pk));
		idx.insert(ints(&[pk]), pk);
	}
	let config = CursorConfig::new(Bounds::Full).fetch_policy(FetchPolicy::fixed(2));
	let ctx = ctx();
	let mut cur = open(&idx, config).await.unwrap();
	assert!(cur.advance(&ctx).await.unwrap());
	assert!(!cur.is_multikey());
	let mut seen = vec![cur.curr_pk().unwrap().clone()];
	// Document 0 gains a second key past the rows already buffered
	idx.insert_keys(vec![ints(&[0]), ints(&[10])], 0);
	seen.extend(pks(&mut cur, &ctx).await.unwrap());
	assert!(cur.is_multikey());
	assert_eq!(seen, ints(&[0, 1, 2, 3]));
	// The second key of document 0 was read, but not returned
	assert_eq!(cur.nscanned(), 5);
}

#[rstest]
#[case::forward(Direction::Forward)]
#[case::backward(Direction::Backward)]
#[test_log::test(tokio::test)]
async fn returned_keys_are_strictly_ordered(#[case] direction: Direction) {
	let ds = Datastore::new();
	let ordering = Ordering::new(vec![Direction::Forward, Direction::Backward]);
	let idx = ds.define_index("ab", IndexKind::Secondary, ordering.clone());
	let mut pk = 0;
	for a in 0..6 {
		for b in 0..6 {
			idx.insert(ints(&[a, b]), pk);
			pk += 1;
		}
	}
	let bounds = Bounds::intervals(vec![
		FieldRange::new(vec![Interval::closed(1, 2), Interval::point(4)]),
		FieldRange::new(vec![Interval::point(0), Interval::closed(3, 5)]),
	]);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(bounds.clone()).fetch_policy(FetchPolicy::fixed(3)).direction(direction))
		.await
		.unwrap();
	let out = keys(&mut cur, &ctx).await.unwrap();
	assert_eq!(out.len(), 3 * 4);
	for w in out.windows(2) {
		assert!(direction.apply(ordering.compare_keys(&w[0], &w[1])).is_lt(), "{} then {}", w[0], w[1]);
	}
	let Bounds::Intervals {
		vector,
		..
	} = &bounds
	else {
		unreachable!()
	};
	for key in &out {
		for (i, range) in vector.ranges().iter().enumerate() {
			assert!(range.intervals().iter().any(|iv| iv.contains(&key.fields[i])), "{key}");
		}
	}
}

#[test(tokio::test)]
async fn reverse_scan_is_the_exact_reverse() {
	let (_ds, idx) = single_field((0..50).map(|i| i * 3 % 50));
	let bounds = Bounds::intervals(vec![FieldRange::new(vec![
		Interval::closed(2, 9),
		Interval::open(20, 31),
		Interval::new(Value::Int(40), true, Value::Int(45), false),
	])]);
	let ctx = ctx();
	let mut fwd = open(&idx, CursorConfig::new(bounds.clone())).await.unwrap();
	let mut rev = open(&idx, CursorConfig::new(bounds).reverse()).await.unwrap();
	let mut forward = pks(&mut fwd, &ctx).await.unwrap();
	let backward = pks(&mut rev, &ctx).await.unwrap();
	assert_eq!(rev.to_string(), "IndexCursor a reverse");
	assert!(!forward.is_empty());
	forward.reverse();
	assert_eq!(forward, backward);
}

#[test(tokio::test)]
async fn range_bounds_on_a_compound_index() {
	let ds = Datastore::new();
	let idx = ds.define_index("ab", IndexKind::Secondary, Ordering::ascending(2));
	let mut pk = 0;
	for a in 0..5 {
		for b in 0..3 {
			idx.insert(ints(&[a, b]), pk);
			pk += 1;
		}
	}
	let ctx = ctx();
	let range = KeyRange::new(ints(&[1, 2]), ints(&[3]), false);
	let mut cur = open(&idx, CursorConfig::new(Bounds::Range(range))).await.unwrap();
	let out: Vec<Vec<Value>> = keys(&mut cur, &ctx).await.unwrap().into_iter().map(|k| k.fields).collect();
	assert_eq!(out, vec![ints(&[1, 2]), ints(&[2, 0]), ints(&[2, 1]), ints(&[2, 2])]);
	// A point matches every key starting with it
	let mut cur = open(&idx, CursorConfig::new(Bounds::Point(ints(&[4]))).reverse()).await.unwrap();
	assert_eq!(pks(&mut cur, &ctx).await.unwrap(), ints(&[14, 13, 12]));
}

#[rstest]
#[case::forward(Direction::Forward, &[2, 3, 4, 5, 6, 7])]
#[case::backward(Direction::Backward, &[7, 6, 5, 4, 3, 2])]
#[test_log::test(tokio::test)]
async fn leading_field_bounds_cover_every_trailing_value(
	#[case] direction: Direction,
	#[case] expected: &[i64],
) {
	let ds = Datastore::new();
	let idx = ds.define_index("ab", IndexKind::Secondary, Ordering::ascending(2));
	for a in 0..5 {
		for b in 0..2 {
			idx.insert(ints(&[a, b]), a * 2 + b);
		}
	}
	// Only the first field is restricted
	let bounds = Bounds::intervals(vec![FieldRange::new(vec![Interval::closed(1, 3)])]);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(bounds).direction(direction)).await.unwrap();
	assert_eq!(pks(&mut cur, &ctx).await.unwrap(), ints(expected));
}

#[test(tokio::test)]
async fn fetch_sizes_grow_to_a_fixed_maximum() {
	let (_ds, idx) = single_field(0..10_000);
	let config = CursorConfig::new(Bounds::Full).count_only().fetch_policy(FetchPolicy::new(16, 1000));
	let ctx = ctx();
	let mut cur = open(&idx, config).await.unwrap();
	assert_eq!(cur.count(&ctx).await.unwrap(), 10_000);
	let hints = idx.stats().hints;
	assert_eq!(&hints[..3], &[16, 32, 64]);
	assert!(hints.windows(2).all(|w| w[0] <= w[1]));
	assert!(hints.iter().all(|h| *h <= 1000));
	assert_eq!(hints.last(), Some(&1000));
}

#[test(tokio::test)]
async fn secondary_documents_are_read_lazily() {
	let (_ds, idx) = single_field([1, 2]);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(Bounds::Full)).await.unwrap();
	assert!(matches!(cur.current().await, Err(Error::CursorUnpositioned)));
	assert!(cur.advance(&ctx).await.unwrap());
	assert!(cur.state().current_doc().is_none());
	assert_eq!(cur.current().await.unwrap(), &doc(1));
	assert_eq!(cur.state().current_doc(), Some(&doc(1)));
	assert_eq!(cur.curr_pk().unwrap(), &Value::Int(1));
}

#[test(tokio::test)]
async fn clustering_rows_carry_their_documents() {
	let ds = Datastore::new();
	let idx = ds.define_index("a", IndexKind::Clustering, Ordering::ascending(1));
	ds.insert(7, doc(7));
	idx.insert(ints(&[70]), 7);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(Bounds::Full)).await.unwrap();
	assert!(cur.advance(&ctx).await.unwrap());
	assert_eq!(cur.state().current_doc(), Some(&doc(7)));
	assert_eq!(cur.curr_key().unwrap(), &IndexKey::new(ints(&[70]), Value::Int(7)));
}

#[test(tokio::test)]
async fn count_only_never_reads_documents() {
	let ds = Datastore::new();
	let idx = ds.define_index("_id", IndexKind::Primary, Ordering::ascending(1));
	for pk in 0..20 {
		ds.insert(pk, doc(pk));
	}
	let ctx = ctx();
	let bounds = Bounds::Range(KeyRange::new(ints(&[5]), ints(&[15]), false));
	let mut cur = open(&idx, CursorConfig::new(bounds).count_only()).await.unwrap();
	assert!(cur.advance(&ctx).await.unwrap());
	assert!(cur.state().current_doc().is_none());
	assert!(matches!(cur.current().await, Err(Error::CountOnlyDocument)));
	assert_eq!(cur.count(&ctx).await.unwrap(), 9);
	assert_eq!(cur.explain()["kind"], "countOnly");
}

#[test(tokio::test)]
async fn invalidation_materializes_the_current_document() {
	let (ds, idx) = single_field([1, 2, 3]);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(Bounds::Full)).await.unwrap();
	assert!(cur.advance(&ctx).await.unwrap());
	assert!(cur.advance(&ctx).await.unwrap());
	cur.invalidate(&ctx, &Value::Int(2)).await.unwrap();
	ds.remove(&Value::Int(2));
	assert_eq!(cur.current().await.unwrap(), &doc(2));
	// Rows of other documents are left alone
	assert!(cur.advance(&ctx).await.unwrap());
	assert_eq!(cur.curr_pk().unwrap(), &Value::Int(3));
}

#[test(tokio::test)]
async fn invalidation_of_a_vanished_document_advances() {
	let (ds, idx) = single_field([1, 2, 3, 4]);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(Bounds::Full)).await.unwrap();
	assert!(cur.advance(&ctx).await.unwrap());
	ds.remove(&Value::Int(1));
	cur.invalidate(&ctx, &Value::Int(1)).await.unwrap();
	assert_eq!(cur.curr_pk().unwrap(), &Value::Int(2));
	// A buffered row of a removed document is never exposed
	cur.invalidate(&ctx, &Value::Int(3)).await.unwrap();
	ds.remove(&Value::Int(3));
	assert_eq!(pks(&mut cur, &ctx).await.unwrap(), ints(&[4]));
}

#[test(tokio::test)]
async fn cancellation_stops_the_scan() {
	let (_ds, idx) = single_field(0..100);
	let mut cur = open(&idx, CursorConfig::new(Bounds::Full)).await.unwrap();
	let mut ctx = MutableContext::background();
	let canceller = ctx.add_cancel();
	let ctx = ctx.freeze();
	canceller.cancel();
	assert!(matches!(cur.advance(&ctx).await, Err(Error::QueryCancelled)));
	assert_eq!(idx.stats().fetches, 0);
}

#[test(tokio::test)]
async fn expired_deadline_times_out() {
	let (_ds, idx) = single_field(0..100);
	let mut cur = open(&idx, CursorConfig::new(Bounds::Full)).await.unwrap();
	let mut ctx = MutableContext::background();
	ctx.add_deadline(Instant::now());
	let ctx = ctx.freeze();
	let err = cur.advance(&ctx).await.unwrap_err();
	assert_eq!(err, Error::QueryTimedout);
	assert!(err.is_interrupted());
	// An interrupted context also refuses to open cursors
	assert!(matches!(make(&ctx, idx.clone(), CursorConfig::new(Bounds::Full)).await, Err(Error::QueryTimedout)));
}

#[test(tokio::test)]
async fn rebuilt_index_fails_with_a_retryable_error() {
	let (_ds, idx) = single_field(0..10);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(Bounds::Full)).await.unwrap();
	idx.recreate();
	let err = cur.advance(&ctx).await.unwrap_err();
	assert!(err.is_retryable());
}

#[test(tokio::test)]
async fn prelocked_scans_take_one_range_lock() {
	let (_ds, idx) = single_field(0..10);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(Bounds::Full).prelock().for_update()).await.unwrap();
	assert_eq!(pks(&mut cur, &ctx).await.unwrap().len(), 10);
	let stats = idx.stats();
	assert_eq!(stats.range_locks, 1);
	assert_eq!(stats.row_locks, 0);
	idx.reset_stats();
	let mut cur = open(&idx, CursorConfig::new(Bounds::Full).for_update()).await.unwrap();
	assert_eq!(pks(&mut cur, &ctx).await.unwrap().len(), 10);
	let stats = idx.stats();
	assert_eq!(stats.range_locks, 0);
	assert_eq!(stats.row_locks, 10);
}

#[test(tokio::test)]
async fn explain_describes_the_scan() {
	let (_ds, idx) = single_field(0..10);
	let bounds = Bounds::intervals(vec![FieldRange::new(vec![Interval::closed(1, 3)])]);
	let ctx = ctx();
	let mut cur = open(&idx, CursorConfig::new(bounds)).await.unwrap();
	cur.count(&ctx).await.unwrap();
	let explain = cur.explain();
	assert_eq!(explain["cursor"], "IndexCursor a");
	assert_eq!(explain["index"], "a");
	assert_eq!(explain["kind"], "indexBounded");
	assert_eq!(explain["direction"], "forward");
	assert_eq!(explain["isMultiKey"], false);
	assert_eq!(explain["indexBounds"], serde_json::json!([[[1, 3]]]));
	assert_eq!(explain["nscanned"], 4);
	assert_eq!(explain["exhausted"], "bounds");
}

#[test(tokio::test)]
async fn cursor_streams_documents() {
	let (_ds, idx) = single_field([3, 1, 2]);
	let cur = open(&idx, CursorConfig::new(Bounds::Full)).await.unwrap();
	let rows: Vec<(IndexKey, Bytes)> = cur.into_stream(ctx()).try_collect().await.unwrap();
	let docs: Vec<Bytes> = rows.into_iter().map(|(_, d)| d).collect();
	assert_eq!(docs, vec![doc(1), doc(2), doc(3)]);
}
