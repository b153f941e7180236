#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use idxcursor::ctx::{Context, MutableContext};
use idxcursor::err::Result;
use idxcursor::idx::{CursorConfig, IndexCursor, make};
use idxcursor::key::{IndexKey, Ordering, Value};
use idxcursor::kvs::IndexKind;
use idxcursor::kvs::mem::{Datastore, MemIndex};

pub fn ctx() -> Context {
	MutableContext::background().freeze()
}

pub fn ints(v: &[i64]) -> Vec<Value> {
	v.iter().map(|i| Value::Int(*i)).collect()
}

pub fn doc(pk: i64) -> Bytes {
	Bytes::from(format!("{{\"id\":{pk}}}"))
}

/// A datastore with a single-field secondary index `a` holding one key
/// per value, each referring to a document with the same primary key.
pub fn single_field(values: impl IntoIterator<Item = i64>) -> (Datastore, Arc<MemIndex>) {
	let ds = Datastore::new();
	let idx = ds.define_index("a", IndexKind::Secondary, Ordering::ascending(1));
	for v in values {
		ds.insert(v, doc(v));
		idx.insert(ints(&[v]), v);
	}
	(ds, idx)
}

pub async fn open(idx: &Arc<MemIndex>, config: CursorConfig) -> Result<IndexCursor> {
	make(&ctx(), idx.clone(), config).await
}

/// Drain a cursor, returning every key it exposed.
pub async fn keys(cursor: &mut IndexCursor, ctx: &Context) -> Result<Vec<IndexKey>> {
	let mut out = Vec::new();
	while cursor.advance(ctx).await? {
		out.push(cursor.curr_key()?.clone());
	}
	Ok(out)
}

/// Drain a cursor, returning the primary key of every row it exposed.
pub async fn pks(cursor: &mut IndexCursor, ctx: &Context) -> Result<Vec<Value>> {
	Ok(keys(cursor, ctx).await?.into_iter().map(|k| k.pk).collect())
}
