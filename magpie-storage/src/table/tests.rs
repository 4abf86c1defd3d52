use crate::buffer::pool::BufferPool;
use crate::io::DiskManager;
use crate::table::tuple::{Tuple, TupleMeta};
use crate::table::TableHeap;
use magpie_catalog::{Column, Schema};
use magpie_datatype::{TypeId, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn heap() -> (TempDir, Arc<TableHeap>) {
    let dir = TempDir::new().unwrap();
    let disk = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
    let pool = BufferPool::new(16, 2, disk);
    let heap = Arc::new(TableHeap::new(pool).unwrap());
    (dir, heap)
}

fn schema() -> Schema {
    Schema::new(vec![
        Column::new("id", TypeId::Integer),
        Column::new("payload", TypeId::Varchar),
    ])
}

fn row(id: i32, payload: &str) -> Tuple {
    Tuple::from_values(&schema(), &[Value::from(id), Value::from(payload)])
}

#[test]
fn test_insert_get_round_trip() {
    let (_dir, heap) = heap();
    let meta = TupleMeta::new(7, false);
    let tuple = row(1, "hello");
    let rid = heap.insert_tuple(meta, &tuple).unwrap();

    let (got_meta, got_tuple) = heap.get_tuple(rid).unwrap();
    assert_eq!(got_meta, meta);
    assert_eq!(got_tuple.data(), tuple.data());
    assert_eq!(heap.get_tuple_meta(rid).unwrap(), meta);
}

#[test]
fn test_insert_chains_pages() {
    let (_dir, heap) = heap();
    let meta = TupleMeta::new(0, false);
    // A few hundred medium rows must spill past the first page.
    let mut rids = vec![];
    for i in 0..400 {
        let tuple = row(i, "some filler payload to widen the row");
        rids.push(heap.insert_tuple(meta, &tuple).unwrap());
    }
    assert_ne!(heap.first_page_id(), heap.last_page_id());

    // Chain order equals insertion order.
    let mut iter = heap.iter().unwrap();
    let mut seen = vec![];
    while let Some((_, tuple, rid)) = iter.next().unwrap() {
        seen.push((tuple.value(&schema(), 0), rid));
    }
    assert_eq!(seen.len(), rids.len());
    for (i, (value, rid)) in seen.into_iter().enumerate() {
        assert_eq!(value, Value::from(i as i32));
        assert_eq!(rid, rids[i]);
    }
}

#[test]
fn test_iterator_stop_sentinel() {
    let (_dir, heap) = heap();
    let meta = TupleMeta::new(0, false);
    for i in 0..3 {
        heap.insert_tuple(meta, &row(i, "x")).unwrap();
    }
    let mut iter = heap.iter().unwrap();
    // Tuples inserted after iterator creation are not visited.
    heap.insert_tuple(meta, &row(99, "late")).unwrap();

    let mut count = 0;
    while let Some((_, tuple, _)) = iter.next().unwrap() {
        assert_ne!(tuple.value(&schema(), 0), Value::from(99));
        count += 1;
    }
    assert_eq!(count, 3);
}

#[test]
fn test_eager_iterator_sees_later_inserts() {
    let (_dir, heap) = heap();
    let meta = TupleMeta::new(0, false);
    heap.insert_tuple(meta, &row(0, "x")).unwrap();
    let mut iter = heap.eager_iter().unwrap();
    heap.insert_tuple(meta, &row(1, "y")).unwrap();

    let mut count = 0;
    while iter.next().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 2);
}

#[test]
fn test_empty_heap_iteration() {
    let (_dir, heap) = heap();
    let mut iter = heap.iter().unwrap();
    assert!(iter.next().unwrap().is_none());
    let mut eager = heap.eager_iter().unwrap();
    assert!(eager.next().unwrap().is_none());
}

#[test]
fn test_update_meta_and_in_place() {
    let (_dir, heap) = heap();
    let rid = heap
        .insert_tuple(TupleMeta::new(1, false), &row(5, "before"))
        .unwrap();

    heap.update_tuple_meta(TupleMeta::new(2, true), rid).unwrap();
    assert!(heap.get_tuple_meta(rid).unwrap().is_deleted);

    let updated = heap
        .update_tuple_in_place(TupleMeta::new(3, false), &row(5, "after!"), rid, None)
        .unwrap();
    assert!(updated);
    let (meta, tuple) = heap.get_tuple(rid).unwrap();
    assert_eq!(meta.ts, 3);
    assert_eq!(tuple.value(&schema(), 1), Value::from("after!"));
}

#[test]
fn test_update_in_place_check_rejects() {
    let (_dir, heap) = heap();
    let rid = heap
        .insert_tuple(TupleMeta::new(1, false), &row(5, "keep"))
        .unwrap();

    // The predicate runs under the latch and vetoes the write.
    let check = |meta: &TupleMeta, _: &Tuple, _| meta.ts == 99;
    let updated = heap
        .update_tuple_in_place(TupleMeta::new(2, false), &row(5, "gone"), rid, Some(&check))
        .unwrap();
    assert!(!updated);
    let (meta, tuple) = heap.get_tuple(rid).unwrap();
    assert_eq!(meta.ts, 1);
    assert_eq!(tuple.value(&schema(), 1), Value::from("keep"));
}

#[test]
#[should_panic(expected = "cannot fit")]
fn test_oversized_tuple_is_fatal() {
    let (_dir, heap) = heap();
    let huge = "x".repeat(8192);
    let _ = heap.insert_tuple(TupleMeta::new(0, false), &row(0, &huge));
}
