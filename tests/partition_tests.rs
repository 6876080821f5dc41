#![cfg(feature = "redb")]

mod common;

use common::*;
use multimap_cache::partition::partition_name;
use multimap_cache::prelude::*;

#[test]
fn test_partitions_are_named_by_index() {
    let dir = test_dir();
    let mut writer = PartitionedWriter::open(people_config(dir.path(), "orders"), 3).unwrap();
    assert_eq!(writer.partition_count(), 3);
    for i in 0..3 {
        assert_eq!(writer.partition(i).unwrap().name(), partition_name("orders", i));
    }
    assert!(writer.partition(3).is_none());
    writer.close().unwrap();
}

#[test]
fn test_single_partition_keeps_the_cache_name() {
    let dir = test_dir();
    let mut writer = PartitionedWriter::open(people_config(dir.path(), "solo"), 1).unwrap();
    assert_eq!(writer.partition(0).unwrap().name(), "solo");
    writer.upload(person(1, "a")).unwrap();
    writer.close().unwrap();

    let mut reader = JoinReader::open(people_config(dir.path(), "solo"), None).unwrap();
    assert_eq!(reader.next_joined(1).unwrap().map(|r| names(&[r])), Some(vec!["a".to_string()]));
    reader.close().unwrap();
}

#[test]
fn test_uploads_land_in_the_owning_partition() {
    let dir = test_dir();
    let mut writer = PartitionedWriter::open(people_config(dir.path(), "routed"), 4).unwrap();
    for id in 0..40 {
        assert!(writer.upload(person(id, &format!("p{id}"))).unwrap());
    }

    for id in 0..40 {
        let owner = writer.partition_for(&Value::Int(id));
        for index in 0..4 {
            let rows = writer.partition(index).unwrap().lookup(id).unwrap();
            assert_eq!(rows.len(), usize::from(index == owner), "key {id} partition {index}");
        }
    }
    let total: usize = (0..4)
        .map(|i| scan_all(writer.partition(i).unwrap()).len())
        .sum();
    assert_eq!(total, 40);
    writer.close().unwrap();
}

#[test]
fn test_routing_is_stable_across_writers() {
    let dir = test_dir();
    let mut first = PartitionedWriter::open(people_config(dir.path(), "first"), 5).unwrap();
    let mut second = PartitionedWriter::open(people_config(dir.path(), "second"), 5).unwrap();
    for id in 0..100 {
        let key = Value::Int(id);
        assert_eq!(first.partition_for(&key), second.partition_for(&key));
        assert_eq!(
            first.partition_for(&Value::from(vec![id, id + 1])),
            first.partition_for(&key)
        );
    }
    first.close().unwrap();
    second.close().unwrap();
}

#[test]
fn test_record_without_key_is_not_uploaded() {
    let dir = test_dir();
    let mut writer = PartitionedWriter::open(people_config(dir.path(), "keyless"), 2).unwrap();
    assert!(!writer.upload(Record::new().with("name", "nobody")).unwrap());
    assert!(!writer.upload(person(1, "x").with("id", Value::Null)).unwrap());
    writer.close().unwrap();
}

#[test]
fn test_delta_keys_replace_rows_once() {
    let dir = test_dir();
    let mut writer = PartitionedWriter::open(people_config(dir.path(), "delta"), 2).unwrap();
    writer.upload(person(1, "a")).unwrap();
    writer.upload(person(1, "b")).unwrap();
    writer.upload(person(2, "kept")).unwrap();
    writer.commit().unwrap();

    writer.set_delta_keys([1, 1]);
    assert_eq!(writer.pending_delta_keys(), 1);
    writer.upload(person(1, "c")).unwrap();
    writer.upload(person(1, "d")).unwrap();
    assert_eq!(writer.pending_delta_keys(), 0);

    let owner = writer.partition_for(&Value::Int(1));
    let rows = writer.partition(owner).unwrap().lookup(1).unwrap();
    assert_eq!(names(&rows), vec!["c", "d"]);
    let owner = writer.partition_for(&Value::Int(2));
    let rows = writer.partition(owner).unwrap().lookup(2).unwrap();
    assert_eq!(names(&rows), vec!["kept"]);

    writer.rollback();
    writer.close().unwrap();
}

#[test]
fn test_writer_delete_and_delete_all() {
    let dir = test_dir();
    let mut writer = PartitionedWriter::open(people_config(dir.path(), "wipe"), 3).unwrap();
    for id in 0..9 {
        writer.upload(person(id, "x")).unwrap();
    }
    writer.delete(4).unwrap();
    let owner = writer.partition_for(&Value::Int(4));
    assert!(writer.partition(owner).unwrap().lookup(4).unwrap().is_empty());

    writer.delete_all().unwrap();
    for i in 0..3 {
        assert!(scan_all(writer.partition(i).unwrap()).is_empty());
    }
    writer.close().unwrap();
}

#[test]
fn test_join_reader_walks_rows_of_each_parent() {
    let dir = test_dir();
    let mut writer = PartitionedWriter::open(people_config(dir.path(), "children"), 2).unwrap();
    writer.upload(person(1, "a")).unwrap();
    writer.upload(person(1, "b")).unwrap();
    writer.upload(person(2, "c")).unwrap();
    let owner = writer.partition_for(&Value::Int(1));
    writer.close().unwrap();

    let mut reader = JoinReader::open(people_config(dir.path(), "children"), Some(owner)).unwrap();
    assert!(reader.cache().config().read_only);

    let mut joined = Vec::new();
    while let Some(row) = reader.next_joined(1).unwrap() {
        joined.push(row);
    }
    assert_eq!(names(&joined), vec!["a", "b"]);

    // Exhausting a parent forgets it, so asking again starts over.
    let again = reader.next_joined(1).unwrap().unwrap();
    assert_eq!(names(&[again]), vec!["a"]);
    assert!(reader.next_joined(Value::Null).unwrap().is_none());
    assert!(reader.next_joined(99).unwrap().is_none());

    assert!(matches!(
        reader.cache().add(person(3, "z")),
        Err(CacheError::State(_))
    ));
    reader.close().unwrap();
}

#[test]
fn test_join_reader_full_scan() {
    let dir = test_dir();
    let mut writer = PartitionedWriter::open(people_config(dir.path(), "parents"), 1).unwrap();
    for id in [3, 1, 2] {
        writer.upload(person(id, &format!("p{id}"))).unwrap();
    }
    writer.close().unwrap();

    let mut reader = JoinReader::open(people_config(dir.path(), "parents"), None).unwrap();
    let mut rows = Vec::new();
    while let Some(row) = reader.next_row() {
        rows.push(row.unwrap());
    }
    assert_eq!(names(&rows), vec!["p1", "p2", "p3"]);
    reader.close().unwrap();
}

#[test]
fn test_join_reader_requires_written_cache() {
    let dir = test_dir();
    assert!(JoinReader::open(people_config(dir.path(), "absent"), Some(0)).is_err());
}
