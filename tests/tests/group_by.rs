mod common;
use common::*;

#[test]
fn test_non_nested() {
    let index = Index::new();
    let objects: Vec<Entity> = (0..10i64).map(|i| obj! { "id": 1, "num": i / 2 }).collect();
    index.add_object_many(objects.clone());

    let grouped = index.group_by("num");
    for i in 0..5i64 {
        assert_eq!(grouped[&Value::Int(i)].collect().len(), 2);
    }
}

#[test]
fn test_non_nested_many_children() {
    let index = Index::new();
    let vals: Vec<i64> = (0..10).collect();
    let objects: Vec<Entity> = (0..10).map(|i| obj! { "id": 1, "nested": vals[i..].to_vec() }).collect();
    index.add_object_many(objects.clone());

    let grouped = index.group_by("nested");
    for &v in &vals {
        assert_eq!(grouped[&Value::Int(v)].collect().len(), (v + 1) as usize);
    }
}

#[test]
fn test_nested_group_by() {
    let index = Index::new();
    let objects: Vec<Entity> = (0..10i64)
        .map(|i| obj! { "id": 1, "nested": obj! { "nest": true, "num": i / 2 } })
        .collect();
    index.add_object_many(objects.clone());

    let grouped = index.group_by("nested.num");
    let zeros = grouped[&Value::Int(0)].collect();
    assert_eq!(zeros.len(), 2);

    let grouped = index.group_by("nested.nest");
    assert_eq!(grouped[&Value::Bool(true)].collect().len(), 10);
}

#[test]
fn test_nested_group_by_with_many_children() {
    let index = Index::new();
    let objects: Vec<Entity> = (0..10i64)
        .map(|iteration| {
            let children: Vec<i64> = (0..iteration).collect();
            obj! { "id": 1, "nested": obj! { "nest": true, "children": children } }
        })
        .collect();
    index.add_object_many(objects.clone());

    let grouped = index.group_by("nested.children");
    for (value, group) in &grouped {
        let Value::Int(i) = value else {
            panic!("unexpected group key {value}");
        };
        assert_eq!(group.collect().len(), (9 - i) as usize);
    }
}

#[test]
fn test_group_by_one_to_many() {
    let index = Index::new();
    let nested = obj! { "nest": true };
    let objects: Vec<Entity> = (0..10i64).map(|i| obj! { "id": i, "nested": &nested }).collect();
    index.add_object_many(objects.clone());

    let grouped = index.group_by("nested.nest");
    assert_eq!(grouped[&Value::Bool(true)].collect().len(), 10);
}

#[test]
fn test_group_by_many_to_many() {
    let index = Index::new();
    let nested: Vec<Entity> = (0..10i64).map(|i| obj! { "num": i, "nest": true, "id": i }).collect();
    let objects: Vec<Entity> = (0..10i64).map(|i| obj! { "id": i, "nested": nested.clone() }).collect();
    index.add_object_many(objects.clone());

    let grouped = index.group_by("nested.num");
    // change one shared child; the change is visible through every root
    let member = &grouped[&Value::Int(0)].collect()[0];
    if let Some(PropertyValue::List(items)) = member.get("nested") {
        items[0].as_entity().unwrap().set("idx", 100);
    } else {
        panic!("nested list missing");
    }

    assert_eq!(index.reduced_query(Q::eq("nested.idx", 100)).collect().len(), 10);
}

#[test]
fn test_group_by_one_to_many_deregister() {
    let index = Index::new();
    let nested = obj! { "nest": true, "num": 100 };
    let objects: Vec<Entity> = (0..10i64).map(|i| obj! { "id": i, "nested": &nested }).collect();
    index.add_object_many(objects.clone());

    let grouped = index.group_by("nested.nest");
    let all = grouped[&Value::Bool(true)].collect();
    assert_eq!(all.len(), 10);

    // replacing the link on one root deregisters only that root
    all[0].set("nested", "test");

    let grouped = index.group_by("nested.nest");
    assert_eq!(grouped[&Value::Bool(true)].collect().len(), 9);

    let grouped = index.group_by("nested.num");
    assert_eq!(grouped[&Value::Int(100)].collect().len(), 9);
}

#[test]
fn test_remove_and_reassign_tracked_list() {
    let index = Index::new();
    let nested: Vec<Entity> = (0..3i64).map(|i| obj! { "num": i, "id": i }).collect();
    let objects: Vec<Entity> = (0..5i64).map(|i| obj! { "id": i, "nested": nested.clone() }).collect();
    for entity in &objects {
        index.add_object(entity);
    }

    let grouped = index.group_by("nested.num");
    assert_eq!(grouped[&Value::Int(0)].collect().len(), 5);

    for entity in &objects {
        entity.set("nested", Vec::<Entity>::new());
    }

    // zero-element fan-out: the old groups drain (and a fresh group-by has
    // no keys at all), but nothing files under the missing sentinel
    assert!(grouped.values().all(|group| group.collect().is_empty()));
    assert!(index.group_by("nested.num").is_empty());

    let new_nested: Vec<Entity> = (0..3i64).map(|i| obj! { "num": 100 + i, "id": 10 + i }).collect();
    for entity in &objects {
        entity.set("nested", new_nested.clone());
    }

    let grouped = index.group_by("nested.num");
    assert_eq!(grouped[&Value::Int(100)].collect().len(), 5);

    new_nested[0].set("num", 999);
    let grouped = index.group_by("nested.num");
    assert_eq!(grouped[&Value::Int(999)].collect().len(), 5);
    assert!(!grouped.contains_key(&Value::Int(100)));
}

#[test]
fn test_nested_group_by_many_to_many() {
    let index = Index::new();
    let children: Vec<Entity> = (0..200i64).map(|i| obj! { "num": i }).collect();
    let shared: Vec<Entity> = (0..3i64).map(|i| obj! { "nested_num": i }).collect();
    for child in &children {
        child.set("child", shared.clone());
    }
    index.add_object_many(children.clone());

    let groups = index.group_by("child.nested_num");
    for i in 0..3i64 {
        assert_eq!(groups[&Value::Int(i)].collect().len(), 200, "group {} has invalid length", i);
    }
}

#[test]
fn test_group_by_includes_missing_group() {
    let index = Index::new();
    let intact = obj! { "x": obj! { "num": 1 } };
    let broken = obj! { "x": obj! { "num": 2 } };
    index.add_object_many([intact.clone(), broken.clone()]);

    broken.set("x", "scalar");

    let grouped = index.group_by("x.num");
    assert_eq!(grouped[&Value::Int(1)].collect(), vec![intact.clone()]);
    assert_eq!(grouped[&Value::Missing].collect(), vec![broken.clone()]);
}
