mod common;
use common::*;

#[test]
fn test_nested_path_mutation() {
    let index = Index::new();
    let inner = obj! { "num": 10 };
    let outer = obj! { "x": &inner };
    index.add_object(&outer);

    assert_eq!(index.reduced_query(Q::eq("x.num", 10)).collect(), vec![outer.clone()]);

    inner.set("num", 20);
    assert!(index.reduced_query(Q::eq("x.num", 10)).collect().is_empty());
    assert_eq!(index.reduced_query(Q::eq("x.num", 20)).collect(), vec![outer.clone()]);
}

#[test]
fn test_nested_replacement_by_scalar() {
    let index = Index::new();
    let inner = obj! { "num": 20 };
    let outer = obj! { "x": &inner };
    index.add_object(&outer);

    outer.set("x", 7);
    assert_eq!(index.reduced_query(Q::eq("x", 7)).collect(), vec![outer.clone()]);
    assert!(index.reduced_query(Q::eq("x.num", 20)).collect().is_empty());
    // the suffix path is dangling now
    assert_eq!(index.reduced_query(Q::eq("x.num", Value::Missing)).collect(), vec![outer.clone()]);

    // the old link is fully released: its mutations no longer reach the index
    inner.set("num", 99);
    assert!(index.reduced_query(Q::eq("x.num", 99)).collect().is_empty());

    // restoring a link clears the sentinel
    let other = obj! { "num": 3 };
    outer.set("x", &other);
    assert!(index.reduced_query(Q::eq("x.num", Value::Missing)).collect().is_empty());
    assert_eq!(index.reduced_query(Q::eq("x.num", 3)).collect(), vec![outer.clone()]);
}

#[test]
fn test_nest_after_index() {
    let index = Index::new();
    let objects: Vec<Entity> = (0..5).map(|i| obj! { "name": format!("object_{}", i) }).collect();
    index.add_object_many(objects.clone());

    let result = index.reduced_query(Q::eq("name", "object_3")).collect();
    assert_eq!(result.len(), 1);

    for entity in &result {
        entity.set("child", obj! { "name": "child_of" });
    }

    let nested = index.reduced_query(Q::eq("child.name", "child_of")).collect();
    assert_eq!(nested.len(), 1);
    assert_eq!(str_prop(&nested[0], "name").as_deref(), Some("object_3"));
}

#[test]
fn test_nest_before_index() {
    let index = Index::new();
    let objects: Vec<Entity> = (0..5).map(|i| obj! { "name": format!("object_{}", i) }).collect();
    for entity in &objects {
        entity.set("child", obj! { "name": "child_of", "grandchild": obj! { "name": "grandchild_of" } });
    }
    index.add_object_many(objects.clone());

    let nested = index.reduced_query(Q::eq("child.name", "child_of")).collect();
    assert_eq!(nested.len(), 5);

    let triple = index.reduced_query(Q::eq("child.grandchild.name", "grandchild_of")).collect();
    assert_eq!(triple.len(), 5);
}

#[test]
fn test_triple_nest_after_index() {
    let index = Index::new();
    let objects: Vec<Entity> = (0..5).map(|i| obj! { "name": format!("object_{}", i) }).collect();
    index.add_object_many(objects.clone());

    let result = index.reduced_query(Q::eq("name", "object_3")).collect();
    assert_eq!(result.len(), 1);

    for entity in &result {
        entity.set("child", obj! { "name": "child_of" });
    }

    let nested = index.reduced_query(Q::eq("child.name", "child_of")).collect();
    assert_eq!(nested.len(), 1);

    // mutate an intermediate that only became reachable after indexing
    if let Some(PropertyValue::Entity(child)) = nested[0].get("child") {
        child.set("grandchild", obj! { "name": "grandchild_of" });
    } else {
        panic!("child link missing");
    }

    let triple = index.reduced_query(Q::eq("child.grandchild.name", "grandchild_of")).collect();
    assert_eq!(triple.len(), 1);
    assert_eq!(str_prop(&triple[0], "name").as_deref(), Some("object_3"));
}

#[test]
fn test_nested_query_in() {
    let index = Index::new();
    let objects: Vec<Entity> = (0..5).map(|i| obj! { "num": i, "nested": obj! { "num": i * 10 } }).collect();
    index.add_object_many(objects.clone());

    let result = index.reduced_query(Q::in_("nested.num", [20, 30, 40])).collect();
    assert_eq!(result.len(), 3);
}

#[test]
fn test_nested_query_ranges() {
    let index = Index::new();
    let objects: Vec<Entity> = (0..11).map(|i| obj! { "num": i, "nested": obj! { "num": i * 10 } }).collect();
    index.add_object_many(objects.clone());

    assert_eq!(index.reduced_query(Q::gt("nested.num", 50)).collect().len(), 5);
    assert_eq!(index.reduced_query(Q::ge("nested.num", 50)).collect().len(), 6);
    assert_eq!(index.reduced_query(Q::lt("nested.num", 50)).collect().len(), 5);
    assert_eq!(index.reduced_query(Q::le("nested.num", 50)).collect().len(), 6);
    assert_eq!(index.reduced_query(Q::bt("nested.num", 50, 90)).collect().len(), 5);
}

#[test]
fn test_one_to_many_links() {
    // one employer shared by two people; nested queries and mutations on
    // either side stay consistent
    let index = Index::new();
    let store = obj! { "name": "Big Rust Store", "address": "123 Ferris St" };
    let alice = obj! { "name": "Alice", "age": 30, "employer": &store, "wage": 70_000 };
    let bob = obj! { "name": "Bob", "age": 25, "employer": &store, "wage": 50_000 };
    index.add_object_many([bob.clone(), alice.clone()]);

    let is_30 = index.reduced_query(Q::eq("age", 30));
    assert_eq!(is_30.collect(), vec![alice.clone()]);
    drop(is_30);

    let high_wage = index.reduced_query(Q::gt("wage", 60_000));
    assert_eq!(high_wage.collect(), vec![alice.clone()]);
    drop(high_wage);

    for person in index.reduced_query(Q::lt("wage", 55_000)).collect() {
        let wage = int_prop(&person, "wage").unwrap();
        person.set("wage", wage + 10_000);
    }

    let high_wage = index.reduced_query(Q::ge("wage", 60_000)).collect();
    assert_eq!(high_wage.len(), 2);

    let employees = index.reduced_query(Q::eq("employer.name", "Big Rust Store")).collect();
    assert_eq!(employees.len(), 2);

    // a rename on the shared link re-files both
    store.set("name", "Bigger Rust Store");
    assert!(index.reduced_query(Q::eq("employer.name", "Big Rust Store")).collect().is_empty());
    assert_eq!(index.reduced_query(Q::eq("employer.name", "Bigger Rust Store")).collect().len(), 2);
}

#[test]
fn test_ne_over_dangling_path() {
    let index = Index::new();
    let linked = obj! { "x": obj! { "num": 1 } };
    let dangling = obj! { "x": obj! { "num": 2 } };
    let unrelated = obj! { "y": 1 };
    index.add_object_many([linked.clone(), dangling.clone(), unrelated.clone()]);

    assert_eq!(index.reduced_query(Q::ne("x.num", 5)).collect().len(), 2);

    // replacing the link leaves x.num dangling; ne() excludes the dangling
    // object along with objects never registered on the path
    dangling.set("x", 7);
    let result = index.reduced_query(Q::ne("x.num", 5)).collect();
    assert_eq!(result, vec![linked.clone()]);
}

#[test]
fn test_cycle_is_truncated() {
    let index = Index::new();
    let a = obj! { "name": "a" };
    let b = obj! { "name": "b", "owner": &a };
    a.set("pet", &b);
    index.add_object(&a);

    // the walk stops at the first revisit: the cycle link is filed but its
    // children are not re-indexed
    assert_eq!(index.reduced_query(Q::eq("pet.name", "b")).collect(), vec![a.clone()]);
    assert_eq!(index.reduced_query(Q::eq("pet.owner", Value::Ref(a.id().into()))).collect(), vec![a.clone()]);

    // mutations through the cycle still propagate to indexed paths
    b.set("name", "buddy");
    assert_eq!(index.reduced_query(Q::eq("pet.name", "buddy")).collect(), vec![a.clone()]);
}
