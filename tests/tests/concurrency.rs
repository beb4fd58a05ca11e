mod common;
use common::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;

const COUNTRIES: [&str; 5] = ["US", "CA", "MX", "FR", "DE"];
const TAGS: [&str; 4] = ["a", "b", "c", "d"];

fn random_str(rng: &mut StdRng, length: usize) -> String {
    (0..length).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

fn prep_data(rng: &mut StdRng, size: usize) -> Vec<Entity> {
    (0..size)
        .map(|i| {
            obj! {
                "id": i as i64,
                "age": rng.gen_range(18..80i64),
                "score": rng.gen::<f64>() * 100.0,
                "active": rng.gen_bool(0.5),
                "country": COUNTRIES[rng.gen_range(0..COUNTRIES.len())],
                "group": random_str(rng, 6),
                "tags": TAGS[rng.gen_range(0..TAGS.len())],
            }
        })
        .collect()
}

#[test]
fn test_multithreaded_add() {
    let mut rng = StdRng::seed_from_u64(42);
    let data = prep_data(&mut rng, 4_000);

    for thread_count in [1usize, 2, 4] {
        let index = Index::new();
        let per_thread = data.len() / thread_count;
        thread::scope(|scope| {
            for chunk in 0..thread_count {
                let start = chunk * per_thread;
                let end = if chunk == thread_count - 1 { data.len() } else { start + per_thread };
                let slice = data[start..end].to_vec();
                let index = index.clone();
                scope.spawn(move || index.add_object_many(slice));
            }
        });
        assert_eq!(index.collect().len(), data.len());
    }
}

#[test]
fn test_concurrent_writes_and_live_view() {
    let index = Index::new();
    let objects: Vec<Entity> = (0..400i64).map(|i| obj! { "id": i, "num": 0 }).collect();
    index.add_object_many(objects.clone());

    let view = index.reduced_query(Q::gt("num", 0));
    assert!(view.is_empty());

    thread::scope(|scope| {
        for chunk in objects.chunks(100) {
            let chunk = chunk.to_vec();
            scope.spawn(move || {
                for entity in chunk {
                    let id = int_prop(&entity, "id").unwrap();
                    entity.set("num", if id % 2 == 0 { 5 } else { -5 });
                }
            });
        }
    });

    // at quiescence the view's membership equals a brute-force filter
    assert_eq!(view.len(), 200);
    assert!(view.collect().iter().all(|o| int_prop(o, "num").unwrap() > 0));
}

/// The reference check for the compound query below, evaluated directly
/// against object properties.
fn reference_matches(entity: &Entity) -> bool {
    let age = int_prop(entity, "age").unwrap();
    let score = float_prop(entity, "score").unwrap();
    let active = bool_prop(entity, "active").unwrap();
    let country = str_prop(entity, "country").unwrap();
    let group = str_prop(entity, "group").unwrap();
    let tags = str_prop(entity, "tags").unwrap();

    let first = active && (35..=60).contains(&age) && score > 85.0;
    let second = ["CA", "MX"].contains(&country.as_str()) && (50.0..=75.0).contains(&score) && tags != "b";
    (first || second) && group != "guest" && country != "US" && age < 65
}

#[test]
fn test_compound_query_matches_reference_filter() {
    let mut rng = StdRng::seed_from_u64(42);
    let data = prep_data(&mut rng, 10_000);

    let index = Index::new();
    index.add_object_many(data.clone());

    let query = Q::and_([
        Q::or_([
            Q::and_([Q::eq("active", true), Q::bt("age", 35, 60), Q::gt("score", 85.0)]),
            Q::and_([Q::in_("country", ["CA", "MX"]), Q::bt("score", 50.0, 75.0), Q::ne("tags", "b")]),
        ]),
        Q::ne("group", "guest"),
        Q::ne("country", "US"),
        Q::lt("age", 65),
    ]);

    let result = index.reduced_query(query).collect();
    let expected = data.iter().filter(|entity| reference_matches(entity)).count();
    assert_eq!(result.len(), expected);
    assert!(result.iter().all(|entity| reference_matches(entity)));
}
