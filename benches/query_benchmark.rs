use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use forest_sql::{EngineConfig, Table, TableSet, Value, check_answer};
use std::hint::black_box;

const SPECIES: [&str; 5] = ["Owl", "Fox", "Bear", "Squirrel", "Deer"];

fn setup_forest(n: usize) -> TableSet {
    let mut animals = Table::new(
        "forest_animals",
        vec!["id".into(), "name".into(), "species".into(), "age".into()],
    )
    .unwrap();
    let mut habitats = Table::new(
        "animal_habitats",
        vec!["id".into(), "animal_id".into(), "location".into()],
    )
    .unwrap();

    for i in 0..n {
        animals
            .insert(vec![
                Value::Int(i as i64),
                Value::from(format!("animal{}", i).as_str()),
                Value::from(SPECIES[i % SPECIES.len()]),
                Value::Int((i % 15) as i64),
            ])
            .unwrap();
        habitats
            .insert(vec![
                Value::Int(i as i64),
                Value::Int(((i * 7) % n) as i64),
                Value::from(format!("tree{}", i % 40).as_str()),
            ])
            .unwrap();
    }
    TableSet::from_tables([animals, habitats]).unwrap()
}

fn bench_select_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("Select_Where_Performance");

    for n in [1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            let tables = setup_forest(n);
            b.iter(|| {
                let res = tables
                    .query("SELECT * FROM forest_animals WHERE age = 7 AND species <> 'Owl'")
                    .unwrap();
                black_box(res);
            });
        });
    }
    group.finish();
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("Inner_Join_Performance");

    // nested loop join, keep n small
    for n in [100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            let tables = setup_forest(n);
            b.iter(|| {
                let res = tables
                    .query(
                        "SELECT a.name, h.location FROM forest_animals a \
                         JOIN animal_habitats h ON a.id = h.animal_id",
                    )
                    .unwrap();
                black_box(res);
            });
        });
    }
    group.finish();
}

fn bench_group_by(c: &mut Criterion) {
    let mut group = c.benchmark_group("Group_By_Performance");

    for n in [1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            let tables = setup_forest(n);
            b.iter(|| {
                let res = tables
                    .query(
                        "SELECT species, COUNT(*) AS total, AVG(age) FROM forest_animals \
                         GROUP BY species ORDER BY total DESC",
                    )
                    .unwrap();
                black_box(res);
            });
        });
    }
    group.finish();
}

fn bench_check_answer(c: &mut Criterion) {
    let mut group = c.benchmark_group("Check_Answer");
    let tables = setup_forest(1000);
    let config = EngineConfig::default();

    group.bench_function("order_insensitive_compare", |b| {
        b.iter(|| {
            let verdict = check_answer(
                black_box("SELECT name, age FROM forest_animals ORDER BY age DESC"),
                "SELECT age, name FROM forest_animals",
                &tables,
                &config,
            );
            black_box(verdict);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_select_scaling,
    bench_join,
    bench_group_by,
    bench_check_answer
);
criterion_main!(benches);
