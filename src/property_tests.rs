use crate::Value;
use crate::compare::{CompareOptions, compare_results, compare_results_with};
use crate::engine::execute;
use crate::result::ResultRow;
use crate::table::{Table, TableSet};
use proptest::prelude::*;
use std::collections::BTreeMap;

const NAMES: [&str; 5] = ["Ollie", "Felix", "Bella", "Sammy", "Daisy"];

fn animals_strategy() -> impl Strategy<Value = Vec<(usize, i64)>> {
    prop::collection::vec((0..NAMES.len(), 0i64..20), 0..40)
}

fn build_tables(animals: &[(usize, i64)]) -> TableSet {
    let rows = animals
        .iter()
        .enumerate()
        .map(|(i, &(name, age))| {
            vec![Value::Int(i as i64 + 1), Value::from(NAMES[name]), Value::Int(age)]
        })
        .collect();
    let table = Table::with_rows(
        "forest_animals",
        vec!["id".into(), "name".into(), "age".into()],
        rows,
    )
    .unwrap();
    TableSet::from_tables([table]).unwrap()
}

fn run(tables: &TableSet, sql: &str) -> Vec<ResultRow> {
    match execute(sql, tables) {
        Ok(rows) => rows,
        Err(err) => panic!("property SQL failed: {sql}: {err}"),
    }
}

fn ids(rows: &[ResultRow]) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| row.get("id").and_then(Value::as_int))
        .collect()
}

fn query_fragment_strategy() -> impl Strategy<Value = String> {
    let fragment = prop::sample::select(vec![
        "SELECT", "FROM", "WHERE", "GROUP BY", "ORDER BY", "JOIN", "ON", "AND", "OR", "NOT",
        "IN", "COUNT(*)", "SUM(", "(", ")", ",", "*", "=", "<>", ">", "-", "/", "'Owl'", "'",
        "42", "3.5", "name", "age", "a.id", "forest_animals", "a", "LIMIT", "DISTINCT", ";",
    ]);
    prop::collection::vec(fragment, 0..16).prop_map(|parts| parts.join(" "))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn select_star_reproduces_table(animals in animals_strategy()) {
        let tables = build_tables(&animals);
        let rows = run(&tables, "SELECT * FROM forest_animals");

        prop_assert_eq!(rows.len(), animals.len());
        for (row, &(name, age)) in rows.iter().zip(&animals) {
            prop_assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name", "age"]);
            prop_assert_eq!(row.get("name"), Some(&Value::from(NAMES[name])));
            prop_assert_eq!(row.get("age"), Some(&Value::Int(age)));
        }
    }

    #[test]
    fn where_partitions_rows(
        animals in animals_strategy(),
        op in prop::sample::select(vec!["=", "<>", "<", "<=", ">", ">="]),
        pivot in 0i64..20,
    ) {
        let tables = build_tables(&animals);
        let matched = ids(&run(
            &tables,
            &format!("SELECT id FROM forest_animals WHERE age {op} {pivot}"),
        ));
        let rest = ids(&run(
            &tables,
            &format!("SELECT id FROM forest_animals WHERE NOT age {op} {pivot}"),
        ));

        let holds = |age: i64| match op {
            "=" => age == pivot,
            "<>" => age != pivot,
            "<" => age < pivot,
            "<=" => age <= pivot,
            ">" => age > pivot,
            ">=" => age >= pivot,
            other => unreachable!("operator {other}"),
        };
        let (hits, misses): (Vec<(i64, i64)>, Vec<(i64, i64)>) = (1i64..)
            .zip(animals.iter().map(|&(_, age)| age))
            .partition(|&(_, age)| holds(age));
        let expected: Vec<i64> = hits.iter().map(|&(id, _)| id).collect();
        let expected_rest: Vec<i64> = misses.iter().map(|&(id, _)| id).collect();

        prop_assert_eq!(matched.len() + rest.len(), animals.len());
        prop_assert!(matched.iter().all(|id| !rest.contains(id)));
        prop_assert_eq!(matched, expected);
        prop_assert_eq!(rest, expected_rest);
    }

    #[test]
    fn descending_order_reverses_ascending(animals in animals_strategy()) {
        let tables = build_tables(&animals);
        let asc = ids(&run(&tables, "SELECT id FROM forest_animals ORDER BY id"));
        let mut desc = ids(&run(&tables, "SELECT id FROM forest_animals ORDER BY id DESC"));
        desc.reverse();
        prop_assert_eq!(asc, desc);
    }

    #[test]
    fn order_by_is_sorted(animals in animals_strategy()) {
        let tables = build_tables(&animals);
        let rows = run(&tables, "SELECT age, id FROM forest_animals ORDER BY age DESC, id");
        let keys: Vec<(i64, i64)> = rows
            .iter()
            .filter_map(|row| Some((row.get("age")?.as_int()?, row.get("id")?.as_int()?)))
            .collect();
        prop_assert_eq!(keys.len(), animals.len());
        for pair in keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            prop_assert!(a.0 > b.0 || (a.0 == b.0 && a.1 < b.1), "{:?} before {:?}", a, b);
        }
    }

    #[test]
    fn group_counts_match_filtered_rows(animals in animals_strategy(), pivot in 0i64..20) {
        let tables = build_tables(&animals);
        let groups = run(
            &tables,
            &format!(
                "SELECT name, COUNT(*) AS total FROM forest_animals \
                 WHERE age >= {pivot} GROUP BY name"
            ),
        );

        let mut expected: BTreeMap<String, i64> = BTreeMap::new();
        for &(name, age) in &animals {
            if age >= pivot {
                *expected.entry(NAMES[name].to_string()).or_default() += 1;
            }
        }
        let counts: BTreeMap<String, i64> = groups
            .iter()
            .filter_map(|row| Some((row.get("name")?.to_string(), row.get("total")?.as_int()?)))
            .collect();

        prop_assert_eq!(groups.len(), expected.len());
        prop_assert_eq!(counts, expected);
    }

    #[test]
    fn limit_returns_prefix(
        animals in animals_strategy(),
        limit in 0usize..50,
        offset in 0usize..10,
    ) {
        let tables = build_tables(&animals);
        let all = ids(&run(&tables, "SELECT id FROM forest_animals ORDER BY age, id"));
        let page = ids(&run(
            &tables,
            &format!(
                "SELECT id FROM forest_animals ORDER BY age, id \
                 LIMIT {limit} OFFSET {offset}"
            ),
        ));

        let expected: Vec<i64> = all.iter().copied().skip(offset).take(limit).collect();
        prop_assert_eq!(page, expected);
    }

    #[test]
    fn comparison_ignores_key_order(animals in animals_strategy()) {
        let tables = build_tables(&animals);
        let rows = run(&tables, "SELECT name, age FROM forest_animals");
        let swapped = run(&tables, "SELECT age, name FROM forest_animals");

        let strict = CompareOptions { order_sensitive: true };

        prop_assert!(compare_results(&rows, &rows));
        prop_assert!(compare_results(&rows, &swapped));
        prop_assert!(compare_results_with(&rows, &swapped, strict));
    }

    #[test]
    fn comparison_is_row_order_sensitive_when_strict(animals in animals_strategy()) {
        let tables = build_tables(&animals);
        let rows = run(&tables, "SELECT id FROM forest_animals");
        let reversed: Vec<ResultRow> = rows.iter().rev().cloned().collect();
        let strict = CompareOptions { order_sensitive: true };

        prop_assert!(compare_results(&rows, &reversed));
        // ids are unique, so any reversal of two or more rows is a different order
        prop_assert_eq!(compare_results_with(&rows, &reversed, strict), rows.len() < 2);
    }

    #[test]
    fn random_queries_do_not_panic(sql in query_fragment_strategy()) {
        let tables = build_tables(&[(0, 3), (1, 2)]);
        let _ = execute(&sql, &tables);
    }
}
