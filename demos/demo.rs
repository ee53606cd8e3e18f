use forest_sql::*;

fn forest() -> Result<TableSet> {
    let animals = Table::with_rows(
        "forest_animals",
        vec!["id".into(), "name".into(), "species".into(), "age".into()],
        vec![
            vec![Value::Int(1), Value::from("Ollie"), Value::from("Owl"), Value::Int(3)],
            vec![Value::Int(2), Value::from("Felix"), Value::from("Fox"), Value::Int(2)],
            vec![Value::Int(3), Value::from("Bella"), Value::from("Bear"), Value::Int(5)],
            vec![Value::Int(4), Value::from("Sammy"), Value::from("Squirrel"), Value::Int(1)],
            // Daisy's age is unknown
            vec![Value::Int(5), Value::from("Daisy"), Value::from("Deer"), Value::Null],
        ],
    )?;
    let habitats = Table::with_rows(
        "animal_habitats",
        vec!["id".into(), "animal_id".into(), "location".into()],
        vec![
            vec![Value::Int(1), Value::Int(1), Value::from("Tall Oak")],
            vec![Value::Int(2), Value::Int(2), Value::from("Berry Bush")],
            vec![Value::Int(3), Value::Int(3), Value::from("Cave")],
        ],
    )?;
    TableSet::from_tables([animals, habitats])
}

fn print_rows(rows: &[ResultRow]) {
    let Some(first) = rows.first() else {
        println!("(no rows)\n");
        return;
    };

    let header: Vec<String> = first.columns().map(|c| format!("{:<12}", c)).collect();
    println!("{}", header.join(" "));
    println!("{}", "-".repeat(13 * header.len()));
    for row in rows {
        let cells: Vec<String> = row.values().map(|v| format!("{:<12}", v)).collect();
        println!("{}", cells.join(" "));
    }
    println!();
}

fn main() -> Result<()> {
    println!("Forest SQL Demo\n");

    let tables = forest()?;
    println!("Tables: {}\n", tables.names().join(", "));

    for sql in [
        "SELECT name, age FROM forest_animals WHERE age > 2 ORDER BY age DESC",
        "SELECT a.name, h.location FROM forest_animals a JOIN animal_habitats h ON a.id = h.animal_id",
        "SELECT COUNT(*) AS animals, AVG(age) AS avg_age FROM forest_animals",
    ] {
        println!("> {}", sql);
        print_rows(&tables.query(sql)?);
    }

    // Errors are values, not panics
    let sql = "SELECT species, COUNT(*) FROM forest_animals GROUP BY species HAVING COUNT(*) > 1";
    println!("> {}", sql);
    if let Err(err) = tables.query(sql) {
        println!("{}: {}\n", err.kind(), err);
    }

    // Grading
    let verdict = check_answer(
        "SELECT name FROM forest_animals WHERE species = 'Owl'",
        "SELECT name FROM forest_animals WHERE id = 1",
        &tables,
        &EngineConfig::default(),
    );
    println!("Grade: passed={} message={}", verdict.passed, verdict.message);

    Ok(())
}
