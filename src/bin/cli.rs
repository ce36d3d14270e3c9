use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use mathbase::models::{Mathematician, User};
use mathbase::store::{load_dataset_dir, RemoteStore, SqliteStore, Store};
use mathbase::telemetry::init_tracing;
use serde::Serialize;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Database URL, e.g. sqlite:math.db
    db_uri: String,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the dataset from a directory or an http(s) base URL
    Import { source: String },
    /// Export people and users as CSV
    Export { path: PathBuf },
}

#[derive(Serialize)]
struct PersonRecord<'a> {
    id: &'a str,
    name: &'a str,
    age: u32,
    alive: bool,
    born_bc: bool,
    birth_date: &'a str,
    field: &'a str,
    main_interests: String,
    best_known_for: &'a str,
}

impl<'a> From<&'a Mathematician> for PersonRecord<'a> {
    fn from(person: &'a Mathematician) -> Self {
        PersonRecord {
            id: &person.id,
            name: &person.name,
            age: person.age,
            alive: person.alive,
            born_bc: person.born_bc,
            birth_date: &person.birth_date,
            field: person.field.as_str(),
            main_interests: person.main_interests.join(";"),
            best_known_for: &person.best_known_for.name,
        }
    }
}

#[derive(Serialize)]
struct UserRecord<'a> {
    username: &'a str,
    image: Option<&'a str>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let store = SqliteStore::new(&cli.db_uri);
    store.connect().await.context("Cannot connect to DB")?;
    let result = match cli.command {
        Commands::Import { source } => import_data(&store, &source).await.context("Cannot import"),
        Commands::Export { path } => export_data(&store, &path).await.context("Cannot export"),
    };
    store.close().await;
    result
}

fn write_to<T: Serialize>(path: PathBuf, data: impl IntoIterator<Item = T>) -> anyhow::Result<()> {
    let file = std::fs::File::create(&path)?;
    let mut wtr = csv::Writer::from_writer(file);
    for line in data {
        wtr.serialize(line)?;
    }
    wtr.flush()?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

async fn import_data(store: &SqliteStore, source: &str) -> anyhow::Result<()> {
    let people = if source.starts_with("http://") || source.starts_with("https://") {
        RemoteStore::new(source, None)?.fetch_dataset().await?
    } else {
        load_dataset_dir(Path::new(source))?
    };
    let count = store.import_mathematicians(&people).await?;
    tracing::info!("Imported {count} mathematicians");
    Ok(())
}

async fn export_data(store: &SqliteStore, path: &Path) -> anyhow::Result<()> {
    let people = store.mathematicians().await?;
    let users: Vec<User> = store.users().await?;
    if !path.exists() {
        std::fs::create_dir_all(path)?
    }
    write_to(path.join("people.csv"), people.iter().map(PersonRecord::from))?;
    write_to(
        path.join("users.csv"),
        users.iter().map(|user| UserRecord {
            username: &user.username,
            image: user.image.as_deref(),
        }),
    )?;
    Ok(())
}
