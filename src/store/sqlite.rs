use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::{Store, StoreError, StoreResult};
use crate::models::{Field, Formula, Mathematician, MathematicianUpdate, User};
use crate::telemetry::{Color, Logger};

const LOGGER: Logger = Logger::new("Database", Color::Yellow);

#[derive(sqlx::FromRow)]
struct PersonRow {
    id: String,
    name: String,
    description: String,
    age: i64,
    alive: bool,
    born_bc: bool,
    birth_date: String,
    picture: String,
    field: String,
    main_interests: String,
    formula_id: String,
    formula_name: String,
    formula_description: String,
}

impl TryFrom<PersonRow> for Mathematician {
    type Error = StoreError;

    fn try_from(row: PersonRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::CorruptRecord {
            id: row.id.clone(),
            reason,
        };
        let age = u32::try_from(row.age).map_err(|e| corrupt(e.to_string()))?;
        let field = Field::from_str(&row.field).map_err(corrupt)?;
        let main_interests: Vec<String> =
            serde_json::from_str(&row.main_interests).map_err(|e| corrupt(e.to_string()))?;
        Ok(Mathematician {
            id: row.id,
            name: row.name,
            description: row.description,
            age,
            alive: row.alive,
            born_bc: row.born_bc,
            birth_date: row.birth_date,
            picture: row.picture,
            field,
            main_interests,
            best_known_for: Formula {
                id: row.formula_id,
                name: row.formula_name,
                description: row.formula_description,
            },
        })
    }
}

/// SQLite backed store. The pool is created on `connect` and dropped on `close`.
pub struct SqliteStore {
    url: String,
    pool: Mutex<Option<SqlitePool>>,
    connecting: tokio::sync::Mutex<()>,
}

impl SqliteStore {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            pool: Mutex::new(None),
            connecting: tokio::sync::Mutex::new(()),
        }
    }

    fn pool(&self) -> StoreResult<SqlitePool> {
        self.pool.lock().unwrap().clone().ok_or(StoreError::NotConnected)
    }

    /// Insert or replace `people` in one transaction.
    pub async fn import_mathematicians(&self, people: &[Mathematician]) -> StoreResult<usize> {
        let pool = self.pool()?;
        let mut tx = pool.begin().await?;
        for person in people {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO people (id, name, description, age, alive, born_bc, birth_date,
                    picture, field, main_interests, formula_id, formula_name, formula_description)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
            )
            .bind(&person.id)
            .bind(&person.name)
            .bind(&person.description)
            .bind(i64::from(person.age))
            .bind(person.alive)
            .bind(person.born_bc)
            .bind(&person.birth_date)
            .bind(&person.picture)
            .bind(person.field.as_str())
            .bind(serde_json::to_string(&person.main_interests)?)
            .bind(&person.best_known_for.id)
            .bind(&person.best_known_for.name)
            .bind(&person.best_known_for.description)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(people.len())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn connect(&self) -> StoreResult<()> {
        let _guard = self.connecting.lock().await;
        if self.is_connected() {
            return Ok(());
        }
        let options = SqliteConnectOptions::from_str(&self.url)?.create_if_missing(true);
        // an in-memory database lives exactly as long as its only connection
        let pool_options = if self.url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };
        let pool = pool_options.connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        *self.pool.lock().unwrap() = Some(pool);
        LOGGER.log("Database connected");
        Ok(())
    }

    async fn close(&self) {
        let pool = self.pool.lock().unwrap().take();
        if let Some(pool) = pool {
            pool.close().await;
            LOGGER.log("Database closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.pool.lock().unwrap().is_some()
    }

    async fn mathematicians(&self) -> StoreResult<Vec<Mathematician>> {
        let rows = sqlx::query_as::<_, PersonRow>(
            r#"
            SELECT id, name, description, age, alive, born_bc, birth_date, picture, field,
                main_interests, formula_id, formula_name, formula_description
            FROM people ORDER BY name
            "#,
        )
        .fetch_all(&self.pool()?)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match Mathematician::try_from(row) {
                Ok(person) => Some(person),
                Err(e) => {
                    LOGGER.warn(format!("Skipping {e}"));
                    None
                }
            })
            .collect())
    }

    async fn users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, (String, String, Option<String>)>(
            r#"
            SELECT username, password_hash, image FROM users
            "#,
        )
        .fetch_all(&self.pool()?)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(username, password_hash, image)| User {
                username,
                password_hash,
                image,
            })
            .collect())
    }

    async fn update_mathematician(
        &self,
        id: &str,
        update: &MathematicianUpdate,
    ) -> StoreResult<bool> {
        let main_interests = update
            .main_interests
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let result = sqlx::query(
            r#"
            UPDATE people SET
                age = COALESCE(?1, age),
                alive = COALESCE(?2, alive),
                field = COALESCE(?3, field),
                main_interests = COALESCE(?4, main_interests)
            WHERE id = ?5
            "#,
        )
        .bind(update.age.map(i64::from))
        .bind(update.alive)
        .bind(update.field.map(|field| field.as_str()))
        .bind(main_interests)
        .bind(id)
        .execute(&self.pool()?)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, image) VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.image)
        .execute(&self.pool()?)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::mathematician;

    async fn file_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("math.db").display());
        let store = SqliteStore::new(&url);
        store.connect().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn import_then_read_back() {
        let (_dir, store) = file_store().await;
        let euler = mathematician("euler", "Leonhard Euler", "Euler's Identity");
        let gauss = mathematician("gauss", "Carl Friedrich Gauss", "Gauss's law");
        store
            .import_mathematicians(&[gauss.clone(), euler.clone()])
            .await
            .unwrap();

        let people = store.mathematicians().await.unwrap();
        assert_eq!(people, vec![gauss, euler]);
    }

    #[tokio::test]
    async fn partial_update_keeps_other_columns() {
        let (_dir, store) = file_store().await;
        let euler = mathematician("euler", "Leonhard Euler", "Euler's Identity");
        store.import_mathematicians(&[euler.clone()]).await.unwrap();

        let update = MathematicianUpdate {
            alive: Some(true),
            main_interests: Some(vec!["Graphs".to_owned(), "Series".to_owned()]),
            ..Default::default()
        };
        assert!(store.update_mathematician("euler", &update).await.unwrap());
        assert!(!store.update_mathematician("nobody", &update).await.unwrap());

        let person = store.mathematicians().await.unwrap().remove(0);
        assert!(person.alive);
        assert_eq!(person.main_interests, vec!["Graphs", "Series"]);
        assert_eq!(person.age, euler.age);
        assert_eq!(person.field, euler.field);
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let (_dir, store) = file_store().await;
        let user = User {
            username: "ada".to_owned(),
            password_hash: "hash".to_owned(),
            image: None,
        };
        store.insert_user(&user).await.unwrap();
        assert!(store.insert_user(&user).await.is_err());
        assert_eq!(store.users().await.unwrap(), vec![user]);
    }

    #[tokio::test]
    async fn closed_store_refuses_queries() {
        let (_dir, store) = file_store().await;
        store.close().await;
        assert!(matches!(store.users().await, Err(StoreError::NotConnected)));
        store.connect().await.unwrap();
        assert!(store.users().await.unwrap().is_empty());
    }
}
