use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use url::Url;

use super::{Store, StoreError, StoreResult};
use crate::models::{Field, Formula, Mathematician, MathematicianUpdate, User};
use crate::telemetry::{Color, Logger};

const LOGGER: Logger = Logger::new("Remote", Color::Cyan);

const MATHEMATICIANS_DOCUMENT: &str = "mathematicians.json";
const FORMULAS_DOCUMENT: &str = "formulas.json";

#[derive(Deserialize)]
#[serde(untagged)]
enum FormulaRef {
    Embedded(Formula),
    Id(String),
}

#[derive(Deserialize)]
struct RawMathematician {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    age: u32,
    alive: bool,
    #[serde(default)]
    born_bc: bool,
    #[serde(default)]
    birth_date: String,
    #[serde(default)]
    picture: String,
    field: Field,
    #[serde(default)]
    main_interests: Vec<String>,
    best_known_for: FormulaRef,
}

/// Join mathematicians with the formulas their `best_known_for` ids point at.
fn resolve(raw: Vec<RawMathematician>, formulas: Vec<Formula>) -> Vec<Mathematician> {
    let formulas: HashMap<String, Formula> = formulas
        .into_iter()
        .map(|formula| (formula.id.clone(), formula))
        .collect();

    raw.into_iter()
        .filter_map(|person| {
            let best_known_for = match person.best_known_for {
                FormulaRef::Embedded(formula) => formula,
                FormulaRef::Id(id) => match formulas.get(&id) {
                    Some(formula) => formula.clone(),
                    None => {
                        LOGGER.warn(format!(
                            "Dropping {}: unknown formula {id}",
                            person.name
                        ));
                        return None;
                    }
                },
            };
            Some(Mathematician {
                id: person.id,
                name: person.name,
                description: person.description,
                age: person.age,
                alive: person.alive,
                born_bc: person.born_bc,
                birth_date: person.birth_date,
                picture: person.picture,
                field: person.field,
                main_interests: person.main_interests,
                best_known_for,
            })
        })
        .collect()
}

/// Read the dataset from a directory holding `mathematicians.json` and `formulas.json`.
pub fn load_dataset_dir(dir: &Path) -> StoreResult<Vec<Mathematician>> {
    fn read<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
    let raw = read(&dir.join(MATHEMATICIANS_DOCUMENT))?;
    let formulas = read(&dir.join(FORMULAS_DOCUMENT))?;
    Ok(resolve(raw, formulas))
}

/// Reads the two static JSON documents of the mathematician API.
///
/// The API is read-only: edits and signups are kept in process memory and
/// layered over every fetch.
pub struct RemoteStore {
    base: Url,
    client: reqwest::Client,
    connected: AtomicBool,
    edits: Mutex<HashMap<String, MathematicianUpdate>>,
    users: Mutex<Vec<User>>,
}

impl RemoteStore {
    pub fn new(base: &str, cert_path: Option<&Path>) -> StoreResult<Self> {
        // without the trailing slash `join` would replace the last segment
        let base = if base.ends_with('/') {
            Url::parse(base)?
        } else {
            Url::parse(&format!("{base}/"))?
        };
        let mut builder = reqwest::Client::builder();
        if let Some(path) = cert_path {
            let pem = std::fs::read(path)?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }
        Ok(Self {
            base,
            client: builder.build()?,
            connected: AtomicBool::new(false),
            edits: Mutex::new(HashMap::new()),
            users: Mutex::new(Vec::new()),
        })
    }

    async fn fetch_json<T: DeserializeOwned>(&self, document: &str) -> StoreResult<T> {
        let url = self.base.join(document)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Fetch and resolve the dataset as published, without local edits.
    pub async fn fetch_dataset(&self) -> StoreResult<Vec<Mathematician>> {
        let raw = self.fetch_json(MATHEMATICIANS_DOCUMENT).await?;
        let formulas = self.fetch_json(FORMULAS_DOCUMENT).await?;
        Ok(resolve(raw, formulas))
    }

    fn ensure_connected(&self) -> StoreResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }
}

#[async_trait]
impl Store for RemoteStore {
    async fn connect(&self) -> StoreResult<()> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            LOGGER.log(format!("Using {}", self.base));
        }
        Ok(())
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn mathematicians(&self) -> StoreResult<Vec<Mathematician>> {
        self.ensure_connected()?;
        let mut people = self.fetch_dataset().await?;
        let edits = self.edits.lock().unwrap();
        for person in people.iter_mut() {
            if let Some(update) = edits.get(&person.id) {
                person.apply(update);
            }
        }
        Ok(people)
    }

    async fn users(&self) -> StoreResult<Vec<User>> {
        self.ensure_connected()?;
        Ok(self.users.lock().unwrap().clone())
    }

    async fn update_mathematician(
        &self,
        id: &str,
        update: &MathematicianUpdate,
    ) -> StoreResult<bool> {
        self.ensure_connected()?;
        let known = self
            .fetch_dataset()
            .await?
            .iter()
            .any(|person| person.id == id);
        if known {
            self.edits
                .lock()
                .unwrap()
                .entry(id.to_owned())
                .or_default()
                .merge(update);
        }
        Ok(known)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.ensure_connected()?;
        self.users.lock().unwrap().push(user.clone());
        Ok(())
    }
}
