//! Process configuration, read once from the environment at startup

use std::path::PathBuf;

use todo_core::task::MongoConfig;
use todo_core::StorageConfig;

const DEFAULT_PORT: u16 = 3500;
const DEFAULT_DATA_FILE: &str = ".todo-data/data.json";
const DEFAULT_DB_NAME: &str = "todo";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub storage: StorageConfig,
}

fn parse_flag(raw: Option<String>, default: bool) -> bool {
    match raw {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        None => default,
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| non_empty(lookup(name));

        let port = match var("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid PORT value {:?}", raw);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let environment = var("NODE_ENV")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let data_file = var("TODO_DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));

        let storage = if parse_flag(lookup("USE_MONGODB"), false) {
            let mongo = var("MONGO_CONN_STR").map(|uri| {
                let mut mongo = MongoConfig::new(uri).with_database(
                    var("MONGO_DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
                );
                if parse_flag(lookup("USE_DB_AUTH"), false) {
                    if let (Some(user), Some(pass)) =
                        (var("MONGO_USERNAME"), var("MONGO_PASSWORD"))
                    {
                        mongo = mongo.with_credentials(user, pass);
                    }
                }
                mongo
            });
            StorageConfig::mongo(data_file, mongo)
        } else {
            StorageConfig::file(data_file)
        };

        Self {
            port,
            environment,
            storage,
        }
    }
}
