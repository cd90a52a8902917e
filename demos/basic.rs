use mdtc::{
    Composite, Fields, Frozen, HasModelSpec, Model, ModelSpec, Plain, Record, Registry, Schema,
    Sections,
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug)]
struct AppConfig {
    server: Server,
    database: Database,
}

impl Composite for AppConfig {
    fn compose(sections: &mut Sections<'_>) -> Option<Self> {
        let server = sections.required("server");
        let database = sections.required("database");
        Some(Self {
            server: server?,
            database: database?,
        })
    }
}

#[derive(Debug)]
struct Server {
    host: String,
    port: u16,
    tags: Vec<String>,
    tls: Option<Tls>,
}

impl HasModelSpec for Server {
    const SPEC: ModelSpec = ModelSpec::new("server", "app.server");
}

impl Model for Server {
    type Strategy = Plain;
}

impl Record for Server {
    fn read(fields: &mut Fields<'_>) -> Option<Self> {
        let host = fields.required_with("host", |host: String| {
            if host.trim().is_empty() {
                Err("must not be blank")
            } else {
                Ok(host)
            }
        });
        let port = fields.required("port");
        let tags = fields.or_default("tags");
        let tls = fields.optional_record("tls");
        Some(Self {
            host: host?,
            port: port?,
            tags: tags?,
            tls: tls?,
        })
    }
}

#[derive(Debug)]
#[allow(dead_code)]
struct Tls {
    cert: String,
    verify: bool,
}

impl Record for Tls {
    fn read(fields: &mut Fields<'_>) -> Option<Self> {
        let cert = fields.required("cert");
        let verify = fields.or_default("verify");
        Some(Self {
            cert: cert?,
            verify: verify?,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
struct Database {
    #[validate(length(min = 1))]
    url: String,
    #[validate(range(min = 1, max = 100))]
    pool_size: u32,
}

impl HasModelSpec for Database {
    const SPEC: ModelSpec = ModelSpec::new("database", "app.database");
}

impl Model for Database {
    type Strategy = Schema;
}

fn main() -> Result<(), mdtc::ConfigError> {
    let registry = Registry::new();

    let config = registry.get_or_create::<AppConfig>(std::path::Path::new("demos/app.toml"))?;
    let again = registry.get_or_create::<AppConfig>(std::path::Path::new("demos/app.toml"))?;

    println!(
        "Server: {}:{} tags={:?} tls={}",
        config.server.host,
        config.server.port,
        config.server.tags,
        config.server.tls.is_some()
    );
    println!(
        "Database: {} (pool={})",
        config.database.url, config.database.pool_size
    );
    println!("Same instance: {}", Frozen::ptr_eq(&config, &again));

    for section in config.sections() {
        println!("  {} <- [{}]", section.field, section.key);
    }

    Ok(())
}
