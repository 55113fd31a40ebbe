use std::env;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use backoffice::{
    auth::password,
    config::AppConfig,
    db, init_tracing,
    models::{NewUser, UserRole},
    store::{PgStore, SlotStore, UserStore},
};

const USAGE: &str = "Usage:
  maintenance sweep-slots
  maintenance create-user <email> <name> <admin|agent> [password]";

const GENERATED_PASSWORD_LENGTH: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("sweep-slots") => sweep_slots().await?,
        Some("create-user") => create_user(args.collect()).await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn open_store() -> Result<PgStore> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded backoffice configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool)?;
    Ok(PgStore::new(pool))
}

async fn sweep_slots() -> Result<()> {
    let store = open_store()?;
    let removed = store
        .delete_expired(Utc::now())
        .await
        .context("failed to sweep expired slots")?;
    println!("Removed {} expired slots.", removed.len());
    Ok(())
}

async fn create_user(args: Vec<String>) -> Result<()> {
    let [email, name, role, rest @ ..] = args.as_slice() else {
        bail!("{USAGE}");
    };
    let role: UserRole = role.parse().map_err(|err: String| anyhow!(err))?;
    let (password, generated) = match rest.first() {
        Some(password) => (password.clone(), false),
        None => (
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(GENERATED_PASSWORD_LENGTH)
                .map(char::from)
                .collect::<String>(),
            true,
        ),
    };

    let store = open_store()?;
    let user = store
        .insert_user(NewUser {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            name: name.trim().to_string(),
            role,
            phone: None,
            password_hash: password::hash_password(&password)?,
        })
        .await
        .context("failed to create user")?;

    println!("Created {} user {} ({}).", user.role, user.email, user.id);
    if generated {
        println!("Generated password: {password}");
    }
    Ok(())
}
