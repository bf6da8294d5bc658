use clap::{Parser, Subcommand};
use community_backend::config::Config;
use community_backend::helper::account_helpers;
use community_backend::models::db_operations::users_db_operations;
use community_backend::setup::db_setup;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial application setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    List,
    SetActive {
        #[arg(long)]
        username: String,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).expect("FATAL: Failed to load or parse configuration.");
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    match &cli.command {
        Commands::Db { action: DbAction::Setup } => setup_community_database(&config),
        Commands::User { action } => {
            let conn = match open_existing(&config) {
                Some(conn) => conn,
                None => return,
            };
            match action {
                UserAction::Create { username, email, password } => create_user(&conn, username, email, password),
                UserAction::List => list_users(&conn),
                UserAction::SetActive { username, active } => set_active(&conn, username, *active),
            }
        }
    }
}

fn setup_community_database(config: &Config) {
    let db_path = config.community_db_path();
    println!("\nSetting up community database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            eprintln!("❌ Error: Could not create database directory: {}", e);
            return;
        }
    }

    let mut conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Error: Could not create community database file: {}", e);
            return;
        }
    };
    match db_setup::setup_community_db(&mut conn) {
        Ok(_) => println!("✅ Community database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up community database: {}", e),
    }
}

fn open_existing(config: &Config) -> Option<Connection> {
    let db_path = config.community_db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Community database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    match Connection::open(&db_path) {
        Ok(conn) => Some(conn),
        Err(e) => {
            eprintln!("❌ Error opening community database: {}", e);
            None
        }
    }
}

fn create_user(conn: &Connection, username: &str, email: &str, password: &str) {
    match account_helpers::register(conn, username, email, password) {
        Ok(user) => println!("✅ User '{}' created with id {}.", user.username, user.id),
        Err(e) => eprintln!("❌ Error creating user: {}", e),
    }
}

fn list_users(conn: &Connection) {
    match users_db_operations::read_all_users(conn) {
        Ok(users) => {
            println!("Listing Users:");
            for user in users {
                let status = if user.is_active { "active" } else { "inactive" };
                println!("- [{}] {} <{}> ({})", user.id, user.username, user.email, status);
            }
        }
        Err(e) => eprintln!("❌ Error fetching users: {}", e),
    }
}

fn set_active(conn: &Connection, username: &str, active: bool) {
    let user = match users_db_operations::read_user_by_username(conn, username) {
        Ok(Some(user)) => user,
        Ok(None) => {
            eprintln!("❌ Error: No user named '{}' found.", username);
            return;
        }
        Err(e) => {
            eprintln!("❌ Error looking up user: {}", e);
            return;
        }
    };
    match users_db_operations::set_user_active(conn, user.id, active) {
        Ok(_) => println!("✅ User '{}' is now {}.", username, if active { "active" } else { "inactive" }),
        Err(e) => eprintln!("❌ Error updating user: {}", e),
    }
}
