// src/client/main.rs

use retailease::config::init_config;
use retailease::crypto::key_store::KeyPair;
use retailease::errors::{LicenseError, LicenseResult};
use retailease::server::database::{Database, KeyPairRow};

/// Operator CLI for managing the RSA signing key pair used to sign license
/// codes. Talks to the same database the server uses, so a key generated
/// here is immediately picked up by `/license/validate` on the next request.
///
/// Usage:
///   retailease_keytool generate [--bits N] [--name NAME]
///   retailease_keytool show-active
#[tokio::main]
async fn main() -> LicenseResult<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("");

    let config = init_config()?;
    let db = Database::new().await?;

    match command {
        "generate" => {
            let bits = flag_value(&args, "--bits")
                .map(|v| v.parse::<usize>().map_err(|_| LicenseError::ConfigError("--bits must be an integer".into())))
                .transpose()?
                .unwrap_or(config.license.key_bits as usize);
            let name = flag_value(&args, "--name").unwrap_or_else(|| "operator-generated".to_string());

            let kp = KeyPair::generate(name, bits)?;
            let row = KeyPairRow {
                id: kp.id.clone(),
                name: kp.name.clone(),
                private_key_pem: kp.private_key_pem.clone(),
                public_key_pem: kp.public_key_pem.clone(),
                is_active: kp.is_active,
                created_at: kp.created_at,
            };
            db.insert_key_pair(&row).await?;

            println!("generated key pair {} ({} bits)", kp.id, bits);
            println!("{}", kp.public_key_pem);
        }
        "show-active" => match db.get_active_key_pair().await? {
            Some(row) => {
                println!("active key pair: {} ({})", row.id, row.name);
                println!("{}", row.public_key_pem);
            }
            None => println!("no active key pair; the server will generate one on next startup"),
        },
        other => {
            eprintln!("unknown command: {other:?}");
            eprintln!("usage: retailease_keytool <generate|show-active> [--bits N] [--name NAME]");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}
