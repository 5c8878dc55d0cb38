use anyhow::Result;

use crate::auth;
use crate::config::AppConfig;

/// Sign a bearer token for the given user id and print it to stdout.
/// Meant for operators and local testing; the token is only as good as
/// the JWT_SECRET the server was started with.
pub fn issue_token(user_id: i32, ttl: u64) -> Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    let token = auth::issue_token(user_id, &config.jwt_secret, ttl)?;
    println!("{token}");

    Ok(())
}
