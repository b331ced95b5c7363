use secrecy::SecretString;

pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        jwt_secret: SecretString,
        cors_origin: Option<String>,
        access_ttl: Option<i64>,
        refresh_ttl: Option<i64>,
        code_ttl: Option<i64>,
    },
}
