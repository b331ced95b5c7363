use crate::cli::actions::Action;
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?,
        jwt_secret: matches
            .get_one("jwt-secret")
            .map(|s: &String| SecretString::from(s.to_string()))
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --jwt-secret"))?,
        cors_origin: matches
            .get_one("cors-origin")
            .map(|s: &String| s.to_string()),
        access_ttl: matches.get_one::<i64>("access-ttl").copied(),
        refresh_ttl: matches.get_one::<i64>("refresh-ttl").copied(),
        code_ttl: matches.get_one::<i64>("code-ttl").copied(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn test_handler_builds_server_action() -> Result<()> {
        let matches = commands::new().try_get_matches_from(vec![
            "portier",
            "--dsn",
            "postgres://localhost/portier",
            "--jwt-secret",
            "super-secret",
            "--cors-origin",
            "https://app.portier.dev",
            "--access-ttl",
            "600",
        ])?;

        let Action::Server {
            port,
            dsn,
            jwt_secret,
            cors_origin,
            access_ttl,
            refresh_ttl,
            code_ttl,
        } = handler(&matches)?;

        assert_eq!(port, 8080);
        assert_eq!(dsn, "postgres://localhost/portier");
        assert_eq!(jwt_secret.expose_secret(), "super-secret");
        assert_eq!(cors_origin.as_deref(), Some("https://app.portier.dev"));
        assert_eq!(access_ttl, Some(600));
        assert_eq!(refresh_ttl, None);
        assert_eq!(code_ttl, None);

        Ok(())
    }
}
