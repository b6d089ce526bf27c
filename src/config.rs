use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use rocket::fairing::AdHoc;
use serde::Deserialize;

use crate::deadline::{Clock, Deadline, SystemClock, WorldTimeClock};

/// Application keys read from the active Rocket profile.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Last moment attendance can be confirmed.
    pub deadline: DateTime<FixedOffset>,
    /// World-time endpoint; the server clock is used when unset.
    #[serde(default)]
    pub time_api_url: Option<String>,
    #[serde(default = "default_time_api_timeout")]
    pub time_api_timeout_secs: u64,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: i64,
    /// Operator pages stay hidden unless set.
    #[serde(default)]
    pub admin_token: Option<String>,
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

fn default_time_api_timeout() -> u64 {
    5
}

fn default_session_ttl() -> i64 {
    86400
}

fn default_public_url() -> String {
    "http://localhost:8000".to_string()
}

impl AppConfig {
    pub fn deadline(&self) -> Result<Deadline, reqwest::Error> {
        let clock: Box<dyn Clock> = match &self.time_api_url {
            Some(url) => Box::new(WorldTimeClock::new(
                url.clone(),
                Duration::from_secs(self.time_api_timeout_secs),
            )?),
            None => Box::new(SystemClock),
        };
        Ok(Deadline::new(self.deadline, clock))
    }
}

/// Manages [`AppConfig`] and the [`Deadline`] built from it.
pub fn stage() -> AdHoc {
    AdHoc::on_ignite("App config", |rocket| async {
        rocket
            .attach(AdHoc::config::<AppConfig>())
            .attach(AdHoc::try_on_ignite("Deadline", |rocket| async {
                let built = rocket
                    .state::<AppConfig>()
                    .map(|config| (config.deadline.to_rfc3339(), config.deadline()));
                match built {
                    Some((cutoff, Ok(deadline))) => {
                        tracing::info!(%cutoff, "attendance deadline configured");
                        Ok(rocket.manage(deadline))
                    }
                    Some((_, Err(e))) => {
                        tracing::error!(error = %e, "could not build time source client");
                        Err(rocket)
                    }
                    None => Err(rocket),
                }
            }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::figment::providers::{Format, Toml};
    use rocket::figment::Figment;

    #[test]
    fn defaults_fill_optional_keys() {
        let figment = Figment::new().merge(("deadline", "2025-09-30T23:59:59-06:00"));
        let config: AppConfig = figment.extract().unwrap();
        assert_eq!(config.deadline.to_rfc3339(), "2025-09-30T23:59:59-06:00");
        assert_eq!(config.time_api_url, None);
        assert_eq!(config.time_api_timeout_secs, 5);
        assert_eq!(config.session_ttl_secs, 86400);
        assert_eq!(config.admin_token, None);
    }

    #[test]
    fn deadline_is_required() {
        let figment = Figment::new().merge(("public_url", "https://example.wedding"));
        assert!(figment.extract::<AppConfig>().is_err());
    }

    #[test]
    fn reads_the_shipped_profile() {
        let figment = Figment::new().merge(Toml::file("Rocket.toml").nested());
        let config: AppConfig = figment.extract().unwrap();
        assert!(config.time_api_url.is_some());
        assert!(config.deadline().is_ok());
    }
}
