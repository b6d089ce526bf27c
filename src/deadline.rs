use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;

use crate::error::FormError;

/// Whether attendance may still be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Open,
    Closed { cutoff: DateTime<FixedOffset> },
}

impl Window {
    pub fn ensure_open(self) -> Result<(), FormError> {
        match self {
            Window::Open => Ok(()),
            Window::Closed { cutoff } => Err(FormError::DeadlinePassed {
                deadline: format_cutoff(&cutoff),
            }),
        }
    }
}

pub fn format_cutoff(cutoff: &DateTime<FixedOffset>) -> String {
    cutoff.format("%B %-d, %Y").to_string()
}

#[rocket::async_trait]
pub trait Clock: Send + Sync {
    async fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

#[rocket::async_trait]
impl Clock for SystemClock {
    async fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Deserialize)]
struct WorldTime {
    datetime: DateTime<FixedOffset>,
}

/// Asks a world-time API for the current time, using the local clock when
/// the API cannot be reached or answers with something unexpected.
pub struct WorldTimeClock {
    client: reqwest::Client,
    url: String,
}

impl WorldTimeClock {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(WorldTimeClock { client, url: url.into() })
    }

    async fn fetch(&self) -> reqwest::Result<DateTime<Utc>> {
        let body: WorldTime = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.datetime.with_timezone(&Utc))
    }
}

#[rocket::async_trait]
impl Clock for WorldTimeClock {
    async fn now(&self) -> DateTime<Utc> {
        match self.fetch().await {
            Ok(now) => now,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "time source unavailable, using local clock");
                Utc::now()
            }
        }
    }
}

pub struct Deadline {
    cutoff: DateTime<FixedOffset>,
    clock: Box<dyn Clock>,
}

impl Deadline {
    pub fn new(cutoff: DateTime<FixedOffset>, clock: Box<dyn Clock>) -> Self {
        Deadline { cutoff, clock }
    }

    pub fn formatted(&self) -> String {
        format_cutoff(&self.cutoff)
    }

    pub async fn window(&self) -> Window {
        let now = self.clock.now().await;
        if now < self.cutoff {
            Window::Open
        } else {
            tracing::debug!(%now, cutoff = %self.cutoff, "deadline passed");
            Window::Closed { cutoff: self.cutoff }
        }
    }
}
