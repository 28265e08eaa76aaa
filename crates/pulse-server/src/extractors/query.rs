use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 1000;

/// `?limit=` de los endpoints de listados.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    /// Validates the limit; absent means the default of 20.
    pub fn resolve(&self) -> Result<usize, AppError> {
        match self.limit {
            None => Ok(DEFAULT_LIMIT),
            Some(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
            Some(limit) => Err(AppError::BadRequest(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {limit}"
            ))),
        }
    }
}

/// `?windowSecs=` de las estadisticas por endpoint.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct WindowQuery {
    #[serde(rename = "windowSecs")]
    pub window_secs: Option<u64>,
}

impl WindowQuery {
    /// Validates the window; absent means `default`.
    pub fn resolve(&self, default: Duration) -> Result<Duration, AppError> {
        match self.window_secs {
            None => Ok(default),
            Some(0) => Err(AppError::BadRequest(
                "windowSecs must be at least 1".to_string(),
            )),
            Some(secs) => Ok(Duration::from_secs(secs)),
        }
    }
}
