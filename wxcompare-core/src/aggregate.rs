use futures::future::join_all;
use tracing::{info, warn};

use crate::{
    error::WeatherError,
    model::{WeatherReport, WeatherRequest},
    provider::WeatherProvider,
};

/// What one provider produced for one request.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source: String,
    pub result: Result<WeatherReport, WeatherError>,
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Query every provider concurrently and wait for all of them.
///
/// Each call is bounded by `request.timeout`; a call that runs out of time
/// counts as `SourceUnavailable`. Outcomes come back in provider order and a
/// failing provider never affects the others.
pub async fn fetch_reports(
    providers: &[Box<dyn WeatherProvider>],
    request: &WeatherRequest,
) -> Vec<SourceOutcome> {
    let calls = providers.iter().map(|provider| async move {
        let source = provider.id().as_str().to_string();

        let result = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, provider.get_weather(request))
                .await
                .unwrap_or_else(|_| {
                    Err(WeatherError::unavailable(
                        &source,
                        format!("no response within {:.1}s", limit.as_secs_f64()),
                    ))
                }),
            None => provider.get_weather(request).await,
        };

        match &result {
            Ok(_) => info!(%source, "source responded"),
            Err(err) => warn!(%source, error = %err, "source omitted"),
        }

        SourceOutcome { source, result }
    });

    join_all(calls).await
}
