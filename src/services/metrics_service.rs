use std::collections::HashMap;
use statsd::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct MetricsService {
    client: Arc<Client>,
}

impl MetricsService {
    pub fn new(host: &str, port: u16, prefix: &str) -> anyhow::Result<Self> {
        let client = Client::new(format!("{}:{}", host, port), prefix)
            .map_err(|e| anyhow::anyhow!("Failed to create statsd client: {:?}", e))?;
        Ok(Self { client: Arc::new(client) })
    }

    pub fn increment(&self, metric: &str, tags: Option<HashMap<String, String>>) {
        self.client.incr(&tagged(metric, tags));
    }

    pub fn gauge(&self, metric: &str, value: f64, tags: Option<HashMap<String, String>>) {
        self.client.gauge(&tagged(metric, tags), value);
    }

    pub fn timing(&self, metric: &str, duration: std::time::Duration, tags: Option<HashMap<String, String>>) {
        self.client.timer(&tagged(metric, tags), duration.as_millis() as f64);
    }
}

/// Builds `metric#k=v,k=v`. Tags are sorted so the same tag set always yields
/// the same series name.
fn tagged(metric: &str, tags: Option<HashMap<String, String>>) -> String {
    match tags {
        Some(tags) if !tags.is_empty() => {
            let mut pairs = tags
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<String>>();
            pairs.sort();
            format!("{}#{}", metric, pairs.join(","))
        }
        _ => metric.to_string(),
    }
}

pub fn endpoint_tags(endpoint: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    tags.insert("endpoint".to_string(), endpoint.to_string());
    tags
}
