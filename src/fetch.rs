use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Blocking page fetcher. Any failure (unreachable host, bad status, timeout,
/// undecodable body) is logged and yields `None`; callers never see partial data.
pub struct Fetcher {
    client: reqwest::blocking::Client,
}

impl Fetcher {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self { client }
    }

    /// Fetch a URL and return its body as text.
    pub fn fetch_page(&self, url: &str) -> Option<String> {
        println!("Fetching: {}", url);
        let response = match self.client.get(url).send() {
            Ok(resp) => resp,
            Err(e) => {
                eprintln!("  Error fetching {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            eprintln!("  Bad status {} for {}", response.status(), url);
            return None;
        }

        match response.text() {
            Ok(text) => {
                println!("  Got {} characters", text.len());
                Some(text)
            }
            Err(e) => {
                eprintln!("  Error reading body from {}: {}", url, e);
                None
            }
        }
    }

    /// Fetch a URL and parse its body as JSON.
    pub fn fetch_json(&self, url: &str) -> Option<serde_json::Value> {
        let text = self.fetch_page(url)?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                eprintln!("  Error parsing JSON from {}: {}", url, e);
                None
            }
        }
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}
