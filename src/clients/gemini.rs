use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GeminiConfig;

const REVIEW_PROMPT: &str = r#"You are a senior software engineer with a decade of production experience. Analyze the code below and provide:

1. **Potential Bugs**: defects that could break in production
2. **Code Smells**: bad practices or design problems
3. **Performance Improvements**: concrete optimizations
4. **Improved Code**: a cleaned-up version of the snippet
5. **Quality Score**: a 0-100 rating with justification

Code to analyze:
```
{code}
```

Respond in Markdown using exactly these sections:
## Potential Bugs
- [list of bugs, or "No bugs detected"]

## Code Smells
- [list of smells, or "Clean code"]

## Performance Improvements
- [list of improvements, or "Already optimal"]

## Improved Code
```
[improved version of the code]
```

## Quality Score: [0-100]
[two or three lines justifying the score]

Be specific, constructive and professional."#;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: Option<String>,
    response: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(config.request_timeout_seconds)))
            .user_agent(concat!("revu/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model for a markdown review of a code snippet.
    pub async fn analyze_code(&self, code: &str, api_key: &str) -> Result<String> {
        let url = format!("{}/generate", self.base_url);

        let payload = GenerateRequest {
            model: &self.model,
            prompt: REVIEW_PROMPT.replace("{code}", code),
            // Low temperature keeps reviews consistent between runs.
            temperature: 0.3,
            max_tokens: 1000,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Gemini API error: {} - {}", status, body));
        }

        let response: GenerateResponse = response.json().await?;

        response
            .text
            .or(response.response)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Gemini API returned an empty analysis"))
    }
}
