use std::time::Duration;

use hs_fetch::{Api, ApiConfig, RefreshError, RequestOptions};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Todo {
    id: u64,
    title: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::var("HS_FETCH_BASE_URL")
        .unwrap_or_else(|_| "https://jsonplaceholder.typicode.com".to_owned());
    let token = std::env::var("HS_FETCH_TOKEN").unwrap_or_default();

    let api = Api::new(
        ApiConfig::new(base_url)
            .static_token(token)
            .on_refresh_token(|| async {
                Err(RefreshError::new("this demo has no refresh endpoint"))
            })
            .on_refresh_token_failed(|| eprintln!("token refresh failed, please sign in again")),
    );

    let todos: Vec<Todo> = api
        .get(
            RequestOptions::new("/todos")
                .query("userId", 1)
                .retry_count(2)
                .retry_delay(Duration::from_millis(500))
                .on_error(|err| eprintln!("attempt failed: {err}")),
        )
        .await?
        .into_json()?;

    for todo in todos.iter().take(5) {
        println!("{} {}", todo.id, todo.title);
    }

    Ok(())
}
