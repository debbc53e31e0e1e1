use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{NotificationKind, PostsEngine, RestPostGateway, DEFAULT_PAGE_SIZE};
use shared::domain::PostId;

#[derive(Parser, Debug)]
struct Cli {
    /// Base URL of the posts resource.
    #[arg(long, default_value = "https://jsonplaceholder.typicode.com")]
    api_url: String,
    /// How many posts of the remote baseline to keep.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the baseline and print it, optionally narrowed by a query.
    List {
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Create a post and print the stored record.
    Create { title: String, body: String },
    /// Replace the title and body of an existing post.
    Update { id: i64, title: String, body: String },
    /// Delete a post after server acknowledgement.
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();
    let api_url = std::env::var("POSTS_API_URL").unwrap_or(cli.api_url);

    let gateway = Arc::new(RestPostGateway::new(api_url));
    let engine = PostsEngine::with_page_size(gateway, cli.page_size);

    match cli.command {
        Command::List { query } => {
            engine.refresh().await?;
            engine.set_search_query(query).await;
            let view = engine.visible_posts().await;
            println!("showing {} of {} posts", view.visible(), view.total);
            for post in &view.posts {
                println!("#{} {}", post.id.0, post.title);
            }
        }
        Command::Create { title, body } => {
            engine.refresh().await?;
            let created = engine.submit_create(&title, &body).await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        Command::Update { id, title, body } => {
            engine.refresh().await?;
            engine.begin_edit(PostId(id)).await?;
            let updated = engine.submit_edit(&title, &body).await?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        Command::Delete { id } => {
            engine.refresh().await?;
            engine.request_delete(PostId(id)).await?;
            engine.confirm_delete().await?;
            println!("deleted post id={id}");
        }
    }

    if let Some(notification) = engine.session().await.notification {
        let tag = match notification.kind {
            NotificationKind::Success => "ok",
            NotificationKind::Error => "error",
        };
        println!("[{tag}] {}", notification.text);
    }

    Ok(())
}
