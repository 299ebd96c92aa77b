use anyhow::Context;
use clap::{Parser, Subcommand};
use domain::presenter::{LoadState, Presenter, SubmissionWidget};
use domain::projection::{FlatEntry, TreeNode, DEFAULT_MOBILE_BREAKPOINT};
use domain::{Collection, Comment, NewComment, Projection};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "client", about = "Render and submit blog comments against a running server")]
struct Cli {
    #[arg(long, global = true, env = "QUILL_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    /// Simulated viewport width in pixels
    #[arg(long, global = true, default_value_t = 1024)]
    width: u32,

    #[arg(long, global = true, default_value_t = DEFAULT_MOBILE_BREAKPOINT)]
    breakpoint: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the comment thread
    List,
    /// Post a comment, or a reply with --parent-id
    Post {
        #[arg(long)]
        comment: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value_t = 0)]
        rating: u8,
        #[arg(long)]
        parent_id: Option<String>,
    },
}

struct Api {
    client: reqwest::Client,
    url: String,
}

impl Api {
    async fn fetch(&self) -> anyhow::Result<Collection> {
        let comments = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(comments)
    }

    async fn submit(&self, req: &NewComment) -> anyhow::Result<Comment> {
        let resp = self.client.post(&self.url).json(req).send().await?;
        if resp.status().is_success() {
            return Ok(resp.json().await?);
        }
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let message = body["error"].as_str().unwrap_or("unknown error");
        anyhow::bail!("{} ({})", message, status)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = Api {
        client: reqwest::Client::new(),
        url: format!("{}/api/comments", cli.base_url.trim_end_matches('/')),
    };
    let mut presenter = Presenter::new(cli.width, cli.breakpoint);

    match cli.command {
        Command::List => {
            load(&mut presenter, &api).await;
            render(&presenter);
        }
        Command::Post {
            comment,
            name,
            rating,
            parent_id,
        } => {
            let widget = match parent_id.as_deref() {
                Some(id) => {
                    presenter.replies.toggle(id);
                    presenter
                        .replies
                        .widget_mut(id)
                        .context("Reply form did not open")?
                }
                None => &mut presenter.composer,
            };
            widget.form.author = name.unwrap_or_default();
            widget.form.body = comment;
            widget.form.rating = rating;

            if submit(widget, &api).await {
                // 没有乐观插入，成功后重新拉取
                load(&mut presenter, &api).await;
                render(&presenter);
            }
        }
    }

    Ok(())
}

async fn load(presenter: &mut Presenter, api: &Api) {
    presenter.reload();
    render(presenter);
    presenter.on_loaded(api.fetch().await);
}

async fn submit(widget: &mut SubmissionWidget, api: &Api) -> bool {
    let req = match widget.begin() {
        Ok(req) => req,
        Err(e) => {
            println!("❌ {}", e);
            return false;
        }
    };
    match api.submit(&req).await {
        Ok(created) => {
            widget.succeed();
            println!("✅ Comment saved ({})", created.id);
            true
        }
        Err(e) => {
            widget.fail(format!("Comment not saved: {:#}", e));
            println!("❌ {}", widget.error().unwrap_or_default());
            false
        }
    }
}

fn render(presenter: &Presenter) {
    match &presenter.load {
        LoadState::Loading => println!("Loading comments..."),
        LoadState::Failed(message) => println!("{}", message),
        LoadState::Loaded(_) => match presenter.view() {
            Some(view) if view.is_empty() => println!("No comments yet."),
            Some(Projection::Tree(nodes)) => nodes.iter().for_each(print_node),
            Some(Projection::Flat(entries)) => entries.iter().for_each(print_entry),
            None => {}
        },
    }
}

fn stars(rating: u8) -> String {
    if rating == 0 {
        return String::new();
    }
    let rating = rating.min(domain::MAX_RATING) as usize;
    format!(
        " {}{}",
        "★".repeat(rating),
        "☆".repeat(domain::MAX_RATING as usize - rating)
    )
}

fn print_node(node: &TreeNode) {
    let indent = "    ".repeat(node.depth);
    let c = &node.comment;
    println!("{}{}{} · {}", indent, c.name, stars(c.rating), c.created_at);
    println!("{}  {}", indent, c.comment);
    println!("{}  ↳ reply with --parent-id {}", indent, c.id);
    node.replies.iter().for_each(print_node);
}

fn print_entry(entry: &FlatEntry) {
    let c = &entry.comment;
    println!("{}{} · {}", c.name, stars(c.rating), c.created_at);
    println!("  {}", c.comment);
}
