//! joinq CLI: operator interface to the join-request approval service.

use joinq::config::Config;
use joinq::config::secrets::ExposeSecret;
use joinq::db::Db;
use joinq::engine::{
    ApprovalWorker, BroadcastEngine, Intake, IntakeOutcome, LogProgress, QueueProcessor,
};
use joinq::model::message::Message;
use joinq::model::work::{JoinRequest, Status, WorkId};
use joinq::ratelimit::RateLimitCoordinator;
use joinq::recipients::RecipientSource;
use joinq::store::WorkStore;
use joinq::telemetry::{TelemetryConfig, TelemetryGuard, init_telemetry};
use joinq::transport::{JoinRequestFeed, StatusMessage, TelegramApi};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "joinq", about = "Join-request approval queue and broadcaster")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the queue processor and the join-request feed
    Serve,
    /// Queue a join request by hand
    Enqueue {
        group_id: i64,
        subject_id: i64,
        /// Subject display name
        #[arg(long, default_value = "")]
        name: String,
        /// Group display title
        #[arg(long, default_value = "")]
        group_title: String,
    },
    /// Work item operations
    Work {
        #[command(subcommand)]
        action: WorkAction,
    },
    /// Send one message to every approved member
    Broadcast {
        /// HTML text to send
        #[arg(long, conflicts_with_all = ["from_chat", "message_id"])]
        text: Option<String>,
        /// Chat holding the message to copy
        #[arg(long, requires = "message_id")]
        from_chat: Option<i64>,
        /// Id of the message to copy
        #[arg(long, requires = "from_chat")]
        message_id: Option<i64>,
        /// Chat where a live progress message is kept up to date
        #[arg(long)]
        status_chat: Option<i64>,
    },
    /// Approval statistics
    Stats,
    /// Export members as CSV
    Members,
}

#[derive(Subcommand)]
enum WorkAction {
    /// List work items
    List {
        /// Filter by status (pending, processed, failed)
        #[arg(long)]
        status: Option<String>,
        /// Maximum items to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show a work item
    Show {
        /// Work item ID (full UUID or prefix)
        id: String,
    },
}

/// Everything a command needs, connected once.
struct App {
    config: Config,
    db: Arc<Db>,
    api: Arc<TelegramApi>,
    limits: Arc<RateLimitCoordinator>,
}

impl App {
    async fn connect() -> anyhow::Result<Self> {
        let config = Config::from_env()?;
        let db = Db::connect(config.database_url.expose_secret()).await?;
        db.migrate().await?;
        let api = TelegramApi::new(config.api_url.clone(), config.bot_token.clone())?;
        Ok(Self {
            config,
            db: Arc::new(db),
            api: Arc::new(api),
            limits: Arc::new(RateLimitCoordinator::new()),
        })
    }

    fn telemetry(&self) -> anyhow::Result<TelemetryGuard> {
        Ok(init_telemetry(TelemetryConfig {
            endpoint: self.config.otel_endpoint.clone(),
            service_name: "joinq".to_string(),
            default_filter: self.config.log_level.clone(),
        })?)
    }

    fn worker(&self) -> anyhow::Result<ApprovalWorker> {
        let settings = self.config.settings()?;
        Ok(ApprovalWorker::new(
            self.api.clone(),
            self.db.clone(),
            self.limits.clone(),
            settings.notices,
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let app = App::connect().await?;
    let _guard = app.telemetry()?;

    match cli.command {
        Command::Serve => cmd_serve(&app).await,
        Command::Enqueue {
            group_id,
            subject_id,
            name,
            group_title,
        } => cmd_enqueue(&app, JoinRequest::new(group_id, subject_id, name, group_title)).await,
        Command::Work { action } => match action {
            WorkAction::List { status, limit } => cmd_work_list(&app.db, status, limit).await,
            WorkAction::Show { id } => cmd_work_show(&app.db, id).await,
        },
        Command::Broadcast {
            text,
            from_chat,
            message_id,
            status_chat,
        } => {
            let message = match (text, from_chat, message_id) {
                (Some(text), _, _) => Message::text(text),
                (None, Some(chat), Some(id)) => Message::copy_of(chat, id),
                _ => anyhow::bail!("provide --text, or --from-chat with --message-id"),
            };
            cmd_broadcast(&app, message, status_chat).await
        }
        Command::Stats => cmd_stats(&app.db).await,
        Command::Members => cmd_members(&app.db).await,
    }
}

async fn cmd_serve(app: &App) -> anyhow::Result<()> {
    let settings = app.config.settings()?;

    let me = app.api.get_me().await?;
    info!(bot_id = me.id, username = ?me.username, "bot started");

    let worker = app.worker()?;
    let processor = QueueProcessor::new(app.db.clone(), worker.clone(), settings.processor);
    let intake = Arc::new(Intake::new(app.db.clone(), worker));
    let feed = JoinRequestFeed::new(app.api.clone(), intake);

    let (p, f) = (processor.clone(), feed.clone());
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        p.shutdown();
        f.shutdown();
    });

    // Independent tasks: a stalled feed never holds up the queue, and vice versa.
    let processor_task = tokio::spawn(async move { processor.run().await });
    let feed_task = tokio::spawn(async move { feed.run().await });
    tokio::try_join!(processor_task, feed_task)?;

    info!("resources released");
    Ok(())
}

async fn cmd_enqueue(app: &App, request: JoinRequest) -> anyhow::Result<()> {
    let intake = Intake::new(app.db.clone(), app.worker()?);
    match intake.submit(request).await {
        IntakeOutcome::Queued(id) => println!("Queued: {id}"),
        IntakeOutcome::ApprovedDirectly => println!("Queue unavailable; approved directly"),
        IntakeOutcome::Dropped {
            enqueue_error,
            fallback_error,
        } => anyhow::bail!(
            "dropped: enqueue failed ({enqueue_error}), fallback failed ({fallback_error})"
        ),
    }
    Ok(())
}

async fn cmd_broadcast(
    app: &App,
    message: Message,
    status_chat: Option<i64>,
) -> anyhow::Result<()> {
    let settings = app.config.settings()?;
    let engine = BroadcastEngine::new(
        app.api.clone(),
        app.db.clone(),
        app.limits.clone(),
        settings.broadcast,
    );

    let summary = match status_chat {
        Some(chat_id) => {
            let status =
                StatusMessage::open(app.api.clone(), chat_id, "Preparing to broadcast...").await?;
            engine.run(&message, &status).await?
        }
        None => engine.run(&message, &LogProgress).await?,
    };

    println!("{summary}");
    Ok(())
}

async fn cmd_work_list(db: &Db, status: Option<String>, limit: i64) -> anyhow::Result<()> {
    let status: Option<Status> = match status {
        Some(s) => Some(s.parse().map_err(|_| anyhow::anyhow!("invalid status: {s}"))?),
        None => None,
    };

    let items = db.list_work_items(status, limit).await?;
    if items.is_empty() {
        println!("No work items found.");
        return Ok(());
    }

    println!(
        "{:<8}  {:<10}  {:<5}  {:<16}  {:<16}  ENQUEUED",
        "ID", "STATUS", "TRIES", "GROUP", "SUBJECT"
    );
    println!("{}", "-".repeat(90));
    for item in &items {
        println!(
            "{:<8}  {:<10}  {:<5}  {:<16}  {:<16}  {}",
            item.id,
            item.status,
            item.retry_count,
            item.request.group_id,
            item.request.subject_id,
            item.enqueued_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!("\n{} item(s)", items.len());
    for (status, count) in db.queue_counts().await? {
        println!("{status}: {count}");
    }
    Ok(())
}

async fn cmd_work_show(db: &Db, id_str: String) -> anyhow::Result<()> {
    let id = if id_str.len() < 36 {
        let items = db.list_work_items(None, 500).await?;
        let matches: Vec<_> = items
            .iter()
            .filter(|item| item.id.0.to_string().starts_with(&id_str))
            .collect();
        match matches.len() {
            0 => anyhow::bail!("no work item matching prefix '{id_str}'"),
            1 => matches[0].id,
            n => anyhow::bail!("{n} work items match prefix '{id_str}', be more specific"),
        }
    } else {
        WorkId(uuid::Uuid::parse_str(&id_str)?)
    };

    let item = db.get(id).await?;

    println!("ID:          {}", item.id.0);
    println!("Status:      {}", item.status);
    println!("Group:       {} ({})", item.request.group_title, item.request.group_id);
    println!("Subject:     {} ({})", item.request.subject_name, item.request.subject_id);
    println!("Retries:     {}", item.retry_count);
    println!("Enqueued:    {}", item.enqueued_at);
    if let Some(processed) = item.processed_at {
        println!("Processed:   {processed}");
    }
    if let Some(ref error) = item.last_error {
        println!("Last error:  {error}");
    }
    Ok(())
}

async fn cmd_stats(db: &Db) -> anyhow::Result<()> {
    let stats = db.stats_summary().await?;
    println!("Members active today:   {}", stats.members_active_today);
    println!("Approved today:         {}", stats.approved_today);
    println!("Approved last 7 days:   {}", stats.approved_last_7_days);
    println!("Total errors:           {}", stats.total_errors);
    Ok(())
}

async fn cmd_members(db: &Db) -> anyhow::Result<()> {
    let members = db.list_recipients().await?;
    println!("subject_id,name");
    for member in &members {
        println!("{},{}", member.id, csv_field(member.name.as_deref().unwrap_or("")));
    }
    eprintln!("Total members: {}", members.len());
    Ok(())
}

/// Quote a CSV field when it holds a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
