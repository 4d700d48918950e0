use anyhow::Context;
use clap::{Parser, Subcommand};
use starday_core::jobs;
use starday_core::llm::HoroscopeModel;
use starday_core::storage::PgRankingStore;
use starday_core::translate::TranslationClient;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "starday_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate the day's ranking and store it (runs once per day).
    Generate {
        /// Service date (YYYY-MM-DD). Defaults to today's KST date.
        #[arg(long)]
        date: Option<String>,

        /// Call the model and validate, but skip all database writes.
        #[arg(long)]
        dry_run: bool,
    },
    /// Translate the stored base ranking into the secondary locale.
    Translate {
        /// Service date (YYYY-MM-DD). Defaults to today's KST date.
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = starday_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    match args.command {
        Command::Generate { date, dry_run } => {
            let date =
                starday_core::time::kst::resolve_service_date(date.as_deref(), chrono::Utc::now())?;
            run_generate(&settings, date, dry_run).await
        }
        Command::Translate { date } => {
            let date =
                starday_core::time::kst::resolve_service_date(date.as_deref(), chrono::Utc::now())?;
            run_translate(&settings, date).await
        }
    }
}

async fn run_generate(
    settings: &starday_core::config::Settings,
    date: chrono::NaiveDate,
    dry_run: bool,
) -> anyhow::Result<()> {
    let model = starday_core::llm::openai::OpenAiClient::from_settings(settings)?;
    let provider = model.provider().as_str();

    if dry_run {
        // No database: generate without history and throw the result away.
        let input = starday_core::llm::GenerateInput {
            date,
            weekday_label: starday_core::time::kst::weekday_label(date),
            history: Vec::new(),
        };
        let entries = model.generate_ranking(&input).await?;
        tracing::info!(
            %date,
            dry_run = true,
            entries = entries.len(),
            "generation dry-run validated model output"
        );
        return Ok(());
    }

    let pool = connect(settings).await?;
    starday_core::storage::migrate(&pool).await?;

    let acquired = starday_core::storage::lock::try_acquire_date_lock(&pool, date).await?;
    if !acquired {
        tracing::warn!(%date, "date lock not acquired; another generation run in progress");
        return Ok(());
    }

    let store = PgRankingStore::new(pool.clone());
    let result = jobs::generate::run(&store, &model, date).await;

    // The lock must be released on every path, so nothing between acquire
    // and release may early-return.
    let recorded = match &result {
        Ok(stored) => {
            starday_core::storage::runs::record_run(
                &pool, "generate", date, provider, "success", None, None,
            )
            .await
            .map(|run_id| {
                tracing::info!(%date, %run_id, stored, "generation run succeeded");
            })
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&anyhow::anyhow!("{err}"));
            starday_core::storage::runs::record_run(
                &pool,
                "generate",
                date,
                provider,
                err.code(),
                Some(&err.to_string()),
                err.raw_response().cloned(),
            )
            .await
            .map(|run_id| {
                tracing::error!(%date, %run_id, error = %err, "generation run failed");
            })
        }
    };

    let _ = starday_core::storage::lock::release_date_lock(&pool, date).await;
    recorded?;

    result
        .map(|_| ())
        .map_err(|err| anyhow::anyhow!("generation failed: {err}"))
}

async fn run_translate(
    settings: &starday_core::config::Settings,
    date: chrono::NaiveDate,
) -> anyhow::Result<()> {
    let translator = starday_core::translate::deepl::DeepLClient::from_settings(settings)?;
    let service = translator.service_name();

    let pool = connect(settings).await?;
    starday_core::storage::migrate(&pool).await?;

    let store = PgRankingStore::new(pool.clone());
    let result = jobs::translate::run(&store, &translator, date).await;

    match &result {
        Ok(()) => {
            let run_id = starday_core::storage::runs::record_run(
                &pool, "translate", date, service, "success", None, None,
            )
            .await?;
            tracing::info!(%date, %run_id, "translation run succeeded");
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&anyhow::anyhow!("{err}"));
            let run_id = starday_core::storage::runs::record_run(
                &pool,
                "translate",
                date,
                service,
                err.code(),
                Some(&err.to_string()),
                None,
            )
            .await?;
            tracing::error!(%date, %run_id, error = %err, "translation run failed");
        }
    }

    result.map_err(|err| anyhow::anyhow!("translation failed: {err}"))
}

async fn connect(settings: &starday_core::config::Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")
}

fn init_sentry(settings: &starday_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
