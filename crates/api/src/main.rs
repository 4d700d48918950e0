use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use starday_core::client::{FetchConfig, FetchError, FetchErrorKind, HoroscopeClient};
use starday_core::domain::ranking::RankEntry;
use starday_core::domain::zodiac::Zodiac;
use starday_core::domain::Locale;
use starday_core::storage::{PgRankingStore, PgWidgetStore};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

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

    let client = match build_client(&settings).await {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "db unavailable; starting API in degraded mode");
            None
        }
    };

    let state = AppState { client };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/rankings/today", get(get_today_ranking))
        .route("/rankings/:date", get(get_ranking_by_date))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn build_client(
    settings: &starday_core::config::Settings,
) -> anyhow::Result<HoroscopeClient> {
    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;
    starday_core::storage::migrate(&pool).await?;

    let store = Arc::new(PgRankingStore::new(pool.clone()));
    let mut client = HoroscopeClient::new(store, FetchConfig::from_env());

    // Optional widget side channel, keyed by the user's favorite sign.
    if let Ok(label) = std::env::var("FAVORITE_SIGN") {
        match Zodiac::from_label_en(&label) {
            Ok(sign) => {
                let widget = Arc::new(PgWidgetStore::new(pool));
                client = client.with_widget_pin(widget, sign);
            }
            Err(e) => {
                tracing::warn!(label, error = %e, "FAVORITE_SIGN not recognized; widget pin disabled");
            }
        }
    }

    Ok(client)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    client: Option<Arc<HoroscopeClient>>,
}

#[derive(Debug, Deserialize)]
struct RankingQuery {
    lang: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiRanking {
    date: String,
    locale: &'static str,
    entries: Vec<RankEntry>,
}

async fn get_today_ranking(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> Result<Json<ApiRanking>, StatusCode> {
    fetch(state, None, query).await
}

async fn get_ranking_by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(query): Query<RankingQuery>,
) -> Result<Json<ApiRanking>, StatusCode> {
    let date = starday_core::time::kst::parse_date_key(&date)
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    fetch(state, Some(date), query).await
}

async fn fetch(
    state: AppState,
    date: Option<NaiveDate>,
    query: RankingQuery,
) -> Result<Json<ApiRanking>, StatusCode> {
    let Some(client) = &state.client else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let locale = match query.lang.as_deref() {
        None => Locale::Ko,
        Some(tag) => Locale::from_lang_tag(tag).ok_or(StatusCode::BAD_REQUEST)?,
    };

    // A day with no row yet comes back as an empty list, not an error.
    let entries = client
        .fetch_ranking_with_retry(date, locale)
        .await
        .map_err(|err| status_for(&err))?;

    let date = match date {
        Some(d) => d,
        None => starday_core::time::kst::service_date(chrono::Utc::now())
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
    };

    Ok(Json(ApiRanking {
        date: starday_core::time::kst::date_key(date),
        locale: locale.as_str(),
        entries,
    }))
}

fn status_for(err: &FetchError) -> StatusCode {
    sentry_anyhow::capture_anyhow(&anyhow::anyhow!("{err}"));
    tracing::error!(kind = ?err.kind(), error = %err, "ranking fetch failed");
    match err.kind() {
        FetchErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FetchErrorKind::Network => StatusCode::BAD_GATEWAY,
        FetchErrorKind::MalformedData | FetchErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
