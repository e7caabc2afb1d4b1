//! Agro Advisory Bot - Server
//!
//! Serves the Telegram webhook and operator API, and runs the daily weather
//! and advisory sweeps.

use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agro_advisory::{
    config::{Config, ScheduleConfig},
    create_app,
    db::PgFarmStore,
    external::{Gazetteer, TelegramClient},
    services::{
        chatbot::ReminderDelays, scheduler, ChatbotService, DatasetSource, DispatchSettings,
        NotificationDispatcher, ReminderScheduler, SweepKind, SweepService,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "agro_bot=debug,agro_advisory=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Agro Advisory Bot");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;
    tracing::info!("Migrations completed");

    let store = PgFarmStore::new(db_pool);

    let gazetteer = match config.gazetteer.path.as_deref() {
        Some(path) => Gazetteer::load(Path::new(path))?,
        None => {
            tracing::warn!("No gazetteer configured; village fallback disabled");
            Gazetteer::default()
        }
    };
    let gazetteer = Arc::new(gazetteer);

    let channel = Arc::new(TelegramClient::new(
        &config.telegram.bot_token,
        &config.telegram.api_base_url,
        config.telegram.send_timeout(),
    )?);

    let reminders = ReminderScheduler::new(Arc::clone(&channel), config.telegram.send_timeout());
    let delays = ReminderDelays {
        no_farm: Duration::from_secs(config.reminders.no_farm_delay_secs),
        no_location: Duration::from_secs(config.reminders.no_location_delay_secs),
    };
    reminders.rearm(&store, delays).await?;
    let chatbot = ChatbotService::new(
        store.clone(),
        Arc::clone(&channel),
        Arc::clone(&gazetteer),
        reminders.clone(),
        delays,
    );

    let dispatcher = NotificationDispatcher::new(
        store.clone(),
        Arc::clone(&channel),
        Arc::clone(&gazetteer),
        DispatchSettings {
            threshold: config.dataset.match_threshold,
            send_timeout: config.telegram.send_timeout(),
            operators: config.operators.clone(),
        },
    );
    let sweeps = Arc::new(SweepService::new(
        store.clone(),
        DatasetSource::from_config(&config.dataset)?,
        dispatcher,
        config.dataset.forecast_days,
    ));

    spawn_daily_sweeps(&config, &sweeps)?;

    // Create application state
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        chatbot: Arc::new(chatbot),
        sweeps,
        reminders,
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Start one background loop per sweep kind
fn spawn_daily_sweeps(
    config: &Config,
    sweeps: &Arc<SweepService<PgFarmStore, TelegramClient>>,
) -> anyhow::Result<()> {
    let offset = config.dataset.utc_offset()?;

    for kind in SweepKind::ALL {
        let at = match kind {
            SweepKind::Weather => ScheduleConfig::parse_time(&config.schedule.weather_at)?,
            SweepKind::Advisory => ScheduleConfig::parse_time(&config.schedule.advisory_at)?,
        };
        let sweeps = Arc::clone(sweeps);

        tokio::spawn(async move {
            scheduler::run_daily(kind.purpose(), at, offset, |now| {
                let sweeps = Arc::clone(&sweeps);
                async move {
                    match sweeps.run(kind, now).await {
                        Ok(report) => tracing::info!("{}", report.summary()),
                        Err(e) => tracing::error!("{} sweep failed: {}", kind, e),
                    }
                }
            })
            .await;
        });
    }

    Ok(())
}
