use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use battletui::action::Action;
use battletui::api::{self, BattleService, HttpBattleService};
use battletui::config::ClientConfig;
use battletui::countdown::TurnCountdown;
use battletui::effect::Effect;
use battletui::reducer::reducer;
use battletui::state::AppState;
use battletui::ui;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::Terminal;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tui_dispatch::{
    EffectContext, EffectStoreLike, EffectStoreWithMiddleware, EventOutcome, RenderContext, TaskKey,
};
use tui_dispatch_debug::debug::DebugLayer;
use tui_dispatch_debug::{
    DebugCliArgs, DebugRunOutput, DebugSession, DebugSessionError, ReplayItem,
};

/// Flags override the matching `BATTLE_*` environment variables.
#[derive(Parser, Debug)]
#[command(name = "battletui")]
#[command(about = "Turn-based battle client for the terminal")]
struct Args {
    #[command(flatten)]
    debug: DebugCliArgs,
    /// Battle to join
    #[arg(long)]
    battle_id: Option<String>,
    /// Battle service base URL
    #[arg(long)]
    api_url: Option<String>,
    /// Bearer token for the battle service
    #[arg(long)]
    token: Option<String>,
    /// Current user id, used to find your team
    #[arg(long)]
    user_id: Option<String>,
    /// Seconds per turn before the default action is sent (minimum 1)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    turn_seconds: Option<u32>,
    #[arg(long)]
    log_dir: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ClientConfig) -> DebugCliArgs {
        if let Some(battle_id) = self.battle_id {
            config.battle_id = Some(battle_id);
        }
        if let Some(api_url) = self.api_url {
            config.api_url = api_url;
        }
        if let Some(token) = self.token {
            config.auth_token = Some(token);
        }
        if let Some(user_id) = self.user_id {
            config.user_id = Some(user_id);
        }
        if let Some(seconds) = self.turn_seconds {
            config.turn_seconds = seconds;
        }
        if let Some(dir) = self.log_dir {
            config.log_dir = Some(dir.into());
        }
        self.debug
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let mut config = ClientConfig::from_env();
    let debug_args = Args::parse().apply(&mut config);

    let debug = DebugSession::new(debug_args);
    debug.save_state_schema::<AppState>().map_err(debug_error)?;
    debug.save_actions_schema::<Action>().map_err(debug_error)?;

    let battle_id = config
        .battle_id()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?
        .to_string();
    let _log_guard = setup_logging(&config.log_dir(), &battle_id)?;

    let service: Arc<dyn BattleService> = Arc::new(
        HttpBattleService::new(
            config.api_url.clone(),
            config.auth_token.clone(),
            config.user_id.clone(),
            config.request_timeout,
        )
        .map_err(io::Error::other)?,
    );

    let state = debug
        .load_state_or_else_async(|| {
            let battle_id = battle_id.clone();
            let user_id = config.user_id.clone();
            let countdown = TurnCountdown::new(config.turn_seconds);
            async move { Ok::<AppState, io::Error>(AppState::new(battle_id, user_id, countdown)) }
        })
        .await
        .map_err(debug_error)?;
    let replay_actions = debug.load_replay_items().map_err(debug_error)?;
    let (middleware, recorder) = debug.middleware_with_recorder();
    let store = EffectStoreWithMiddleware::new(state, reducer, middleware);

    let use_alt_screen = debug.use_alt_screen();
    let mut stdout = io::stdout();
    if use_alt_screen {
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    }
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &debug, store, replay_actions, service).await;

    if use_alt_screen {
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
    }

    let run_output = result?;
    run_output.write_render_output()?;
    debug.save_actions(recorder.as_ref()).map_err(debug_error)?;
    Ok(())
}

/// File-only logging; the terminal belongs to the UI. The returned guard
/// flushes the writer when dropped and must outlive the app.
fn setup_logging(log_dir: &Path, battle_id: &str) -> io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "battletui.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    info!("Logging initialized: battle={}", battle_id);
    info!("Log file: {}/battletui.log", log_dir.display());
    Ok(guard)
}

fn debug_error(error: DebugSessionError) -> io::Error {
    io::Error::other(format!("debug session error: {error}"))
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    debug: &DebugSession,
    store: impl EffectStoreLike<AppState, Action, Effect>,
    replay_actions: Vec<ReplayItem<Action>>,
    service: Arc<dyn BattleService>,
) -> io::Result<DebugRunOutput<AppState>> {
    debug
        .run_effect_app(
            terminal,
            store,
            DebugLayer::simple(),
            replay_actions,
            Some(Action::Init),
            Some(Action::Quit),
            |runtime| {
                if debug.render_once() {
                    return;
                }
                runtime
                    .subscriptions()
                    .interval("tick", Duration::from_secs(1), || Action::Tick);
            },
            |frame, area, state, _render_ctx: RenderContext| {
                ui::render(frame, area, state);
            },
            |event, state| -> EventOutcome<Action> { ui::handle_event(event, state) },
            |action| matches!(action, Action::Quit),
            move |effect, ctx| handle_effect(effect, ctx, Arc::clone(&service)),
        )
        .await
}

fn handle_effect(effect: Effect, ctx: &mut EffectContext<Action>, service: Arc<dyn BattleService>) {
    match effect {
        Effect::LoadBattle { battle_id } => {
            ctx.tasks().spawn(TaskKey::new("battle"), async move {
                match service.fetch_battle(&battle_id).await {
                    Ok(battle) => Action::BattleDidLoad(Box::new(battle)),
                    Err(error) => Action::BattleDidError(error.user_message()),
                }
            });
        }
        Effect::SubmitTurn {
            seq,
            battle_id,
            request,
        } => {
            ctx.tasks().spawn(TaskKey::new("turn"), async move {
                match service.submit_turn(&battle_id, &request).await {
                    Ok(result) => Action::TurnDidResolve {
                        seq,
                        result: Box::new(result),
                    },
                    Err(error) => {
                        tracing::warn!(seq, error = %error, "turn submission failed");
                        Action::TurnDidFail {
                            seq,
                            message: error.user_message(),
                        }
                    }
                }
            });
        }
        Effect::FetchRewards { battle_id } => {
            ctx.tasks().spawn(TaskKey::new("rewards"), async move {
                let rewards = api::fetch_rewards_or_none(service.as_ref(), &battle_id).await;
                Action::RewardsDidLoad(rewards)
            });
        }
        Effect::ReportDismissed { battle_id, victory } => {
            info!(%battle_id, victory, "left battle");
            ctx.tasks()
                .spawn(TaskKey::new("leave"), async move { Action::Quit });
        }
    }
}
