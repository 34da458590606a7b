//! Terminal UI for taka that lets residents find their collection zone, see the
//! schedule and set a reminder.

mod app;
mod devices;
mod input;
mod settings;
mod telemetry;
mod ui;

use std::{io, sync::Arc, time::Duration as StdDuration};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use taka_core::{CollectionService, ServiceAreaId, ServiceAreaMeta, ZoneSource};
use taka_provider_http::HttpZoneSource;
use taka_provider_nyeri as nyeri;
use tracing::{error, info};

use crate::app::App;
use crate::devices::{ConfiguredSensor, TerminalNotifier};
use crate::input::Action;
use crate::settings::{AppSettings, SourceKind};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = AppSettings::load().context("reading configuration")?;
    telemetry::init(&settings.log)?;

    // Zone data + service setup
    let source = zone_source(&settings)?;
    let notifier = Arc::new(TerminalNotifier::new(settings.notifications.permission));
    let port = Arc::clone(&notifier);
    let service = CollectionService::load(source.as_ref(), port, settings.service_settings())
        .await
        .inspect_err(|err| error!(%err, "cannot start without zone data"))?;
    info!(zones = service.zones().len(), "session started");

    let device = settings
        .location
        .device_point()
        .context("reading location.device")?;

    // App state
    let app = App::new(service, notifier, Box::new(ConfiguredSensor::new(device)));

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

fn zone_source(settings: &AppSettings) -> Result<Box<dyn ZoneSource>> {
    match settings.zones.source {
        SourceKind::Builtin => Ok(Box::new(nyeri::source())),
        SourceKind::Http => {
            let url = settings
                .zones
                .url
                .as_deref()
                .context("zones.url is required when zones.source is \"http\"")?;
            let client = Client::builder().user_agent("taka/0.1").build()?;
            let name = settings.zones.service_area.clone();
            let meta = ServiceAreaMeta {
                id: ServiceAreaId(name.to_lowercase()),
                name,
            };
            Ok(Box::new(HttpZoneSource::new(client, url, meta)))
        }
    }
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        // Reminders fire on the runtime; surface them before drawing.
        app.collect_notifications();
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::Locate => {
                    app.is_loading = true;
                    app.error_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    app.locate().await;
                    app.is_loading = false;
                }
                Action::SelectArea => app.select_current_area(),
                Action::SubmitPoint => app.submit_point(),
                Action::EnableReminder => app.enable_reminder(),
                Action::CancelReminder => app.cancel_reminder(),
                Action::RequestPermission => app.request_permission(),
            }
        }
    }

    Ok(())
}
