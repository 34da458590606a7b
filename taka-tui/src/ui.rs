use chrono::{Datelike, Local, NaiveDate};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use taka_core::{
    ReminderState, Zone,
    model::{WEEK, weekday_name},
    recurrence::collection_dates_in_month,
};

use crate::app::{App, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new(format!(
        "taka · waste collection schedule for {}",
        app.service.service_area().name
    ))
    .block(Block::default().borders(Borders::ALL).title("Taka"));
    frame.render_widget(header, *header_area);

    match app.screen {
        Screen::ZoneSelect => draw_zone_select(frame, app, *content_area),
        Screen::AreaSearch => draw_area_search(frame, app, *content_area),
        Screen::PointEntry => draw_point_entry(frame, app, *content_area),
        Screen::ScheduleView => draw_schedule_view(frame, app, *content_area),
    }

    let nav_hint = match app.screen {
        Screen::ZoneSelect => {
            "↑/↓ move · Enter select · / search area · p coordinates · l locate · q quit"
        }
        Screen::AreaSearch => "Type to search · ↑/↓ pick · Enter select · Esc back · Ctrl-C quit",
        Screen::PointEntry => "Type \"lat, lon\" · Enter resolve · Esc back · Ctrl-C quit",
        Screen::ScheduleView => {
            "r remind · x cancel · n allow notifications · [/] month · l locate · Esc back · q quit"
        }
    };

    let status_text = if app.is_loading {
        format!("Loading… · {nav_hint}")
    } else if let Some(msg) = app.error_message.as_ref().or(app.info_message.as_ref()) {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else if app.info_message.is_some() {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_zone_select(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let selected = app.service.selection().map(|current| &current.zone);
    let items = app
        .service
        .zones()
        .iter()
        .enumerate()
        .map(|(idx, zone)| {
            let prefix = if idx == app.zone_list_index { "> " } else { "  " };
            let marker = if Some(&zone.id) == selected { " *" } else { "" };
            ListItem::new(format!(
                "{prefix}{}{marker} · {} · {}",
                zone.name, zone.collection_days, zone.time_window
            ))
        })
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Select your collection zone (↑/↓, Enter)"),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    if !app.service.zones().is_empty() {
        state.select(Some(app.zone_list_index));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_area_search(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // input
            Constraint::Min(0),    // results
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [input_area, results_area] = chunks else {
        return;
    };

    let input = Paragraph::new(app.search_input.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Search for your area (Enter)"),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(input, *input_area);

    let matches = app.area_matches();
    let items = if matches.is_empty() {
        vec![ListItem::new(if app.search_input.trim().is_empty() {
            "Start typing a neighbourhood, e.g. Gatitu."
        } else {
            "No served area matches."
        })]
    } else {
        matches
            .iter()
            .map(|hit| ListItem::new(format!("{} · {}", hit.area, hit.zone.name)))
            .collect()
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Areas"))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    if !matches.is_empty() {
        state.select(Some(app.search_index));
    }
    frame.render_stateful_widget(list, *results_area, &mut state);
}

fn draw_point_entry(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let text = vec![
        Line::from(app.point_input.as_str()),
        Line::from(""),
        Line::from("Enter latitude and longitude in decimal degrees, e.g. -0.4246, 36.9452").dim(),
    ];
    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Find zone by coordinates"),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn draw_schedule_view(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let Some(zone) = app.service.selected_zone() else {
        let paragraph = Paragraph::new("No zone selected yet.")
            .block(Block::default().borders(Borders::ALL).title("Schedule"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    };

    let layout_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(26)])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [details_area, calendar_area] = chunks else {
        return;
    };

    let details = Paragraph::new(zone_details(app, zone))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} (Esc/b to go back)", zone.name)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(details, *details_area);

    let today = Local::now().date_naive();
    let collections = collection_dates_in_month(
        zone.collection_days,
        app.calendar_month.year(),
        app.calendar_month.month(),
    );
    let calendar = Paragraph::new(calendar_lines(app.calendar_month, &collections, today)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(app.calendar_month.format("%B %Y").to_string()),
    );
    frame.render_widget(calendar, *calendar_area);
}

fn zone_details(app: &App, zone: &Zone) -> Vec<Line<'static>> {
    let now = Local::now();
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let next_line = match app.service.next_collection(&now) {
        Ok(next) => format!(
            "{} ({}), {}",
            next.format("%A %-d %B"),
            relative_day_label(next.date_naive(), now.date_naive()),
            zone.time_window
        ),
        Err(err) => err.to_string(),
    };

    let reminder_line = match app.service.reminder() {
        Some(task) if task.zone() == &zone.id => match task.state() {
            ReminderState::Armed => {
                format!("armed for {}", task.due_at().format("%a %-d %b %H:%M"))
            }
            state => state.to_string(),
        },
        Some(_) | None => "off".to_owned(),
    };

    let found_by = match app.service.selection() {
        Some(current) if current.from_location() => "your location",
        Some(_) | None => "your choice",
    };
    let centre = zone
        .bounding_box()
        .map_or_else(|| "unknown".to_owned(), |bbox| bbox.center().to_string());

    vec![
        Line::from(vec![Span::styled("Selected by: ", bold), Span::raw(found_by)]),
        Line::from(vec![Span::styled("Map centre:  ", bold), Span::raw(centre)]),
        Line::from(vec![Span::styled("Areas:       ", bold), Span::raw(zone.areas.join(", "))]),
        Line::from(vec![
            Span::styled("Collection:  ", bold),
            Span::raw(zone.collection_days.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Time:        ", bold),
            Span::raw(zone.time_window.to_string()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Next:        ", bold),
            Span::styled(next_line, Style::default().fg(Color::Green)),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled("Reminder:    ", bold), Span::raw(reminder_line)]),
        Line::from(vec![
            Span::styled("Permission:  ", bold),
            Span::raw(app.service.notification_permission().to_string()),
        ]),
    ]
}

fn calendar_lines(
    month: NaiveDate,
    collections: &[NaiveDate],
    today: NaiveDate,
) -> Vec<Line<'static>> {
    let header = WEEK
        .iter()
        .map(|&day| weekday_name(day).get(..2).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ");

    let mut lines = vec![Line::from(header).bold()];
    for week in month_grid(month) {
        let spans = week
            .iter()
            .map(|cell| match cell {
                None => Span::raw("   "),
                Some(date) => {
                    let mut style = Style::default();
                    if collections.contains(date) {
                        style = style.fg(Color::Black).bg(Color::Green);
                    }
                    if *date == today {
                        style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                    }
                    Span::styled(format!("{:>2} ", date.day()), style)
                }
            })
            .collect::<Vec<_>>();
        lines.push(Line::from(spans));
    }
    lines
}

/// Weeks of the month containing `month`, Monday first, padded with `None`.
fn month_grid(month: NaiveDate) -> Vec<[Option<NaiveDate>; 7]> {
    let first = crate::app::first_of_month(month);
    let lead = first.weekday().num_days_from_monday() as usize;

    let days = first
        .iter_days()
        .take_while(|day| day.month() == first.month())
        .map(Some);
    let mut cells = std::iter::repeat_n(None, lead).chain(days).peekable();

    let mut weeks = Vec::new();
    while cells.peek().is_some() {
        let mut week = [None; 7];
        for slot in &mut week {
            *slot = cells.next().flatten();
        }
        weeks.push(week);
    }
    weeks
}

fn relative_day_label(date: NaiveDate, today: NaiveDate) -> String {
    let delta = (date - today).num_days();
    match delta {
        0 => "today".to_owned(),
        1 => "tomorrow".to_owned(),
        days if days > 1 => format!("in {days} days"),
        -1 => "yesterday".to_owned(),
        days => format!("{} days ago", days.abs()),
    }
}
