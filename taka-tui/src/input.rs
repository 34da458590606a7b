use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `service.locate`(...) against the configured sensor
    Locate,
    /// Select the highlighted (or first) area search hit
    SelectArea,
    /// Resolve the typed coordinates
    SubmitPoint,
    EnableReminder,
    CancelReminder,
    RequestPermission,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{Backspace, Char, Down, Enter, Esc, Left, Right, Up};

    // Global quit shortcut
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    let typing = matches!(app.screen, Screen::AreaSearch | Screen::PointEntry);
    if !typing && key.code == Char('q') && key.modifiers.is_empty() {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::ZoneSelect => match key.code {
            Up | Char('k') => {
                app.zone_list_index = app.zone_list_index.saturating_sub(1);
            }
            Down | Char('j') => {
                if app.zone_list_index + 1 < app.service.zones().len() {
                    app.zone_list_index += 1;
                }
            }
            Enter | Char(' ') => {
                app.select_current_zone();
            }
            Char('/' | 's') => {
                app.error_message = None;
                app.screen = Screen::AreaSearch;
            }
            Char('p') => {
                app.error_message = None;
                app.screen = Screen::PointEntry;
            }
            Char('l') => action = Action::Locate,
            Char('n') => action = Action::RequestPermission,
            _ => {}
        },

        Screen::AreaSearch => match key.code {
            Up => {
                app.search_index = app.search_index.saturating_sub(1);
            }
            Down => {
                if app.search_index + 1 < app.area_matches().len() {
                    app.search_index += 1;
                }
            }
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    app.search_input.push(character);
                    app.search_index = 0;
                }
            }
            Backspace => {
                app.search_input.pop();
                app.search_index = 0;
            }
            Enter => action = Action::SelectArea,
            Esc => {
                app.screen = Screen::ZoneSelect;
                app.error_message = None;
            }
            _ => {}
        },

        Screen::PointEntry => match key.code {
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    app.point_input.push(character);
                }
            }
            Backspace => {
                app.point_input.pop();
            }
            Enter => action = Action::SubmitPoint,
            Esc => {
                app.screen = Screen::ZoneSelect;
                app.error_message = None;
            }
            _ => {}
        },

        Screen::ScheduleView => match key.code {
            Esc | Char('b') => {
                app.screen = Screen::ZoneSelect;
            }
            Left | Char('[') => app.shift_calendar(false),
            Right | Char(']') => app.shift_calendar(true),
            Char('r') => action = Action::EnableReminder,
            Char('x') => action = Action::CancelReminder,
            Char('n') => action = Action::RequestPermission,
            Char('l') => action = Action::Locate,
            _ => {}
        },
    }
    action
}
