use crate::app::Scene;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Water,
    CheckSoil,
    NextBulb,
    SelectTask(i32),
    CompleteSelected,
    DeleteSelected,
    AddTaskOpen,
    EditChar(char),
    EditBackspace,
    EditSwitchField,
    EditCommit,
    ShopOpen,
    ShopMove(i32),
    ShopBuy,
    HelpToggle,
    ResetAsk,
    ResetConfirm,
    Back,
    Quit,
}

#[derive(Clone, Debug)]
pub(crate) struct InputEvent {
    pub(crate) key: KeyCode,
    pub(crate) mods: KeyModifiers,
}

pub(crate) fn collect_input_nonblocking(
    max_frame_time: Duration,
) -> anyhow::Result<Vec<InputEvent>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        if let Event::Key(k) = event::read()? {
            if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                out.push(InputEvent {
                    key: k.code,
                    mods: k.modifiers,
                });
                if out.len() >= 32 {
                    break;
                }
            }
        }
    }
    Ok(out)
}

pub(crate) fn map_event_to_action(scene: Scene, ev: InputEvent) -> Option<Action> {
    if ev.mods.contains(KeyModifiers::CONTROL) && ev.key == KeyCode::Char('c') {
        return Some(Action::Quit);
    }

    // Text entry swallows every printable key.
    if scene == Scene::AddTask {
        return match ev.key {
            KeyCode::Enter => Some(Action::EditCommit),
            KeyCode::Esc => Some(Action::Back),
            KeyCode::Tab => Some(Action::EditSwitchField),
            KeyCode::Backspace => Some(Action::EditBackspace),
            KeyCode::Char(ch) if !ch.is_control() => Some(Action::EditChar(ch)),
            _ => None,
        };
    }

    match scene {
        Scene::Main => match ev.key {
            KeyCode::Char('q') | KeyCode::Char('Q') => Some(Action::Quit),
            KeyCode::Char('h') | KeyCode::Char('H') => Some(Action::HelpToggle),
            KeyCode::Char('w') | KeyCode::Char('W') => Some(Action::Water),
            KeyCode::Char('s') | KeyCode::Char('S') => Some(Action::CheckSoil),
            KeyCode::Char('b') | KeyCode::Char('B') => Some(Action::NextBulb),
            KeyCode::Char('t') | KeyCode::Char('T') => Some(Action::AddTaskOpen),
            KeyCode::Char('p') | KeyCode::Char('P') => Some(Action::ShopOpen),
            KeyCode::Char('r') | KeyCode::Char('R') => Some(Action::ResetAsk),
            KeyCode::Char('x') | KeyCode::Char('X') | KeyCode::Delete => {
                Some(Action::DeleteSelected)
            }
            KeyCode::Enter | KeyCode::Char(' ') => Some(Action::CompleteSelected),
            KeyCode::Up => Some(Action::SelectTask(-1)),
            KeyCode::Down => Some(Action::SelectTask(1)),
            _ => None,
        },
        Scene::Shop => match ev.key {
            KeyCode::Up => Some(Action::ShopMove(-1)),
            KeyCode::Down => Some(Action::ShopMove(1)),
            KeyCode::Enter => Some(Action::ShopBuy),
            KeyCode::Esc | KeyCode::Char('p') | KeyCode::Char('P') => Some(Action::Back),
            KeyCode::Char('q') | KeyCode::Char('Q') => Some(Action::Quit),
            _ => None,
        },
        Scene::Help => match ev.key {
            KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('H') => Some(Action::Back),
            KeyCode::Char('q') | KeyCode::Char('Q') => Some(Action::Quit),
            _ => None,
        },
        Scene::ConfirmReset => match ev.key {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::ResetConfirm),
            _ => Some(Action::Back),
        },
        Scene::AddTask => None,
    }
}
