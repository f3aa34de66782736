use crate::channel::ChannelEvent;
use crate::config::Page;
use crate::rest::RestUpdate;
use arena_core::{ApplyOutcome, ArenaState, TimeRange};
use chrono::{DateTime, Utc};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, info};

/// Follow-up work the main loop performs after input or updates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Requests {
    pub refetch_state: bool,
    pub refresh_all: bool,
    pub persist_range: bool,
}

pub struct App {
    pub state: ArenaState,
    pub page: Page,
    pub help_open: bool,
    pub selected: usize,
    pub expanded: Option<String>,
    pub status_note: Option<String>,
}

impl App {
    pub fn new(state: ArenaState, page: Page, expanded: Option<String>) -> Self {
        Self {
            state,
            page,
            help_open: false,
            selected: 0,
            expanded,
            status_note: None,
        }
    }

    pub fn apply_channel_event(
        &mut self,
        event: ChannelEvent,
        now: DateTime<Utc>,
        requests: &mut Requests,
    ) {
        match event {
            ChannelEvent::Connected => {
                self.state.set_connected(true);
                self.status_note = Some("channel connected".to_string());
                requests.refetch_state = true;
            }
            ChannelEvent::Disconnected => {
                self.state.set_connected(false);
                self.status_note = Some(if self.state.snapshot.is_some() {
                    "channel lost; holding last snapshot".to_string()
                } else {
                    "channel offline; retrying".to_string()
                });
            }
            ChannelEvent::Message(msg) => {
                let kind = msg.kind().to_string();
                match self.state.apply_message(msg, now) {
                    ApplyOutcome::NeedsRefetch => {
                        debug!("stale_range_snapshot: {kind}");
                        requests.refetch_state = true;
                    }
                    ApplyOutcome::Ignored => debug!("frame_ignored: {kind}"),
                    ApplyOutcome::Applied => {}
                }
                self.sync_selection();
            }
        }
    }

    pub fn apply_rest_update(&mut self, update: RestUpdate, now: DateTime<Utc>) {
        match update {
            RestUpdate::State { range, snapshot } => {
                if range != self.state.range {
                    debug!("state_fetch_stale: {range}");
                    return;
                }
                self.state.apply_snapshot(*snapshot, now);
            }
            RestUpdate::Pricing(table) => self.state.set_pricing(table),
            RestUpdate::SyncStatus(status) => self.state.set_sync_status(status),
            RestUpdate::TeamStatus(status) => self.state.set_team_status(status),
            RestUpdate::Knowledge(knowledge) => self.state.set_knowledge(knowledge),
            RestUpdate::Brain(brain) => {
                self.state.apply_brain_poll(brain);
                self.sync_selection();
            }
            RestUpdate::Failed { what, message } => {
                self.status_note = Some(format!("{what} fetch failed: {message}"));
            }
        }
    }

    pub fn instance_keys(&self) -> Vec<String> {
        self.state
            .brain
            .instances()
            .iter()
            .enumerate()
            .map(|(idx, inst)| inst.key(idx))
            .collect()
    }

    /// Keeps the cursor on the expanded card when the list reorders, and
    /// inside the list when it shrinks.
    fn sync_selection(&mut self) {
        let keys = self.instance_keys();
        if let Some(expanded) = self.expanded.as_deref() {
            if let Some(idx) = keys.iter().position(|key| key == expanded) {
                self.selected = idx;
                return;
            }
        }
        self.selected = self.selected.min(keys.len().saturating_sub(1));
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.state.brain.instances().len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = (self.selected as isize + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    /// Only one card is open at a time.
    fn toggle_selected(&mut self) {
        let Some(key) = self.instance_keys().into_iter().nth(self.selected) else {
            return;
        };
        if self.expanded.as_deref() == Some(key.as_str()) {
            self.expanded = None;
        } else {
            self.expanded = Some(key);
        }
    }

    fn switch_range(&mut self, range: TimeRange, requests: &mut Requests) {
        if self.state.set_range(range) {
            info!("range_changed: {range}");
            self.status_note = Some(format!("range: {}", range.label()));
            requests.refetch_state = true;
            requests.persist_range = true;
        }
    }
}

pub fn handle_input(event: Event, app: &mut App, requests: &mut Requests) -> bool {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(key, app, requests),
        _ => false,
    }
}

/// Returns true when the dashboard should exit.
pub fn handle_key(key: KeyEvent, app: &mut App, requests: &mut Requests) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }
    if matches!(key.code, KeyCode::Char('?') | KeyCode::F(1)) {
        app.help_open = !app.help_open;
        return false;
    }
    if key.code == KeyCode::Esc && app.help_open {
        app.help_open = false;
        return false;
    }
    if app.help_open {
        return false;
    }

    match key.code {
        KeyCode::Char('q') => true,
        KeyCode::Char('1') => {
            app.page = Page::Home;
            false
        }
        KeyCode::Char('2') => {
            app.page = Page::Instances;
            false
        }
        KeyCode::Tab => {
            app.page = app.page.next();
            false
        }
        KeyCode::Char('t') => {
            app.switch_range(TimeRange::Today, requests);
            false
        }
        KeyCode::Char('w') => {
            app.switch_range(TimeRange::Week, requests);
            false
        }
        KeyCode::Char('a') => {
            app.switch_range(TimeRange::All, requests);
            false
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.page == Page::Instances {
                app.move_selection(1);
            }
            false
        }
        KeyCode::Up | KeyCode::Char('k') => {
            if app.page == Page::Instances {
                app.move_selection(-1);
            }
            false
        }
        KeyCode::Enter => {
            if app.page == Page::Instances {
                app.toggle_selected();
            }
            false
        }
        KeyCode::Esc => {
            app.expanded = None;
            false
        }
        KeyCode::Char('r') => {
            app.status_note = Some("refresh requested".to_string());
            requests.refetch_state = true;
            requests.refresh_all = true;
            false
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::format::parse_timestamp;
    use arena_core::{decode_server_msg, BrainState, StateSnapshot};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        parse_timestamp("2026-02-18T12:00:00Z").expect("now")
    }

    fn app() -> App {
        App::new(ArenaState::new(TimeRange::Today, now()), Page::Home, None)
    }

    fn press(app: &mut App, code: KeyCode) -> (bool, Requests) {
        let mut requests = Requests::default();
        let quit = handle_key(KeyEvent::new(code, KeyModifiers::NONE), app, &mut requests);
        (quit, requests)
    }

    fn brain_with(ids: &[&str]) -> BrainState {
        BrainState::from_value(&json!({
            "instances": ids
                .iter()
                .map(|id| json!({"instance_id": id, "status": "active"}))
                .collect::<Vec<_>>()
        }))
    }

    #[test]
    fn page_keys_and_quit() {
        let mut app = app();
        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.page, Page::Instances);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.page, Page::Home);
        assert!(press(&mut app, KeyCode::Char('q')).0);
        let mut requests = Requests::default();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(handle_key(ctrl_c, &mut app, &mut requests));
    }

    #[test]
    fn help_swallows_other_keys() {
        let mut app = app();
        press(&mut app, KeyCode::Char('?'));
        assert!(app.help_open);
        let (quit, _) = press(&mut app, KeyCode::Char('q'));
        assert!(!quit);
        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.page, Page::Home);
        press(&mut app, KeyCode::Esc);
        assert!(!app.help_open);
    }

    #[test]
    fn range_keys_request_refetch_and_persist_only_on_change() {
        let mut app = app();
        let (_, requests) = press(&mut app, KeyCode::Char('w'));
        assert_eq!(app.state.range, TimeRange::Week);
        assert!(requests.refetch_state && requests.persist_range);
        assert_eq!(app.status_note.as_deref(), Some("range: This Week"));

        let (_, requests) = press(&mut app, KeyCode::Char('w'));
        assert_eq!(requests, Requests::default());
    }

    #[test]
    fn stale_range_fetch_result_is_dropped() {
        let mut app = app();
        press(&mut app, KeyCode::Char('a'));
        let snapshot: StateSnapshot =
            serde_json::from_value(json!({"range": "today", "agents": {"forger": {"invocations": 9}}}))
                .expect("snapshot");
        app.apply_rest_update(
            RestUpdate::State {
                range: TimeRange::Today,
                snapshot: Box::new(snapshot.clone()),
            },
            now(),
        );
        assert!(app.state.snapshot.is_none());

        app.apply_rest_update(
            RestUpdate::State {
                range: TimeRange::All,
                snapshot: Box::new(snapshot),
            },
            now(),
        );
        assert!(app.state.snapshot.is_some());
    }

    #[test]
    fn connect_refetches_and_disconnect_keeps_snapshot() {
        let mut app = app();
        let mut requests = Requests::default();
        app.apply_channel_event(ChannelEvent::Connected, now(), &mut requests);
        assert!(app.state.connected);
        assert!(requests.refetch_state);

        app.apply_rest_update(
            RestUpdate::State {
                range: TimeRange::Today,
                snapshot: Box::default(),
            },
            now(),
        );
        let mut requests = Requests::default();
        app.apply_channel_event(ChannelEvent::Disconnected, now(), &mut requests);
        assert!(!app.state.connected);
        assert!(app.state.snapshot.is_some());
        assert_eq!(
            app.status_note.as_deref(),
            Some("channel lost; holding last snapshot")
        );
    }

    #[test]
    fn pushed_snapshot_for_other_range_triggers_refetch() {
        let mut app = app();
        let msg = decode_server_msg(r#"{"type":"state","data":{"range":"week","agents":{}}}"#)
            .expect("frame");
        let mut requests = Requests::default();
        app.apply_channel_event(ChannelEvent::Message(msg), now(), &mut requests);
        assert!(requests.refetch_state);
        assert!(app.state.snapshot.is_none());
    }

    #[test]
    fn accordion_keeps_one_card_open() {
        let mut app = app();
        app.page = Page::Instances;
        app.apply_rest_update(RestUpdate::Brain(brain_with(&["a", "b", "c"])), now());
        assert!(app.state.brain_available);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.expanded.as_deref(), Some("a"));
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.expanded.as_deref(), Some("b"));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.expanded, None);

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected, 2);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.selected, 1);
    }

    #[test]
    fn preexpanded_instance_pulls_selection() {
        let mut app = App::new(
            ArenaState::new(TimeRange::Today, now()),
            Page::Instances,
            Some("c".to_string()),
        );
        app.apply_rest_update(RestUpdate::Brain(brain_with(&["a", "b", "c"])), now());
        assert_eq!(app.selected, 2);

        app.apply_rest_update(RestUpdate::Brain(brain_with(&["a"])), now());
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn refresh_key_requests_everything() {
        let mut app = app();
        let (_, requests) = press(&mut app, KeyCode::Char('r'));
        assert!(requests.refetch_state && requests.refresh_all);
        assert!(!requests.persist_range);
    }
}
