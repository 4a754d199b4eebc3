use anyhow::Result;
use thiserror::Error;

use crate::store::{Flag, KeyType, Store};
use crate::telegram::{Button, InlineKeyboard};

// ── Commands ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Main,
    Generate,
    Global,
    Control,
    Stats,
}

/// Closed set of admin operations, decoded once from inbound text or
/// callback payloads and matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Menu(Menu),
    Gen { count: u32, days: i64 },
    Global { days: i64 },
    Toggle(Flag),
    List,
}

/// Upper bound on key validity, a century. Keeps expiry arithmetic inside
/// the representable date range.
pub const MAX_VALIDITY_DAYS: i64 = 36_500;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("usage: /gen [count] [days] — count must be a positive number")]
    BadCount,
    #[error("usage: /gen [count] [days] — days must be a number between 0 and {MAX_VALIDITY_DAYS}")]
    BadDays,
}

fn valid_days(days: i64) -> bool {
    (0..=MAX_VALIDITY_DAYS).contains(&days)
}

/// Decode a plain-text command. `Ok(None)` means unrecognized text, which
/// is silently ignored; malformed arguments to a recognized command are an
/// explicit error rendered back to the admin.
pub fn parse_text(text: &str) -> Result<Option<Command>, CommandError> {
    let mut parts = text.split_whitespace();
    let Some(head) = parts.next() else {
        return Ok(None);
    };

    let cmd = match head {
        "/start" | "/menu" => Command::Menu(Menu::Main),
        "/generate" => Command::Menu(Menu::Generate),
        "/global" => Command::Menu(Menu::Global),
        "/control" => Command::Menu(Menu::Control),
        "/status" => Command::Menu(Menu::Stats),
        "/list" => Command::List,
        "/gen" => {
            let count = match parts.next() {
                Some(raw) => raw.parse::<u32>().ok().filter(|c| *c > 0).ok_or(CommandError::BadCount)?,
                None => 1,
            };
            let days = match parts.next() {
                Some(raw) => raw
                    .parse::<i64>()
                    .ok()
                    .filter(|d| valid_days(*d))
                    .ok_or(CommandError::BadDays)?,
                None => 30,
            };
            Command::Gen { count, days }
        }
        _ => return Ok(None),
    };
    Ok(Some(cmd))
}

/// Decode a callback payload. These originate from our own keyboards, so
/// anything malformed is dropped rather than reported.
pub fn parse_callback(data: &str) -> Option<Command> {
    match data {
        "toggle_server" => return Some(Command::Toggle(Flag::Server)),
        "toggle_validation" => return Some(Command::Toggle(Flag::Validation)),
        "toggle_creation" => return Some(Command::Toggle(Flag::Creation)),
        "menu_main" => return Some(Command::Menu(Menu::Main)),
        "menu_generate" => return Some(Command::Menu(Menu::Generate)),
        "menu_global" => return Some(Command::Menu(Menu::Global)),
        "menu_control" => return Some(Command::Menu(Menu::Control)),
        "menu_stats" => return Some(Command::Menu(Menu::Stats)),
        _ => {}
    }

    if let Some(rest) = data.strip_prefix("gen_") {
        let (count, days) = rest.split_once('_')?;
        let count: u32 = count.parse().ok().filter(|c| *c > 0)?;
        let days: i64 = days.parse().ok().filter(|d| valid_days(*d))?;
        return Some(Command::Gen { count, days });
    }
    if let Some(days) = data.strip_prefix("global_") {
        let days: i64 = days.parse().ok().filter(|d| valid_days(*d))?;
        return Some(Command::Global { days });
    }
    None
}

// ── Router ───────────────────────────────────────────────────────────────────

/// One rendered response: message text plus an optional inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    fn with_keyboard(text: impl Into<String>, keyboard: InlineKeyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Interprets admin events against the store. Pure request/response: the
/// caller owns sending the reply and acknowledging callbacks.
#[derive(Clone)]
pub struct AdminRouter {
    store: Store,
    admin_id: i64,
}

impl AdminRouter {
    pub fn new(store: Store, admin_id: i64) -> Self {
        Self { store, admin_id }
    }

    /// Handle a plain-text message. `None` means no reply is owed.
    pub fn handle_text(&self, sender: i64, text: &str) -> Result<Option<Reply>> {
        if sender != self.admin_id {
            return Ok(Some(Reply::text("⛔ Unauthorized")));
        }
        match parse_text(text) {
            Ok(Some(cmd)) => self.dispatch(cmd).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Ok(Some(Reply::text(format!("⚠️ {e}")))),
        }
    }

    /// Handle a button callback payload. `None` means no reply is owed;
    /// the callback itself is acknowledged by the caller either way.
    pub fn handle_callback(&self, sender: i64, data: &str) -> Result<Option<Reply>> {
        if sender != self.admin_id {
            return Ok(Some(Reply::text("⛔ Unauthorized")));
        }
        match parse_callback(data) {
            Some(cmd) => self.dispatch(cmd).map(Some),
            None => Ok(None),
        }
    }

    fn dispatch(&self, cmd: Command) -> Result<Reply> {
        match cmd {
            Command::Menu(Menu::Main) => Ok(main_menu()),
            Command::Menu(Menu::Generate) => Ok(generate_menu()),
            Command::Menu(Menu::Global) => Ok(global_menu()),
            Command::Menu(Menu::Control) => self.control_menu(None),
            Command::Menu(Menu::Stats) => self.status(),
            Command::Gen { count, days } => self.generate(count, days, KeyType::Standard),
            Command::Global { days } => {
                let days_u32 = u32::try_from(days.max(0)).unwrap_or(0);
                self.generate(1, days, KeyType::Global { days: days_u32 })
            }
            Command::Toggle(flag) => {
                let enabled = self.store.toggle_flag(flag)?;
                let note = format!(
                    "{} ➜ <b>{}</b>",
                    flag.label(),
                    if enabled { "Enabled" } else { "Disabled" }
                );
                self.control_menu(Some(note))
            }
            Command::List => self.list(),
        }
    }

    fn generate(&self, count: u32, days: i64, key_type: KeyType) -> Result<Reply> {
        if !self.store.get_flag(Flag::Creation)? {
            return Ok(Reply::text("⛔ Key creation is disabled"));
        }
        let keys = self.store.generate_keys(count, days, key_type)?;
        let body = keys
            .iter()
            .map(|k| format!("<code>{k}</code>"))
            .collect::<Vec<_>>()
            .join("\n");
        let text = match key_type {
            KeyType::Standard => format!("✅ <b>Generated {count} Key(s)</b>\n\n{body}"),
            KeyType::Global { days } => format!("🌍 <b>Global Key ({days} Days)</b>\n\n{body}"),
        };
        Ok(Reply::text(text))
    }

    fn list(&self) -> Result<Reply> {
        let records = self.store.recent_keys(20)?;
        if records.is_empty() {
            return Ok(Reply::text("📭 No keys issued yet"));
        }
        let lines = records
            .iter()
            .map(|r| {
                let binding = match &r.hwid {
                    Some(hwid) => format!("🔒 {hwid}"),
                    None if r.key_type.is_global() => "🌍 global".to_owned(),
                    None => "🟢 unbound".to_owned(),
                };
                format!("<code>{}</code> — {binding}", r.key)
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Reply::text(format!("🗂 <b>Last {} Keys</b>\n\n{lines}", records.len())))
    }

    fn status(&self) -> Result<Reply> {
        let (total, bound) = self.store.key_counts()?;
        let text = self.store.read(|d| {
            format!(
                "📊 <b>Status</b>\n\nTotal Keys: {total}\nBound Keys: {bound}\nServer: {}\nValidation: {}\nCreation: {}",
                light(d.settings.server_enabled),
                light(d.settings.key_validation_enabled),
                light(d.settings.key_creation_enabled),
            )
        })?;
        Ok(Reply::text(text))
    }

    fn control_menu(&self, note: Option<String>) -> Result<Reply> {
        let (server, validation, creation) = self.store.read(|d| {
            (
                d.settings.server_enabled,
                d.settings.key_validation_enabled,
                d.settings.key_creation_enabled,
            )
        })?;

        let text = match note {
            Some(n) => format!("{n}\n\n⚙️ <b>Server Controls</b>"),
            None => "⚙️ <b>Server Controls</b>".to_owned(),
        };
        let keyboard = InlineKeyboard {
            inline_keyboard: vec![
                vec![
                    Button::new(format!("{} Server", light(server)), "toggle_server"),
                    Button::new(format!("{} Validation", light(validation)), "toggle_validation"),
                ],
                vec![Button::new(
                    format!("{} Creation", light(creation)),
                    "toggle_creation",
                )],
                vec![Button::new("⬅️ Back", "menu_main")],
            ],
        };
        Ok(Reply::with_keyboard(text, keyboard))
    }
}

fn light(enabled: bool) -> &'static str {
    if enabled {
        "🟢"
    } else {
        "🔴"
    }
}

// ── Static menus ─────────────────────────────────────────────────────────────

fn main_menu() -> Reply {
    Reply::with_keyboard(
        "🤖 <b>Keymint Control Panel</b>\n\nPick an option:",
        InlineKeyboard {
            inline_keyboard: vec![
                vec![
                    Button::new("🔑 Generate Keys", "menu_generate"),
                    Button::new("🌍 Global Keys", "menu_global"),
                ],
                vec![
                    Button::new("⚙️ Control Server", "menu_control"),
                    Button::new("📊 Status", "menu_stats"),
                ],
            ],
        },
    )
}

fn generate_menu() -> Reply {
    Reply::with_keyboard(
        "🔑 <b>Generate Standard Keys</b>",
        InlineKeyboard {
            inline_keyboard: vec![
                vec![
                    Button::new("1 Key • 7 Days", "gen_1_7"),
                    Button::new("1 Key • 30 Days", "gen_1_30"),
                ],
                vec![
                    Button::new("5 Keys • 30 Days", "gen_5_30"),
                    Button::new("10 Keys • 30 Days", "gen_10_30"),
                ],
                vec![Button::new("⬅️ Back", "menu_main")],
            ],
        },
    )
}

fn global_menu() -> Reply {
    Reply::with_keyboard(
        "🌍 <b>Global Keys (Unlimited Devices)</b>",
        InlineKeyboard {
            inline_keyboard: vec![
                vec![
                    Button::new("Global • 1 Day", "global_1"),
                    Button::new("Global • 7 Days", "global_7"),
                ],
                vec![Button::new("Global • 30 Days", "global_30")],
                vec![Button::new("⬅️ Back", "menu_main")],
            ],
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: i64 = 7;

    fn temp_router() -> (tempfile::TempDir, AdminRouter) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("keys.json"));
        (dir, AdminRouter::new(store, ADMIN))
    }

    // ── parsing ──────────────────────────────────────────────────────────

    #[test]
    fn text_commands_decode_to_the_closed_set() {
        assert_eq!(parse_text("/start").unwrap(), Some(Command::Menu(Menu::Main)));
        assert_eq!(parse_text("/menu").unwrap(), Some(Command::Menu(Menu::Main)));
        assert_eq!(parse_text("/generate").unwrap(), Some(Command::Menu(Menu::Generate)));
        assert_eq!(parse_text("/global").unwrap(), Some(Command::Menu(Menu::Global)));
        assert_eq!(parse_text("/control").unwrap(), Some(Command::Menu(Menu::Control)));
        assert_eq!(parse_text("/status").unwrap(), Some(Command::Menu(Menu::Stats)));
        assert_eq!(parse_text("/list").unwrap(), Some(Command::List));
    }

    #[test]
    fn gen_defaults_and_explicit_arguments() {
        assert_eq!(parse_text("/gen").unwrap(), Some(Command::Gen { count: 1, days: 30 }));
        assert_eq!(parse_text("/gen 5").unwrap(), Some(Command::Gen { count: 5, days: 30 }));
        assert_eq!(parse_text("/gen 5 7").unwrap(), Some(Command::Gen { count: 5, days: 7 }));
    }

    #[test]
    fn malformed_gen_arguments_are_explicit_errors() {
        assert_eq!(parse_text("/gen zero").unwrap_err(), CommandError::BadCount);
        assert_eq!(parse_text("/gen 0").unwrap_err(), CommandError::BadCount);
        assert_eq!(parse_text("/gen 1 soon").unwrap_err(), CommandError::BadDays);
        assert_eq!(parse_text("/gen 1 -5").unwrap_err(), CommandError::BadDays);
        assert_eq!(
            parse_text("/gen 1 99999999999999").unwrap_err(),
            CommandError::BadDays
        );
    }

    #[test]
    fn absurd_validity_renders_a_usage_error_instead_of_minting() {
        let (_dir, router) = temp_router();
        let reply = router
            .handle_text(ADMIN, "/gen 1 99999999999999")
            .unwrap()
            .unwrap();
        assert!(reply.text.contains("usage: /gen"));
        assert_eq!(router.store.key_counts().unwrap().0, 0);

        // Out-of-range callback payloads are dropped outright.
        assert_eq!(parse_callback("gen_1_99999999999999"), None);
        assert_eq!(parse_callback("global_99999999999999"), None);
        assert!(router
            .handle_callback(ADMIN, "global_99999999999999")
            .unwrap()
            .is_none());
    }

    #[test]
    fn unknown_text_is_ignored_not_an_error() {
        assert_eq!(parse_text("hello there").unwrap(), None);
        assert_eq!(parse_text("/unknown").unwrap(), None);
        assert_eq!(parse_text("   ").unwrap(), None);
    }

    #[test]
    fn callback_payloads_decode() {
        assert_eq!(parse_callback("gen_5_30"), Some(Command::Gen { count: 5, days: 30 }));
        assert_eq!(parse_callback("global_7"), Some(Command::Global { days: 7 }));
        assert_eq!(parse_callback("toggle_server"), Some(Command::Toggle(Flag::Server)));
        assert_eq!(parse_callback("toggle_validation"), Some(Command::Toggle(Flag::Validation)));
        assert_eq!(parse_callback("toggle_creation"), Some(Command::Toggle(Flag::Creation)));
        assert_eq!(parse_callback("menu_stats"), Some(Command::Menu(Menu::Stats)));
        assert_eq!(parse_callback("gen_x_y"), None);
        assert_eq!(parse_callback("bogus"), None);
    }

    // ── routing ──────────────────────────────────────────────────────────

    #[test]
    fn non_admin_senders_get_a_denial_and_nothing_runs() {
        let (_dir, router) = temp_router();
        let reply = router.handle_text(99, "/gen 5 30").unwrap().unwrap();
        assert_eq!(reply.text, "⛔ Unauthorized");

        let reply = router.handle_callback(99, "gen_5_30").unwrap().unwrap();
        assert_eq!(reply.text, "⛔ Unauthorized");

        // No keys were minted by either attempt.
        assert_eq!(router.store.key_counts().unwrap().0, 0);
    }

    #[test]
    fn gen_command_mints_and_renders_tokens() {
        let (_dir, router) = temp_router();
        let reply = router.handle_text(ADMIN, "/gen 3 7").unwrap().unwrap();
        assert!(reply.text.contains("Generated 3 Key(s)"));
        assert_eq!(reply.text.matches("<code>").count(), 3);
        assert_eq!(router.store.key_counts().unwrap(), (3, 0));
    }

    #[test]
    fn global_callback_mints_one_global_key() {
        let (_dir, router) = temp_router();
        let reply = router.handle_callback(ADMIN, "global_7").unwrap().unwrap();
        assert!(reply.text.contains("Global Key (7 Days)"));
        let record = router.store.recent_keys(1).unwrap().pop().unwrap();
        assert!(record.key_type.is_global());
    }

    #[test]
    fn creation_flag_blocks_generation() {
        let (_dir, router) = temp_router();
        router.store.toggle_flag(Flag::Creation).unwrap();
        let reply = router.handle_text(ADMIN, "/gen").unwrap().unwrap();
        assert!(reply.text.contains("creation is disabled"));
        assert_eq!(router.store.key_counts().unwrap().0, 0);
    }

    #[test]
    fn toggle_flips_flag_and_rerenders_control_menu() {
        let (_dir, router) = temp_router();
        let reply = router.handle_callback(ADMIN, "toggle_validation").unwrap().unwrap();
        assert!(reply.text.contains("Validation ➜ <b>Disabled</b>"));
        let kb = reply.keyboard.expect("control menu keyboard");
        let labels: Vec<&str> = kb
            .inline_keyboard
            .iter()
            .flatten()
            .map(|b| b.text.as_str())
            .collect();
        assert!(labels.contains(&"🔴 Validation"));
        assert!(labels.contains(&"🟢 Server"));
        assert!(!router.store.get_flag(Flag::Validation).unwrap());
    }

    #[test]
    fn status_reports_counts_and_flag_lights() {
        let (_dir, router) = temp_router();
        router.handle_text(ADMIN, "/gen 2 30").unwrap();
        router.handle_callback(ADMIN, "toggle_server").unwrap();
        let reply = router.handle_text(ADMIN, "/status").unwrap().unwrap();
        assert!(reply.text.contains("Total Keys: 2"));
        assert!(reply.text.contains("Server: 🔴"));
        assert!(reply.text.contains("Validation: 🟢"));
    }

    #[test]
    fn list_shows_newest_first_with_binding_state() {
        let (_dir, router) = temp_router();
        router.handle_text(ADMIN, "/gen 2 30").unwrap();
        router
            .store
            .transact(|d| d.licenses[0].hwid = Some("dev-1".into()))
            .unwrap();
        let reply = router.handle_text(ADMIN, "/list").unwrap().unwrap();
        assert!(reply.text.contains("🔒 dev-1"));
        assert!(reply.text.contains("🟢 unbound"));
    }

    #[test]
    fn list_caps_at_twenty_entries() {
        let (_dir, router) = temp_router();
        router.handle_text(ADMIN, "/gen 25 30").unwrap();
        let reply = router.handle_text(ADMIN, "/list").unwrap().unwrap();
        assert!(reply.text.contains("Last 20 Keys"));
        assert_eq!(reply.text.matches("<code>").count(), 20);
    }

    #[test]
    fn menu_replies_carry_keyboards_and_mutate_nothing() {
        let (_dir, router) = temp_router();
        for data in ["menu_main", "menu_generate", "menu_global", "menu_control"] {
            let reply = router.handle_callback(ADMIN, data).unwrap().unwrap();
            assert!(reply.keyboard.is_some(), "{data} should render buttons");
        }
        assert_eq!(router.store.key_counts().unwrap().0, 0);
    }
}
