//! Reply texts in Telegram's MarkdownV2 dialect.
//!
//! Everything returned from this module is ready to be sent as is: dynamic
//! pieces (usernames, addresses, states, numbers) go through [`escape`] and
//! only the markup we add on purpose (spoilers) is left unescaped.

use std::fmt::Display;

use teloxide::utils::markdown;

use crate::model::{InstanceState, UsageSample};

/// teloxide's escaper skips `\`, which MarkdownV2 also reserves: it has to
/// be doubled first so the escapes added afterwards stay unambiguous.
pub fn escape(text: &str) -> String {
    markdown::escape(&text.replace('\\', r"\\"))
}

pub fn spoiler(text: &str) -> String {
    format!("||{}||", escape(text))
}

/// Three decimals at most, no trailing `.0` (`50.0` renders as `50`).
pub fn format_metric(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    format!("{rounded}")
}

pub struct StatusReport {
    pub state: InstanceState,
    pub address: Option<String>,
    pub usage: UsageSample,
}

impl StatusReport {
    pub fn headline_only(state: InstanceState) -> Self {
        Self {
            state,
            address: None,
            usage: UsageSample::absent(),
        }
    }
}

impl Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&escape(&format!("The server is {}.", self.state)))?;
        f.write_str("\n")?;
        if let Some(address) = &self.address {
            f.write_str(&format!("Use {} to connect\n", spoiler(address)))?;
        }
        if let Some((avg, max)) = self.usage.both() {
            let peak = format!("CPU usage (peak): {}%", format_metric(max));
            let average = format!("CPU usage (average): {}%", format_metric(avg));
            f.write_str(&format!("{}\n{}\n", escape(&peak), escape(&average)))?;
        }
        Ok(())
    }
}

fn connect_with(address: &str) -> String {
    format!("{}\n{}", escape("Use this IP to connect:"), spoiler(address))
}

pub fn already_running(address: Option<&str>) -> String {
    let headline = escape("Server is already running!");
    match address {
        Some(address) => format!("{headline}\n{}", connect_with(address)),
        None => headline,
    }
}

pub fn already_starting() -> String {
    escape("Server is starting!\nPlease wait")
}

pub fn start_requested() -> String {
    escape("Attempting to start server. Please wait")
}

pub fn started(game_name: &str, address: Option<&str>) -> String {
    let headline = escape(&format!(
        "Instance started, starting {game_name} dedicated server\nYou will be able to connect shortly"
    ));
    match address {
        Some(address) => format!("{headline}\n{}", connect_with(address)),
        None => format!(
            "{headline}\n{}",
            escape("No public IP has been assigned yet, check /server_status in a moment")
        ),
    }
}

pub fn not_running() -> String {
    escape("Server is not running!")
}

pub fn stopping() -> String {
    escape("Stopping server")
}

pub fn stopped() -> String {
    escape("Server stopped")
}

pub fn started_by(username: &str) -> String {
    escape(&format!("Server started by @{username}"))
}

pub fn stopped_by(username: &str) -> String {
    escape(&format!("Server stopped by @{username}"))
}

pub fn busy() -> String {
    escape("Another start or stop request is in progress. Please wait")
}

pub fn failure(activity: &str) -> String {
    escape(&format!("An error occurred while {activity}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::timeout;

    #[test]
    #[timeout(50)]
    fn reserved_characters_are_escaped_once() {
        assert_eq!(escape("a.b!c(d)e-f"), r"a\.b\!c\(d\)e\-f");
        assert_eq!(escape("plain text"), "plain text");
    }

    #[test]
    #[timeout(50)]
    fn backslashes_are_escaped_too() {
        assert_eq!(escape(r"C:\games"), r"C:\\games");
        assert_eq!(started_by(r"a\_b"), r"Server started by @a\\\_b");
    }

    #[test]
    #[timeout(50)]
    fn addresses_render_as_escaped_spoilers() {
        assert_eq!(spoiler("10.0.0.1"), r"||10\.0\.0\.1||");
    }

    #[test]
    #[timeout(50)]
    fn metrics_are_rounded_to_three_decimals() {
        assert_eq!(format_metric(50.0), "50");
        assert_eq!(format_metric(12.345), "12.345");
        assert_eq!(format_metric(3.14159), "3.142");
        assert_eq!(format_metric(0.0004), "0");
    }

    #[test]
    #[timeout(50)]
    fn running_report_lists_every_section_in_order() {
        let report = StatusReport {
            state: InstanceState::Running,
            address: Some("1.2.3.4".to_owned()),
            usage: UsageSample::new(Some(12.345), Some(50.0)),
        };

        assert_eq!(
            report.to_string(),
            "The server is running\\.\n\
             Use ||1\\.2\\.3\\.4|| to connect\n\
             CPU usage \\(peak\\): 50%\n\
             CPU usage \\(average\\): 12\\.345%\n"
        );
    }

    #[test]
    #[timeout(50)]
    fn report_without_usage_has_no_cpu_lines() {
        let report = StatusReport {
            state: InstanceState::Running,
            address: Some("1.2.3.4".to_owned()),
            usage: UsageSample::absent(),
        };

        let text = report.to_string();
        assert!(text.contains("Use ||1\\.2\\.3\\.4|| to connect"));
        assert!(!text.contains("CPU usage"));
    }

    #[test]
    #[timeout(50)]
    fn headline_only_report() {
        assert_eq!(
            StatusReport::headline_only(InstanceState::Stopped).to_string(),
            "The server is stopped\\.\n"
        );
    }

    #[test]
    #[timeout(50)]
    fn usernames_in_notifications_are_escaped() {
        assert_eq!(started_by("jon.doe_42"), r"Server started by @jon\.doe\_42");
        assert_eq!(stopped_by("a-b"), r"Server stopped by @a\-b");
    }

    #[test]
    #[timeout(50)]
    fn started_reply_falls_back_when_address_is_missing() {
        let text = started("Valheim", None);
        assert!(text.starts_with("Instance started, starting Valheim dedicated server"));
        assert!(text.contains(r"/server\_status"));
        assert!(!text.contains("||"));
    }

    #[test]
    #[timeout(50)]
    fn already_running_includes_address() {
        assert_eq!(
            already_running(Some("1.2.3.4")),
            "Server is already running\\!\nUse this IP to connect:\n||1\\.2\\.3\\.4||"
        );
    }
}
