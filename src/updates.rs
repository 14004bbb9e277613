use crate::config::{VERSION_CHECK_TIMEOUT, VERSION_URL};
use crate::provision::{HttpTransport, Transport};
use log::{debug, info};
use std::io::Read;
use std::sync::mpsc::{self, Receiver};
use std::thread;

pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    Available(String),
    Unknown,
}

fn parse_version(text: &str) -> Option<Vec<u32>> {
    text.trim()
        .trim_start_matches('v')
        .split('.')
        .map(|part| part.parse().ok())
        .collect()
}

/// Returns the online version when it is strictly newer than `current`.
pub fn newer_version(current: &str, online: &str) -> Option<String> {
    let ours = parse_version(current)?;
    let theirs = parse_version(online)?;
    (theirs > ours).then(|| online.trim().to_string())
}

pub fn check<T: Transport + ?Sized>(transport: &T, url: &str) -> UpdateStatus {
    let resp = match transport.get(url) {
        Ok(resp) if resp.status == 200 => resp,
        Ok(resp) => {
            debug!("Version check answered {}", resp.status);
            return UpdateStatus::Unknown;
        }
        Err(e) => {
            debug!("Version check failed: {}", e);
            return UpdateStatus::Unknown;
        }
    };

    let mut text = String::new();
    if let Err(e) = resp.body.take(64).read_to_string(&mut text) {
        debug!("Version check body unreadable: {}", e);
        return UpdateStatus::Unknown;
    }
    match newer_version(CURRENT_VERSION, &text) {
        Some(version) => {
            info!("Version {} is available (running {}).", version, CURRENT_VERSION);
            UpdateStatus::Available(version)
        }
        None => UpdateStatus::UpToDate,
    }
}

/// Runs the check on its own thread; the answer arrives once on the receiver.
pub fn spawn_check(ctx: egui::Context) -> Receiver<UpdateStatus> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let status = check(&HttpTransport::with_timeout(VERSION_CHECK_TIMEOUT), VERSION_URL);
        let _ = tx.send(status);
        ctx.request_repaint();
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::testing::{FakeTransport, Reply};

    const URL: &str = "https://updates.test/version.txt";

    #[test]
    fn compares_dotted_versions() {
        assert_eq!(newer_version("0.1.9", "0.2.0"), Some("0.2.0".into()));
        assert_eq!(newer_version("0.1.0", "0.0.05"), None);
        assert_eq!(newer_version("0.1.0", "0.1.0\n"), None);
        assert_eq!(newer_version("0.1.0", "v1.0"), Some("v1.0".into()));
        assert_eq!(newer_version("0.1.0", "<html>"), None);
    }

    #[test]
    fn check_reads_remote_version() {
        let transport = FakeTransport::default().with(URL, Reply::ok(b"99.0.0\n".to_vec(), 4));
        assert_eq!(check(&transport, URL), UpdateStatus::Available("99.0.0".into()));

        let transport = FakeTransport::default().with(URL, Reply::ok(b"0.0.1".to_vec(), 64));
        assert_eq!(check(&transport, URL), UpdateStatus::UpToDate);
    }

    #[test]
    fn check_failures_are_unknown() {
        let transport = FakeTransport::default().with(URL, Reply::status(404));
        assert_eq!(check(&transport, URL), UpdateStatus::Unknown);
        assert_eq!(check(&FakeTransport::default(), URL), UpdateStatus::Unknown);
    }
}
