use crate::config::*;
use crate::provision::{ensure_asset, Asset, DownloadFailed, Fetched, Progress, Transport};
use crate::store::{AppPaths, Store};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("could not create game folders: {0}")]
    Folders(#[source] crate::store::StoreError),
    #[error("failed to download {label}: {source}")]
    Asset {
        label: String,
        #[source]
        source: DownloadFailed,
    },
    #[error("main window did not finish loading: {0}")]
    MainSurface(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CheckingReadiness,
    Ready,
    Provisioning,
    Running,
    Failed,
}

/// The two windows as the sequencer sees them.
pub trait Shell {
    fn show_loading(&mut self);
    fn report(&mut self, progress: &Progress);
    /// Creates the main surface and returns once it is fully loaded.
    fn open_main(&mut self) -> Result<(), BootError>;
    fn close_loading(&mut self);
}

/// The two assets the main surface draws.
pub fn game_assets(paths: &AppPaths) -> [Asset; 2] {
    [
        Asset::new(MENU_IMAGE_LABEL, MENU_IMAGE_URL, &paths.menu_image),
        Asset::new(BUTTON_IMAGE_LABEL, BUTTON_IMAGE_URL, &paths.button_image),
    ]
}

// Scoped to one launch.
#[derive(Debug, Default)]
struct ProvisioningState {
    confirmed: Vec<PathBuf>,
    last_percent: HashMap<String, u8>,
}

impl ProvisioningState {
    fn confirm(&mut self, path: impl Into<PathBuf>) {
        self.confirmed.push(path.into());
    }

    fn record(&mut self, progress: &Progress) {
        self.last_percent.insert(progress.label.clone(), progress.percent);
    }
}

pub struct Bootstrap<'a, T: Transport + ?Sized, S: Shell> {
    store: &'a Store,
    transport: &'a T,
    assets: &'a [Asset],
    shell: &'a mut S,
    phase: Phase,
    state: ProvisioningState,
}

impl<'a, T: Transport + ?Sized, S: Shell> Bootstrap<'a, T, S> {
    pub fn new(store: &'a Store, transport: &'a T, assets: &'a [Asset], shell: &'a mut S) -> Self {
        Self {
            store,
            transport,
            assets,
            shell,
            phase: Phase::CheckingReadiness,
            state: ProvisioningState::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_percent(&self, label: &str) -> Option<u8> {
        self.state.last_percent.get(label).copied()
    }

    /// Every required file already exists.
    pub fn is_ready(&self) -> bool {
        let paths = self.store.paths();
        paths.score_file.exists()
            && paths.config_file.exists()
            && self.assets.iter().all(Asset::is_present)
    }

    pub fn run(&mut self) -> Result<(), BootError> {
        self.phase = Phase::CheckingReadiness;
        if self.is_ready() {
            info!("All game files present, starting directly.");
            self.phase = Phase::Ready;
            return match self.shell.open_main() {
                Ok(()) => {
                    self.phase = Phase::Running;
                    Ok(())
                }
                Err(e) => Err(self.fail(e, false)),
            };
        }

        info!("Game files missing, provisioning.");
        self.phase = Phase::Provisioning;
        self.shell.show_loading();

        if let Err(e) = self.provision() {
            return Err(self.fail(e, true));
        }
        self.milestone("Starting game", MILESTONE_DONE);

        if let Err(e) = self.shell.open_main() {
            return Err(self.fail(e, true));
        }
        self.shell.close_loading();
        self.phase = Phase::Running;
        debug!("Provisioning confirmed {} files.", self.state.confirmed.len());
        Ok(())
    }

    fn provision(&mut self) -> Result<(), BootError> {
        self.milestone("Creating folders", MILESTONE_FOLDERS);
        self.store.ensure_dirs().map_err(BootError::Folders)?;
        self.state.confirm(&self.store.paths().root);

        // The store's read paths recover from missing files, so these are not fatal.
        self.milestone("Preparing score", MILESTONE_SCORE);
        match self.store.ensure_score() {
            Ok(()) => self.state.confirm(&self.store.paths().score_file),
            Err(e) => warn!("Continuing without a score file: {}", e),
        }

        self.milestone("Preparing settings", MILESTONE_SETTINGS);
        match self.store.ensure_config() {
            Ok(()) => self.state.confirm(&self.store.paths().config_file),
            Err(e) => warn!("Continuing without a settings file: {}", e),
        }

        let milestones = [MILESTONE_FIRST_ASSET, MILESTONE_SECOND_ASSET];
        let assets = self.assets;
        for (asset, milestone) in assets.iter().zip(milestones) {
            self.milestone(&format!("Fetching {}", asset.label), milestone);
            self.fetch(asset)?;
        }
        Ok(())
    }

    fn fetch(&mut self, asset: &Asset) -> Result<(), BootError> {
        let shell = &mut *self.shell;
        let state = &mut self.state;
        let fetched = ensure_asset(self.transport, asset, |progress| {
            state.record(&progress);
            shell.report(&progress);
        })
        .map_err(|source| BootError::Asset {
            label: asset.label.clone(),
            source,
        })?;

        if fetched == Fetched::AlreadyPresent {
            debug!("{} already present.", asset.label);
        }
        self.state.confirm(&asset.path);
        Ok(())
    }

    fn milestone(&mut self, label: &str, percent: u8) {
        let progress = Progress::new(label, percent);
        self.state.record(&progress);
        self.shell.report(&progress);
    }

    fn fail(&mut self, e: BootError, loading_shown: bool) -> BootError {
        error!("Startup failed: {}", e);
        if loading_shown {
            self.shell.close_loading();
        }
        self.phase = Phase::Failed;
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::testing::{FakeTransport, Reply};
    use crate::store::testing::scratch_dir;
    use std::fs;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        ShowLoading,
        Report(String, u8),
        OpenMain,
        CloseLoading,
    }

    #[derive(Default)]
    struct RecordingShell {
        events: Vec<Event>,
        main_fails: bool,
    }

    impl Shell for RecordingShell {
        fn show_loading(&mut self) {
            self.events.push(Event::ShowLoading);
        }

        fn report(&mut self, progress: &Progress) {
            self.events
                .push(Event::Report(progress.label.clone(), progress.percent));
        }

        fn open_main(&mut self) -> Result<(), BootError> {
            self.events.push(Event::OpenMain);
            if self.main_fails {
                Err(BootError::MainSurface("texture decode failed".into()))
            } else {
                Ok(())
            }
        }

        fn close_loading(&mut self) {
            self.events.push(Event::CloseLoading);
        }
    }

    impl RecordingShell {
        fn position(&self, event: &Event) -> Option<usize> {
            self.events.iter().position(|e| e == event)
        }

        fn reports(&self) -> usize {
            self.events
                .iter()
                .filter(|e| matches!(e, Event::Report(..)))
                .count()
        }
    }

    fn fixture(name: &str) -> (Store, [Asset; 2]) {
        let store = Store::new(AppPaths::under(scratch_dir(name)));
        let assets = game_assets(store.paths());
        (store, assets)
    }

    fn serving_both() -> FakeTransport {
        FakeTransport::default()
            .with(MENU_IMAGE_URL, Reply::ok(vec![1; 1000], 250))
            .with(BUTTON_IMAGE_URL, Reply::ok(vec![2; 400], 100))
    }

    #[test]
    fn ready_install_starts_directly() {
        let (store, assets) = fixture("boot-ready");
        store.ensure_initialized();
        for asset in &assets {
            fs::write(&asset.path, b"cached").unwrap();
        }
        let transport = serving_both();
        let mut shell = RecordingShell::default();

        let mut boot = Bootstrap::new(&store, &transport, &assets, &mut shell);
        assert!(boot.is_ready());
        boot.run().unwrap();
        assert_eq!(boot.phase(), Phase::Running);

        assert_eq!(shell.events, vec![Event::OpenMain]);
        assert_eq!(transport.calls.get(), 0);
    }

    #[test]
    fn fresh_install_provisions_in_order() {
        let (store, assets) = fixture("boot-fresh");
        let transport = serving_both();
        let mut shell = RecordingShell::default();

        let mut boot = Bootstrap::new(&store, &transport, &assets, &mut shell);
        boot.run().unwrap();
        assert_eq!(boot.phase(), Phase::Running);
        assert_eq!(boot.last_percent(MENU_IMAGE_LABEL), Some(100));
        assert_eq!(boot.last_percent(BUTTON_IMAGE_LABEL), Some(100));

        assert_eq!(shell.events.first(), Some(&Event::ShowLoading));
        let open = shell.position(&Event::OpenMain).unwrap();
        let close = shell.position(&Event::CloseLoading).unwrap();
        assert!(open < close);
        assert_eq!(close, shell.events.len() - 1);

        let menu: Vec<u8> = shell
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Report(label, p) if label == MENU_IMAGE_LABEL => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(menu, vec![25, 50, 75, 100]);

        assert_eq!(transport.calls.get(), 2);
        assert!(store.paths().score_file.exists());
        assert!(store.paths().config_file.exists());
        assert!(assets.iter().all(Asset::is_present));
    }

    #[test]
    fn milestones_follow_step_order() {
        let (store, assets) = fixture("boot-milestones");
        let transport = serving_both();
        let mut shell = RecordingShell::default();
        Bootstrap::new(&store, &transport, &assets, &mut shell)
            .run()
            .unwrap();

        let milestones: Vec<u8> = shell
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Report(label, p)
                    if label != MENU_IMAGE_LABEL && label != BUTTON_IMAGE_LABEL =>
                {
                    Some(*p)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            milestones,
            vec![
                MILESTONE_FOLDERS,
                MILESTONE_SCORE,
                MILESTONE_SETTINGS,
                MILESTONE_FIRST_ASSET,
                MILESTONE_SECOND_ASSET,
                MILESTONE_DONE
            ]
        );
    }

    #[test]
    fn partial_install_only_downloads_what_is_missing() {
        let (store, assets) = fixture("boot-partial");
        store.ensure_initialized();
        fs::write(&assets[0].path, b"cached").unwrap();
        let transport = serving_both();
        let mut shell = RecordingShell::default();

        let mut boot = Bootstrap::new(&store, &transport, &assets, &mut shell);
        assert!(!boot.is_ready());
        boot.run().unwrap();

        assert_eq!(transport.calls.get(), 1);
        assert_eq!(fs::read(&assets[0].path).unwrap(), b"cached");
        assert!(shell.position(&Event::ShowLoading).is_some());
    }

    #[test]
    fn server_error_fails_without_main_surface() {
        let (store, assets) = fixture("boot-500");
        let transport = FakeTransport::default()
            .with(MENU_IMAGE_URL, Reply::status(500))
            .with(BUTTON_IMAGE_URL, Reply::ok(vec![2; 400], 100));
        let mut shell = RecordingShell::default();

        let mut boot = Bootstrap::new(&store, &transport, &assets, &mut shell);
        let err = boot.run().unwrap_err();
        assert_eq!(boot.phase(), Phase::Failed);
        assert!(matches!(
            err,
            BootError::Asset {
                source: DownloadFailed::Status(500),
                ..
            }
        ));

        assert!(shell.position(&Event::OpenMain).is_none());
        assert_eq!(shell.events.last(), Some(&Event::CloseLoading));
        assert!(!assets[0].path.exists());
        // No attempt at the second asset after the first failed.
        assert_eq!(transport.calls.get(), 1);
    }

    #[test]
    fn main_surface_failure_is_fatal() {
        let (store, assets) = fixture("boot-main-fails");
        let transport = serving_both();
        let mut shell = RecordingShell {
            main_fails: true,
            ..Default::default()
        };

        let mut boot = Bootstrap::new(&store, &transport, &assets, &mut shell);
        assert!(matches!(boot.run(), Err(BootError::MainSurface(_))));
        assert_eq!(boot.phase(), Phase::Failed);
        assert_eq!(shell.events.last(), Some(&Event::CloseLoading));
    }

    #[test]
    fn ready_path_reports_nothing() {
        let (store, assets) = fixture("boot-quiet");
        store.ensure_initialized();
        for asset in &assets {
            fs::write(&asset.path, b"cached").unwrap();
        }
        let transport = FakeTransport::default();
        let mut shell = RecordingShell::default();
        Bootstrap::new(&store, &transport, &assets, &mut shell)
            .run()
            .unwrap();

        assert_eq!(shell.reports(), 0);
        assert!(shell.position(&Event::ShowLoading).is_none());
    }
}
