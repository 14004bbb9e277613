use std::time::Duration;

// Window
pub const WINDOW_TITLE: &str = "Generic Clicker Game";
pub const WINDOW_WIDTH: f32 = 1280.0;
pub const WINDOW_HEIGHT: f32 = 720.0;

// On-disk layout, relative to the per-user data directory
pub const APP_DIR_NAME: &str = ".GenericClickerGame";
pub const SCORE_DIR: &str = "score";
pub const SCORE_FILE: &str = "score.dat";
pub const CONFIG_DIR: &str = "configs";
pub const CONFIG_FILE: &str = "config.json";
pub const ASSETS_DIR: &str = "assets";
pub const MENU_IMAGE_FILE: &str = "menu.png";
pub const BUTTON_IMAGE_FILE: &str = "button.gif";

// Remote assets
pub const MENU_IMAGE_URL: &str = "https://i.postimg.cc/hGf3VRqY/image-removebg-preview-5.png";
pub const BUTTON_IMAGE_URL: &str = "https://minecraft.wiki/images/Enchanted_Book.gif?b21c4";
pub const MENU_IMAGE_LABEL: &str = "menu image";
pub const BUTTON_IMAGE_LABEL: &str = "button image";

// Networking
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;
pub const VERSION_URL: &str =
    "https://raw.githack.com/eupyetro0224234/Generic-Clicker-Game/main/github_assets/version.txt";
pub const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

// Bootstrap
pub const MAIN_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const FAIL_EXIT_DELAY: Duration = Duration::from_secs(3);
pub const EXIT_BOOT_FAILED: i32 = 1;

// Loading milestones (percent shown when each step starts)
pub const MILESTONE_FOLDERS: u8 = 0;
pub const MILESTONE_SCORE: u8 = 10;
pub const MILESTONE_SETTINGS: u8 = 20;
pub const MILESTONE_FIRST_ASSET: u8 = 30;
pub const MILESTONE_SECOND_ASSET: u8 = 60;
pub const MILESTONE_DONE: u8 = 100;

// Settings keys, in the order they are written to config.json
pub const OPT_LEFT_CLICK: &str = "Left click";
pub const OPT_RIGHT_CLICK: &str = "Right click";
pub const OPT_MIDDLE_CLICK: &str = "Middle click";
pub const OPT_SCROLL: &str = "Mouse scroll";
pub const OPT_VERTICAL_MENU: &str = "Vertical menu";
pub const OPT_CHECK_UPDATES: &str = "Check for updates";

pub const DEFAULT_SETTINGS: [(&str, bool); 6] = [
    (OPT_LEFT_CLICK, true),
    (OPT_RIGHT_CLICK, true),
    (OPT_MIDDLE_CLICK, true),
    (OPT_SCROLL, true),
    (OPT_VERTICAL_MENU, false),
    (OPT_CHECK_UPDATES, false),
];

// Exit confirmation
pub const EXIT_CONFIRM_WORD: &str = "yes";
pub const EXIT_INPUT_MAX_LEN: usize = 20;
